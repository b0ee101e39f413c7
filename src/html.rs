// HTML Fragment Scanning
// Tolerant tokenizer for the small HTML subset the document model and the
// element tree exchange. Malformed markup degrades to text, never to an error.

use pulldown_cmark_escape::{escape_html, escape_html_body_text};

/// A single token produced by [`tokenize`].
#[derive(Debug, Clone, PartialEq)]
pub enum HtmlToken {
    StartTag {
        name: String,
        attrs: Vec<(String, String)>,
        self_closing: bool,
    },
    EndTag(String),
    Text(String),
}

impl HtmlToken {
    /// Look up an attribute value on a start tag.
    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            HtmlToken::StartTag { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Elements that never carry children or a closing tag.
pub fn is_void_element(name: &str) -> bool {
    matches!(
        name,
        "area"
            | "base"
            | "br"
            | "col"
            | "embed"
            | "hr"
            | "img"
            | "input"
            | "link"
            | "meta"
            | "source"
            | "track"
            | "wbr"
    )
}

/// Scan an HTML fragment into a flat token stream.
///
/// Comments and doctype/processing instructions are dropped. A `<` that does
/// not open a well-formed tag is kept as literal text. Tag and attribute
/// names are lowercased; entities in text and attribute values are decoded.
pub fn tokenize(html: &str) -> Vec<HtmlToken> {
    let mut tokens = Vec::new();
    let mut text = String::new();
    let mut i = 0;

    while i < html.len() {
        if html.as_bytes()[i] == b'<' {
            match scan_markup(html, i) {
                Scan::Token(token, next) => {
                    flush_text(&mut tokens, &mut text);
                    tokens.push(token);
                    i = next;
                    continue;
                }
                Scan::Skip(next) => {
                    flush_text(&mut tokens, &mut text);
                    i = next;
                    continue;
                }
                Scan::NotMarkup => {
                    text.push('<');
                    i += 1;
                    continue;
                }
            }
        }

        let next_lt = html[i..].find('<').map_or(html.len(), |p| i + p);
        text.push_str(&html[i..next_lt]);
        i = next_lt;
    }

    flush_text(&mut tokens, &mut text);
    tokens
}

fn flush_text(tokens: &mut Vec<HtmlToken>, text: &mut String) {
    if !text.is_empty() {
        tokens.push(HtmlToken::Text(decode_entities(text)));
        text.clear();
    }
}

enum Scan {
    Token(HtmlToken, usize),
    Skip(usize),
    NotMarkup,
}

/// Try to read one piece of markup starting at the `<` at byte `start`.
fn scan_markup(html: &str, start: usize) -> Scan {
    let rest = &html[start..];

    if rest.starts_with("<!--") {
        return match rest.find("-->") {
            Some(p) => Scan::Skip(start + p + 3),
            None => Scan::Skip(html.len()),
        };
    }
    if rest.starts_with("<!") || rest.starts_with("<?") {
        return match rest.find('>') {
            Some(p) => Scan::Skip(start + p + 1),
            None => Scan::Skip(html.len()),
        };
    }
    if rest.starts_with("</") {
        let mut i = start + 2;
        let name = read_name(html, &mut i);
        if name.is_empty() {
            return Scan::NotMarkup;
        }
        // Tolerate junk between the name and the closing bracket
        return match html[i..].find('>') {
            Some(p) => Scan::Token(HtmlToken::EndTag(name), i + p + 1),
            None => Scan::NotMarkup,
        };
    }

    let mut i = start + 1;
    let name = read_name(html, &mut i);
    if name.is_empty() {
        return Scan::NotMarkup;
    }

    let mut attrs = Vec::new();
    loop {
        skip_whitespace(html, &mut i);
        let bytes = html.as_bytes();
        match bytes.get(i) {
            None => return Scan::NotMarkup,
            Some(b'>') => {
                return Scan::Token(
                    HtmlToken::StartTag {
                        name,
                        attrs,
                        self_closing: false,
                    },
                    i + 1,
                );
            }
            Some(b'/') => {
                if bytes.get(i + 1) == Some(&b'>') {
                    return Scan::Token(
                        HtmlToken::StartTag {
                            name,
                            attrs,
                            self_closing: true,
                        },
                        i + 2,
                    );
                }
                i += 1;
            }
            Some(_) => {
                let attr_name = read_attr_name(html, &mut i);
                if attr_name.is_empty() {
                    // Unparseable character; step over it so the scan advances
                    i += 1;
                    continue;
                }
                skip_whitespace(html, &mut i);
                let value = if html.as_bytes().get(i) == Some(&b'=') {
                    i += 1;
                    skip_whitespace(html, &mut i);
                    read_attr_value(html, &mut i)
                } else {
                    String::new()
                };
                attrs.push((attr_name, value));
            }
        }
    }
}

fn read_name(html: &str, i: &mut usize) -> String {
    // Tag names start with a letter; "<2x>" stays text
    if !html.as_bytes().get(*i).is_some_and(u8::is_ascii_alphabetic) {
        return String::new();
    }
    let start = *i;
    while let Some(&b) = html.as_bytes().get(*i) {
        if b.is_ascii_alphanumeric() || b == b'-' {
            *i += 1;
        } else {
            break;
        }
    }
    html[start..*i].to_ascii_lowercase()
}

fn read_attr_name(html: &str, i: &mut usize) -> String {
    let start = *i;
    while let Some(&b) = html.as_bytes().get(*i) {
        if b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'') {
            break;
        }
        *i += 1;
    }
    html[start..*i].to_ascii_lowercase()
}

fn read_attr_value(html: &str, i: &mut usize) -> String {
    let bytes = html.as_bytes();
    match bytes.get(*i) {
        Some(&quote) if quote == b'"' || quote == b'\'' => {
            *i += 1;
            let start = *i;
            while *i < bytes.len() && bytes[*i] != quote {
                *i += 1;
            }
            let raw = &html[start..*i];
            if *i < bytes.len() {
                *i += 1;
            }
            decode_entities(raw)
        }
        _ => {
            let start = *i;
            while let Some(&b) = bytes.get(*i) {
                if b.is_ascii_whitespace() || b == b'>' {
                    break;
                }
                *i += 1;
            }
            decode_entities(&html[start..*i])
        }
    }
}

fn skip_whitespace(html: &str, i: &mut usize) {
    while html.as_bytes().get(*i).is_some_and(u8::is_ascii_whitespace) {
        *i += 1;
    }
}

/// Decode the character references the writer can produce, plus the numeric
/// forms. Anything unrecognized stays literal.
pub fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        rest = &rest[amp..];
        match decode_one_entity(rest) {
            Some((ch, consumed)) => {
                out.push(ch);
                rest = &rest[consumed..];
            }
            None => {
                out.push('&');
                rest = &rest[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

/// Decode a single entity at the start of `s` (which begins with `&`).
/// Returns the decoded character and the byte length consumed.
fn decode_one_entity(s: &str) -> Option<(char, usize)> {
    let semi = s.find(';')?;
    if semi < 2 || semi > 10 {
        return None;
    }
    let body = &s[1..semi];
    let consumed = semi + 1;

    let ch = match body {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => '\u{a0}',
        _ => {
            let code = if let Some(hex) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else if let Some(dec) = body.strip_prefix('#') {
                dec.parse::<u32>().ok()?
            } else {
                return None;
            };
            char::from_u32(code)?
        }
    };
    Some((ch, consumed))
}

/// Append `value` to `out`, escaped for an attribute value position.
pub fn push_escaped_attribute(out: &mut String, value: &str) {
    let _ = escape_html(&mut *out, value);
}

/// Append `value` to `out`, escaped for element body text.
pub fn push_escaped_text(out: &mut String, value: &str) {
    let _ = escape_html_body_text(&mut *out, value);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_text_and_tags() {
        let tokens = tokenize("<p>Hello <strong>world</strong></p>");
        assert_eq!(
            tokens,
            vec![
                HtmlToken::StartTag {
                    name: "p".to_string(),
                    attrs: vec![],
                    self_closing: false,
                },
                HtmlToken::Text("Hello ".to_string()),
                HtmlToken::StartTag {
                    name: "strong".to_string(),
                    attrs: vec![],
                    self_closing: false,
                },
                HtmlToken::Text("world".to_string()),
                HtmlToken::EndTag("strong".to_string()),
                HtmlToken::EndTag("p".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_attributes() {
        let tokens = tokenize(r#"<span data-title="A &quot;note&quot;" class='x' hidden>t</span>"#);
        match &tokens[0] {
            HtmlToken::StartTag { name, attrs, .. } => {
                assert_eq!(name, "span");
                assert_eq!(
                    attrs,
                    &vec![
                        ("data-title".to_string(), "A \"note\"".to_string()),
                        ("class".to_string(), "x".to_string()),
                        ("hidden".to_string(), String::new()),
                    ]
                );
            }
            other => panic!("Expected start tag, got {:?}", other),
        }
    }

    #[test]
    fn test_tokenize_uppercase_and_unquoted() {
        let tokens = tokenize("<SPAN Data-Title=hi>x</SPAN>");
        assert_eq!(tokens[0].attr("data-title"), Some("hi"));
        assert_eq!(tokens[2], HtmlToken::EndTag("span".to_string()));
    }

    #[test]
    fn test_tokenize_self_closing_and_void() {
        let tokens = tokenize("a<br/>b<br>c");
        assert_eq!(tokens.len(), 5);
        assert!(matches!(
            &tokens[1],
            HtmlToken::StartTag { name, self_closing: true, .. } if name == "br"
        ));
        assert!(matches!(
            &tokens[3],
            HtmlToken::StartTag { name, self_closing: false, .. } if name == "br"
        ));
        assert!(is_void_element("br"));
        assert!(!is_void_element("span"));
    }

    #[test]
    fn test_tokenize_comment_and_doctype_dropped() {
        let tokens = tokenize("<!doctype html><!-- note --><p>x</p>");
        assert_eq!(
            tokens,
            vec![
                HtmlToken::StartTag {
                    name: "p".to_string(),
                    attrs: vec![],
                    self_closing: false,
                },
                HtmlToken::Text("x".to_string()),
                HtmlToken::EndTag("p".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_stray_angle_bracket_is_text() {
        let tokens = tokenize("1 < 2 and <2x>");
        assert_eq!(tokens, vec![HtmlToken::Text("1 < 2 and <2x>".to_string())]);
    }

    #[test]
    fn test_tokenize_unterminated_tag_is_text() {
        let tokens = tokenize("before <span data-title=\"x");
        assert_eq!(
            tokens,
            vec![HtmlToken::Text("before <span data-title=\"x".to_string())]
        );
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b"), "a & b");
        assert_eq!(decode_entities("&lt;p&gt;"), "<p>");
        assert_eq!(decode_entities("&quot;q&quot; &apos;a&apos;"), "\"q\" 'a'");
        assert_eq!(decode_entities("&#65;&#x1F44B;"), "A\u{1F44B}");
        assert_eq!(decode_entities("&bogus; & plain"), "&bogus; & plain");
    }

    #[test]
    fn test_escape_round_trip() {
        let original = "Say \"hi\" to <everyone> & wave \u{1F44B}";
        let mut escaped = String::new();
        push_escaped_attribute(&mut escaped, original);
        assert_eq!(decode_entities(&escaped), original);

        let mut body = String::new();
        push_escaped_text(&mut body, original);
        assert_eq!(decode_entities(&body), original);
    }
}
