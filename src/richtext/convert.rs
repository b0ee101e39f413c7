// HTML Conversion
// Render and parse the annotated document as an HTML fragment. Parsing is
// total and tolerant: anything the scanner hands us becomes a document,
// stray markup included. Rendering always produces the canonical nesting,
// so parse(render(doc)) is stable for normalized documents.

use crate::html::{self, HtmlToken};
use crate::richtext::document::{Block, BlockType, Document, TextRun, TextStyle};

/// Render a document without extra annotation-wrapper attributes.
pub fn document_to_html(document: &Document) -> String {
    document_to_html_with_attrs(document, &[])
}

/// Render a document. `title_extra_attrs` are merged into every annotation
/// wrapper, with the annotation's own `data-title` winning a name clash.
pub fn document_to_html_with_attrs(
    document: &Document,
    title_extra_attrs: &[(String, String)],
) -> String {
    let mut out = String::new();
    for (i, block) in document.blocks().iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        match block.block_type {
            BlockType::Paragraph => out.push_str("<p>"),
            BlockType::Heading { level } => out.push_str(&format!("<h{level}>")),
        }
        // Adjacent runs sharing a title render under one wrapper, so a
        // styled stretch inside an annotation stays a single span
        let mut runs = block.runs.as_slice();
        while let Some(first) = runs.first() {
            let group_len = runs.iter().take_while(|r| r.title == first.title).count();
            let (group, rest) = runs.split_at(group_len);
            write_group(&mut out, group, first.title.as_deref(), title_extra_attrs);
            runs = rest;
        }
        match block.block_type {
            BlockType::Paragraph => out.push_str("</p>"),
            BlockType::Heading { level } => out.push_str(&format!("</h{level}>")),
        }
    }
    out
}

fn write_group(
    out: &mut String,
    group: &[TextRun],
    title: Option<&str>,
    title_extra_attrs: &[(String, String)],
) {
    if let Some(title) = title {
        out.push_str("<span data-title=\"");
        html::push_escaped_attribute(out, title);
        out.push('"');
        for (name, value) in title_extra_attrs {
            if name == "data-title" {
                continue;
            }
            out.push(' ');
            out.push_str(name);
            out.push_str("=\"");
            html::push_escaped_attribute(out, value);
            out.push('"');
        }
        out.push('>');
    }
    for run in group {
        write_styled_text(out, run);
    }
    if title.is_some() {
        out.push_str("</span>");
    }
}

fn write_styled_text(out: &mut String, run: &TextRun) {
    let mut close_stack: Vec<&str> = Vec::new();
    let style = run.style;
    for (on, tag) in [
        (style.bold, "strong"),
        (style.italic, "em"),
        (style.strikethrough, "s"),
        (style.underline, "u"),
        (style.highlight, "mark"),
        (style.code, "code"),
    ] {
        if on {
            out.push('<');
            out.push_str(tag);
            out.push('>');
            close_stack.push(tag);
        }
    }
    for (i, line) in run.text.split('\n').enumerate() {
        if i > 0 {
            out.push_str("<br>");
        }
        html::push_escaped_text(out, line);
    }
    for tag in close_stack.iter().rev() {
        out.push_str("</");
        out.push_str(tag);
        out.push('>');
    }
}

/// Parse an HTML fragment into a document. Never fails: unknown tags are
/// transparent, mismatched end tags close through to the nearest opener,
/// and bare text outside any block gets an implicit paragraph.
pub fn html_to_document(html_text: &str) -> Document {
    let mut blocks: Vec<Block> = Vec::new();
    let mut current: Option<Block> = None;
    // (tag name, effective style inside it, effective title inside it)
    let mut open_inline: Vec<(String, TextStyle, Option<String>)> = Vec::new();

    for token in html::tokenize(html_text) {
        match token {
            HtmlToken::StartTag {
                name,
                attrs,
                self_closing,
            } => {
                let style = current_style(&open_inline);
                let title = current_title(&open_inline);
                if name == "p" {
                    flush_block(&mut blocks, &mut current, &mut open_inline);
                    current = Some(Block::paragraph());
                } else if let Some(level) = heading_level(&name) {
                    flush_block(&mut blocks, &mut current, &mut open_inline);
                    current = Some(Block::heading(level));
                } else if name == "br" {
                    push_text(&mut current, "\n", style, title);
                } else if name == "span" {
                    let span_title = attrs
                        .iter()
                        .find(|(n, _)| n == "data-title")
                        .map(|(_, v)| v.clone())
                        .filter(|v| !v.is_empty());
                    if !self_closing {
                        open_inline.push((name, style, span_title.or(title)));
                    }
                } else {
                    let mut style = style;
                    if apply_style_tag(&mut style, &name) && !self_closing {
                        open_inline.push((name, style, title));
                    }
                    // Anything else is transparent
                }
            }
            HtmlToken::EndTag(name) => {
                if name == "p" || heading_level(&name).is_some() {
                    flush_block(&mut blocks, &mut current, &mut open_inline);
                } else if let Some(pos) =
                    open_inline.iter().rposition(|(n, _, _)| *n == name)
                {
                    // Closes the matching opener and everything inside it
                    open_inline.truncate(pos);
                }
            }
            HtmlToken::Text(text) => {
                let style = current_style(&open_inline);
                let title = current_title(&open_inline);
                push_text(&mut current, &text, style, title);
            }
        }
    }
    flush_block(&mut blocks, &mut current, &mut open_inline);
    Document::from_blocks(blocks)
}

fn current_style(open_inline: &[(String, TextStyle, Option<String>)]) -> TextStyle {
    open_inline
        .last()
        .map(|(_, s, _)| *s)
        .unwrap_or_default()
}

fn current_title(open_inline: &[(String, TextStyle, Option<String>)]) -> Option<String> {
    open_inline.last().and_then(|(_, _, t)| t.clone())
}

fn heading_level(name: &str) -> Option<u8> {
    let level = name.strip_prefix('h')?.parse::<u8>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

fn apply_style_tag(style: &mut TextStyle, tag: &str) -> bool {
    match tag {
        "strong" | "b" => style.bold = true,
        "em" | "i" => style.italic = true,
        "code" => style.code = true,
        "s" | "del" | "strike" => style.strikethrough = true,
        "u" => style.underline = true,
        "mark" => style.highlight = true,
        _ => return false,
    }
    true
}

fn flush_block(
    blocks: &mut Vec<Block>,
    current: &mut Option<Block>,
    open_inline: &mut Vec<(String, TextStyle, Option<String>)>,
) {
    if let Some(block) = current.take() {
        blocks.push(block);
    }
    // Inline tags never span blocks
    open_inline.clear();
}

fn push_text(current: &mut Option<Block>, text: &str, style: TextStyle, title: Option<String>) {
    if current.is_none() {
        // Whitespace between blocks carries no content
        if text.chars().all(char::is_whitespace) {
            return;
        }
        *current = Some(Block::paragraph());
    }
    if let Some(block) = current {
        let mut run = TextRun::new(text, style);
        run.title = title.filter(|t| !t.is_empty());
        block.runs.push(run);
    }
}
