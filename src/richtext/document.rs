// Annotated Document Model
// A block/run document representation independent of any wire format.
// HTML is only used as a storage/serialization format.

use std::fmt;

/// Text styling (semantic, not syntactic)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TextStyle {
    pub bold: bool,
    pub italic: bool,
    pub code: bool,
    pub strikethrough: bool,
    pub underline: bool,
    pub highlight: bool,
}

impl TextStyle {
    pub fn plain() -> Self {
        TextStyle::default()
    }

    pub fn bold() -> Self {
        TextStyle {
            bold: true,
            ..Default::default()
        }
    }

    pub fn italic() -> Self {
        TextStyle {
            italic: true,
            ..Default::default()
        }
    }

    pub fn code() -> Self {
        TextStyle {
            code: true,
            ..Default::default()
        }
    }

    pub fn is_plain(&self) -> bool {
        *self == TextStyle::default()
    }
}

/// A run of text with uniform styling and at most one title annotation.
/// Offsets into a run are character offsets, never bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextRun {
    pub text: String,
    pub style: TextStyle,
    /// Hover annotation. `None` means unannotated; the empty string is
    /// normalized away and never survives.
    pub title: Option<String>,
}

impl TextRun {
    pub fn new(text: impl Into<String>, style: TextStyle) -> Self {
        TextRun {
            text: text.into(),
            style,
            title: None,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        TextRun::new(text, TextStyle::plain())
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        let title = title.into();
        self.title = if title.is_empty() { None } else { Some(title) };
        self
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.text.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Split into two runs at a character offset, both keeping the style
    /// and title of the original.
    pub fn split_at(&self, offset: usize) -> (TextRun, TextRun) {
        let at = byte_index(&self.text, offset);
        let (left, right) = self.text.split_at(at);
        (
            TextRun {
                text: left.to_string(),
                style: self.style,
                title: self.title.clone(),
            },
            TextRun {
                text: right.to_string(),
                style: self.style,
                title: self.title.clone(),
            },
        )
    }
}

/// Byte index of the `offset`-th character, saturating at the end.
pub(crate) fn byte_index(s: &str, offset: usize) -> usize {
    s.char_indices().nth(offset).map_or(s.len(), |(i, _)| i)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    Paragraph,
    Heading { level: u8 },
}

/// A block-level element holding a flat list of runs. Hard line breaks are
/// `'\n'` characters inside run text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub block_type: BlockType,
    pub runs: Vec<TextRun>,
}

impl Block {
    pub fn paragraph() -> Self {
        Block {
            block_type: BlockType::Paragraph,
            runs: Vec::new(),
        }
    }

    pub fn heading(level: u8) -> Self {
        Block {
            block_type: BlockType::Heading {
                level: level.clamp(1, 6),
            },
            runs: Vec::new(),
        }
    }

    pub fn with_run(mut self, run: TextRun) -> Self {
        self.runs.push(run);
        self
    }

    pub fn with_plain_text(self, text: impl Into<String>) -> Self {
        self.with_run(TextRun::plain(text))
    }

    /// Total length in characters.
    pub fn text_len(&self) -> usize {
        self.runs.iter().map(|r| r.len()).sum()
    }

    pub fn to_plain_text(&self) -> String {
        self.runs.iter().map(|r| r.text.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|r| r.is_empty())
    }

    /// Merge adjacent runs that agree on style and title, drop empty runs,
    /// and collapse empty titles to none. Keeps run boundaries meaningful:
    /// after this, neighbouring runs always differ in style or title.
    pub fn normalize(&mut self) {
        let mut merged: Vec<TextRun> = Vec::with_capacity(self.runs.len());
        for mut run in self.runs.drain(..) {
            if run.text.is_empty() {
                continue;
            }
            if run.title.as_deref() == Some("") {
                run.title = None;
            }
            match merged.last_mut() {
                Some(last) if last.style == run.style && last.title == run.title => {
                    last.text.push_str(&run.text);
                }
                _ => merged.push(run),
            }
        }
        self.runs = merged;
    }
}

/// Position within a document: block index plus character offset inside
/// that block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct DocumentPosition {
    pub block: usize,
    pub offset: usize,
}

impl DocumentPosition {
    pub fn new(block: usize, offset: usize) -> Self {
        DocumentPosition { block, offset }
    }

    pub fn start() -> Self {
        DocumentPosition::new(0, 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Document {
    blocks: Vec<Block>,
}

impl Document {
    /// An empty document still has one empty paragraph, so there is always
    /// a block to address.
    pub fn new() -> Self {
        Document {
            blocks: vec![Block::paragraph()],
        }
    }

    pub fn with_paragraph(text: impl Into<String>) -> Self {
        Document {
            blocks: vec![Block::paragraph().with_plain_text(text)],
        }
    }

    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        let mut doc = Document { blocks };
        if doc.blocks.is_empty() {
            doc.blocks.push(Block::paragraph());
        }
        doc.normalize();
        doc
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn blocks_mut(&mut self) -> &mut Vec<Block> {
        &mut self.blocks
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    pub fn add_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|b| b.is_empty())
    }

    pub fn to_plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.to_plain_text())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn normalize(&mut self) {
        for block in &mut self.blocks {
            block.normalize();
        }
    }

    /// Clamp a position to valid block and character bounds.
    pub fn clamp_position(&self, pos: DocumentPosition) -> DocumentPosition {
        let block = pos.block.min(self.blocks.len().saturating_sub(1));
        let offset = pos.offset.min(self.blocks[block].text_len());
        DocumentPosition::new(block, offset)
    }
}

impl fmt::Display for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_plain_text())
    }
}
