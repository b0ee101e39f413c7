// Annotated Text Editor
// Selection-driven commands over the annotated document. Title commands
// follow one shape: split the affected runs at the selection edges, map
// the middle, and let normalization stitch the result back together.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::EditError;
use crate::richtext::convert;
use crate::richtext::document::{byte_index, Document, DocumentPosition, TextRun};

type UpdateCallback = Box<dyn FnMut(&Document)>;

/// Shared handle to an editor, for callbacks that outlive a borrow.
pub type SharedEditor = Rc<RefCell<Editor>>;

pub struct Editor {
    document: Document,
    selection: Option<(DocumentPosition, DocumentPosition)>,
    update_callbacks: Vec<UpdateCallback>,
}

impl Editor {
    pub fn new(document: Document) -> Self {
        let mut document = document;
        document.normalize();
        Editor {
            document,
            selection: None,
            update_callbacks: Vec::new(),
        }
    }

    pub fn shared(document: Document) -> SharedEditor {
        Rc::new(RefCell::new(Editor::new(document)))
    }

    /// Build an editor from serialized HTML.
    pub fn from_html(html: &str) -> Self {
        Editor::new(convert::html_to_document(html))
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Serialize the current document without extra wrapper attributes.
    pub fn to_html(&self) -> String {
        convert::document_to_html(&self.document)
    }

    pub fn set_document(&mut self, document: Document) {
        self.document = document;
        self.document.normalize();
        self.selection = None;
        self.emit_update();
    }

    /// Register a listener invoked after every document change.
    pub fn on_update<F: FnMut(&Document) + 'static>(&mut self, callback: F) {
        self.update_callbacks.push(Box::new(callback));
    }

    fn emit_update(&mut self) {
        for callback in &mut self.update_callbacks {
            callback(&self.document);
        }
    }

    pub fn selection(&self) -> Option<(DocumentPosition, DocumentPosition)> {
        self.selection
    }

    pub fn set_selection(&mut self, start: DocumentPosition, end: DocumentPosition) {
        self.selection = Some((
            self.document.clamp_position(start),
            self.document.clamp_position(end),
        ));
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Selection with its endpoints in document order, or `None` when there
    /// is no selection or it is collapsed.
    fn ordered_selection(&self) -> Option<(DocumentPosition, DocumentPosition)> {
        let (a, b) = self.selection?;
        if a == b {
            return None;
        }
        Some(if a <= b { (a, b) } else { (b, a) })
    }

    /// True when a non-collapsed selection exists.
    pub fn has_selection(&self) -> bool {
        self.ordered_selection().is_some()
    }

    /// Plain text of the current selection.
    pub fn selected_text(&self) -> Option<String> {
        let (start, end) = self.ordered_selection()?;
        let mut parts = Vec::new();
        for block_index in start.block..=end.block {
            let block = &self.document.blocks()[block_index];
            let (sel_start, sel_end) = block_range(start, end, block_index, block.text_len());
            let (_, middle, _) = split_three_way(&block.runs, sel_start, sel_end);
            parts.push(middle.iter().map(|r| r.text.as_str()).collect::<String>());
        }
        Some(parts.join("\n\n"))
    }

    /// Annotate the selection with `title`, overwriting existing titles.
    /// An empty title clears instead.
    pub fn set_title(&mut self, title: &str) -> Result<(), EditError> {
        if title.is_empty() {
            self.unset_title();
            return Ok(());
        }
        let (start, end) = self
            .ordered_selection()
            .ok_or(EditError::SelectionRequired)?;
        self.map_selection_titles(start, end, |t| *t = Some(title.to_string()));
        self.emit_update();
        Ok(())
    }

    /// Remove the mark when the whole selection already carries exactly
    /// `title`, otherwise apply `title` over the selection.
    pub fn toggle_title(&mut self, title: &str) -> Result<(), EditError> {
        let (start, end) = self
            .ordered_selection()
            .ok_or(EditError::SelectionRequired)?;
        if !title.is_empty() && self.selection_uniformly_titled(start, end, title) {
            self.unset_title();
            Ok(())
        } else {
            self.set_title(title)
        }
    }

    /// Strip titles from the selection. Never fails; without a usable
    /// selection this does nothing.
    pub fn unset_title(&mut self) {
        let Some((start, end)) = self.ordered_selection() else {
            return;
        };
        self.map_selection_titles(start, end, |t| *t = None);
        self.emit_update();
    }

    /// Route a raw user-entered title: trimmed, with the empty result
    /// meaning "remove the annotation".
    pub fn save_title(&mut self, raw: &str) -> Result<(), EditError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            self.unset_title();
            Ok(())
        } else {
            self.set_title(trimmed)
        }
    }

    /// True when any selected character carries a title.
    pub fn title_active(&self) -> bool {
        self.title_attributes().is_some()
    }

    /// The first title value inside the selection, in document order.
    pub fn title_attributes(&self) -> Option<String> {
        let (start, end) = self.ordered_selection()?;
        for block_index in start.block..=end.block {
            let block = &self.document.blocks()[block_index];
            let (sel_start, sel_end) = block_range(start, end, block_index, block.text_len());
            let (_, middle, _) = split_three_way(&block.runs, sel_start, sel_end);
            if let Some(title) = middle.into_iter().find_map(|r| r.title) {
                return Some(title);
            }
        }
        None
    }

    fn selection_uniformly_titled(
        &self,
        start: DocumentPosition,
        end: DocumentPosition,
        title: &str,
    ) -> bool {
        for block_index in start.block..=end.block {
            let block = &self.document.blocks()[block_index];
            let (sel_start, sel_end) = block_range(start, end, block_index, block.text_len());
            let (_, middle, _) = split_three_way(&block.runs, sel_start, sel_end);
            if middle.iter().any(|r| r.title.as_deref() != Some(title)) {
                return false;
            }
        }
        true
    }

    /// Rewrite the title of every run overlapping the selection, splitting
    /// partially covered runs first.
    fn map_selection_titles(
        &mut self,
        start: DocumentPosition,
        end: DocumentPosition,
        map: impl Fn(&mut Option<String>),
    ) {
        for block_index in start.block..=end.block {
            let block = &mut self.document.blocks_mut()[block_index];
            let (sel_start, sel_end) = block_range(start, end, block_index, block.text_len());
            let (before, mut middle, after) = split_three_way(&block.runs, sel_start, sel_end);
            for run in &mut middle {
                map(&mut run.title);
            }
            block.runs = before
                .into_iter()
                .chain(middle)
                .chain(after)
                .collect();
            block.normalize();
        }
    }

    /// Insert plain text at a position. Inserting strictly inside a run
    /// inherits its style and title; inserting at a run boundary stays
    /// plain and extends no annotation.
    pub fn insert_text(&mut self, pos: DocumentPosition, text: &str) {
        if text.is_empty() {
            return;
        }
        let pos = self.document.clamp_position(pos);
        let block = &mut self.document.blocks_mut()[pos.block];
        let mut acc = 0;
        let mut boundary_index = block.runs.len();
        let mut inserted = false;
        for (i, run) in block.runs.iter_mut().enumerate() {
            let len = run.len();
            if pos.offset == acc {
                boundary_index = i;
                break;
            }
            if pos.offset < acc + len {
                let at = byte_index(&run.text, pos.offset - acc);
                run.text.insert_str(at, text);
                inserted = true;
                break;
            }
            acc += len;
        }
        if !inserted {
            block
                .runs
                .insert(boundary_index, TextRun::plain(text));
        }
        block.normalize();
        self.clamp_selection();
        self.emit_update();
    }

    /// Delete a range. Partially covered annotated runs split, so the
    /// surviving ends keep their title. Deleting across blocks merges the
    /// remainders into the start block.
    pub fn delete_range(&mut self, start: DocumentPosition, end: DocumentPosition) {
        let start = self.document.clamp_position(start);
        let end = self.document.clamp_position(end);
        let (start, end) = if start <= end { (start, end) } else { (end, start) };
        if start == end {
            return;
        }
        if start.block == end.block {
            let block = &mut self.document.blocks_mut()[start.block];
            let (before, _, after) = split_three_way(&block.runs, start.offset, end.offset);
            block.runs = before.into_iter().chain(after).collect();
            block.normalize();
        } else {
            let blocks = self.document.blocks_mut();
            let tail = {
                let end_block = &blocks[end.block];
                let (_, _, after) = split_three_way(&end_block.runs, 0, end.offset);
                after
            };
            let start_block = &mut blocks[start.block];
            let (before, _, _) =
                split_three_way(&start_block.runs, start.offset, start_block.text_len());
            start_block.runs = before.into_iter().chain(tail).collect();
            start_block.normalize();
            blocks.drain(start.block + 1..=end.block);
        }
        self.selection = Some((start, start));
        self.emit_update();
    }

    fn clamp_selection(&mut self) {
        if let Some((a, b)) = self.selection {
            self.selection = Some((
                self.document.clamp_position(a),
                self.document.clamp_position(b),
            ));
        }
    }
}

/// The part of a block-spanning selection that falls inside block
/// `block_index`, as character offsets local to that block.
fn block_range(
    start: DocumentPosition,
    end: DocumentPosition,
    block_index: usize,
    block_len: usize,
) -> (usize, usize) {
    let sel_start = if block_index == start.block { start.offset } else { 0 };
    let sel_end = if block_index == end.block { end.offset } else { block_len };
    (sel_start, sel_end.min(block_len))
}

/// Split runs into the parts before, inside, and after `[start, end)`,
/// cutting partially covered runs at the range edges.
fn split_three_way(
    runs: &[TextRun],
    start: usize,
    end: usize,
) -> (Vec<TextRun>, Vec<TextRun>, Vec<TextRun>) {
    let mut before = Vec::new();
    let mut middle = Vec::new();
    let mut after = Vec::new();
    let mut pos = 0;
    for run in runs {
        let len = run.len();
        let run_start = pos;
        let run_end = pos + len;
        pos = run_end;
        if run_end <= start {
            before.push(run.clone());
        } else if run_start >= end {
            after.push(run.clone());
        } else {
            let lo = start.saturating_sub(run_start);
            let hi = (end - run_start).min(len);
            let (head, rest) = run.split_at(lo);
            let (mid, tail) = rest.split_at(hi - lo);
            if !head.is_empty() {
                before.push(head);
            }
            if !mid.is_empty() {
                middle.push(mid);
            }
            if !tail.is_empty() {
                after.push(tail);
            }
        }
    }
    (before, middle, after)
}
