// Title Annotation Mark
// The annotation's outward surface: rendering options, the modal-opening
// command, and the wiring that routes a modal save back into the editor.
// The editor commands themselves (set/toggle/unset/save) live on
// `richtext::editor::Editor`; this module composes them with the modal.

use std::rc::Rc;

use crate::error::EditError;
use crate::modal::TitleModal;
use crate::richtext::convert;
use crate::richtext::document::Document;
use crate::richtext::editor::{Editor, SharedEditor};

/// The attribute that carries the annotation in serialized HTML.
pub const TITLE_ATTRIBUTE: &str = "data-title";

/// Rendering options for the annotation wrapper.
#[derive(Debug, Clone, Default)]
pub struct TitleMarkOptions {
    /// Extra attributes for every `<span data-title>` wrapper, e.g. a
    /// class hosts style against. `data-title` itself cannot be shadowed.
    pub html_attributes: Vec<(String, String)>,
}

/// Render a document with the annotation wrapper configured by `options`.
pub fn render_html(document: &Document, options: &TitleMarkOptions) -> String {
    convert::document_to_html_with_attrs(document, &options.html_attributes)
}

/// Open the title modal for the current selection: blocked without a
/// selection, prefilled with the first annotated value inside it.
pub fn open_title_modal(editor: &Editor, modal: &TitleModal) -> Result<(), EditError> {
    if !editor.has_selection() {
        return Err(EditError::SelectionRequired);
    }
    let current = editor.title_attributes().unwrap_or_default();
    modal.open(&current);
    Ok(())
}

/// Wire the modal's save button to the editor's `save_title` command.
/// Replaces whatever handler the modal had.
pub fn attach_modal(editor: &SharedEditor, modal: &TitleModal) {
    let editor = Rc::clone(editor);
    modal.set_save_handler(move |title| {
        if let Err(err) = editor.borrow_mut().save_title(&title) {
            tracing::warn!(%err, "title not saved");
        }
    });
}
