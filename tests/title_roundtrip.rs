// End-to-end tests for the title annotation flow: editor commands, the
// modal round trip, and HTML serialization.

use proptest::prelude::*;

use titlemark::modal::TitleModal;
use titlemark::richtext::convert::{document_to_html, html_to_document};
use titlemark::richtext::document::{Document, DocumentPosition};
use titlemark::richtext::editor::Editor;
use titlemark::title_mark::{attach_modal, open_title_modal};

fn editor_with_selection(text: &str, start: usize, end: usize) -> Editor {
    let mut editor = Editor::new(Document::with_paragraph(text));
    editor.set_selection(
        DocumentPosition::new(0, start),
        DocumentPosition::new(0, end),
    );
    editor
}

#[test]
fn test_set_title_produces_annotated_span() {
    let mut editor = editor_with_selection("Hello World!", 0, 5);
    editor.set_title("Greeting").unwrap();
    assert_eq!(
        document_to_html(editor.document()),
        r#"<p><span data-title="Greeting">Hello</span> World!</p>"#
    );
}

#[test]
fn test_loaded_html_reports_active_title() {
    let mut editor = Editor::from_html(r#"<p><span data-title="Greeting">Hello</span> World!</p>"#);
    editor.set_selection(DocumentPosition::new(0, 1), DocumentPosition::new(0, 4));
    assert!(editor.title_active());
    assert_eq!(editor.title_attributes().as_deref(), Some("Greeting"));
}

#[test]
fn test_empty_set_title_clears_annotation() {
    let mut editor = Editor::from_html(r#"<p><span data-title="Greeting">Hello</span> World!</p>"#);
    editor.set_selection(DocumentPosition::new(0, 0), DocumentPosition::new(0, 5));
    editor.set_title("").unwrap();
    assert!(!editor.title_active());
    assert_eq!(editor.to_html(), "<p>Hello World!</p>");
}

#[test]
fn test_clearing_routes_are_equivalent() {
    let routes: [&dyn Fn(&mut Editor); 3] = [
        &|editor| editor.save_title("").unwrap(),
        &|editor| editor.save_title("   ").unwrap(),
        &|editor| editor.unset_title(),
    ];
    for clear in routes {
        // Annotation present: every route removes it
        let mut editor = editor_with_selection("Hello", 0, 5);
        editor.set_title("Greeting").unwrap();
        clear(&mut editor);
        assert!(!editor.title_active());
        assert_eq!(document_to_html(editor.document()), "<p>Hello</p>");

        // Annotation absent: every route is a no-op
        let mut editor = editor_with_selection("Hello", 0, 5);
        clear(&mut editor);
        assert!(!editor.title_active());
        assert_eq!(document_to_html(editor.document()), "<p>Hello</p>");
    }
}

#[test]
fn test_toggle_twice_restores_original_state() {
    // Starting without a mark
    let mut editor = editor_with_selection("Hello", 0, 5);
    editor.toggle_title("X").unwrap();
    assert!(editor.title_active());
    editor.toggle_title("X").unwrap();
    assert!(!editor.title_active());
    assert_eq!(document_to_html(editor.document()), "<p>Hello</p>");

    // Starting with the mark fully covering the selection
    let mut editor = editor_with_selection("Hello", 0, 5);
    editor.set_title("X").unwrap();
    editor.toggle_title("X").unwrap();
    assert!(!editor.title_active());
    editor.toggle_title("X").unwrap();
    assert_eq!(
        document_to_html(editor.document()),
        r#"<p><span data-title="X">Hello</span></p>"#
    );
}

#[test]
fn test_toggle_with_different_value_reapplies() {
    let mut editor = editor_with_selection("Hello", 0, 5);
    editor.set_title("old").unwrap();
    editor.toggle_title("new").unwrap();
    assert_eq!(editor.title_attributes().as_deref(), Some("new"));
}

#[test]
fn test_modal_add_flow() {
    let editor = Editor::shared(Document::with_paragraph("Hello World!"));
    let modal = TitleModal::new();
    attach_modal(&editor, &modal);

    editor
        .borrow_mut()
        .set_selection(DocumentPosition::new(0, 0), DocumentPosition::new(0, 5));
    open_title_modal(&editor.borrow(), &modal).unwrap();
    assert_eq!(modal.heading(), "Add Title");
    assert_eq!(modal.save_label(), "Add Title");

    modal.set_input("  Greeting  ");
    modal.save();

    assert!(!modal.is_open());
    assert_eq!(
        document_to_html(editor.borrow().document()),
        r#"<p><span data-title="Greeting">Hello</span> World!</p>"#
    );
}

#[test]
fn test_modal_edit_flow() {
    let editor = Editor::shared(Document::with_paragraph("Hello World!"));
    let modal = TitleModal::new();
    attach_modal(&editor, &modal);

    editor
        .borrow_mut()
        .set_selection(DocumentPosition::new(0, 0), DocumentPosition::new(0, 5));
    editor.borrow_mut().set_title("Greeting").unwrap();

    open_title_modal(&editor.borrow(), &modal).unwrap();
    assert_eq!(modal.heading(), "Edit Title");
    assert_eq!(modal.input(), "Greeting");

    modal.set_input("Salutation");
    assert_eq!(modal.save_label(), "Update Title");
    modal.save();

    assert_eq!(
        document_to_html(editor.borrow().document()),
        r#"<p><span data-title="Salutation">Hello</span> World!</p>"#
    );
}

#[test]
fn test_modal_remove_flow() {
    let editor = Editor::shared(Document::with_paragraph("Hello World!"));
    let modal = TitleModal::new();
    attach_modal(&editor, &modal);

    editor
        .borrow_mut()
        .set_selection(DocumentPosition::new(0, 0), DocumentPosition::new(0, 5));
    editor.borrow_mut().set_title("Greeting").unwrap();

    open_title_modal(&editor.borrow(), &modal).unwrap();
    modal.set_input("   ");
    assert_eq!(modal.save_label(), "Remove Title");
    modal.save();

    assert_eq!(
        document_to_html(editor.borrow().document()),
        "<p>Hello World!</p>"
    );
}

#[test]
fn test_set_title_spans_blocks_without_leaking_tags() {
    let mut editor = Editor::from_html("<p>one two</p>\n<p>three four</p>");
    editor.set_selection(DocumentPosition::new(0, 4), DocumentPosition::new(1, 5));
    editor.set_title("both").unwrap();
    assert_eq!(
        document_to_html(editor.document()),
        "<p>one <span data-title=\"both\">two</span></p>\n<p><span data-title=\"both\">three</span> four</p>"
    );
}

#[test]
fn test_deleting_annotated_text_drops_annotation() {
    let mut editor = editor_with_selection("Hello World!", 0, 5);
    editor.set_title("Greeting").unwrap();
    editor.delete_range(DocumentPosition::new(0, 0), DocumentPosition::new(0, 5));
    let html = document_to_html(editor.document());
    assert_eq!(html, "<p> World!</p>");
    assert!(!html.contains("data-title"));
}

#[test]
fn test_styled_annotation_roundtrip() {
    let html = r#"<p><span data-title="mixed"><strong>bo</strong>ld</span> tail</p>"#;
    let document = html_to_document(html);
    assert_eq!(document_to_html(&document), html);
}

proptest! {
    #[test]
    fn title_value_survives_html_roundtrip(
        title in any::<String>().prop_filter("empty means clear", |t| !t.is_empty()),
    ) {
        let mut editor = editor_with_selection("payload", 0, 7);
        editor.set_title(&title).unwrap();
        let reloaded = html_to_document(&document_to_html(editor.document()));

        let mut editor = Editor::new(reloaded);
        editor.set_selection(DocumentPosition::new(0, 0), DocumentPosition::new(0, 7));
        prop_assert_eq!(editor.title_attributes(), Some(title));
    }

    #[test]
    fn arbitrary_selections_never_corrupt_text(
        start in 0..30usize,
        end in 0..30usize,
        title in "[a-z]{1,8}",
    ) {
        let text = "Hello, World! 👋 annotated";
        let mut editor = Editor::new(Document::with_paragraph(text));
        editor.set_selection(DocumentPosition::new(0, start), DocumentPosition::new(0, end));
        let _ = editor.set_title(&title);
        let reloaded = html_to_document(&document_to_html(editor.document()));
        prop_assert_eq!(reloaded.to_plain_text(), text);
    }
}
