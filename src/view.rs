// Editor View Binding
// Mirrors an editor's document into a container element, so mutation
// observers on that container (tooltip subscriptions in particular) see
// every command's outcome. Also renders saved HTML snapshots into static
// sections the way the annotation expects.

use std::rc::Rc;

use crate::dom::{Dom, NodeId};
use crate::richtext::convert;
use crate::richtext::editor::SharedEditor;
use crate::title_mark::{self, TitleMarkOptions};
use crate::tooltip::{TooltipManager, TooltipOptions};

/// Keeps a container element in sync with an editor's document.
pub struct EditorView {
    dom: Dom,
    editor: SharedEditor,
    container: NodeId,
    options: TitleMarkOptions,
}

impl EditorView {
    /// Render the current document into `container` and re-render after
    /// every editor update from here on.
    pub fn mount(
        dom: &Dom,
        editor: &SharedEditor,
        container: NodeId,
        options: TitleMarkOptions,
    ) -> Self {
        let view = EditorView {
            dom: dom.clone(),
            editor: Rc::clone(editor),
            container,
            options: options.clone(),
        };
        view.render();
        let dom_updates = dom.clone();
        editor.borrow_mut().on_update(move |document| {
            dom_updates.set_inner_html(container, &title_mark::render_html(document, &options));
        });
        view
    }

    pub fn container(&self) -> NodeId {
        self.container
    }

    /// Force a render of the current document state.
    pub fn render(&self) {
        self.dom.set_inner_html(
            self.container,
            &title_mark::render_html(self.editor.borrow().document(), &self.options),
        );
    }

    /// Replace the editor's document with the parse of `html`.
    pub fn set_html(&self, html: &str) {
        self.editor
            .borrow_mut()
            .set_document(convert::html_to_document(html));
    }

    /// Serialized content of the container.
    pub fn html(&self) -> String {
        self.dom.inner_html(self.container)
    }
}

/// Put a saved HTML snapshot into a static section and build its
/// tooltips, the flow a read-only rendering of annotated content uses.
pub fn render_saved_content(
    dom: &Dom,
    manager: &TooltipManager,
    target: NodeId,
    html: &str,
    options: &TooltipOptions,
) {
    dom.set_inner_html(target, html);
    manager.init_tooltips(dom, target, options);
}
