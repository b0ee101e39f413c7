// End-to-end tests for tooltip lifecycle against a live tree: observer
// driven rescans, overlapping containers, and the saved-content flow.

use std::cell::RefCell;
use std::rc::Rc;

use titlemark::dom::{Dom, NodeId, ObserveOptions};
use titlemark::tooltip::{TOOLTIP_ROOT_ATTRIBUTE, TooltipManager, TooltipOptions};
use titlemark::view::render_saved_content;

fn container(dom: &Dom) -> NodeId {
    let el = dom.create_element("div");
    dom.append_child(dom.root(), el);
    el
}

fn annotated_span(dom: &Dom, parent: NodeId, title: &str, text: &str) -> NodeId {
    let span = dom.create_element("span");
    dom.set_attribute(span, "data-title", title);
    let content = dom.create_text(text);
    dom.append_child(span, content);
    dom.append_child(parent, span);
    span
}

fn scaffolding_count(dom: &Dom) -> usize {
    dom.query_selector_all(dom.root(), &format!("[{TOOLTIP_ROOT_ATTRIBUTE}]"))
        .len()
}

#[test]
fn test_inserted_annotated_child_gets_widget_automatically() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let watched = container(&dom);
    manager.subscribe(&dom, watched, &TooltipOptions::default());
    assert_eq!(manager.widget_count(), 0);

    // Build the element off-tree first; nothing happens until it lands
    let fresh = dom.create_element("span");
    dom.set_attribute(fresh, "data-title", "New");
    let text = dom.create_text("fresh text");
    dom.append_child(fresh, text);
    assert_eq!(manager.widget_count(), 0);

    dom.append_child(watched, fresh);
    assert_eq!(manager.widget_count(), 1);
    let root = manager.widget_root(fresh).expect("widget for inserted span");
    assert_eq!(dom.text_content(root), "New");
}

#[test]
fn test_unsubscribe_without_subscription_is_a_noop() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let never_watched = container(&dom);

    manager.unsubscribe(&dom, never_watched);
    manager.unsubscribe(&dom, "#missing");
    assert!(!manager.is_subscribed(never_watched));

    // The tree still reacts normally afterwards
    manager.subscribe(&dom, never_watched, &TooltipOptions::default());
    annotated_span(&dom, never_watched, "t", "x");
    assert_eq!(manager.widget_count(), 1);
}

#[test]
fn test_overlapping_containers_keep_one_widget_per_element() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let outer = container(&dom);
    let inner = dom.create_element("div");
    dom.append_child(outer, inner);
    let inner_span = annotated_span(&dom, inner, "in", "a");
    let outer_span = annotated_span(&dom, outer, "out", "b");

    let options = TooltipOptions::default();
    manager.init_tooltips(&dom, outer, &options);
    manager.init_tooltips(&dom, inner, &options);
    manager.init_tooltips(&dom, outer, &options);

    assert_eq!(manager.widget_count(), 2);
    assert_eq!(scaffolding_count(&dom), 2);
    let mut expected = vec![inner_span, outer_span];
    expected.sort_unstable();
    assert_eq!(manager.annotated_elements(), expected);
}

#[test]
fn test_resubscribe_replaces_observer_instead_of_stacking() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let watched = container(&dom);
    let span = annotated_span(&dom, watched, "t", "x");

    let options = TooltipOptions::default();
    manager.subscribe(&dom, watched, &options);
    manager.subscribe(&dom, watched, &options);

    // Widget scaffolding lives directly under the document root, so one
    // rescan shows up there as exactly one removal plus one insertion
    let body_changes = Rc::new(RefCell::new(0usize));
    let counter = Rc::clone(&body_changes);
    dom.observe(
        dom.root(),
        ObserveOptions {
            child_list: true,
            ..Default::default()
        },
        move |_, records| {
            *counter.borrow_mut() += records.len();
        },
    );

    dom.set_attribute(span, "data-title", "renamed");

    assert_eq!(manager.widget_count(), 1);
    assert_eq!(*body_changes.borrow(), 2);
    let root = manager.widget_root(span).expect("widget");
    assert_eq!(dom.text_content(root), "renamed");
}

#[test]
fn test_detached_container_can_still_unsubscribe() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let watched = container(&dom);
    annotated_span(&dom, watched, "t", "x");
    manager.subscribe(&dom, watched, &TooltipOptions::default());
    assert_eq!(manager.widget_count(), 1);

    dom.remove_node(watched);
    assert!(manager.is_subscribed(watched));
    manager.unsubscribe(&dom, watched);
    assert!(!manager.is_subscribed(watched));

    // The stranded widget goes with the next cleanup of any container
    let other = container(&dom);
    manager.cleanup_tooltips(&dom, other);
    assert_eq!(manager.widget_count(), 0);
    assert_eq!(scaffolding_count(&dom), 0);
}

#[test]
fn test_cleanup_all_keeps_subscriptions_live() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let watched = container(&dom);
    let span = annotated_span(&dom, watched, "t", "x");
    manager.subscribe(&dom, watched, &TooltipOptions::default());
    assert_eq!(manager.widget_count(), 1);

    manager.cleanup_all(&dom);
    assert_eq!(manager.widget_count(), 0);
    assert_eq!(scaffolding_count(&dom), 0);
    assert!(manager.is_subscribed(watched));

    dom.set_attribute(span, "data-title", "back");
    assert_eq!(manager.widget_count(), 1);
}

#[test]
fn test_render_saved_content_builds_and_sweeps_widgets() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let section = container(&dom);
    let options = TooltipOptions::default();

    render_saved_content(
        &dom,
        &manager,
        section,
        r#"<p><span data-title="Greeting">Hello</span> and <span data-title="Planet">World</span></p>"#,
        &options,
    );
    assert_eq!(manager.widget_count(), 2);
    assert_eq!(scaffolding_count(&dom), 2);

    render_saved_content(&dom, &manager, section, "<p>plain now</p>", &options);
    assert_eq!(manager.widget_count(), 0);
    assert_eq!(scaffolding_count(&dom), 0);
}

#[test]
fn test_update_all_tooltips_covers_editor_and_preview() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let editor = container(&dom);
    let preview = container(&dom);
    dom.set_attribute(preview, "data-rendered-html", "");
    annotated_span(&dom, editor, "one", "a");
    annotated_span(&dom, preview, "two", "b");

    manager.update_all_tooltips(&dom, editor, None, &TooltipOptions::default());
    assert_eq!(manager.widget_count(), 2);
}

#[test]
fn test_pointer_flow_over_subscribed_content() {
    let dom = Dom::new();
    let manager = TooltipManager::new();
    let watched = container(&dom);
    manager.subscribe(&dom, watched, &TooltipOptions::default());
    let span = annotated_span(&dom, watched, "t", "x");

    let elements = manager.annotated_elements();
    assert_eq!(elements, vec![span]);
    manager.pointer_enter(&dom, span);
    assert!(manager.is_visible(span));
    manager.pointer_leave(&dom, span, None);
    assert!(!manager.is_visible(span));
}
