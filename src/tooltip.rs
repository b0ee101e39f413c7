// Tooltip Lifecycle Manager
// Keeps one hidden hover widget per annotated element inside registered
// containers, and keeps that set current as the tree changes underneath.
// Widget scaffolding always hangs off the document root, never inside a
// watched container, so a rescan settles instead of feeding itself.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::dom::{Dom, NodeId, ObserveOptions, ObserverId};
use crate::title_mark::TITLE_ATTRIBUTE;

/// Marks every widget root element this manager creates.
pub const TOOLTIP_ROOT_ATTRIBUTE: &str = "data-tooltip-root";

/// Selector fallback used by [`TooltipManager::update_all_tooltips`].
pub const DEFAULT_RENDERED_SELECTOR: &str = "[data-rendered-html]";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Placement {
    Top,
    Bottom,
    Left,
    Right,
}

impl Placement {
    fn as_str(self) -> &'static str {
        match self {
            Placement::Top => "top",
            Placement::Bottom => "bottom",
            Placement::Left => "left",
            Placement::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TooltipTrigger {
    PointerEnter,
    Click,
    Manual,
}

/// Appearance and behavior of created widgets. Every field has the
/// upstream default, so hosts override only what they care about, in code
/// or in a config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct TooltipOptions {
    pub placement: Placement,
    pub arrow: bool,
    pub theme: String,
    pub animation: String,
    /// Show and hide durations in milliseconds.
    pub duration: (u64, u64),
    pub interactive: bool,
    pub z_index: u32,
    pub trigger: TooltipTrigger,
    pub hide_on_click: bool,
}

impl Default for TooltipOptions {
    fn default() -> Self {
        TooltipOptions {
            placement: Placement::Top,
            arrow: true,
            theme: "light-border".to_string(),
            animation: "scale".to_string(),
            duration: (200, 150),
            interactive: true,
            z_index: 9999,
            trigger: TooltipTrigger::PointerEnter,
            hide_on_click: true,
        }
    }
}

/// Subscription target: an element you already hold, or a selector
/// resolved against the document root.
#[derive(Debug, Clone, Copy)]
pub enum TooltipTarget<'a> {
    Element(NodeId),
    Selector(&'a str),
}

impl From<NodeId> for TooltipTarget<'_> {
    fn from(id: NodeId) -> Self {
        TooltipTarget::Element(id)
    }
}

impl<'a> From<&'a str> for TooltipTarget<'a> {
    fn from(selector: &'a str) -> Self {
        TooltipTarget::Selector(selector)
    }
}

struct Widget {
    root: NodeId,
    options: TooltipOptions,
    visible: bool,
}

#[derive(Default)]
struct ManagerState {
    /// Annotated element -> its widget. At most one widget per element.
    widgets: HashMap<NodeId, Widget>,
    /// Widget root element -> annotated element, for tracing a root found
    /// in a cleanup scan back to its widget.
    roots: HashMap<NodeId, NodeId>,
    /// Watched container -> its observer.
    subscriptions: HashMap<NodeId, ObserverId>,
}

/// Cheap-clone handle over the shared widget registry. All operations
/// take the [`Dom`] they act on.
#[derive(Clone, Default)]
pub struct TooltipManager {
    inner: Rc<RefCell<ManagerState>>,
}

impl TooltipManager {
    pub fn new() -> Self {
        TooltipManager::default()
    }

    /// Rebuild the widgets for `container`: clean up whatever is there,
    /// then create one hidden widget per descendant carrying a non-empty
    /// `data-title`.
    pub fn init_tooltips(&self, dom: &Dom, container: NodeId, options: &TooltipOptions) {
        if !dom.exists(container) {
            return;
        }
        let _scope = dom.mutation_scope();
        self.cleanup_tooltips(dom, container);
        for element in dom.query_selector_all(container, &format!("[{TITLE_ATTRIBUTE}]")) {
            let Some(title) = dom.attribute(element, TITLE_ATTRIBUTE) else {
                continue;
            };
            if title.is_empty() {
                continue;
            }
            self.create_widget(dom, element, &title, options.clone());
        }
    }

    /// Destroy every widget belonging to `container`: widget roots found
    /// inside it, tracked widgets whose element sits inside it, and
    /// tracked widgets whose element no longer exists at all.
    pub fn cleanup_tooltips(&self, dom: &Dom, container: NodeId) {
        let _scope = dom.mutation_scope();
        for root in dom.query_selector_all(container, &format!("[{TOOLTIP_ROOT_ATTRIBUTE}]")) {
            let element = self.inner.borrow().roots.get(&root).copied();
            match element {
                Some(element) => self.destroy_widget(dom, element),
                None => {
                    // Widget markup that came in with content, not from us
                    tracing::debug!(root, "removing foreign tooltip root");
                    dom.remove_node(root);
                }
            }
        }
        let stale: Vec<NodeId> = self
            .inner
            .borrow()
            .widgets
            .keys()
            .copied()
            .filter(|&element| !dom.exists(element) || dom.contains(container, element))
            .collect();
        for element in stale {
            self.destroy_widget(dom, element);
        }
    }

    /// Destroy every widget everywhere. Subscriptions stay.
    pub fn cleanup_all(&self, dom: &Dom) {
        let _scope = dom.mutation_scope();
        let roots: Vec<NodeId> = {
            let mut inner = self.inner.borrow_mut();
            inner.roots.clear();
            inner.widgets.drain().map(|(_, w)| w.root).collect()
        };
        for root in roots {
            dom.remove_node(root);
        }
    }

    /// Create a widget for one element, replacing any widget it already
    /// has. Returns the widget root, or `None` for a dead element.
    pub fn create_tooltip(
        &self,
        dom: &Dom,
        element: NodeId,
        content: &str,
        options: &TooltipOptions,
    ) -> Option<NodeId> {
        if !dom.exists(element) {
            tracing::warn!(element, "tooltip target does not exist");
            return None;
        }
        let _scope = dom.mutation_scope();
        Some(self.create_widget(dom, element, content, options.clone()))
    }

    /// Rebuild the editor's widgets plus those of the rendered-output
    /// section the selector finds (`[data-rendered-html]` by default).
    pub fn update_all_tooltips(
        &self,
        dom: &Dom,
        editor_element: NodeId,
        rendered_selector: Option<&str>,
        options: &TooltipOptions,
    ) {
        self.init_tooltips(dom, editor_element, options);
        let selector = rendered_selector.unwrap_or(DEFAULT_RENDERED_SELECTOR);
        if let Some(rendered) = dom.query_selector(dom.root(), selector) {
            self.init_tooltips(dom, rendered, options);
        }
    }

    /// Keep a container's widgets current: build them now and rebuild on
    /// every change to its subtree or its `data-title` attributes.
    /// Replaces any prior subscription on the same element and returns
    /// the resolved element, which `unsubscribe` takes back.
    pub fn subscribe<'a>(
        &self,
        dom: &Dom,
        target: impl Into<TooltipTarget<'a>>,
        options: &TooltipOptions,
    ) -> Option<NodeId> {
        let element = match target.into() {
            TooltipTarget::Element(id) => dom.exists(id).then_some(id),
            TooltipTarget::Selector(selector) => dom.query_selector(dom.root(), selector),
        };
        let Some(element) = element else {
            tracing::warn!("subscribe: target element not found");
            return None;
        };
        if element == dom.root() {
            // Widget scaffolding lives under the root; watching it would
            // make the manager chase its own mutations
            tracing::warn!("subscribe: refusing to watch the document root");
            return None;
        }
        self.unsubscribe(dom, element);
        self.init_tooltips(dom, element, options);

        let manager = self.clone();
        let options = options.clone();
        let observer = dom.observe(
            element,
            ObserveOptions {
                child_list: true,
                subtree: true,
                attributes: true,
                attribute_filter: Some(vec![TITLE_ATTRIBUTE.to_string()]),
            },
            move |dom, _records| {
                manager.init_tooltips(dom, element, &options);
            },
        );
        self.inner.borrow_mut().subscriptions.insert(element, observer);
        tracing::debug!(element, "tooltip subscription installed");
        Some(element)
    }

    /// Stop watching a container. Its widgets stay until the next cleanup.
    /// Unknown targets are a silent no-op.
    pub fn unsubscribe<'a>(&self, dom: &Dom, target: impl Into<TooltipTarget<'a>>) {
        let element = match target.into() {
            // No existence check: a removed container still needs its
            // subscription dropped
            TooltipTarget::Element(id) => Some(id),
            TooltipTarget::Selector(selector) => dom.query_selector(dom.root(), selector),
        };
        let Some(element) = element else {
            return;
        };
        let observer = self.inner.borrow_mut().subscriptions.remove(&element);
        if let Some(observer) = observer {
            dom.disconnect(observer);
        }
    }

    pub fn unsubscribe_all(&self, dom: &Dom) {
        let observers: Vec<ObserverId> = self
            .inner
            .borrow_mut()
            .subscriptions
            .drain()
            .map(|(_, observer)| observer)
            .collect();
        for observer in observers {
            dom.disconnect(observer);
        }
    }

    pub fn is_subscribed(&self, element: NodeId) -> bool {
        self.inner.borrow().subscriptions.contains_key(&element)
    }

    /// The widget root for an element, if one exists.
    pub fn widget_root(&self, element: NodeId) -> Option<NodeId> {
        self.inner.borrow().widgets.get(&element).map(|w| w.root)
    }

    /// Elements that currently have a widget, in id order.
    pub fn annotated_elements(&self) -> Vec<NodeId> {
        let mut elements: Vec<NodeId> = self.inner.borrow().widgets.keys().copied().collect();
        elements.sort_unstable();
        elements
    }

    pub fn widget_count(&self) -> usize {
        self.inner.borrow().widgets.len()
    }

    pub fn is_visible(&self, element: NodeId) -> bool {
        self.inner
            .borrow()
            .widgets
            .get(&element)
            .is_some_and(|w| w.visible)
    }

    /// Show an element's widget regardless of its trigger.
    pub fn show(&self, dom: &Dom, element: NodeId) {
        self.set_visible(dom, element, true);
    }

    /// Hide an element's widget.
    pub fn hide(&self, dom: &Dom, element: NodeId) {
        self.set_visible(dom, element, false);
    }

    /// Host-reported pointer entry over an annotated element.
    pub fn pointer_enter(&self, dom: &Dom, element: NodeId) {
        let trigger = self
            .inner
            .borrow()
            .widgets
            .get(&element)
            .map(|w| w.options.trigger);
        if trigger == Some(TooltipTrigger::PointerEnter) {
            self.show(dom, element);
        }
    }

    /// Host-reported pointer exit. An interactive widget survives the
    /// pointer moving into its own root; everything else hides.
    pub fn pointer_leave(&self, dom: &Dom, element: NodeId, to: Option<NodeId>) {
        let info = self
            .inner
            .borrow()
            .widgets
            .get(&element)
            .map(|w| (w.root, w.options.interactive));
        let Some((root, interactive)) = info else {
            return;
        };
        if interactive && to.is_some_and(|to| dom.contains(root, to)) {
            return;
        }
        self.hide(dom, element);
    }

    /// Host-reported click on `element`. Toggles a click-triggered widget
    /// on that element, then hides every visible hide-on-click widget the
    /// click did not land inside.
    pub fn click(&self, dom: &Dom, element: NodeId) {
        let mut toggled = None;
        let info = self
            .inner
            .borrow()
            .widgets
            .get(&element)
            .map(|w| (w.options.trigger, w.visible));
        if let Some((TooltipTrigger::Click, visible)) = info {
            toggled = Some(element);
            self.set_visible(dom, element, !visible);
        }
        let to_hide: Vec<NodeId> = self
            .inner
            .borrow()
            .widgets
            .iter()
            .filter(|&(&target, ref w)| {
                w.visible
                    && w.options.hide_on_click
                    && Some(target) != toggled
                    && !dom.contains(w.root, element)
            })
            .map(|(&target, _)| target)
            .collect();
        for target in to_hide {
            self.hide(dom, target);
        }
    }

    fn set_visible(&self, dom: &Dom, element: NodeId, visible: bool) {
        let root = {
            let mut inner = self.inner.borrow_mut();
            let Some(widget) = inner.widgets.get_mut(&element) else {
                return;
            };
            widget.visible = visible;
            widget.root
        };
        dom.set_attribute(root, "data-state", if visible { "visible" } else { "hidden" });
    }

    fn create_widget(
        &self,
        dom: &Dom,
        element: NodeId,
        content: &str,
        options: TooltipOptions,
    ) -> NodeId {
        self.destroy_widget(dom, element);
        let root = build_widget_root(dom, content, &options);
        let mut inner = self.inner.borrow_mut();
        inner.roots.insert(root, element);
        inner.widgets.insert(
            element,
            Widget {
                root,
                options,
                visible: false,
            },
        );
        root
    }

    fn destroy_widget(&self, dom: &Dom, element: NodeId) {
        let root = {
            let mut inner = self.inner.borrow_mut();
            let Some(widget) = inner.widgets.remove(&element) else {
                return;
            };
            inner.roots.remove(&widget.root);
            widget.root
        };
        dom.remove_node(root);
    }
}

/// Build the hidden widget scaffolding under the document root.
fn build_widget_root(dom: &Dom, content: &str, options: &TooltipOptions) -> NodeId {
    let root = dom.create_element("div");
    dom.set_attribute(root, TOOLTIP_ROOT_ATTRIBUTE, "");
    dom.set_attribute(root, "data-state", "hidden");
    dom.set_attribute(root, "data-theme", &options.theme);
    dom.set_attribute(root, "data-placement", options.placement.as_str());
    dom.set_attribute(root, "data-animation", &options.animation);
    dom.set_attribute(
        root,
        "data-duration",
        &format!("{},{}", options.duration.0, options.duration.1),
    );
    dom.set_attribute(root, "style", &format!("z-index: {};", options.z_index));

    let body = dom.create_element("div");
    dom.set_attribute(body, "data-tooltip-content", "");
    let text = dom.create_text(content);
    dom.append_child(body, text);
    dom.append_child(root, body);
    if options.arrow {
        let arrow = dom.create_element("div");
        dom.set_attribute(arrow, "data-tooltip-arrow", "");
        dom.append_child(root, arrow);
    }
    dom.append_child(dom.root(), root);
    root
}
