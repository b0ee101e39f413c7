// Element Tree
// An arena-backed element tree with subtree queries, HTML in/out, and a
// mutation observation facility. Stands in for the host document so tooltip
// lifecycles can key off element identity and react to content changes.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;

use crate::html::{self, HtmlToken};

/// Identity of a node. Ids are stable and never reused, so a stale id from a
/// removed subtree can never alias a live node.
pub type NodeId = usize;

/// Identity of a registered mutation observer.
pub type ObserverId = usize;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeData {
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
}

/// What a mutation observer wants to hear about.
#[derive(Debug, Clone, Default)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
    pub attributes: bool,
    /// When set, only these attribute names are reported.
    pub attribute_filter: Option<Vec<String>>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MutationKind {
    ChildList,
    Attributes { name: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationRecord {
    pub target: NodeId,
    pub kind: MutationKind,
}

type ObserverCallback = dyn FnMut(&Dom, &[MutationRecord]);

struct Observer {
    target: NodeId,
    options: ObserveOptions,
    callback: Rc<RefCell<ObserverCallback>>,
    queue: Vec<MutationRecord>,
}

struct DomInner {
    nodes: HashMap<NodeId, Node>,
    root: NodeId,
    next_node_id: NodeId,
    // BTreeMap so delivery order follows registration order
    observers: BTreeMap<ObserverId, Observer>,
    next_observer_id: ObserverId,
    suspend: usize,
    delivering: bool,
}

/// Shared handle to an element tree. Cloning is cheap and every clone sees
/// the same tree.
///
/// Mutation records queue per observer and are delivered when the outermost
/// mutating call returns: a plain mutation delivers right away, while a
/// [`MutationScope`] holds delivery back so a compound operation lands as a
/// single batch. Single-threaded by construction.
#[derive(Clone)]
pub struct Dom {
    inner: Rc<RefCell<DomInner>>,
}

impl Dom {
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            0,
            Node {
                parent: None,
                children: Vec::new(),
                data: NodeData::Element {
                    tag: "body".to_string(),
                    attrs: Vec::new(),
                },
            },
        );
        Dom {
            inner: Rc::new(RefCell::new(DomInner {
                nodes,
                root: 0,
                next_node_id: 1,
                observers: BTreeMap::new(),
                next_observer_id: 1,
                suspend: 0,
                delivering: false,
            })),
        }
    }

    /// The document root element.
    pub fn root(&self) -> NodeId {
        self.inner.borrow().root
    }

    /// Create a detached element.
    pub fn create_element(&self, tag: &str) -> NodeId {
        self.inner.borrow_mut().alloc(NodeData::Element {
            tag: tag.to_ascii_lowercase(),
            attrs: Vec::new(),
        })
    }

    /// Create a detached text node.
    pub fn create_text(&self, text: &str) -> NodeId {
        self.inner
            .borrow_mut()
            .alloc(NodeData::Text(text.to_string()))
    }

    pub fn exists(&self, node: NodeId) -> bool {
        self.inner.borrow().nodes.contains_key(&node)
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.inner.borrow().nodes.get(&node)?.parent
    }

    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.inner
            .borrow()
            .nodes
            .get(&node)
            .map(|n| n.children.clone())
            .unwrap_or_default()
    }

    pub fn tag_name(&self, node: NodeId) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.data {
            NodeData::Element { tag, .. } => Some(tag.clone()),
            NodeData::Text(_) => None,
        }
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        match &self.inner.borrow().nodes.get(&node)?.data {
            NodeData::Element { attrs, .. } => attrs
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| v.clone()),
            NodeData::Text(_) => None,
        }
    }

    pub fn attributes(&self, node: NodeId) -> Vec<(String, String)> {
        match self.inner.borrow().nodes.get(&node).map(|n| &n.data) {
            Some(NodeData::Element { attrs, .. }) => attrs.clone(),
            _ => Vec::new(),
        }
    }

    /// Concatenated text of the node's subtree.
    pub fn text_content(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        collect_text(&inner.nodes, node, &mut out);
        out
    }

    /// True when `node` is `ancestor` or sits below it.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        contains_in(&self.inner.borrow().nodes, ancestor, node)
    }

    /// Set or replace an attribute.
    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) {
        let name = name.to_ascii_lowercase();
        {
            let mut inner = self.inner.borrow_mut();
            let Some(n) = inner.nodes.get_mut(&node) else {
                return;
            };
            let NodeData::Element { attrs, .. } = &mut n.data else {
                return;
            };
            if let Some(entry) = attrs.iter_mut().find(|(n, _)| *n == name) {
                entry.1 = value.to_string();
            } else {
                attrs.push((name.clone(), value.to_string()));
            }
            inner.enqueue(MutationRecord {
                target: node,
                kind: MutationKind::Attributes { name },
            });
        }
        self.deliver_pending();
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) {
        let name = name.to_ascii_lowercase();
        {
            let mut inner = self.inner.borrow_mut();
            let Some(n) = inner.nodes.get_mut(&node) else {
                return;
            };
            let NodeData::Element { attrs, .. } = &mut n.data else {
                return;
            };
            let before = attrs.len();
            attrs.retain(|(n, _)| *n != name);
            if attrs.len() == before {
                return;
            }
            inner.enqueue(MutationRecord {
                target: node,
                kind: MutationKind::Attributes { name },
            });
        }
        self.deliver_pending();
    }

    /// Append `child` as the last child of `parent`, detaching it from any
    /// previous parent. Appending a node into its own subtree is a no-op.
    pub fn append_child(&self, parent: NodeId, child: NodeId) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.nodes.contains_key(&parent) || !inner.nodes.contains_key(&child) {
                return;
            }
            if parent == child || contains_in(&inner.nodes, child, parent) {
                tracing::warn!(parent, child, "refusing to create a node cycle");
                return;
            }
            if let Some(old_parent) = inner.detach(child) {
                inner.enqueue(MutationRecord {
                    target: old_parent,
                    kind: MutationKind::ChildList,
                });
            }
            if let Some(p) = inner.nodes.get_mut(&parent) {
                p.children.push(child);
            }
            if let Some(c) = inner.nodes.get_mut(&child) {
                c.parent = Some(parent);
            }
            inner.enqueue(MutationRecord {
                target: parent,
                kind: MutationKind::ChildList,
            });
        }
        self.deliver_pending();
    }

    /// Remove a node and its whole subtree from the tree. The root cannot be
    /// removed. Ids of removed nodes are never handed out again.
    pub fn remove_node(&self, node: NodeId) {
        {
            let mut inner = self.inner.borrow_mut();
            if node == inner.root || !inner.nodes.contains_key(&node) {
                return;
            }
            let parent = inner.detach(node);
            inner.drop_subtree(node);
            if let Some(parent) = parent {
                inner.enqueue(MutationRecord {
                    target: parent,
                    kind: MutationKind::ChildList,
                });
            }
        }
        self.deliver_pending();
    }

    /// Replace the node's children with the parse of `html`. Counts as one
    /// child-list mutation on the node.
    pub fn set_inner_html(&self, node: NodeId, html: &str) {
        {
            let mut inner = self.inner.borrow_mut();
            if !inner.nodes.contains_key(&node) {
                return;
            }
            let old_children = inner
                .nodes
                .get(&node)
                .map(|n| n.children.clone())
                .unwrap_or_default();
            for child in old_children {
                inner.drop_subtree(child);
            }
            if let Some(n) = inner.nodes.get_mut(&node) {
                n.children.clear();
            }
            inner.build_fragment(node, html);
            inner.enqueue(MutationRecord {
                target: node,
                kind: MutationKind::ChildList,
            });
        }
        self.deliver_pending();
    }

    /// Serialize the node's children.
    pub fn inner_html(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        if let Some(n) = inner.nodes.get(&node) {
            for &child in &n.children {
                write_node(&inner.nodes, child, &mut out);
            }
        }
        out
    }

    /// Serialize the node itself, children included.
    pub fn outer_html(&self, node: NodeId) -> String {
        let inner = self.inner.borrow();
        let mut out = String::new();
        write_node(&inner.nodes, node, &mut out);
        out
    }

    /// First descendant of `from` matching the selector, in document order.
    /// Supports `#id`, `.class`, `tag`, `[attr]` and `[attr=value]`.
    pub fn query_selector(&self, from: NodeId, selector: &str) -> Option<NodeId> {
        let sel = Selector::parse(selector)?;
        let inner = self.inner.borrow();
        descendants(&inner.nodes, from)
            .into_iter()
            .find(|&id| sel.matches(&inner.nodes, id))
    }

    /// All descendants of `from` matching the selector, in document order.
    pub fn query_selector_all(&self, from: NodeId, selector: &str) -> Vec<NodeId> {
        let Some(sel) = Selector::parse(selector) else {
            return Vec::new();
        };
        let inner = self.inner.borrow();
        descendants(&inner.nodes, from)
            .into_iter()
            .filter(|&id| sel.matches(&inner.nodes, id))
            .collect()
    }

    /// Register an observer on `target`. The callback runs after the
    /// outermost mutating call completes, with every record queued for this
    /// observer since the last delivery.
    pub fn observe(
        &self,
        target: NodeId,
        options: ObserveOptions,
        callback: impl FnMut(&Dom, &[MutationRecord]) + 'static,
    ) -> ObserverId {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_observer_id;
        inner.next_observer_id += 1;
        inner.observers.insert(
            id,
            Observer {
                target,
                options,
                callback: Rc::new(RefCell::new(callback)),
                queue: Vec::new(),
            },
        );
        tracing::debug!(observer = id, target, "observer registered");
        id
    }

    /// Drop an observer. Queued records it has not seen are discarded;
    /// nothing is delivered to it afterwards.
    pub fn disconnect(&self, id: ObserverId) {
        if self.inner.borrow_mut().observers.remove(&id).is_some() {
            tracing::debug!(observer = id, "observer disconnected");
        }
    }

    /// Hold back observer delivery until the returned guard drops. Scopes
    /// nest; delivery happens when the outermost one ends.
    pub fn mutation_scope(&self) -> MutationScope {
        self.inner.borrow_mut().suspend += 1;
        MutationScope { dom: self.clone() }
    }

    /// Drain observer queues until the tree is quiescent. Re-entrant calls
    /// (from inside a callback) return immediately; the outermost drain picks
    /// up whatever the callbacks produced.
    fn deliver_pending(&self) {
        loop {
            let batches = {
                let mut inner = self.inner.borrow_mut();
                if inner.suspend > 0 || inner.delivering {
                    return;
                }
                let batches = inner.take_batches();
                if batches.is_empty() {
                    return;
                }
                inner.delivering = true;
                batches
            };
            for (observer_id, callback, records) in batches {
                // An observer disconnected by an earlier callback in this
                // batch must not hear its queued records
                if !self.inner.borrow().observers.contains_key(&observer_id) {
                    continue;
                }
                (callback.borrow_mut())(self, &records);
            }
            self.inner.borrow_mut().delivering = false;
        }
    }
}

impl Default for Dom {
    fn default() -> Self {
        Self::new()
    }
}

/// RAII guard from [`Dom::mutation_scope`].
pub struct MutationScope {
    dom: Dom,
}

impl Drop for MutationScope {
    fn drop(&mut self) {
        self.dom.inner.borrow_mut().suspend -= 1;
        self.dom.deliver_pending();
    }
}

impl DomInner {
    fn alloc(&mut self, data: NodeData) -> NodeId {
        let id = self.next_node_id;
        self.next_node_id += 1;
        self.nodes.insert(
            id,
            Node {
                parent: None,
                children: Vec::new(),
                data,
            },
        );
        id
    }

    /// Unlink `node` from its parent, returning the old parent.
    fn detach(&mut self, node: NodeId) -> Option<NodeId> {
        let parent = self.nodes.get(&node)?.parent?;
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.retain(|&c| c != node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = None;
        }
        Some(parent)
    }

    /// Delete `node` and everything below it from the arena.
    fn drop_subtree(&mut self, node: NodeId) {
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.remove(&id) {
                stack.extend(n.children);
            }
        }
    }

    /// Route a record into the queue of every observer it concerns.
    fn enqueue(&mut self, record: MutationRecord) {
        let nodes = &self.nodes;
        for observer in self.observers.values_mut() {
            if observer_wants(nodes, observer, &record) {
                observer.queue.push(record.clone());
            }
        }
    }

    fn take_batches(&mut self) -> Vec<(ObserverId, Rc<RefCell<ObserverCallback>>, Vec<MutationRecord>)> {
        self.observers
            .iter_mut()
            .filter(|(_, o)| !o.queue.is_empty())
            .map(|(&id, o)| (id, Rc::clone(&o.callback), std::mem::take(&mut o.queue)))
            .collect()
    }

    /// Parse `html` and hang the resulting nodes under `parent`.
    fn build_fragment(&mut self, parent: NodeId, html: &str) {
        let mut stack: Vec<NodeId> = vec![parent];
        for token in html::tokenize(html) {
            match token {
                HtmlToken::StartTag {
                    name,
                    attrs,
                    self_closing,
                } => {
                    let id = self.alloc(NodeData::Element {
                        tag: name.clone(),
                        attrs,
                    });
                    self.attach(*stack.last().unwrap_or(&parent), id);
                    if !self_closing && !html::is_void_element(&name) {
                        stack.push(id);
                    }
                }
                HtmlToken::EndTag(name) => {
                    // Close the innermost matching element; stray end tags
                    // are ignored. Index 0 is the container and never pops.
                    let matching = stack.iter().skip(1).rposition(|&id| {
                        matches!(
                            self.nodes.get(&id).map(|n| &n.data),
                            Some(NodeData::Element { tag, .. }) if *tag == name
                        )
                    });
                    if let Some(pos) = matching {
                        stack.truncate(pos + 1);
                    }
                }
                HtmlToken::Text(text) => {
                    let id = self.alloc(NodeData::Text(text));
                    self.attach(*stack.last().unwrap_or(&parent), id);
                }
            }
        }
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        if let Some(p) = self.nodes.get_mut(&parent) {
            p.children.push(child);
        }
        if let Some(c) = self.nodes.get_mut(&child) {
            c.parent = Some(parent);
        }
    }
}

fn observer_wants(
    nodes: &HashMap<NodeId, Node>,
    observer: &Observer,
    record: &MutationRecord,
) -> bool {
    let kind_wanted = match &record.kind {
        MutationKind::ChildList => observer.options.child_list,
        MutationKind::Attributes { name } => {
            observer.options.attributes
                && observer
                    .options
                    .attribute_filter
                    .as_ref()
                    .is_none_or(|filter| filter.iter().any(|f| f == name))
        }
    };
    if !kind_wanted {
        return false;
    }
    record.target == observer.target
        || (observer.options.subtree && contains_in(nodes, observer.target, record.target))
}

fn contains_in(nodes: &HashMap<NodeId, Node>, ancestor: NodeId, node: NodeId) -> bool {
    let mut current = Some(node);
    while let Some(id) = current {
        if id == ancestor {
            return true;
        }
        current = nodes.get(&id).and_then(|n| n.parent);
    }
    false
}

/// Pre-order walk of everything below `from`, excluding `from` itself.
fn descendants(nodes: &HashMap<NodeId, Node>, from: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack: Vec<NodeId> = nodes
        .get(&from)
        .map(|n| n.children.iter().rev().copied().collect())
        .unwrap_or_default();
    while let Some(id) = stack.pop() {
        out.push(id);
        if let Some(n) = nodes.get(&id) {
            stack.extend(n.children.iter().rev().copied());
        }
    }
    out
}

fn collect_text(nodes: &HashMap<NodeId, Node>, node: NodeId, out: &mut String) {
    let Some(n) = nodes.get(&node) else {
        return;
    };
    match &n.data {
        NodeData::Text(t) => out.push_str(t),
        NodeData::Element { .. } => {
            for &child in &n.children {
                collect_text(nodes, child, out);
            }
        }
    }
}

fn write_node(nodes: &HashMap<NodeId, Node>, node: NodeId, out: &mut String) {
    let Some(n) = nodes.get(&node) else {
        return;
    };
    match &n.data {
        NodeData::Text(t) => html::push_escaped_text(out, t),
        NodeData::Element { tag, attrs } => {
            out.push('<');
            out.push_str(tag);
            for (name, value) in attrs {
                out.push(' ');
                out.push_str(name);
                out.push_str("=\"");
                html::push_escaped_attribute(out, value);
                out.push('"');
            }
            out.push('>');
            if html::is_void_element(tag) && n.children.is_empty() {
                return;
            }
            for &child in &n.children {
                write_node(nodes, child, out);
            }
            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
    }
}

enum Selector {
    Id(String),
    Class(String),
    Tag(String),
    Attr { name: String, value: Option<String> },
}

impl Selector {
    fn parse(selector: &str) -> Option<Selector> {
        let s = selector.trim();
        if let Some(id) = s.strip_prefix('#') {
            return (!id.is_empty()).then(|| Selector::Id(id.to_string()));
        }
        if let Some(class) = s.strip_prefix('.') {
            return (!class.is_empty()).then(|| Selector::Class(class.to_string()));
        }
        if let Some(body) = s.strip_prefix('[').and_then(|r| r.strip_suffix(']')) {
            let (name, value) = match body.split_once('=') {
                Some((n, v)) => {
                    let v = v.trim().trim_matches('"').trim_matches('\'');
                    (n.trim(), Some(v.to_string()))
                }
                None => (body.trim(), None),
            };
            return (!name.is_empty()).then(|| Selector::Attr {
                name: name.to_ascii_lowercase(),
                value,
            });
        }
        if s.is_empty() || !s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return None;
        }
        Some(Selector::Tag(s.to_ascii_lowercase()))
    }

    fn matches(&self, nodes: &HashMap<NodeId, Node>, node: NodeId) -> bool {
        let Some(NodeData::Element { tag, attrs }) = nodes.get(&node).map(|n| &n.data) else {
            return false;
        };
        let attr = |name: &str| attrs.iter().find(|(n, _)| n == name).map(|(_, v)| v.as_str());
        match self {
            Selector::Id(id) => attr("id") == Some(id),
            Selector::Class(class) => attr("class")
                .is_some_and(|c| c.split_ascii_whitespace().any(|part| part == class)),
            Selector::Tag(t) => tag == t,
            Selector::Attr { name, value } => match value {
                Some(v) => attr(name) == Some(v),
                None => attr(name).is_some(),
            },
        }
    }
}
