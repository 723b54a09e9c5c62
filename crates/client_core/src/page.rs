use std::{collections::BTreeMap, fmt::Write as _, sync::Arc};

use shared::{domain::ValidationError, protocol::EventDescriptor};
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};

use crate::attribution::ServerEventListener;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomError {
    #[error("node {0:?} does not belong to this document")]
    UnknownNode(NodeId),
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listener {
    pub event_type: String,
    pub handler: ServerEventListener,
    pub capture: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventPhase {
    Capturing,
    AtTarget,
    Bubbling,
}

/// Per-dispatch event state, the platform-independent stand-in for a DOM event.
#[derive(Debug, Clone)]
pub struct EventState {
    event_type: String,
    target: NodeId,
    current_target: NodeId,
    attribution_target: Option<NodeId>,
    phase: EventPhase,
    propagation_stopped: bool,
    immediate_propagation_stopped: bool,
}

impl EventState {
    fn new(event_type: &str, target: NodeId) -> Self {
        Self {
            event_type: event_type.to_string(),
            target,
            current_target: target,
            attribution_target: None,
            phase: EventPhase::AtTarget,
            propagation_stopped: false,
            immediate_propagation_stopped: false,
        }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The node the physical action hit.
    pub fn target(&self) -> NodeId {
        self.target
    }

    pub fn current_target(&self) -> NodeId {
        self.current_target
    }

    /// Innermost node on the propagation path listening for this event type.
    /// Descendants without listeners are transparent to attribution.
    pub fn attribution_target(&self) -> Option<NodeId> {
        self.attribution_target
    }

    pub fn phase(&self) -> EventPhase {
        self.phase
    }

    pub fn stop_propagation(&mut self) {
        self.propagation_stopped = true;
    }

    pub fn stop_immediate_propagation(&mut self) {
        self.propagation_stopped = true;
        self.immediate_propagation_stopped = true;
    }

    pub fn propagation_stopped(&self) -> bool {
        self.propagation_stopped
    }
}

#[derive(Debug, Default)]
pub struct DispatchReport {
    /// One entry per authoritative listener, in firing order.
    pub invocations: Vec<Result<EventDescriptor, ValidationError>>,
    pub listeners_evaluated: usize,
    pub propagation_stopped: bool,
}

#[derive(Debug, Clone)]
enum NodeKind {
    Document,
    Element(ElementData),
}

#[derive(Debug, Clone)]
struct ElementData {
    tag: String,
    attributes: BTreeMap<String, String>,
    text: String,
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    listeners: Vec<Listener>,
}

impl Node {
    fn new(kind: NodeKind) -> Self {
        Self {
            parent: None,
            children: Vec::new(),
            kind,
            listeners: Vec::new(),
        }
    }
}

/// In-memory page document: a tree rooted at the document node with a single
/// `body` element, plus the page title.
///
/// Nodes live in an append-only arena. Removing or clearing detaches nodes but
/// never frees them, so a `NodeId` handed out stays valid for the lifetime of
/// the document; memory grows with every element created. Start a fresh
/// `Document` to reclaim it.
#[derive(Debug, Clone)]
pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    body: NodeId,
    title: String,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let mut document = Self {
            nodes: vec![Node::new(NodeKind::Document)],
            root: NodeId(0),
            body: NodeId(0),
            title: String::new(),
        };
        let body = document.create_element("body");
        document.nodes[body.0].parent = Some(document.root);
        document.nodes[document.root.0].children.push(body);
        document.body = body;
        document
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn body(&self) -> NodeId {
        self.body
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(NodeKind::Element(ElementData {
            tag: tag.to_ascii_lowercase(),
            attributes: BTreeMap::new(),
            text: String::new(),
        })));
        id
    }

    fn node(&self, id: NodeId) -> Result<&Node, DomError> {
        self.nodes.get(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn element(&self, id: NodeId) -> Result<&ElementData, DomError> {
        match &self.node(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Document => Err(DomError::NotAnElement(id)),
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData, DomError> {
        match &mut self.node_mut(id)?.kind {
            NodeKind::Element(data) => Ok(data),
            NodeKind::Document => Err(DomError::NotAnElement(id)),
        }
    }

    pub fn tag_name(&self, id: NodeId) -> Result<String, DomError> {
        Ok(self.element(id)?.tag.to_ascii_uppercase())
    }

    pub fn id(&self, node: NodeId) -> Option<&str> {
        self.attribute(node, "id")
    }

    pub fn set_id(&mut self, node: NodeId, value: impl Into<String>) -> Result<(), DomError> {
        self.set_attribute(node, "id", value)
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.element(node)
            .ok()
            .and_then(|data| data.attributes.get(&name.to_ascii_lowercase()))
            .map(String::as_str)
    }

    pub fn set_attribute(
        &mut self,
        node: NodeId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<(), DomError> {
        self.element_mut(node)?
            .attributes
            .insert(name.to_ascii_lowercase(), value.into());
        Ok(())
    }

    pub fn text_content(&self, node: NodeId) -> Result<String, DomError> {
        let mut text = String::new();
        self.collect_text(node, &mut text)?;
        Ok(text)
    }

    fn collect_text(&self, node: NodeId, out: &mut String) -> Result<(), DomError> {
        let current = self.node(node)?;
        if let NodeKind::Element(data) = &current.kind {
            out.push_str(&data.text);
        }
        for child in &current.children {
            self.collect_text(*child, out)?;
        }
        Ok(())
    }

    /// Replaces all children of `node` with the given text.
    pub fn set_text_content(&mut self, node: NodeId, text: impl Into<String>) -> Result<(), DomError> {
        self.element(node)?;
        self.detach_children(node)?;
        self.element_mut(node)?.text = text.into();
        Ok(())
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    pub fn children(&self, node: NodeId) -> Result<&[NodeId], DomError> {
        Ok(&self.node(node)?.children)
    }

    pub fn is_connected(&self, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == self.root {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = Some(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    fn check_insertion(&self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.node(parent)?;
        self.element(child)?;
        if self.is_inclusive_ancestor(child, parent) {
            return Err(DomError::HierarchyRequest(
                "the new child is an ancestor of the parent".to_string(),
            ));
        }
        Ok(())
    }

    fn detach(&mut self, node: NodeId) -> Result<(), DomError> {
        let Some(parent) = self.node(node)?.parent else {
            return Ok(());
        };
        self.node_mut(parent)?.children.retain(|child| *child != node);
        self.node_mut(node)?.parent = None;
        Ok(())
    }

    fn detach_children(&mut self, node: NodeId) -> Result<(), DomError> {
        let children = std::mem::take(&mut self.node_mut(node)?.children);
        for child in children {
            self.node_mut(child)?.parent = None;
        }
        Ok(())
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), DomError> {
        self.check_insertion(parent, child)?;
        self.detach(child)?;
        self.node_mut(parent)?.children.push(child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    /// Inserts `child` before `reference`, or appends when `reference` is `None`.
    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), DomError> {
        let Some(reference) = reference else {
            return self.append_child(parent, child);
        };
        if self.parent(reference) != Some(parent) {
            return Err(DomError::NotFound(
                "the reference node is not a child of the parent".to_string(),
            ));
        }
        if reference == child {
            return Ok(());
        }
        self.check_insertion(parent, child)?;
        self.detach(child)?;
        let siblings = &mut self.node_mut(parent)?.children;
        let index = siblings
            .iter()
            .position(|sibling| *sibling == reference)
            .unwrap_or(siblings.len());
        siblings.insert(index, child);
        self.node_mut(child)?.parent = Some(parent);
        Ok(())
    }

    pub fn remove(&mut self, node: NodeId) -> Result<(), DomError> {
        self.detach(node)
    }

    /// First connected element in tree order carrying the given id.
    pub fn element_by_id(&self, id: &str) -> Option<NodeId> {
        let mut stack = vec![self.root];
        while let Some(node) = stack.pop() {
            if self.id(node) == Some(id) {
                return Some(node);
            }
            if let Some(current) = self.nodes.get(node.0) {
                stack.extend(current.children.iter().rev().copied());
            }
        }
        None
    }

    /// Removes every child and all text of the body; used for whole-page
    /// reinitialization. Detached nodes stay addressable by their `NodeId`.
    pub fn clear_body(&mut self) {
        let body = self.body;
        if let Some(Node {
            kind: NodeKind::Element(data),
            ..
        }) = self.nodes.get_mut(body.0)
        {
            data.text.clear();
        }
        let _ = self.detach_children(body);
    }

    pub fn add_event_listener(&mut self, node: NodeId, listener: Listener) -> Result<(), DomError> {
        let listeners = &mut self.node_mut(node)?.listeners;
        if !listeners.contains(&listener) {
            listeners.push(listener);
        }
        Ok(())
    }

    pub fn remove_event_listener(&mut self, node: NodeId, listener: &Listener) -> Result<(), DomError> {
        self.node_mut(node)?
            .listeners
            .retain(|existing| existing != listener);
        Ok(())
    }

    pub fn listeners(&self, node: NodeId) -> Result<&[Listener], DomError> {
        Ok(&self.node(node)?.listeners)
    }

    fn listens_for(&self, node: NodeId, event_type: &str) -> bool {
        self.nodes
            .get(node.0)
            .is_some_and(|n| n.listeners.iter().any(|l| l.event_type == event_type))
    }

    /// Dispatches `event_type` at `target` through capture, target and bubble
    /// phases, letting each attached policy listener decide whether it owns
    /// the action.
    pub fn dispatch_event(&self, target: NodeId, event_type: &str) -> Result<DispatchReport, DomError> {
        self.node(target)?;

        let mut path = Vec::new();
        let mut cursor = Some(target);
        while let Some(node) = cursor {
            path.push(node);
            cursor = self.parent(node);
        }

        let mut event = EventState::new(event_type, target);
        event.attribution_target = path
            .iter()
            .copied()
            .find(|node| self.listens_for(*node, event_type));

        let mut report = DispatchReport::default();
        let ancestors = &path[1..];

        for node in ancestors.iter().rev() {
            event.phase = EventPhase::Capturing;
            self.invoke_listeners(*node, &mut event, true, &mut report);
            if event.propagation_stopped {
                report.propagation_stopped = true;
                return Ok(report);
            }
        }

        event.phase = EventPhase::AtTarget;
        for capture in [true, false] {
            self.invoke_listeners(target, &mut event, capture, &mut report);
            if event.propagation_stopped {
                report.propagation_stopped = true;
                return Ok(report);
            }
        }

        for node in ancestors {
            event.phase = EventPhase::Bubbling;
            self.invoke_listeners(*node, &mut event, false, &mut report);
            if event.propagation_stopped {
                report.propagation_stopped = true;
                return Ok(report);
            }
        }

        Ok(report)
    }

    fn invoke_listeners(
        &self,
        node: NodeId,
        event: &mut EventState,
        capture: bool,
        report: &mut DispatchReport,
    ) {
        let Some(current) = self.nodes.get(node.0) else {
            return;
        };
        event.current_target = node;
        let owner_id = self.id(node);
        let event_type = event.event_type.clone();
        for listener in current
            .listeners
            .iter()
            .filter(|l| l.capture == capture && l.event_type == event_type)
        {
            if event.immediate_propagation_stopped {
                break;
            }
            report.listeners_evaluated += 1;
            if let Some(invocation) = listener.handler.handle(event, owner_id) {
                report.invocations.push(invocation);
            }
        }
    }

    /// Indented text rendering of the connected tree, one element per line.
    pub fn outline(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "title: {:?}", self.title);
        self.write_outline(self.body, 0, &mut out);
        out
    }

    fn write_outline(&self, node: NodeId, depth: usize, out: &mut String) {
        let Some(current) = self.nodes.get(node.0) else {
            return;
        };
        if let NodeKind::Element(data) = &current.kind {
            let _ = write!(out, "{}<{}", "  ".repeat(depth), data.tag);
            for (name, value) in &data.attributes {
                let _ = write!(out, " {name}={value:?}");
            }
            out.push('>');
            if !data.text.is_empty() {
                let _ = write!(out, " {:?}", data.text);
            }
            if !current.listeners.is_empty() {
                let events: Vec<&str> = current
                    .listeners
                    .iter()
                    .map(|l| l.event_type.as_str())
                    .collect();
                let _ = write!(out, " [on {}]", events.join(","));
            }
            out.push('\n');
        }
        for child in &current.children {
            self.write_outline(*child, depth + 1, out);
        }
    }
}

/// Shared handle to the live page. The lock is held for each synchronous
/// stretch of work and released at every suspension point.
#[derive(Debug, Clone, Default)]
pub struct PageHandle {
    inner: Arc<Mutex<Document>>,
}

impl PageHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_document(document: Document) -> Self {
        Self {
            inner: Arc::new(Mutex::new(document)),
        }
    }

    pub async fn lock(&self) -> MutexGuard<'_, Document> {
        self.inner.lock().await
    }

    pub async fn title(&self) -> String {
        self.inner.lock().await.title().to_string()
    }

    pub async fn clear_body(&self) {
        self.inner.lock().await.clear_body();
    }

    pub async fn outline(&self) -> String {
        self.inner.lock().await.outline()
    }
}

#[cfg(test)]
#[path = "tests/page_tests.rs"]
mod tests;
