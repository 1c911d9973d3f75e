//! Document tree capability
//!
//! The tracker never touches a real DOM. It needs a parent walk, attribute
//! reads and writes, tag names and a document-order listing of elements;
//! [`Document`] is exactly that. [`MemoryDocument`] is a small arena tree
//! used by tests and the CLI.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use tracing::debug;

use crate::error::SelectorError;

/// `document.readyState`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadyState {
    Loading,
    Interactive,
    #[default]
    Complete,
}

/// Minimal tree-with-attributes capability
pub trait Document {
    /// Element identity. Stable for the lifetime of the document.
    type Node: Copy + Eq + Hash + fmt::Debug;

    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    fn attribute(&self, node: Self::Node, name: &str) -> Option<String>;

    fn set_attribute(&mut self, node: Self::Node, name: &str, value: &str);

    /// Lowercase tag name (`a`, `button`, ...)
    fn tag_name(&self, node: Self::Node) -> String;

    /// Every element in document order
    fn elements(&self) -> Vec<Self::Node>;

    fn ready_state(&self) -> ReadyState {
        ReadyState::Complete
    }
}

/// Nearest inclusive ancestor of `start` satisfying `predicate`.
///
/// Stops at the root, or at the first revisited node in a malformed tree.
pub fn closest<D, F>(document: &D, start: D::Node, mut predicate: F) -> Option<D::Node>
where
    D: Document + ?Sized,
    F: FnMut(D::Node) -> bool,
{
    let mut visited = HashSet::new();
    let mut current = Some(start);
    while let Some(node) = current {
        if !visited.insert(node) {
            debug!(?node, "Parent chain loops back, stopping ancestor walk");
            return None;
        }
        if predicate(node) {
            return Some(node);
        }
        current = document.parent(node);
    }
    None
}

/// Whether the element navigates natively when given an `href`.
pub fn is_hyperlink<D: Document + ?Sized>(document: &D, node: D::Node) -> bool {
    matches!(document.tag_name(node).as_str(), "a" | "area")
}

/// All elements matching `selector`, in document order.
pub fn query_all<D: Document + ?Sized>(document: &D, selector: &AttributeSelector) -> Vec<D::Node> {
    document
        .elements()
        .into_iter()
        .filter(|node| selector.matches(document, *node))
        .collect()
}

/// `[attr]` or `[attr=value]`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeSelector {
    attribute: String,
    value: Option<String>,
}

impl AttributeSelector {
    /// Selector matching any element that carries `attribute`.
    pub fn has(attribute: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: None,
        }
    }

    pub fn equals(attribute: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            attribute: attribute.into(),
            value: Some(value.into()),
        }
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn matches<D: Document + ?Sized>(&self, document: &D, node: D::Node) -> bool {
        match (document.attribute(node, &self.attribute), &self.value) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(actual), Some(expected)) => actual == *expected,
        }
    }
}

impl FromStr for AttributeSelector {
    type Err = SelectorError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let inner = text
            .trim()
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or_else(|| SelectorError::Malformed(text.to_string()))?;

        let (name, value) = match inner.split_once('=') {
            Some((name, value)) => (name.trim(), Some(unquote(value.trim()))),
            None => (inner.trim(), None),
        };
        if name.is_empty() {
            return Err(SelectorError::EmptyAttribute);
        }
        if name.contains(['[', ']', ' ']) {
            return Err(SelectorError::Malformed(text.to_string()));
        }

        Ok(Self {
            attribute: name.to_string(),
            value: value.map(str::to_string),
        })
    }
}

fn unquote(value: &str) -> &str {
    for quote in ['\'', '"'] {
        if let Some(inner) = value
            .strip_prefix(quote)
            .and_then(|rest| rest.strip_suffix(quote))
        {
            return inner;
        }
    }
    value
}

impl fmt::Display for AttributeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            Some(value) => write!(f, "[{}='{}']", self.attribute, value),
            None => write!(f, "[{}]", self.attribute),
        }
    }
}

/// Index of a node inside a [`MemoryDocument`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug, Clone)]
struct NodeData {
    tag: String,
    parent: Option<NodeId>,
    attributes: BTreeMap<String, String>,
}

/// Arena-backed element tree
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    nodes: Vec<NodeData>,
    ready_state: ReadyState,
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryDocument {
    /// A document holding only the `html` root.
    pub fn new() -> Self {
        Self {
            nodes: vec![NodeData {
                tag: "html".to_string(),
                parent: None,
                attributes: BTreeMap::new(),
            }],
            ready_state: ReadyState::Complete,
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Append a child element and return its id.
    pub fn append(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            tag: tag.to_ascii_lowercase(),
            parent: Some(parent),
            attributes: BTreeMap::new(),
        });
        id
    }

    /// Append a child element with attributes.
    pub fn append_with(&mut self, parent: NodeId, tag: &str, attributes: &[(&str, &str)]) -> NodeId {
        let id = self.append(parent, tag);
        for (name, value) in attributes {
            self.set_attribute(id, name, value);
        }
        id
    }

    /// Re-parent a node. No cycle check: tests use this to build malformed
    /// trees.
    pub fn set_parent(&mut self, node: NodeId, parent: Option<NodeId>) {
        self.nodes[node.0].parent = parent;
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) {
        self.nodes[node.0]
            .attributes
            .remove(&name.to_ascii_lowercase());
    }

    pub fn set_ready_state(&mut self, state: ReadyState) {
        self.ready_state = state;
    }
}

impl Document for MemoryDocument {
    type Node = NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.get(node.0).and_then(|data| data.parent)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.nodes
            .get(node.0)
            .and_then(|data| data.attributes.get(&name.to_ascii_lowercase()))
            .cloned()
    }

    fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) {
        if let Some(data) = self.nodes.get_mut(node.0) {
            data.attributes
                .insert(name.to_ascii_lowercase(), value.to_string());
        }
    }

    fn tag_name(&self, node: NodeId) -> String {
        self.nodes
            .get(node.0)
            .map(|data| data.tag.clone())
            .unwrap_or_default()
    }

    fn elements(&self) -> Vec<NodeId> {
        (0..self.nodes.len()).map(NodeId).collect()
    }

    fn ready_state(&self) -> ReadyState {
        self.ready_state
    }
}
