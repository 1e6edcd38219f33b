//! Arena-backed ordered configuration tree.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{TreeError, TreeResult};

/// Index of a node inside one [`ConfigTree`] arena.
///
/// A `NodeId` is only meaningful for the tree that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u32);

impl NodeId {
    /// Returns the arena slot of this node.
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Name/value attribute attached to an element node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// One element of a configuration tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigNode {
    name: String,
    value: Option<String>,
    attributes: Vec<Attribute>,
    children: Vec<NodeId>,
    parent: Option<NodeId>,
}

impl ConfigNode {
    fn new(name: String, value: Option<String>, parent: Option<NodeId>) -> Self {
        Self {
            name,
            value,
            attributes: Vec::new(),
            children: Vec::new(),
            parent,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Leaf content, if any.
    pub fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// Returns the value of the named attribute.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// Child elements in document order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Returns true if the node has no child elements.
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Ordered element tree owning all of its nodes.
///
/// The root node is created with the tree and is never reported by the
/// differ; it stands for the datastore top level (e.g. `<config>`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "NodeSpec", into = "NodeSpec")]
pub struct ConfigTree {
    nodes: Vec<ConfigNode>,
}

impl ConfigTree {
    /// Creates a tree holding only a root element.
    pub fn new(root_name: impl Into<String>) -> Self {
        Self {
            nodes: vec![ConfigNode::new(root_name.into(), None, None)],
        }
    }

    /// Returns the root element.
    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Number of nodes in the arena, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the root has no children.
    pub fn is_empty(&self) -> bool {
        self.nodes[0].children.is_empty()
    }

    /// Returns the node, or `None` if the id does not belong to this tree.
    pub fn get(&self, id: NodeId) -> Option<&ConfigNode> {
        self.nodes.get(id.index())
    }

    /// Returns the node.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this tree.
    pub fn node(&self, id: NodeId) -> &ConfigNode {
        &self.nodes[id.index()]
    }

    pub fn name(&self, id: NodeId) -> &str {
        self.node(id).name()
    }

    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.node(id).value()
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent()
    }

    /// Returns the first child element with the given name.
    pub fn find_child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .find(|child| self.name(*child) == name)
    }

    /// Returns the value of the first child element with the given name.
    pub fn child_value(&self, id: NodeId, name: &str) -> Option<&str> {
        self.find_child(id, name).and_then(|child| self.value(child))
    }

    /// Appends a valueless element under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` was not produced by this tree.
    pub fn add_container(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        self.push(parent, name.into(), None)
    }

    /// Appends an element carrying `value` under `parent`.
    ///
    /// # Panics
    ///
    /// Panics if `parent` was not produced by this tree.
    pub fn add_leaf(
        &mut self,
        parent: NodeId,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> NodeId {
        self.push(parent, name.into(), Some(value.into()))
    }

    pub fn set_value(&mut self, id: NodeId, value: Option<String>) {
        self.nodes[id.index()].value = value;
    }

    /// Sets an attribute, replacing an existing one of the same name.
    pub fn add_attribute(&mut self, id: NodeId, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        let attributes = &mut self.nodes[id.index()].attributes;
        match attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.value = value,
            None => attributes.push(Attribute { name, value }),
        }
    }

    fn push(&mut self, parent: NodeId, name: String, value: Option<String>) -> NodeId {
        assert!(parent.index() < self.nodes.len(), "parent {parent} not in tree");
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(ConfigNode::new(name, value, Some(parent)));
        self.nodes[parent.index()].children.push(id);
        id
    }

    /// Iterates the subtree rooted at `id` in document pre-order.
    pub fn pre_order(&self, id: NodeId) -> PreOrder<'_> {
        PreOrder {
            tree: self,
            stack: vec![id],
        }
    }

    /// Renders the element path from below the root, e.g. `/interfaces/iface/mtu`.
    ///
    /// The root itself renders as `/`.
    pub fn path(&self, id: NodeId) -> String {
        let mut segments = Vec::new();
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node(current);
            if node.parent.is_some() {
                segments.push(node.name.as_str());
            }
            cursor = node.parent;
        }
        if segments.is_empty() {
            return "/".to_string();
        }
        segments.reverse();
        format!("/{}", segments.join("/"))
    }

    /// Compares two subtrees by name, value and ordered children.
    ///
    /// Attributes are not compared.
    pub fn subtree_eq(&self, a: NodeId, other: &ConfigTree, b: NodeId) -> bool {
        let left = self.node(a);
        let right = other.node(b);
        left.name == right.name
            && left.value == right.value
            && left.children.len() == right.children.len()
            && left
                .children
                .iter()
                .zip(&right.children)
                .all(|(l, r)| self.subtree_eq(*l, other, *r))
    }

    /// Builds a tree from its nested representation.
    pub fn from_spec(spec: NodeSpec) -> Self {
        let NodeSpec {
            name,
            value,
            attributes,
            children,
        } = spec;
        let mut tree = ConfigTree::new(name);
        let root = tree.root();
        tree.set_value(root, value);
        tree.nodes[0].attributes = attributes;
        for child in children {
            tree.graft(root, child);
        }
        tree
    }

    fn graft(&mut self, parent: NodeId, spec: NodeSpec) {
        let id = self.push(parent, spec.name, spec.value);
        self.nodes[id.index()].attributes = spec.attributes;
        for child in spec.children {
            self.graft(id, child);
        }
    }

    /// Returns the nested representation of the subtree rooted at `id`.
    pub fn to_spec(&self, id: NodeId) -> NodeSpec {
        let node = self.node(id);
        NodeSpec {
            name: node.name.clone(),
            value: node.value.clone(),
            attributes: node.attributes.clone(),
            children: node.children.iter().map(|c| self.to_spec(*c)).collect(),
        }
    }

    /// Parses a tree from its JSON document form.
    pub fn from_json_str(json: &str) -> TreeResult<Self> {
        serde_json::from_str::<NodeSpec>(json)
            .map(ConfigTree::from_spec)
            .map_err(|e| TreeError::InvalidDocument(e.to_string()))
    }

    /// Renders the whole tree as a JSON document.
    pub fn to_json_string(&self) -> TreeResult<String> {
        serde_json::to_string(&self.to_spec(self.root()))
            .map_err(|e| TreeError::InvalidDocument(e.to_string()))
    }
}

impl From<NodeSpec> for ConfigTree {
    fn from(spec: NodeSpec) -> Self {
        ConfigTree::from_spec(spec)
    }
}

impl From<ConfigTree> for NodeSpec {
    fn from(tree: ConfigTree) -> Self {
        tree.to_spec(tree.root())
    }
}

/// Pre-order iterator over a subtree.
pub struct PreOrder<'a> {
    tree: &'a ConfigTree,
    stack: Vec<NodeId>,
}

impl Iterator for PreOrder<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Nested, serialisable form of a subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<Attribute>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSpec>,
}

impl NodeSpec {
    pub fn container(name: impl Into<String>, children: Vec<NodeSpec>) -> Self {
        Self {
            name: name.into(),
            value: None,
            attributes: Vec::new(),
            children,
        }
    }

    pub fn leaf(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            attributes: Vec::new(),
            children: Vec::new(),
        }
    }
}
