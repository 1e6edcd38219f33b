//! Schema collaborator interface and list identity helpers.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{ConfigTree, NodeId, TreeError, TreeResult};

/// Schema information the differ needs about tree nodes.
///
/// The full YANG engine lives outside the transaction core; this trait is
/// the narrow slice of it used to match list entries by identity.
pub trait Schema {
    /// Returns the ordered key leaf names if `node` is a list entry.
    fn list_keys(&self, tree: &ConfigTree, node: NodeId) -> Option<Vec<String>>;

    /// Returns true if `node` is a leaf-list entry (identified by value).
    fn is_leaf_list(&self, _tree: &ConfigTree, _node: NodeId) -> bool {
        false
    }

    /// Validates a whole tree against the schema.
    ///
    /// Runs before a transaction is built; the engine never calls it.
    fn validate(&self, _tree: &ConfigTree) -> TreeResult<()> {
        Ok(())
    }
}

/// Schema described by element paths (root excluded).
///
/// ```
/// use yangconf_tree::SchemaMap;
///
/// let schema = SchemaMap::new()
///     .with_list("/interfaces/iface", ["name"])
///     .with_leaf_list("/system/dns/server");
/// assert!(schema.is_list_path("/interfaces/iface"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaMap {
    #[serde(default)]
    lists: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    leaf_lists: BTreeSet<String>,
}

impl SchemaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares the list at `path` with its ordered key leaves.
    pub fn with_list<I, S>(mut self, path: impl Into<String>, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.add_list(path, keys);
        self
    }

    /// Declares the leaf-list at `path`.
    pub fn with_leaf_list(mut self, path: impl Into<String>) -> Self {
        self.add_leaf_list(path);
        self
    }

    pub fn add_list<I, S>(&mut self, path: impl Into<String>, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists
            .insert(path.into(), keys.into_iter().map(Into::into).collect());
    }

    pub fn add_leaf_list(&mut self, path: impl Into<String>) {
        self.leaf_lists.insert(path.into());
    }

    pub fn is_list_path(&self, path: &str) -> bool {
        self.lists.contains_key(path)
    }
}

impl Schema for SchemaMap {
    fn list_keys(&self, tree: &ConfigTree, node: NodeId) -> Option<Vec<String>> {
        self.lists.get(&tree.path(node)).cloned()
    }

    fn is_leaf_list(&self, tree: &ConfigTree, node: NodeId) -> bool {
        self.leaf_lists.contains(&tree.path(node))
    }
}

/// Returns the identity of `node` among its same-named siblings.
///
/// List entries yield their key values in key order, leaf-list entries their
/// value, and everything else `None` (matched by name alone).
pub fn entry_identity(
    schema: &dyn Schema,
    tree: &ConfigTree,
    node: NodeId,
) -> TreeResult<Option<Vec<String>>> {
    if let Some(keys) = schema.list_keys(tree, node) {
        if keys.is_empty() {
            return Err(TreeError::KeylessList {
                path: tree.path(node),
            });
        }
        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let leaf = tree
                .find_child(node, &key)
                .ok_or_else(|| TreeError::MissingListKey {
                    path: tree.path(node),
                    key: key.clone(),
                })?;
            values.push(tree.value(leaf).unwrap_or_default().to_string());
        }
        return Ok(Some(values));
    }
    if schema.is_leaf_list(tree, node) {
        return Ok(Some(vec![tree.value(node).unwrap_or_default().to_string()]));
    }
    Ok(None)
}

/// Checks that every list entry in `tree` carries all of its key leaves.
pub fn verify_list_keys(schema: &dyn Schema, tree: &ConfigTree) -> TreeResult<()> {
    for node in tree.pre_order(tree.root()).skip(1) {
        entry_identity(schema, tree, node)?;
    }
    Ok(())
}

/// Renders the path of `node` with list key predicates,
/// e.g. `/interfaces/iface[name='eth0']/mtu`.
///
/// Missing key leaves render as empty values; this is a logging helper and
/// never fails.
pub fn keyed_path(schema: &dyn Schema, tree: &ConfigTree, node: NodeId) -> String {
    let mut ancestry = Vec::new();
    let mut cursor = Some(node);
    while let Some(current) = cursor {
        if tree.parent(current).is_some() {
            ancestry.push(current);
        }
        cursor = tree.parent(current);
    }
    if ancestry.is_empty() {
        return "/".to_string();
    }

    let mut path = String::new();
    for id in ancestry.into_iter().rev() {
        path.push('/');
        path.push_str(tree.name(id));
        if let Some(keys) = schema.list_keys(tree, id) {
            for key in keys {
                let value = tree.child_value(id, &key).unwrap_or_default();
                path.push_str(&format!("[{key}='{value}']"));
            }
        } else if schema.is_leaf_list(tree, id) {
            path.push_str(&format!("[.='{}']", tree.value(id).unwrap_or_default()));
        }
    }
    path
}
