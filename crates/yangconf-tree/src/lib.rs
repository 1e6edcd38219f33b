//! Configuration trees for the yangconf transaction engine.
//!
//! This crate provides the data the transaction engine diffs and hands to
//! subscribers:
//!
//! - [`ConfigTree`]: an ordered, arena-backed element tree. Nodes are
//!   addressed by [`NodeId`], so dropping a tree is a single arena drop.
//! - [`Schema`]: the schema collaborator used to identify list entries by
//!   their key leaves rather than by position.
//! - [`SchemaMap`]: a schema-path keyed implementation of [`Schema`].
//! - [`NodeSpec`]: the nested (serde) representation used for fixtures and
//!   debug dumps.
//!
//! # Example
//!
//! ```
//! use yangconf_tree::{ConfigTree, SchemaMap, keyed_path};
//!
//! let mut tree = ConfigTree::new("config");
//! let ifaces = tree.add_container(tree.root(), "interfaces");
//! let eth0 = tree.add_container(ifaces, "iface");
//! tree.add_leaf(eth0, "name", "eth0");
//! let mtu = tree.add_leaf(eth0, "mtu", "1500");
//!
//! let schema = SchemaMap::new().with_list("/interfaces/iface", ["name"]);
//! assert_eq!(tree.path(mtu), "/interfaces/iface/mtu");
//! assert_eq!(
//!     keyed_path(&schema, &tree, mtu),
//!     "/interfaces/iface[name='eth0']/mtu"
//! );
//! ```

mod schema;
mod tree;

pub use schema::{entry_identity, keyed_path, verify_list_keys, Schema, SchemaMap};
pub use tree::{Attribute, ConfigNode, ConfigTree, NodeId, NodeSpec, PreOrder};

/// Errors raised while building, loading or interpreting configuration trees.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    #[error("list entry {path} is missing key leaf '{key}'")]
    MissingListKey { path: String, key: String },

    #[error("list {path} declares no key leaves")]
    KeylessList { path: String },

    #[error("schema violation at {path}: {message}")]
    Schema { path: String, message: String },

    #[error("invalid tree document: {0}")]
    InvalidDocument(String),
}

impl TreeError {
    /// Creates a schema violation error.
    pub fn schema(path: impl Into<String>, message: impl Into<String>) -> Self {
        TreeError::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns true if the error means the tree disagrees with its schema.
    ///
    /// These are fatal for a transaction: no diff is produced and no
    /// subscriber is invoked.
    pub fn is_schema_inconsistency(&self) -> bool {
        matches!(
            self,
            TreeError::MissingListKey { .. }
                | TreeError::KeylessList { .. }
                | TreeError::Schema { .. }
        )
    }
}

/// Result type for tree operations.
pub type TreeResult<T> = Result<T, TreeError>;
