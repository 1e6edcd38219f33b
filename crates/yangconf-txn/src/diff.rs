//! Tree differ.
//!
//! Walks a source and a target tree in lock-step and classifies every
//! position that differs as deleted, added or changed. Siblings are matched
//! by identity: list entries by their key values, leaf-list entries by
//! value, everything else by name (same-named non-list siblings pair up by
//! position). Reordering entries without changing them is not a change.
//!
//! Granularity: a matched pair whose own values differ is reported as one
//! changed pair and not descended into. A matched pair with equal values is
//! descended into, so a container is never reported as changed because of
//! its children; the most specific differing nodes are reported instead.
//! Unmatched nodes are reported once, at the subtree root.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use yangconf_tree::{entry_identity, verify_list_keys, ConfigTree, NodeId, Schema, TreeResult};

use crate::error::{TxnError, TxnResult};

/// Diff vectors between a source and a target tree.
///
/// `deleted` and `changed_source` hold source-tree ids; `added` and
/// `changed_target` hold target-tree ids. The changed vectors always have
/// equal length and pair up by position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTreeDiff")]
pub struct TreeDiff {
    deleted: Vec<NodeId>,
    added: Vec<NodeId>,
    changed_source: Vec<NodeId>,
    changed_target: Vec<NodeId>,
}

impl TreeDiff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_deleted(&mut self, source: NodeId) {
        self.deleted.push(source);
    }

    pub fn push_added(&mut self, target: NodeId) {
        self.added.push(target);
    }

    pub fn push_changed(&mut self, source: NodeId, target: NodeId) {
        self.changed_source.push(source);
        self.changed_target.push(target);
    }

    pub fn deleted(&self) -> &[NodeId] {
        &self.deleted
    }

    pub fn added(&self) -> &[NodeId] {
        &self.added
    }

    pub fn changed_source(&self) -> &[NodeId] {
        &self.changed_source
    }

    pub fn changed_target(&self) -> &[NodeId] {
        &self.changed_target
    }

    /// Iterates `(source, target)` changed pairs.
    pub fn changed_pairs(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.changed_source
            .iter()
            .copied()
            .zip(self.changed_target.iter().copied())
    }

    /// Total number of entries (a changed pair counts once).
    pub fn len(&self) -> usize {
        self.deleted.len() + self.added.len() + self.changed_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks that every id refers to a non-root node of the tree its vector
    /// belongs to, and that no node is listed twice on either side.
    pub fn validate(&self, source: &ConfigTree, target: &ConfigTree) -> TxnResult<()> {
        if self.changed_source.len() != self.changed_target.len() {
            return Err(TxnError::invalid_diff(format!(
                "{} changed source ids but {} changed target ids",
                self.changed_source.len(),
                self.changed_target.len()
            )));
        }
        check_side("source", source, &self.deleted, &self.changed_source)?;
        check_side("target", target, &self.added, &self.changed_target)
    }

    /// Puts every vector into document pre-order of the tree it refers to.
    fn sort_by_document_order(&mut self, source: &ConfigTree, target: &ConfigTree) {
        let source_rank = document_rank(source);
        let target_rank = document_rank(target);

        self.deleted.sort_by_key(|id| source_rank[id.index()]);
        self.added.sort_by_key(|id| target_rank[id.index()]);

        let mut pairs: Vec<_> = self.changed_pairs().collect();
        pairs.sort_by_key(|(s, _)| source_rank[s.index()]);
        let (sources, targets): (Vec<_>, Vec<_>) = pairs.into_iter().unzip();
        self.changed_source = sources;
        self.changed_target = targets;
    }
}

/// Wire form of [`TreeDiff`] before the pairing check.
#[derive(Deserialize)]
struct RawTreeDiff {
    #[serde(default)]
    deleted: Vec<NodeId>,
    #[serde(default)]
    added: Vec<NodeId>,
    #[serde(default)]
    changed_source: Vec<NodeId>,
    #[serde(default)]
    changed_target: Vec<NodeId>,
}

impl TryFrom<RawTreeDiff> for TreeDiff {
    type Error = String;

    fn try_from(raw: RawTreeDiff) -> Result<Self, Self::Error> {
        if raw.changed_source.len() != raw.changed_target.len() {
            return Err(format!(
                "changed vectors differ in length ({} source, {} target)",
                raw.changed_source.len(),
                raw.changed_target.len()
            ));
        }
        Ok(Self {
            deleted: raw.deleted,
            added: raw.added,
            changed_source: raw.changed_source,
            changed_target: raw.changed_target,
        })
    }
}

fn check_side(
    side: &str,
    tree: &ConfigTree,
    unmatched: &[NodeId],
    changed: &[NodeId],
) -> TxnResult<()> {
    let mut seen = HashSet::new();
    for id in unmatched.iter().chain(changed) {
        if id.index() >= tree.len() {
            return Err(TxnError::invalid_diff(format!(
                "node {} is not in the {} tree",
                id, side
            )));
        }
        if *id == tree.root() {
            return Err(TxnError::invalid_diff(format!(
                "the {} root cannot be part of a diff",
                side
            )));
        }
        if !seen.insert(*id) {
            return Err(TxnError::invalid_diff(format!(
                "node {} of the {} tree is listed more than once",
                id, side
            )));
        }
    }
    Ok(())
}

fn document_rank(tree: &ConfigTree) -> Vec<usize> {
    let mut rank = vec![0; tree.len()];
    for (position, id) in tree.pre_order(tree.root()).enumerate() {
        rank[id.index()] = position;
    }
    rank
}

/// Computes the diff between `source` and `target`.
///
/// Both roots are assumed equivalent and are not themselves compared. A list
/// entry lacking one of its key leaves anywhere in either tree fails the
/// whole diff; no partial result is returned.
pub fn diff_trees(
    schema: &dyn Schema,
    source: &ConfigTree,
    target: &ConfigTree,
) -> TreeResult<TreeDiff> {
    verify_list_keys(schema, source)?;
    verify_list_keys(schema, target)?;

    let mut differ = Differ {
        schema,
        source,
        target,
        diff: TreeDiff::new(),
    };
    differ.compare_children(source.root(), target.root())?;

    let mut diff = differ.diff;
    diff.sort_by_document_order(source, target);
    Ok(diff)
}

struct Differ<'a> {
    schema: &'a dyn Schema,
    source: &'a ConfigTree,
    target: &'a ConfigTree,
    diff: TreeDiff,
}

impl<'a> Differ<'a> {
    fn compare_children(&mut self, source_parent: NodeId, target_parent: NodeId) -> TreeResult<()> {
        let (schema, source, target) = (self.schema, self.source, self.target);

        // Target siblings by identity; duplicates queue up in document order.
        let mut candidates: HashMap<(&'a str, Option<Vec<String>>), VecDeque<NodeId>> =
            HashMap::new();
        for &child in target.children(target_parent) {
            let identity = entry_identity(schema, target, child)?;
            candidates
                .entry((target.name(child), identity))
                .or_default()
                .push_back(child);
        }

        let mut matched = HashSet::new();
        for &child in source.children(source_parent) {
            let identity = entry_identity(schema, source, child)?;
            let counterpart = candidates
                .get_mut(&(source.name(child), identity))
                .and_then(VecDeque::pop_front);
            match counterpart {
                Some(other) => {
                    matched.insert(other);
                    self.compare_matched(child, other)?;
                }
                None => self.diff.push_deleted(child),
            }
        }

        for &child in target.children(target_parent) {
            if !matched.contains(&child) {
                self.diff.push_added(child);
            }
        }
        Ok(())
    }

    fn compare_matched(&mut self, source_node: NodeId, target_node: NodeId) -> TreeResult<()> {
        if self.source.value(source_node) != self.target.value(target_node) {
            self.diff.push_changed(source_node, target_node);
            return Ok(());
        }
        self.compare_children(source_node, target_node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use yangconf_tree::{SchemaMap, TreeError};

    fn iface_schema() -> SchemaMap {
        SchemaMap::new()
            .with_list("/interfaces/iface", ["name"])
            .with_leaf_list("/interfaces/iface/tag")
    }

    fn interfaces(entries: &[(&str, &str)]) -> ConfigTree {
        let mut tree = ConfigTree::new("config");
        let ifaces = tree.add_container(tree.root(), "interfaces");
        for (name, mtu) in entries {
            let entry = tree.add_container(ifaces, "iface");
            tree.add_leaf(entry, "name", *name);
            tree.add_leaf(entry, "mtu", *mtu);
        }
        tree
    }

    fn paths(tree: &ConfigTree, ids: &[NodeId]) -> Vec<String> {
        ids.iter().map(|id| tree.path(*id)).collect()
    }

    #[test]
    fn test_pure_addition() {
        let source = ConfigTree::new("config");
        let mut target = ConfigTree::new("config");
        let cfg = target.add_container(target.root(), "cfg");
        target.add_leaf(cfg, "x", "1");

        let diff = diff_trees(&SchemaMap::new(), &source, &target).unwrap();
        assert_eq!(diff.added(), &[cfg]);
        assert!(diff.deleted().is_empty());
        assert!(diff.changed_source().is_empty());
    }

    #[test]
    fn test_pure_deletion() {
        let mut source = ConfigTree::new("config");
        let a = source.add_container(source.root(), "a");
        let b = source.add_leaf(source.root(), "b", "2");
        source.add_leaf(a, "x", "1");
        let target = ConfigTree::new("config");

        let diff = diff_trees(&SchemaMap::new(), &source, &target).unwrap();
        assert_eq!(diff.deleted(), &[a, b]);
        assert!(diff.added().is_empty());
        assert!(diff.changed_target().is_empty());
    }

    #[test]
    fn test_identical_trees_have_empty_diff() {
        let tree = interfaces(&[("eth0", "1500"), ("eth1", "9000")]);
        let diff = diff_trees(&iface_schema(), &tree, &tree.clone()).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_keyed_list_update_reports_leaf() {
        let source = interfaces(&[("eth0", "1500")]);
        let target = interfaces(&[("eth0", "9000")]);

        let diff = diff_trees(&iface_schema(), &source, &target).unwrap();
        assert!(diff.added().is_empty());
        assert!(diff.deleted().is_empty());
        let (s, t) = diff.changed_pairs().next().unwrap();
        assert_eq!(diff.changed_source().len(), 1);
        assert_eq!(source.path(s), "/interfaces/iface/mtu");
        assert_eq!(source.value(s), Some("1500"));
        assert_eq!(target.value(t), Some("9000"));
    }

    #[test]
    fn test_list_reorder_is_not_a_change() {
        let source = interfaces(&[("eth0", "1500"), ("eth1", "1500")]);
        let target = interfaces(&[("eth1", "1500"), ("eth0", "1500")]);
        let diff = diff_trees(&iface_schema(), &source, &target).unwrap();
        assert!(diff.is_empty());
    }

    #[test]
    fn test_list_entries_matched_by_key() {
        let source = interfaces(&[("eth0", "1500"), ("eth1", "1500")]);
        let target = interfaces(&[("eth1", "1500"), ("eth2", "1500")]);
        let diff = diff_trees(&iface_schema(), &source, &target).unwrap();

        assert_eq!(diff.deleted().len(), 1);
        assert_eq!(source.child_value(diff.deleted()[0], "name"), Some("eth0"));
        assert_eq!(diff.added().len(), 1);
        assert_eq!(target.child_value(diff.added()[0], "name"), Some("eth2"));
        assert!(diff.changed_source().is_empty());
    }

    #[test]
    fn test_nested_container_reports_deepest_nodes() {
        let mut source = ConfigTree::new("config");
        let system = source.add_container(source.root(), "system");
        let clock = source.add_container(system, "clock");
        source.add_leaf(clock, "timezone", "UTC");
        source.add_leaf(system, "hostname", "sw1");

        let mut target = ConfigTree::new("config");
        let system = target.add_container(target.root(), "system");
        let clock = target.add_container(system, "clock");
        target.add_leaf(clock, "timezone", "CET");
        target.add_leaf(clock, "source", "ntp");
        target.add_leaf(system, "hostname", "sw1");

        let diff = diff_trees(&SchemaMap::new(), &source, &target).unwrap();
        assert_eq!(paths(&source, diff.changed_source()), vec!["/system/clock/timezone"]);
        assert_eq!(paths(&target, diff.added()), vec!["/system/clock/source"]);
        assert!(diff.deleted().is_empty());
    }

    #[test]
    fn test_leaf_list_membership() {
        let mut source = interfaces(&[("eth0", "1500")]);
        let entry = source.children(source.children(source.root())[0])[0];
        source.add_leaf(entry, "tag", "uplink");
        source.add_leaf(entry, "tag", "core");

        let mut target = interfaces(&[("eth0", "1500")]);
        let entry = target.children(target.children(target.root())[0])[0];
        target.add_leaf(entry, "tag", "core");
        target.add_leaf(entry, "tag", "edge");

        let diff = diff_trees(&iface_schema(), &source, &target).unwrap();
        assert_eq!(diff.deleted().len(), 1);
        assert_eq!(source.value(diff.deleted()[0]), Some("uplink"));
        assert_eq!(diff.added().len(), 1);
        assert_eq!(target.value(diff.added()[0]), Some("edge"));
        assert!(diff.changed_source().is_empty());
    }

    #[test]
    fn test_leaf_becoming_container_is_a_change() {
        let mut source = ConfigTree::new("config");
        let s = source.add_leaf(source.root(), "logging", "on");
        let mut target = ConfigTree::new("config");
        let t = target.add_container(target.root(), "logging");
        target.add_leaf(t, "level", "debug");

        let diff = diff_trees(&SchemaMap::new(), &source, &target).unwrap();
        assert_eq!(diff.changed_pairs().collect::<Vec<_>>(), vec![(s, t)]);
        assert!(diff.added().is_empty());
    }

    #[test]
    fn test_duplicate_plain_siblings_pair_by_position() {
        let mut source = ConfigTree::new("config");
        source.add_leaf(source.root(), "banner", "a");
        source.add_leaf(source.root(), "banner", "b");
        let mut target = ConfigTree::new("config");
        target.add_leaf(target.root(), "banner", "a");
        target.add_leaf(target.root(), "banner", "c");
        let third = target.add_leaf(target.root(), "banner", "d");

        let diff = diff_trees(&SchemaMap::new(), &source, &target).unwrap();
        assert_eq!(diff.changed_source().len(), 1);
        assert_eq!(source.value(diff.changed_source()[0]), Some("b"));
        assert_eq!(diff.added(), &[third]);
    }

    #[test]
    fn test_added_vector_follows_target_document_order() {
        let source = interfaces(&[("eth0", "1500")]);
        let mut target = interfaces(&[("eth0", "1500")]);
        let entry = target.children(target.children(target.root())[0])[0];
        // Appended to the arena after `system`, but earlier in the document.
        let system = target.add_container(target.root(), "system");
        let speed = target.add_leaf(entry, "speed", "100G");

        let diff = diff_trees(&iface_schema(), &source, &target).unwrap();
        assert_eq!(diff.added(), &[speed, system]);
    }

    #[test]
    fn test_missing_key_aborts_diff() {
        let source = interfaces(&[("eth0", "1500")]);
        let mut target = ConfigTree::new("config");
        let ifaces = target.add_container(target.root(), "interfaces");
        let entry = target.add_container(ifaces, "iface");
        target.add_leaf(entry, "mtu", "9000");

        let err = diff_trees(&iface_schema(), &source, &target).unwrap_err();
        assert!(matches!(err, TreeError::MissingListKey { ref key, .. } if key == "name"));
    }

    #[test]
    fn test_missing_key_inside_added_subtree_is_detected() {
        let source = ConfigTree::new("config");
        let mut target = ConfigTree::new("config");
        let ifaces = target.add_container(target.root(), "interfaces");
        target.add_container(ifaces, "iface");

        let err = diff_trees(&iface_schema(), &source, &target).unwrap_err();
        assert!(err.is_schema_inconsistency());
    }
}
