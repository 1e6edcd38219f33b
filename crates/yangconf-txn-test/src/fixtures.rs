//! Configuration tree fixtures
//!
//! Trees are built from [`NodeSpec`] so scenarios read like the document
//! they describe.

use yangconf_tree::{ConfigTree, NodeSpec, SchemaMap};

/// Root element name shared by every fixture tree.
pub const ROOT: &str = "config";

/// Schema for the interface and routing fixtures:
/// - `/interfaces/iface` keyed by `name`
/// - `/routing/route` keyed by `vrf`, `prefix`
/// - `/routing/route/next-hop` is a leaf-list
pub fn schema() -> SchemaMap {
    SchemaMap::new()
        .with_list("/interfaces/iface", ["name"])
        .with_list("/routing/route", ["vrf", "prefix"])
        .with_leaf_list("/routing/route/next-hop")
}

/// A tree with nothing under the root.
pub fn empty() -> ConfigTree {
    ConfigTree::new(ROOT)
}

/// Builds a tree from top-level specs.
pub fn tree(children: Vec<NodeSpec>) -> ConfigTree {
    ConfigTree::from_spec(NodeSpec::container(ROOT, children))
}

/// One `iface` list entry.
pub fn iface(name: &str, mtu: &str) -> NodeSpec {
    NodeSpec::container(
        "iface",
        vec![NodeSpec::leaf("name", name), NodeSpec::leaf("mtu", mtu)],
    )
}

/// One `iface` list entry with an `enabled` leaf and a nested
/// `ipv4/address` container.
pub fn iface_with_address(name: &str, mtu: &str, address: &str) -> NodeSpec {
    NodeSpec::container(
        "iface",
        vec![
            NodeSpec::leaf("name", name),
            NodeSpec::leaf("mtu", mtu),
            NodeSpec::leaf("enabled", "true"),
            NodeSpec::container("ipv4", vec![NodeSpec::leaf("address", address)]),
        ],
    )
}

/// `/interfaces` with one entry per `(name, mtu)` pair, in order.
pub fn interfaces(entries: &[(&str, &str)]) -> NodeSpec {
    NodeSpec::container(
        "interfaces",
        entries.iter().map(|(name, mtu)| iface(name, mtu)).collect(),
    )
}

/// One `route` list entry with its next-hop leaf-list.
pub fn route(vrf: &str, prefix: &str, next_hops: &[&str]) -> NodeSpec {
    let mut children = vec![NodeSpec::leaf("vrf", vrf), NodeSpec::leaf("prefix", prefix)];
    children.extend(next_hops.iter().map(|hop| NodeSpec::leaf("next-hop", *hop)));
    NodeSpec::container("route", children)
}

pub fn routing(routes: Vec<NodeSpec>) -> NodeSpec {
    NodeSpec::container("routing", routes)
}

/// `/cfg/x = 1`
pub fn cfg_x(value: &str) -> ConfigTree {
    tree(vec![NodeSpec::container("cfg", vec![NodeSpec::leaf("x", value)])])
}

/// A device-sized tree mixing plain containers, keyed lists, nested
/// containers and leaf-lists.
pub fn device() -> ConfigTree {
    tree(vec![
        NodeSpec::container(
            "system",
            vec![
                NodeSpec::leaf("hostname", "leaf-01"),
                NodeSpec::container("ntp", vec![NodeSpec::leaf("server", "192.0.2.10")]),
            ],
        ),
        NodeSpec::container(
            "interfaces",
            vec![
                iface_with_address("eth0", "1500", "10.0.0.1/24"),
                iface_with_address("eth1", "9000", "10.0.1.1/24"),
                iface("lo", "65536"),
            ],
        ),
        routing(vec![
            route("default", "0.0.0.0/0", &["192.0.2.1"]),
            route("default", "10.0.0.0/8", &["192.0.2.1", "192.0.2.2"]),
            route("mgmt", "0.0.0.0/0", &["198.51.100.1"]),
        ]),
    ])
}

/// [`device`] with a representative edit applied: hostname changed, eth1
/// MTU changed, `lo` removed, `eth2` added, one next-hop swapped and the
/// `mgmt` default route removed.
pub fn device_edited() -> ConfigTree {
    tree(vec![
        NodeSpec::container(
            "system",
            vec![
                NodeSpec::leaf("hostname", "leaf-02"),
                NodeSpec::container("ntp", vec![NodeSpec::leaf("server", "192.0.2.10")]),
            ],
        ),
        NodeSpec::container(
            "interfaces",
            vec![
                iface_with_address("eth0", "1500", "10.0.0.1/24"),
                iface_with_address("eth1", "9216", "10.0.1.1/24"),
                iface("eth2", "1500"),
            ],
        ),
        routing(vec![
            route("default", "0.0.0.0/0", &["192.0.2.1"]),
            route("default", "10.0.0.0/8", &["192.0.2.1", "192.0.2.3"]),
        ]),
    ])
}
