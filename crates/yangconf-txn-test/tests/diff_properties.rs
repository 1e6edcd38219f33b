//! Tree differ properties and scenarios
//!
//! Property checks run over seeded random device trees so failures are
//! reproducible from the printed seed.

use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use yangconf_tree::{ConfigTree, NodeSpec, SchemaMap};
use yangconf_txn::{diff_trees, ChangeKind, Side, Transaction};
use yangconf_txn_test::fixtures::{self, iface, interfaces, route, routing, tree};
use yangconf_txn_test::{verify_exclusive, verify_symmetric};

const SEEDS: u64 = 64;

const IFACES: [&str; 6] = ["eth0", "eth1", "eth2", "eth3", "lo", "mgmt0"];
const MTUS: [&str; 3] = ["1500", "9000", "9216"];
const PREFIXES: [&str; 4] = ["0.0.0.0/0", "10.0.0.0/8", "172.16.0.0/12", "192.168.0.0/16"];
const VRFS: [&str; 2] = ["default", "mgmt"];
const HOPS: [&str; 4] = ["192.0.2.1", "192.0.2.2", "198.51.100.1", "203.0.113.9"];

fn random_device(rng: &mut StdRng) -> ConfigTree {
    let mut top = Vec::new();

    if rng.gen_bool(0.8) {
        let hostname = *["leaf-01", "leaf-02"].choose(rng).unwrap_or(&"leaf-01");
        let mut system = vec![NodeSpec::leaf("hostname", hostname)];
        if rng.gen_bool(0.5) {
            system.push(NodeSpec::container(
                "ntp",
                vec![NodeSpec::leaf("server", *HOPS.choose(rng).unwrap_or(&HOPS[0]))],
            ));
        }
        top.push(NodeSpec::container("system", system));
    }

    let count = rng.gen_range(0..=IFACES.len());
    let mut names: Vec<&str> = IFACES.choose_multiple(rng, count).cloned().collect();
    names.shuffle(rng);
    let entries: Vec<(&str, &str)> = names
        .into_iter()
        .map(|name| (name, *MTUS.choose(rng).unwrap_or(&MTUS[0])))
        .collect();
    top.push(interfaces(&entries));

    let mut routes = Vec::new();
    for vrf in VRFS {
        for prefix in PREFIXES {
            if rng.gen_bool(0.4) {
                let hop_count = rng.gen_range(1..=3);
                let hops: Vec<&str> = HOPS.choose_multiple(rng, hop_count).cloned().collect();
                routes.push(route(vrf, prefix, &hops));
            }
        }
    }
    routes.shuffle(rng);
    top.push(routing(routes));

    top.shuffle(rng);
    tree(top)
}

#[test]
fn test_diff_against_itself_is_empty() {
    let schema = fixtures::schema();
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let tree = random_device(&mut rng);
        let diff = diff_trees(&schema, &tree, &tree).unwrap();
        assert!(diff.is_empty(), "seed {}: {:?}", seed, diff);
    }
}

#[test]
fn test_diff_is_symmetric() {
    let schema = fixtures::schema();
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_device(&mut rng);
        let b = random_device(&mut rng);
        let forward = diff_trees(&schema, &a, &b).unwrap();
        let backward = diff_trees(&schema, &b, &a).unwrap();
        if let Err(e) = verify_symmetric(&forward, &backward) {
            panic!("seed {}: {}", seed, e);
        }
    }
}

#[test]
fn test_diff_vectors_are_exclusive() {
    let schema = fixtures::schema();
    for seed in 0..SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let a = random_device(&mut rng);
        let b = random_device(&mut rng);
        let diff = diff_trees(&schema, &a, &b).unwrap();
        if let Err(e) = verify_exclusive(&diff) {
            panic!("seed {}: {}", seed, e);
        }
    }
}

#[test]
fn test_reordered_list_entries_are_not_changes() {
    let schema = fixtures::schema();
    let a = tree(vec![interfaces(&[("eth0", "1500"), ("eth1", "9000")])]);
    let b = tree(vec![interfaces(&[("eth1", "9000"), ("eth0", "1500")])]);
    assert!(diff_trees(&schema, &a, &b).unwrap().is_empty());
}

#[test]
fn test_pure_addition() {
    let source = fixtures::empty();
    let target = fixtures::cfg_x("1");
    let diff = diff_trees(&SchemaMap::new(), &source, &target).unwrap();

    let cfg = target.find_child(target.root(), "cfg").unwrap();
    assert_eq!(diff.added(), &[cfg]);
    assert!(diff.deleted().is_empty());
    assert!(diff.changed_source().is_empty());
}

#[test]
fn test_pure_deletion() {
    let source = fixtures::device();
    let target = fixtures::empty();
    let diff = diff_trees(&fixtures::schema(), &source, &target).unwrap();

    assert_eq!(diff.deleted(), source.children(source.root()));
    assert!(diff.added().is_empty());
    assert!(diff.changed_source().is_empty());
}

#[test]
fn test_keyed_entry_update_reports_leaf() {
    let schema = fixtures::schema();
    let source = tree(vec![interfaces(&[("eth0", "1500")])]);
    let target = tree(vec![interfaces(&[("eth0", "9000")])]);
    let diff = diff_trees(&schema, &source, &target).unwrap();

    assert!(diff.added().is_empty());
    assert!(diff.deleted().is_empty());
    let (s, t) = diff.changed_pairs().next().unwrap();
    assert_eq!(diff.len(), 1);
    assert_eq!(source.name(s), "mtu");
    assert_eq!(source.value(s), Some("1500"));
    assert_eq!(target.value(t), Some("9000"));
}

#[test]
fn test_device_edit() {
    let schema = fixtures::schema();
    let source = fixtures::device();
    let target = fixtures::device_edited();
    let mut txn = Transaction::create(source, target);
    txn.compute_diff(&schema).unwrap();

    let describe = txn.describe(&schema);
    let lines: Vec<&str> = describe.lines().skip(1).collect();
    assert_eq!(
        lines,
        vec![
            "- /interfaces/iface[name='lo']",
            "- /routing/route[vrf='default'][prefix='10.0.0.0/8']/next-hop[.='192.0.2.2']",
            "- /routing/route[vrf='mgmt'][prefix='0.0.0.0/0']",
            "+ /interfaces/iface[name='eth2']",
            "+ /routing/route[vrf='default'][prefix='10.0.0.0/8']/next-hop[.='192.0.2.3']",
            "~ /system/hostname: leaf-01 -> leaf-02",
            "~ /interfaces/iface[name='eth1']/mtu: 9000 -> 9216",
        ]
    );

    let summary = txn.summary();
    assert_eq!((summary.deleted, summary.added, summary.changed), (3, 2, 2));

    let eth2 = txn.added()[0];
    assert_eq!(txn.change_kind(Side::Target, eth2), Some(ChangeKind::Added));
    let hostname = txn.changed_source()[0];
    assert_eq!(txn.change_kind(Side::Source, hostname), Some(ChangeKind::Changed));
    let root = txn.source().root();
    assert_eq!(txn.change_kind(Side::Source, root), None);
}

#[test]
fn test_trees_survive_json_round_trip_with_equal_diff() {
    let schema = fixtures::schema();
    let source = fixtures::device();
    let target = fixtures::device_edited();
    let reloaded = ConfigTree::from_json_str(&target.to_json_string().unwrap()).unwrap();

    let direct = diff_trees(&schema, &source, &target).unwrap();
    let via_json = diff_trees(&schema, &source, &reloaded).unwrap();
    assert_eq!(direct, via_json);
}

#[test]
fn test_iface_fixture_matches_by_key_not_position() {
    let schema = fixtures::schema();
    let source = tree(vec![NodeSpec::container("interfaces", vec![iface("eth0", "1500")])]);
    let target = tree(vec![NodeSpec::container(
        "interfaces",
        vec![iface("eth1", "1500"), iface("eth0", "1500")],
    )]);
    let diff = diff_trees(&schema, &source, &target).unwrap();
    assert_eq!(diff.added().len(), 1);
    assert_eq!(target.child_value(diff.added()[0], "name"), Some("eth1"));
    assert!(diff.deleted().is_empty());
}
