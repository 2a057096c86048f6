//! Integration tests for address-space browsing
//!
//! These tests walk simulated plants through a real connection:
//! - Path filter guiding and mismatches
//! - Depth and node limits
//! - Faults annotated inline without aborting the walk

mod common;

use common::builders::PlantBuilder;
use common::TEST_URL;
use opc_recorder::backend::{Connector, Fault, SimulatedServer, OBJECTS_NODE_ID};
use opc_recorder::browse::{AddressSpaceWalker, BrowseResult, WalkOptions};

const PLANT: &str = "ns=3;s=Plant";

/// `Objects/Plant/F0/F1/F2`, each folder holding a variable `V`
fn deep_plant() -> SimulatedServer {
    PlantBuilder::new()
        .folder(OBJECTS_NODE_ID, PLANT, "Plant")
        .chain(PLANT, "Deep", 3)
        .build()
}

fn walk(server: &SimulatedServer, options: WalkOptions) -> BrowseResult {
    let conn = server.connect(TEST_URL).unwrap();
    let root = conn.root().unwrap();
    AddressSpaceWalker::new(options).walk(&root)
}

fn plant_filter() -> WalkOptions {
    WalkOptions::filtered(["Root", "Objects", "Plant"])
}

fn labels(index: &opc_recorder::browse::PathIndex) -> Vec<String> {
    index.labels().map(str::to_string).collect()
}

#[test]
fn test_filtered_walk_indexes_below_prefix() {
    let result = walk(&deep_plant(), plant_filter());

    assert_eq!(
        labels(&result.directories),
        [
            "Root/Objects/Plant",
            "Root/Objects/Plant/F0",
            "Root/Objects/Plant/F0/F1",
            "Root/Objects/Plant/F0/F1/F2",
        ]
    );
    assert_eq!(result.variables.len(), 3);
    assert_eq!(
        result.variables.get("Root/Objects/Plant/F0/F1/V"),
        Some("ns=3;s=Deep.F1.V")
    );
    assert_eq!(result.stats.errors, 0);
    assert!(!result.stats.truncated);
}

#[test]
fn test_filter_mismatch_yields_empty_indexes() {
    let result = walk(&deep_plant(), WalkOptions::filtered(["Root", "Objects", "Missing"]));

    assert!(result.directories.is_empty());
    assert!(result.variables.is_empty());
    // the guiding prefix is still shown
    assert_eq!(result.tree.len(), 2);
    assert!(result.tree.find_by_path("Root/Objects").is_some());
}

#[test]
fn test_max_depth_records_but_does_not_descend() {
    let options = WalkOptions {
        max_depth: Some(4),
        ..plant_filter()
    };
    let result = walk(&deep_plant(), options);

    assert_eq!(
        labels(&result.directories),
        [
            "Root/Objects/Plant",
            "Root/Objects/Plant/F0",
            "Root/Objects/Plant/F0/F1",
        ]
    );
    assert_eq!(labels(&result.variables), ["Root/Objects/Plant/F0/V"]);
}

#[test]
fn test_max_nodes_truncates() {
    let options = WalkOptions {
        max_nodes: Some(5),
        ..plant_filter()
    };
    let result = walk(&deep_plant(), options);

    assert!(result.stats.truncated);
    assert_eq!(result.stats.nodes_visited, 5);
    assert_eq!(result.tree.len(), 5);
    assert_eq!(result.directories.len(), 2);
}

#[test]
fn test_children_fault_prunes_only_that_subtree() {
    let server = deep_plant();
    server
        .set_fault("ns=3;s=Deep.F1", Fault::Children, Some("BadBrowseNameInvalid"))
        .unwrap();
    let result = walk(&server, plant_filter());

    assert_eq!(result.stats.errors, 1);
    assert!(!result.directories.contains("Root/Objects/Plant/F0/F1"));
    assert!(result.variables.contains("Root/Objects/Plant/F0/V"));
    assert!(result.tree.find_by_path("Root/Objects/Plant/F0/F1/F2").is_none());

    let f1 = result
        .tree
        .find_by_path("Root/Objects/Plant/F0/F1")
        .unwrap();
    assert_eq!(
        f1.annotations,
        ["Error reading children: BadBrowseNameInvalid"]
    );
}

#[test]
fn test_cycle_is_bounded_by_depth_limit() {
    let server = deep_plant();
    server.link("ns=3;s=Deep.F2", "ns=3;s=Deep.F0").unwrap();
    let options = WalkOptions {
        max_depth: Some(9),
        ..plant_filter()
    };
    let result = walk(&server, options);

    assert!(result
        .directories
        .contains("Root/Objects/Plant/F0/F1/F2/F0"));
    assert_eq!(
        result.directories.get("Root/Objects/Plant/F0/F1/F2/F0"),
        Some("ns=3;s=Deep.F0")
    );
}

#[test]
fn test_render_shows_value_annotations() {
    let result = walk(&deep_plant(), plant_filter());
    let text = result.tree.render();

    assert!(text.starts_with("Root\n  Objects\n    Plant\n"));
    assert!(text.contains("\n        V\n            Value: 0, Type: Int64\n"));
}

#[test]
fn test_unfiltered_demo_walk_includes_server_folder() {
    let server = SimulatedServer::demo().unwrap();
    let result = walk(&server, WalkOptions::default());

    assert!(result.directories.contains("Root"));
    assert!(result.directories.contains("Root/Objects/Server"));
    assert!(result
        .variables
        .contains("Root/Objects/PLC/Drives/Motor"));
}
