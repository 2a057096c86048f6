//! Test to verify test infrastructure works correctly

mod common;

use common::builders::{oven_plant, PlantBuilder};
use common::harness::Harness;
use common::TEMP_ID;
use opc_recorder::backend::{Connector, OBJECTS_NODE_ID};
use opc_recorder::types::RawValue;

#[test]
fn test_infrastructure_setup() {
    let server = PlantBuilder::new()
        .folder(OBJECTS_NODE_ID, "ns=2;s=A", "A")
        .constant("ns=2;s=A", "ns=2;s=A.x", "x", RawValue::Int(7))
        .build();
    let conn = server.connect(common::TEST_URL).unwrap();
    assert_eq!(conn.read_value("ns=2;s=A.x").unwrap(), RawValue::Int(7));
}

#[test]
fn test_oven_plant_cycles() {
    let server = oven_plant();
    let conn = server.connect(common::TEST_URL).unwrap();
    let reads: Vec<_> = (0..4).map(|_| conn.read_value(TEMP_ID).unwrap()).collect();
    assert_eq!(
        reads,
        [21.5.into(), 21.6.into(), 21.4.into(), RawValue::Double(21.5)]
    );
}

#[test]
fn test_harness_connects_registry() {
    let mut harness = Harness::new(oven_plant());
    let scenario = harness.registry.create("Oven").unwrap();
    assert!(!scenario.is_connected());
    harness.connect();
    assert!(scenario.is_connected());
    assert!(common::csv_files(&harness.records_dir()).is_empty());
}
