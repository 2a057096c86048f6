//! Integration tests for the application facade driven by a config file
//!
//! These tests load a TOML configuration, browse the demo plant, and run the
//! configured scenarios to completion on a manual clock.

mod common;

use common::{csv_files, read_lines, TEST_URL};
use opc_recorder::app::RecorderApp;
use opc_recorder::backend::SimulatedServer;
use opc_recorder::config::AppConfig;
use opc_recorder::recording::ManualClock;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let records = dir.path().join("Records");
    let path = dir.path().join("recorder.toml");
    let text = format!(
        r#"
[server]
url = "{url}"

[recording]
interval_ms = 500
target_count = 2
records_dir = {records:?}

[[scenarios]]
name = "Line1"
directory = "Root/Objects/PLC/Line1"

[[scenarios]]
name = "Drives"
target_count = 1
variables = [
    {{ label = "Motor", node_id = "ns=2;s=PLC.Drives.Motor", live = false }},
    {{ label = "Flags", node_id = "ns=2;s=PLC.Drives.Flags" }},
]
"#,
        url = TEST_URL,
        records = records.display().to_string(),
    );
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_configured_scenarios_run_to_completion() {
    let dir = TempDir::new().unwrap();
    let config = AppConfig::load(write_config(&dir)).unwrap();
    let clock = Arc::new(ManualClock::new());
    let mut app = RecorderApp::new(
        config,
        Arc::new(SimulatedServer::demo().unwrap()),
        clock.clone(),
    );

    let url = app.config().server.url.clone();
    let browse = app.connect_and_browse(&url).unwrap();
    assert!(browse.directories.contains("Root/Objects/PLC/Line1"));

    let scenarios = app.create_configured_scenarios().unwrap();
    assert_eq!(scenarios.len(), 2);
    assert_eq!(scenarios[0].selection().len(), 4);
    assert!(!scenarios[1].selection()[0].live);
    assert!(scenarios[1].selection()[1].live);

    assert_eq!(app.start_all(), 2);
    let mut ticks = 0;
    while app.any_recording() && ticks < 20 {
        clock.advance(Duration::from_millis(500));
        app.registry().poll_all();
        ticks += 1;
    }
    assert_eq!(ticks, 3);

    let line1 = csv_files(&dir.path().join("Records/Line1"));
    assert_eq!(line1.len(), 1);
    let lines = read_lines(&line1[0]);
    assert_eq!(lines.len(), 3);
    assert_eq!(
        lines[0],
        "timestamp,Root/Objects/PLC/Line1/Counter,Root/Objects/PLC/Line1/Pressure,\
         Root/Objects/PLC/Line1/Status,Root/Objects/PLC/Line1/Temp"
    );

    let drives = csv_files(&dir.path().join("Records/Drives"));
    let lines = read_lines(&drives[0]);
    assert_eq!(
        lines[0],
        "timestamp,Flags[0],Flags[1],Motor.enabled,Motor.limits.max,Motor.limits.min,Motor.speed"
    );
    assert!(lines[1].ends_with(",true,false,true,3000,0,1450.0"));

    // the live view of the Flags variable was refreshed while recording
    let live = scenarios[1].live_entries();
    assert_eq!(live[0].value, "Waiting...");
    assert_eq!(live[1].value, "Array[2]:\n[0] true\n[1] false");

    app.shutdown();
    assert!(!app.session().is_connected());
}

#[test]
fn test_duplicate_scenario_names_fail_validation() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("recorder.json");
    std::fs::write(
        &path,
        r#"{ "scenarios": [ { "name": "A" }, { "name": "A" } ] }"#,
    )
    .unwrap();
    assert!(AppConfig::load(&path).is_err());
    assert_eq!(AppConfig::load_or_default(&path), AppConfig::default());
}
