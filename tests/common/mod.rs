//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

pub mod builders;
pub mod harness;

use std::path::Path;

/// Endpoint accepted by the simulated server
pub const TEST_URL: &str = "opc.tcp://localhost:4840";

/// Node id of the oven temperature in [`builders::oven_plant`]
pub const TEMP_ID: &str = "ns=2;i=5";

/// Read a CSV record back as lines
pub fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Could not read {}: {}", path.display(), e))
        .lines()
        .map(str::to_string)
        .collect()
}

/// All `.csv` files below `dir`
pub fn csv_files(dir: &Path) -> Vec<std::path::PathBuf> {
    let mut found = Vec::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return found;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            found.extend(csv_files(&path));
        } else if path.extension().is_some_and(|e| e == "csv") {
            found.push(path);
        }
    }
    found.sort();
    found
}
