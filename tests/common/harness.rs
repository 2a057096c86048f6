//! Registry harness driven by a manual clock

use opc_recorder::backend::{Connector, SharedConnection, SimulatedServer};
use opc_recorder::recording::{ManualClock, ScenarioEvent, ScenarioRegistry, ScenarioSettings};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use super::TEST_URL;

/// A registry, its clock, and a temporary records directory
pub struct Harness {
    pub server: SimulatedServer,
    pub clock: Arc<ManualClock>,
    pub registry: ScenarioRegistry,
    pub dir: TempDir,
}

impl Harness {
    /// Registry over `server` with auto-save into a temporary directory
    pub fn new(server: SimulatedServer) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let clock = Arc::new(ManualClock::new());
        let settings = ScenarioSettings {
            interval: Duration::from_secs(1),
            target_count: 3,
            records_dir: dir.path().join("Records"),
            ..Default::default()
        };
        let registry = ScenarioRegistry::new(settings, clock.clone());
        Self {
            server,
            clock,
            registry,
            dir,
        }
    }

    /// Open a connection and hand it to every scenario
    pub fn connect(&mut self) -> SharedConnection {
        let connection = self.server.connect(TEST_URL).expect("connect");
        self.registry.set_connection(Some(connection.clone()));
        connection
    }

    pub fn records_dir(&self) -> PathBuf {
        self.dir.path().join("Records")
    }

    /// Advance the clock by `by` and poll every scenario once
    pub fn tick(&self, by: Duration) {
        self.clock.advance(by);
        self.registry.poll_all();
    }

    /// `count` one-second ticks
    pub fn seconds(&self, count: usize) {
        for _ in 0..count {
            self.tick(Duration::from_secs(1));
        }
    }

    pub fn events(&self) -> Vec<ScenarioEvent> {
        self.registry.drain_events()
    }
}
