//! Registry of named recording scenarios
//!
//! The registry owns every scenario of a session, hands each one the shared
//! connection and the browsed directories, and relays their events through a
//! single channel.

use crate::backend::SharedConnection;
use crate::browse::PathIndex;
use crate::error::{RecorderError, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use std::sync::{Arc, PoisonError, RwLock};

use super::scenario::RecordingScenario;
use super::schedule::SharedClock;
use super::types::{ScenarioEvent, ScenarioSettings, StopReason};

/// Capacity of the event queue; events beyond it are dropped
pub const EVENT_QUEUE_CAPACITY: usize = 1024;

/// Shared, ordered list of scenarios
///
/// Cloned into the [`SchedulerWorker`](super::SchedulerWorker) so it can poll
/// without holding the registry.
#[derive(Debug, Clone, Default)]
pub struct ScenarioHandles {
    inner: Arc<RwLock<Vec<Arc<RecordingScenario>>>>,
}

impl ScenarioHandles {
    /// Snapshot of the current scenarios
    pub fn snapshot(&self) -> Vec<Arc<RecordingScenario>> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Poll every scenario once
    pub fn poll_all(&self) {
        for scenario in self.snapshot() {
            scenario.poll();
        }
    }

    fn push(&self, scenario: Arc<RecordingScenario>) {
        self.inner
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(scenario);
    }

    fn remove(&self, name: &str) -> Option<Arc<RecordingScenario>> {
        let mut list = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let index = list.iter().position(|s| s.name() == name)?;
        Some(list.remove(index))
    }
}

/// Zero or more independent scenarios sharing one connection
pub struct ScenarioRegistry {
    scenarios: ScenarioHandles,
    defaults: ScenarioSettings,
    clock: SharedClock,
    event_tx: Sender<ScenarioEvent>,
    event_rx: Receiver<ScenarioEvent>,
    connection: Option<SharedConnection>,
    directories: PathIndex,
}

impl ScenarioRegistry {
    pub fn new(defaults: ScenarioSettings, clock: SharedClock) -> Self {
        let (event_tx, event_rx) = bounded(EVENT_QUEUE_CAPACITY);
        Self {
            scenarios: ScenarioHandles::default(),
            defaults,
            clock,
            event_tx,
            event_rx,
            connection: None,
            directories: PathIndex::new(),
        }
    }

    /// Settings given to new scenarios
    pub fn defaults(&self) -> &ScenarioSettings {
        &self.defaults
    }

    pub fn set_defaults(&mut self, defaults: ScenarioSettings) {
        self.defaults = defaults;
    }

    /// Create a scenario with the default settings
    pub fn create(&mut self, name: &str) -> Result<Arc<RecordingScenario>> {
        let settings = self.defaults.clone();
        self.create_with(name, settings)
    }

    /// Create a scenario with explicit settings
    ///
    /// Names must be non-empty and unique.
    pub fn create_with(
        &mut self,
        name: &str,
        settings: ScenarioSettings,
    ) -> Result<Arc<RecordingScenario>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RecorderError::Validation(
                "Scenario name cannot be empty".to_string(),
            ));
        }
        if self.get(name).is_some() {
            return Err(RecorderError::Validation(format!(
                "A scenario named '{}' already exists",
                name
            )));
        }
        if settings.interval.is_zero() || settings.target_count == 0 {
            return Err(RecorderError::Validation(
                "Interval and target count must be greater than zero".to_string(),
            ));
        }

        let scenario = Arc::new(RecordingScenario::new(
            name,
            settings,
            Arc::clone(&self.clock),
            self.event_tx.clone(),
        ));
        scenario.set_connection(self.connection.clone());
        scenario.update_directories(&self.directories);
        self.scenarios.push(Arc::clone(&scenario));

        tracing::info!("Scenario '{}' created", name);
        Ok(scenario)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RecordingScenario>> {
        self.scenarios
            .snapshot()
            .into_iter()
            .find(|s| s.name() == name)
    }

    /// Scenario names in creation order
    pub fn names(&self) -> Vec<String> {
        self.scenarios
            .snapshot()
            .iter()
            .map(|s| s.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.scenarios.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close a scenario
    ///
    /// A recording scenario is only closed when `confirm` answers yes, and its
    /// recording is stopped and auto-saved first. When that auto-save fails
    /// the error is returned and the stopped scenario stays registered, so its
    /// rows can still go through `save_as` before closing again. Returns
    /// whether the scenario was removed.
    pub fn close<F>(&mut self, name: &str, confirm: F) -> Result<bool>
    where
        F: FnOnce(&RecordingScenario) -> bool,
    {
        let scenario = self
            .get(name)
            .ok_or_else(|| RecorderError::Validation(format!("No scenario named '{}'", name)))?;

        if scenario.is_recording() {
            if !confirm(scenario.as_ref()) {
                tracing::debug!("Closing '{}' cancelled", name);
                return Ok(false);
            }
            if let Err(e) = scenario.stop_with(StopReason::Closed) {
                tracing::warn!("Scenario '{}' kept open with unsaved rows: {}", name, e);
                return Err(e);
            }
        }

        scenario.set_connection(None);
        self.scenarios.remove(name);
        tracing::info!("Scenario '{}' closed", name);
        Ok(true)
    }

    /// Hand every scenario a new connection, or take it away
    pub fn set_connection(&mut self, connection: Option<SharedConnection>) {
        self.connection = connection;
        for scenario in self.scenarios.snapshot() {
            scenario.set_connection(self.connection.clone());
        }
    }

    /// Push freshly browsed directories to every scenario
    pub fn update_directories(&mut self, directories: &PathIndex) {
        self.directories = directories.clone();
        for scenario in self.scenarios.snapshot() {
            scenario.update_directories(directories);
        }
    }

    /// Poll every scenario once
    pub fn poll_all(&self) {
        self.scenarios.poll_all();
    }

    /// Stop every recording, then drop the connection from all scenarios
    pub fn shutdown(&mut self) {
        for scenario in self.scenarios.snapshot() {
            if let Err(e) = scenario.stop_with(StopReason::Shutdown) {
                tracing::warn!("Stopping '{}' during shutdown: {}", scenario.name(), e);
            }
        }
        self.set_connection(None);
    }

    /// Shared handle for a [`SchedulerWorker`](super::SchedulerWorker)
    pub fn handles(&self) -> ScenarioHandles {
        self.scenarios.clone()
    }

    /// Receiver of scenario events
    pub fn events(&self) -> Receiver<ScenarioEvent> {
        self.event_rx.clone()
    }

    /// Take all pending events
    pub fn drain_events(&self) -> Vec<ScenarioEvent> {
        self.event_rx.try_iter().collect()
    }
}

impl std::fmt::Debug for ScenarioRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScenarioRegistry")
            .field("scenarios", &self.names())
            .field("connected", &self.connection.is_some())
            .finish()
    }
}
