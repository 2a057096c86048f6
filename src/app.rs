//! Application facade
//!
//! [`RecorderApp`] ties one [`ServerSession`] to one [`ScenarioRegistry`]:
//! connecting browses the address space and hands the new connection and
//! directory index to every scenario.

use crate::backend::{Connector, ServerSession};
use crate::browse::{AddressSpaceWalker, BrowseResult, PathIndex};
use crate::config::{AppConfig, ScenarioConfig};
use crate::error::{RecorderError, Result};
use crate::recording::{
    RecordingScenario, ScenarioRegistry, SelectedVariable, SharedClock,
};
use std::sync::Arc;

/// Session, scenarios and the last browse result of one operator
pub struct RecorderApp {
    config: AppConfig,
    session: ServerSession,
    registry: ScenarioRegistry,
    browse: Option<BrowseResult>,
}

impl RecorderApp {
    /// The configured read timeout is applied to `connector` here.
    pub fn new(config: AppConfig, connector: Arc<dyn Connector>, clock: SharedClock) -> Self {
        connector.set_read_timeout(Some(config.server.read_timeout()));
        let registry = ScenarioRegistry::new(config.scenario_defaults(), clock);
        Self {
            config,
            session: ServerSession::new(connector),
            registry,
            browse: None,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn session(&self) -> &ServerSession {
        &self.session
    }

    pub fn registry(&self) -> &ScenarioRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ScenarioRegistry {
        &mut self.registry
    }

    /// Result of the last successful browse
    pub fn browse_result(&self) -> Option<&BrowseResult> {
        self.browse.as_ref()
    }

    /// Connect to `url` and browse its address space
    ///
    /// Any previous connection is torn down and every scenario loses it
    /// before the new one is attempted. On success every scenario receives
    /// the new connection and directory index.
    pub fn connect_and_browse(&mut self, url: &str) -> Result<&BrowseResult> {
        self.disconnect();

        let connection = self.session.connect(url)?;
        let root = match connection.root() {
            Ok(root) => root,
            Err(e) => {
                self.session.disconnect();
                return Err(RecorderError::Connection(format!(
                    "Failed to open the address space: {}",
                    e.message()
                )));
            }
        };

        let result = AddressSpaceWalker::new(self.config.walk_options()).walk(&root);
        self.registry.set_connection(Some(connection));
        self.registry.update_directories(&result.directories);
        self.config.server.add_recent_url(url.trim());

        Ok(self.browse.insert(result))
    }

    /// Persist the configuration, including the recent server URLs
    pub fn save_config(&self, path: impl AsRef<std::path::Path>) -> Result<()> {
        self.config.save(path)
    }

    /// Drop the connection from the session and every scenario
    pub fn disconnect(&mut self) {
        self.registry.set_connection(None);
        self.registry.update_directories(&PathIndex::new());
        self.browse = None;
        self.session.disconnect();
    }

    /// Create one scenario per configured entry
    pub fn create_configured_scenarios(&mut self) -> Result<Vec<Arc<RecordingScenario>>> {
        let configured = self.config.scenarios.clone();
        configured
            .iter()
            .map(|entry| self.create_scenario(entry))
            .collect()
    }

    /// Create a scenario from its configuration
    ///
    /// When a directory is configured, all of its variables are selected
    /// ahead of the explicitly listed ones.
    pub fn create_scenario(&mut self, entry: &ScenarioConfig) -> Result<Arc<RecordingScenario>> {
        let directory = match &entry.directory {
            Some(path) => {
                let node_id = self
                    .browse
                    .as_ref()
                    .and_then(|b| b.directories.get(path))
                    .ok_or_else(|| {
                        RecorderError::Validation(format!("Unknown directory '{}'", path))
                    })?;
                Some((path.clone(), node_id.to_string()))
            }
            None => None,
        };

        let scenario = self
            .registry
            .create_with(&entry.name, entry.settings(&self.config.recording))?;

        let configured = (|| -> Result<()> {
            let mut selection = Vec::new();
            if let Some((path, node_id)) = &directory {
                for candidate in scenario.select_directory(path, node_id)? {
                    selection.push(SelectedVariable::new(candidate.label, candidate.node_id));
                }
            }
            selection.extend(entry.selection());
            scenario.set_selection(selection)
        })();
        if let Err(e) = configured {
            self.registry.close(scenario.name(), |_| true)?;
            return Err(e);
        }

        tracing::debug!(
            "Scenario '{}' configured with {} variable(s)",
            entry.name,
            scenario.selection().len()
        );
        Ok(scenario)
    }

    /// Start every scenario that has a selection; returns how many started
    pub fn start_all(&self) -> usize {
        let mut started = 0;
        for name in self.registry.names() {
            let Some(scenario) = self.registry.get(&name) else {
                continue;
            };
            if scenario.selection().is_empty() {
                continue;
            }
            match scenario.start_recording() {
                Ok(()) => started += 1,
                Err(e) => tracing::warn!("Could not start '{}': {}", name, e),
            }
        }
        started
    }

    /// Whether any scenario is still recording
    pub fn any_recording(&self) -> bool {
        self.registry
            .names()
            .iter()
            .filter_map(|name| self.registry.get(name))
            .any(|s| s.is_recording())
    }

    /// Stop every scenario, then disconnect
    pub fn shutdown(&mut self) {
        tracing::info!("Shutting down");
        self.registry.shutdown();
        self.session.disconnect();
    }
}
