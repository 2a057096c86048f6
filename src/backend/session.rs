//! Server session management
//!
//! A [`ServerSession`] owns at most one open connection for one logical
//! session. Connecting again always tears down the previous connection first,
//! and disconnect is safe to call repeatedly.

use crate::error::{RecorderError, Result};
use crate::types::ConnectionStatus;
use std::sync::Arc;

use super::node_trait::{Connector, SharedConnection};

/// One logical session against a server
pub struct ServerSession {
    /// Opens new connections
    connector: Arc<dyn Connector>,
    /// The currently held connection, if any
    connection: Option<SharedConnection>,
    /// Endpoint of the current or last attempted connection
    url: Option<String>,
    /// Current connection status
    status: ConnectionStatus,
}

impl ServerSession {
    /// Create a disconnected session using `connector`
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            connection: None,
            url: None,
            status: ConnectionStatus::Disconnected,
        }
    }

    /// Connect to `url`, replacing any existing connection
    pub fn connect(&mut self, url: &str) -> Result<SharedConnection> {
        self.disconnect();

        let url = url.trim();
        if url.is_empty() {
            return Err(RecorderError::Validation("Server URL is empty".to_string()));
        }

        tracing::info!("Attempting to connect to: {}", url);
        self.url = Some(url.to_string());
        self.status = ConnectionStatus::Connecting;

        match self.connector.connect(url) {
            Ok(connection) => {
                tracing::info!("Successfully connected to {}", url);
                self.connection = Some(Arc::clone(&connection));
                self.status = ConnectionStatus::Connected;
                Ok(connection)
            }
            Err(e) => {
                tracing::error!("Connection to {} failed: {}", url, e);
                self.status = ConnectionStatus::Error;
                Err(match e {
                    RecorderError::Connection(_) => e,
                    other => RecorderError::Connection(other.message()),
                })
            }
        }
    }

    /// Close the current connection, if any
    pub fn disconnect(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::info!("Disconnecting from {}", connection.endpoint());
            connection.disconnect();
        }
        self.status = ConnectionStatus::Disconnected;
    }

    /// The held connection, if connected
    pub fn connection(&self) -> Option<SharedConnection> {
        self.connection
            .as_ref()
            .filter(|c| c.is_connected())
            .map(Arc::clone)
    }

    pub fn is_connected(&self) -> bool {
        self.connection().is_some()
    }

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
