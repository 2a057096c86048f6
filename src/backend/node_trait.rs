//! Node and connection capability traits
//!
//! Everything above the backend talks to the remote server through these
//! traits only: [`Connector`] opens a [`Connection`], a connection hands out
//! [`NodeHandle`]s, and node handles answer the handful of questions the
//! walker and the recording engine need. Implementations must be
//! `Send + Sync` because several scenarios read through one connection
//! concurrently.

use crate::error::Result;
use crate::types::{AccessLevel, NodeClass, RawValue};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Size of the rolling window for recent read times
const RECENT_WINDOW_SIZE: usize = 100;

/// Shared handle to a remote node
pub type NodeRef = Arc<dyn NodeHandle>;

/// Capability interface over a remote addressable entity
///
/// Handles are cheap to obtain and never cached by callers; the server is
/// authoritative, so each read goes back to it.
///
/// # Example
///
/// ```ignore
/// fn describe(node: &dyn NodeHandle) -> String {
///     match node.node_class() {
///         Ok(class) if class.is_variable() => format!("{:?}", node.read_value()),
///         _ => node.display_name().unwrap_or_else(|_| node.node_id()),
///     }
/// }
/// ```
pub trait NodeHandle: Send + Sync {
    /// Transport-defined identifier, e.g. `ns=2;i=5`
    fn node_id(&self) -> String;

    /// Human readable name of the node
    fn display_name(&self) -> Result<String>;

    /// Folder, variable, method, ...
    fn node_class(&self) -> Result<NodeClass>;

    /// Direct children in server order
    fn children(&self) -> Result<Vec<NodeRef>>;

    /// Current value of a variable node
    fn read_value(&self) -> Result<RawValue>;

    /// Description attribute, `None` when the server reports none
    fn description(&self) -> Result<Option<String>>;

    /// Current access rights
    fn access_level(&self) -> Result<AccessLevel>;
}

/// An established session with a server
pub trait Connection: Send + Sync {
    /// The endpoint this connection was opened against
    fn endpoint(&self) -> String;

    /// Root of the address space
    fn root(&self) -> Result<NodeRef>;

    /// Look up a node by identifier
    fn node(&self, node_id: &str) -> Result<NodeRef>;

    /// Close the session. Later calls on this connection or on handles it
    /// produced fail with a connection error instead of panicking.
    fn disconnect(&self);

    /// Whether the session is still open
    fn is_connected(&self) -> bool;

    /// Read the current value of `node_id`
    ///
    /// Default implementation resolves the node first; transports with a
    /// direct read service may override.
    fn read_value(&self, node_id: &str) -> Result<RawValue> {
        self.node(node_id)?.read_value()
    }
}

/// Shared handle to an open connection
pub type SharedConnection = Arc<dyn Connection>;

/// Opens connections to server URLs
pub trait Connector: Send + Sync {
    /// Establish a new connection to `url`
    fn connect(&self, url: &str) -> Result<SharedConnection>;

    /// Limit every value read; slower reads fail with a timeout error.
    /// `None` waits as long as the transport does.
    fn set_read_timeout(&self, timeout: Option<Duration>);
}

/// Statistics for read operations
///
/// Tracks success rates and latency metrics for value reads made by a
/// scenario's recording and live-update ticks.
#[derive(Debug, Clone)]
pub struct ReadStats {
    /// Total number of successful reads
    pub successful_reads: u64,
    /// Total number of failed reads
    pub failed_reads: u64,
    /// Total read time in microseconds
    pub total_read_time_us: u64,
    /// Last read time in microseconds
    pub last_read_time_us: u64,
    /// Minimum read time observed (microseconds)
    pub min_read_time_us: u64,
    /// Maximum read time observed (microseconds)
    pub max_read_time_us: u64,
    /// Rolling window of recent read times for jitter calculation
    pub recent_read_times: VecDeque<u64>,
}

impl Default for ReadStats {
    fn default() -> Self {
        Self {
            successful_reads: 0,
            failed_reads: 0,
            total_read_time_us: 0,
            last_read_time_us: 0,
            min_read_time_us: u64::MAX,
            max_read_time_us: 0,
            recent_read_times: VecDeque::with_capacity(RECENT_WINDOW_SIZE),
        }
    }
}

impl ReadStats {
    /// Calculate average read time in microseconds
    pub fn avg_read_time_us(&self) -> f64 {
        if self.successful_reads == 0 {
            0.0
        } else {
            self.total_read_time_us as f64 / self.successful_reads as f64
        }
    }

    /// Calculate success rate as percentage
    pub fn success_rate(&self) -> f64 {
        let total = self.successful_reads + self.failed_reads;
        if total == 0 {
            100.0
        } else {
            (self.successful_reads as f64 / total as f64) * 100.0
        }
    }

    /// Record a successful read with its latency
    pub fn record_success(&mut self, elapsed: Duration) {
        let time_us = elapsed.as_micros().min(u64::MAX as u128) as u64;
        self.successful_reads += 1;
        self.total_read_time_us += time_us;
        self.last_read_time_us = time_us;
        self.min_read_time_us = self.min_read_time_us.min(time_us);
        self.max_read_time_us = self.max_read_time_us.max(time_us);

        self.recent_read_times.push_back(time_us);
        if self.recent_read_times.len() > RECENT_WINDOW_SIZE {
            self.recent_read_times.pop_front();
        }
    }

    /// Record a failed read
    pub fn record_failure(&mut self) {
        self.failed_reads += 1;
    }

    /// Jitter (max - min) over the recent window in microseconds
    pub fn jitter_us(&self) -> u64 {
        let min = self.recent_read_times.iter().min().copied().unwrap_or(0);
        let max = self.recent_read_times.iter().max().copied().unwrap_or(0);
        max.saturating_sub(min)
    }

    /// Fold the reads of another tick into these statistics
    pub fn merge(&mut self, other: &ReadStats) {
        if other.successful_reads > 0 {
            self.successful_reads += other.successful_reads;
            self.total_read_time_us += other.total_read_time_us;
            self.last_read_time_us = other.last_read_time_us;
            self.min_read_time_us = self.min_read_time_us.min(other.min_read_time_us);
            self.max_read_time_us = self.max_read_time_us.max(other.max_read_time_us);
            self.recent_read_times
                .extend(other.recent_read_times.iter().copied());
            while self.recent_read_times.len() > RECENT_WINDOW_SIZE {
                self.recent_read_times.pop_front();
            }
        }
        self.failed_reads += other.failed_reads;
    }

    /// Reset all statistics
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
