//! Recording scenarios
//!
//! A [`RecordingScenario`] samples a selection of variables at a fixed
//! interval until a target count is reached, keeps a live view of the
//! selection, and auto-saves its rows as CSV. The [`ScenarioRegistry`] holds
//! any number of independent scenarios sharing one connection, and the
//! [`SchedulerWorker`] drives their schedules from a background thread.
//!
//! # Example
//!
//! ```ignore
//! use opc_recorder::recording::{ScenarioRegistry, ScenarioSettings, SystemClock};
//! use std::sync::Arc;
//!
//! let mut registry = ScenarioRegistry::new(ScenarioSettings::default(), Arc::new(SystemClock));
//! registry.set_connection(Some(connection));
//!
//! let oven = registry.create("Oven")?;
//! oven.set_variable_selected("Line1/Temp", "ns=2;s=PLC.Line1.Temp", true)?;
//! oven.start_recording()?;
//!
//! loop {
//!     registry.poll_all();
//!     for event in registry.drain_events() { /* ... */ }
//! }
//! ```

pub mod live;
pub mod registry;
pub mod scenario;
pub mod schedule;
pub mod types;
pub mod worker;

pub use live::{
    list_directory_candidates, read_live_entry, DirectoryCandidate, LiveEntry, WAITING,
};
pub use registry::{ScenarioHandles, ScenarioRegistry, EVENT_QUEUE_CAPACITY};
pub use scenario::RecordingScenario;
pub use schedule::{Clock, ManualClock, SharedClock, SystemClock, Timer};
pub use types::{
    FlatRow, RecordedSchema, ScenarioEvent, ScenarioSettings, ScenarioState, SelectedVariable,
    StopReason, TIMESTAMP_COLUMN, TIMESTAMP_FORMAT,
};
pub use worker::{SchedulerWorker, DEFAULT_TICK};
