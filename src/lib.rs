//! # OPC Recorder: address-space browser and multi-scenario sampler
//!
//! Connects to an industrial automation server, walks its address space under
//! a path filter, and records selected variables into timestamped rows that
//! are shown live and persisted as CSV.
//!
//! ## Architecture
//!
//! - **Backend**: Capability traits over the remote server plus an in-memory
//!   simulated server
//! - **Browse**: Address-space walker producing a display tree and the
//!   directory / variable indexes
//! - **Codec**: Raw values to canonical values, flat columns and type descriptions
//! - **Recording**: Independent scenarios with their own schedules, a registry
//!   sharing one connection, and a background scheduler thread
//! - **Persistence**: CSV records with a reconciled column schema
//!
//! ## Configuration
//!
//! Configuration files are TOML or JSON. The default file lives in the
//! platform data directory under `dev.opc-recorder`:
//!
//! - **Linux**: `~/.local/share/dev.opc-recorder/`
//! - **macOS**: `~/Library/Application Support/dev.opc-recorder/`
//! - **Windows**: `%APPDATA%\dev.opc-recorder\`
//!
//! ## Example
//!
//! ```ignore
//! use opc_recorder::{
//!     app::RecorderApp,
//!     backend::SimulatedServer,
//!     config::AppConfig,
//!     recording::SystemClock,
//! };
//! use std::sync::Arc;
//!
//! let server = SimulatedServer::demo()?;
//! let mut app = RecorderApp::new(AppConfig::default(), Arc::new(server), Arc::new(SystemClock));
//! let browse = app.connect_and_browse("opc.tcp://localhost:4840")?;
//! println!("{}", browse.tree.render());
//!
//! let oven = app.registry_mut().create("Oven")?;
//! oven.set_variable_selected("Temp", "ns=2;s=PLC.Line1.Temp", true)?;
//! oven.start_recording()?;
//! ```

pub mod app;
pub mod backend;
pub mod browse;
pub mod codec;
pub mod config;
pub mod error;
pub mod persistence;
pub mod recording;
pub mod types;

pub use error::{RecorderError, Result};
