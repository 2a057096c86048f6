//! Backend module for talking to the automation server
//!
//! Everything transport-specific lives behind the traits in [`node_trait`];
//! the rest of the crate never sees a concrete client.
//!
//! # Components
//!
//! - [`NodeHandle`] / [`Connection`] / [`Connector`] - Capability traits over the remote address space
//! - [`ReadStats`] - Success rate and latency tracking for value reads
//! - [`ServerSession`] - Owns the single connection of a logical session
//! - [`SimulatedServer`] - In-memory address space for demos and tests
//!
//! # Example
//!
//! ```ignore
//! use opc_recorder::backend::{ServerSession, SimulatedServer};
//! use std::sync::Arc;
//!
//! let server = SimulatedServer::demo()?;
//! let mut session = ServerSession::new(Arc::new(server));
//! let connection = session.connect("opc.tcp://localhost:4840")?;
//! let root = connection.root()?;
//! ```

pub mod node_trait;
pub mod session;
pub mod simulated;

pub use node_trait::{Connection, Connector, NodeHandle, NodeRef, ReadStats, SharedConnection};
pub use session::ServerSession;
pub use simulated::{
    Fault, SimConnection, SimulatedServer, ValuePattern, OBJECTS_NODE_ID, ROOT_NODE_ID,
};
