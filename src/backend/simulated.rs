//! Simulated Server Implementation
//!
//! This module provides an in-memory address space that implements the
//! [`Connector`], [`Connection`] and [`NodeHandle`] traits. It is used by the
//! binary's `--simulate` mode and by the test-suite, so the recorder can be
//! exercised without a real automation server.
//!
//! # Features
//!
//! - **Pattern-based values**: each variable produces values from a [`ValuePattern`]
//! - **Structured values**: arrays and named-field structures nest freely
//! - **Fault injection**: any attribute read of any node can be made to fail at runtime
//! - **Connection lifecycle**: reads after `disconnect` fail instead of panicking
//!
//! # Value Patterns
//!
//! - [`ValuePattern::Constant`] - Fixed value (scalars or structures)
//! - [`ValuePattern::Sine`] - Sinusoidal wave over wall-clock time
//! - [`ValuePattern::Counter`] - Incrementing counter with wrap-around
//! - [`ValuePattern::Cycle`] - Successive values from a list, repeating
//!
//! # Example
//!
//! ```ignore
//! use opc_recorder::backend::{SimulatedServer, ValuePattern, OBJECTS_NODE_ID};
//!
//! let server = SimulatedServer::new();
//! server.add_folder(OBJECTS_NODE_ID, "ns=2;s=PLC", "PLC")?;
//! server.add_variable("ns=2;s=PLC", "ns=2;i=5", "Temp", ValuePattern::Constant(21.5.into()))?;
//!
//! let connection = server.connect("opc.tcp://localhost:4840")?;
//! let value = connection.read_value("ns=2;i=5")?;
//! ```

use crate::error::{RecorderError, Result};
use crate::types::{AccessLevel, NodeClass, RawValue};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::node_trait::{Connection, Connector, NodeHandle, NodeRef, SharedConnection};

/// Node id of the address-space root
pub const ROOT_NODE_ID: &str = "i=84";
/// Node id of the standard `Objects` folder
pub const OBJECTS_NODE_ID: &str = "i=85";
/// URL scheme accepted by the simulated connector
pub const URL_SCHEME: &str = "opc.tcp://";

/// Pattern for generating variable values
#[derive(Debug, Clone, PartialEq)]
pub enum ValuePattern {
    /// Constant value
    Constant(RawValue),
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments on every read
    Counter { step: i64, min: i64, max: i64 },
    /// Values returned in order, starting over after the last one
    Cycle(Vec<RawValue>),
}

/// Attribute reads that can be made to fail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
    DisplayName,
    NodeClass,
    Children,
    Value,
    Description,
    AccessLevel,
}

#[derive(Debug)]
struct ValueState {
    pattern: ValuePattern,
    counter_value: i64,
    cycle_index: usize,
}

impl ValueState {
    fn new(pattern: ValuePattern) -> Self {
        let counter_value = match pattern {
            ValuePattern::Counter { min, step, .. } => min - step,
            _ => 0,
        };
        Self {
            pattern,
            counter_value,
            cycle_index: 0,
        }
    }

    fn next_value(&mut self, elapsed_secs: f64) -> RawValue {
        match &self.pattern {
            ValuePattern::Constant(v) => v.clone(),
            ValuePattern::Sine {
                frequency,
                amplitude,
                offset,
            } => RawValue::Double(
                offset + amplitude * (2.0 * std::f64::consts::PI * frequency * elapsed_secs).sin(),
            ),
            ValuePattern::Counter { step, min, max } => {
                self.counter_value += step;
                if self.counter_value > *max {
                    self.counter_value = *min;
                } else if self.counter_value < *min {
                    self.counter_value = *max;
                }
                RawValue::Int(self.counter_value)
            }
            ValuePattern::Cycle(values) => {
                if values.is_empty() {
                    return RawValue::Null;
                }
                let value = values[self.cycle_index % values.len()].clone();
                self.cycle_index = (self.cycle_index + 1) % values.len();
                value
            }
        }
    }
}

#[derive(Debug)]
struct SimNodeData {
    display_name: String,
    class: NodeClass,
    children: Vec<String>,
    value: Option<ValueState>,
    description: Option<String>,
    access: AccessLevel,
    faults: HashMap<Fault, String>,
}

impl SimNodeData {
    fn new(display_name: &str, class: NodeClass) -> Self {
        Self {
            display_name: display_name.to_string(),
            class,
            children: Vec::new(),
            value: None,
            description: None,
            access: AccessLevel::read_only(),
            faults: HashMap::new(),
        }
    }

    fn check(&self, node_id: &str, fault: Fault) -> Result<()> {
        match self.faults.get(&fault) {
            Some(message) => Err(RecorderError::read(node_id, message.clone())),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
struct AddressSpace {
    nodes: HashMap<String, SimNodeData>,
}

#[derive(Debug)]
struct ServerShared {
    space: Mutex<AddressSpace>,
    started: Instant,
    refuse_reason: Mutex<Option<String>>,
    read_latency: Mutex<Duration>,
    read_timeout: Mutex<Option<Duration>>,
}

impl ServerShared {
    fn space(&self) -> MutexGuard<'_, AddressSpace> {
        self.space.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// In-memory server with a mutable address space
///
/// Cloning is cheap; clones share the same address space, so tests can keep
/// a handle to inject faults while scenarios read through a connection.
#[derive(Debug, Clone)]
pub struct SimulatedServer {
    shared: Arc<ServerShared>,
}

impl Default for SimulatedServer {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedServer {
    /// Create a server holding only `Root` and `Root/Objects`
    pub fn new() -> Self {
        let mut space = AddressSpace::default();
        let mut root = SimNodeData::new("Root", NodeClass::Object);
        root.children.push(OBJECTS_NODE_ID.to_string());
        space.nodes.insert(ROOT_NODE_ID.to_string(), root);
        space.nodes.insert(
            OBJECTS_NODE_ID.to_string(),
            SimNodeData::new("Objects", NodeClass::Object),
        );

        Self {
            shared: Arc::new(ServerShared {
                space: Mutex::new(space),
                started: Instant::now(),
                refuse_reason: Mutex::new(None),
                read_latency: Mutex::new(Duration::ZERO),
                read_timeout: Mutex::new(None),
            }),
        }
    }

    /// A small plant used by the binary's `--simulate` mode
    ///
    /// ```text
    /// Root
    /// +-- Objects
    ///     +-- Server          (skipped by the default path filter)
    ///     +-- PLC
    ///         +-- Line1
    ///         |   +-- Temp, Pressure, Counter, Status
    ///         +-- Drives
    ///             +-- Motor   (structure with a nested structure)
    ///             +-- Axes    (array of structures)
    ///             +-- Flags   (array of booleans)
    /// ```
    pub fn demo() -> Result<Self> {
        let server = Self::new();
        server.add_folder(OBJECTS_NODE_ID, "i=2253", "Server")?;
        server.add_variable(
            "i=2253",
            "i=2256",
            "ServerStatus",
            ValuePattern::Constant(RawValue::from("Running")),
        )?;

        server.add_folder(OBJECTS_NODE_ID, "ns=2;s=PLC", "PLC")?;
        server.add_folder("ns=2;s=PLC", "ns=2;s=PLC.Line1", "Line1")?;
        server.add_variable(
            "ns=2;s=PLC.Line1",
            "ns=2;s=PLC.Line1.Temp",
            "Temp",
            ValuePattern::Sine {
                frequency: 0.1,
                amplitude: 2.5,
                offset: 21.5,
            },
        )?;
        server.set_description("ns=2;s=PLC.Line1.Temp", "Line 1 oven temperature")?;
        server.add_variable(
            "ns=2;s=PLC.Line1",
            "ns=2;s=PLC.Line1.Pressure",
            "Pressure",
            ValuePattern::Sine {
                frequency: 0.5,
                amplitude: 0.2,
                offset: 1.013,
            },
        )?;
        server.add_variable(
            "ns=2;s=PLC.Line1",
            "ns=2;s=PLC.Line1.Counter",
            "Counter",
            ValuePattern::Counter {
                step: 1,
                min: 0,
                max: 9999,
            },
        )?;
        server.set_access_level("ns=2;s=PLC.Line1.Counter", AccessLevel::read_write())?;
        server.add_variable(
            "ns=2;s=PLC.Line1",
            "ns=2;s=PLC.Line1.Status",
            "Status",
            ValuePattern::Cycle(vec![
                RawValue::from("idle"),
                RawValue::from("running, nominal"),
                RawValue::from("running, \"warm\""),
            ]),
        )?;

        server.add_folder("ns=2;s=PLC", "ns=2;s=PLC.Drives", "Drives")?;
        server.add_variable(
            "ns=2;s=PLC.Drives",
            "ns=2;s=PLC.Drives.Motor",
            "Motor",
            ValuePattern::Constant(RawValue::structure(
                "MotorState",
                [
                    ("speed", RawValue::Double(1450.0)),
                    ("enabled", RawValue::Boolean(true)),
                    (
                        "limits",
                        RawValue::structure(
                            "Limits",
                            [("min", RawValue::Int(0)), ("max", RawValue::Int(3000))],
                        ),
                    ),
                ],
            )),
        )?;
        server.add_variable(
            "ns=2;s=PLC.Drives",
            "ns=2;s=PLC.Drives.Axes",
            "Axes",
            ValuePattern::Constant(RawValue::Array(
                (0..3)
                    .map(|i| {
                        RawValue::structure(
                            "Axis",
                            [
                                ("position", RawValue::Double(i as f64 * 10.0)),
                                ("homed", RawValue::Boolean(i != 2)),
                            ],
                        )
                    })
                    .collect(),
            )),
        )?;
        server.add_variable(
            "ns=2;s=PLC.Drives",
            "ns=2;s=PLC.Drives.Flags",
            "Flags",
            ValuePattern::Constant(RawValue::Array(vec![
                RawValue::Boolean(true),
                RawValue::Boolean(false),
            ])),
        )?;

        Ok(server)
    }

    /// Add a folder node under `parent`
    pub fn add_folder(&self, parent: &str, node_id: &str, name: &str) -> Result<()> {
        self.insert(parent, node_id, SimNodeData::new(name, NodeClass::Object))
    }

    /// Add a variable node under `parent`
    pub fn add_variable(
        &self,
        parent: &str,
        node_id: &str,
        name: &str,
        pattern: ValuePattern,
    ) -> Result<()> {
        let mut data = SimNodeData::new(name, NodeClass::Variable);
        data.value = Some(ValueState::new(pattern));
        self.insert(parent, node_id, data)
    }

    /// Add an extra reference from `parent` to an existing node
    pub fn link(&self, parent: &str, child: &str) -> Result<()> {
        let mut space = self.shared.space();
        if !space.nodes.contains_key(child) {
            return Err(RecorderError::Validation(format!("Unknown node {}", child)));
        }
        let parent_node = space
            .nodes
            .get_mut(parent)
            .ok_or_else(|| RecorderError::Validation(format!("Unknown parent {}", parent)))?;
        parent_node.children.push(child.to_string());
        Ok(())
    }

    /// Replace the value pattern of a variable
    pub fn set_pattern(&self, node_id: &str, pattern: ValuePattern) -> Result<()> {
        self.with_node(node_id, |node| node.value = Some(ValueState::new(pattern)))
    }

    pub fn set_description(&self, node_id: &str, description: &str) -> Result<()> {
        let description = description.to_string();
        self.with_node(node_id, |node| node.description = Some(description))
    }

    pub fn set_access_level(&self, node_id: &str, access: AccessLevel) -> Result<()> {
        self.with_node(node_id, |node| node.access = access)
    }

    /// Make reads of `fault` on `node_id` fail with `message`, or clear the fault
    pub fn set_fault(&self, node_id: &str, fault: Fault, message: Option<&str>) -> Result<()> {
        self.with_node(node_id, |node| match message {
            Some(m) => {
                node.faults.insert(fault, m.to_string());
            }
            None => {
                node.faults.remove(&fault);
            }
        })
    }

    /// Refuse future connection attempts with `reason`, or accept them again
    pub fn refuse_connections(&self, reason: Option<&str>) {
        *self
            .shared
            .refuse_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = reason.map(str::to_string);
    }

    /// Artificial delay applied to every value read
    pub fn set_read_latency(&self, latency: Duration) {
        *self
            .shared
            .read_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = latency;
    }

    /// Number of nodes in the address space
    pub fn node_count(&self) -> usize {
        self.shared.space().nodes.len()
    }

    fn insert(&self, parent: &str, node_id: &str, data: SimNodeData) -> Result<()> {
        let mut space = self.shared.space();
        if space.nodes.contains_key(node_id) {
            return Err(RecorderError::Validation(format!(
                "Node {} already exists",
                node_id
            )));
        }
        let parent_node = space
            .nodes
            .get_mut(parent)
            .ok_or_else(|| RecorderError::Validation(format!("Unknown parent {}", parent)))?;
        parent_node.children.push(node_id.to_string());
        space.nodes.insert(node_id.to_string(), data);
        Ok(())
    }

    fn with_node<F>(&self, node_id: &str, f: F) -> Result<()>
    where
        F: FnOnce(&mut SimNodeData),
    {
        let mut space = self.shared.space();
        let node = space
            .nodes
            .get_mut(node_id)
            .ok_or_else(|| RecorderError::Validation(format!("Unknown node {}", node_id)))?;
        f(node);
        Ok(())
    }
}

impl Connector for SimulatedServer {
    fn connect(&self, url: &str) -> Result<SharedConnection> {
        if !url.starts_with(URL_SCHEME) {
            return Err(RecorderError::Connection(format!(
                "Invalid endpoint URL '{}': expected {}host:port",
                url, URL_SCHEME
            )));
        }
        if let Some(reason) = self
            .shared
            .refuse_reason
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
        {
            return Err(RecorderError::Connection(reason));
        }

        tracing::debug!("Simulated server accepted connection to {}", url);
        Ok(Arc::new(SimConnection {
            endpoint: url.to_string(),
            shared: Arc::clone(&self.shared),
            connected: Arc::new(AtomicBool::new(true)),
        }))
    }

    /// Reads slower than `timeout` fail with [`RecorderError::Timeout`]
    fn set_read_timeout(&self, timeout: Option<Duration>) {
        *self
            .shared
            .read_timeout
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = timeout;
    }
}

/// Connection to a [`SimulatedServer`]
#[derive(Debug)]
pub struct SimConnection {
    endpoint: String,
    shared: Arc<ServerShared>,
    connected: Arc<AtomicBool>,
}

impl SimConnection {
    fn handle(&self, node_id: &str) -> NodeRef {
        Arc::new(SimNode {
            node_id: node_id.to_string(),
            shared: Arc::clone(&self.shared),
            connected: Arc::clone(&self.connected),
        })
    }
}

impl Connection for SimConnection {
    fn endpoint(&self) -> String {
        self.endpoint.clone()
    }

    fn root(&self) -> Result<NodeRef> {
        self.node(ROOT_NODE_ID)
    }

    fn node(&self, node_id: &str) -> Result<NodeRef> {
        if !self.is_connected() {
            return Err(RecorderError::Connection("Connection closed".to_string()));
        }
        if !self.shared.space().nodes.contains_key(node_id) {
            return Err(RecorderError::read(node_id, "BadNodeIdUnknown"));
        }
        Ok(self.handle(node_id))
    }

    fn disconnect(&self) {
        if self.connected.swap(false, Ordering::SeqCst) {
            tracing::debug!("Simulated connection to {} closed", self.endpoint);
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Node handle into a [`SimulatedServer`]
#[derive(Debug)]
struct SimNode {
    node_id: String,
    shared: Arc<ServerShared>,
    connected: Arc<AtomicBool>,
}

impl SimNode {
    fn with_data<T, F>(&self, fault: Fault, f: F) -> Result<T>
    where
        F: FnOnce(&mut SimNodeData) -> Result<T>,
    {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(RecorderError::Connection("Connection closed".to_string()));
        }
        let mut space = self.shared.space();
        let data = space
            .nodes
            .get_mut(&self.node_id)
            .ok_or_else(|| RecorderError::read(&self.node_id, "BadNodeIdUnknown"))?;
        data.check(&self.node_id, fault)?;
        f(data)
    }

    fn apply_latency(&self) -> Result<()> {
        let latency = *self
            .shared
            .read_latency
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let timeout = *self
            .shared
            .read_timeout
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        match timeout {
            Some(limit) if latency >= limit => {
                std::thread::sleep(limit);
                Err(RecorderError::Timeout(format!(
                    "Read of {} exceeded {} ms",
                    self.node_id,
                    limit.as_millis()
                )))
            }
            _ => {
                if !latency.is_zero() {
                    std::thread::sleep(latency);
                }
                Ok(())
            }
        }
    }
}

impl NodeHandle for SimNode {
    fn node_id(&self) -> String {
        self.node_id.clone()
    }

    fn display_name(&self) -> Result<String> {
        self.with_data(Fault::DisplayName, |d| Ok(d.display_name.clone()))
    }

    fn node_class(&self) -> Result<NodeClass> {
        self.with_data(Fault::NodeClass, |d| Ok(d.class))
    }

    fn children(&self) -> Result<Vec<NodeRef>> {
        let ids = self.with_data(Fault::Children, |d| Ok(d.children.clone()))?;
        Ok(ids
            .into_iter()
            .map(|id| -> NodeRef {
                Arc::new(SimNode {
                    node_id: id,
                    shared: Arc::clone(&self.shared),
                    connected: Arc::clone(&self.connected),
                })
            })
            .collect())
    }

    fn read_value(&self) -> Result<RawValue> {
        self.apply_latency()?;
        let elapsed = self.shared.started.elapsed().as_secs_f64();
        let node_id = self.node_id.clone();
        self.with_data(Fault::Value, move |d| match d.value.as_mut() {
            Some(state) => Ok(state.next_value(elapsed)),
            None => Err(RecorderError::read(node_id, "BadAttributeIdInvalid")),
        })
    }

    fn description(&self) -> Result<Option<String>> {
        self.with_data(Fault::Description, |d| Ok(d.description.clone()))
    }

    fn access_level(&self) -> Result<AccessLevel> {
        self.with_data(Fault::AccessLevel, |d| Ok(d.access))
    }
}
