//! Core data types shared across the recorder
//!
//! This module contains the transport-neutral vocabulary used by every other
//! component: node classes, access rights, raw values as handed over by a
//! connection, and the path-labelled index entries produced by browsing.
//!
//! # Main Types
//!
//! - [`NodeClass`] - What kind of node an address-space entry is
//! - [`AccessLevel`] - Current read/write rights of a variable node
//! - [`RawValue`] - A value as read from the server, before decoding
//! - [`PathEntry`] - `pathLabel → nodeId` pair for directories and variables
//! - [`ConnectionStatus`] - State of the server session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Separator used when joining display names into a path label
pub const PATH_SEPARATOR: char = '/';

/// Class of a node in the remote address space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum NodeClass {
    /// Folder-like object node
    Object,
    /// Node exposing a readable value
    Variable,
    /// Callable method
    Method,
    /// Object type definition
    ObjectType,
    /// Variable type definition
    VariableType,
    /// Reference type definition
    ReferenceType,
    /// Data type definition
    DataType,
    /// View node
    View,
    /// Class could not be determined
    #[default]
    Unspecified,
}

impl NodeClass {
    /// Returns true for variable nodes
    pub fn is_variable(&self) -> bool {
        matches!(self, NodeClass::Variable)
    }
}

impl std::fmt::Display for NodeClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            NodeClass::Object => "Object",
            NodeClass::Variable => "Variable",
            NodeClass::Method => "Method",
            NodeClass::ObjectType => "ObjectType",
            NodeClass::VariableType => "VariableType",
            NodeClass::ReferenceType => "ReferenceType",
            NodeClass::DataType => "DataType",
            NodeClass::View => "View",
            NodeClass::Unspecified => "Unspecified",
        };
        write!(f, "{}", name)
    }
}

/// Access rights bitmask of a variable node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AccessLevel(pub u8);

impl AccessLevel {
    /// The current value can be read
    pub const CURRENT_READ: u8 = 0x01;
    /// The current value can be written
    pub const CURRENT_WRITE: u8 = 0x02;

    /// Read-only access
    pub fn read_only() -> Self {
        Self(Self::CURRENT_READ)
    }

    /// Read and write access
    pub fn read_write() -> Self {
        Self(Self::CURRENT_READ | Self::CURRENT_WRITE)
    }

    pub fn can_read(&self) -> bool {
        self.0 & Self::CURRENT_READ != 0
    }

    pub fn can_write(&self) -> bool {
        self.0 & Self::CURRENT_WRITE != 0
    }
}

impl std::fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut parts = Vec::with_capacity(2);
        if self.can_read() {
            parts.push("Read");
        }
        if self.can_write() {
            parts.push("Write");
        }
        write!(f, "{}", parts.join(" & "))
    }
}

/// A value as delivered by a connection, before decoding
///
/// Connections translate their native encoding into this shape. Arrays and
/// structures nest arbitrarily; structure fields keep declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    /// Empty variant
    Null,
    /// Boolean value
    Boolean(bool),
    /// Signed integer of any width
    Int(i64),
    /// Unsigned integer of any width
    UInt(u64),
    /// 32-bit floating point
    Float(f32),
    /// 64-bit floating point
    Double(f64),
    /// Text
    String(String),
    /// Opaque bytes
    ByteString(Vec<u8>),
    /// Point in time
    DateTime(DateTime<Utc>),
    /// Ordered list of values
    Array(Vec<RawValue>),
    /// Named-field structure
    Structure {
        /// Declared type name, e.g. `MotorState`
        type_name: String,
        /// Fields in declaration order
        fields: Vec<(String, RawValue)>,
    },
    /// An encoded value the connection could not interpret
    Opaque {
        /// Declared type name, if known
        type_name: String,
        /// Why decoding failed
        reason: String,
    },
}

impl RawValue {
    /// Build a structure from `(name, value)` pairs
    pub fn structure<S: Into<String>>(
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = (S, RawValue)>,
    ) -> Self {
        RawValue::Structure {
            type_name: type_name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl From<f64> for RawValue {
    fn from(v: f64) -> Self {
        RawValue::Double(v)
    }
}

impl From<i64> for RawValue {
    fn from(v: i64) -> Self {
        RawValue::Int(v)
    }
}

impl From<bool> for RawValue {
    fn from(v: bool) -> Self {
        RawValue::Boolean(v)
    }
}

impl From<&str> for RawValue {
    fn from(v: &str) -> Self {
        RawValue::String(v.to_string())
    }
}

/// Connection status to the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionStatus {
    /// Not connected to any server
    #[default]
    Disconnected,
    /// Attempting to connect
    Connecting,
    /// Connected and ready
    Connected,
    /// Connection error occurred
    Error,
}

impl std::fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionStatus::Disconnected => write!(f, "Disconnected"),
            ConnectionStatus::Connecting => write!(f, "Connecting..."),
            ConnectionStatus::Connected => write!(f, "Connected"),
            ConnectionStatus::Error => write!(f, "Error"),
        }
    }
}

/// A `pathLabel → nodeId` pair produced while walking the address space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    /// `/`-joined display names from the traversal root
    pub path_label: String,
    /// Transport-defined node identifier
    pub node_id: String,
}

impl PathEntry {
    pub fn new(path_label: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            path_label: path_label.into(),
            node_id: node_id.into(),
        }
    }

    /// The last segment of the path label
    pub fn display_name(&self) -> &str {
        self.path_label
            .rsplit(PATH_SEPARATOR)
            .next()
            .unwrap_or(&self.path_label)
    }
}

/// A non-variable node with at least one child
pub type DirectoryEntry = PathEntry;

/// A variable-class node
pub type VariableEntry = PathEntry;

/// Join a parent path label and a display name
pub fn join_path(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{}{}{}", parent, PATH_SEPARATOR, name)
    }
}
