//! Canonical in-memory representation of variable values

use crate::types::RawValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Timestamp format used when rendering date-time scalars
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// A primitive value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f32),
    Double(f64),
    Text(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    /// A value that could not be interpreted; rendering it fails with `reason`
    Unreadable { type_name: String, reason: String },
}

impl Scalar {
    /// Display string, or the reason the value cannot be rendered
    pub fn display_string(&self) -> Result<String, String> {
        Ok(match self {
            Scalar::Null => "null".to_string(),
            Scalar::Bool(b) => b.to_string(),
            Scalar::Int(i) => i.to_string(),
            Scalar::UInt(u) => u.to_string(),
            // Debug keeps the trailing `.0` on whole floats
            Scalar::Float(f) => format!("{:?}", f),
            Scalar::Double(d) => format!("{:?}", d),
            Scalar::Text(s) => s.clone(),
            Scalar::Bytes(bytes) => {
                let mut out = String::with_capacity(2 + bytes.len() * 2);
                out.push_str("0x");
                for b in bytes {
                    // infallible for String
                    let _ = write!(out, "{:02x}", b);
                }
                out
            }
            Scalar::DateTime(t) => t.format(DATETIME_FORMAT).to_string(),
            Scalar::Unreadable { reason, .. } => return Err(reason.clone()),
        })
    }

    /// Short type name used in type descriptions
    pub fn type_name(&self) -> &str {
        match self {
            Scalar::Null => "Null",
            Scalar::Bool(_) => "Boolean",
            Scalar::Int(_) => "Int64",
            Scalar::UInt(_) => "UInt64",
            Scalar::Float(_) => "Float",
            Scalar::Double(_) => "Double",
            Scalar::Text(_) => "String",
            Scalar::Bytes(_) => "ByteString",
            Scalar::DateTime(_) => "DateTime",
            Scalar::Unreadable { type_name, .. } => type_name,
        }
    }
}

/// Decoded value: scalar, ordered sequence, or named-field record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CanonicalValue {
    Scalar(Scalar),
    /// Elements in read order, 0-indexed
    Sequence(Vec<CanonicalValue>),
    /// Fields in declaration order
    Record {
        type_name: String,
        fields: Vec<(String, CanonicalValue)>,
    },
}

impl CanonicalValue {
    pub fn is_scalar(&self) -> bool {
        matches!(self, CanonicalValue::Scalar(_))
    }

    /// Look up a record field by name
    pub fn field(&self, name: &str) -> Option<&CanonicalValue> {
        match self {
            CanonicalValue::Record { fields, .. } => {
                fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
            }
            _ => None,
        }
    }

    /// Element `index` of a sequence
    pub fn element(&self, index: usize) -> Option<&CanonicalValue> {
        match self {
            CanonicalValue::Sequence(items) => items.get(index),
            _ => None,
        }
    }
}

impl From<Scalar> for CanonicalValue {
    fn from(s: Scalar) -> Self {
        CanonicalValue::Scalar(s)
    }
}

/// Classify a raw value into its canonical shape
///
/// Arrays become sequences and structures become records, recursively; every
/// other raw value becomes a scalar. Byte strings stay scalar.
pub fn decode(raw: &RawValue) -> CanonicalValue {
    match raw {
        RawValue::Array(items) => CanonicalValue::Sequence(items.iter().map(decode).collect()),
        RawValue::Structure { type_name, fields } => CanonicalValue::Record {
            type_name: type_name.clone(),
            fields: fields
                .iter()
                .map(|(name, value)| (name.clone(), decode(value)))
                .collect(),
        },
        RawValue::Null => Scalar::Null.into(),
        RawValue::Boolean(b) => Scalar::Bool(*b).into(),
        RawValue::Int(i) => Scalar::Int(*i).into(),
        RawValue::UInt(u) => Scalar::UInt(*u).into(),
        RawValue::Float(f) => Scalar::Float(*f).into(),
        RawValue::Double(d) => Scalar::Double(*d).into(),
        RawValue::String(s) => Scalar::Text(s.clone()).into(),
        RawValue::ByteString(b) => Scalar::Bytes(b.clone()).into(),
        RawValue::DateTime(t) => Scalar::DateTime(*t).into(),
        RawValue::Opaque { type_name, reason } => Scalar::Unreadable {
            type_name: type_name.clone(),
            reason: reason.clone(),
        }
        .into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_scalars() {
        assert_eq!(decode(&RawValue::Double(21.5)), Scalar::Double(21.5).into());
        assert_eq!(decode(&RawValue::from("ok")), Scalar::Text("ok".into()).into());
        assert_eq!(
            decode(&RawValue::ByteString(vec![1, 2])),
            Scalar::Bytes(vec![1, 2]).into()
        );
    }

    #[test]
    fn test_decode_nested_structure_keeps_field_order() {
        let raw = RawValue::structure(
            "MotorState",
            [
                ("speed", RawValue::Double(1.0)),
                (
                    "limits",
                    RawValue::structure("Limits", [("max", RawValue::Int(3))]),
                ),
                ("enabled", RawValue::Boolean(true)),
            ],
        );
        let value = decode(&raw);
        match &value {
            CanonicalValue::Record { type_name, fields } => {
                assert_eq!(type_name, "MotorState");
                let names: Vec<_> = fields.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, ["speed", "limits", "enabled"]);
            }
            other => panic!("expected record, got {:?}", other),
        }
        assert_eq!(
            value.field("limits").and_then(|l| l.field("max")),
            Some(&Scalar::Int(3).into())
        );
    }

    #[test]
    fn test_decode_array_of_structures() {
        let raw = RawValue::Array(vec![
            RawValue::structure("Axis", [("pos", RawValue::Double(0.0))]),
            RawValue::structure("Axis", [("pos", RawValue::Double(1.0))]),
        ]);
        let value = decode(&raw);
        assert!(matches!(value, CanonicalValue::Sequence(ref v) if v.len() == 2));
        assert_eq!(
            value.element(1).and_then(|e| e.field("pos")),
            Some(&Scalar::Double(1.0).into())
        );
    }

    #[test]
    fn test_decode_opaque_is_unreadable_scalar() {
        let value = decode(&RawValue::Opaque {
            type_name: "ExtensionObject".into(),
            reason: "unknown encoding".into(),
        });
        match value {
            CanonicalValue::Scalar(s) => {
                assert_eq!(s.type_name(), "ExtensionObject");
                assert_eq!(s.display_string(), Err("unknown encoding".to_string()));
            }
            other => panic!("expected scalar, got {:?}", other),
        }
    }

    #[test]
    fn test_scalar_display() {
        assert_eq!(Scalar::Double(1450.0).display_string().unwrap(), "1450.0");
        assert_eq!(Scalar::Float(21.5).display_string().unwrap(), "21.5");
        assert_eq!(Scalar::Bool(true).display_string().unwrap(), "true");
        assert_eq!(Scalar::Bytes(vec![0x0a, 0xff]).display_string().unwrap(), "0x0aff");
        assert_eq!(Scalar::Null.display_string().unwrap(), "null");
    }
}
