//! Human-readable rendering of canonical values

use super::flatten::FORMAT_ERROR_PREFIX;
use super::value::{CanonicalValue, Scalar};

/// Render a value for the live view and browse annotations
///
/// Sequences render as `Array[N]:` followed by one `[i] value` line per
/// element; records render inline as `{field: value, ...}`.
pub fn format_value(value: &CanonicalValue) -> String {
    match value {
        CanonicalValue::Sequence(items) => {
            let mut out = format!("Array[{}]:", items.len());
            for (i, item) in items.iter().enumerate() {
                out.push_str(&format!("\n[{}] {}", i, format_inline(item)));
            }
            out
        }
        other => format_inline(other),
    }
}

fn format_inline(value: &CanonicalValue) -> String {
    match value {
        CanonicalValue::Scalar(scalar) => format_scalar(scalar),
        CanonicalValue::Sequence(items) => {
            let parts: Vec<String> = items.iter().map(format_inline).collect();
            format!("[{}]", parts.join(", "))
        }
        CanonicalValue::Record { fields, .. } => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(name, v)| format!("{}: {}", name, format_inline(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn format_scalar(scalar: &Scalar) -> String {
    scalar
        .display_string()
        .unwrap_or_else(|reason| format!("{}{}", FORMAT_ERROR_PREFIX, reason))
}

/// Deterministic type description of a value
///
/// Records list their fields as `Name{field: Type, ...}`; sequences give the
/// element count and the type of the first element (`Array[3] of Axis{...}`,
/// or `Array[0] of Empty`).
pub fn describe_type(value: &CanonicalValue) -> String {
    match value {
        CanonicalValue::Scalar(scalar) => scalar.type_name().to_string(),
        CanonicalValue::Record { type_name, fields } => {
            let parts: Vec<String> = fields
                .iter()
                .map(|(name, v)| format!("{}: {}", name, short_type_name(v)))
                .collect();
            format!("{}{{{}}}", type_name, parts.join(", "))
        }
        CanonicalValue::Sequence(items) => match items.first() {
            Some(first) => format!("Array[{}] of {}", items.len(), describe_type(first)),
            None => "Array[0] of Empty".to_string(),
        },
    }
}

fn short_type_name(value: &CanonicalValue) -> String {
    match value {
        CanonicalValue::Scalar(scalar) => scalar.type_name().to_string(),
        CanonicalValue::Record { type_name, .. } => type_name.clone(),
        CanonicalValue::Sequence(items) => format!("Array[{}]", items.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::value::decode;
    use crate::types::RawValue;

    fn motor() -> CanonicalValue {
        decode(&RawValue::structure(
            "MotorState",
            [
                ("speed", RawValue::Double(1450.0)),
                (
                    "limits",
                    RawValue::structure(
                        "Limits",
                        [("min", RawValue::Int(0)), ("max", RawValue::Int(3000))],
                    ),
                ),
            ],
        ))
    }

    #[test]
    fn test_format_record() {
        assert_eq!(
            format_value(&motor()),
            "{speed: 1450.0, limits: {min: 0, max: 3000}}"
        );
    }

    #[test]
    fn test_format_sequence() {
        let value = decode(&RawValue::Array(vec![
            RawValue::Boolean(true),
            RawValue::Boolean(false),
        ]));
        assert_eq!(format_value(&value), "Array[2]:\n[0] true\n[1] false");
    }

    #[test]
    fn test_format_unreadable() {
        let value = decode(&RawValue::Opaque {
            type_name: "Blob".into(),
            reason: "bad encoding".into(),
        });
        assert_eq!(format_value(&value), "Error formatting value: bad encoding");
    }

    #[test]
    fn test_describe_scalar_and_record() {
        assert_eq!(describe_type(&decode(&RawValue::Double(1.0))), "Double");
        assert_eq!(
            describe_type(&motor()),
            "MotorState{speed: Double, limits: Limits}"
        );
    }

    #[test]
    fn test_describe_sequences() {
        let axes = decode(&RawValue::Array(vec![
            RawValue::structure("Axis", [("homed", RawValue::Boolean(true))]),
            RawValue::structure("Axis", [("homed", RawValue::Boolean(false))]),
        ]));
        assert_eq!(describe_type(&axes), "Array[2] of Axis{homed: Boolean}");
        assert_eq!(
            describe_type(&CanonicalValue::Sequence(vec![])),
            "Array[0] of Empty"
        );
    }
}
