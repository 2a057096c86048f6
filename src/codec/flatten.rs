//! Flattening of canonical values into named columns
//!
//! A scalar becomes one column named after its label. Sequences append
//! `[i]` and records append `.field`, recursively, so a value such as
//! `Axes = [Axis{position, homed}, ...]` yields `Axes[0].position`,
//! `Axes[0].homed`, `Axes[1].position` and so on.

use super::value::CanonicalValue;

/// Prefix of a cell whose scalar could not be rendered
pub const FORMAT_ERROR_PREFIX: &str = "Error formatting value: ";

/// Ordered `(column, display)` pairs produced by [`flatten`]
pub type FlatValues = Vec<(String, String)>;

/// Flatten `value` into columns rooted at `label`
///
/// Columns come out in structural order: sequence elements by index, record
/// fields in declaration order. An empty sequence or record still yields a
/// single `label` column (`[]` / `{}`) so a selected variable never vanishes
/// from a row. Formatting failures are rendered into the cell.
pub fn flatten(label: &str, value: &CanonicalValue) -> FlatValues {
    let mut out = Vec::new();
    flatten_into(label, value, &mut out);
    out
}

/// Flatten `value` and append the columns to `out`
pub fn flatten_into(label: &str, value: &CanonicalValue, out: &mut FlatValues) {
    match value {
        CanonicalValue::Scalar(scalar) => {
            let display = scalar
                .display_string()
                .unwrap_or_else(|reason| format!("{}{}", FORMAT_ERROR_PREFIX, reason));
            out.push((label.to_string(), display));
        }
        CanonicalValue::Sequence(items) if items.is_empty() => {
            out.push((label.to_string(), "[]".to_string()));
        }
        CanonicalValue::Sequence(items) => {
            for (i, item) in items.iter().enumerate() {
                flatten_into(&format!("{}[{}]", label, i), item, out);
            }
        }
        CanonicalValue::Record { fields, .. } if fields.is_empty() => {
            out.push((label.to_string(), "{}".to_string()));
        }
        CanonicalValue::Record { fields, .. } => {
            for (name, field) in fields {
                flatten_into(&format!("{}.{}", label, name), field, out);
            }
        }
    }
}

/// Text before the first `[` or `.` of a column name
pub fn base_label(column: &str) -> &str {
    match column.find(['[', '.']) {
        Some(i) => &column[..i],
        None => column,
    }
}
