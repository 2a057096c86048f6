//! Value codec
//!
//! Turns raw values read from the server into a [`CanonicalValue`], flattens
//! canonical values into `column -> display` pairs for recorded rows, and
//! renders values and their types for display.

pub mod flatten;
pub mod format;
pub mod value;

pub use flatten::{base_label, flatten, flatten_into, FlatValues, FORMAT_ERROR_PREFIX};
pub use format::{describe_type, format_value};
pub use value::{decode, CanonicalValue, Scalar, DATETIME_FORMAT};
