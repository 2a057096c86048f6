//! Rows, schemas, settings and events of recording scenarios

use crate::codec::{base_label, FlatValues};
use crate::config::{
    DEFAULT_AUTO_SAVE, DEFAULT_INTERVAL_MS, DEFAULT_LIVE_UPDATE_INTERVAL_MS, DEFAULT_RECORDS_DIR,
    DEFAULT_TARGET_COUNT,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the mandatory first column
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Format of row timestamps (millisecond precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// One sample: a timestamp plus `column -> display` cells
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    pub timestamp: String,
    cells: BTreeMap<String, String>,
}

impl FlatRow {
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            timestamp: timestamp.into(),
            cells: BTreeMap::new(),
        }
    }

    /// Set a cell; an existing column is overwritten
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.cells.insert(column.into(), value.into());
    }

    /// Merge flattened values into the row, last write wins
    pub fn extend(&mut self, values: FlatValues) {
        self.cells.extend(values);
    }

    /// Cell of `column`; `timestamp` resolves to the row timestamp
    pub fn get(&self, column: &str) -> Option<&str> {
        if column == TIMESTAMP_COLUMN {
            Some(&self.timestamp)
        } else {
            self.cells.get(column).map(String::as_str)
        }
    }

    /// Non-timestamp columns present in this row
    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    /// Number of non-timestamp cells
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Stable column order over a set of rows
///
/// `timestamp` comes first. Every other column seen in any row follows,
/// grouped by base label (text before the first `[` or `.`); groups are
/// sorted and columns are sorted within each group.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RecordedSchema {
    columns: Vec<String>,
}

impl RecordedSchema {
    pub fn reconcile<'a>(rows: impl IntoIterator<Item = &'a FlatRow>) -> Self {
        let mut seen = BTreeSet::new();
        for row in rows {
            seen.extend(row.columns().filter(|c| *c != TIMESTAMP_COLUMN));
        }
        Self::from_columns(seen)
    }

    /// Schema over an explicit set of columns
    pub fn from_columns<'a>(columns: impl IntoIterator<Item = &'a str>) -> Self {
        let mut groups: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
        for column in columns {
            if column == TIMESTAMP_COLUMN {
                continue;
            }
            groups.entry(base_label(column)).or_default().insert(column);
        }

        let mut ordered = Vec::with_capacity(1 + groups.values().map(BTreeSet::len).sum::<usize>());
        ordered.push(TIMESTAMP_COLUMN.to_string());
        for group in groups.values() {
            ordered.extend(group.iter().map(|c| c.to_string()));
        }
        Self { columns: ordered }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Cells of `row` in schema order; missing cells are empty
    pub fn render_row<'a>(&self, row: &'a FlatRow) -> Vec<&'a str> {
        self.columns
            .iter()
            .map(|c| row.get(c).unwrap_or(""))
            .collect()
    }
}

/// Whether a scenario is sampling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScenarioState {
    Idle,
    Recording,
}

impl std::fmt::Display for ScenarioState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioState::Idle => write!(f, "Idle"),
            ScenarioState::Recording => write!(f, "Recording"),
        }
    }
}

/// Why a recording ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopReason {
    /// The target sample count was reached
    TargetReached,
    /// `stop_recording` was called
    Manual,
    /// The application is shutting down
    Shutdown,
    /// The scenario was closed while recording
    Closed,
}

/// A variable chosen for recording
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectedVariable {
    /// Column label, `<directory>/<display name>` when picked from a directory
    pub label: String,
    pub node_id: String,
    /// Whether the live view refreshes this variable
    pub live: bool,
}

impl SelectedVariable {
    pub fn new(label: impl Into<String>, node_id: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            node_id: node_id.into(),
            live: true,
        }
    }
}

/// Per-scenario recording parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScenarioSettings {
    pub interval: Duration,
    pub target_count: usize,
    pub auto_save: bool,
    /// Base directory of auto-saved records
    pub records_dir: PathBuf,
    pub live_interval: Duration,
}

impl Default for ScenarioSettings {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_INTERVAL_MS),
            target_count: DEFAULT_TARGET_COUNT,
            auto_save: DEFAULT_AUTO_SAVE,
            records_dir: PathBuf::from(DEFAULT_RECORDS_DIR),
            live_interval: Duration::from_millis(DEFAULT_LIVE_UPDATE_INTERVAL_MS),
        }
    }
}

/// Notifications emitted by scenarios
#[derive(Debug, Clone, PartialEq)]
pub enum ScenarioEvent {
    RecordingStarted {
        scenario: String,
        columns: Vec<String>,
    },
    RowRecorded {
        scenario: String,
        sample: usize,
    },
    RecordingStopped {
        scenario: String,
        reason: StopReason,
        rows: usize,
    },
    AutoSaved {
        scenario: String,
        path: PathBuf,
    },
    AutoSaveFailed {
        scenario: String,
        error: String,
    },
    LiveUpdated {
        scenario: String,
    },
}

impl ScenarioEvent {
    /// Name of the scenario that emitted the event
    pub fn scenario(&self) -> &str {
        match self {
            ScenarioEvent::RecordingStarted { scenario, .. }
            | ScenarioEvent::RowRecorded { scenario, .. }
            | ScenarioEvent::RecordingStopped { scenario, .. }
            | ScenarioEvent::AutoSaved { scenario, .. }
            | ScenarioEvent::AutoSaveFailed { scenario, .. }
            | ScenarioEvent::LiveUpdated { scenario } => scenario,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn row(ts: &str, cells: &[(&str, &str)]) -> FlatRow {
        let mut row = FlatRow::new(ts);
        for (c, v) in cells {
            row.insert(*c, *v);
        }
        row
    }

    #[test]
    fn test_schema_groups_by_base_label() {
        let rows = vec![row(
            "t0",
            &[
                ("Motor.speed", "1"),
                ("AB", "2"),
                ("Axes[1].homed", "x"),
                ("A.x", "3"),
                ("Axes[0].homed", "y"),
                ("A[0]", "4"),
            ],
        )];
        let schema = RecordedSchema::reconcile(&rows);
        assert_eq!(
            schema.columns(),
            [
                "timestamp",
                "A.x",
                "A[0]",
                "AB",
                "Axes[0].homed",
                "Axes[1].homed",
                "Motor.speed"
            ]
        );
    }

    #[test]
    fn test_late_column_appears_once_and_renders_empty_elsewhere() {
        let rows = vec![
            row("t0", &[("Temp", "21.5")]),
            row("t1", &[("Temp", "21.6")]),
            row("t2", &[("Temp", "21.4"), ("Extra", "1")]),
        ];
        let schema = RecordedSchema::reconcile(&rows);
        assert_eq!(schema.columns(), ["timestamp", "Extra", "Temp"]);
        assert_eq!(schema.render_row(&rows[0]), ["t0", "", "21.5"]);
        assert_eq!(schema.render_row(&rows[2]), ["t2", "1", "21.4"]);
    }

    #[test]
    fn test_row_last_write_wins() {
        let mut r = FlatRow::new("t");
        r.extend(vec![("a".into(), "1".into())]);
        r.extend(vec![("a".into(), "2".into())]);
        assert_eq!(r.get("a"), Some("2"));
        assert_eq!(r.get(TIMESTAMP_COLUMN), Some("t"));
        assert_eq!(r.len(), 1);
    }

    proptest! {
        #[test]
        fn prop_schema_starts_with_timestamp_and_has_no_duplicates(
            rows in prop::collection::vec(
                prop::collection::btree_set("[A-Ca-c]{1,3}(\\[[0-2]\\]|\\.[xy])?", 0..6),
                1..6,
            )
        ) {
            let flat: Vec<FlatRow> = rows
                .iter()
                .map(|cols| {
                    let mut r = FlatRow::new("t");
                    for c in cols {
                        r.insert(c.clone(), "v");
                    }
                    r
                })
                .collect();
            let schema = RecordedSchema::reconcile(&flat);
            prop_assert_eq!(schema.columns()[0].as_str(), TIMESTAMP_COLUMN);

            let unique: BTreeSet<_> = schema.columns().iter().collect();
            prop_assert_eq!(unique.len(), schema.len());

            let expected: BTreeSet<&String> = rows.iter().flatten().collect();
            prop_assert_eq!(schema.len(), expected.len() + 1);
            for r in &flat {
                prop_assert_eq!(schema.render_row(r).len(), schema.len());
            }
        }
    }
}
