//! CSV persistence of recorded rows
//!
//! Rows are written in [`RecordedSchema`] order with a header line. Every
//! cell is a string; cells containing a comma, a quote, CR or LF are quoted
//! with inner quotes doubled.
//!
//! Auto-saved records go to `<records_dir>/<scenario>/record_<YYYYMMDD_HHMMSS>.csv`.

use crate::error::{RecorderError, Result, ResultExt};
use crate::recording::{FlatRow, RecordedSchema};
use chrono::{DateTime, Local};
use std::borrow::Cow;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name pattern of auto-saved records
pub const RECORD_FILE_FORMAT: &str = "record_%Y%m%d_%H%M%S";

/// Quote a CSV cell if needed
pub fn escape_csv_field(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

/// Render rows as CSV text, header first
pub fn render_csv(schema: &RecordedSchema, rows: &[FlatRow]) -> String {
    let mut out = String::new();
    push_line(&mut out, schema.columns().iter().map(String::as_str));
    for row in rows {
        push_line(&mut out, schema.render_row(row).into_iter());
    }
    out
}

fn push_line<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>) {
    for (i, cell) in cells.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&escape_csv_field(cell));
    }
    out.push('\n');
}

/// Replace characters that are not allowed in a directory name
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .trim()
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    match cleaned.as_str() {
        "" | "." | ".." => "scenario".to_string(),
        _ => cleaned,
    }
}

/// Writes recorded rows to disk
#[derive(Debug, Clone)]
pub struct PersistenceWriter {
    records_dir: PathBuf,
}

impl PersistenceWriter {
    pub fn new(records_dir: impl Into<PathBuf>) -> Self {
        Self {
            records_dir: records_dir.into(),
        }
    }

    pub fn records_dir(&self) -> &Path {
        &self.records_dir
    }

    /// Directory holding the auto-saved records of `scenario`
    pub fn scenario_dir(&self, scenario: &str) -> PathBuf {
        self.records_dir.join(sanitize_name(scenario))
    }

    /// Auto-save destination for a recording stopped at `stopped_at`
    ///
    /// A `_N` suffix is appended when a record with the same second already
    /// exists, so back-to-back recordings never overwrite each other.
    pub fn auto_save_path(&self, scenario: &str, stopped_at: DateTime<Local>) -> PathBuf {
        let dir = self.scenario_dir(scenario);
        let stem = stopped_at.format(RECORD_FILE_FORMAT).to_string();
        let mut path = dir.join(format!("{}.csv", stem));
        let mut n = 1;
        while path.exists() {
            path = dir.join(format!("{}_{}.csv", stem, n));
            n += 1;
        }
        path
    }

    /// Write `rows` to `path`, creating parent directories
    pub fn save(&self, path: &Path, rows: &[FlatRow]) -> Result<()> {
        if rows.is_empty() {
            return Err(RecorderError::Validation("No data to save".to_string()));
        }
        let schema = RecordedSchema::reconcile(rows);
        write_csv(path, &schema, rows)?;
        tracing::info!("Saved {} rows to {}", rows.len(), path.display());
        Ok(())
    }

    /// Write `rows` under the scenario directory; returns the file written
    pub fn auto_save(
        &self,
        scenario: &str,
        stopped_at: DateTime<Local>,
        rows: &[FlatRow],
    ) -> Result<PathBuf> {
        let path = self.auto_save_path(scenario, stopped_at);
        self.save(&path, rows)?;
        Ok(path)
    }
}

/// Write a schema and rows as CSV
pub fn write_csv(path: &Path, schema: &RecordedSchema, rows: &[FlatRow]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    let file = File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(render_csv(schema, rows).as_bytes())
        .and_then(|_| writer.flush())
        .with_context(|| format!("Failed to write {}", path.display()))
}
