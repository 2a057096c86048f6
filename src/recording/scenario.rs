//! One recording scenario
//!
//! A scenario owns a variable selection and two independent schedules: the
//! recording tick, which appends one [`FlatRow`] per interval until the target
//! count is reached, and the live tick, which refreshes the [`LiveEntry`] view.
//!
//! All state sits behind one mutex. Remote reads happen with the lock
//! released; each tick captures the recording generation first and drops its
//! row if the generation changed meanwhile, so a tick that was in flight
//! during `stop_recording` can never append to a later recording. At most one
//! sample is in flight at a time, however many threads poll the scenario.

use crate::backend::{ReadStats, SharedConnection};
use crate::browse::PathIndex;
use crate::codec::{decode, flatten};
use crate::error::{RecorderError, Result};
use crate::persistence::PersistenceWriter;
use crate::types::PathEntry;
use crossbeam_channel::Sender;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use super::live::{list_directory_candidates, read_live_entry, DirectoryCandidate, LiveEntry};
use super::schedule::{SharedClock, Timer};
use super::types::{
    FlatRow, RecordedSchema, ScenarioEvent, ScenarioSettings, ScenarioState, SelectedVariable,
    StopReason, TIMESTAMP_COLUMN, TIMESTAMP_FORMAT,
};

struct ScenarioInner {
    connection: Option<SharedConnection>,
    settings: ScenarioSettings,
    directories: PathIndex,
    current_directory: Option<PathEntry>,
    candidates: Vec<DirectoryCandidate>,
    selection: Vec<SelectedVariable>,
    /// Selection labels fixed when the recording started
    headers: Vec<String>,
    rows: Vec<FlatRow>,
    sample_count: usize,
    recording: bool,
    /// Bumped on every start and stop of a recording
    generation: u64,
    record_timer: Option<Timer>,
    /// Set while a recording tick reads with the lock released
    sampling: bool,
    live_updating: bool,
    /// Bumped whenever live updates stop
    live_generation: u64,
    live_timer: Option<Timer>,
    live: Vec<LiveEntry>,
    stats: ReadStats,
    last_saved: Option<PathBuf>,
}

/// Work captured under the lock for one recording tick
struct SampleJob {
    generation: u64,
    connection: Option<SharedConnection>,
    selection: Vec<SelectedVariable>,
}

/// Work captured under the lock for one live tick
struct LiveJob {
    generation: u64,
    connection: SharedConnection,
    selection: Vec<SelectedVariable>,
}

/// A named, independently scheduled recording
pub struct RecordingScenario {
    name: String,
    clock: SharedClock,
    events: Sender<ScenarioEvent>,
    inner: Mutex<ScenarioInner>,
}

impl std::fmt::Debug for RecordingScenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut out = f.debug_struct("RecordingScenario");
        out.field("name", &self.name);
        // never block inside a formatter
        if let Ok(inner) = self.inner.try_lock() {
            out.field("recording", &inner.recording)
                .field("sample_count", &inner.sample_count)
                .field("selection", &inner.selection.len());
        }
        out.finish()
    }
}

impl RecordingScenario {
    pub fn new(
        name: impl Into<String>,
        settings: ScenarioSettings,
        clock: SharedClock,
        events: Sender<ScenarioEvent>,
    ) -> Self {
        Self {
            name: name.into(),
            clock,
            events,
            inner: Mutex::new(ScenarioInner {
                connection: None,
                settings,
                directories: PathIndex::new(),
                current_directory: None,
                candidates: Vec::new(),
                selection: Vec::new(),
                headers: Vec::new(),
                rows: Vec::new(),
                sample_count: 0,
                recording: false,
                generation: 0,
                record_timer: None,
                sampling: false,
                live_updating: false,
                live_generation: 0,
                live_timer: None,
                live: Vec::new(),
                stats: ReadStats::default(),
                last_saved: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, ScenarioInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: ScenarioEvent) {
        if self.events.try_send(event).is_err() {
            tracing::trace!("Event queue full, dropping event of {}", self.name);
        }
    }

    // ==================== Connection & Directories ====================

    /// Hand the scenario a new connection, or take it away
    pub fn set_connection(&self, connection: Option<SharedConnection>) {
        let mut inner = self.lock();
        inner.connection = connection;
        inner.candidates.clear();
        inner.current_directory = None;
        self.refresh_live_state(&mut inner);
    }

    pub fn is_connected(&self) -> bool {
        self.lock()
            .connection
            .as_ref()
            .is_some_and(|c| c.is_connected())
    }

    /// Replace the directories offered for browsing
    pub fn update_directories(&self, directories: &PathIndex) {
        let mut inner = self.lock();
        inner.directories = directories.clone();
        let stale = inner
            .current_directory
            .as_ref()
            .is_some_and(|d| directories.get(&d.path_label) != Some(d.node_id.as_str()));
        if stale {
            inner.current_directory = None;
            inner.candidates.clear();
        }
    }

    /// Directories available for selection, sorted by path
    pub fn directories(&self) -> Vec<PathEntry> {
        self.lock().directories.sorted()
    }

    pub fn current_directory(&self) -> Option<PathEntry> {
        self.lock().current_directory.clone()
    }

    /// Browse a directory and list its variables as selection candidates
    pub fn select_directory(
        &self,
        path_label: &str,
        node_id: &str,
    ) -> Result<Vec<DirectoryCandidate>> {
        let connection = self
            .lock()
            .connection
            .clone()
            .ok_or_else(|| RecorderError::Connection("Not connected to a server".to_string()))?;

        let candidates = list_directory_candidates(connection.as_ref(), path_label, node_id)?;

        let mut inner = self.lock();
        inner.current_directory = Some(PathEntry::new(path_label, node_id));
        inner.candidates = candidates.clone();
        Ok(candidates)
    }

    pub fn candidates(&self) -> Vec<DirectoryCandidate> {
        self.lock().candidates.clone()
    }

    // ==================== Selection ====================

    /// Add or remove a variable from the selection
    pub fn set_variable_selected(&self, label: &str, node_id: &str, selected: bool) -> Result<()> {
        if selected {
            validate_label(label)?;
        }
        let mut inner = self.lock();
        let position = inner.selection.iter().position(|v| v.label == label);
        match (selected, position) {
            (true, Some(i)) => inner.selection[i].node_id = node_id.to_string(),
            (true, None) => inner
                .selection
                .push(SelectedVariable::new(label, node_id)),
            (false, Some(i)) => {
                inner.selection.remove(i);
            }
            (false, None) => {}
        }
        self.rederive_live_view(&mut inner);
        Ok(())
    }

    /// Replace the whole selection
    pub fn set_selection(&self, variables: Vec<SelectedVariable>) -> Result<()> {
        for v in &variables {
            validate_label(&v.label)?;
        }
        let mut inner = self.lock();
        inner.selection.clear();
        for v in variables {
            match inner.selection.iter_mut().find(|s| s.label == v.label) {
                Some(existing) => *existing = v,
                None => inner.selection.push(v),
            }
        }
        self.rederive_live_view(&mut inner);
        Ok(())
    }

    pub fn clear_selection(&self) {
        let mut inner = self.lock();
        inner.selection.clear();
        self.rederive_live_view(&mut inner);
    }

    pub fn selection(&self) -> Vec<SelectedVariable> {
        self.lock().selection.clone()
    }

    /// Turn live refresh of one selected variable on or off
    pub fn set_live_enabled(&self, label: &str, enabled: bool) -> Result<()> {
        let mut inner = self.lock();
        let variable = inner
            .selection
            .iter_mut()
            .find(|v| v.label == label)
            .ok_or_else(|| RecorderError::Validation(format!("'{}' is not selected", label)))?;
        variable.live = enabled;
        if let Some(entry) = inner.live.iter_mut().find(|e| e.label == label) {
            entry.live = enabled;
        }
        Ok(())
    }

    // ==================== Settings ====================

    pub fn settings(&self) -> ScenarioSettings {
        self.lock().settings.clone()
    }

    /// Change the sampling interval; a running recording picks it up immediately
    pub fn set_interval(&self, interval: Duration) -> Result<()> {
        if interval.is_zero() {
            return Err(RecorderError::Validation(
                "Interval must be greater than zero".to_string(),
            ));
        }
        let mut inner = self.lock();
        inner.settings.interval = interval;
        if inner.record_timer.is_some() {
            inner.record_timer = Some(Timer::new(interval, self.clock.now()));
        }
        Ok(())
    }

    pub fn set_target_count(&self, target_count: usize) -> Result<()> {
        if target_count == 0 {
            return Err(RecorderError::Validation(
                "Target count must be greater than zero".to_string(),
            ));
        }
        self.lock().settings.target_count = target_count;
        Ok(())
    }

    pub fn set_auto_save(&self, auto_save: bool) {
        self.lock().settings.auto_save = auto_save;
    }

    pub fn set_records_dir(&self, records_dir: impl Into<PathBuf>) {
        self.lock().settings.records_dir = records_dir.into();
    }

    // ==================== Recording ====================

    /// Start a new recording
    ///
    /// Rejected without any state change when nothing is selected, when no
    /// connection is available, or when a recording is already running.
    pub fn start_recording(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.selection.is_empty() {
            return Err(RecorderError::Validation(
                "No variables selected for recording".to_string(),
            ));
        }
        if inner.recording {
            return Err(RecorderError::Validation(format!(
                "Scenario '{}' is already recording",
                self.name
            )));
        }
        if !inner.connection.as_ref().is_some_and(|c| c.is_connected()) {
            return Err(RecorderError::Connection(
                "Not connected to a server".to_string(),
            ));
        }

        inner.rows.clear();
        inner.sample_count = 0;
        inner.headers = inner.selection.iter().map(|v| v.label.clone()).collect();
        inner.recording = true;
        inner.generation += 1;
        inner.record_timer = Some(Timer::new(inner.settings.interval, self.clock.now()));

        tracing::info!(
            "Recording '{}' started: {} variable(s), every {:?}, target {}",
            self.name,
            inner.headers.len(),
            inner.settings.interval,
            inner.settings.target_count
        );
        let mut columns = vec![TIMESTAMP_COLUMN.to_string()];
        columns.extend(inner.headers.iter().cloned());
        self.emit(ScenarioEvent::RecordingStarted {
            scenario: self.name.clone(),
            columns,
        });
        Ok(())
    }

    /// Stop the running recording
    ///
    /// Returns the auto-saved file, if one was written. When auto-save fails
    /// the error is returned and the rows stay available for `save_as`.
    /// Stopping an idle scenario does nothing.
    pub fn stop_recording(&self) -> Result<Option<PathBuf>> {
        self.stop_with(StopReason::Manual)
    }

    pub(crate) fn stop_with(&self, reason: StopReason) -> Result<Option<PathBuf>> {
        let mut inner = self.lock();
        if !inner.recording {
            return Ok(None);
        }
        self.finish(&mut inner, reason)
    }

    fn finish(&self, inner: &mut ScenarioInner, reason: StopReason) -> Result<Option<PathBuf>> {
        inner.recording = false;
        inner.generation += 1;
        inner.record_timer = None;

        tracing::info!(
            "Recording '{}' stopped ({:?}) after {} sample(s)",
            self.name,
            reason,
            inner.sample_count
        );
        self.emit(ScenarioEvent::RecordingStopped {
            scenario: self.name.clone(),
            reason,
            rows: inner.rows.len(),
        });

        if !inner.settings.auto_save || inner.rows.is_empty() {
            return Ok(None);
        }

        let writer = PersistenceWriter::new(&inner.settings.records_dir);
        match writer.auto_save(&self.name, self.clock.wall_time(), &inner.rows) {
            Ok(path) => {
                tracing::info!("Recording '{}' auto-saved to {}", self.name, path.display());
                inner.last_saved = Some(path.clone());
                self.emit(ScenarioEvent::AutoSaved {
                    scenario: self.name.clone(),
                    path: path.clone(),
                });
                Ok(Some(path))
            }
            Err(e) => {
                tracing::warn!("Auto-save of '{}' failed: {}", self.name, e);
                self.emit(ScenarioEvent::AutoSaveFailed {
                    scenario: self.name.clone(),
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    /// Write the current rows to `path`
    pub fn save_as(&self, path: &Path) -> Result<()> {
        let rows = self.rows();
        if rows.is_empty() {
            return Err(RecorderError::Validation("No data to save".to_string()));
        }
        let writer = PersistenceWriter::new(self.settings().records_dir);
        writer.save(path, &rows)
    }

    // ==================== Ticks ====================

    /// Run whichever schedules are due
    pub fn poll(&self) {
        self.poll_recording();
        self.poll_live();
    }

    fn poll_recording(&self) {
        let Some(job) = self.begin_sample() else {
            return;
        };
        let (row, stats) = self.collect_sample(&job);
        self.commit_sample(&job, row, &stats);
    }

    /// Read every selected variable into one row
    fn collect_sample(&self, job: &SampleJob) -> (FlatRow, ReadStats) {
        let timestamp = self.clock.wall_time().format(TIMESTAMP_FORMAT).to_string();
        let mut row = FlatRow::new(timestamp);
        let mut stats = ReadStats::default();
        for variable in &job.selection {
            match read_variable(job.connection.as_ref(), &variable.node_id, &mut stats) {
                Ok(raw) => row.extend(flatten(&variable.label, &decode(&raw))),
                Err(e) => {
                    tracing::debug!("Read of {} failed: {}", variable.label, e);
                    row.insert(variable.label.clone(), format!("Error: {}", e.message()));
                }
            }
        }
        (row, stats)
    }

    /// Append `row` unless the recording it was taken for has ended
    fn commit_sample(&self, job: &SampleJob, row: FlatRow, stats: &ReadStats) -> bool {
        let mut inner = self.lock();
        inner.sampling = false;
        inner.stats.merge(stats);
        if !inner.recording || inner.generation != job.generation {
            tracing::debug!("Discarding sample of '{}' from a finished recording", self.name);
            return false;
        }
        if inner.sample_count >= inner.settings.target_count {
            tracing::debug!("Discarding sample of '{}' past the target count", self.name);
            return false;
        }
        inner.rows.push(row);
        inner.sample_count += 1;
        let sample = inner.sample_count;
        drop(inner);

        tracing::trace!("Recording '{}' sample {}", self.name, sample);
        self.emit(ScenarioEvent::RowRecorded {
            scenario: self.name.clone(),
            sample,
        });
        true
    }

    fn begin_sample(&self) -> Option<SampleJob> {
        let mut inner = self.lock();
        // a busy tick leaves the timer due for the next poll
        if !inner.recording || inner.sampling {
            return None;
        }
        let now = self.clock.now();
        let fired = inner.record_timer.as_mut().is_some_and(|t| t.fire(now));
        if !fired {
            return None;
        }

        if inner.sample_count >= inner.settings.target_count {
            if let Err(e) = self.finish(&mut inner, StopReason::TargetReached) {
                tracing::debug!(
                    "Recording '{}' kept its rows after a failed auto-save: {}",
                    self.name,
                    e
                );
            }
            return None;
        }

        inner.sampling = true;
        Some(SampleJob {
            generation: inner.generation,
            connection: inner.connection.clone(),
            selection: inner.selection.clone(),
        })
    }

    fn poll_live(&self) {
        let Some(job) = self.begin_live() else {
            return;
        };

        let mut stats = ReadStats::default();
        let entries: Vec<LiveEntry> = job
            .selection
            .iter()
            .map(|v| read_live_entry(job.connection.as_ref(), v, &mut stats))
            .collect();

        let mut inner = self.lock();
        inner.stats.merge(&stats);
        if !inner.live_updating || inner.live_generation != job.generation {
            return;
        }
        for entry in entries {
            if let Some(slot) = inner.live.iter_mut().find(|e| e.label == entry.label) {
                // keep the current flag, it may have changed during the reads
                let live = slot.live;
                *slot = LiveEntry { live, ..entry };
            }
        }
        drop(inner);

        self.emit(ScenarioEvent::LiveUpdated {
            scenario: self.name.clone(),
        });
    }

    fn begin_live(&self) -> Option<LiveJob> {
        let mut inner = self.lock();
        if !inner.live_updating {
            return None;
        }
        let now = self.clock.now();
        let fired = inner.live_timer.as_mut().is_some_and(|t| t.fire(now));
        if !fired {
            return None;
        }
        let connection = inner.connection.clone()?;
        let selection: Vec<_> = inner.selection.iter().filter(|v| v.live).cloned().collect();
        if selection.is_empty() {
            return None;
        }
        Some(LiveJob {
            generation: inner.live_generation,
            connection,
            selection,
        })
    }

    /// Rebuild the live entries from the selection, keeping existing readings
    fn rederive_live_view(&self, inner: &mut ScenarioInner) {
        let previous = std::mem::take(&mut inner.live);
        inner.live = inner
            .selection
            .iter()
            .map(|v| {
                previous
                    .iter()
                    .find(|e| e.label == v.label && e.node_id == v.node_id)
                    .cloned()
                    .unwrap_or_else(|| LiveEntry::waiting(v))
            })
            .collect();
        self.refresh_live_state(inner);
    }

    /// Live updates run while something is selected and a connection exists
    fn refresh_live_state(&self, inner: &mut ScenarioInner) {
        let should_run = !inner.selection.is_empty() && inner.connection.is_some();
        if should_run && !inner.live_updating {
            inner.live_updating = true;
            inner.live_timer = Some(Timer::new(inner.settings.live_interval, self.clock.now()));
            tracing::debug!("Live updates of '{}' started", self.name);
        } else if !should_run && inner.live_updating {
            inner.live_updating = false;
            inner.live_generation += 1;
            inner.live_timer = None;
            tracing::debug!("Live updates of '{}' stopped", self.name);
        }
    }

    // ==================== Accessors ====================

    pub fn state(&self) -> ScenarioState {
        if self.lock().recording {
            ScenarioState::Recording
        } else {
            ScenarioState::Idle
        }
    }

    pub fn is_recording(&self) -> bool {
        self.lock().recording
    }

    pub fn is_live_updating(&self) -> bool {
        self.lock().live_updating
    }

    pub fn sample_count(&self) -> usize {
        self.lock().sample_count
    }

    pub fn rows(&self) -> Vec<FlatRow> {
        self.lock().rows.clone()
    }

    /// Reconciled column order of the current rows
    pub fn schema(&self) -> RecordedSchema {
        RecordedSchema::reconcile(&self.lock().rows)
    }

    /// Selection labels of the current or last recording
    pub fn headers(&self) -> Vec<String> {
        self.lock().headers.clone()
    }

    pub fn live_entries(&self) -> Vec<LiveEntry> {
        self.lock().live.clone()
    }

    pub fn stats(&self) -> ReadStats {
        self.lock().stats.clone()
    }

    pub fn last_saved_path(&self) -> Option<PathBuf> {
        self.lock().last_saved.clone()
    }
}

fn validate_label(label: &str) -> Result<()> {
    if label.trim().is_empty() {
        return Err(RecorderError::Validation("Variable label is empty".to_string()));
    }
    if label == TIMESTAMP_COLUMN {
        return Err(RecorderError::Validation(format!(
            "'{}' is reserved for the row timestamp",
            TIMESTAMP_COLUMN
        )));
    }
    Ok(())
}

fn read_variable(
    connection: Option<&SharedConnection>,
    node_id: &str,
    stats: &mut ReadStats,
) -> Result<crate::types::RawValue> {
    let connection = connection
        .ok_or_else(|| RecorderError::Connection("Not connected to a server".to_string()))?;
    let started = Instant::now();
    match connection.read_value(node_id) {
        Ok(value) => {
            stats.record_success(started.elapsed());
            Ok(value)
        }
        Err(e) => {
            stats.record_failure();
            Err(e)
        }
    }
}
