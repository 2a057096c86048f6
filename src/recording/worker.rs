//! Background thread driving the scenario schedules
//!
//! The worker polls every registered scenario at a fixed tick rate until its
//! `running` flag is cleared. Scenarios decide on their own whether a sample
//! or a live refresh is due, so the tick only bounds the timing resolution.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use super::registry::ScenarioHandles;

/// Default polling resolution of the worker
pub const DEFAULT_TICK: Duration = Duration::from_millis(10);

/// Polls scenario schedules on a dedicated thread
pub struct SchedulerWorker {
    scenarios: ScenarioHandles,
    running: Arc<AtomicBool>,
    tick: Duration,
    last_tick: Instant,
}

impl SchedulerWorker {
    pub fn new(scenarios: ScenarioHandles, running: Arc<AtomicBool>, tick: Duration) -> Self {
        Self {
            scenarios,
            running,
            tick,
            last_tick: Instant::now(),
        }
    }

    /// Run until `running` is cleared
    pub fn run(&mut self) {
        tracing::info!("Scheduler worker started");

        while self.running.load(Ordering::SeqCst) {
            self.scenarios.poll_all();
            self.rate_limit();
        }

        tracing::info!("Scheduler worker stopped");
    }

    /// Move the worker onto its own thread
    pub fn spawn(mut self) -> std::io::Result<JoinHandle<()>> {
        std::thread::Builder::new()
            .name("scenario-scheduler".to_string())
            .spawn(move || self.run())
    }

    fn rate_limit(&mut self) {
        if self.tick.is_zero() {
            std::thread::yield_now();
            return;
        }

        let elapsed = self.last_tick.elapsed();
        if elapsed < self.tick {
            std::thread::sleep(self.tick - elapsed);
        }

        self.last_tick = Instant::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{Connector, SimulatedServer};
    use crate::recording::schedule::SystemClock;
    use crate::recording::{ScenarioEvent, ScenarioRegistry, ScenarioSettings, StopReason};
    use tempfile::TempDir;

    #[test]
    fn test_worker_stops_when_flag_cleared() {
        let running = Arc::new(AtomicBool::new(false));
        let mut worker =
            SchedulerWorker::new(ScenarioHandles::default(), running, Duration::from_millis(1));
        // returns immediately
        worker.run();
    }

    #[test]
    fn test_worker_drives_recording_to_target() {
        let dir = TempDir::new().unwrap();
        let server = SimulatedServer::demo().unwrap();
        let settings = ScenarioSettings {
            interval: Duration::from_millis(20),
            target_count: 3,
            auto_save: false,
            records_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        let mut registry = ScenarioRegistry::new(settings, Arc::new(SystemClock));
        registry.set_connection(Some(server.connect("opc.tcp://localhost:4840").unwrap()));
        let scenario = registry.create("Oven").unwrap();
        scenario
            .set_variable_selected("Counter", "ns=2;s=PLC.Line1.Counter", true)
            .unwrap();

        let running = Arc::new(AtomicBool::new(true));
        let handle = SchedulerWorker::new(registry.handles(), running.clone(), Duration::from_millis(2))
            .spawn()
            .unwrap();

        scenario.start_recording().unwrap();
        let events = registry.events();
        let deadline = Instant::now() + Duration::from_secs(5);
        let mut stopped = None;
        while stopped.is_none() && Instant::now() < deadline {
            if let Ok(ScenarioEvent::RecordingStopped { reason, rows, .. }) =
                events.recv_timeout(Duration::from_millis(100))
            {
                stopped = Some((reason, rows));
            }
        }

        running.store(false, Ordering::SeqCst);
        handle.join().unwrap();

        assert_eq!(stopped, Some((StopReason::TargetReached, 3)));
        assert_eq!(scenario.rows().len(), 3);
    }
}
