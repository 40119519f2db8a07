//! Simulated long-running operations.
//!
//! A simulation is a Tokio task that asks a backend for its result, then
//! reports progress in timed increments until it reaches 100%. The task
//! never touches workflow state: it only sends [`SimulationEvent`]s, which
//! the owning workflow instance applies one at a time.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;

use super::backend::{AnalysisOutcome, DraftOutcome};
use crate::core::{SeededRng, TickConfig};

/// Identifies one run of a simulator; bumps on every start and cancel.
pub type RunId = u64;

/// Which simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SimulationKind {
    /// RFP analysis
    Analysis,
    /// Draft generation
    Generation,
}

impl SimulationKind {
    /// Human-readable name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Analysis => "RFP analysis",
            Self::Generation => "draft generation",
        }
    }
}

impl fmt::Display for SimulationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result of applying a progress step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Not running, or the step belongs to an older run
    Ignored,
    /// New percentage
    Progressed(u8),
    /// Reached 100%; reported once per run
    Completed,
}

/// `{running, percent}` state of one simulator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationProgress {
    running: bool,
    percent: u8,
    run: RunId,
}

impl SimulationProgress {
    /// Create an idle simulator state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a run is in flight.
    pub fn running(&self) -> bool {
        self.running
    }

    /// Current percentage.
    pub fn percent(&self) -> u8 {
        self.percent
    }

    /// Latest run id.
    pub fn run(&self) -> RunId {
        self.run
    }

    /// Whether `run` is the run in flight.
    pub fn is_current(&self, run: RunId) -> bool {
        self.running && self.run == run
    }

    /// Start a run; `None` if one is already in flight.
    pub fn begin(&mut self) -> Option<RunId> {
        if self.running {
            return None;
        }
        self.running = true;
        self.percent = 0;
        self.run += 1;
        Some(self.run)
    }

    /// Apply a progress step.
    ///
    /// On reaching 100 the percentage is clamped to 100 and `running` drops
    /// to false; call [`reset`](Self::reset) once the completion work is done.
    pub fn advance(&mut self, run: RunId, increment: u8) -> Advance {
        if !self.is_current(run) {
            return Advance::Ignored;
        }

        let next = self.percent.saturating_add(increment);
        if next >= 100 {
            self.percent = 100;
            self.running = false;
            Advance::Completed
        } else {
            self.percent = next;
            Advance::Progressed(next)
        }
    }

    /// Zero the percentage for the next run.
    pub fn reset(&mut self) {
        self.percent = 0;
    }

    /// Stop the run in flight and invalidate its id.
    ///
    /// Returns whether anything was running.
    pub fn cancel(&mut self) -> bool {
        let was_running = self.running;
        self.running = false;
        self.percent = 0;
        if was_running {
            self.run += 1;
        }
        was_running
    }
}

/// Pacing of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSchedule {
    min_increment: u8,
    max_increment: u8,
    min_interval: Duration,
    max_interval: Duration,
}

impl TickSchedule {
    /// Schedule from config values; bounds are normalized.
    pub fn from_config(config: &TickConfig) -> Self {
        let lo = config.min_increment.clamp(1, 100);
        let hi = config.max_increment.clamp(1, 100);
        let (ilo, ihi) = if config.min_interval_ms <= config.max_interval_ms {
            (config.min_interval_ms, config.max_interval_ms)
        } else {
            (config.max_interval_ms, config.min_interval_ms)
        };

        Self {
            min_increment: lo.min(hi),
            max_increment: lo.max(hi),
            min_interval: Duration::from_millis(ilo),
            max_interval: Duration::from_millis(ihi),
        }
    }

    /// Next progress step.
    pub fn next_increment(&self, rng: &mut SeededRng) -> u8 {
        rng.range(u64::from(self.min_increment)..=u64::from(self.max_increment)) as u8
    }

    /// Next pause.
    pub fn next_interval(&self, rng: &mut SeededRng) -> Duration {
        let lo = self.min_interval.as_millis() as u64;
        let hi = self.max_interval.as_millis() as u64;
        Duration::from_millis(rng.range(lo..=hi))
    }
}

/// Result produced by a simulation's backend.
#[derive(Debug, Clone)]
pub enum SimulationPayload {
    Analysis(AnalysisOutcome),
    Draft(DraftOutcome),
}

/// Message from a simulation task to its workflow instance.
#[derive(Debug, Clone)]
pub enum SimulationEvent {
    /// The backend produced its result; applied when progress completes
    Prepared { kind: SimulationKind, run: RunId, payload: SimulationPayload },

    /// A progress step
    Tick { kind: SimulationKind, run: RunId, increment: u8 },

    /// The backend failed
    Failed { kind: SimulationKind, run: RunId, error: String },
}

impl SimulationEvent {
    /// Simulator the event belongs to.
    pub fn kind(&self) -> SimulationKind {
        match self {
            Self::Prepared { kind, .. } | Self::Tick { kind, .. } | Self::Failed { kind, .. } => {
                *kind
            }
        }
    }

    /// Run the event belongs to.
    pub fn run(&self) -> RunId {
        match self {
            Self::Prepared { run, .. } | Self::Tick { run, .. } | Self::Failed { run, .. } => *run,
        }
    }
}

/// Owner of a spawned simulation task.
///
/// Dropping the handle aborts the task.
#[derive(Debug)]
pub struct SimulationHandle {
    task: JoinHandle<()>,
}

impl SimulationHandle {
    /// Whether the task has exited.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Spawn a simulation on the current Tokio runtime.
///
/// `work` runs first; its result is sent as `Prepared` (or `Failed`), then
/// ticks follow until their sum reaches 100. The task exits early if the
/// receiving side is gone.
pub fn spawn_simulation<F>(
    kind: SimulationKind,
    run: RunId,
    schedule: TickSchedule,
    mut rng: SeededRng,
    work: F,
    events: UnboundedSender<SimulationEvent>,
) -> SimulationHandle
where
    F: Future<Output = anyhow::Result<SimulationPayload>> + Send + 'static,
{
    let task = tokio::spawn(async move {
        let payload = match work.await {
            Ok(payload) => payload,
            Err(e) => {
                let _ = events.send(SimulationEvent::Failed { kind, run, error: format!("{e:#}") });
                return;
            }
        };

        if events.send(SimulationEvent::Prepared { kind, run, payload }).is_err() {
            return;
        }

        let mut total: u32 = 0;
        while total < 100 {
            tokio::time::sleep(schedule.next_interval(&mut rng)).await;

            let increment = schedule.next_increment(&mut rng);
            total += u32::from(increment);

            if events.send(SimulationEvent::Tick { kind, run, increment }).is_err() {
                tracing::debug!(%kind, run, "Simulation receiver dropped");
                return;
            }
        }
    });

    SimulationHandle { task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn test_begin_is_idempotent_while_running() {
        let mut progress = SimulationProgress::new();
        let run = progress.begin().unwrap();
        assert!(progress.running());
        assert!(progress.begin().is_none());
        assert_eq!(progress.run(), run);
    }

    #[test]
    fn test_advance_completes_exactly_once() {
        let mut progress = SimulationProgress::new();
        let run = progress.begin().unwrap();

        let mut completions = 0;
        for _ in 0..20 {
            match progress.advance(run, 15) {
                Advance::Completed => completions += 1,
                Advance::Progressed(p) => assert!(p < 100),
                Advance::Ignored => {}
            }
        }

        assert_eq!(completions, 1);
        assert!(!progress.running());
        assert_eq!(progress.percent(), 100);

        progress.reset();
        assert_eq!(progress.percent(), 0);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut progress = SimulationProgress::new();
        let run = progress.begin().unwrap();
        let mut last = 0;
        while let Advance::Progressed(p) = progress.advance(run, 12) {
            assert!(p > last);
            last = p;
        }
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn test_stale_runs_are_ignored() {
        let mut progress = SimulationProgress::new();
        let first = progress.begin().unwrap();
        assert!(progress.cancel());

        let second = progress.begin().unwrap();
        assert_ne!(first, second);
        assert_eq!(progress.advance(first, 50), Advance::Ignored);
        assert_eq!(progress.advance(second, 50), Advance::Progressed(50));
    }

    #[test]
    fn test_cancel_when_idle() {
        let mut progress = SimulationProgress::new();
        assert!(!progress.cancel());
        assert_eq!(progress.advance(0, 10), Advance::Ignored);
    }

    #[test]
    fn test_schedule_normalizes_bounds() {
        let schedule = TickSchedule::from_config(&TickConfig {
            min_increment: 20,
            max_increment: 0,
            min_interval_ms: 9,
            max_interval_ms: 3,
        });
        let mut rng = SeededRng::from_seed(1);
        for _ in 0..50 {
            let inc = schedule.next_increment(&mut rng);
            assert!((1..=20).contains(&inc));
            let interval = schedule.next_interval(&mut rng);
            assert!(interval >= Duration::from_millis(3) && interval <= Duration::from_millis(9));
        }
    }

    #[tokio::test]
    async fn test_spawned_simulation_reaches_one_hundred() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let schedule = TickSchedule::from_config(&TickConfig::instant());
        let _handle = spawn_simulation(
            SimulationKind::Generation,
            1,
            schedule,
            SeededRng::from_seed(5),
            async { Ok(SimulationPayload::Draft(DraftOutcome::default())) },
            tx,
        );

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, SimulationEvent::Prepared { run: 1, .. }));

        let mut total = 0u32;
        while let Some(event) = rx.recv().await {
            if let SimulationEvent::Tick { increment, .. } = event {
                total += u32::from(increment);
            }
        }
        assert!(total >= 100);
    }

    #[tokio::test]
    async fn test_backend_failure_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _handle = spawn_simulation(
            SimulationKind::Analysis,
            3,
            TickSchedule::from_config(&TickConfig::instant()),
            SeededRng::from_seed(5),
            async { Err(anyhow::anyhow!("backend offline")) },
            tx,
        );

        let event = rx.recv().await.unwrap();
        assert!(matches!(
            event,
            SimulationEvent::Failed { kind: SimulationKind::Analysis, run: 3, ref error }
                if error.contains("offline")
        ));
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_dropping_handle_aborts_task() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_simulation(
            SimulationKind::Analysis,
            1,
            TickSchedule::from_config(&TickConfig {
                min_interval_ms: 10_000,
                max_interval_ms: 10_000,
                ..TickConfig::default()
            }),
            SeededRng::from_seed(5),
            async { Ok(SimulationPayload::Draft(DraftOutcome::default())) },
            tx,
        );

        assert!(matches!(rx.recv().await, Some(SimulationEvent::Prepared { .. })));
        drop(handle);
        // The aborted task drops its sender, closing the channel
        assert!(rx.recv().await.is_none());
    }
}
