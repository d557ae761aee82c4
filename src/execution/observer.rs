use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use tracing::debug;

/// Events emitted by the [`super::ExecutionEngine`].
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    RunStarted { jobs: usize },
    ThrottleWaited { duration: Duration },
    JobStarted { index: usize, bytes: usize },
    /// `rows` is `None` when the request failed.
    JobFinished { index: usize, rows: Option<usize> },
    RunFinished {
        elapsed: Duration,
        metrics: ExecutionMetricsSnapshot,
    },
}

/// Observer hook for execution events.
pub trait ExecutionObserver: Send + Sync {
    fn on_event(&self, event: &ExecutionEvent);
}

/// Logs execution events at `debug` level.
#[derive(Debug, Default)]
pub struct TracingExecutionObserver;

impl ExecutionObserver for TracingExecutionObserver {
    fn on_event(&self, event: &ExecutionEvent) {
        match event {
            ExecutionEvent::RunFinished { elapsed, metrics } => {
                debug!(?elapsed, %metrics, "batch finished")
            }
            other => debug!(event = ?other, "batch event"),
        }
    }
}

/// Real-time metrics for a batch run.
///
/// The engine updates these counters while it runs; callers can snapshot them at any time.
pub struct ExecutionMetrics {
    run_id: AtomicU64,
    elapsed_ns: AtomicU64,

    jobs_started: AtomicU64,
    jobs_succeeded: AtomicU64,
    jobs_failed: AtomicU64,
    rows_emitted: AtomicU64,
    throttle_wait_ns: AtomicU64,

    active_jobs: AtomicUsize,
    max_active_jobs: AtomicUsize,
}

impl ExecutionMetrics {
    pub fn new() -> Self {
        Self {
            run_id: AtomicU64::new(0),
            elapsed_ns: AtomicU64::new(0),
            jobs_started: AtomicU64::new(0),
            jobs_succeeded: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),
            rows_emitted: AtomicU64::new(0),
            throttle_wait_ns: AtomicU64::new(0),
            active_jobs: AtomicUsize::new(0),
            max_active_jobs: AtomicUsize::new(0),
        }
    }

    pub(crate) fn begin_run(&self) {
        self.run_id.fetch_add(1, Ordering::SeqCst);

        self.elapsed_ns.store(0, Ordering::SeqCst);
        self.jobs_started.store(0, Ordering::SeqCst);
        self.jobs_succeeded.store(0, Ordering::SeqCst);
        self.jobs_failed.store(0, Ordering::SeqCst);
        self.rows_emitted.store(0, Ordering::SeqCst);
        self.throttle_wait_ns.store(0, Ordering::SeqCst);
        self.active_jobs.store(0, Ordering::SeqCst);
        self.max_active_jobs.store(0, Ordering::SeqCst);
    }

    pub(crate) fn end_run(&self, elapsed: Duration) {
        self.elapsed_ns.store(nanos(elapsed), Ordering::SeqCst);
    }

    pub(crate) fn on_job_start(&self) {
        self.jobs_started.fetch_add(1, Ordering::SeqCst);
        let now = self.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active_jobs.fetch_max(now, Ordering::SeqCst);
    }

    pub(crate) fn on_job_end(&self, rows: Option<usize>) {
        match rows {
            Some(n) => {
                self.jobs_succeeded.fetch_add(1, Ordering::SeqCst);
                self.rows_emitted.fetch_add(n as u64, Ordering::SeqCst);
            }
            None => {
                self.jobs_failed.fetch_add(1, Ordering::SeqCst);
            }
        }
        self.active_jobs.fetch_sub(1, Ordering::SeqCst);
    }

    pub(crate) fn on_throttle_wait(&self, d: Duration) {
        self.throttle_wait_ns.fetch_add(nanos(d), Ordering::SeqCst);
    }

    pub fn snapshot(&self) -> ExecutionMetricsSnapshot {
        let elapsed_ns = self.elapsed_ns.load(Ordering::SeqCst);
        ExecutionMetricsSnapshot {
            run_id: self.run_id.load(Ordering::SeqCst),
            elapsed: (elapsed_ns > 0).then(|| Duration::from_nanos(elapsed_ns)),
            jobs_started: self.jobs_started.load(Ordering::SeqCst),
            jobs_succeeded: self.jobs_succeeded.load(Ordering::SeqCst),
            jobs_failed: self.jobs_failed.load(Ordering::SeqCst),
            rows_emitted: self.rows_emitted.load(Ordering::SeqCst),
            throttle_wait: Duration::from_nanos(self.throttle_wait_ns.load(Ordering::SeqCst)),
            max_active_jobs: self.max_active_jobs.load(Ordering::SeqCst),
        }
    }
}

impl Default for ExecutionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn nanos(d: Duration) -> u64 {
    d.as_nanos().min(u64::MAX as u128) as u64
}

/// Immutable snapshot of [`ExecutionMetrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionMetricsSnapshot {
    pub run_id: u64,
    pub elapsed: Option<Duration>,
    pub jobs_started: u64,
    pub jobs_succeeded: u64,
    pub jobs_failed: u64,
    pub rows_emitted: u64,
    pub throttle_wait: Duration,
    pub max_active_jobs: usize,
}

impl fmt::Display for ExecutionMetricsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "run_id={}, jobs={}/{} ok, failed={}, rows={}, max_active_jobs={}, throttle_wait={:?}, elapsed={:?}",
            self.run_id,
            self.jobs_succeeded,
            self.jobs_started,
            self.jobs_failed,
            self.rows_emitted,
            self.max_active_jobs,
            self.throttle_wait,
            self.elapsed
        )
    }
}
