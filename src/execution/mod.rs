//! Batch execution of reshaping requests.
//!
//! This module sits "above" [`crate::ingestion`] and provides:
//!
//! - Parallel execution of independent [`IngestionRequest`]s on a rayon pool
//! - Throttling (bounded number of requests in flight)
//! - Real-time metrics + observer hooks for monitoring
//!
//! Results are returned in request order, one per request. A failed request does not abort the
//! batch.

mod observer;
mod semaphore;

use std::sync::Arc;
use std::time::{Duration, Instant};

use rayon::prelude::*;
use rayon::ThreadPool;
use rayon::ThreadPoolBuilder;

use crate::error::ReshapeResult;
use crate::ingestion::IngestionRequest;
use crate::types::WideTable;

pub use observer::{
    ExecutionEvent, ExecutionMetrics, ExecutionMetricsSnapshot, ExecutionObserver,
    TracingExecutionObserver,
};

use semaphore::Semaphore;

/// Configuration for the [`ExecutionEngine`].
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Number of worker threads used by the engine.
    ///
    /// If `None`, uses the platform's available parallelism.
    pub num_threads: Option<usize>,
    /// Upper bound on requests reshaped at the same time.
    ///
    /// Raw exports can be large; this bounds the working set on top of `num_threads`.
    pub max_in_flight: usize,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        let n = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
        Self {
            num_threads: Some(n),
            max_in_flight: n.max(1),
        }
    }
}

/// Runs batches of [`IngestionRequest`]s in parallel.
pub struct ExecutionEngine {
    pool: ThreadPool,
    opts: ExecutionOptions,
    observer: Option<Arc<dyn ExecutionObserver>>,
    metrics: Arc<ExecutionMetrics>,
}

impl ExecutionEngine {
    /// Create a new engine with the given options.
    ///
    /// # Panics
    ///
    /// Panics if `max_in_flight == 0` or `num_threads == Some(0)`.
    pub fn new(opts: ExecutionOptions) -> Self {
        assert!(opts.max_in_flight > 0, "max_in_flight must be > 0");
        if let Some(n) = opts.num_threads {
            assert!(n > 0, "num_threads must be > 0 when set");
        }

        let n_threads = opts
            .num_threads
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1))
            .max(1);

        let pool = ThreadPoolBuilder::new()
            .num_threads(n_threads)
            .build()
            .expect("failed to build rayon thread pool");

        Self {
            pool,
            opts,
            observer: None,
            metrics: Arc::new(ExecutionMetrics::new()),
        }
    }

    /// Attach an observer for execution events.
    pub fn with_observer(mut self, observer: Arc<dyn ExecutionObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Get a handle to real-time execution metrics.
    pub fn metrics(&self) -> Arc<ExecutionMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Run every request; results are in request order.
    pub fn ingest_batch(&self, requests: &[IngestionRequest]) -> Vec<ReshapeResult<WideTable>> {
        self.pool.install(|| self.ingest_batch_impl(requests))
    }

    fn ingest_batch_impl(&self, requests: &[IngestionRequest]) -> Vec<ReshapeResult<WideTable>> {
        let start = Instant::now();
        self.metrics.begin_run();
        self.emit(ExecutionEvent::RunStarted {
            jobs: requests.len(),
        });

        let sem = Semaphore::new(self.opts.max_in_flight);
        let results: Vec<ReshapeResult<WideTable>> = requests
            .par_iter()
            .enumerate()
            .map(|(index, request)| {
                let (_permit, waited) = sem.acquire();
                if waited > Duration::ZERO {
                    self.metrics.on_throttle_wait(waited);
                    self.emit(ExecutionEvent::ThrottleWaited { duration: waited });
                }

                self.metrics.on_job_start();
                self.emit(ExecutionEvent::JobStarted {
                    index,
                    bytes: request.source.len_hint(),
                });

                let result = request.run();
                let rows = result.as_ref().ok().map(WideTable::row_count);

                self.emit(ExecutionEvent::JobFinished { index, rows });
                self.metrics.on_job_end(rows);
                result
            })
            .collect();

        self.metrics.end_run(start.elapsed());
        self.emit(ExecutionEvent::RunFinished {
            elapsed: start.elapsed(),
            metrics: self.metrics.snapshot(),
        });

        results
    }

    fn emit(&self, event: ExecutionEvent) {
        if let Some(obs) = &self.observer {
            obs.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionEngine, ExecutionOptions};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use crate::execution::{ExecutionEvent, ExecutionObserver};
    use crate::ingestion::{IngestionOptions, IngestionRequest};

    fn request_with_rows(n: usize) -> IngestionRequest {
        let mut raw = String::from("time;value_variable_label;value_unit;value\n");
        for i in 0..n {
            raw.push_str(&format!("{};Einwohner;Anzahl;{}\n", 2000 + i, i));
        }
        IngestionRequest::from_text(raw, IngestionOptions::default())
    }

    fn broken_request() -> IngestionRequest {
        IngestionRequest::from_text("", IngestionOptions::default())
    }

    #[test]
    fn results_are_in_request_order() {
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight: 4,
        });
        let requests: Vec<_> = (1..=12).map(request_with_rows).collect();

        let results = engine.ingest_batch(&requests);
        assert_eq!(results.len(), requests.len());
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap().row_count(), i + 1);
        }
    }

    struct ConcurrencyObserver {
        active_jobs: AtomicUsize,
        max_active_jobs: AtomicUsize,
        finished: AtomicUsize,
    }

    impl ConcurrencyObserver {
        fn new() -> Self {
            Self {
                active_jobs: AtomicUsize::new(0),
                max_active_jobs: AtomicUsize::new(0),
                finished: AtomicUsize::new(0),
            }
        }
    }

    impl ExecutionObserver for ConcurrencyObserver {
        fn on_event(&self, event: &ExecutionEvent) {
            match event {
                ExecutionEvent::JobStarted { .. } => {
                    let now = self.active_jobs.fetch_add(1, Ordering::SeqCst) + 1;
                    self.max_active_jobs.fetch_max(now, Ordering::SeqCst);
                }
                ExecutionEvent::JobFinished { .. } => {
                    self.active_jobs.fetch_sub(1, Ordering::SeqCst);
                    self.finished.fetch_add(1, Ordering::SeqCst);
                }
                _ => {}
            }
        }
    }

    #[test]
    fn max_in_flight_throttles_job_concurrency() {
        let observer = Arc::new(ConcurrencyObserver::new());
        let obs_trait: Arc<dyn ExecutionObserver> = observer.clone();
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(4),
            max_in_flight: 1,
        })
        .with_observer(obs_trait);

        let requests: Vec<_> = (0..20).map(|_| request_with_rows(50)).collect();
        let results = engine.ingest_batch(&requests);

        assert!(results.iter().all(|r| r.is_ok()));
        assert_eq!(observer.max_active_jobs.load(Ordering::SeqCst), 1);
        assert_eq!(observer.finished.load(Ordering::SeqCst), 20);
    }

    #[test]
    fn failures_do_not_abort_the_batch_and_are_counted() {
        let engine = ExecutionEngine::new(ExecutionOptions {
            num_threads: Some(2),
            max_in_flight: 2,
        });
        let metrics = engine.metrics();
        let requests = vec![request_with_rows(3), broken_request(), request_with_rows(2)];

        let results = engine.ingest_batch(&requests);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
        assert!(results[2].is_ok());

        let snap = metrics.snapshot();
        assert_eq!(snap.run_id, 1);
        assert_eq!(snap.jobs_started, 3);
        assert_eq!(snap.jobs_succeeded, 2);
        assert_eq!(snap.jobs_failed, 1);
        assert_eq!(snap.rows_emitted, 5);
        assert!(snap.max_active_jobs >= 1 && snap.max_active_jobs <= 2);
        assert!(snap.elapsed.is_some());
    }
}
