use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::{error, info, warn};

use crate::dialect::{Database, Language};
use crate::error::ReshapeError;

use super::unified::IngestionFormat;

/// Severity classification used for observer callbacks and alerting thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum IngestionSeverity {
    /// Informational event.
    Info,
    /// Warning-level event (non-fatal).
    Warning,
    /// Error-level event (the input could not be reshaped).
    Error,
    /// Critical error (I/O failures, wire-format invariants, dialect table defects).
    Critical,
}

/// Context about one reshaping attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestionContext {
    /// Source file, when the raw text was read from disk.
    pub path: Option<PathBuf>,
    /// Export kind.
    pub format: IngestionFormat,
    /// Configured source database.
    pub database: Database,
    /// Configured language.
    pub language: Language,
    /// Size of the raw text in bytes.
    pub bytes: usize,
}

impl IngestionContext {
    fn source(&self) -> String {
        match &self.path {
            Some(p) => p.display().to_string(),
            None => "<text>".to_string(),
        }
    }
}

/// Stats reported on success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestionStats {
    /// Rows of the output table.
    pub rows: usize,
    /// Columns of the output table.
    pub columns: usize,
}

/// Observer interface for reshaping outcomes.
///
/// Implementors can record metrics, logs, or trigger alerts.
pub trait IngestionObserver: Send + Sync {
    /// Called when a request succeeds.
    fn on_success(&self, _ctx: &IngestionContext, _stats: IngestionStats) {}

    /// Called when a request fails.
    fn on_failure(&self, _ctx: &IngestionContext, _severity: IngestionSeverity, _error: &ReshapeError) {}

    /// Called when a failure meets the alert threshold.
    ///
    /// Default behavior forwards to [`Self::on_failure`].
    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReshapeError) {
        self.on_failure(ctx, severity, error)
    }
}

/// Fans callbacks out to a list of observers.
#[derive(Default)]
pub struct CompositeObserver {
    observers: Vec<Arc<dyn IngestionObserver>>,
}

impl CompositeObserver {
    pub fn new(observers: Vec<Arc<dyn IngestionObserver>>) -> Self {
        Self { observers }
    }
}

impl fmt::Debug for CompositeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeObserver")
            .field("observers_len", &self.observers.len())
            .finish()
    }
}

impl IngestionObserver for CompositeObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        for o in &self.observers {
            o.on_success(ctx, stats);
        }
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReshapeError) {
        for o in &self.observers {
            o.on_failure(ctx, severity, error);
        }
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReshapeError) {
        for o in &self.observers {
            o.on_alert(ctx, severity, error);
        }
    }
}

/// Emits events through `tracing`.
#[derive(Debug, Default)]
pub struct TracingObserver;

impl IngestionObserver for TracingObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        info!(
            format = ?ctx.format,
            database = ctx.database.name(),
            source = %ctx.source(),
            rows = stats.rows,
            columns = stats.columns,
            "reshape ok"
        );
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReshapeError) {
        warn!(
            ?severity,
            format = ?ctx.format,
            database = ctx.database.name(),
            source = %ctx.source(),
            %error,
            "reshape failed"
        );
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReshapeError) {
        error!(
            ?severity,
            format = ?ctx.format,
            database = ctx.database.name(),
            source = %ctx.source(),
            %error,
            "reshape alert"
        );
    }
}

/// Appends events to a local log file.
#[derive(Debug)]
pub struct FileObserver {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileObserver {
    /// Create a file observer that appends events to `path`.
    ///
    /// Writes are best-effort; failures to open or write the log file are ignored.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn append_line(&self, line: &str) {
        let _guard = self.lock.lock().ok();
        if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(&self.path) {
            let _ = writeln!(f, "{line}");
        }
    }
}

impl IngestionObserver for FileObserver {
    fn on_success(&self, ctx: &IngestionContext, stats: IngestionStats) {
        self.append_line(&format!(
            "{} ok format={:?} database={} source={} rows={} columns={}",
            unix_ts(),
            ctx.format,
            ctx.database.name(),
            ctx.source(),
            stats.rows,
            stats.columns
        ));
    }

    fn on_failure(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReshapeError) {
        self.append_line(&format!(
            "{} fail severity={:?} format={:?} database={} source={} err={}",
            unix_ts(),
            severity,
            ctx.format,
            ctx.database.name(),
            ctx.source(),
            error
        ));
    }

    fn on_alert(&self, ctx: &IngestionContext, severity: IngestionSeverity, error: &ReshapeError) {
        self.append_line(&format!(
            "{} ALERT severity={:?} format={:?} database={} source={} err={}",
            unix_ts(),
            severity,
            ctx.format,
            ctx.database.name(),
            ctx.source(),
            error
        ));
    }
}

fn unix_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
