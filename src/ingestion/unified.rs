//! Unified reshaping entrypoints.
//!
//! Most callers should use [`ingest_from_str`] (raw text already in memory) or
//! [`ingest_from_path`] (export saved to disk). Both run the full pipeline:
//!
//! - flat-file tables: parse records → classify → reshape → coerce
//! - cube files: parse blocks → rename axes → coerce
//!
//! If [`IngestionOptions::format`] is `None`, the export kind is inferred from the text: cube files
//! start with a `K;` block header. If an [`IngestionObserver`] is configured, success, failure and
//! alerts are reported to it.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::classify::classify_table;
use crate::coerce::coerce;
use crate::config::ReshapeConfig;
use crate::dialect::{Dialect, FormatVersion};
use crate::error::{ReshapeError, ReshapeResult};
use crate::parsing::{parse_records, CubeFile, DELIMITER};
use crate::reshape::{raw_wide, reshape};
use crate::types::{ColumnKind, WideTable};

use super::observability::{IngestionContext, IngestionObserver, IngestionSeverity, IngestionStats};

/// Supported export kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionFormat {
    /// Flat-file table export (`ffcsv`).
    Table,
    /// Multi-block cube file.
    Cube,
}

impl IngestionFormat {
    /// Infer the export kind from the raw text.
    pub fn detect(raw_text: &str) -> Self {
        let text = raw_text.trim_start_matches('\u{feff}').trim_start();
        if text.starts_with("K;") {
            Self::Cube
        } else {
            Self::Table
        }
    }
}

/// Options controlling unified reshaping.
///
/// Use [`Default`] for common cases.
#[derive(Clone)]
pub struct IngestionOptions {
    /// Reshaping selectors.
    pub config: ReshapeConfig,
    /// If `None`, detect the export kind from the text.
    pub format: Option<IngestionFormat>,
    /// Optional observer for logging/alerts.
    pub observer: Option<Arc<dyn IngestionObserver>>,
    /// Severity threshold at which `on_alert` is invoked.
    pub alert_at_or_above: IngestionSeverity,
}

impl fmt::Debug for IngestionOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngestionOptions")
            .field("config", &self.config)
            .field("format", &self.format)
            .field("observer_set", &self.observer.is_some())
            .field("alert_at_or_above", &self.alert_at_or_above)
            .finish()
    }
}

impl Default for IngestionOptions {
    fn default() -> Self {
        Self {
            config: ReshapeConfig::default(),
            format: None,
            observer: None,
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

/// Reshape a flat-file table export.
///
/// With `config.prettify == false` the raw columns are kept (placeholders mapped to null) and no
/// type coercion takes place.
pub fn ingest_table(raw_text: &str, config: &ReshapeConfig) -> ReshapeResult<WideTable> {
    let table = parse_records(raw_text, DELIMITER)?;
    let dialect = config.dialect_for(table.headers());
    let roles = classify_table(&table, &dialect)?;
    if !config.prettify {
        return raw_wide(&table, &roles);
    }
    let wide = reshape(&table, &roles, &dialect, &config.reshape_options())?;
    coerce(&wide, &dialect, &config.coerce_options())
}

/// Reshape a cube file export.
///
/// Value types declared in the cube's `DQI` block apply unless `config.value_types` overrides them.
/// With `config.prettify == false` the renamed `QEI` block is returned untyped; otherwise the
/// `_QUALITAET` columns are kept only when `config.quality` is set.
pub fn ingest_cube(raw_text: &str, config: &ReshapeConfig) -> ReshapeResult<WideTable> {
    let cube = CubeFile::parse(raw_text)?;
    let table = cube.data_table()?;
    if !config.prettify {
        return Ok(table);
    }
    let table = if config.quality {
        table
    } else {
        table.without_kind(ColumnKind::Quality)
    };
    let dialect = Dialect::new(
        config.database,
        config.language,
        config.version.unwrap_or(FormatVersion::Flat4),
    );
    let mut options = config.coerce_options();
    let mut value_types = cube.value_types.clone();
    value_types.append(&mut options.value_types);
    options.value_types = value_types;
    coerce(&table, &dialect, &options)
}

/// Reshape raw text, reporting the outcome to the configured observer.
///
/// # Examples
///
/// ```
/// use genesis_reshape::ingestion::{ingest_from_str, IngestionOptions};
///
/// let raw = "statistics_code;time;value_variable_label;value_unit;value\n\
///            12411;2020;Einwohner;Anzahl;83155031\n";
/// let wide = ingest_from_str(raw, &IngestionOptions::default()).unwrap();
/// assert_eq!(wide.column_names(), vec!["time", "Einwohner__Anzahl"]);
/// ```
pub fn ingest_from_str(raw_text: &str, options: &IngestionOptions) -> ReshapeResult<WideTable> {
    run_observed(raw_text, None, options)
}

/// Read an export from disk and reshape it.
///
/// I/O failures are reported to the observer as [`IngestionSeverity::Critical`].
pub fn ingest_from_path(
    path: impl AsRef<Path>,
    options: &IngestionOptions,
) -> ReshapeResult<WideTable> {
    let path = path.as_ref();
    match std::fs::read_to_string(path) {
        Ok(raw_text) => run_observed(&raw_text, Some(path.to_path_buf()), options),
        Err(e) => {
            let ctx = context_for("", Some(path.to_path_buf()), options);
            let err = ReshapeError::from(e);
            report_failure(&ctx, &err, options);
            Err(err)
        }
    }
}

fn run_observed(
    raw_text: &str,
    path: Option<PathBuf>,
    options: &IngestionOptions,
) -> ReshapeResult<WideTable> {
    let ctx = context_for(raw_text, path, options);
    let result = match ctx.format {
        IngestionFormat::Table => ingest_table(raw_text, &options.config),
        IngestionFormat::Cube => ingest_cube(raw_text, &options.config),
    };

    match &result {
        Ok(wide) => {
            if let Some(obs) = options.observer.as_ref() {
                obs.on_success(
                    &ctx,
                    IngestionStats {
                        rows: wide.row_count(),
                        columns: wide.column_count(),
                    },
                );
            }
        }
        Err(e) => report_failure(&ctx, e, options),
    }

    result
}

fn context_for(raw_text: &str, path: Option<PathBuf>, options: &IngestionOptions) -> IngestionContext {
    IngestionContext {
        path,
        format: options
            .format
            .unwrap_or_else(|| IngestionFormat::detect(raw_text)),
        database: options.config.database,
        language: options.config.language,
        bytes: raw_text.len(),
    }
}

fn report_failure(ctx: &IngestionContext, e: &ReshapeError, options: &IngestionOptions) {
    if let Some(obs) = options.observer.as_ref() {
        let sev = severity_for_error(e);
        obs.on_failure(ctx, sev, e);
        if sev >= options.alert_at_or_above {
            obs.on_alert(ctx, sev, e);
        }
    }
}

/// Severity of a failed request.
pub fn severity_for_error(e: &ReshapeError) -> IngestionSeverity {
    match e {
        ReshapeError::Io(_) => IngestionSeverity::Critical,
        ReshapeError::Csv(err) => match err.kind() {
            ::csv::ErrorKind::Io(_) => IngestionSeverity::Critical,
            _ => IngestionSeverity::Error,
        },
        ReshapeError::Ambiguity { .. } | ReshapeError::Invariant { .. } => {
            IngestionSeverity::Critical
        }
        ReshapeError::Format { .. }
        | ReshapeError::PivotConflict { .. }
        | ReshapeError::TypeCoercion { .. }
        | ReshapeError::UnknownDatabase { .. }
        | ReshapeError::Config(_)
        | ReshapeError::Polars(_) => IngestionSeverity::Error,
    }
}

/// Where the raw text of a request comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionSource {
    /// Raw text already in memory.
    Text(String),
    /// Export saved to disk.
    Path(PathBuf),
}

impl IngestionSource {
    /// Size of in-memory text, or of the file on disk (0 if it cannot be read).
    pub fn len_hint(&self) -> usize {
        match self {
            Self::Text(t) => t.len(),
            Self::Path(p) => std::fs::metadata(p).map(|m| m.len() as usize).unwrap_or(0),
        }
    }
}

/// Owned request object, for enqueueing work in a job system or [`crate::execution`].
#[derive(Clone)]
pub struct IngestionRequest {
    /// Raw export.
    pub source: IngestionSource,
    /// Options controlling reshaping.
    pub options: IngestionOptions,
}

impl fmt::Debug for IngestionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            IngestionSource::Text(t) => format!("Text({} bytes)", t.len()),
            IngestionSource::Path(p) => format!("Path({})", p.display()),
        };
        f.debug_struct("IngestionRequest")
            .field("source", &source)
            .field("options", &self.options)
            .finish()
    }
}

impl IngestionRequest {
    /// Request over in-memory text.
    pub fn from_text(raw_text: impl Into<String>, options: IngestionOptions) -> Self {
        Self {
            source: IngestionSource::Text(raw_text.into()),
            options,
        }
    }

    /// Request over a file on disk.
    pub fn from_path(path: impl Into<PathBuf>, options: IngestionOptions) -> Self {
        Self {
            source: IngestionSource::Path(path.into()),
            options,
        }
    }

    /// Execute the request.
    pub fn run(&self) -> ReshapeResult<WideTable> {
        match &self.source {
            IngestionSource::Text(t) => ingest_from_str(t, &self.options),
            IngestionSource::Path(p) => ingest_from_path(p, &self.options),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_cube_text() {
        assert_eq!(
            IngestionFormat::detect("\u{feff}K;DQ;FACH-SCHL\n"),
            IngestionFormat::Cube
        );
        assert_eq!(
            IngestionFormat::detect("statistics_code;time\n"),
            IngestionFormat::Table
        );
    }

    #[test]
    fn invariant_and_ambiguity_are_critical() {
        assert_eq!(
            severity_for_error(&ReshapeError::invariant("x")),
            IngestionSeverity::Critical
        );
        assert_eq!(
            severity_for_error(&ReshapeError::format("x")),
            IngestionSeverity::Error
        );
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        assert_eq!(
            severity_for_error(&ReshapeError::from(io)),
            IngestionSeverity::Critical
        );
    }

    #[test]
    fn request_debug_hides_text() {
        let req = IngestionRequest::from_text("a;b\n1;2\n", IngestionOptions::default());
        let dbg = format!("{req:?}");
        assert!(dbg.contains("Text(8 bytes)"));
        assert!(dbg.contains("observer_set: false"));
    }
}
