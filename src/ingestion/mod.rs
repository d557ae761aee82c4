//! Reshaping entrypoints and observability.
//!
//! Most callers should use [`ingest_from_str`] or [`ingest_from_path`] (from [`unified`]) which:
//!
//! - detect whether the text is a flat-file table or a cube file (or you can override via
//!   [`IngestionOptions`])
//! - run the parse → classify → reshape → coerce pipeline into a [`crate::types::WideTable`]
//! - optionally report success/failure/alerts to an [`IngestionObserver`]
//!
//! The per-kind pipelines are also available as [`ingest_table`] and [`ingest_cube`].

pub mod observability;
pub mod unified;

pub use observability::{
    CompositeObserver, FileObserver, IngestionContext, IngestionObserver, IngestionSeverity,
    IngestionStats, TracingObserver,
};
pub use unified::{
    ingest_cube, ingest_from_path, ingest_from_str, ingest_table, severity_for_error,
    IngestionFormat, IngestionOptions, IngestionRequest, IngestionSource,
};
