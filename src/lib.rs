//! `genesis-reshape` turns raw exports of the German statistical web services (GENESIS-Online,
//! the Zensus 2022 database and Regionalstatistik) into typed, analysis-ready wide tables.
//!
//! The services deliver tables in a semicolon-delimited "long format": one row per observation,
//! with the classifying variables, the measured quantity and its unit spread over columns whose
//! names follow a per-service naming convention. Cubes come as a multi-block text stream instead.
//!
//! The primary entrypoint is [`ingestion::ingest_from_str`], which detects the export kind (flat
//! table or cube) and runs the whole pipeline:
//!
//! 1. [`parsing::parse_records`] / [`parsing::CubeFile::parse`]: raw text → [`types::RawTable`]
//! 2. [`classify::classify_table`]: header naming rules + region detection → [`classify::ColumnRoles`]
//! 3. [`reshape::reshape`]: group and pivot → untyped [`types::WideTable`]
//! 4. [`coerce::coerce`]: placeholders → null, numbers and dates typed
//!
//! Everything dialect-specific (naming dictionary, region key lists, decimal separator, date
//! pattern) lives in one strategy record, [`dialect::DialectProfile`], selected per request.
//!
//! ## Quick example
//!
//! ```rust
//! use genesis_reshape::config::ReshapeConfig;
//! use genesis_reshape::ingestion::{ingest_from_str, IngestionOptions};
//! use genesis_reshape::types::{DataType, Value};
//!
//! # fn main() -> Result<(), genesis_reshape::ReshapeError> {
//! let raw = "\
//! statistics_code;time;1_variable_label;1_variable_attribute_label;value_variable_label;value_unit;value;value_q
//! 12411;2022;Geschlecht;männlich;Bevölkerung;Anzahl;40000000;e
//! 12411;2022;Geschlecht;weiblich;Bevölkerung;Anzahl;...;e
//! ";
//! let options = IngestionOptions {
//!     config: ReshapeConfig {
//!         quality: true,
//!         ..ReshapeConfig::default()
//!     },
//!     ..IngestionOptions::default()
//! };
//! let wide = ingest_from_str(raw, &options)?;
//! assert_eq!(
//!     wide.column_names(),
//!     vec!["time", "Geschlecht", "Bevölkerung__Anzahl", "Bevölkerung__Anzahl__q"]
//! );
//! assert_eq!(wide.schema().fields[2].data_type, DataType::Int64);
//! assert_eq!(wide.rows()[1][2], Value::Null);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`parsing`]: flat-file records and cube blocks
//! - [`dialect`]: databases, languages, header layouts and their strategy records
//! - [`classify`]: column roles
//! - [`reshape`]: long → wide pivot
//! - [`coerce`]: typed output
//! - [`config`]: serde-backed request configuration
//! - [`ingestion`]: unified entrypoints plus observers for logging/alerts
//! - [`execution`]: parallel batches of requests with throttling and metrics
//! - [`export`]: conversion into polars `DataFrame`s
//! - [`types`]: raw and wide table types
//! - [`error`]: the error type shared by every stage

pub mod classify;
pub mod coerce;
pub mod config;
pub mod dialect;
pub mod error;
pub mod execution;
pub mod export;
pub mod ingestion;
pub mod parsing;
pub mod reshape;
pub mod types;

pub use error::{ReshapeError, ReshapeResult};
