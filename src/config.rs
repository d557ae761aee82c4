//! Request configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coerce::{CoerceOptions, ValueKind};
use crate::dialect::{Database, Dialect, FormatVersion, Language};
use crate::error::ReshapeResult;
use crate::reshape::ReshapeOptions;

/// Selectors of one reshaping request.
///
/// Every field has a default, so a JSON document only needs the fields it changes:
///
/// ```
/// use genesis_reshape::config::ReshapeConfig;
/// use genesis_reshape::dialect::Database;
///
/// let config = ReshapeConfig::from_json_str(r#"{"database": "zensus", "quality": true}"#).unwrap();
/// assert_eq!(config.database, Database::Zensus);
/// assert!(config.prettify);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReshapeConfig {
    /// Source database.
    pub database: Database,
    /// Language the export was requested in.
    pub language: Language,
    /// Header layout; detected from the headers when `None`.
    pub version: Option<FormatVersion>,
    /// Keep quality flags as `__q` columns.
    pub quality: bool,
    /// The export was requested with empty rows/columns suppressed.
    pub compress: bool,
    /// Reshape into the wide format; `false` keeps the raw columns.
    pub prettify: bool,
    /// Replace quality codes by explanatory text.
    pub explain_quality: bool,
    /// Declared numeric types by output column name.
    pub value_types: BTreeMap<String, ValueKind>,
}

impl Default for ReshapeConfig {
    fn default() -> Self {
        Self {
            database: Database::default(),
            language: Language::default(),
            version: None,
            quality: false,
            compress: false,
            prettify: true,
            explain_quality: false,
            value_types: BTreeMap::new(),
        }
    }
}

impl ReshapeConfig {
    /// Decode a configuration from JSON.
    pub fn from_json_str(json: &str) -> ReshapeResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Default configuration for an item code, with the database picked by [`Database::identify`].
    ///
    /// When several databases match, the first (GENESIS before Zensus before Regionalstatistik) wins.
    pub fn for_item(item_code: &str) -> ReshapeResult<Self> {
        let candidates = Database::identify(item_code)?;
        Ok(Self {
            database: candidates[0],
            ..Self::default()
        })
    }

    /// Dialect for a table with the given headers.
    pub fn dialect_for<S: AsRef<str>>(&self, headers: &[S]) -> Dialect {
        let version = self
            .version
            .unwrap_or_else(|| FormatVersion::detect(headers));
        Dialect::new(self.database, self.language, version)
    }

    /// Options for the reshaper.
    pub fn reshape_options(&self) -> ReshapeOptions {
        ReshapeOptions {
            quality: self.quality,
        }
    }

    /// Options for the type coercer.
    pub fn coerce_options(&self) -> CoerceOptions {
        CoerceOptions {
            value_types: self.value_types.clone(),
            explain_quality: self.explain_quality,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ReshapeError;

    #[test]
    fn defaults_prettify_and_detect_version() {
        let config = ReshapeConfig::default();
        assert!(config.prettify);
        assert!(!config.quality);
        assert_eq!(config.version, None);
        let dialect = config.dialect_for(&["Zeit", "1_Merkmal_Code"]);
        assert_eq!(dialect.version, FormatVersion::Flat4);
    }

    #[test]
    fn decodes_partial_json() {
        let config = ReshapeConfig::from_json_str(
            r#"{"database":"regio","language":"en","version":"flat5","value_types":{"BEV__Bev__Anzahl":"integer"}}"#,
        )
        .unwrap();
        assert_eq!(config.database, Database::Regio);
        assert_eq!(config.language, Language::En);
        assert_eq!(config.version, Some(FormatVersion::Flat5));
        assert_eq!(
            config.value_types.get("BEV__Bev__Anzahl"),
            Some(&ValueKind::Integer)
        );
        assert_eq!(
            config.dialect_for(&["Zeit"]).version,
            FormatVersion::Flat5
        );
    }

    #[test]
    fn rejects_unknown_database() {
        let err = ReshapeConfig::from_json_str(r#"{"database":"eurostat"}"#).unwrap_err();
        assert!(matches!(err, ReshapeError::Config(_)));
    }

    #[test]
    fn for_item_picks_first_candidate() {
        assert_eq!(
            ReshapeConfig::for_item("1000A-0000").unwrap().database,
            Database::Zensus
        );
        assert!(ReshapeConfig::for_item("???").is_err());
    }
}
