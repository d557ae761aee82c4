//! Dialects: which service produced an export and how its columns are named.
//!
//! A [`Dialect`] is selected once per request. [`Dialect::profile`] resolves it into a
//! [`DialectProfile`], a read-only strategy record holding everything the classifier, reshaper
//! and coercer need to know about the source: the header naming dictionary, the closed list of
//! region-classifier codes, region label text, and number/date conventions. The reshaping code
//! itself never branches on the database name.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{ReshapeError, ReshapeResult};
use crate::types::ColumnRole;

/// Source database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Database {
    /// GENESIS-Online (Destatis).
    #[default]
    Genesis,
    /// Zensus 2022 database.
    Zensus,
    /// Regionalstatistik.
    Regio,
}

static GENESIS_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((\d{5}-\d{4})|([0-9A-Z]{10}))$").expect("valid regex"));
static ZENSUS_ITEM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{4}[A-Z]-\d{4}$").expect("valid regex"));
static REGIO_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((\d{5}-.{1,2}($|-.*$))|(A.*$)|([0-9A-Z]{10}$)|(\d{5}\w-Z-\d{1,2}))")
        .expect("valid regex")
});
static JOB_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"_\d+$").expect("valid regex"));

impl Database {
    /// All supported databases, in matching priority order.
    pub const ALL: [Database; 3] = [Database::Genesis, Database::Zensus, Database::Regio];

    /// Lowercase database name.
    pub fn name(&self) -> &'static str {
        match self {
            Database::Genesis => "genesis",
            Database::Zensus => "zensus",
            Database::Regio => "regio",
        }
    }

    /// Databases whose item-code pattern matches `item_code`, in priority order.
    ///
    /// A leading `*` and a trailing job id (`_<digits>`) are ignored.
    pub fn identify(item_code: &str) -> ReshapeResult<Vec<Database>> {
        let normalized = JOB_SUFFIX.replace(item_code.trim(), "");
        let normalized = normalized.trim_start_matches('*');

        let matches: Vec<Database> = Self::ALL
            .into_iter()
            .filter(|db| db.item_pattern().is_match(normalized))
            .collect();

        if matches.is_empty() {
            Err(ReshapeError::UnknownDatabase {
                name: normalized.to_string(),
            })
        } else {
            Ok(matches)
        }
    }

    fn item_pattern(&self) -> &'static Regex {
        match self {
            Database::Genesis => &GENESIS_ITEM,
            Database::Zensus => &ZENSUS_ITEM,
            Database::Regio => &REGIO_ITEM,
        }
    }

    /// Codes of classifying variables that hold official region keys (AGS/ARS).
    pub fn region_codes(&self) -> &'static [&'static str] {
        match self {
            Database::Genesis => GENESIS_REGION_CODES,
            Database::Zensus => ZENSUS_REGION_CODES,
            Database::Regio => REGIO_REGION_CODES,
        }
    }
}

const ZENSUS_REGION_CODES: &[&str] = &[
    "GEOBL1", "GEOBL3", "GEOBZ1", "GEODL1", "GEODL3", "GEOGM1", "GEOGM2", "GEOGM3", "GEOGM4",
    "GEOGM5", "GEOLK1", "GEOLK3", "GEOLK4", "GEORB1", "GEORB3", "GEOVB1", "GEOVB2", "GEOVB3",
    "GEOVB4", "GEOVB5",
];

const GENESIS_REGION_CODES: &[&str] = &[
    "DLAND", "DINSG", "DLANDR", "DLANDS", "DLANDU", "DLANDX", "KREISE", "REGBEZ",
];

const REGIO_REGION_CODES: &[&str] = &[
    "DG", "DINSG", "DLAND", "DLANDU", "FAMTGEM", "FDINSG", "FDLAND", "FGEMEIN", "FKREISE",
    "FREGBEZ", "GEMEIN", "GRSTADT", "KREISE", "NUTS-2", "PGEM-2DI", "PGEMEIN", "REGBEZ",
];

/// Language requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    De,
    En,
}

impl Language {
    /// Decimal separator used in numeric cells.
    pub fn decimal_separator(&self) -> char {
        match self {
            Language::De => ',',
            Language::En => '.',
        }
    }

    /// `chrono` pattern of date cells.
    pub fn date_format(&self) -> &'static str {
        match self {
            Language::De => "%d.%m.%Y",
            Language::En => "%Y-%m-%d",
        }
    }
}

/// Header layout of the flat-file export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatVersion {
    /// German headers (`Zeit`, `1_Merkmal_Label`, `1_Auspraegung_Label`, `CODE__Label__Unit`).
    Flat4,
    /// English snake-case headers (`time`, `1_variable_label`, `value`, `value_unit`, …).
    Flat5,
}

impl FormatVersion {
    /// Infer the header layout from header names.
    pub fn detect<S: AsRef<str>>(headers: &[S]) -> FormatVersion {
        let flat4 = headers.iter().map(AsRef::as_ref).any(|h| {
            h == "Zeit"
                || h.starts_with("Statistik_")
                || h.contains("_Merkmal_")
                || h.contains("_Auspraegung_")
        });
        if flat4 {
            FormatVersion::Flat4
        } else {
            FormatVersion::Flat5
        }
    }
}

/// Database + language + header layout of one export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dialect {
    pub database: Database,
    pub language: Language,
    pub version: FormatVersion,
}

impl Dialect {
    /// Create a dialect.
    pub fn new(database: Database, language: Language, version: FormatVersion) -> Self {
        Self {
            database,
            language,
            version,
        }
    }

    /// Resolve the strategy record for this dialect.
    pub fn profile(&self) -> DialectProfile {
        DialectProfile {
            naming: NamingDictionary::for_version(self.version),
            region_codes: self.database.region_codes(),
            region_label: region_label(self.database, self.language),
            decimal_separator: self.language.decimal_separator(),
            date_format: self.language.date_format(),
            summary_rows: match self.database {
                Database::Genesis => 0,
                Database::Zensus | Database::Regio => 1,
            },
            attribute_codes: self.database == Database::Regio,
        }
    }
}

fn region_label(database: Database, language: Language) -> &'static str {
    match (database, language) {
        (Database::Zensus, Language::De) => "Amtlicher Regionalschlüssel (ARS)",
        (Database::Zensus, Language::En) => "Official regional key (ARS)",
        (_, Language::De) => "Amtlicher Gemeindeschlüssel (AGS)",
        (_, Language::En) => "Official municipality key (AGS)",
    }
}

/// Read-only strategy record derived from a [`Dialect`].
#[derive(Debug, Clone, Copy)]
pub struct DialectProfile {
    /// Header naming dictionary.
    pub naming: &'static NamingDictionary,
    /// Closed list of classifying-variable codes that denote region keys.
    pub region_codes: &'static [&'static str],
    /// Human label of the region key columns.
    pub region_label: &'static str,
    /// Decimal separator of numeric cells.
    pub decimal_separator: char,
    /// `chrono` pattern of date cells.
    pub date_format: &'static str,
    /// Number of leading rows that may hold a whole-country summary.
    pub summary_rows: usize,
    /// Emit a code column next to every classifier attribute.
    pub attribute_codes: bool,
}

impl DialectProfile {
    /// Row index whose label cells (time label, variable labels) are authoritative.
    ///
    /// The first row after the leading summary rows; row 0 if the table is too short.
    pub fn label_row(&self, row_count: usize) -> usize {
        if row_count > self.summary_rows {
            self.summary_rows
        } else {
            0
        }
    }

    /// `true` if `code` names a region classifying variable.
    pub fn is_region_code(&self, code: &str) -> bool {
        self.region_codes.iter().any(|c| *c == code)
    }
}

/// Header naming rules of one [`FormatVersion`].
#[derive(Debug)]
pub struct NamingDictionary {
    /// Headers matched by exact name.
    pub exact: Vec<(&'static str, ColumnRole)>,
    /// Headers that are known but carry nothing the reshaper needs.
    pub auxiliary: Vec<&'static str>,
    /// Per-classifying-variable headers; capture group 1 is the variable number.
    pub variable_patterns: Vec<(Regex, ColumnRole)>,
}

impl NamingDictionary {
    /// Dictionary for a header layout.
    ///
    /// The services currently do not translate header names, so language does not participate.
    pub fn for_version(version: FormatVersion) -> &'static NamingDictionary {
        match version {
            FormatVersion::Flat4 => &FLAT4,
            FormatVersion::Flat5 => &FLAT5,
        }
    }
}

fn variable_pattern(suffix: &str) -> Regex {
    Regex::new(&format!(r"^(\d+)_{suffix}$")).expect("valid regex")
}

static FLAT4: Lazy<NamingDictionary> = Lazy::new(|| NamingDictionary {
    exact: vec![("Zeit", ColumnRole::Time), ("Zeit_Label", ColumnRole::TimeLabel)],
    auxiliary: vec!["Statistik_Code", "Statistik_Label", "Zeit_Code"],
    variable_patterns: vec![
        (variable_pattern("Merkmal_Code"), ColumnRole::ClassifierCode),
        (variable_pattern("Merkmal_Label"), ColumnRole::ClassifierLabel),
        (
            variable_pattern("Auspraegung_Code"),
            ColumnRole::ClassifierAttributeCode,
        ),
        (
            variable_pattern("Auspraegung_Label"),
            ColumnRole::ClassifierAttributeLabel,
        ),
    ],
});

static FLAT5: Lazy<NamingDictionary> = Lazy::new(|| NamingDictionary {
    exact: vec![
        ("time", ColumnRole::Time),
        ("time_label", ColumnRole::TimeLabel),
        ("value", ColumnRole::Value),
        ("value_unit", ColumnRole::ValueUnit),
        ("value_variable_label", ColumnRole::ValueVariableLabel),
        ("value_q", ColumnRole::ValueQuality),
    ],
    auxiliary: vec![
        "statistics_code",
        "statistics_label",
        "time_code",
        "value_variable_code",
    ],
    variable_patterns: vec![
        (variable_pattern("variable_code"), ColumnRole::ClassifierCode),
        (variable_pattern("variable_label"), ColumnRole::ClassifierLabel),
        (
            variable_pattern("variable_attribute_code"),
            ColumnRole::ClassifierAttributeCode,
        ),
        (
            variable_pattern("variable_attribute_label"),
            ColumnRole::ClassifierAttributeLabel,
        ),
    ],
});
