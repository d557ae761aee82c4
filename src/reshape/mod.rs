//! Long → wide reshaping.
//!
//! [`reshape`] groups the raw rows by time, region and classifier attributes, pivots the measured
//! quantities into one column per `(label, unit)` and names every column from the labels carried
//! inside the data. [`raw_wide`] is the unreshaped fallback.
//!
//! Output column order:
//!
//! 1. time (when the table has one)
//! 2. `"{region label}__Code"`, `"{region label}"` (when a region variable has ≥ 2 codes)
//! 3. classifier attributes, in column order, then (Regionalstatistik only) one
//!    `"{attribute}_Code"` column per attribute
//! 4. per value column `"{label}__{unit}"` (sorted by name), followed by `"{label}__{unit}__q"`
//!    when quality is requested

mod pivot;

use std::collections::HashSet;

use tracing::debug;

use crate::classify::ColumnRoles;
use crate::coerce::is_missing;
use crate::dialect::Dialect;
use crate::error::{ReshapeError, ReshapeResult};
use crate::parsing::dedupe_names;
use crate::types::{ColumnKind, ColumnRole, Field, RawTable, Schema, Value, WideTable};

use pivot::{pivot, ValueSources};

/// Options for [`reshape`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReshapeOptions {
    /// Emit a `__q` column after every value column (when the table carries quality flags).
    pub quality: bool,
}

/// One output column and where its cells come from.
enum Output<'p> {
    Raw(usize),
    Value(&'p str),
    Quality(&'p str),
}

/// Reshape a classified long-format table into a wide table.
///
/// All output cells are `Utf8` or `Null`; types are assigned by [`crate::coerce::coerce`].
pub fn reshape(
    table: &RawTable,
    roles: &ColumnRoles,
    dialect: &Dialect,
    options: &ReshapeOptions,
) -> ReshapeResult<WideTable> {
    if roles.columns().len() != table.headers.len() {
        return Err(ReshapeError::format(format!(
            "{} classified columns for a table with {} columns",
            roles.columns().len(),
            table.headers.len()
        )));
    }
    let profile = dialect.profile();
    let label_row = profile.label_row(table.row_count());

    let sources = ValueSources::from_roles(roles)?;
    if sources.is_empty() {
        return Err(ReshapeError::format("table has no value column"));
    }

    let time = roles.first_with_role(ColumnRole::Time);
    let region_code = roles.first_with_role(ColumnRole::RegionCode);
    let region_label = roles.first_with_role(ColumnRole::RegionLabel);
    let attribute_codes: Vec<_> = roles.with_role(ColumnRole::ClassifierAttributeCode).collect();
    let attributes: Vec<_> = roles.with_role(ColumnRole::ClassifierAttributeLabel).collect();

    let key_columns: Vec<usize> = time
        .iter()
        .chain(region_code.iter())
        .chain(region_label.iter())
        .chain(attribute_codes.iter())
        .chain(attributes.iter())
        .map(|c| c.index)
        .collect();

    let pivot = pivot(table, &key_columns, &sources)?;

    let mut fields = Vec::new();
    let mut outputs = Vec::new();

    if let Some(time) = time {
        let name = roles
            .first_with_role(ColumnRole::TimeLabel)
            .map(|l| table.cell(label_row, l.index))
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(time.name.as_str());
        fields.push(Field::utf8(name, ColumnKind::Time));
        outputs.push(Output::Raw(time.index));
    }

    if let (Some(code), Some(label)) = (region_code, region_label) {
        let distinct: HashSet<&str> = table
            .column(code.index)
            .filter(|c| !is_missing(c))
            .collect();
        if distinct.len() >= 2 {
            fields.push(Field::utf8(
                format!("{}__Code", profile.region_label),
                ColumnKind::RegionCode,
            ));
            outputs.push(Output::Raw(code.index));
            fields.push(Field::utf8(profile.region_label, ColumnKind::RegionLabel));
            outputs.push(Output::Raw(label.index));
        }
    }

    let attribute_names: Vec<String> = attributes
        .iter()
        .map(|attr| {
            attr.variable
                .and_then(|v| roles.variable_column(v, ColumnRole::ClassifierLabel))
                .map(|l| table.cell(label_row, l.index))
                .filter(|n| !n.trim().is_empty())
                .unwrap_or(attr.name.as_str())
                .to_string()
        })
        .collect();
    let attribute_names = dedupe_names(attribute_names);
    for (attr, name) in attributes.iter().zip(&attribute_names) {
        fields.push(Field::utf8(name.as_str(), ColumnKind::Attribute));
        outputs.push(Output::Raw(attr.index));
    }
    if profile.attribute_codes {
        for (attr, name) in attributes.iter().zip(&attribute_names) {
            let code = attr
                .variable
                .and_then(|v| roles.variable_column(v, ColumnRole::ClassifierAttributeCode));
            if let Some(code) = code {
                fields.push(Field::utf8(format!("{name}_Code"), ColumnKind::AttributeCode));
                outputs.push(Output::Raw(code.index));
            }
        }
    }

    let with_quality = options.quality && sources.has_quality();
    for column in pivot.columns.keys() {
        fields.push(Field::utf8(column.clone(), ColumnKind::Value));
        outputs.push(Output::Value(column.as_str()));
        if with_quality {
            fields.push(Field::utf8(format!("{column}__q"), ColumnKind::Quality));
            outputs.push(Output::Quality(column.as_str()));
        }
    }

    let rows = pivot
        .groups
        .iter()
        .enumerate()
        .map(|(group, &row_idx)| {
            let row = &table.rows[row_idx];
            outputs
                .iter()
                .map(|out| match out {
                    Output::Raw(idx) => text(&row[*idx]),
                    Output::Value(column) => pivot
                        .cell(column, group)
                        .map(|c| text(&c.value))
                        .unwrap_or(Value::Null),
                    Output::Quality(column) => pivot
                        .cell(column, group)
                        .and_then(|c| c.quality.as_deref())
                        .map(text)
                        .unwrap_or(Value::Null),
                })
                .collect()
        })
        .collect();

    debug!(
        groups = pivot.groups.len(),
        value_columns = pivot.columns.len(),
        region = ?roles.region_variable(),
        "reshaped table"
    );
    WideTable::new(Schema::new(fields), rows)
}

fn text(cell: &str) -> Value {
    if cell.trim().is_empty() {
        Value::Null
    } else {
        Value::Utf8(cell.to_string())
    }
}

/// Keep every raw column as is (`prettify = false`): all `Utf8`, placeholders mapped to `Null`.
pub fn raw_wide(table: &RawTable, roles: &ColumnRoles) -> ReshapeResult<WideTable> {
    let fields = roles
        .columns()
        .iter()
        .map(|c| {
            let kind = match c.role {
                Some(ColumnRole::Time) => ColumnKind::Time,
                Some(ColumnRole::RegionCode) => ColumnKind::RegionCode,
                Some(ColumnRole::RegionLabel) => ColumnKind::RegionLabel,
                Some(ColumnRole::ClassifierAttributeLabel) => ColumnKind::Attribute,
                Some(ColumnRole::ClassifierAttributeCode) => ColumnKind::AttributeCode,
                Some(ColumnRole::Value) => ColumnKind::Value,
                Some(ColumnRole::ValueQuality) => ColumnKind::Quality,
                _ => ColumnKind::Auxiliary,
            };
            Field::utf8(c.name.clone(), kind)
        })
        .collect();
    let rows = table
        .rows
        .iter()
        .map(|row| {
            row.iter()
                .map(|cell| {
                    if is_missing(cell) {
                        Value::Null
                    } else {
                        Value::Utf8(cell.clone())
                    }
                })
                .collect()
        })
        .collect();
    WideTable::new(Schema::new(fields), rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, classify_table};
    use crate::dialect::{Database, FormatVersion, Language};
    use crate::parsing::{parse_records, DELIMITER};

    fn run(raw: &str, database: Database, quality: bool) -> WideTable {
        let table = parse_records(raw, DELIMITER).unwrap();
        let dialect = Dialect::new(
            database,
            Language::De,
            FormatVersion::detect(&table.headers),
        );
        let roles = classify_table(&table, &dialect).unwrap();
        reshape(&table, &roles, &dialect, &ReshapeOptions { quality }).unwrap()
    }

    fn utf8(s: &str) -> Value {
        Value::Utf8(s.to_string())
    }

    #[test]
    fn classifier_column_is_named_from_first_row_label() {
        let raw = "A;B;1_variable_label;1_variable_attribute_label;X__Label__Unit\n\
                   1;b;Geschlecht;männlich;5\n\
                   1;b;Geschlecht;weiblich;6\n";
        let wide = run(raw, Database::Genesis, false);
        assert_eq!(wide.column_names(), vec!["Geschlecht", "Label__Unit"]);
        assert_eq!(wide.row_count(), 2);
        assert_eq!(wide.rows[0], vec![utf8("männlich"), utf8("5")]);
        assert_eq!(wide.rows[1], vec![utf8("weiblich"), utf8("6")]);
    }

    #[test]
    fn long_format_is_pivoted_with_quality_after_each_value() {
        let raw = "statistics_code;time_label;time;1_variable_label;1_variable_attribute_code;1_variable_attribute_label;value_variable_label;value_unit;value;value_q\n\
                   12411;Jahr;2020;Geschlecht;M;männlich;Einwohner;Anzahl;100;e\n\
                   12411;Jahr;2020;Geschlecht;M;männlich;Alter;Jahre;44,1;p\n\
                   12411;Jahr;2020;Geschlecht;W;weiblich;Einwohner;Anzahl;110;e\n\
                   12411;Jahr;2020;Geschlecht;W;weiblich;Alter;Jahre;46,9;e\n";
        let wide = run(raw, Database::Genesis, true);
        assert_eq!(
            wide.column_names(),
            vec![
                "Jahr",
                "Geschlecht",
                "Alter__Jahre",
                "Alter__Jahre__q",
                "Einwohner__Anzahl",
                "Einwohner__Anzahl__q",
            ]
        );
        // 4 long rows with 2 distinct value variables.
        assert_eq!(wide.row_count(), 4 / 2);
        assert_eq!(
            wide.rows[1],
            vec![
                utf8("2020"),
                utf8("weiblich"),
                utf8("46,9"),
                utf8("e"),
                utf8("110"),
                utf8("e"),
            ]
        );
    }

    #[test]
    fn quality_columns_are_omitted_unless_requested() {
        let raw = "time;value_variable_label;value_unit;value;value_q\n\
                   2020;Einwohner;Anzahl;100;e\n";
        let wide = run(raw, Database::Genesis, false);
        assert_eq!(wide.column_names(), vec!["time", "Einwohner__Anzahl"]);
    }

    #[test]
    fn every_value_is_conserved() {
        let raw = "time;1_variable_attribute_label;value_variable_label;value_unit;value\n\
                   2020;a;V;u;1\n2020;b;V;u;2\n2021;a;V;u;3\n2021;b;W;u;4\n";
        let wide = run(raw, Database::Genesis, false);
        let mut values: Vec<String> = ["V__u", "W__u"]
            .iter()
            .flat_map(|c| wide.column(c).unwrap())
            .filter_map(|v| v.as_str().map(str::to_owned))
            .collect();
        values.sort();
        assert_eq!(values, vec!["1", "2", "3", "4"]);
        assert_eq!(wide.column("W__u").unwrap()[0], &Value::Null);
    }

    #[test]
    fn region_columns_follow_time_when_there_are_several_codes() {
        let raw = "Statistik_Code;Zeit;1_Merkmal_Code;1_Merkmal_Label;1_Auspraegung_Code;1_Auspraegung_Label;BEV__Bevoelkerung__Anzahl\n\
                   12411;2020;DG;Deutschland;DG;Deutschland;83000\n\
                   12411;2020;DLAND;Bundesländer;01;Schleswig-Holstein;2900\n\
                   12411;2020;DLAND;Bundesländer;02;Hamburg;1800\n";
        let wide = run(raw, Database::Regio, false);
        assert_eq!(
            wide.column_names(),
            vec![
                "Zeit",
                "Amtlicher Gemeindeschlüssel (AGS)__Code",
                "Amtlicher Gemeindeschlüssel (AGS)",
                "Bevoelkerung__Anzahl",
            ]
        );
        assert_eq!(wide.row_count(), 3);
        assert_eq!(wide.rows[2][1], utf8("02"));
        assert_eq!(wide.rows[2][2], utf8("Hamburg"));
    }

    #[test]
    fn single_region_code_emits_no_region_columns() {
        let raw = "Zeit;1_Merkmal_Code;1_Merkmal_Label;1_Auspraegung_Code;1_Auspraegung_Label;BEV__Bevoelkerung__Anzahl\n\
                   2020;DLAND;Bundesländer;01;Schleswig-Holstein;2900\n\
                   2021;DLAND;Bundesländer;01;Schleswig-Holstein;2910\n";
        let wide = run(raw, Database::Regio, false);
        assert_eq!(wide.column_names(), vec!["Zeit", "Bevoelkerung__Anzahl"]);
        assert_eq!(wide.row_count(), 2);
    }

    #[test]
    fn empty_region_codes_do_not_count_as_distinct() {
        let raw = "Zeit;1_Merkmal_Code;1_Merkmal_Label;1_Auspraegung_Code;1_Auspraegung_Label;BEV__Bevoelkerung__Anzahl\n\
                   2020;KREISE;Kreise;;Insgesamt;92000\n\
                   2020;KREISE;Kreise;01001;Flensburg;91000\n";
        let wide = run(raw, Database::Regio, false);
        assert_eq!(wide.column_names(), vec!["Zeit", "Bevoelkerung__Anzahl"]);
    }

    #[test]
    fn regio_attribute_codes_follow_the_attribute_labels() {
        let raw = "Zeit;1_Merkmal_Code;1_Merkmal_Label;1_Auspraegung_Code;1_Auspraegung_Label;2_Merkmal_Code;2_Merkmal_Label;2_Auspraegung_Code;2_Auspraegung_Label;BEV__Bevoelkerung__Anzahl\n\
                   2020;GES;Geschlecht;GESM;männlich;ALT;Altersgruppen;ALT000B18;unter 18 Jahre;10\n\
                   2020;GES;Geschlecht;GESM;männlich;ALT;Altersgruppen;ALT018UM;18 Jahre und mehr;20\n\
                   2020;GES;Geschlecht;GESW;weiblich;ALT;Altersgruppen;ALT000B18;unter 18 Jahre;11\n";
        let wide = run(raw, Database::Regio, false);
        assert_eq!(
            wide.column_names(),
            vec![
                "Zeit",
                "Geschlecht",
                "Altersgruppen",
                "Geschlecht_Code",
                "Altersgruppen_Code",
                "Bevoelkerung__Anzahl",
            ]
        );
        assert_eq!(wide.schema.fields[3].kind, ColumnKind::AttributeCode);
        assert_eq!(
            wide.rows[1],
            vec![
                utf8("2020"),
                utf8("männlich"),
                utf8("18 Jahre und mehr"),
                utf8("GESM"),
                utf8("ALT018UM"),
                utf8("20"),
            ]
        );

        let genesis = run(raw, Database::Genesis, false);
        assert!(!genesis.column_names().contains(&"Geschlecht_Code"));
    }

    #[test]
    fn roles_of_another_table_are_a_format_error() {
        let table = parse_records("time;value_variable_label;value_unit;value\n2020;E;A;1\n", DELIMITER)
            .unwrap();
        let dialect = Dialect::new(Database::Genesis, Language::De, FormatVersion::Flat5);
        let roles = classify(&["time", "value"], &dialect).unwrap();
        let err = reshape(&table, &roles, &dialect, &ReshapeOptions::default()).unwrap_err();
        assert!(matches!(err, ReshapeError::Format { .. }));
    }

    #[test]
    fn label_row_skips_summary_row_for_zensus() {
        let raw = "time;time_label;1_variable_label;1_variable_attribute_label;value_variable_label;value_unit;value\n\
                   2022;Insgesamt;Insgesamt;Insgesamt;Personen;Anzahl;10\n\
                   2022;Stichtag;Geschlecht;männlich;Personen;Anzahl;4\n";
        let wide = run(raw, Database::Zensus, false);
        assert_eq!(
            wide.column_names(),
            vec!["Stichtag", "Geschlecht", "Personen__Anzahl"]
        );
    }

    #[test]
    fn duplicate_attribute_names_are_suffixed() {
        let raw = "1_variable_label;1_variable_attribute_label;2_variable_label;2_variable_attribute_label;X__V__u\n\
                   1;a;1;b;5\n";
        let wide = run(raw, Database::Genesis, false);
        assert_eq!(wide.column_names(), vec!["1-1", "1-2", "V__u"]);
    }

    #[test]
    fn table_without_values_is_a_format_error() {
        let table = parse_records("time;1_variable_label\n2020;x\n", DELIMITER).unwrap();
        let dialect = Dialect::new(Database::Genesis, Language::De, FormatVersion::Flat5);
        let roles = classify_table(&table, &dialect).unwrap();
        let err = reshape(&table, &roles, &dialect, &ReshapeOptions::default()).unwrap_err();
        assert!(err.to_string().contains("no value column"));
    }

    #[test]
    fn raw_wide_keeps_every_column() {
        let table = parse_records("statistics_code;time;value\n12411;2020;...\n", DELIMITER)
            .unwrap();
        let dialect = Dialect::new(Database::Genesis, Language::De, FormatVersion::Flat5);
        let roles = classify_table(&table, &dialect).unwrap();
        let wide = raw_wide(&table, &roles).unwrap();
        assert_eq!(wide.column_names(), vec!["statistics_code", "time", "value"]);
        assert_eq!(wide.rows[0][2], Value::Null);
        assert_eq!(wide.schema.fields[1].kind, ColumnKind::Time);
    }
}
