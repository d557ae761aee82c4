use std::collections::HashSet;

use chrono::NaiveDate;

use genesis_reshape::classify::classify_table;
use genesis_reshape::config::ReshapeConfig;
use genesis_reshape::dialect::{Database, Language};
use genesis_reshape::ingestion::{ingest_from_path, ingest_table, IngestionOptions};
use genesis_reshape::parsing::{parse_records, DELIMITER};
use genesis_reshape::types::{ColumnKind, ColumnRole, DataType, Value};

const GENESIS: &str = include_str!("fixtures/genesis_flat5_long.csv");
const REGIO: &str = include_str!("fixtures/regio_flat4.csv");

fn utf8(s: &str) -> Value {
    Value::Utf8(s.to_string())
}

fn date(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn config(database: Database) -> ReshapeConfig {
    ReshapeConfig {
        database,
        ..ReshapeConfig::default()
    }
}

#[test]
fn genesis_long_format_is_pivoted_and_typed() {
    let wide = ingest_table(GENESIS, &config(Database::Genesis)).unwrap();

    // A single region code ("DG") emits no region columns.
    assert_eq!(
        wide.column_names(),
        vec![
            "Stichtag",
            "Geschlecht",
            "Bevölkerungsstand__Anzahl",
            "Durchschnittsalter__Jahre",
        ]
    );
    assert_eq!(wide.row_count(), 4);

    let types: Vec<DataType> = wide.schema().fields.iter().map(|f| f.data_type).collect();
    assert_eq!(
        types,
        vec![DataType::Date, DataType::Utf8, DataType::Int64, DataType::Float64]
    );

    assert_eq!(
        wide.rows()[0],
        vec![
            date(2021, 12, 31),
            utf8("männlich"),
            Value::Int64(40_913_000),
            Value::Float64(44.6),
        ]
    );
    assert_eq!(wide.rows()[3][1], utf8("weiblich"));
    assert_eq!(wide.rows()[3][2], Value::Null);
    assert_eq!(wide.rows()[3][3], Value::Float64(46.3));
}

#[test]
fn genesis_quality_columns_follow_their_values() {
    let cfg = ReshapeConfig {
        quality: true,
        ..config(Database::Genesis)
    };
    let wide = ingest_table(GENESIS, &cfg).unwrap();
    assert_eq!(
        wide.column_names(),
        vec![
            "Stichtag",
            "Geschlecht",
            "Bevölkerungsstand__Anzahl",
            "Bevölkerungsstand__Anzahl__q",
            "Durchschnittsalter__Jahre",
            "Durchschnittsalter__Jahre__q",
        ]
    );
    let q = wide.column("Durchschnittsalter__Jahre__q").unwrap();
    assert_eq!(q, vec![&utf8("e"), &utf8("e"), &utf8("p"), &utf8("p")]);
    assert_eq!(
        wide.schema().field("Bevölkerungsstand__Anzahl__q").unwrap().kind,
        ColumnKind::Quality
    );
}

#[test]
fn output_row_count_matches_distinct_groups() {
    let raw = parse_records(GENESIS, DELIMITER).unwrap();
    assert_eq!(raw.discarded(), 2);

    let time = raw.index_of("time").unwrap();
    let sex = raw.index_of("2_variable_attribute_code").unwrap();
    let groups: HashSet<(&str, &str)> = raw
        .rows()
        .iter()
        .map(|r| (r[time].as_str(), r[sex].as_str()))
        .collect();

    let wide = ingest_table(GENESIS, &config(Database::Genesis)).unwrap();
    assert_eq!(wide.row_count(), groups.len());
}

#[test]
fn regio_flat4_recovers_region_columns() {
    let wide = ingest_from_path(
        "tests/fixtures/regio_flat4.csv",
        &IngestionOptions {
            config: config(Database::Regio),
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(
        wide.column_names(),
        vec![
            "Stichtag",
            "Amtlicher Gemeindeschlüssel (AGS)__Code",
            "Amtlicher Gemeindeschlüssel (AGS)",
            "Geschlecht",
            "Geschlecht_Code",
            "Bevoelkerungsstand__Anzahl",
            "Flaeche__qkm",
        ]
    );
    assert_eq!(wide.row_count(), 4);
    assert_eq!(wide.rows()[1][1], utf8("01001"));
    assert_eq!(wide.rows()[1][2], utf8("Flensburg, kreisfreie Stadt"));
    assert_eq!(wide.rows()[0][3], utf8("Insgesamt"));
    assert_eq!(wide.rows()[0][4], Value::Null);
    assert_eq!(wide.rows()[0][5], Value::Int64(84_358_845));
    assert_eq!(wide.rows()[0][6], Value::Float64(357_595.98));
    assert_eq!(wide.rows()[3][5], Value::Null);
    assert_eq!(
        wide.schema().fields[1].kind,
        ColumnKind::RegionCode
    );
    assert_eq!(wide.schema().fields[4].kind, ColumnKind::AttributeCode);
    assert_eq!(wide.schema().fields[4].data_type, DataType::Utf8);
}

#[test]
fn regio_quality_codes_can_be_explained() {
    let cfg = ReshapeConfig {
        quality: true,
        explain_quality: true,
        ..config(Database::Regio)
    };
    let wide = ingest_table(REGIO, &cfg).unwrap();
    let q = wide.column("Bevoelkerungsstand__Anzahl__q").unwrap();
    assert_eq!(q[0], &utf8("endgültiger Wert"));
    assert_eq!(q[3], &utf8("Zahlenwert unbekannt oder geheim zu halten"));
}

#[test]
fn zensus_english_export_with_json_config() {
    let json = std::fs::read_to_string("tests/fixtures/config_zensus_en.json").unwrap();
    let cfg = ReshapeConfig::from_json_str(&json).unwrap();
    assert_eq!(cfg.database, Database::Zensus);
    assert_eq!(cfg.language, Language::En);

    let wide = ingest_from_path(
        "tests/fixtures/zensus_flat5_en.csv",
        &IngestionOptions {
            config: cfg,
            ..Default::default()
        },
    )
    .unwrap();

    assert_eq!(
        wide.column_names(),
        vec![
            "Reference date",
            "Official regional key (ARS)__Code",
            "Official regional key (ARS)",
            "Sex",
            "Average age__Years",
            "Average age__Years__q",
            "Population__Number",
            "Population__Number__q",
        ]
    );
    assert_eq!(wide.row_count(), 4);
    assert_eq!(wide.rows()[2][0], date(2022, 5, 15));
    assert_eq!(wide.rows()[2][1], utf8("01"));
    assert_eq!(wide.rows()[2][3], utf8("Male"));
    assert_eq!(wide.rows()[2][4], Value::Float64(45.2));
    assert_eq!(wide.rows()[2][5], utf8("final value"));
    assert_eq!(wide.rows()[2][6], Value::Int64(1_400_123));
}

#[test]
fn every_numeric_observation_is_conserved() {
    let raw = parse_records(GENESIS, DELIMITER).unwrap();
    let value_idx = raw.index_of("value").unwrap();
    let mut expected: Vec<String> = raw
        .rows()
        .iter()
        .map(|r| r[value_idx].clone())
        .filter(|v| v != "...")
        .collect();
    expected.sort();

    let cfg = ReshapeConfig {
        prettify: true,
        ..config(Database::Genesis)
    };
    let table = parse_records(GENESIS, DELIMITER).unwrap();
    let dialect = cfg.dialect_for(table.headers());
    let roles = classify_table(&table, &dialect).unwrap();
    let wide = genesis_reshape::reshape::reshape(
        &table,
        &roles,
        &dialect,
        &cfg.reshape_options(),
    )
    .unwrap();

    let mut actual: Vec<String> = ["Bevölkerungsstand__Anzahl", "Durchschnittsalter__Jahre"]
        .iter()
        .flat_map(|c| wide.column(c).unwrap())
        .filter_map(|v| v.as_str().map(str::to_owned))
        .filter(|v| v != "...")
        .collect();
    actual.sort();
    assert_eq!(actual, expected);
}

#[test]
fn single_attribute_scenario() {
    let raw = "A;B;1_variable_label;1_variable_attribute_label;X__Label__Unit\n\
               1;x;Geschlecht;männlich;10\n\
               1;x;Geschlecht;weiblich;12\n";
    let wide = ingest_table(raw, &ReshapeConfig::default()).unwrap();
    assert_eq!(wide.row_count(), 2);
    assert_eq!(wide.column_names(), vec!["Geschlecht", "Label__Unit"]);
    assert_eq!(wide.rows()[1], vec![utf8("weiblich"), Value::Int64(12)]);
}

#[test]
fn prettify_off_keeps_raw_columns() {
    let cfg = ReshapeConfig {
        prettify: false,
        ..config(Database::Genesis)
    };
    let wide = ingest_table(GENESIS, &cfg).unwrap();
    let raw = parse_records(GENESIS, DELIMITER).unwrap();
    assert_eq!(wide.column_count(), raw.headers().len());
    assert_eq!(wide.row_count(), raw.row_count());
    assert!(wide.schema().fields.iter().all(|f| f.data_type == DataType::Utf8));
    // 2022 / weiblich / Bevölkerungsstand is "..." in the export.
    assert_eq!(wide.column("value").unwrap()[6], &Value::Null);
    assert_eq!(wide.column("value").unwrap()[7], &utf8("46,3"));
}

#[test]
fn region_roles_are_reported_by_classification() {
    let table = parse_records(REGIO, DELIMITER).unwrap();
    let dialect = config(Database::Regio).dialect_for(table.headers());
    let roles = classify_table(&table, &dialect).unwrap();
    let map = roles.to_map();
    assert_eq!(map["1_Auspraegung_Code"], ColumnRole::RegionCode);
    assert_eq!(map["1_Auspraegung_Label"], ColumnRole::RegionLabel);
    assert_eq!(map["2_Auspraegung_Label"], ColumnRole::ClassifierAttributeLabel);
    assert_eq!(roles.region_variable(), Some(1));
}

#[test]
fn polars_export_of_reshaped_table() {
    let wide = ingest_table(GENESIS, &config(Database::Genesis)).unwrap();
    let df = wide.to_polars().unwrap();
    assert_eq!(df.height(), 4);
    assert_eq!(df.width(), 4);
    assert_eq!(
        df.column("Bevölkerungsstand__Anzahl").unwrap().null_count(),
        1
    );
}
