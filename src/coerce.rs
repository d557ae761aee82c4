//! Type coercion of reshaped tables.
//!
//! The reshaper emits untyped (`Utf8`/`Null`) cells. [`coerce`] turns value columns into
//! `Int64`/`Float64`, time columns into `Date` where every token is a calendar date, and maps the
//! service's missing-value placeholders to `Null`.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dialect::{Dialect, Language};
use crate::error::{ReshapeError, ReshapeResult};
use crate::types::{ColumnKind, DataType, Field, Schema, Value, WideTable};

/// Placeholders the services put into cells without a figure.
pub const MISSING_PLACEHOLDERS: [&str; 5] = ["...", ".", "-", "/", "x"];

/// Declared numeric type of a value column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// Whole numbers → `Int64`.
    Integer,
    /// Fixed-point numbers → `Float64`.
    Decimal,
}

/// Options for [`coerce`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CoerceOptions {
    /// Declared types by output column name. Undeclared value columns are inferred.
    pub value_types: BTreeMap<String, ValueKind>,
    /// Replace quality codes by their explanatory text.
    pub explain_quality: bool,
}

/// `true` for empty cells and missing-value placeholders.
pub fn is_missing(raw: &str) -> bool {
    let token = raw.trim();
    token.is_empty() || MISSING_PLACEHOLDERS.iter().any(|p| *p == token)
}

/// Explanatory text of a quality/footnote code, if known.
pub fn explain_quality(code: &str, language: Language) -> Option<&'static str> {
    let (de, en) = match code.trim() {
        "e" => ("endgültiger Wert", "final value"),
        "p" => ("vorläufiger Wert", "provisional value"),
        "r" => ("berichtigter Wert", "revised value"),
        "s" => ("geschätzter Wert", "estimated value"),
        "0" => (
            "weniger als die Hälfte von 1 in der letzten besetzten Stelle, jedoch mehr als nichts",
            "less than half of 1 in the last digit shown, but more than zero",
        ),
        "-" => ("nichts vorhanden", "magnitude zero"),
        "..." => ("Angabe fällt später an", "data will be available later"),
        "." => (
            "Zahlenwert unbekannt oder geheim zu halten",
            "numerical value unknown or to be kept secret",
        ),
        "/" => (
            "keine Angaben, da Zahlenwert nicht sicher genug",
            "no data because the numerical value is not sufficiently reliable",
        ),
        "x" => (
            "Tabellenfach gesperrt, weil Aussage nicht sinnvoll",
            "cell blocked because the information is not meaningful",
        ),
        _ => return None,
    };
    Some(match language {
        Language::De => de,
        Language::En => en,
    })
}

/// Coerce every column of `wide` according to its kind.
///
/// Columns that are already typed (not `Utf8`) are left as they are, so coercing twice is a no-op.
pub fn coerce(
    wide: &WideTable,
    dialect: &Dialect,
    options: &CoerceOptions,
) -> ReshapeResult<WideTable> {
    let profile = dialect.profile();
    let mut fields = Vec::with_capacity(wide.column_count());
    let mut columns: Vec<Vec<Value>> = Vec::with_capacity(wide.column_count());

    for (idx, field) in wide.schema.fields.iter().enumerate() {
        let cells: Vec<&Value> = wide.rows.iter().map(|row| &row[idx]).collect();
        if field.data_type != DataType::Utf8 {
            fields.push(field.clone());
            columns.push(cells.into_iter().cloned().collect());
            continue;
        }
        let tokens: Vec<Option<&str>> = cells.iter().map(|v| v.as_str()).collect();

        let (data_type, values) = match field.kind {
            ColumnKind::Value => {
                let kind = options
                    .value_types
                    .get(&field.name)
                    .copied()
                    .unwrap_or_else(|| infer_kind(&tokens));
                coerce_numbers(&field.name, &tokens, kind, profile.decimal_separator)?
            }
            ColumnKind::Time => coerce_time(&tokens, profile.date_format),
            ColumnKind::Quality => {
                let language = dialect.language;
                let values = tokens
                    .iter()
                    .map(|t| match t.map(str::trim) {
                        None | Some("") => Value::Null,
                        Some(code) if options.explain_quality => Value::Utf8(
                            explain_quality(code, language)
                                .unwrap_or(code)
                                .to_string(),
                        ),
                        Some(code) => Value::Utf8(code.to_string()),
                    })
                    .collect();
                (DataType::Utf8, values)
            }
            _ => (DataType::Utf8, text_values(&tokens)),
        };

        fields.push(Field::new(field.name.clone(), data_type, field.kind));
        columns.push(values);
    }

    let rows = (0..wide.row_count())
        .map(|r| columns.iter().map(|col| col[r].clone()).collect())
        .collect();
    let out = WideTable::new(Schema::new(fields), rows)?;
    debug!(
        rows = out.row_count(),
        columns = out.column_count(),
        "coerced table"
    );
    Ok(out)
}

fn text_values(tokens: &[Option<&str>]) -> Vec<Value> {
    tokens
        .iter()
        .map(|t| match t {
            Some(s) if !s.trim().is_empty() => Value::Utf8((*s).to_string()),
            _ => Value::Null,
        })
        .collect()
}

fn is_integer_literal(token: &str) -> bool {
    let digits = token.strip_prefix(['-', '+']).unwrap_or(token);
    !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
}

fn infer_kind(tokens: &[Option<&str>]) -> ValueKind {
    let mut present = tokens
        .iter()
        .flatten()
        .map(|t| t.trim())
        .filter(|t| !is_missing(t))
        .peekable();
    if present.peek().is_none() {
        return ValueKind::Decimal;
    }
    if present.all(is_integer_literal) {
        ValueKind::Integer
    } else {
        ValueKind::Decimal
    }
}

fn coerce_numbers(
    column: &str,
    tokens: &[Option<&str>],
    kind: ValueKind,
    decimal_separator: char,
) -> ReshapeResult<(DataType, Vec<Value>)> {
    let data_type = match kind {
        ValueKind::Integer => DataType::Int64,
        ValueKind::Decimal => DataType::Float64,
    };
    let mut values = Vec::with_capacity(tokens.len());
    for token in tokens {
        let token = match token {
            Some(t) if !is_missing(t) => t.trim(),
            _ => {
                values.push(Value::Null);
                continue;
            }
        };
        let value = match kind {
            ValueKind::Integer => token
                .parse::<i64>()
                .map(Value::Int64)
                .map_err(|_| coercion_error(column, token, "expected an integer"))?,
            ValueKind::Decimal => Value::Float64(parse_decimal(column, token, decimal_separator)?),
        };
        values.push(value);
    }
    Ok((data_type, values))
}

fn parse_decimal(column: &str, token: &str, decimal_separator: char) -> ReshapeResult<f64> {
    let foreign = if decimal_separator == ',' { '.' } else { ',' };
    if token.contains(foreign) {
        return Err(coercion_error(
            column,
            token,
            format!("unexpected separator '{foreign}', decimal separator is '{decimal_separator}'"),
        ));
    }
    let normalized = token.replace(decimal_separator, ".");
    let digits = normalized.strip_prefix(['-', '+']).unwrap_or(normalized.as_str());
    let well_formed = digits.chars().next().is_some_and(|c| c.is_ascii_digit())
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.');
    if !well_formed {
        return Err(coercion_error(column, token, "expected a decimal number"));
    }
    normalized
        .parse::<f64>()
        .map_err(|_| coercion_error(column, token, "expected a decimal number"))
}

fn coerce_time(tokens: &[Option<&str>], date_format: &str) -> (DataType, Vec<Value>) {
    let present: Vec<&str> = tokens
        .iter()
        .flatten()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect();
    let all_dates = !present.is_empty()
        && present
            .iter()
            .all(|t| NaiveDate::parse_from_str(t, date_format).is_ok());
    if !all_dates {
        return (DataType::Utf8, text_values(tokens));
    }

    let values = tokens
        .iter()
        .map(|t| match t.map(str::trim) {
            Some(s) if !s.is_empty() => NaiveDate::parse_from_str(s, date_format)
                .map(Value::Date)
                .unwrap_or(Value::Null),
            _ => Value::Null,
        })
        .collect();
    (DataType::Date, values)
}

fn coercion_error(column: &str, raw: &str, message: impl Into<String>) -> ReshapeError {
    ReshapeError::TypeCoercion {
        column: column.to_string(),
        raw: raw.to_string(),
        message: message.into(),
    }
}
