//! Core data model types.
//!
//! Raw exports are parsed into a [`RawTable`] (untyped string cells). The reshaping engine turns a
//! [`RawTable`] into a [`WideTable`], whose [`Schema`] is a list of typed, kind-tagged [`Field`]s.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ReshapeError, ReshapeResult};

/// Header row plus string rows, exactly as found in a raw export.
///
/// Every row has the same length as `headers`. Header names are not necessarily unique.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTable {
    pub(crate) headers: Vec<String>,
    pub(crate) rows: Vec<Vec<String>>,
    pub(crate) discarded: usize,
}

impl RawTable {
    /// Create a raw table, checking that every row has the header's length.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> ReshapeResult<Self> {
        if let Some((idx, row)) = rows
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != headers.len())
        {
            return Err(ReshapeError::format(format!(
                "row {} has {} fields, header has {}",
                idx + 1,
                row.len(),
                headers.len()
            )));
        }
        Ok(Self {
            headers,
            rows,
            discarded: 0,
        })
    }

    /// Header names in source order.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Data rows in source order.
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// Number of source lines dropped by the record filter (diagnostics only).
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Number of data rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Index of the first header named `name`.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Cell at `(row, column)`, or `""` when out of range.
    pub fn cell(&self, row: usize, column: usize) -> &str {
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .map(String::as_str)
            .unwrap_or("")
    }

    /// All cells of one column, top to bottom.
    pub fn column(&self, column: usize) -> impl Iterator<Item = &str> {
        self.rows
            .iter()
            .map(move |r| r.get(column).map(String::as_str).unwrap_or(""))
    }
}

/// Role of a raw column in the long-format export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ColumnRole {
    Time,
    TimeLabel,
    RegionCode,
    RegionLabel,
    ClassifierCode,
    ClassifierLabel,
    ClassifierAttributeCode,
    ClassifierAttributeLabel,
    ValueVariableLabel,
    ValueUnit,
    Value,
    ValueQuality,
}

/// Logical data type of a [`WideTable`] column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    /// UTF-8 string (also used for categorical columns).
    Utf8,
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Calendar date.
    Date,
}

/// What a [`WideTable`] column represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Time,
    RegionCode,
    RegionLabel,
    Attribute,
    /// Code of a classifier attribute (Regionalstatistik keeps them next to the labels).
    AttributeCode,
    Value,
    Quality,
    /// Carried through unchanged (raw fallback, cube bookkeeping columns).
    Auxiliary,
}

/// A single named, typed column of a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Column name.
    pub name: String,
    /// Column data type.
    pub data_type: DataType,
    /// Column kind.
    pub kind: ColumnKind,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            data_type,
            kind,
        }
    }

    /// Create an untyped (`Utf8`) field, as produced by the reshaper.
    pub fn utf8(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self::new(name, DataType::Utf8, kind)
    }
}

/// Ordered list of fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of a field by name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Returns the field with the given name, if present.
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// A single cell of a [`WideTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing value.
    Null,
    /// UTF-8 string.
    Utf8(String),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Calendar date.
    Date(NaiveDate),
}

impl Value {
    /// String content of a `Utf8` cell.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Utf8(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// Reshaped, human-readable table: one row per combination of classifying values.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct WideTable {
    pub(crate) schema: Schema,
    pub(crate) rows: Vec<Vec<Value>>,
}

impl WideTable {
    /// Create a table from schema and rows, checking that every row has one cell per field.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> ReshapeResult<Self> {
        let width = schema.fields.len();
        if let Some((idx, row)) = rows.iter().enumerate().find(|(_, row)| row.len() != width) {
            return Err(ReshapeError::format(format!(
                "row {} has {} cells, schema has {} fields",
                idx + 1,
                row.len(),
                width
            )));
        }
        Ok(Self { schema, rows })
    }

    /// Schema describing row shape.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Row-major value storage.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of rows.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns.
    pub fn column_count(&self) -> usize {
        self.schema.fields.len()
    }

    /// Column names in order.
    pub fn column_names(&self) -> Vec<&str> {
        self.schema.field_names().collect()
    }

    /// Copy of the table without the columns of the given kind.
    pub fn without_kind(&self, kind: ColumnKind) -> WideTable {
        let keep: Vec<usize> = (0..self.column_count())
            .filter(|&i| self.schema.fields[i].kind != kind)
            .collect();
        let fields = keep.iter().map(|&i| self.schema.fields[i].clone()).collect();
        let rows = self
            .rows
            .iter()
            .map(|row| keep.iter().map(|&i| row[i].clone()).collect())
            .collect();
        WideTable {
            schema: Schema::new(fields),
            rows,
        }
    }

    /// All values of the named column, top to bottom.
    pub fn column(&self, name: &str) -> Option<Vec<&Value>> {
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|row| &row[idx]).collect())
    }
}
