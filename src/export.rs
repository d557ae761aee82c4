//! Conversion of [`WideTable`]s into polars `DataFrame`s.

use chrono::NaiveDate;
use polars::prelude::{Column, DataFrame, DataType as PlDataType, NamedFrom, Series};

use crate::error::ReshapeResult;
use crate::types::{DataType, Value, WideTable};

impl WideTable {
    /// Convert into a polars `DataFrame`, one series per column.
    ///
    /// `Date` columns become polars `Date` (days since the Unix epoch). Cells whose variant does not
    /// match the column type are treated as null.
    pub fn to_polars(&self) -> ReshapeResult<DataFrame> {
        let mut columns: Vec<Column> = Vec::with_capacity(self.column_count());
        for (idx, field) in self.schema.fields.iter().enumerate() {
            let cells = self.rows.iter().map(|row| &row[idx]);
            let name = field.name.as_str();
            let series = match field.data_type {
                DataType::Utf8 => {
                    let v: Vec<Option<String>> = cells
                        .map(|c| match c {
                            Value::Utf8(s) => Some(s.clone()),
                            _ => None,
                        })
                        .collect();
                    Series::new(name.into(), v)
                }
                DataType::Int64 => {
                    let v: Vec<Option<i64>> = cells
                        .map(|c| match c {
                            Value::Int64(n) => Some(*n),
                            _ => None,
                        })
                        .collect();
                    Series::new(name.into(), v)
                }
                DataType::Float64 => {
                    let v: Vec<Option<f64>> = cells
                        .map(|c| match c {
                            Value::Float64(n) => Some(*n),
                            _ => None,
                        })
                        .collect();
                    Series::new(name.into(), v)
                }
                DataType::Date => {
                    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default();
                    let v: Vec<Option<i32>> = cells
                        .map(|c| match c {
                            Value::Date(d) => Some((*d - epoch).num_days() as i32),
                            _ => None,
                        })
                        .collect();
                    Series::new(name.into(), v).cast(&PlDataType::Date)?
                }
            };
            columns.push(series.into());
        }
        Ok(DataFrame::new_infer_height(columns)?)
    }
}
