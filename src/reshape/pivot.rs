//! Group-and-pivot over raw rows.
//!
//! Rows are grouped by the cells of the key columns, in first-seen order. Every row contributes
//! observations `(column, value, quality)` from its value sources; each observation fills one
//! cell of its group. Quality is carried inside the cell so it cannot drift from its value.

use std::collections::{BTreeMap, HashMap};

use crate::classify::ColumnRoles;
use crate::error::{ReshapeError, ReshapeResult};
use crate::types::{ColumnRole, RawTable};

/// A pivoted cell: the value and, if a quality source exists, its quality flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Cell {
    pub value: String,
    pub quality: Option<String>,
}

/// Long format: one `value` column labelled by `value_variable_label` / `value_unit` cells.
#[derive(Debug, Clone, Copy)]
struct LongSource {
    value: usize,
    label: usize,
    unit: Option<usize>,
    quality: Option<usize>,
}

/// Structural `{code}__{label}__{unit}` column.
#[derive(Debug, Clone)]
struct StructuralSource {
    value: usize,
    column: String,
    quality: Option<usize>,
}

/// Where the measured values of a table live.
#[derive(Debug, Clone, Default)]
pub(crate) struct ValueSources {
    long: Option<LongSource>,
    structural: Vec<StructuralSource>,
}

impl ValueSources {
    pub(crate) fn from_roles(roles: &ColumnRoles) -> ReshapeResult<Self> {
        let mut sources = ValueSources::default();

        for column in roles.with_role(ColumnRole::Value) {
            match &column.measure {
                Some(measure) => {
                    let quality = roles
                        .with_role(ColumnRole::ValueQuality)
                        .find(|q| q.measure.as_ref() == Some(measure))
                        .map(|q| q.index);
                    sources.structural.push(StructuralSource {
                        value: column.index,
                        column: measure.column_name(),
                        quality,
                    });
                }
                None => {
                    if sources.long.is_some() {
                        return Err(ReshapeError::format(
                            "more than one long-format value column",
                        ));
                    }
                    let label = roles
                        .first_with_role(ColumnRole::ValueVariableLabel)
                        .ok_or_else(|| {
                            ReshapeError::format(format!(
                                "value column '{}' has no value variable label column",
                                column.name
                            ))
                        })?;
                    let unit = roles.first_with_role(ColumnRole::ValueUnit);
                    let quality = roles
                        .with_role(ColumnRole::ValueQuality)
                        .find(|q| q.measure.is_none());
                    sources.long = Some(LongSource {
                        value: column.index,
                        label: label.index,
                        unit: unit.map(|c| c.index),
                        quality: quality.map(|c| c.index),
                    });
                }
            }
        }

        Ok(sources)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.long.is_none() && self.structural.is_empty()
    }

    pub(crate) fn has_quality(&self) -> bool {
        self.long.is_some_and(|l| l.quality.is_some())
            || self.structural.iter().any(|s| s.quality.is_some())
    }

    fn observations<'a>(&'a self, row: &'a [String]) -> impl Iterator<Item = (String, Cell)> + 'a {
        let long = self.long.iter().map(move |src| {
            let label = row[src.label].as_str();
            let unit = src.unit.map(|u| row[u].as_str()).unwrap_or("");
            let cell = Cell {
                value: row[src.value].clone(),
                quality: src.quality.map(|q| row[q].clone()),
            };
            (format!("{label}__{unit}"), cell)
        });
        let structural = self.structural.iter().map(move |src| {
            let cell = Cell {
                value: row[src.value].clone(),
                quality: src.quality.map(|q| row[q].clone()),
            };
            (src.column.clone(), cell)
        });
        long.chain(structural)
    }
}

/// Result of [`pivot`]: one representative row per group plus the value columns.
#[derive(Debug, Clone)]
pub(crate) struct Pivot {
    /// Index of the first raw row of every group, in first-seen order.
    pub groups: Vec<usize>,
    /// Output column name → one cell per group. Ordered by name.
    pub columns: BTreeMap<String, Vec<Option<Cell>>>,
}

impl Pivot {
    pub(crate) fn cell(&self, column: &str, group: usize) -> Option<&Cell> {
        self.columns
            .get(column)
            .and_then(|cells| cells.get(group))
            .and_then(Option::as_ref)
    }
}

/// Group `table` by `key_columns` and spread every observation into its column.
///
/// Two observations for the same group and column are a [`ReshapeError::PivotConflict`].
pub(crate) fn pivot(
    table: &RawTable,
    key_columns: &[usize],
    sources: &ValueSources,
) -> ReshapeResult<Pivot> {
    let mut index: HashMap<Vec<&str>, usize> = HashMap::new();
    let mut groups: Vec<usize> = Vec::new();
    let mut columns: BTreeMap<String, Vec<Option<Cell>>> = BTreeMap::new();

    for (row_idx, row) in table.rows.iter().enumerate() {
        let key: Vec<&str> = key_columns.iter().map(|&c| row[c].as_str()).collect();
        let group = match index.get(&key) {
            Some(&g) => g,
            None => {
                let g = groups.len();
                groups.push(row_idx);
                index.insert(key.clone(), g);
                g
            }
        };

        for (column, cell) in sources.observations(row) {
            let cells = columns.entry(column.clone()).or_default();
            if cells.len() <= group {
                cells.resize(group + 1, None);
            }
            if cells[group].is_some() {
                return Err(ReshapeError::PivotConflict {
                    group: key.join(", "),
                    column,
                });
            }
            cells[group] = Some(cell);
        }
    }

    for cells in columns.values_mut() {
        cells.resize(groups.len(), None);
    }
    Ok(Pivot { groups, columns })
}
