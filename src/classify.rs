//! Column classification.
//!
//! Header names are matched against the dialect's [`NamingDictionary`](crate::dialect::NamingDictionary):
//! exact names first, then per-variable patterns (`<N>_variable_label`, `<N>_Merkmal_Label`, …),
//! then the structural `{code}__{label}__{unit}` value columns. Region detection needs the data:
//! a classifying variable is a region when its code column holds a known AGS/ARS variable code.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::dialect::{Dialect, NamingDictionary};
use crate::error::{ReshapeError, ReshapeResult};
use crate::types::{ColumnRole, RawTable};

/// Label and unit of a structural `{code}__{label}__{unit}` value column.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Measure {
    pub label: String,
    pub unit: String,
}

impl Measure {
    /// Output column name: `{label}__{unit}`.
    pub fn column_name(&self) -> String {
        format!("{}__{}", self.label, self.unit)
    }
}

/// Classification of one raw column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedColumn {
    /// Position in the raw header.
    pub index: usize,
    /// Raw header name.
    pub name: String,
    /// Assigned role; `None` for auxiliary columns.
    pub role: Option<ColumnRole>,
    /// Classifying-variable number for `<N>_…` columns.
    pub variable: Option<u32>,
    /// Label/unit of structural value and quality columns.
    pub measure: Option<Measure>,
}

/// Per-column roles of a raw table, in header order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRoles {
    columns: Vec<ClassifiedColumn>,
    region: Option<u32>,
}

impl ColumnRoles {
    /// All columns in header order.
    pub fn columns(&self) -> &[ClassifiedColumn] {
        &self.columns
    }

    /// Role of the first column named `name`.
    pub fn role_of(&self, name: &str) -> Option<ColumnRole> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.role)
    }

    /// Columns with the given role, in header order.
    pub fn with_role(&self, role: ColumnRole) -> impl Iterator<Item = &ClassifiedColumn> {
        self.columns.iter().filter(move |c| c.role == Some(role))
    }

    /// First column with the given role.
    pub fn first_with_role(&self, role: ColumnRole) -> Option<&ClassifiedColumn> {
        self.with_role(role).next()
    }

    /// Column of classifying variable `variable` with the given role.
    pub fn variable_column(&self, variable: u32, role: ColumnRole) -> Option<&ClassifiedColumn> {
        self.with_role(role).find(|c| c.variable == Some(variable))
    }

    /// Classifying variable promoted to the region column, if any.
    pub fn region_variable(&self) -> Option<u32> {
        self.region
    }

    /// Header name → role view. Auxiliary columns are omitted.
    pub fn to_map(&self) -> BTreeMap<String, ColumnRole> {
        self.columns
            .iter()
            .filter_map(|c| c.role.map(|r| (c.name.clone(), r)))
            .collect()
    }
}

/// Assign a role to every header according to the dialect's naming rules.
///
/// Fails with [`ReshapeError::Ambiguity`] if two rules disagree about one header.
pub fn classify<S: AsRef<str>>(headers: &[S], dialect: &Dialect) -> ReshapeResult<ColumnRoles> {
    let naming = dialect.profile().naming;
    let columns = headers
        .iter()
        .enumerate()
        .map(|(index, header)| classify_header(index, header.as_ref(), naming))
        .collect::<ReshapeResult<Vec<_>>>()?;

    Ok(ColumnRoles {
        columns,
        region: None,
    })
}

fn classify_header(
    index: usize,
    name: &str,
    naming: &NamingDictionary,
) -> ReshapeResult<ClassifiedColumn> {
    let mut candidates: Vec<(ColumnRole, Option<u32>, Option<Measure>)> = Vec::new();

    for (exact, role) in &naming.exact {
        if *exact == name {
            candidates.push((*role, None, None));
        }
    }
    for (pattern, role) in &naming.variable_patterns {
        if let Some(caps) = pattern.captures(name) {
            let variable = caps.get(1).and_then(|m| m.as_str().parse::<u32>().ok());
            candidates.push((*role, variable, None));
        }
    }
    if let Some(structural) = structural_role(name) {
        candidates.push(structural);
    }

    if let Some((first, _, _)) = candidates.first() {
        if let Some((second, _, _)) = candidates.iter().find(|(r, _, _)| r != first) {
            return Err(ReshapeError::Ambiguity {
                header: name.to_string(),
                first: *first,
                second: *second,
            });
        }
    }

    let (role, variable, measure) = match candidates.into_iter().next() {
        Some((role, variable, measure)) => (Some(role), variable, measure),
        None => {
            if !naming.auxiliary.iter().any(|a| *a == name) {
                warn!(header = name, "unknown column treated as auxiliary");
            }
            (None, None, None)
        }
    };

    Ok(ClassifiedColumn {
        index,
        name: name.to_string(),
        role,
        variable,
        measure,
    })
}

/// `{code}__{label}__{unit}` is a value column, `{code}__{label}__{unit}__q` its quality column.
fn structural_role(name: &str) -> Option<(ColumnRole, Option<u32>, Option<Measure>)> {
    let parts: Vec<&str> = name.split("__").collect();
    let role = match parts.as_slice() {
        [_, _, _] => ColumnRole::Value,
        [_, _, _, "q"] => ColumnRole::ValueQuality,
        _ => return None,
    };
    if parts[..3].iter().any(|p| p.is_empty()) {
        return None;
    }
    let measure = Measure {
        label: parts[1].to_string(),
        unit: parts[2].to_string(),
    };
    Some((role, None, Some(measure)))
}

/// Promote the first classifying variable whose codes are region keys to the region role.
///
/// The dialect's leading summary rows (whole-country totals) are skipped while scanning. The
/// promoted variable's attribute code/label columns become [`ColumnRole::RegionCode`] and
/// [`ColumnRole::RegionLabel`]. Finding no region variable is not an error.
pub fn detect_region(roles: &ColumnRoles, table: &RawTable, dialect: &Dialect) -> ColumnRoles {
    let profile = dialect.profile();
    let start = if table.row_count() > profile.summary_rows {
        profile.summary_rows
    } else {
        0
    };

    for code_column in roles.with_role(ColumnRole::ClassifierCode) {
        let Some(variable) = code_column.variable else {
            continue;
        };
        let is_region = table.rows[start..]
            .iter()
            .filter_map(|row| row.get(code_column.index))
            .map(|code| code.trim())
            .filter(|code| !code.is_empty())
            .any(|code| profile.is_region_code(code));
        if !is_region {
            continue;
        }

        let has_code = roles
            .variable_column(variable, ColumnRole::ClassifierAttributeCode)
            .is_some();
        let has_label = roles
            .variable_column(variable, ColumnRole::ClassifierAttributeLabel)
            .is_some();
        if !(has_code && has_label) {
            continue;
        }

        debug!(variable, column = %code_column.name, "detected region variable");
        let columns = roles
            .columns
            .iter()
            .cloned()
            .map(|mut c| {
                if c.variable == Some(variable) {
                    c.role = match c.role {
                        Some(ColumnRole::ClassifierAttributeCode) => Some(ColumnRole::RegionCode),
                        Some(ColumnRole::ClassifierAttributeLabel) => Some(ColumnRole::RegionLabel),
                        other => other,
                    };
                }
                c
            })
            .collect();
        return ColumnRoles {
            columns,
            region: Some(variable),
        };
    }

    roles.clone()
}

/// [`classify`] the table's headers, then [`detect_region`] on its rows.
pub fn classify_table(table: &RawTable, dialect: &Dialect) -> ReshapeResult<ColumnRoles> {
    let roles = classify(&table.headers, dialect)?;
    Ok(detect_region(&roles, table, dialect))
}
