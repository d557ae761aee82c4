//! Wire-format parsing.
//!
//! - [`records`]: flat-file (`ffcsv`) exports → [`crate::types::RawTable`]
//! - [`cube`]: multi-block cube files → named [`crate::types::RawTable`] blocks

pub mod cube;
pub mod records;

use std::collections::HashMap;

pub use cube::{parse_blocks, rename_axes, CubeBlocks, CubeFile};
pub use records::{parse_records, DELIMITER};

/// Make names unique by suffixing every occurrence of a repeated name with `-{n}` (1-based, in
/// occurrence order). Names that occur once are left untouched.
pub(crate) fn dedupe_names(names: Vec<String>) -> Vec<String> {
    let mut totals: HashMap<&str, usize> = HashMap::new();
    for name in &names {
        *totals.entry(name.as_str()).or_default() += 1;
    }

    let mut seen: HashMap<&str, usize> = HashMap::new();
    let renamed: Vec<String> = names
        .iter()
        .map(|name| {
            if totals[name.as_str()] == 1 {
                return name.clone();
            }
            let n = seen.entry(name.as_str()).or_default();
            *n += 1;
            format!("{name}-{n}")
        })
        .collect();
    renamed
}
