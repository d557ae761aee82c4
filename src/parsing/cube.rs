//! Cube file parsing.
//!
//! A cube file is a single text stream holding several blocks. Each block starts with a header
//! line `K;<TAG>;<col>;<col>;…` followed by data lines `D;<cell>;<cell>;…`. Typical tags are
//! `DQ` (cube), `DQ-ERH` (statistic), `DQA` (classifying variables), `DQZ` (time variable),
//! `DQI` (value variables) and `QEI` (the data itself).
//!
//! The final block is never followed by another header line, and its header only lists one
//! generic pair of value columns even though the data carries one pair per value variable. The
//! pair is expanded from the names in the `DQI` block, which the service always emits earlier.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::dedupe_names;
use crate::coerce::ValueKind;
use crate::error::{ReshapeError, ReshapeResult};
use crate::types::{ColumnKind, Field, RawTable, Schema, Value, WideTable};

const HEADER_MARKER: &str = "K;";
const BOILERPLATE: [&str; 2] = ["\"nur Werte\"", "\"mit Werten\""];

/// Blocks of a cube file, keyed by tag, in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CubeBlocks {
    blocks: Vec<(String, RawTable)>,
}

impl CubeBlocks {
    /// Block with the given tag.
    pub fn get(&self, tag: &str) -> Option<&RawTable> {
        self.blocks.iter().find(|(t, _)| t == tag).map(|(_, b)| b)
    }

    /// Tags in stream order.
    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|(t, _)| t.as_str())
    }

    /// Number of blocks.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    /// `true` if no block was parsed.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Iterate `(tag, block)` pairs in stream order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RawTable)> {
        self.blocks.iter().map(|(t, b)| (t.as_str(), b))
    }

    /// Insert a block; a repeated tag replaces the earlier block in place.
    fn insert(&mut self, tag: String, block: RawTable) {
        match self.blocks.iter_mut().find(|(t, _)| *t == tag) {
            Some(slot) => slot.1 = block,
            None => self.blocks.push((tag, block)),
        }
    }

    fn require(&self, tag: &str) -> ReshapeResult<&RawTable> {
        self.get(tag)
            .ok_or_else(|| ReshapeError::invariant(format!("cube has no '{tag}' block")))
    }
}

/// Split a cube file into its named blocks.
///
/// Lines before the first header line are ignored. Duplicate column names inside one header are
/// suffixed with `-{n}`. The final block's header is expanded per `DQI` value variable.
pub fn parse_blocks(raw_text: &str) -> ReshapeResult<CubeBlocks> {
    let text = raw_text.strip_prefix('\u{feff}').unwrap_or(raw_text);

    let mut blocks = CubeBlocks::default();
    let mut current: Option<(String, Vec<String>)> = None;
    let mut data: Vec<Vec<String>> = Vec::new();

    for line in text.lines() {
        if line.starts_with(HEADER_MARKER) {
            if let Some((tag, header)) = current.take() {
                trace!(tag = %tag, rows = data.len(), "cube block complete");
                let block = RawTable::new(header, std::mem::take(&mut data))
                    .map_err(|e| block_error(&tag, e))?;
                blocks.insert(tag, block);
            }
            current = Some(parse_header_line(line));
            continue;
        }
        if current.is_none() || line.trim().is_empty() {
            continue;
        }
        data.push(line.split(';').skip(1).map(str::to_owned).collect());
    }

    let (tag, header) =
        current.ok_or_else(|| ReshapeError::format("cube text contains no block header"))?;
    let header = expand_trailing_header(header, blocks.require("DQI")?)?;
    trace!(tag = %tag, rows = data.len(), columns = header.len(), "trailing cube block complete");
    let block = RawTable::new(header, data).map_err(|e| block_error(&tag, e))?;
    blocks.insert(tag, block);

    debug!(blocks = blocks.len(), "parsed cube file");
    Ok(blocks)
}

fn parse_header_line(line: &str) -> (String, Vec<String>) {
    let mut fields = line.split(';').skip(1);
    let tag = fields.next().unwrap_or_default().to_string();
    let names = fields
        .filter(|name| !BOILERPLATE.iter().any(|b| b == name))
        .map(str::to_owned)
        .collect();
    (tag, dedupe_names(names))
}

/// Replace the last two generic columns by one pair per distinct `DQI` variable name.
fn expand_trailing_header(mut header: Vec<String>, dqi: &RawTable) -> ReshapeResult<Vec<String>> {
    if header.len() < 2 {
        return Err(ReshapeError::invariant(
            "trailing cube header has fewer than two columns",
        ));
    }
    let name_idx = dqi
        .index_of("NAME")
        .ok_or_else(|| ReshapeError::invariant("'DQI' block has no NAME column"))?;

    let generic = header.split_off(header.len() - 2);
    let mut variables: Vec<&str> = Vec::new();
    for name in dqi.column(name_idx) {
        if !variables.contains(&name) {
            variables.push(name);
        }
    }
    for var in variables {
        header.extend(generic.iter().map(|col| format!("{var}_{col}")));
    }
    Ok(header)
}

fn block_error(tag: &str, err: ReshapeError) -> ReshapeError {
    match err {
        ReshapeError::Format { message } => {
            ReshapeError::format(format!("cube block '{tag}': {message}"))
        }
        other => other,
    }
}

/// Rename the generic axes of the `QEI` block.
///
/// Columns starting with `FACH-SCHL` take the `DQA` variable names (in order), `ZI-WERT` takes the
/// `DQZ` time variable name.
pub fn rename_axes(blocks: &CubeBlocks) -> ReshapeResult<CubeBlocks> {
    let qei = blocks.require("QEI")?;
    let classifiers = names_of(blocks.require("DQA")?, "DQA")?;
    let time = names_of(blocks.require("DQZ")?, "DQZ")?;

    let mut classifiers = classifiers.into_iter();
    let headers = qei
        .headers
        .iter()
        .map(|h| {
            if h.starts_with("FACH-SCHL") {
                classifiers.next().unwrap_or_else(|| h.clone())
            } else if h == "ZI-WERT" {
                time.first().cloned().unwrap_or_else(|| h.clone())
            } else {
                h.clone()
            }
        })
        .collect();

    let mut out = blocks.clone();
    out.insert("QEI".to_string(), RawTable::new(headers, qei.rows.clone())?);
    Ok(out)
}

fn names_of(block: &RawTable, tag: &str) -> ReshapeResult<Vec<String>> {
    let idx = block
        .index_of("NAME")
        .ok_or_else(|| ReshapeError::invariant(format!("'{tag}' block has no NAME column")))?;
    Ok(block.column(idx).map(str::to_owned).collect())
}

/// A parsed cube with renamed axes and value type declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct CubeFile {
    /// All blocks; `QEI` carries renamed axes.
    pub blocks: CubeBlocks,
    /// Declared type per `{var}_WERT` column (from `DQI.DST`).
    pub value_types: BTreeMap<String, ValueKind>,
    classifiers: Vec<String>,
    time: Option<String>,
}

impl CubeFile {
    /// Parse blocks, rename the `QEI` axes and read value types.
    pub fn parse(raw_text: &str) -> ReshapeResult<Self> {
        let blocks = rename_axes(&parse_blocks(raw_text)?)?;
        let classifiers = names_of(blocks.require("DQA")?, "DQA")?;
        let time = names_of(blocks.require("DQZ")?, "DQZ")?.into_iter().next();

        let dqi = blocks.require("DQI")?;
        let name_idx = dqi
            .index_of("NAME")
            .ok_or_else(|| ReshapeError::invariant("'DQI' block has no NAME column"))?;
        let mut value_types = BTreeMap::new();
        if let Some(dst_idx) = dqi.index_of("DST") {
            for row in &dqi.rows {
                let kind = match row[dst_idx].as_str() {
                    "GANZ" => ValueKind::Integer,
                    "FEST" => ValueKind::Decimal,
                    _ => continue,
                };
                value_types.insert(format!("{}_WERT", row[name_idx]), kind);
            }
        }

        Ok(Self {
            blocks,
            value_types,
            classifiers,
            time,
        })
    }

    /// The `QEI` data block.
    pub fn data(&self) -> ReshapeResult<&RawTable> {
        self.blocks.require("QEI")
    }

    /// Project the `QEI` block into an untyped [`WideTable`] ready for coercion.
    pub fn data_table(&self) -> ReshapeResult<WideTable> {
        let qei = self.data()?;
        let fields = qei
            .headers
            .iter()
            .map(|h| Field::utf8(h.clone(), self.kind_of(h)))
            .collect();
        let rows = qei
            .rows
            .iter()
            .map(|row| row.iter().map(|c| Value::Utf8(c.clone())).collect())
            .collect();
        WideTable::new(Schema::new(fields), rows)
    }

    fn kind_of(&self, header: &str) -> ColumnKind {
        if self.time.as_deref() == Some(header) {
            ColumnKind::Time
        } else if self.classifiers.iter().any(|c| c == header) {
            ColumnKind::Attribute
        } else if header.ends_with("_WERT") {
            ColumnKind::Value
        } else if header.ends_with("_QUALITAET") {
            ColumnKind::Quality
        } else {
            ColumnKind::Auxiliary
        }
    }
}
