//! Flat-file record parsing.

use tracing::{debug, trace};

use crate::error::{ReshapeError, ReshapeResult};
use crate::types::RawTable;

/// Field delimiter used by every supported export.
pub const DELIMITER: u8 = b';';

const BOM: char = '\u{feff}';

/// Parse a delimited flat-file export into a [`RawTable`].
///
/// Rules:
///
/// - A leading byte-order mark is stripped.
/// - The first record is the header.
/// - A data record is dropped if its first field does not start with an ASCII digit
///   (footnotes, "Stand:" lines and separators mixed into the export).
/// - A record with fewer fields than the header is dropped as well (numbered footnotes such as
///   `1) vorläufige Ergebnisse`).
/// - A record with more fields than the header is a format error.
pub fn parse_records(raw_text: &str, delimiter: u8) -> ReshapeResult<RawTable> {
    let text = raw_text.strip_prefix(BOM).unwrap_or(raw_text);
    if text.trim().is_empty() {
        return Err(ReshapeError::format("raw text is empty"));
    }

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut records = rdr.records();
    let header = match records.next() {
        Some(result) => result?,
        None => return Err(ReshapeError::format("raw text has no header line")),
    };
    if header.iter().all(|h| h.trim().is_empty()) {
        return Err(ReshapeError::format("header line is empty"));
    }
    let headers: Vec<String> = header.iter().map(str::to_owned).collect();

    let mut rows = Vec::new();
    let mut discarded = 0usize;
    for result in records {
        let record = result?;
        if !is_numeric_leading(record.get(0).unwrap_or("")) {
            discarded += 1;
            continue;
        }
        if record.len() < headers.len() {
            trace!(
                line = record.position().map(|p| p.line()).unwrap_or(0),
                fields = record.len(),
                "dropped short record"
            );
            discarded += 1;
            continue;
        }
        if record.len() > headers.len() {
            // Line numbers are 1-based, header included.
            let line = record.position().map(|p| p.line()).unwrap_or(0);
            return Err(ReshapeError::format(format!(
                "line {line} has {} fields, header has {}",
                record.len(),
                headers.len()
            )));
        }
        rows.push(record.iter().map(str::to_owned).collect());
    }

    debug!(
        columns = headers.len(),
        rows = rows.len(),
        discarded,
        "parsed flat-file records"
    );

    let mut table = RawTable::new(headers, rows)?;
    table.discarded = discarded;
    Ok(table)
}

fn is_numeric_leading(field: &str) -> bool {
    field.chars().next().is_some_and(|c| c.is_ascii_digit())
}
