use anyhow::{bail, Context, Result};
use csv::ReaderBuilder;
use tracing::trace;

use crate::process::{utils::clean_str, RawTable};

/// Parse a CSV export into a [`RawTable`].
///
/// The first record is the header row. Records may be ragged; rows are padded
/// or truncated to the header width, and rows whose every cell is blank are skipped. Invalid UTF-8 is
/// decoded lossily rather than rejected.
pub fn parse_csv(bytes: &[u8]) -> Result<RawTable> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut records = rdr.byte_records();
    let headers: Vec<String> = match records.next() {
        Some(rec) => rec
            .context("reading CSV header row")?
            .iter()
            .map(|f| clean_str(&String::from_utf8_lossy(f)))
            .collect(),
        None => bail!("empty CSV: no header row"),
    };
    if headers.iter().all(|h| h.is_empty()) {
        bail!("CSV header row is blank");
    }

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for (i, rec) in records.enumerate() {
        let rec = rec.with_context(|| format!("reading CSV record {}", i + 2))?;
        let row: Vec<String> = rec
            .iter()
            .map(|f| clean_str(&String::from_utf8_lossy(f)))
            .collect();
        if row.iter().all(|c| c.is_empty()) {
            skipped += 1;
            continue;
        }
        rows.push(row);
    }
    trace!(columns = headers.len(), rows = rows.len(), skipped, "parsed CSV");
    Ok(RawTable::new(headers, rows))
}
