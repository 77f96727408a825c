use std::collections::HashSet;
use tracing::{debug, trace};

use crate::{
    error::SourceError,
    process::{utils::is_anonymous_header, RawTable},
    schema::{CanonicalField, ColumnAliasMap},
};

/// Drop placeholder columns that carry no meaningful header.
pub fn strip_anonymous(table: RawTable) -> RawTable {
    let keep: Vec<usize> = table
        .headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !is_anonymous_header(h))
        .map(|(i, _)| i)
        .collect();
    if keep.len() == table.width() {
        return table;
    }
    trace!(dropped = table.width() - keep.len(), "stripped anonymous columns");
    table.select(&keep)
}

/// Keep only the first physical column for each header name.
pub fn dedup_columns(table: RawTable) -> RawTable {
    let keep: Vec<usize> = {
        let mut seen: HashSet<&str> = HashSet::with_capacity(table.width());
        table
            .headers
            .iter()
            .enumerate()
            .filter(|(_, h)| seen.insert(h.as_str()))
            .map(|(i, _)| i)
            .collect()
    };
    if keep.len() == table.width() {
        return table;
    }
    trace!(dropped = table.width() - keep.len(), "dropped duplicate columns");
    table.select(&keep)
}

/// Rename every header the alias map recognizes to its canonical name.
pub fn apply_aliases(mut table: RawTable, aliases: &ColumnAliasMap) -> RawTable {
    for header in table.headers.iter_mut() {
        let renamed = aliases.rename(header);
        if renamed != header.as_str() {
            *header = renamed.to_string();
        }
    }
    table
}

/// Normalize one source's schema.
///
/// Order matters: strip anonymous → dedup → alias → dedup again, since two
/// different source headers may alias to the same canonical field.
pub fn normalize(
    source_name: &str,
    table: RawTable,
    aliases: &ColumnAliasMap,
) -> Result<RawTable, SourceError> {
    let table = strip_anonymous(table);
    let table = dedup_columns(table);
    let table = apply_aliases(table, aliases);
    let table = dedup_columns(table);

    if !table.has_column(CanonicalField::Date.name()) {
        return Err(SourceError::MissingRequiredField {
            source_name: source_name.to_string(),
            field: CanonicalField::Date,
            columns: table.headers,
        });
    }

    debug!(source = source_name, columns = ?table.headers, rows = table.len(), "normalized");
    Ok(table)
}
