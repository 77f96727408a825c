use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use crate::{
    process::{date_parser::parse_date, utils::strip_numeric_noise, RawTable},
    schema::{CanonicalField, FieldKind},
    table::CanonicalRecord,
};

/// Outcome of a best-effort numeric parse.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Parsed<T> {
    Value(T),
    /// Empty cell; zero-filled without complaint.
    Blank,
    /// Non-empty but unusable; zero-filled and counted.
    Invalid,
}

/// Non-negative float after stripping grouping commas and currency noise.
pub fn parse_amount(raw: &str) -> Parsed<f64> {
    if raw.trim().is_empty() {
        return Parsed::Blank;
    }
    match strip_numeric_noise(raw).parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Parsed::Value(v.abs()),
        _ => Parsed::Invalid,
    }
}

/// Non-negative integer; fractional input is truncated toward zero.
/// Values beyond `u64` range are invalid rather than clamped.
pub fn parse_count(raw: &str) -> Parsed<u64> {
    match parse_amount(raw) {
        Parsed::Value(v) if v >= u64::MAX as f64 => Parsed::Invalid,
        Parsed::Value(v) => Parsed::Value(v.trunc() as u64),
        Parsed::Blank => Parsed::Blank,
        Parsed::Invalid => Parsed::Invalid,
    }
}

/// How many cells the cleaner had to zero-fill or null out.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoercionReport {
    coerced: BTreeMap<CanonicalField, usize>,
    blank_numeric_cells: usize,
    unparsed_dates: usize,
}

impl CoercionReport {
    /// Non-blank cells of `field` that failed to parse and became 0.
    pub fn coerced(&self, field: CanonicalField) -> usize {
        self.coerced.get(&field).copied().unwrap_or(0)
    }

    pub fn total_coerced(&self) -> usize {
        self.coerced.values().sum()
    }

    pub fn blank_numeric_cells(&self) -> usize {
        self.blank_numeric_cells
    }

    /// Non-blank dates the tolerant parser could not read.
    pub fn unparsed_dates(&self) -> usize {
        self.unparsed_dates
    }

    pub fn is_clean(&self) -> bool {
        self.total_coerced() == 0 && self.unparsed_dates == 0
    }

    fn settle<T: Default>(&mut self, field: CanonicalField, parsed: Parsed<T>) -> T {
        match parsed {
            Parsed::Value(v) => v,
            Parsed::Blank => {
                self.blank_numeric_cells += 1;
                T::default()
            }
            Parsed::Invalid => {
                *self.coerced.entry(field).or_default() += 1;
                T::default()
            }
        }
    }
}

/// A source after value cleaning: canonical columns only.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CleanedSource {
    /// Canonical fields the source actually carried.
    pub fields: BTreeSet<CanonicalField>,
    pub records: Vec<CanonicalRecord>,
}

/// Coerce a normalized table into canonical records. Never fails: bad numbers
/// become 0 and bad dates become null, both tallied in `report`.
pub fn clean(table: &RawTable, report: &mut CoercionReport) -> CleanedSource {
    let columns: Vec<(CanonicalField, usize)> = CanonicalField::ALL
        .into_iter()
        .filter_map(|f| table.column_index(f.name()).map(|i| (f, i)))
        .collect();
    let before = report.clone();

    let mut records = Vec::with_capacity(table.len());
    for row in &table.rows {
        let mut record = CanonicalRecord::default();
        for &(field, idx) in &columns {
            let cell = row[idx].as_str();
            match field.kind() {
                FieldKind::Date => {
                    record.date = parse_date(cell);
                    if record.date.is_none() && !cell.trim().is_empty() {
                        report.unparsed_dates += 1;
                    }
                }
                FieldKind::Text => {
                    let text = cell.trim();
                    record.set_text(field, (!text.is_empty()).then(|| text.to_string()));
                }
                FieldKind::Amount => {
                    let v = report.settle(field, parse_amount(cell));
                    record.set_amount(field, v);
                }
                FieldKind::Count => {
                    let v = report.settle(field, parse_count(cell));
                    record.set_count(field, v);
                }
            }
        }
        records.push(record);
    }

    let coerced = report.total_coerced() - before.total_coerced();
    let unparsed = report.unparsed_dates - before.unparsed_dates;
    if coerced > 0 || unparsed > 0 {
        warn!(coerced, unparsed_dates = unparsed, "zero-filled unparseable cells");
    }
    debug!(rows = records.len(), fields = columns.len(), "cleaned");

    CleanedSource {
        fields: columns.into_iter().map(|(f, _)| f).collect(),
        records,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn table(headers: &[&str], rows: &[&[&str]]) -> RawTable {
        RawTable::new(
            headers.iter().map(|s| s.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        )
    }

    #[test]
    fn amounts_strip_grouping_and_currency() {
        assert_eq!(parse_amount("1,000"), Parsed::Value(1000.0));
        assert_eq!(parse_amount(" 12,345.5 "), Parsed::Value(12345.5));
        assert_eq!(parse_amount("₩5,000원"), Parsed::Value(5000.0));
        assert_eq!(parse_amount(""), Parsed::Blank);
        assert_eq!(parse_amount("n/a"), Parsed::Invalid);
        assert_eq!(parse_amount("-5"), Parsed::Invalid);
        assert_eq!(parse_amount("inf"), Parsed::Invalid);
        assert_eq!(parse_amount("NaN"), Parsed::Invalid);
        assert_eq!(parse_amount("-0"), Parsed::Value(0.0));
    }

    #[test]
    fn counts_truncate() {
        assert_eq!(parse_count("1,234"), Parsed::Value(1234));
        assert_eq!(parse_count("7.9"), Parsed::Value(7));
        assert_eq!(parse_count("x"), Parsed::Invalid);
        assert_eq!(parse_count("3e19"), Parsed::Invalid);
        assert_eq!(parse_count("1e18"), Parsed::Value(1_000_000_000_000_000_000));
    }

    #[test]
    fn out_of_range_counts_are_reported() {
        let t = table(
            &["date", "clicks"],
            &[&["2024-01-01", "3e19"], &["2024-01-02", "3e19"]],
        );
        let mut report = CoercionReport::default();
        let out = clean(&t, &mut report);
        assert!(out.records.iter().all(|r| r.clicks == 0));
        assert_eq!(report.coerced(CanonicalField::Clicks), 2);
    }

    #[test]
    fn cleans_rows_and_tallies_coercions() {
        let t = table(
            &["date", "campaign_name", "spend", "clicks", "memo"],
            &[
                &["2024-01-01", "A", "1,000", "10", "ignored"],
                &["not a date", "", "oops", "", ""],
                &["", "B", "", "3.0", ""],
            ],
        );
        let mut report = CoercionReport::default();
        let out = clean(&t, &mut report);

        assert_eq!(
            out.fields.iter().copied().collect::<Vec<_>>(),
            vec![
                CanonicalField::Date,
                CanonicalField::CampaignName,
                CanonicalField::Spend,
                CanonicalField::Clicks
            ]
        );
        assert_eq!(out.records.len(), 3);

        let r0 = &out.records[0];
        assert_eq!(r0.date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(r0.campaign_name.as_deref(), Some("A"));
        assert_eq!(r0.spend, 1000.0);
        assert_eq!(r0.clicks, 10);

        let r1 = &out.records[1];
        assert_eq!(r1.date, None);
        assert_eq!(r1.campaign_name, None);
        assert_eq!(r1.spend, 0.0);

        assert_eq!(out.records[2].clicks, 3);

        assert_eq!(report.coerced(CanonicalField::Spend), 1);
        assert_eq!(report.coerced(CanonicalField::Clicks), 0);
        assert_eq!(report.total_coerced(), 1);
        assert_eq!(report.unparsed_dates(), 1);
        assert_eq!(report.blank_numeric_cells(), 2);
        assert!(!report.is_clean());
    }

    #[test]
    fn absent_fields_are_not_fabricated() {
        let t = table(&["date"], &[&["2024-01-01"]]);
        let mut report = CoercionReport::default();
        let out = clean(&t, &mut report);
        assert_eq!(out.fields.len(), 1);
        assert_eq!(out.records[0].spend, 0.0);
        assert!(report.is_clean());
    }
}
