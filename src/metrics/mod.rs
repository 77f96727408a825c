// src/metrics/mod.rs

pub mod classify;

use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt};
use tracing::debug;

use crate::{
    schema::CanonicalField,
    table::{CanonicalRecord, UnifiedTable},
};

pub use classify::{classify, ClassificationRule, Grade};

/// Guarded division: `numerator / denominator * scale` when `denominator > 0`,
/// otherwise 0. Any non-finite result is also surfaced as 0.
pub fn safe_ratio(numerator: f64, denominator: f64, scale: f64) -> f64 {
    if denominator.is_nan() || denominator <= 0.0 {
        return 0.0;
    }
    let ratio = numerator / denominator * scale;
    if ratio.is_finite() {
        ratio
    } else {
        0.0
    }
}

/// Derived marketing-efficiency ratios.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    /// revenue / spend, percent
    Roas,
    /// orders / clicks, percent
    Cvr,
    /// clicks / impressions, percent
    Ctr,
    /// spend / clicks
    Cpc,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Roas, Metric::Cvr, Metric::Ctr, Metric::Cpc];

    pub fn name(self) -> &'static str {
        match self {
            Metric::Roas => "roas",
            Metric::Cvr => "cvr",
            Metric::Ctr => "ctr",
            Metric::Cpc => "cpc",
        }
    }

    /// (numerator, denominator) fields.
    pub fn inputs(self) -> (CanonicalField, CanonicalField) {
        match self {
            Metric::Roas => (CanonicalField::Revenue, CanonicalField::Spend),
            Metric::Cvr => (CanonicalField::Orders, CanonicalField::Clicks),
            Metric::Ctr => (CanonicalField::Clicks, CanonicalField::Impressions),
            Metric::Cpc => (CanonicalField::Spend, CanonicalField::Clicks),
        }
    }

    pub fn scale(self) -> f64 {
        match self {
            Metric::Cpc => 1.0,
            _ => 100.0,
        }
    }

    pub fn is_percent(self) -> bool {
        self != Metric::Cpc
    }

    /// Compute this metric from a record's inputs. Never mutates the record.
    pub fn compute(self, record: &CanonicalRecord) -> f64 {
        let (num, den) = self.inputs();
        safe_ratio(record.numeric(num), record.numeric(den), self.scale())
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Metrics whose two inputs are both present in `fields`.
pub fn computable_metrics(fields: &BTreeSet<CanonicalField>) -> BTreeSet<Metric> {
    Metric::ALL
        .into_iter()
        .filter(|m| {
            let (num, den) = m.inputs();
            fields.contains(&num) && fields.contains(&den)
        })
        .collect()
}

/// Append the derived ratio columns to every row of `table`.
///
/// A metric whose inputs are absent from every source is not computed.
pub fn derive_metrics(table: &mut UnifiedTable) {
    let metrics = computable_metrics(table.fields());
    for record in table.records_mut() {
        for &metric in &metrics {
            let value = metric.compute(record);
            record.set_metric(metric, Some(value));
        }
    }
    debug!(metrics = ?metrics, rows = table.len(), "derived metrics");
    table.set_metrics(metrics);
}
