// src/table/mod.rs

pub mod write;

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, StringArray, UInt64Array},
    record_batch::RecordBatch,
};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    metrics::{safe_ratio, Metric},
    process::clean::CleanedSource,
    schema::{build_arrow_schema, CanonicalField, FieldKind},
};

pub use write::{export_to_path, write_table, ExportFormat};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// One cleaned row of the unified table.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct CanonicalRecord {
    pub date: Option<NaiveDate>,
    pub campaign_name: Option<String>,
    pub keyword: Option<String>,
    pub spend: f64,
    pub revenue: f64,
    pub orders: u64,
    pub clicks: u64,
    pub impressions: u64,
    /// Derived ratios; `None` when the metric was not computed for the table.
    pub roas: Option<f64>,
    pub cvr: Option<f64>,
    pub ctr: Option<f64>,
    pub cpc: Option<f64>,
}

impl CanonicalRecord {
    pub fn text(&self, field: CanonicalField) -> Option<&str> {
        match field {
            CanonicalField::CampaignName => self.campaign_name.as_deref(),
            CanonicalField::Keyword => self.keyword.as_deref(),
            _ => None,
        }
    }

    /// Numeric value of an amount or count field as f64; 0 for other kinds.
    pub fn numeric(&self, field: CanonicalField) -> f64 {
        match field {
            CanonicalField::Spend => self.spend,
            CanonicalField::Revenue => self.revenue,
            CanonicalField::Orders => self.orders as f64,
            CanonicalField::Clicks => self.clicks as f64,
            CanonicalField::Impressions => self.impressions as f64,
            _ => 0.0,
        }
    }

    pub fn count(&self, field: CanonicalField) -> u64 {
        match field {
            CanonicalField::Orders => self.orders,
            CanonicalField::Clicks => self.clicks,
            CanonicalField::Impressions => self.impressions,
            _ => 0,
        }
    }

    pub fn metric(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Roas => self.roas,
            Metric::Cvr => self.cvr,
            Metric::Ctr => self.ctr,
            Metric::Cpc => self.cpc,
        }
    }

    pub(crate) fn set_text(&mut self, field: CanonicalField, value: Option<String>) {
        match field {
            CanonicalField::CampaignName => self.campaign_name = value,
            CanonicalField::Keyword => self.keyword = value,
            _ => {}
        }
    }

    pub(crate) fn set_amount(&mut self, field: CanonicalField, value: f64) {
        match field {
            CanonicalField::Spend => self.spend = value,
            CanonicalField::Revenue => self.revenue = value,
            _ => {}
        }
    }

    pub(crate) fn set_count(&mut self, field: CanonicalField, value: u64) {
        match field {
            CanonicalField::Orders => self.orders = value,
            CanonicalField::Clicks => self.clicks = value,
            CanonicalField::Impressions => self.impressions = value,
            _ => {}
        }
    }

    pub(crate) fn set_metric(&mut self, metric: Metric, value: Option<f64>) {
        match metric {
            Metric::Roas => self.roas = value,
            Metric::Cvr => self.cvr = value,
            Metric::Ctr => self.ctr = value,
            Metric::Cpc => self.cpc = value,
        }
    }
}

/// Rows contributed by one source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRows {
    pub source: String,
    pub rows: usize,
}

/// All surviving sources concatenated in source order, then row order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnifiedTable {
    records: Vec<CanonicalRecord>,
    fields: BTreeSet<CanonicalField>,
    metrics: BTreeSet<Metric>,
    sources: Vec<SourceRows>,
}

impl UnifiedTable {
    /// Concatenate cleaned sources. Rows are never de-duplicated across sources.
    pub fn concat<I>(sources: I) -> Self
    where
        I: IntoIterator<Item = (String, CleanedSource)>,
    {
        let mut table = UnifiedTable::default();
        for (name, cleaned) in sources {
            table.fields.extend(cleaned.fields);
            table.sources.push(SourceRows {
                source: name,
                rows: cleaned.records.len(),
            });
            table.records.extend(cleaned.records);
        }
        table
    }

    pub fn records(&self) -> &[CanonicalRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [CanonicalRecord] {
        &mut self.records
    }

    pub fn fields(&self) -> &BTreeSet<CanonicalField> {
        &self.fields
    }

    pub fn has_field(&self, field: CanonicalField) -> bool {
        self.fields.contains(&field)
    }

    pub fn metrics(&self) -> &BTreeSet<Metric> {
        &self.metrics
    }

    pub(crate) fn set_metrics(&mut self, metrics: BTreeSet<Metric>) {
        self.metrics = metrics;
    }

    /// Rows contributed per source, as merged (before any filtering).
    pub fn sources(&self) -> &[SourceRows] {
        &self.sources
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn with_records(&self, records: Vec<CanonicalRecord>) -> Self {
        UnifiedTable {
            records,
            fields: self.fields.clone(),
            metrics: self.metrics.clone(),
            sources: self.sources.clone(),
        }
    }

    /// Sorted, distinct, non-null campaign names.
    pub fn campaigns(&self) -> Vec<String> {
        self.records
            .iter()
            .filter_map(|r| r.campaign_name.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Rows whose campaign is in `selected`. A table without a campaign
    /// column is returned unfiltered.
    pub fn filter_campaigns(&self, selected: &BTreeSet<String>) -> Self {
        if !self.has_field(CanonicalField::CampaignName) {
            return self.clone();
        }
        let records = self
            .records
            .iter()
            .filter(|r| {
                r.campaign_name
                    .as_ref()
                    .map_or(false, |name| selected.contains(name))
            })
            .cloned()
            .collect();
        self.with_records(records)
    }

    /// Newest first; rows with a null date go last, ties keep their order.
    pub fn sorted_by_date_desc(&self) -> Self {
        let mut records = self.records.clone();
        records.sort_by(|a, b| match (a.date, b.date) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });
        self.with_records(records)
    }

    pub fn summary(&self) -> Summary {
        Summary::of(self.records.iter(), &self.metrics)
    }

    /// One summary per campaign or keyword. Null keys form their own group,
    /// listed first.
    pub fn aggregate_by(&self, key: GroupKey) -> Vec<GroupSummary> {
        let mut groups: BTreeMap<Option<String>, Vec<&CanonicalRecord>> = BTreeMap::new();
        for record in &self.records {
            let k = record.text(key.field()).map(str::to_string);
            groups.entry(k).or_default().push(record);
        }
        groups
            .into_iter()
            .map(|(key, records)| GroupSummary {
                key,
                summary: Summary::of(records.into_iter(), &self.metrics),
            })
            .collect()
    }

    /// Columnar view: present fields in declaration order, then computed metrics.
    pub fn to_record_batch(&self) -> Result<RecordBatch> {
        let schema = build_arrow_schema(&self.fields, &self.metrics);
        let mut columns: Vec<ArrayRef> = Vec::with_capacity(schema.fields().len());

        for &field in &self.fields {
            let column: ArrayRef = match field.kind() {
                FieldKind::Date => Arc::new(Date32Array::from(
                    self.records
                        .iter()
                        .map(|r| r.date.map(days_since_epoch))
                        .collect::<Vec<Option<i32>>>(),
                )),
                FieldKind::Text => Arc::new(StringArray::from(
                    self.records
                        .iter()
                        .map(|r| r.text(field))
                        .collect::<Vec<Option<&str>>>(),
                )),
                FieldKind::Amount => Arc::new(Float64Array::from(
                    self.records
                        .iter()
                        .map(|r| r.numeric(field))
                        .collect::<Vec<f64>>(),
                )),
                FieldKind::Count => Arc::new(UInt64Array::from(
                    self.records
                        .iter()
                        .map(|r| r.count(field))
                        .collect::<Vec<u64>>(),
                )),
            };
            columns.push(column);
        }
        for &metric in &self.metrics {
            columns.push(Arc::new(Float64Array::from(
                self.records
                    .iter()
                    .map(|r| r.metric(metric).unwrap_or(0.0))
                    .collect::<Vec<f64>>(),
            )));
        }

        RecordBatch::try_new(schema, columns).context("building unified record batch")
    }
}

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKey {
    Campaign,
    Keyword,
}

impl GroupKey {
    pub fn field(self) -> CanonicalField {
        match self {
            GroupKey::Campaign => CanonicalField::CampaignName,
            GroupKey::Keyword => CanonicalField::Keyword,
        }
    }
}

/// Headline totals, with ratios recomputed over the totals rather than
/// averaged per row.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Summary {
    pub rows: usize,
    pub spend: f64,
    pub revenue: f64,
    pub orders: u64,
    pub clicks: u64,
    pub impressions: u64,
    pub ratios: BTreeMap<Metric, f64>,
}

impl Summary {
    pub fn of<'a, I>(records: I, metrics: &BTreeSet<Metric>) -> Self
    where
        I: Iterator<Item = &'a CanonicalRecord>,
    {
        let mut totals = CanonicalRecord::default();
        let mut rows = 0;
        for r in records {
            rows += 1;
            totals.spend += r.spend;
            totals.revenue += r.revenue;
            totals.orders = totals.orders.saturating_add(r.orders);
            totals.clicks = totals.clicks.saturating_add(r.clicks);
            totals.impressions = totals.impressions.saturating_add(r.impressions);
        }
        let ratios = metrics
            .iter()
            .map(|&m| {
                let (num, den) = m.inputs();
                (m, safe_ratio(totals.numeric(num), totals.numeric(den), m.scale()))
            })
            .collect();

        Summary {
            rows,
            spend: totals.spend,
            revenue: totals.revenue,
            orders: totals.orders,
            clicks: totals.clicks,
            impressions: totals.impressions,
            ratios,
        }
    }

    pub fn ratio(&self, metric: Metric) -> Option<f64> {
        self.ratios.get(&metric).copied()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub key: Option<String>,
    pub summary: Summary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::derive_metrics;
    use arrow::array::Array;

    fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(y, m, d)
    }

    fn rec(day: Option<NaiveDate>, campaign: Option<&str>, spend: f64, revenue: f64) -> CanonicalRecord {
        CanonicalRecord {
            date: day,
            campaign_name: campaign.map(str::to_string),
            spend,
            revenue,
            ..Default::default()
        }
    }

    fn cleaned(fields: &[CanonicalField], records: Vec<CanonicalRecord>) -> CleanedSource {
        CleanedSource {
            fields: fields.iter().copied().collect(),
            records,
        }
    }

    fn sample() -> UnifiedTable {
        let fields = [
            CanonicalField::Date,
            CanonicalField::CampaignName,
            CanonicalField::Spend,
            CanonicalField::Revenue,
        ];
        let mut table = UnifiedTable::concat(vec![
            (
                "a".to_string(),
                cleaned(
                    &fields,
                    vec![
                        rec(date(2024, 1, 1), Some("B"), 100.0, 300.0),
                        rec(None, Some("A"), 50.0, 0.0),
                    ],
                ),
            ),
            (
                "b".to_string(),
                cleaned(
                    &fields,
                    vec![
                        rec(date(2024, 1, 3), None, 0.0, 0.0),
                        rec(date(2024, 1, 2), Some("A"), 150.0, 700.0),
                    ],
                ),
            ),
        ]);
        derive_metrics(&mut table);
        table
    }

    #[test]
    fn concat_keeps_source_then_row_order() {
        let t = sample();
        assert_eq!(t.len(), 4);
        assert_eq!(
            t.sources(),
            &[
                SourceRows { source: "a".into(), rows: 2 },
                SourceRows { source: "b".into(), rows: 2 },
            ]
        );
        let spends: Vec<f64> = t.records().iter().map(|r| r.spend).collect();
        assert_eq!(spends, vec![100.0, 50.0, 0.0, 150.0]);
    }

    #[test]
    fn campaigns_are_sorted_distinct_and_non_null() {
        assert_eq!(sample().campaigns(), vec!["A", "B"]);
    }

    #[test]
    fn filter_by_campaign_membership() {
        let t = sample();
        let only_a: BTreeSet<String> = ["A".to_string()].into_iter().collect();
        let f = t.filter_campaigns(&only_a);
        assert_eq!(f.len(), 2);
        assert!(f.records().iter().all(|r| r.campaign_name.as_deref() == Some("A")));

        let none = t.filter_campaigns(&BTreeSet::new());
        assert!(none.is_empty());
    }

    #[test]
    fn filter_without_campaign_column_is_identity() {
        let mut t = UnifiedTable::concat(vec![(
            "a".to_string(),
            cleaned(&[CanonicalField::Date], vec![rec(date(2024, 1, 1), None, 0.0, 0.0)]),
        )]);
        derive_metrics(&mut t);
        let f = t.filter_campaigns(&BTreeSet::new());
        assert_eq!(f, t);
    }

    #[test]
    fn sort_by_date_descending_puts_nulls_last() {
        let sorted = sample().sorted_by_date_desc();
        let dates: Vec<Option<NaiveDate>> = sorted.records().iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2024, 1, 3), date(2024, 1, 2), date(2024, 1, 1), None]);
    }

    #[test]
    fn summary_recomputes_ratios_over_totals() {
        let s = sample().summary();
        assert_eq!(s.rows, 4);
        assert_eq!(s.spend, 300.0);
        assert_eq!(s.revenue, 1000.0);
        let roas = s.ratio(Metric::Roas).unwrap();
        assert!((roas - 1000.0 / 300.0 * 100.0).abs() < 1e-9);
        assert_eq!(s.ratio(Metric::Ctr), None);
    }

    #[test]
    fn summary_count_totals_saturate() {
        let big = |clicks: u64| CanonicalRecord {
            date: date(2024, 1, 1),
            clicks,
            impressions: clicks,
            ..Default::default()
        };
        let mut table = UnifiedTable::concat(vec![(
            "s".to_string(),
            cleaned(
                &[
                    CanonicalField::Date,
                    CanonicalField::Clicks,
                    CanonicalField::Impressions,
                ],
                vec![big(u64::MAX - 1), big(u64::MAX - 1), big(5)],
            ),
        )]);
        derive_metrics(&mut table);
        let summary = table.summary();
        assert_eq!(summary.clicks, u64::MAX);
        assert_eq!(summary.impressions, u64::MAX);
        assert!(summary.ratio(Metric::Ctr).unwrap().is_finite());
    }

    #[test]
    fn aggregate_by_campaign_groups_nulls_separately() {
        let groups = sample().aggregate_by(GroupKey::Campaign);
        let keys: Vec<Option<&str>> = groups.iter().map(|g| g.key.as_deref()).collect();
        assert_eq!(keys, vec![None, Some("A"), Some("B")]);
        let a = &groups[1].summary;
        assert_eq!(a.rows, 2);
        assert_eq!(a.spend, 200.0);
        assert_eq!(a.ratio(Metric::Roas), Some(350.0));
    }

    #[test]
    fn record_batch_has_present_fields_and_metrics() {
        let batch = sample().to_record_batch().unwrap();
        let names: Vec<String> = batch
            .schema()
            .fields()
            .iter()
            .map(|f| f.name().to_string())
            .collect();
        assert_eq!(names, vec!["date", "campaign_name", "spend", "revenue", "roas"]);
        assert_eq!(batch.num_rows(), 4);

        let dates = batch
            .column(0)
            .as_any()
            .downcast_ref::<Date32Array>()
            .unwrap();
        assert_eq!(dates.value(0), 19723); // 2024-01-01
        assert!(dates.is_null(1));

        let roas = batch
            .column(4)
            .as_any()
            .downcast_ref::<Float64Array>()
            .unwrap();
        assert_eq!(roas.value(0), 300.0);
        assert_eq!(roas.value(1), 0.0);
    }
}
