// src/schema/arrow.rs

use ::arrow::datatypes::{DataType, Field as ArrowField, Schema as ArrowSchema};
use std::{collections::BTreeSet, sync::Arc};

use super::types::{CanonicalField, FieldKind};
use crate::metrics::Metric;

/// Map a canonical field kind into an Arrow DataType.
///
/// - Date   → Date32 (days since epoch)
/// - Text   → Utf8
/// - Amount → Float64
/// - Count  → UInt64
pub fn map_to_arrow_type(kind: FieldKind) -> DataType {
    match kind {
        FieldKind::Date => DataType::Date32,
        FieldKind::Text => DataType::Utf8,
        FieldKind::Amount => DataType::Float64,
        FieldKind::Count => DataType::UInt64,
    }
}

/// Build the unified-table ArrowSchema: present canonical fields in
/// declaration order, then the derived metric columns.
pub fn build_arrow_schema(
    fields: &BTreeSet<CanonicalField>,
    metrics: &BTreeSet<Metric>,
) -> Arc<ArrowSchema> {
    let mut out: Vec<ArrowField> = fields
        .iter()
        .map(|field| {
            let nullable = matches!(field.kind(), FieldKind::Date | FieldKind::Text);
            ArrowField::new(field.name(), map_to_arrow_type(field.kind()), nullable)
        })
        .collect();
    out.extend(
        metrics
            .iter()
            .map(|metric| ArrowField::new(metric.name(), DataType::Float64, false)),
    );

    Arc::new(ArrowSchema::new(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_lists_fields_then_metrics() {
        let fields: BTreeSet<_> = [
            CanonicalField::Spend,
            CanonicalField::Date,
            CanonicalField::Revenue,
        ]
        .into_iter()
        .collect();
        let metrics: BTreeSet<_> = [Metric::Roas].into_iter().collect();

        let schema = build_arrow_schema(&fields, &metrics);
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name().as_str()).collect();
        assert_eq!(names, vec!["date", "spend", "revenue", "roas"]);
        assert_eq!(schema.field(0).data_type(), &DataType::Date32);
        assert!(schema.field(0).is_nullable());
        assert_eq!(schema.field(1).data_type(), &DataType::Float64);
        assert!(!schema.field(3).is_nullable());
    }
}
