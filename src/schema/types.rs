// src/schema/types.rs

use serde::{Deserialize, Serialize};
use std::fmt;

/// The normalized column names every source-specific header is mapped onto.
///
/// Declaration order is the column order of the unified table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    Date,
    CampaignName,
    Keyword,
    Spend,
    Revenue,
    Orders,
    Clicks,
    Impressions,
}

/// How the cleaner coerces a canonical field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// Calendar date, null when unparseable.
    Date,
    /// Free-form identifier, null when blank.
    Text,
    /// Non-negative float, zero-filled.
    Amount,
    /// Non-negative integer, zero-filled.
    Count,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 8] = [
        CanonicalField::Date,
        CanonicalField::CampaignName,
        CanonicalField::Keyword,
        CanonicalField::Spend,
        CanonicalField::Revenue,
        CanonicalField::Orders,
        CanonicalField::Clicks,
        CanonicalField::Impressions,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CanonicalField::Date => "date",
            CanonicalField::CampaignName => "campaign_name",
            CanonicalField::Keyword => "keyword",
            CanonicalField::Spend => "spend",
            CanonicalField::Revenue => "revenue",
            CanonicalField::Orders => "orders",
            CanonicalField::Clicks => "clicks",
            CanonicalField::Impressions => "impressions",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            CanonicalField::Date => FieldKind::Date,
            CanonicalField::CampaignName | CanonicalField::Keyword => FieldKind::Text,
            CanonicalField::Spend | CanonicalField::Revenue => FieldKind::Amount,
            CanonicalField::Orders | CanonicalField::Clicks | CanonicalField::Impressions => {
                FieldKind::Count
            }
        }
    }

    /// Exact lookup by canonical name (no alias resolution).
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
