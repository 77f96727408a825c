// src/schema/alias.rs

use anyhow::{bail, Result};
use std::{
    collections::{hash_map::DefaultHasher, BTreeMap},
    hash::{Hash, Hasher},
};

use super::types::CanonicalField;

/// Header labels seen in the ad-platform exports, plus common English variants.
static DEFAULT_ALIASES: &[(&str, CanonicalField)] = &[
    ("캠페인 시작일", CanonicalField::Date),
    ("날짜", CanonicalField::Date),
    ("일자", CanonicalField::Date),
    ("campaign start date", CanonicalField::Date),
    ("day", CanonicalField::Date),
    ("report date", CanonicalField::Date),
    ("캠페인 이름", CanonicalField::CampaignName),
    ("캠페인명", CanonicalField::CampaignName),
    ("campaign", CanonicalField::CampaignName),
    ("campaign name", CanonicalField::CampaignName),
    ("키워드", CanonicalField::Keyword),
    ("검색어", CanonicalField::Keyword),
    ("search term", CanonicalField::Keyword),
    ("광고비(원)", CanonicalField::Spend),
    ("광고비", CanonicalField::Spend),
    ("cost", CanonicalField::Spend),
    ("ad spend", CanonicalField::Spend),
    ("총 전환 매출액 (14일)(원)", CanonicalField::Revenue),
    ("총 전환매출액(14일)", CanonicalField::Revenue),
    ("전환매출액", CanonicalField::Revenue),
    ("sales", CanonicalField::Revenue),
    ("conversion value", CanonicalField::Revenue),
    ("총 주문수 (14일)", CanonicalField::Orders),
    ("총 주문수(14일)", CanonicalField::Orders),
    ("주문수", CanonicalField::Orders),
    ("conversions", CanonicalField::Orders),
    ("purchases", CanonicalField::Orders),
    ("클릭수", CanonicalField::Clicks),
    ("노출수", CanonicalField::Impressions),
    ("impr.", CanonicalField::Impressions),
];

/// Fold a header for alias lookup: trim, collapse inner whitespace, lowercase.
pub fn fold_key(header: &str) -> String {
    header
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Static mapping from source-specific header variants to canonical fields.
///
/// Canonical names always resolve to themselves, so renaming an already
/// renamed header is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnAliasMap {
    /// folded alias → canonical field
    entries: BTreeMap<String, CanonicalField>,
}

impl ColumnAliasMap {
    /// A map that only knows the canonical names themselves.
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    pub fn from_entries<I, S>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, CanonicalField)>,
        S: AsRef<str>,
    {
        let mut map = Self::empty();
        for (alias, field) in entries {
            map.insert(alias.as_ref(), field)?;
        }
        Ok(map)
    }

    /// Register `alias` for `field`.
    ///
    /// Fails if the alias is blank, shadows a different canonical name, or is
    /// already registered for another field.
    pub fn insert(&mut self, alias: &str, field: CanonicalField) -> Result<()> {
        let key = fold_key(alias);
        if key.is_empty() {
            bail!("blank alias for `{}`", field);
        }
        if let Some(canonical) = CanonicalField::from_name(&key) {
            if canonical != field {
                bail!(
                    "alias `{}` for `{}` collides with canonical field `{}`",
                    alias,
                    field,
                    canonical
                );
            }
        }
        match self.entries.get(&key) {
            Some(existing) if *existing != field => bail!(
                "alias `{}` already maps to `{}`, cannot remap to `{}`",
                alias,
                existing,
                field
            ),
            _ => {
                self.entries.insert(key, field);
                Ok(())
            }
        }
    }

    pub fn resolve(&self, header: &str) -> Option<CanonicalField> {
        let key = fold_key(header);
        CanonicalField::from_name(&key).or_else(|| self.entries.get(&key).copied())
    }

    /// The canonical name for `header`, or the header unchanged if unknown.
    pub fn rename<'a>(&self, header: &'a str) -> &'a str {
        match self.resolve(header) {
            Some(field) => field.name(),
            None => header,
        }
    }

    /// Fingerprint of the entries, used as part of the result cache key.
    /// Stable for the lifetime of the process.
    pub fn version(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.entries.hash(&mut hasher);
        hasher.finish()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn aliases_for(&self, field: CanonicalField) -> impl Iterator<Item = &str> + '_ {
        self.entries
            .iter()
            .filter(move |(_, f)| **f == field)
            .map(|(alias, _)| alias.as_str())
    }
}

impl Default for ColumnAliasMap {
    fn default() -> Self {
        Self {
            entries: DEFAULT_ALIASES
                .iter()
                .map(|(alias, field)| (fold_key(alias), *field))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_aliases_pass_validation() {
        let validated = ColumnAliasMap::from_entries(DEFAULT_ALIASES.iter().copied()).unwrap();
        assert_eq!(validated, ColumnAliasMap::default());
    }

    #[test]
    fn resolves_korean_and_english_headers() {
        let map = ColumnAliasMap::default();
        assert_eq!(map.resolve("캠페인 시작일"), Some(CanonicalField::Date));
        assert_eq!(map.resolve("  Campaign   Start Date "), Some(CanonicalField::Date));
        assert_eq!(map.resolve("광고비(원)"), Some(CanonicalField::Spend));
        assert_eq!(
            map.resolve("총 전환 매출액 (14일)(원)"),
            Some(CanonicalField::Revenue)
        );
        assert_eq!(map.resolve("unknown header"), None);
    }

    #[test]
    fn canonical_names_resolve_to_themselves_even_when_empty() {
        let map = ColumnAliasMap::empty();
        for field in CanonicalField::ALL {
            assert_eq!(map.rename(field.name()), field.name());
        }
        assert_eq!(map.rename("Impressions"), "impressions");
    }

    #[test]
    fn renaming_is_idempotent() {
        let map = ColumnAliasMap::default();
        for header in ["클릭수", "cost", "날짜", "mystery", "CAMPAIGN"] {
            let once = map.rename(header).to_string();
            let twice = map.rename(&once).to_string();
            assert_eq!(once, twice, "header {header}");
        }
    }

    #[test]
    fn rejects_alias_shadowing_another_canonical_field() {
        let err = ColumnAliasMap::from_entries([("clicks", CanonicalField::Orders)]).unwrap_err();
        assert!(err.to_string().contains("collides"));
    }

    #[test]
    fn rejects_conflicting_and_blank_aliases() {
        let mut map = ColumnAliasMap::empty();
        map.insert("cost", CanonicalField::Spend).unwrap();
        map.insert("COST", CanonicalField::Spend).unwrap();
        assert!(map.insert("cost", CanonicalField::Revenue).is_err());
        assert!(map.insert("   ", CanonicalField::Spend).is_err());
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn version_tracks_entries() {
        let a = ColumnAliasMap::default();
        let mut b = ColumnAliasMap::default();
        assert_eq!(a.version(), b.version());
        b.insert("spend (usd)", CanonicalField::Spend).unwrap();
        assert_ne!(a.version(), b.version());
    }
}
