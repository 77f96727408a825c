// src/config.rs

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path, path::PathBuf};
use tracing::debug;

use crate::{
    fetch::SourceSpec,
    metrics::ClassificationRule,
    schema::{CanonicalField, ColumnAliasMap},
    table::ExportFormat,
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExportConfig {
    pub path: PathBuf,
    /// Inferred from the path's extension when omitted.
    #[serde(default)]
    pub format: Option<ExportFormat>,
}

impl ExportConfig {
    pub fn resolved_format(&self) -> ExportFormat {
        self.format
            .or_else(|| ExportFormat::from_path(&self.path))
            .unwrap_or_default()
    }
}

/// Runtime configuration, read from YAML.
///
/// ```yaml
/// sources:
///   - name: campaigns
///     locator: https://docs.google.com/spreadsheets/d/<id>/export?format=csv
///   - name: keywords
///     locator: ./exports/keywords.csv
/// aliases:
///   spend: ["집행 금액"]
/// classification:
///   metric: roas
///   good_at_least: 300
///   watch_at_least: 200
/// export:
///   path: out/unified.parquet
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub sources: Vec<SourceSpec>,
    /// Extra header aliases per canonical field.
    pub aliases: BTreeMap<CanonicalField, Vec<String>>,
    /// Use only `aliases`, not the built-in table.
    pub replace_default_aliases: bool,
    pub classification: Option<ClassificationRule>,
    pub export: Option<ExportConfig>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config = Self::from_yaml_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        debug!(path = %path.display(), sources = config.sources.len(), "loaded config");
        Ok(config)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// The alias map this config describes. Conflicting aliases are an error.
    pub fn alias_map(&self) -> Result<ColumnAliasMap> {
        let mut map = if self.replace_default_aliases {
            ColumnAliasMap::empty()
        } else {
            ColumnAliasMap::default()
        };
        for (&field, aliases) in &self.aliases {
            for alias in aliases {
                map.insert(alias, field)
                    .with_context(|| format!("configuring alias `{}`", alias))?;
            }
        }
        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fetch::Locator, metrics::Metric};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
sources:
  - name: campaigns
    locator: https://example.com/export?format=csv&gid=0
  - name: keywords
    locator: ./exports/keywords.csv
aliases:
  spend: ["집행 금액"]
classification:
  metric: roas
  good_at_least: 300
  watch_at_least: 200
export:
  path: out/unified.parquet
"#;

    #[test]
    fn parses_full_config() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.sources.len(), 2);
        assert!(matches!(config.sources[0].locator, Locator::Url(_)));
        assert_eq!(
            config.sources[1].locator,
            Locator::File(PathBuf::from("./exports/keywords.csv"))
        );
        assert_eq!(config.classification.unwrap().metric(), Metric::Roas);
        assert_eq!(
            config.export.as_ref().unwrap().resolved_format(),
            ExportFormat::Parquet
        );

        let aliases = config.alias_map().unwrap();
        assert_eq!(aliases.resolve("집행 금액"), Some(CanonicalField::Spend));
        assert_eq!(aliases.resolve("광고비"), Some(CanonicalField::Spend));
    }

    #[test]
    fn replacing_defaults_drops_builtin_aliases() {
        let config = Config::from_yaml_str(
            "replace_default_aliases: true\naliases:\n  date: [\"when\"]\n",
        )
        .unwrap();
        let aliases = config.alias_map().unwrap();
        assert_eq!(aliases.resolve("when"), Some(CanonicalField::Date));
        assert_eq!(aliases.resolve("광고비"), None);
        assert_eq!(aliases.len(), 1);
    }

    #[test]
    fn conflicting_alias_is_rejected() {
        let config = Config::from_yaml_str("aliases:\n  clicks: [\"광고비\"]\n").unwrap();
        assert!(config.alias_map().is_err());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_thresholds() {
        assert!(Config::from_yaml_str("sourcez: []\n").is_err());
        assert!(Config::from_yaml_str(
            "classification:\n  metric: cvr\n  good_at_least: 1\n  watch_at_least: 5\n"
        )
        .is_err());
    }

    #[test]
    fn empty_config_has_no_sources() {
        let config = Config::from_yaml_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.sources.is_empty());
        assert!(config.classification.is_none());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sources[0].name, "campaigns");
        assert!(Config::load("/nonexistent/adscope.yaml").is_err());
    }
}
