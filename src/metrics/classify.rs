// src/metrics/classify.rs

use anyhow::{bail, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

use super::Metric;
use crate::table::CanonicalRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Good,
    Watch,
    Bad,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Grade::Good => "good",
            Grade::Watch => "watch",
            Grade::Bad => "bad",
        })
    }
}

/// Threshold rule over one derived metric. There are no built-in thresholds;
/// callers always supply them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationRule {
    metric: Metric,
    good_at_least: f64,
    watch_at_least: f64,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleSpec {
    metric: Metric,
    good_at_least: f64,
    watch_at_least: f64,
}

impl ClassificationRule {
    pub fn new(metric: Metric, good_at_least: f64, watch_at_least: f64) -> Result<Self> {
        if !good_at_least.is_finite() || !watch_at_least.is_finite() {
            bail!(
                "{} thresholds must be finite (good={}, watch={})",
                metric,
                good_at_least,
                watch_at_least
            );
        }
        if good_at_least < watch_at_least {
            bail!(
                "{} good threshold {} is below watch threshold {}",
                metric,
                good_at_least,
                watch_at_least
            );
        }
        Ok(Self {
            metric,
            good_at_least,
            watch_at_least,
        })
    }

    pub fn metric(&self) -> Metric {
        self.metric
    }

    pub fn good_at_least(&self) -> f64 {
        self.good_at_least
    }

    pub fn watch_at_least(&self) -> f64 {
        self.watch_at_least
    }

    pub fn grade(&self, value: f64) -> Grade {
        if value >= self.good_at_least {
            Grade::Good
        } else if value >= self.watch_at_least {
            Grade::Watch
        } else {
            Grade::Bad
        }
    }
}

impl<'de> Deserialize<'de> for ClassificationRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let spec = RuleSpec::deserialize(deserializer)?;
        ClassificationRule::new(spec.metric, spec.good_at_least, spec.watch_at_least)
            .map_err(serde::de::Error::custom)
    }
}

/// Grade a row by one derived metric; `None` if that metric was not computed.
pub fn classify(record: &CanonicalRecord, rule: &ClassificationRule) -> Option<Grade> {
    record.metric(rule.metric).map(|value| rule.grade(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_with_roas(roas: Option<f64>) -> CanonicalRecord {
        CanonicalRecord {
            roas,
            ..Default::default()
        }
    }

    #[test]
    fn grades_by_caller_thresholds() {
        let rule = ClassificationRule::new(Metric::Roas, 300.0, 200.0).unwrap();
        assert_eq!(classify(&record_with_roas(Some(450.0)), &rule), Some(Grade::Good));
        assert_eq!(classify(&record_with_roas(Some(300.0)), &rule), Some(Grade::Good));
        assert_eq!(classify(&record_with_roas(Some(250.0)), &rule), Some(Grade::Watch));
        assert_eq!(classify(&record_with_roas(Some(0.0)), &rule), Some(Grade::Bad));

        let stricter = ClassificationRule::new(Metric::Roas, 400.0, 250.0).unwrap();
        assert_eq!(
            classify(&record_with_roas(Some(300.0)), &stricter),
            Some(Grade::Watch)
        );
    }

    #[test]
    fn uncomputed_metric_has_no_grade() {
        let rule = ClassificationRule::new(Metric::Roas, 300.0, 200.0).unwrap();
        assert_eq!(classify(&record_with_roas(None), &rule), None);
    }

    #[test]
    fn rejects_inverted_or_non_finite_thresholds() {
        let err = ClassificationRule::new(Metric::Cvr, 1.0, 2.0).unwrap_err();
        assert!(err.to_string().contains("below watch threshold"), "{}", err);
        assert!(ClassificationRule::new(Metric::Cvr, f64::NAN, 2.0).is_err());
        assert!(ClassificationRule::new(Metric::Cvr, 2.0, f64::INFINITY).is_err());
    }

    #[test]
    fn deserializes_with_validation() {
        let rule: ClassificationRule =
            serde_yaml::from_str("metric: roas\ngood_at_least: 300\nwatch_at_least: 200\n")
                .unwrap();
        assert_eq!(rule.metric(), Metric::Roas);
        assert_eq!(rule.good_at_least(), 300.0);

        let bad: std::result::Result<ClassificationRule, _> =
            serde_yaml::from_str("metric: roas\ngood_at_least: 100\nwatch_at_least: 200\n");
        let err = bad.unwrap_err();
        assert!(err.to_string().contains("below watch threshold"), "{}", err);
    }
}
