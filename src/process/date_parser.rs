use chrono::{DateTime, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::process::utils::clean_str;

/// `YYYY-MM-DD`, `YYYY/MM/DD`, `YYYY.MM.DD`, `YYYY년 M월 D일`, optionally
/// followed by a time or anything else.
static YMD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})\s*[-/.년]\s*(\d{1,2})\s*[-/.월]\s*(\d{1,2})")
        .expect("YMD date pattern should compile")
});

/// Compact `YYYYMMDD`, optionally followed by a non-digit.
static COMPACT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})(\d{2})(\d{2})(?:\D|$)").expect("compact date pattern should compile")
});

/// US-style `M/D/YYYY`.
static MDY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{1,2})/(\d{1,2})/(\d{4})(?:\D|$)").expect("MDY date pattern should compile")
});

fn ymd(y: &str, m: &str, d: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
}

/// Tolerant date parse. Returns `None` rather than failing, so the row can be
/// kept with a null date.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let s = clean_str(raw);
    if s.is_empty() {
        return None;
    }
    if let Some(c) = YMD.captures(&s) {
        return ymd(&c[1], &c[2], &c[3]);
    }
    if let Some(c) = COMPACT.captures(&s) {
        return ymd(&c[1], &c[2], &c[3]);
    }
    if let Some(c) = MDY.captures(&s) {
        return ymd(&c[3], &c[1], &c[2]);
    }
    DateTime::parse_from_rfc3339(&s)
        .ok()
        .map(|dt| dt.date_naive())
}
