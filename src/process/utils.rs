/// 1) Trim whitespace + a leading BOM, strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim_start_matches('\u{feff}').trim();
    if trimmed.starts_with('"') && trimmed.ends_with('"') && trimmed.len() >= 2 {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

/// 2) Drop grouping commas, whitespace, currency signs and the `원` suffix
/// so the remainder can go straight to `str::parse::<f64>`.
pub fn strip_numeric_noise(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, ',' | '₩' | '$' | '€' | '£' | '원' | '"') && !c.is_whitespace())
        .collect()
}

/// 3) Headers with no meaningful name: blank, or pandas-style `Unnamed: 3`.
pub fn is_anonymous_header(header: &str) -> bool {
    let h = header.trim();
    h.is_empty() || h.starts_with("Unnamed:")
}
