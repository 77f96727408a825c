// src/fetch/mod.rs

pub mod parse;

use anyhow::{anyhow, bail, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

use crate::{error::SourceError, process::RawTable};

pub use parse::parse_csv;

/// Where a source's CSV export lives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Locator {
    /// Published spreadsheet export or any other HTTP(S) endpoint.
    Url(Url),
    /// Local export file.
    File(PathBuf),
}

impl Locator {
    /// `http://` and `https://` become URLs; `file://` and bare paths become files.
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("empty source locator");
        }
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            let url = Url::parse(raw).with_context(|| format!("invalid source URL `{}`", raw))?;
            return Ok(Locator::Url(url));
        }
        if lower.starts_with("file://") {
            let url = Url::parse(raw).with_context(|| format!("invalid file URL `{}`", raw))?;
            let path = url
                .to_file_path()
                .map_err(|_| anyhow!("file URL `{}` has no local path", raw))?;
            return Ok(Locator::File(path));
        }
        if lower.contains("://") {
            bail!("unsupported locator scheme in `{}`", raw);
        }
        Ok(Locator::File(PathBuf::from(raw)))
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Url(url) => write!(f, "{}", url),
            Locator::File(path) => write!(f, "{}", path.display()),
        }
    }
}

impl TryFrom<String> for Locator {
    type Error = anyhow::Error;

    fn try_from(raw: String) -> Result<Self> {
        Locator::parse(&raw)
    }
}

impl From<Locator> for String {
    fn from(locator: Locator) -> Self {
        locator.to_string()
    }
}

/// A named data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSpec {
    pub name: String,
    pub locator: Locator,
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, locator: Locator) -> Self {
        Self {
            name: name.into(),
            locator,
        }
    }

    /// `NAME=LOCATOR`, or a bare locator named after its last path segment.
    pub fn parse_arg(arg: &str) -> Result<Self> {
        if let Some((name, locator)) = arg.split_once('=') {
            if !name.trim().is_empty() && !name.contains("://") {
                return Ok(Self::new(name.trim(), Locator::parse(locator)?));
            }
        }
        let locator = Locator::parse(arg)?;
        let name = match &locator {
            Locator::Url(url) => url
                .path_segments()
                .and_then(|mut segs| segs.next_back())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| url.host_str().map(str::to_string))
                .unwrap_or_else(|| url.to_string()),
            Locator::File(path) => path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
        };
        Ok(Self::new(name, locator))
    }
}

/// One GET, or one file read. No retries and no caching at this layer.
pub async fn fetch_bytes(client: &Client, locator: &Locator) -> Result<Vec<u8>> {
    match locator {
        Locator::Url(url) => {
            let resp = client
                .get(url.as_str())
                .send()
                .await
                .with_context(|| format!("GET {}", url))?
                .error_for_status()?;
            let bytes = resp
                .bytes()
                .await
                .with_context(|| format!("reading body of {}", url))?;
            Ok(bytes.to_vec())
        }
        Locator::File(path) => fs::read(path)
            .await
            .with_context(|| format!("reading {}", path.display())),
    }
}

/// Fetch and parse one source. Every failure is folded into
/// [`SourceError::SourceUnavailable`] so the caller can skip the source.
#[instrument(level = "debug", skip(client, spec), fields(source = %spec.name))]
pub async fn fetch_source(client: &Client, spec: &SourceSpec) -> Result<RawTable, SourceError> {
    let bytes = fetch_bytes(client, &spec.locator)
        .await
        .map_err(|e| SourceError::unavailable(&spec.name, format!("{:#}", e)))?;
    debug!(bytes = bytes.len(), "fetched");

    let table = parse_csv(&bytes)
        .map_err(|e| SourceError::unavailable(&spec.name, format!("{:#}", e)))?;
    if table.is_empty() {
        return Err(SourceError::unavailable(&spec.name, "export has no data rows"));
    }
    info!(
        source = %spec.name,
        rows = table.len(),
        columns = table.width(),
        "source loaded"
    );
    Ok(table)
}
