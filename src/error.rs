// src/error.rs

use thiserror::Error;

use crate::schema::CanonicalField;

/// Failure local to one source. Recovered by excluding that source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("source `{source_name}` unavailable: {reason}")]
    SourceUnavailable { source_name: String, reason: String },

    #[error("source `{source_name}` has no `{field}` column after alias mapping (columns: {columns:?})")]
    MissingRequiredField {
        source_name: String,
        field: CanonicalField,
        columns: Vec<String>,
    },
}

impl SourceError {
    pub fn unavailable(source_name: &str, reason: impl Into<String>) -> Self {
        SourceError::SourceUnavailable {
            source_name: source_name.to_string(),
            reason: reason.into(),
        }
    }

    pub fn source_name(&self) -> &str {
        match self {
            SourceError::SourceUnavailable { source_name, .. }
            | SourceError::MissingRequiredField { source_name, .. } => source_name,
        }
    }
}

/// The only failure that crosses the pipeline boundary.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("no data available: all {attempted} configured source(s) failed")]
    AllSourcesFailed {
        attempted: usize,
        failures: Vec<SourceError>,
    },
}

impl PipelineError {
    pub fn failures(&self) -> &[SourceError] {
        match self {
            PipelineError::AllSourcesFailed { failures, .. } => failures,
        }
    }
}
