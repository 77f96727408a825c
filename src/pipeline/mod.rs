// src/pipeline/mod.rs

pub mod stage;

use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

use crate::{
    error::{PipelineError, SourceError},
    fetch::{fetch_source, SourceSpec},
    metrics::derive_metrics,
    process::{clean, normalize, CoercionReport},
    schema::ColumnAliasMap,
    table::UnifiedTable,
};

pub use stage::{Orchestrator, Stage};

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub table: UnifiedTable,
    /// Sources that were skipped, in configured order.
    pub notices: Vec<SourceError>,
    pub coercion: CoercionReport,
    pub stages: Vec<Stage>,
}

/// Fetch → normalize → clean → merge → derive, over a fixed alias map.
#[derive(Debug, Clone)]
pub struct Pipeline {
    client: Client,
    aliases: Arc<ColumnAliasMap>,
}

impl Pipeline {
    pub fn new(client: Client, aliases: Arc<ColumnAliasMap>) -> Self {
        Self { client, aliases }
    }

    pub fn aliases(&self) -> &ColumnAliasMap {
        &self.aliases
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// A complete recomputation over `sources`.
    pub async fn run(&self, sources: &[SourceSpec]) -> Result<PipelineOutput, PipelineError> {
        let mut orch = Orchestrator::new();
        self.run_with(sources, &mut orch).await
    }

    /// Like [`Pipeline::run`], recording transitions on a caller-owned orchestrator.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn run_with(
        &self,
        sources: &[SourceSpec],
        orch: &mut Orchestrator,
    ) -> Result<PipelineOutput, PipelineError> {
        orch.advance();
        let fetched = join_all(sources.iter().map(|spec| fetch_source(&self.client, spec))).await;

        orch.advance();
        let mut notices = Vec::new();
        let mut coercion = CoercionReport::default();
        let mut cleaned = Vec::with_capacity(sources.len());
        for (spec, result) in sources.iter().zip(fetched) {
            match result.and_then(|raw| normalize(&spec.name, raw, &self.aliases)) {
                Ok(table) => cleaned.push((spec.name.clone(), clean(&table, &mut coercion))),
                Err(e) => {
                    warn!(source = %spec.name, error = %e, "skipping source");
                    notices.push(e);
                }
            }
        }

        if cleaned.is_empty() {
            orch.fail();
            error!(attempted = sources.len(), "no source produced data");
            return Err(PipelineError::AllSourcesFailed {
                attempted: sources.len(),
                failures: notices,
            });
        }

        orch.advance();
        let mut table = UnifiedTable::concat(cleaned);

        orch.advance();
        derive_metrics(&mut table);

        orch.advance();
        info!(
            rows = table.len(),
            sources = table.sources().len(),
            skipped = notices.len(),
            coerced = coercion.total_coerced(),
            "pipeline ready"
        );
        Ok(PipelineOutput {
            table,
            notices,
            coercion,
            stages: orch.history().to_vec(),
        })
    }
}
