// src/cache.rs

use std::{
    collections::HashMap,
    sync::{Arc, PoisonError, RwLock},
};
use tracing::{debug, info};

use crate::{
    error::PipelineError,
    fetch::SourceSpec,
    pipeline::{Pipeline, PipelineOutput},
};

/// Identity of a cached run: the ordered source locators plus the alias map
/// fingerprint. Source names are part of the key too, since they label the
/// output's notices and per-source row counts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub locators: Vec<String>,
    pub names: Vec<String>,
    pub alias_version: u64,
}

impl CacheKey {
    pub fn new(sources: &[SourceSpec], alias_version: u64) -> Self {
        Self {
            locators: sources.iter().map(|s| s.locator.to_string()).collect(),
            names: sources.iter().map(|s| s.name.clone()).collect(),
            alias_version,
        }
    }

    pub fn for_pipeline(pipeline: &Pipeline, sources: &[SourceSpec]) -> Self {
        Self::new(sources, pipeline.aliases().version())
    }
}

/// Explicit, caller-invalidated memo of pipeline results.
///
/// Only successful runs are stored. No lock is held while a run is in flight,
/// so two callers missing at once may both compute; the later insert wins.
#[derive(Debug, Default)]
pub struct PipelineCache {
    entries: RwLock<HashMap<CacheKey, Arc<PipelineOutput>>>,
}

impl PipelineCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<PipelineOutput>> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    /// Cached output for `sources`, running the pipeline on a miss.
    pub async fn get_or_run(
        &self,
        pipeline: &Pipeline,
        sources: &[SourceSpec],
    ) -> Result<Arc<PipelineOutput>, PipelineError> {
        let key = CacheKey::for_pipeline(pipeline, sources);
        if let Some(hit) = self.get(&key) {
            debug!(sources = key.locators.len(), "pipeline cache hit");
            return Ok(hit);
        }
        debug!(sources = key.locators.len(), "pipeline cache miss");

        let output = Arc::new(pipeline.run(sources).await?);
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, Arc::clone(&output));
        Ok(output)
    }

    /// Drop any cached entry for `sources` and recompute.
    pub async fn refresh(
        &self,
        pipeline: &Pipeline,
        sources: &[SourceSpec],
    ) -> Result<Arc<PipelineOutput>, PipelineError> {
        let key = CacheKey::for_pipeline(pipeline, sources);
        if self.invalidate(&key) {
            info!(sources = key.locators.len(), "refreshing cached pipeline result");
        }
        self.get_or_run(pipeline, sources).await
    }

    /// Returns whether an entry was removed.
    pub fn invalidate(&self, key: &CacheKey) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
