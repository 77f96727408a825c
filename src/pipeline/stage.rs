use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Lifecycle of one pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    FetchingSources,
    Normalizing,
    Merging,
    DerivingMetrics,
    Ready,
    Failed,
}

impl Stage {
    /// The stage after this one on the success path. Terminal stages have none.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Idle => Some(Stage::FetchingSources),
            Stage::FetchingSources => Some(Stage::Normalizing),
            Stage::Normalizing => Some(Stage::Merging),
            Stage::Merging => Some(Stage::DerivingMetrics),
            Stage::DerivingMetrics => Some(Stage::Ready),
            Stage::Ready | Stage::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Idle => "idle",
            Stage::FetchingSources => "fetching_sources",
            Stage::Normalizing => "normalizing",
            Stage::Merging => "merging",
            Stage::DerivingMetrics => "deriving_metrics",
            Stage::Ready => "ready",
            Stage::Failed => "failed",
        })
    }
}

/// Tracks the current [`Stage`] and every transition taken.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orchestrator {
    history: Vec<Stage>,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    pub fn new() -> Self {
        Self {
            history: vec![Stage::Idle],
        }
    }

    pub fn stage(&self) -> Stage {
        self.history.last().copied().unwrap_or(Stage::Idle)
    }

    /// Every stage visited, starting with `Idle`.
    pub fn history(&self) -> &[Stage] {
        &self.history
    }

    /// Step along the success path. A terminal orchestrator stays put.
    pub fn advance(&mut self) -> Stage {
        let from = self.stage();
        match from.next() {
            Some(to) => {
                info!(%from, %to, "pipeline stage");
                self.history.push(to);
                to
            }
            None => {
                warn!(stage = %from, "advance on finished pipeline ignored");
                from
            }
        }
    }

    /// Move to `Failed` from any non-terminal stage.
    pub fn fail(&mut self) -> Stage {
        let from = self.stage();
        if from.is_terminal() {
            warn!(stage = %from, "fail on finished pipeline ignored");
            return from;
        }
        warn!(%from, to = %Stage::Failed, "pipeline stage");
        self.history.push(Stage::Failed);
        Stage::Failed
    }

    pub fn into_history(self) -> Vec<Stage> {
        self.history
    }
}
