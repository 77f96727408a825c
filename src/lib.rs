//! Merge ad-platform CSV exports into one table with derived efficiency metrics.

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod pipeline;
pub mod process;
pub mod schema;
pub mod table;

pub use cache::{CacheKey, PipelineCache};
pub use config::Config;
pub use error::{PipelineError, SourceError};
pub use pipeline::{Pipeline, PipelineOutput, Stage};
pub use table::UnifiedTable;

#[cfg(test)]
pub(crate) mod test_util {
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    pub fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,adscope=debug")),
            )
            .with_test_writer()
            .finish();
        // Already set by another test in this binary.
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}
