//! CLI commands for trade-chat analytics.

pub mod anomalies;
pub mod market;
pub mod rate;
pub mod rebuild;
pub mod search;
pub mod stats;
pub mod summary;

pub use anomalies::{run_anomalies, AnomaliesArgs};
pub use market::{run_market, MarketArgs};
pub use rate::{run_rate, RateArgs};
pub use rebuild::run_rebuild;
pub use search::{run_search, SearchArgs};
pub use stats::{run_stats, StatsArgs};
pub use summary::run_summary;

use crate::background::run_in_background;
use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;
use std::sync::Arc;
use tradechat_analytics::MarketEngine;
use tradechat_core::{AppConfig, ConfigLoader};

/// Options shared by every command that needs market data.
#[derive(Args, Debug, Clone)]
pub struct DataArgs {
    /// Config file path (defaults to config/Config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Trade log directory or file (overrides data.source_dir)
    #[arg(short, long, global = true, env = "TRADECHAT_SOURCE")]
    pub source: Option<PathBuf>,

    /// Rebuild the cache even if it is fresh
    #[arg(long, global = true)]
    pub force_rebuild: bool,
}

impl DataArgs {
    /// Loads the layered configuration.
    ///
    /// # Errors
    /// Returns an error if a configuration source cannot be parsed.
    pub fn load_config(&self) -> Result<AppConfig> {
        match &self.config {
            Some(path) => ConfigLoader::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display())),
            None => ConfigLoader::load().context("Failed to load config"),
        }
    }

    /// Loads market data on a background worker.
    ///
    /// # Errors
    /// Returns an error if no data source is configured or the cache cannot be built.
    pub async fn open_engine(&self, config: AppConfig) -> Result<Arc<MarketEngine>> {
        let source = self.source.clone();
        let force = self.force_rebuild;
        let engine = run_in_background("load", move |_cancel| {
            Ok(MarketEngine::from_config(config, source.as_deref(), force)?)
        })
        .await?;
        Ok(Arc::new(engine))
    }
}
