//! Price anomaly command.

use super::DataArgs;
use crate::background::run_in_background;
use anyhow::Result;
use clap::Args;
use tradechat_core::{currency, AppConfig};

/// Arguments for the anomalies command.
#[derive(Args, Debug, Clone)]
pub struct AnomaliesArgs {
    /// Show at most this many insights
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Override anomaly.z_threshold
    #[arg(long)]
    pub z_threshold: Option<f64>,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Scores recent prices against each item's history and prints the outliers.
///
/// # Errors
/// Returns an error if market data cannot be loaded.
pub async fn run_anomalies(data: &DataArgs, mut config: AppConfig, args: AnomaliesArgs) -> Result<()> {
    if let Some(threshold) = args.z_threshold {
        config.anomaly.z_threshold = threshold;
    }
    let engine = data.open_engine(config).await?;

    let mut insights =
        run_in_background("anomalies", move |_cancel| Ok(engine.detect_anomalies())).await?;
    if let Some(limit) = args.limit {
        insights.truncate(limit);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    if insights.is_empty() {
        println!("No price anomalies found");
        return Ok(());
    }

    println!(
        "{:<32} {:<12} {:>12} {:>8}  {}",
        "Item", "Class", "Price", "Z", "Detail"
    );
    for insight in &insights {
        println!(
            "{:<32} {:<12} {:>12} {:>8.2}  {}",
            insight.item,
            insight.classification.to_string(),
            currency::encode(insight.observed_price),
            insight.z_score,
            insight.detail
        );
    }
    Ok(())
}
