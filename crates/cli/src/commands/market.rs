//! Market overview command.

use super::DataArgs;
use crate::background::run_in_background;
use anyhow::Result;
use clap::Args;
use tradechat_analytics::{ItemCount, ItemSummary};
use tradechat_core::{currency, AppConfig};

/// Arguments for the market command.
#[derive(Args, Debug, Clone)]
pub struct MarketArgs {
    /// Number of items to list
    #[arg(short, long, default_value_t = 20)]
    pub top: usize,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Lists the most traded items with their average price.
///
/// # Errors
/// Returns an error if market data cannot be loaded.
pub async fn run_market(data: &DataArgs, config: AppConfig, args: MarketArgs) -> Result<()> {
    let engine = data.open_engine(config).await?;
    let top = args.top;

    let rows: Vec<(ItemCount, Option<ItemSummary>)> =
        run_in_background("market", move |_cancel| {
            let stats = engine.statistics();
            let summary = stats.market_summary();
            Ok(stats
                .top_items(top, None)
                .into_iter()
                .map(|entry| {
                    let priced = summary.get(&entry.item).copied();
                    (entry, priced)
                })
                .collect())
        })
        .await?;

    if args.json {
        let value: Vec<_> = rows
            .iter()
            .map(|(entry, priced)| {
                serde_json::json!({
                    "item": entry.item,
                    "trades": entry.count,
                    "priced_trades": priced.map(|p| p.transaction_count),
                    "average_price_minor": priced.map(|p| p.average_price),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("{:<32} {:>8} {:>8} {:>16}", "Item", "Trades", "Priced", "Avg Price");
    for (entry, priced) in &rows {
        let (count, average) = match priced {
            Some(p) => (
                p.transaction_count.to_string(),
                currency::encode(p.average_price.round() as u64),
            ),
            None => ("0".to_string(), "-".to_string()),
        };
        println!("{:<32} {:>8} {:>8} {:>16}", entry.item, entry.count, count, average);
    }
    Ok(())
}
