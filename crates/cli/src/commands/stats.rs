//! Per-item time series command.

use super::DataArgs;
use crate::background::run_in_background;
use anyhow::Result;
use clap::Args;
use tradechat_analytics::{MarginPoint, RiskPoint, RollingPoint};
use tradechat_core::AppConfig;

/// Arguments for the stats command.
#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Item name or substring (case-insensitive)
    #[arg(long)]
    pub item: String,

    /// Rolling window in trading days (defaults to statistics.window_days)
    #[arg(short, long)]
    pub window: Option<usize>,

    /// Print JSON instead of tables
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Default)]
struct ItemSeries {
    volatility: Vec<RollingPoint>,
    moving_average: Vec<RollingPoint>,
    risk: Vec<RiskPoint>,
    margins: Vec<MarginPoint>,
}

/// Prints volatility, moving average, risk trend and profit margins of one item.
///
/// # Errors
/// Returns an error if market data cannot be loaded or the window is zero.
pub async fn run_stats(data: &DataArgs, config: AppConfig, args: StatsArgs) -> Result<()> {
    let window = args.window.unwrap_or(config.statistics.window_days);
    let engine = data.open_engine(config).await?;

    let item = args.item.clone();
    let series = run_in_background("stats", move |_cancel| {
        let stats = engine.statistics();
        Ok(ItemSeries {
            volatility: stats.volatility(&item, window)?,
            moving_average: stats.moving_average(&item, window)?,
            risk: stats.risk_trend(&item, window)?,
            margins: stats.profit_margin(&item),
        })
    })
    .await?;

    if args.json {
        let value = serde_json::json!({
            "item": args.item,
            "window_days": window,
            "volatility": series.volatility,
            "moving_average": series.moving_average,
            "risk_trend": series.risk,
            "profit_margin": series.margins,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_series(&args.item, window, &series);
    Ok(())
}

fn print_series(item: &str, window: usize, series: &ItemSeries) {
    println!("=== {item} ({window}-day window, prices in copper) ===\n");

    println!("--- Volatility / Moving Average / Risk ---");
    if series.risk.is_empty() {
        println!("Not enough dated, priced trades for a {window}-day window");
    } else {
        println!(
            "{:<12} {:>12} {:>12} {:>12} {:>8}",
            "Date", "Price", "Volatility", "Moving Avg", "Risk"
        );
        for risk in &series.risk {
            let price = series
                .volatility
                .iter()
                .find(|v| v.date == risk.date)
                .map_or(f64::NAN, |v| v.price);
            println!(
                "{:<12} {:>12.2} {:>12.2} {:>12.2} {:>8.3}",
                risk.date.to_string(),
                price,
                risk.volatility,
                risk.moving_average,
                risk.risk_score
            );
        }
    }

    println!("\n--- Profit Margin (min WTS - max WTB) ---");
    if series.margins.is_empty() {
        println!("No day with both sell and buy offers");
        return;
    }
    println!(
        "{:<12} {:>12} {:>12} {:>12} {:>9}",
        "Date", "Min WTS", "Max WTB", "Spread", "Margin %"
    );
    for margin in &series.margins {
        println!(
            "{:<12} {:>12.2} {:>12.2} {:>12.2} {:>8.1}%",
            margin.date.to_string(),
            margin.min_sell,
            margin.max_buy,
            margin.spread,
            margin.margin_pct
        );
    }
}
