//! Reference price check command.

use anyhow::{anyhow, Context, Result};
use clap::Args;
use std::path::PathBuf;
use tradechat_core::{currency, AppConfig};
use tradechat_data::ReferencePriceBook;

/// Arguments for the rate command.
#[derive(Args, Debug, Clone)]
pub struct RateArgs {
    /// Item name as listed in the reference table
    #[arg(long)]
    pub item: String,

    /// Total asking price, e.g. "1g 50s" or a bare copper amount
    #[arg(long)]
    pub price: String,

    /// Number of units offered
    #[arg(short, long, default_value_t = 1.0)]
    pub quantity: f64,

    /// Reference table (defaults to data.reference_prices)
    #[arg(long)]
    pub prices: Option<PathBuf>,
}

/// Rates one offer against the reference price table.
///
/// # Errors
/// Returns an error if no reference table is configured or it cannot be read.
pub fn run_rate(config: &AppConfig, args: RateArgs) -> Result<()> {
    let path = args
        .prices
        .or_else(|| config.data.reference_prices.clone())
        .ok_or_else(|| anyhow!("No reference prices: pass --prices or set data.reference_prices"))?;
    let book = ReferencePriceBook::load(&path).context("Cannot rate without reference prices")?;

    let price_minor = currency::decode_str(&args.price);
    let evaluation = book.evaluate(&args.item, currency::to_copper(price_minor), args.quantity);

    println!("Item:      {}", args.item);
    println!("Offer:     {} for {}", currency::encode(price_minor), args.quantity);
    match (evaluation.trade_unit_price, evaluation.reference_unit_price) {
        (Some(unit), Some(reference)) => {
            println!("Unit:      {unit:.2}c (reference {reference:.2}c)");
            println!("Delta:     {:+.1}%", evaluation.delta_percent);
        }
        _ => println!("No reference price for this item"),
    }
    println!("Rating:    {}", evaluation.rating);
    Ok(())
}
