//! Free-text search command.

use super::DataArgs;
use crate::background::run_in_background;
use anyhow::Result;
use clap::Args;
use tradechat_analytics::SearchQuery;
use tradechat_core::AppConfig;
use tradechat_data::TradeRecord;

const PREVIEW_CHARS: usize = 60;

/// Arguments for the search command.
#[derive(Args, Debug, Clone)]
pub struct SearchArgs {
    /// Terms that must all appear in the item or chat line
    #[arg(required = true)]
    pub terms: Vec<String>,

    /// Terms that must not appear
    #[arg(short = 'x', long, num_args = 1..)]
    pub exclude: Vec<String>,

    /// Match the terms as one exact phrase
    #[arg(long)]
    pub exact: bool,

    /// Match letter case exactly
    #[arg(long)]
    pub case_sensitive: bool,

    /// Maximum number of lines to print
    #[arg(short, long, default_value_t = 50)]
    pub limit: usize,

    /// Print JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl SearchArgs {
    pub fn query(&self) -> SearchQuery {
        SearchQuery::new(self.terms.join(" "))
            .excluding(self.exclude.join(" "))
            .exact(self.exact)
            .case_sensitive(self.case_sensitive)
    }
}

/// Prints the chat lines matching the search terms.
///
/// # Errors
/// Returns an error if market data cannot be loaded.
pub async fn run_search(data: &DataArgs, config: AppConfig, args: SearchArgs) -> Result<()> {
    let engine = data.open_engine(config).await?;
    let query = args.query();

    let found = run_in_background("search", move |_cancel| Ok(engine.search(&query))).await?;
    let shown: Vec<&TradeRecord> = found.iter().take(args.limit).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&shown)?);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No matching lines");
        return Ok(());
    }

    println!(
        "{:<20} {:<6} {:<24} {:>12}  {}",
        "Time", "Op", "Item", "Price", "Line"
    );
    for record in &shown {
        let time = record
            .timestamp
            .map_or_else(|| "-".to_string(), |t| t.format("%Y-%m-%d %H:%M:%S").to_string());
        let line: String = record
            .raw_text
            .as_deref()
            .unwrap_or("")
            .chars()
            .take(PREVIEW_CHARS)
            .collect();
        println!(
            "{:<20} {:<6} {:<24} {:>12}  {}",
            time,
            record.operation,
            record.item_name().unwrap_or("-"),
            record.price_text(),
            line
        );
    }
    if found.len() > shown.len() {
        println!("... {} more", found.len() - shown.len());
    }
    Ok(())
}
