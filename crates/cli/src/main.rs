use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod background;
mod commands;

use commands::{AnomaliesArgs, DataArgs, MarketArgs, RateArgs, SearchArgs, StatsArgs};

#[derive(Parser)]
#[command(name = "tradechat")]
#[command(about = "Market analytics for in-game trade chat logs", long_about = None)]
struct Cli {
    #[command(flatten)]
    data: DataArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show an overview of the loaded trade data
    Summary,
    /// Re-ingest the trade logs and rewrite the cache
    Rebuild,
    /// Volatility, moving average, risk trend and margins for one item
    Stats(StatsArgs),
    /// Detect recent prices far from each item's median
    Anomalies(AnomaliesArgs),
    /// Most traded items with their average price
    Market(MarketArgs),
    /// Rate an offer against the reference price table
    Rate(RateArgs),
    /// Find chat lines by required, excluded or exact terms
    Search(SearchArgs),
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON output on stdout stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = cli.data.load_config()?;

    match cli.command {
        Commands::Summary => commands::run_summary(&cli.data, config).await?,
        Commands::Rebuild => commands::run_rebuild(&cli.data, config).await?,
        Commands::Stats(args) => commands::run_stats(&cli.data, config, args).await?,
        Commands::Anomalies(args) => commands::run_anomalies(&cli.data, config, args).await?,
        Commands::Market(args) => commands::run_market(&cli.data, config, args).await?,
        Commands::Rate(args) => commands::run_rate(&config, args)?,
        Commands::Search(args) => commands::run_search(&cli.data, config, args).await?,
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_global_data_args_after_subcommand() {
        let cli = Cli::try_parse_from([
            "tradechat",
            "anomalies",
            "--source",
            "logs",
            "--force-rebuild",
            "--limit",
            "5",
        ])
        .unwrap();

        assert_eq!(cli.data.source.as_deref(), Some(std::path::Path::new("logs")));
        assert!(cli.data.force_rebuild);
        match cli.command {
            Commands::Anomalies(args) => assert_eq!(args.limit, Some(5)),
            _ => panic!("expected anomalies"),
        }
    }

    #[test]
    fn test_search_args_build_query() {
        let cli = Cli::try_parse_from([
            "tradechat",
            "search",
            "iron",
            "lump",
            "--exclude",
            "ore",
            "sum",
            "--exact",
        ])
        .unwrap();

        match cli.command {
            Commands::Search(args) => {
                let query = args.query();
                assert_eq!(query.must, "iron lump");
                assert_eq!(query.exclude, "ore sum");
                assert!(query.exact);
                assert!(!query.case_sensitive);
                assert_eq!(args.limit, 50);
            }
            _ => panic!("expected search"),
        }
    }

    #[test]
    fn test_search_requires_terms() {
        assert!(Cli::try_parse_from(["tradechat", "search"]).is_err());
    }

    #[test]
    fn test_stats_requires_item() {
        assert!(Cli::try_parse_from(["tradechat", "stats"]).is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
