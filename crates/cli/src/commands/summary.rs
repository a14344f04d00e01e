//! Dataset overview command.

use super::DataArgs;
use anyhow::Result;
use tradechat_core::AppConfig;

/// Prints the dataset summary report.
///
/// # Errors
/// Returns an error if market data cannot be loaded.
pub async fn run_summary(data: &DataArgs, config: AppConfig) -> Result<()> {
    let engine = data.open_engine(config).await?;
    let meta = engine.metadata();

    print!("{}", engine.summary_report());
    println!();
    println!(
        "Noise filter removed {} of {} records",
        meta.records - engine.cleaned().len(),
        meta.records
    );
    Ok(())
}
