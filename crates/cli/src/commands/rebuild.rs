//! Cache rebuild command.

use crate::background::run_in_background;
use super::DataArgs;
use anyhow::{anyhow, Result};
use tradechat_core::AppConfig;
use tradechat_data::{CacheConfig, CacheManager};

/// Re-ingests the source logs and rewrites the cache.
///
/// # Errors
/// Returns an error if no source is configured or it holds no data files.
pub async fn run_rebuild(data: &DataArgs, config: AppConfig) -> Result<()> {
    let source = data
        .source
        .clone()
        .or_else(|| config.data.source_dir.clone())
        .ok_or_else(|| anyhow!("No data source: pass --source or set data.source_dir"))?;
    let cache = CacheManager::new(CacheConfig::from(&config.data));
    let parquet = cache.parquet_path();
    let blob = cache.blob_path();

    let table = run_in_background("rebuild", move |_cancel| Ok(cache.rebuild(&source)?)).await?;

    println!("Rebuilt cache with {} records", table.len());
    if parquet.is_file() {
        println!("Snapshot: {}", parquet.display());
    } else if blob.is_file() {
        println!("Snapshot (fallback): {}", blob.display());
    } else {
        println!("Snapshot could not be written; see log for details");
    }
    Ok(())
}
