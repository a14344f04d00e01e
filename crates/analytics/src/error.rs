//! Error types for analytics queries and engine construction.

use thiserror::Error;
use tradechat_data::CacheError;

/// Errors raised by statistics queries.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AnalyticsError {
    /// Rolling windows need at least one day.
    #[error("rolling window must be at least one day, got {0}")]
    InvalidWindow(usize),
}

/// Errors that prevent a [`crate::MarketEngine`] from being built.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Neither a pre-built table nor a source path was supplied.
    #[error("no data source configured: pass a source path or set data.source_dir")]
    NoDataSource,

    /// Loading or rebuilding the cached table failed.
    #[error(transparent)]
    Cache(#[from] CacheError),
}
