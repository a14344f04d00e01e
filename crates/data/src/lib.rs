//! Trade-chat data ingestion and persistence.
//!
//! This crate provides:
//! - Record and table models for parsed trade-chat lines
//! - Line-delimited JSON ingestion with legacy field aliases
//! - A staleness-aware cache persisted as Parquet, with a JSON blob fallback
//! - The reference price book used to rate trades

pub mod blob_storage;
pub mod cache;
pub mod error;
pub mod ingest;
pub mod models;
pub mod parquet_storage;
pub mod reference_prices;

pub use blob_storage::BlobStorage;
pub use cache::{ArtifactFormat, CacheConfig, CacheLoad, CacheManager, LoadOrigin};
pub use error::{CacheError, IngestError};
pub use ingest::{parse_line, DataIngestor, FileStats};
pub use parquet_storage::{ParquetStorage, StoredTable};
pub use reference_prices::{Rating, ReferencePriceBook, TradeEvaluation};

pub use models::{Operation, TradeRecord, TradeTable};
