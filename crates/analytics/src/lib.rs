//! Market analytics over parsed trade-chat data.
//!
//! This crate provides:
//! - Noise filtering of chat boilerplate and low-information rows
//! - Per-item time series: volatility, moving average, profit margin, risk trend
//! - Free-text search with required, excluded and exact-phrase terms
//! - Robust z-score price anomaly detection with bounded item cardinality
//! - A `MarketEngine` facade that loads data through the cache

pub mod anomaly;
pub mod engine;
pub mod error;
pub mod noise_filter;
pub mod report;
pub mod search;
pub mod statistics;

pub use anomaly::{AnomalyDetector, AnomalyInsight, InsightKind, TopNEncoding};
pub use engine::MarketEngine;
pub use error::{AnalyticsError, EngineError};
pub use noise_filter::NoiseFilter;
pub use report::{summary_report, DatasetMetadata, SummaryReport};
pub use search::{advanced_search, simple_search, SearchQuery};
pub use statistics::{
    DailyPrice, ItemCount, ItemSummary, MarginPoint, PlayerActivity, PriceStats, RiskPoint,
    RollingPoint, StatisticsEngine,
};
