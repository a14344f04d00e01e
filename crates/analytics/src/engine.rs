//! Facade tying the cache, noise filter and analytics together.

use crate::anomaly::{AnomalyDetector, AnomalyInsight};
use crate::error::{AnalyticsError, EngineError};
use crate::noise_filter::NoiseFilter;
use crate::report::{summary_report, DatasetMetadata};
use crate::search::{advanced_search, SearchQuery};
use crate::statistics::{RiskPoint, RollingPoint, StatisticsEngine};
use std::path::Path;
use tracing::{info, warn};
use tradechat_core::config::AppConfig;
use tradechat_data::{
    CacheConfig, CacheManager, ReferencePriceBook, TradeEvaluation, TradeRecord, TradeTable,
};

/// Loaded market data plus the analytics configured for it.
///
/// Holds both the raw table and its noise-filtered view. Statistics and anomaly
/// detection run on the cleaned view unless the raw accessor is used.
#[derive(Debug, Clone)]
pub struct MarketEngine {
    raw: TradeTable,
    cleaned: TradeTable,
    config: AppConfig,
    detector: AnomalyDetector,
    reference_prices: Option<ReferencePriceBook>,
}

impl MarketEngine {
    /// Builds an engine over an already loaded table.
    #[must_use]
    pub fn from_table(table: TradeTable, config: AppConfig) -> Self {
        let cleaned = NoiseFilter::from_config(&config.noise).clean(&table);
        let reference_prices = config
            .data
            .reference_prices
            .as_deref()
            .and_then(load_reference_prices);

        Self {
            raw: table,
            cleaned,
            detector: AnomalyDetector::new(config.anomaly.clone()),
            config,
            reference_prices,
        }
    }

    /// Loads the table through the cache, from `source` or `config.data.source_dir`.
    ///
    /// # Errors
    /// Returns [`EngineError::NoDataSource`] when no source path is known, and a
    /// cache error when the source is missing, holds no data files, or cannot be read.
    pub fn from_config(
        config: AppConfig,
        source: Option<&Path>,
        force_rebuild: bool,
    ) -> Result<Self, EngineError> {
        let source = source
            .map(Path::to_path_buf)
            .or_else(|| config.data.source_dir.clone())
            .ok_or(EngineError::NoDataSource)?;

        let cache = CacheManager::new(CacheConfig::from(&config.data));
        let table = cache.load_or_build(&source, force_rebuild)?;
        info!(
            source = %source.display(),
            records = table.len(),
            "Market data loaded"
        );
        Ok(Self::from_table(table, config))
    }

    /// Uses `table` when given, otherwise loads through the cache.
    ///
    /// # Errors
    /// See [`MarketEngine::from_config`].
    pub fn open(
        table: Option<TradeTable>,
        config: AppConfig,
        source: Option<&Path>,
        force_rebuild: bool,
    ) -> Result<Self, EngineError> {
        match table {
            Some(table) => Ok(Self::from_table(table, config)),
            None => Self::from_config(config, source, force_rebuild),
        }
    }

    #[must_use]
    pub fn raw(&self) -> &TradeTable {
        &self.raw
    }

    #[must_use]
    pub fn cleaned(&self) -> &TradeTable {
        &self.cleaned
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Statistics over the cleaned view.
    #[must_use]
    pub fn statistics(&self) -> StatisticsEngine<'_> {
        StatisticsEngine::new(&self.cleaned)
    }

    #[must_use]
    pub fn raw_statistics(&self) -> StatisticsEngine<'_> {
        StatisticsEngine::new(&self.raw)
    }

    /// Volatility of `item` over the configured window.
    ///
    /// # Errors
    /// Returns an error if the configured window is zero.
    pub fn volatility(&self, item: &str) -> Result<Vec<RollingPoint>, AnalyticsError> {
        self.statistics()
            .volatility(item, self.config.statistics.window_days)
    }

    /// Moving average of `item` over the configured window.
    ///
    /// # Errors
    /// Returns an error if the configured window is zero.
    pub fn moving_average(&self, item: &str) -> Result<Vec<RollingPoint>, AnalyticsError> {
        self.statistics()
            .moving_average(item, self.config.statistics.window_days)
    }

    /// Risk trend of `item` over the configured window.
    ///
    /// # Errors
    /// Returns an error if the configured window is zero.
    pub fn risk_trend(&self, item: &str) -> Result<Vec<RiskPoint>, AnalyticsError> {
        self.statistics()
            .risk_trend(item, self.config.statistics.window_days)
    }

    #[must_use]
    pub fn detect_anomalies(&self) -> Vec<AnomalyInsight> {
        self.detector.detect(&self.cleaned)
    }

    #[must_use]
    pub fn metadata(&self) -> DatasetMetadata {
        DatasetMetadata::from_table(&self.raw)
    }

    #[must_use]
    pub fn summary_report(&self) -> String {
        summary_report(&self.cleaned)
    }

    /// Searches every loaded line, noise included.
    #[must_use]
    pub fn search(&self, query: &SearchQuery) -> TradeTable {
        advanced_search(&self.raw, query)
    }

    #[must_use]
    pub fn reference_prices(&self) -> Option<&ReferencePriceBook> {
        self.reference_prices.as_ref()
    }

    #[must_use]
    pub fn with_reference_prices(mut self, book: ReferencePriceBook) -> Self {
        self.reference_prices = Some(book);
        self
    }

    /// Rates a record against the reference prices, if any are loaded.
    #[must_use]
    pub fn evaluate(&self, record: &TradeRecord) -> Option<TradeEvaluation> {
        self.reference_prices
            .as_ref()
            .map(|book| book.evaluate_record(record))
    }
}

fn load_reference_prices(path: &Path) -> Option<ReferencePriceBook> {
    match ReferencePriceBook::load(path) {
        Ok(book) => Some(book),
        Err(e) => {
            warn!(path = %path.display(), "Reference prices unavailable: {:#}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tradechat_data::{Operation, Rating};

    fn table() -> TradeTable {
        TradeTable::new(vec![
            TradeRecord::new("rope", Operation::SellOffer, 2_000),
            TradeRecord::new("rare rope", Operation::SellOffer, 2_000),
        ])
    }

    #[test]
    fn test_from_table_keeps_raw_and_cleaned_views() {
        let engine = MarketEngine::from_table(table(), AppConfig::default());

        assert_eq!(engine.raw().len(), 2);
        assert_eq!(engine.cleaned().len(), 1);
        assert_eq!(engine.metadata().records, 2);
        assert_eq!(engine.statistics().market_summary().len(), 1);
        assert_eq!(engine.raw_statistics().market_summary().len(), 2);
    }

    #[test]
    fn test_search_covers_filtered_rows() {
        let engine = MarketEngine::from_table(table(), AppConfig::default());

        let found = engine.search(&SearchQuery::new("rope"));

        assert_eq!(found.len(), 2);
        assert_eq!(engine.search(&SearchQuery::new("rare").exact(true)).len(), 1);
    }

    #[test]
    fn test_no_source_is_fatal() {
        let result = MarketEngine::from_config(AppConfig::default(), None, false);
        assert!(matches!(result, Err(EngineError::NoDataSource)));
    }

    #[test]
    fn test_open_prefers_supplied_table() {
        let engine = MarketEngine::open(Some(table()), AppConfig::default(), None, false).unwrap();
        assert_eq!(engine.raw().len(), 2);
    }

    #[test]
    fn test_from_config_loads_through_cache() {
        let dir = TempDir::new().unwrap();
        let logs = dir.path().join("logs");
        fs::create_dir_all(&logs).unwrap();
        fs::write(
            logs.join("chat.txt"),
            "{\"item\": \"rope\", \"operation\": \"WTS\", \"price\": \"20c\"}\n",
        )
        .unwrap();

        let mut config = AppConfig::default();
        config.data.cache_dir = dir.path().join("cache");
        config.data.source_dir = Some(logs);

        let engine = MarketEngine::from_config(config, None, false).unwrap();

        assert_eq!(engine.raw().len(), 1);
        assert_eq!(engine.raw().records()[0].price_minor, 2_000);
    }

    #[test]
    fn test_reference_prices_from_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prices.csv");
        fs::write(&path, "Nome_Item;Qtd_Lote;Preco_Medio_Copper\nrope;1;40\n").unwrap();

        let mut config = AppConfig::default();
        config.data.reference_prices = Some(path);
        let engine = MarketEngine::from_table(table(), config);

        let rope = &engine.cleaned().records()[0];
        assert_eq!(engine.evaluate(rope).map(|e| e.rating), Some(Rating::Good));
    }

    #[test]
    fn test_missing_reference_file_is_tolerated() {
        let mut config = AppConfig::default();
        config.data.reference_prices = Some("/nonexistent/prices.csv".into());

        let engine = MarketEngine::from_table(table(), config);

        assert!(engine.reference_prices().is_none());
        assert!(engine.evaluate(&engine.raw().records()[0]).is_none());
    }
}
