//! Removes chat boilerplate and low-information rows before analysis.

use tracing::{debug, info};
use tradechat_core::config::NoiseConfig;
use tradechat_data::{TradeRecord, TradeTable};

/// Case-insensitive substring filter over configured text columns.
#[derive(Debug, Clone)]
pub struct NoiseFilter {
    /// Lower-cased, non-empty phrases
    terms: Vec<String>,
    columns: Vec<String>,
}

impl NoiseFilter {
    #[must_use]
    pub fn new<T, C>(terms: T, columns: C) -> Self
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        Self {
            terms: terms
                .into_iter()
                .map(|t| t.as_ref().trim().to_lowercase())
                .filter(|t| !t.is_empty())
                .collect(),
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    #[must_use]
    pub fn from_config(config: &NoiseConfig) -> Self {
        Self::new(&config.terms, config.columns.iter().cloned())
    }

    #[must_use]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    fn contains_noise(&self, value: &str) -> bool {
        let value = value.to_lowercase();
        self.terms.iter().any(|term| value.contains(term.as_str()))
    }

    /// Returns true if any of `columns` of the record holds a noise phrase.
    #[must_use]
    pub fn is_noise(&self, record: &TradeRecord, columns: &[&str]) -> bool {
        columns
            .iter()
            .filter_map(|column| record.text_field(column))
            .any(|value| self.contains_noise(value))
    }

    /// Returns a new table without the rows whose scanned columns hold a noise phrase.
    ///
    /// Configured columns the table does not have are skipped.
    #[must_use]
    pub fn clean(&self, table: &TradeTable) -> TradeTable {
        let active: Vec<&str> = self
            .columns
            .iter()
            .map(String::as_str)
            .filter(|column| {
                let present = table.has_column(column);
                if !present {
                    debug!(column = *column, "Noise column absent, skipping");
                }
                present
            })
            .collect();

        if active.is_empty() || self.terms.is_empty() {
            return table.clone();
        }

        let cleaned = table.filter(|record| !self.is_noise(record, &active));
        info!(
            removed = table.len() - cleaned.len(),
            remaining = cleaned.len(),
            "Noise filter applied"
        );
        cleaned
    }
}

impl Default for NoiseFilter {
    fn default() -> Self {
        Self::from_config(&NoiseConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradechat_data::Operation;

    fn table() -> TradeTable {
        TradeTable::new(vec![
            TradeRecord::new("iron lump", Operation::SellOffer, 100).with_raw_text("WTS iron lump 1c"),
            TradeRecord::new("Rare sword", Operation::SellOffer, 100),
            TradeRecord::new("rope", Operation::BuyOffer, 100)
                .with_raw_text("This is the Trade channel. Only messages starting with WTB, WTS"),
            TradeRecord::new("clay bowl", Operation::SellOffer, 100),
        ])
    }

    #[test]
    fn test_removes_rows_matching_any_column() {
        let cleaned = NoiseFilter::default().clean(&table());

        let items: Vec<_> = cleaned.iter().filter_map(TradeRecord::item_name).collect();
        assert_eq!(items, vec!["iron lump"]);
    }

    #[test]
    fn test_clean_rows_are_unmodified() {
        let original = table();
        let cleaned = NoiseFilter::default().clean(&original);

        assert_eq!(cleaned.records()[0], original.records()[0]);
        assert_eq!(original.len(), 4);
    }

    #[test]
    fn test_match_is_case_insensitive() {
        let filter = NoiseFilter::new(["SWORD"], ["item"]);
        let cleaned = filter.clean(&table());

        assert_eq!(cleaned.len(), 3);
    }

    #[test]
    fn test_missing_columns_are_skipped() {
        let filter = NoiseFilter::new(["iron"], ["description", "player", "item"]);
        let cleaned = filter.clean(&table());

        assert_eq!(cleaned.len(), 3);
    }

    #[test]
    fn test_no_active_column_keeps_everything() {
        let filter = NoiseFilter::new(["iron"], ["description"]);
        assert_eq!(filter.clean(&table()).len(), 4);
    }

    #[test]
    fn test_default_filter_scans_descriptions() {
        let table = TradeTable::new(vec![
            TradeRecord::new("bowl", Operation::SellOffer, 100).with_description("a common bowl"),
            TradeRecord::new("pan", Operation::SellOffer, 100).with_description("iron pan"),
        ]);

        let cleaned = NoiseFilter::default().clean(&table);

        let items: Vec<_> = cleaned.iter().filter_map(TradeRecord::item_name).collect();
        assert_eq!(items, vec!["pan"]);
    }

    #[test]
    fn test_blank_terms_are_ignored() {
        let filter = NoiseFilter::new(["", "   "], ["item"]);

        assert!(filter.terms().is_empty());
        assert_eq!(filter.clean(&table()).len(), 4);
    }
}
