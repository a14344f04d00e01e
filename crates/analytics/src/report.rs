//! Dataset overview and plain-text summary.

use crate::statistics::StatisticsEngine;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tradechat_data::{Operation, TradeTable};

/// Number of items listed in the summary report.
pub const REPORT_TOP_ITEMS: usize = 10;

/// Shape of a loaded trade table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub records: usize,
    pub distinct_items: usize,
    /// Whether item names are stored as shared categories
    pub categorical: bool,
    /// Earliest and latest trade date
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    pub operations: BTreeMap<Operation, usize>,
    /// Records carrying a decodable price
    pub priced_records: usize,
}

impl DatasetMetadata {
    #[must_use]
    pub fn from_table(table: &TradeTable) -> Self {
        let mut operations = BTreeMap::new();
        for record in table {
            *operations.entry(record.operation).or_insert(0) += 1;
        }

        let dates = table.iter().filter_map(|r| r.date);
        let date_range = dates
            .clone()
            .min()
            .zip(dates.max());

        Self {
            records: table.len(),
            distinct_items: table.distinct_items(),
            categorical: table.is_categorical(),
            date_range,
            operations,
            priced_records: table.iter().filter(|r| r.has_price()).count(),
        }
    }
}

/// Plain-text overview of a table, rendered through [`fmt::Display`].
pub struct SummaryReport<'a>(pub &'a TradeTable);

impl fmt::Display for SummaryReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let meta = DatasetMetadata::from_table(self.0);

        writeln!(f, "=== Trade Chat Summary ===\n")?;
        writeln!(f, "Records: {}", meta.records)?;
        writeln!(f, "Priced records: {}", meta.priced_records)?;
        writeln!(
            f,
            "Distinct items: {}{}",
            meta.distinct_items,
            if meta.categorical { " (categorical)" } else { "" }
        )?;
        match meta.date_range {
            Some((start, end)) => writeln!(f, "Period: {start} to {end}")?,
            None => writeln!(f, "Period: n/a")?,
        }

        writeln!(f, "\n--- Operations ---")?;
        for (operation, count) in &meta.operations {
            writeln!(f, "{operation:<8} {count}")?;
        }

        writeln!(f, "\n--- Top Items ---")?;
        let top = StatisticsEngine::new(self.0).top_items(REPORT_TOP_ITEMS, None);
        if top.is_empty() {
            writeln!(f, "(none)")?;
        }
        for (rank, entry) in top.iter().enumerate() {
            writeln!(f, "{:>2}. {} ({})", rank + 1, entry.item, entry.count)?;
        }
        Ok(())
    }
}

/// Renders a plain-text overview of `table`.
#[must_use]
pub fn summary_report(table: &TradeTable) -> String {
    SummaryReport(table).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tradechat_data::TradeRecord;

    #[test]
    fn test_metadata_counts() {
        let day = |d| NaiveDate::from_ymd_opt(2025, 2, d).unwrap();
        let table = TradeTable::new(vec![
            TradeRecord::new("rope", Operation::SellOffer, 100).on(day(3)),
            TradeRecord::new("rope", Operation::BuyOffer, 0).on(day(1)),
            TradeRecord::new("nail", Operation::SellOffer, 100),
        ]);

        let meta = DatasetMetadata::from_table(&table);

        assert_eq!(meta.records, 3);
        assert_eq!(meta.distinct_items, 2);
        assert_eq!(meta.priced_records, 2);
        assert_eq!(meta.date_range, Some((day(1), day(3))));
        assert_eq!(meta.operations[&Operation::SellOffer], 2);
    }

    #[test]
    fn test_report_lists_top_items() {
        let table = TradeTable::new(vec![
            TradeRecord::new("rope", Operation::SellOffer, 100),
            TradeRecord::new("rope", Operation::SellOffer, 100),
            TradeRecord::new("nail", Operation::BuyOffer, 100),
        ]);

        let report = summary_report(&table);

        assert!(report.contains("Records: 3"));
        assert!(report.contains(" 1. rope (2)"));
        assert!(report.contains(" 2. nail (1)"));
        assert!(report.contains("Period: n/a"));
    }

    #[test]
    fn test_empty_report() {
        let report = summary_report(&TradeTable::empty());
        assert!(report.contains("Records: 0"));
        assert!(report.contains("(none)"));
    }
}
