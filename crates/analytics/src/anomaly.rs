//! Robust z-score price anomaly detection.
//!
//! Items are first bounded to the `top_n` most frequent names; everything else is
//! folded into one catch-all category that is never scored. Each remaining item is
//! scored on its most recent observations against the median and sample standard
//! deviation of its whole positive-price history.

use crate::statistics::{median, sample_std};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use tradechat_core::config::AnomalyConfig;
use tradechat_core::currency;
use tradechat_data::{TradeRecord, TradeTable};

/// Direction of a price anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightKind {
    /// Priced below the item's typical range
    Opportunity,
    /// Priced above the item's typical range
    Alert,
}

impl std::fmt::Display for InsightKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            InsightKind::Opportunity => "opportunity",
            InsightKind::Alert => "alert",
        })
    }
}

/// One anomalous observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyInsight {
    pub item: String,
    pub classification: InsightKind,
    pub z_score: f64,
    /// Observed price in iron
    pub observed_price: u64,
    /// Median price of the item in iron
    pub reference_price: f64,
    pub timestamp: Option<chrono::NaiveDateTime>,
    pub detail: String,
}

/// Top-N category assignment of every record of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopNEncoding {
    categories: Vec<Arc<str>>,
    codes: Vec<usize>,
}

impl TopNEncoding {
    /// Encodes `table`, keeping the `top_n` most frequent items distinct.
    ///
    /// Ties in frequency are broken by item name so the encoding is deterministic.
    #[must_use]
    pub fn new(table: &TradeTable, top_n: usize) -> Self {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for item in table.iter().filter_map(TradeRecord::item_name) {
            *counts.entry(item).or_default() += 1;
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(top_n);

        let categories: Vec<Arc<str>> = ranked.iter().map(|(item, _)| Arc::from(*item)).collect();
        let index: HashMap<&str, usize> = ranked
            .iter()
            .enumerate()
            .map(|(code, (item, _))| (*item, code))
            .collect();
        let other = categories.len();
        let codes = table
            .iter()
            .map(|r| {
                r.item_name()
                    .and_then(|item| index.get(item).copied())
                    .unwrap_or(other)
            })
            .collect();

        Self { categories, codes }
    }

    /// Code shared by every item outside the top N.
    #[must_use]
    pub fn other_code(&self) -> usize {
        self.categories.len()
    }

    #[must_use]
    pub fn categories(&self) -> &[Arc<str>] {
        &self.categories
    }

    /// Category code of each record, in table order.
    #[must_use]
    pub fn codes(&self) -> &[usize] {
        &self.codes
    }

    /// Number of distinct codes in use, the catch-all included.
    #[must_use]
    pub fn category_count(&self) -> usize {
        let other = self.other_code();
        self.categories.len() + usize::from(self.codes.iter().any(|&c| c == other))
    }
}

/// Flags recent prices that sit far from an item's median.
#[derive(Debug, Clone, Default)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
}

impl AnomalyDetector {
    #[must_use]
    pub fn new(config: AnomalyConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &AnomalyConfig {
        &self.config
    }

    /// Returns the anomalies in `table`, strongest first.
    ///
    /// Returns an empty list when no item qualifies.
    #[must_use]
    pub fn detect(&self, table: &TradeTable) -> Vec<AnomalyInsight> {
        let encoding = TopNEncoding::new(table, self.config.top_n);
        let other = encoding.other_code();

        let mut groups: Vec<Vec<&TradeRecord>> = vec![Vec::new(); other];
        for (record, &code) in table.iter().zip(encoding.codes()) {
            if code != other && record.has_price() {
                groups[code].push(record);
            }
        }

        let mut insights = Vec::new();
        for (item, mut observations) in encoding.categories().iter().zip(groups) {
            if observations.len() < self.config.min_samples {
                debug!(item = %item, samples = observations.len(), "Too few samples, skipping");
                continue;
            }

            let prices: Vec<f64> = observations.iter().map(|r| r.price_minor as f64).collect();
            let (Some(median), Some(std)) = (median(&prices), sample_std(&prices)) else {
                continue;
            };
            if std == 0.0 || !std.is_finite() {
                debug!(item = %item, "No price variance, skipping");
                continue;
            }

            // Undated rows sort first and so count as the oldest.
            observations.sort_by_key(|r| r.timestamp);
            let recent = observations.len().saturating_sub(self.config.recent_k);

            for record in &observations[recent..] {
                let z = (record.price_minor as f64 - median) / std;
                if z.abs() > self.config.z_threshold {
                    insights.push(Self::insight(item, record, z, median));
                }
            }
        }

        insights.sort_by(|a, b| b.z_score.abs().total_cmp(&a.z_score.abs()));
        insights
    }

    fn insight(item: &str, record: &TradeRecord, z: f64, median: f64) -> AnomalyInsight {
        let (classification, action) = if z < 0.0 {
            (InsightKind::Opportunity, "Buy")
        } else {
            (InsightKind::Alert, "Sell")
        };
        let detail = format!(
            "{action}: {} is {:.1} sigma from the median ({})",
            currency::encode(record.price_minor),
            z.abs(),
            currency::encode(median.round() as u64),
        );

        AnomalyInsight {
            item: item.to_string(),
            classification,
            z_score: z,
            observed_price: record.price_minor,
            reference_price: median,
            timestamp: record.timestamp,
            detail,
        }
    }
}
