//! Reference price table used to rate individual trades.
//!
//! Format: `;`-delimited with header `Nome_Item;Qtd_Lote;Preco_Medio_Copper`
//! (or `item;lot_quantity;total_price`). The price is for the whole lot, in copper.

use crate::models::TradeRecord;
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Relative deviation, in percent, beyond which a trade is rated good or bad.
pub const RATING_THRESHOLD_PCT: f64 = 10.0;

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(rename = "Nome_Item", alias = "item")]
    name: String,
    #[serde(rename = "Qtd_Lote", alias = "lot_quantity")]
    lot_quantity: f64,
    #[serde(rename = "Preco_Medio_Copper", alias = "total_price")]
    total_price: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Rating {
    Good,
    Fair,
    Bad,
    Unknown,
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Rating::Good => "GOOD",
            Rating::Fair => "FAIR",
            Rating::Bad => "BAD",
            Rating::Unknown => "UNKNOWN",
        })
    }
}

/// Outcome of comparing one trade against the reference table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeEvaluation {
    pub rating: Rating,
    /// Deviation of the trade's unit price from the reference, in percent
    pub delta_percent: f64,
    pub reference_unit_price: Option<f64>,
    pub trade_unit_price: Option<f64>,
}

impl TradeEvaluation {
    const fn unknown() -> Self {
        Self {
            rating: Rating::Unknown,
            delta_percent: 0.0,
            reference_unit_price: None,
            trade_unit_price: None,
        }
    }
}

/// Unit reference prices keyed by lower-cased item name.
#[derive(Debug, Clone, Default)]
pub struct ReferencePriceBook {
    prices: HashMap<String, f64>,
}

impl ReferencePriceBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a reference table from disk.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened or its header cannot be read.
    /// Individual malformed rows are skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open reference prices: {}", path.display()))?;
        let book = Self::from_reader(file)
            .with_context(|| format!("Failed to read reference prices: {}", path.display()))?;
        info!(path = %path.display(), prices = book.len(), "Loaded reference prices");
        Ok(book)
    }

    /// Parses a reference table from any reader.
    ///
    /// # Errors
    /// Returns error if the header row cannot be read.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = ReaderBuilder::new()
            .delimiter(b';')
            .trim(Trim::All)
            .from_reader(reader);
        reader.headers().context("Missing header row")?;

        let mut book = Self::new();
        for (index, row) in reader.deserialize::<PriceRow>().enumerate() {
            match row {
                Ok(row) if row.lot_quantity > 0.0 => {
                    book.insert(&row.name, row.total_price / row.lot_quantity);
                }
                Ok(row) => debug!(item = %row.name, "Skipping reference price with empty lot"),
                Err(e) => debug!(row = index + 1, "Skipping malformed reference price: {}", e),
            }
        }
        Ok(book)
    }

    /// Sets the unit price (copper) for an item.
    pub fn insert(&mut self, item: &str, unit_price: f64) {
        self.prices.insert(normalize(item), unit_price);
    }

    #[must_use]
    pub fn reference_price(&self, item: &str) -> Option<f64> {
        self.prices.get(&normalize(item)).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }

    /// Rates a trade of `quantity` units priced at `price_copper` in total.
    #[must_use]
    pub fn evaluate(&self, item: &str, price_copper: f64, quantity: f64) -> TradeEvaluation {
        let Some(reference) = self.reference_price(item) else {
            return TradeEvaluation::unknown();
        };
        if quantity <= 0.0 || reference == 0.0 || !price_copper.is_finite() {
            return TradeEvaluation::unknown();
        }

        let unit = price_copper / quantity;
        let delta = (unit - reference) / reference * 100.0;
        let rating = if delta <= -RATING_THRESHOLD_PCT {
            Rating::Good
        } else if delta >= RATING_THRESHOLD_PCT {
            Rating::Bad
        } else {
            Rating::Fair
        };

        TradeEvaluation {
            rating,
            delta_percent: delta,
            reference_unit_price: Some(reference),
            trade_unit_price: Some(unit),
        }
    }

    /// Rates a parsed record; records without item or price are `Unknown`.
    #[must_use]
    pub fn evaluate_record(&self, record: &TradeRecord) -> TradeEvaluation {
        match record.item_name() {
            Some(item) if record.has_price() => {
                self.evaluate(item, record.price_display, record.quantity.unwrap_or(1.0))
            }
            _ => TradeEvaluation::unknown(),
        }
    }
}

fn normalize(item: &str) -> String {
    item.trim().to_lowercase()
}
