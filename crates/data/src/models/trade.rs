//! Trade-chat record model.
//!
//! One [`TradeRecord`] per ingested log line. Records are immutable once built.

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tradechat_core::currency;

/// Kind of trade-chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Operation {
    /// Want to sell (WTS)
    SellOffer,
    /// Want to buy (WTB)
    BuyOffer,
    /// Want to trade (WTT)
    TradeOffer,
    /// Price check (PC)
    PriceCheck,
    Unknown,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::SellOffer,
        Operation::BuyOffer,
        Operation::TradeOffer,
        Operation::PriceCheck,
        Operation::Unknown,
    ];

    /// Parses the chat code (`WTS`, `WTB`, `WTT`, `PC`) or its long form.
    #[must_use]
    pub fn parse(code: &str) -> Self {
        match code.trim().to_ascii_uppercase().as_str() {
            "WTS" | "SELL" => Operation::SellOffer,
            "WTB" | "BUY" => Operation::BuyOffer,
            "WTT" | "TRADE" => Operation::TradeOffer,
            "PC" | "PRICE_CHECK" | "PRICE-CHECK" => Operation::PriceCheck,
            _ => Operation::Unknown,
        }
    }

    /// Returns the chat code used in logs and cache artifacts.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Operation::SellOffer => "WTS",
            Operation::BuyOffer => "WTB",
            Operation::TradeOffer => "WTT",
            Operation::PriceCheck => "PC",
            Operation::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A single parsed trade-chat line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// When the message was posted
    pub timestamp: Option<NaiveDateTime>,
    /// Calendar day of the message
    pub date: Option<NaiveDate>,
    /// Posting player
    pub player: Option<String>,
    pub operation: Operation,
    /// Traded item; shared between rows when the table is categorical
    pub item: Option<Arc<str>>,
    pub quantity: Option<f64>,
    pub quality: Option<f64>,
    pub damage: Option<f64>,
    pub weight: Option<f64>,
    /// Price in iron, the smallest currency unit (0 when no price was given)
    pub price_minor: u64,
    /// Price in copper, kept for consumers that expect the mid-tier unit
    pub price_display: f64,
    /// Original log line
    pub raw_text: Option<String>,
    /// Free-text item description
    #[serde(default)]
    pub description: Option<String>,
}

impl TradeRecord {
    /// Creates a record with only an item, operation and price set.
    #[must_use]
    pub fn new(item: &str, operation: Operation, price_minor: u64) -> Self {
        Self {
            timestamp: None,
            date: None,
            player: None,
            operation,
            item: Some(Arc::from(item)),
            quantity: None,
            quality: None,
            damage: None,
            weight: None,
            price_minor,
            price_display: currency::to_copper(price_minor),
            raw_text: None,
            description: None,
        }
    }

    /// Sets the timestamp and derives the date from it.
    #[must_use]
    pub fn at(mut self, timestamp: NaiveDateTime) -> Self {
        self.timestamp = Some(timestamp);
        self.date = Some(timestamp.date());
        self
    }

    #[must_use]
    pub fn on(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    #[must_use]
    pub fn with_player(mut self, player: impl Into<String>) -> Self {
        self.player = Some(player.into());
        self
    }

    #[must_use]
    pub fn with_raw_text(mut self, raw_text: impl Into<String>) -> Self {
        self.raw_text = Some(raw_text.into());
        self
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Returns the item name, if any.
    #[must_use]
    pub fn item_name(&self) -> Option<&str> {
        self.item.as_deref()
    }

    /// Returns true if a price could be decoded for this record.
    #[must_use]
    pub const fn has_price(&self) -> bool {
        self.price_minor > 0
    }

    /// Looks up a text-bearing column by name.
    ///
    /// Returns `None` for unknown columns and for null values.
    #[must_use]
    pub fn text_field(&self, column: &str) -> Option<&str> {
        match column {
            "item" => self.item_name(),
            "player" => self.player.as_deref(),
            "raw_text" => self.raw_text.as_deref(),
            "description" => self.description.as_deref(),
            "operation" => Some(self.operation.as_str()),
            _ => None,
        }
    }

    /// Human-readable price (`"1g 50s"`).
    #[must_use]
    pub fn price_text(&self) -> String {
        currency::encode(self.price_minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_parse_codes() {
        assert_eq!(Operation::parse("WTS"), Operation::SellOffer);
        assert_eq!(Operation::parse("wtb"), Operation::BuyOffer);
        assert_eq!(Operation::parse(" WTT "), Operation::TradeOffer);
        assert_eq!(Operation::parse("PC"), Operation::PriceCheck);
        assert_eq!(Operation::parse("price-check"), Operation::PriceCheck);
        assert_eq!(Operation::parse("HELLO"), Operation::Unknown);
    }

    #[test]
    fn test_operation_roundtrip_through_code() {
        for op in Operation::ALL {
            assert_eq!(Operation::parse(op.as_str()), op);
        }
    }

    #[test]
    fn test_new_record_derives_display_price() {
        let record = TradeRecord::new("iron lump", Operation::SellOffer, 1_500_000);

        assert_eq!(record.item_name(), Some("iron lump"));
        assert!((record.price_display - 15_000.0).abs() < f64::EPSILON);
        assert_eq!(record.price_text(), "1g 50s");
        assert!(record.has_price());
    }

    #[test]
    fn test_text_field_lookup() {
        let record = TradeRecord::new("rope", Operation::BuyOffer, 0)
            .with_player("Alice")
            .with_raw_text("WTB rope");

        assert_eq!(record.text_field("item"), Some("rope"));
        assert_eq!(record.text_field("player"), Some("Alice"));
        assert_eq!(record.text_field("raw_text"), Some("WTB rope"));
        assert_eq!(record.text_field("operation"), Some("WTB"));
        assert_eq!(record.text_field("description"), None);
        assert!(!record.has_price());

        let described = record.with_description("braided hemp");
        assert_eq!(described.text_field("description"), Some("braided hemp"));
    }
}
