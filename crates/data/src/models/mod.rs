//! Data models for trade-chat analytics.
//!
//! Prices are integer amounts of the smallest currency unit; see
//! [`tradechat_core::currency`].

pub mod table;
pub mod trade;

pub use table::{TradeTable, CATEGORICAL_RATIO, COLUMNS};
pub use trade::{Operation, TradeRecord};
