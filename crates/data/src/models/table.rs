//! In-memory trade table.

use super::trade::TradeRecord;
use std::collections::HashSet;
use std::sync::Arc;

/// Items are interned when fewer than this share of rows carry a distinct item.
pub const CATEGORICAL_RATIO: f64 = 0.5;

/// Column names of the trade table, in artifact order.
pub const COLUMNS: [&str; 13] = [
    "timestamp",
    "date",
    "player",
    "operation",
    "item",
    "quantity",
    "quality",
    "damage",
    "weight",
    "price_minor",
    "price_display",
    "raw_text",
    "description",
];

/// An ordered, immutable collection of trade records.
///
/// Views such as filtered or cleaned tables are new tables; records are never
/// changed in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TradeTable {
    records: Vec<TradeRecord>,
    categorical: bool,
}

impl TradeTable {
    /// Builds a table, interning item names when their cardinality is low.
    #[must_use]
    pub fn new(mut records: Vec<TradeRecord>) -> Self {
        let categorical = Self::should_intern(&records);
        if categorical {
            let mut pool: HashSet<Arc<str>> = HashSet::new();
            for record in &mut records {
                if let Some(item) = record.item.take() {
                    let shared = match pool.get(item.as_ref()) {
                        Some(existing) => Arc::clone(existing),
                        None => {
                            pool.insert(Arc::clone(&item));
                            item
                        }
                    };
                    record.item = Some(shared);
                }
            }
        }
        Self {
            records,
            categorical,
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    fn should_intern(records: &[TradeRecord]) -> bool {
        let with_item = records.iter().filter(|r| r.item.is_some()).count();
        if with_item == 0 {
            return false;
        }
        let distinct: HashSet<&str> = records.iter().filter_map(TradeRecord::item_name).collect();
        (distinct.len() as f64 / with_item as f64) < CATEGORICAL_RATIO
    }

    #[must_use]
    pub fn records(&self) -> &[TradeRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TradeRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<TradeRecord> {
        self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns true if item names are stored as shared categories.
    #[must_use]
    pub const fn is_categorical(&self) -> bool {
        self.categorical
    }

    #[must_use]
    pub fn distinct_items(&self) -> usize {
        self.records
            .iter()
            .filter_map(TradeRecord::item_name)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Returns true if the column exists and holds at least one value.
    ///
    /// `operation`, `price_minor` and `price_display` always exist.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        match column {
            "operation" | "price_minor" | "price_display" => true,
            "timestamp" => self.records.iter().any(|r| r.timestamp.is_some()),
            "date" => self.records.iter().any(|r| r.date.is_some()),
            "player" => self.records.iter().any(|r| r.player.is_some()),
            "item" => self.records.iter().any(|r| r.item.is_some()),
            "quantity" => self.records.iter().any(|r| r.quantity.is_some()),
            "quality" => self.records.iter().any(|r| r.quality.is_some()),
            "damage" => self.records.iter().any(|r| r.damage.is_some()),
            "weight" => self.records.iter().any(|r| r.weight.is_some()),
            "raw_text" => self.records.iter().any(|r| r.raw_text.is_some()),
            "description" => self.records.iter().any(|r| r.description.is_some()),
            _ => false,
        }
    }

    /// Returns a new table holding the records that satisfy `predicate`.
    #[must_use]
    pub fn filter<F>(&self, predicate: F) -> TradeTable
    where
        F: Fn(&TradeRecord) -> bool,
    {
        TradeTable {
            records: self
                .records
                .iter()
                .filter(|r| predicate(r))
                .cloned()
                .collect(),
            categorical: self.categorical,
        }
    }
}

impl<'a> IntoIterator for &'a TradeTable {
    type Item = &'a TradeRecord;
    type IntoIter = std::slice::Iter<'a, TradeRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
