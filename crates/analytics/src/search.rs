//! Free-text search over chat lines.
//!
//! A record's searchable text is its item name and its original log line. A
//! record matches when every required term (or the exact phrase) occurs in that
//! text and no excluded term does.

use serde::{Deserialize, Serialize};
use tradechat_data::{TradeRecord, TradeTable};

/// Columns scanned by a search, in haystack order.
pub const SEARCH_COLUMNS: [&str; 2] = ["item", "raw_text"];

/// A search request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Text whose whitespace-separated terms must all occur
    pub must: String,
    /// Text whose whitespace-separated terms must not occur
    pub exclude: String,
    /// Match `must` as one phrase instead of independent terms
    pub exact: bool,
    pub case_sensitive: bool,
}

impl SearchQuery {
    /// Requires every term of `must`.
    #[must_use]
    pub fn new(must: impl Into<String>) -> Self {
        Self {
            must: must.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn excluding(mut self, exclude: impl Into<String>) -> Self {
        self.exclude = exclude.into();
        self
    }

    #[must_use]
    pub fn exact(mut self, exact: bool) -> Self {
        self.exact = exact;
        self
    }

    #[must_use]
    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// Returns the query compiled against the current flags.
    #[must_use]
    pub fn matcher(&self) -> Matcher {
        let fold = |text: &str| {
            if self.case_sensitive {
                text.to_string()
            } else {
                text.to_lowercase()
            }
        };
        let required = if self.exact {
            let phrase = self.must.trim();
            if phrase.is_empty() {
                Vec::new()
            } else {
                vec![fold(phrase)]
            }
        } else {
            self.must.split_whitespace().map(fold).collect()
        };

        Matcher {
            required,
            excluded: self.exclude.split_whitespace().map(fold).collect(),
            case_sensitive: self.case_sensitive,
        }
    }
}

/// A [`SearchQuery`] with its terms normalized once.
#[derive(Debug, Clone)]
pub struct Matcher {
    required: Vec<String>,
    excluded: Vec<String>,
    case_sensitive: bool,
}

impl Matcher {
    fn haystack(&self, record: &TradeRecord) -> String {
        let text = SEARCH_COLUMNS
            .iter()
            .filter_map(|column| record.text_field(column))
            .collect::<Vec<_>>()
            .join("\n");
        if self.case_sensitive {
            text
        } else {
            text.to_lowercase()
        }
    }

    #[must_use]
    pub fn matches(&self, record: &TradeRecord) -> bool {
        let hay = self.haystack(record);
        self.required.iter().all(|term| hay.contains(term.as_str()))
            && !self.excluded.iter().any(|term| hay.contains(term.as_str()))
    }
}

/// Case-insensitive phrase search. A blank query matches nothing.
#[must_use]
pub fn simple_search(table: &TradeTable, text: &str) -> TradeTable {
    if text.trim().is_empty() {
        return TradeTable::empty();
    }
    advanced_search(table, &SearchQuery::new(text).exact(true))
}

/// Records matching `query`. A query with no required terms keeps every record
/// that holds none of the excluded terms.
#[must_use]
pub fn advanced_search(table: &TradeTable, query: &SearchQuery) -> TradeTable {
    let matcher = query.matcher();
    table.filter(|record| matcher.matches(record))
}
