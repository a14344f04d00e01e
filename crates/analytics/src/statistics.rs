//! Price statistics over a trade table.
//!
//! Time series are built from the daily mean of `price_display` (copper) over the
//! records of one item that carry a date and a positive price. Rolling windows are
//! trailing and count days with trades, not calendar days; a day is only reported
//! once its window is full.

use crate::error::AnalyticsError;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tradechat_data::{Operation, TradeTable};

/// Mean price of one item on one day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPrice {
    pub date: NaiveDate,
    pub price: f64,
}

/// A rolling statistic on a day whose window is full.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RollingPoint {
    pub date: NaiveDate,
    /// Daily mean price
    pub price: f64,
    /// Rolling standard deviation or mean, depending on the query
    pub value: f64,
}

/// Spread between the cheapest sell offer and the best buy offer of a day.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarginPoint {
    pub date: NaiveDate,
    pub min_sell: f64,
    pub max_buy: f64,
    pub spread: f64,
    /// Spread as a percentage of the buy price
    pub margin_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskPoint {
    pub date: NaiveDate,
    pub volatility: f64,
    pub moving_average: f64,
    /// Volatility divided by moving average
    pub risk_score: f64,
}

/// Positive-priced activity of one item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ItemSummary {
    /// Mean price in iron
    pub average_price: f64,
    pub transaction_count: usize,
}

/// Descriptive price statistics of one item, in copper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceStats {
    pub item: String,
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    /// Sample standard deviation; `None` for a single observation
    pub std: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemCount {
    pub item: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerActivity {
    pub player: String,
    pub total_trades: usize,
    pub operations: BTreeMap<Operation, usize>,
}

pub(crate) fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Sample standard deviation (n - 1); `None` below two values.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

pub(crate) fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / 2.0)
    } else {
        Some(sorted[mid])
    }
}

fn validate_window(window_days: usize) -> Result<(), AnalyticsError> {
    if window_days == 0 {
        return Err(AnalyticsError::InvalidWindow(window_days));
    }
    Ok(())
}

fn rolling<F>(daily: &[DailyPrice], window_days: usize, stat: F) -> Vec<RollingPoint>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let prices: Vec<f64> = daily.iter().map(|d| d.price).collect();
    if prices.len() < window_days {
        return Vec::new();
    }
    daily
        .iter()
        .enumerate()
        .skip(window_days - 1)
        .filter_map(|(i, day)| {
            let window = &prices[i + 1 - window_days..=i];
            stat(window).map(|value| RollingPoint {
                date: day.date,
                price: day.price,
                value,
            })
        })
        .collect()
}

/// Read-only analytics over a borrowed table.
#[derive(Debug, Clone, Copy)]
pub struct StatisticsEngine<'a> {
    table: &'a TradeTable,
}

impl<'a> StatisticsEngine<'a> {
    #[must_use]
    pub const fn new(table: &'a TradeTable) -> Self {
        Self { table }
    }

    #[must_use]
    pub const fn table(&self) -> &'a TradeTable {
        self.table
    }

    /// Rows whose item matches `query`.
    ///
    /// `exact` compares the whole name case-sensitively; otherwise `query` is a
    /// case-insensitive substring.
    #[must_use]
    pub fn filter_by_item(&self, query: &str, exact: bool) -> TradeTable {
        if exact {
            self.table.filter(|r| r.item_name() == Some(query))
        } else {
            let needle = query.to_lowercase();
            self.table.filter(|r| {
                r.item_name()
                    .is_some_and(|item| item.to_lowercase().contains(&needle))
            })
        }
    }

    #[must_use]
    pub fn filter_by_operation(&self, operation: Operation) -> TradeTable {
        self.table.filter(|r| r.operation == operation)
    }

    /// Rows dated within `start..=end`; undated rows are excluded.
    #[must_use]
    pub fn filter_by_date_range(&self, start: NaiveDate, end: NaiveDate) -> TradeTable {
        self.table
            .filter(|r| r.date.is_some_and(|d| d >= start && d <= end))
    }

    /// Chronological daily mean prices of the items matching `item`.
    #[must_use]
    pub fn daily_prices(&self, item: &str) -> Vec<DailyPrice> {
        let mut days: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for record in &self.filter_by_item(item, false) {
            if let (Some(date), true) = (record.date, record.has_price()) {
                let entry = days.entry(date).or_insert((0.0, 0));
                entry.0 += record.price_display;
                entry.1 += 1;
            }
        }
        days.into_iter()
            .map(|(date, (sum, n))| DailyPrice {
                date,
                price: sum / n as f64,
            })
            .collect()
    }

    /// Rolling sample standard deviation of the daily mean price.
    ///
    /// # Errors
    /// Returns [`AnalyticsError::InvalidWindow`] for a zero window.
    pub fn volatility(&self, item: &str, window_days: usize) -> Result<Vec<RollingPoint>, AnalyticsError> {
        validate_window(window_days)?;
        Ok(rolling(&self.daily_prices(item), window_days, sample_std))
    }

    /// Rolling mean of the daily mean price.
    ///
    /// # Errors
    /// Returns [`AnalyticsError::InvalidWindow`] for a zero window.
    pub fn moving_average(
        &self,
        item: &str,
        window_days: usize,
    ) -> Result<Vec<RollingPoint>, AnalyticsError> {
        validate_window(window_days)?;
        Ok(rolling(&self.daily_prices(item), window_days, mean))
    }

    /// Daily spread between the lowest sell offer and the highest buy offer.
    ///
    /// Days without both sides are omitted.
    #[must_use]
    pub fn profit_margin(&self, item: &str) -> Vec<MarginPoint> {
        let mut sides: BTreeMap<NaiveDate, (Option<f64>, Option<f64>)> = BTreeMap::new();
        for record in &self.filter_by_item(item, false) {
            let (Some(date), true) = (record.date, record.has_price()) else {
                continue;
            };
            let price = record.price_display;
            let entry = sides.entry(date).or_insert((None, None));
            match record.operation {
                Operation::SellOffer => {
                    entry.0 = Some(entry.0.map_or(price, |p: f64| p.min(price)));
                }
                Operation::BuyOffer => {
                    entry.1 = Some(entry.1.map_or(price, |p: f64| p.max(price)));
                }
                _ => {}
            }
        }

        sides
            .into_iter()
            .filter_map(|(date, sides)| match sides {
                (Some(min_sell), Some(max_buy)) => {
                    let spread = min_sell - max_buy;
                    Some(MarginPoint {
                        date,
                        min_sell,
                        max_buy,
                        spread,
                        margin_pct: spread / max_buy * 100.0,
                    })
                }
                _ => None,
            })
            .collect()
    }

    /// Volatility over moving average, joined on date.
    ///
    /// # Errors
    /// Returns [`AnalyticsError::InvalidWindow`] for a zero window.
    pub fn risk_trend(&self, item: &str, window_days: usize) -> Result<Vec<RiskPoint>, AnalyticsError> {
        let volatility = self.volatility(item, window_days)?;
        let averages: HashMap<NaiveDate, f64> = self
            .moving_average(item, window_days)?
            .into_iter()
            .map(|p| (p.date, p.value))
            .collect();

        Ok(volatility
            .into_iter()
            .filter_map(|v| {
                let moving_average = *averages.get(&v.date)?;
                (moving_average != 0.0).then(|| RiskPoint {
                    date: v.date,
                    volatility: v.value,
                    moving_average,
                    risk_score: v.value / moving_average,
                })
            })
            .collect())
    }

    /// Average price (iron) and count of positive-priced trades per item.
    #[must_use]
    pub fn market_summary(&self) -> BTreeMap<String, ItemSummary> {
        let mut totals: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
        for record in self.table.iter().filter(|r| r.has_price()) {
            let Some(item) = record.item_name() else {
                continue;
            };
            let entry = totals.entry(item).or_insert((0.0, 0));
            entry.0 += record.price_minor as f64;
            entry.1 += 1;
        }
        totals
            .into_iter()
            .map(|(item, (sum, count))| {
                (
                    item.to_string(),
                    ItemSummary {
                        average_price: sum / count as f64,
                        transaction_count: count,
                    },
                )
            })
            .collect()
    }

    /// Per-item price statistics, most traded first.
    ///
    /// With `item`, only items matching it as a substring are included.
    #[must_use]
    pub fn price_statistics(&self, item: Option<&str>) -> Vec<PriceStats> {
        let source = match item {
            Some(query) => self.filter_by_item(query, false),
            None => self.table.clone(),
        };

        let mut prices: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
        for record in source.iter().filter(|r| r.has_price()) {
            if let Some(name) = record.item_name() {
                prices.entry(name).or_default().push(record.price_display);
            }
        }

        let mut stats: Vec<PriceStats> = prices
            .into_iter()
            .filter_map(|(name, values)| {
                Some(PriceStats {
                    item: name.to_string(),
                    count: values.len(),
                    mean: mean(&values)?,
                    median: median(&values)?,
                    min: values.iter().copied().fold(f64::INFINITY, f64::min),
                    max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                    std: sample_std(&values),
                })
            })
            .collect();
        stats.sort_by(|a, b| b.count.cmp(&a.count));
        stats
    }

    /// The `n` most frequent items, optionally restricted to one operation.
    ///
    /// Ties are broken by item name.
    #[must_use]
    pub fn top_items(&self, n: usize, operation: Option<Operation>) -> Vec<ItemCount> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for record in self
            .table
            .iter()
            .filter(|r| operation.map_or(true, |op| r.operation == op))
        {
            if let Some(item) = record.item_name() {
                *counts.entry(item).or_default() += 1;
            }
        }

        let mut ranked: Vec<ItemCount> = counts
            .into_iter()
            .map(|(item, count)| ItemCount {
                item: item.to_string(),
                count,
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.item.cmp(&b.item)));
        ranked.truncate(n);
        ranked
    }

    /// Trade counts per player, busiest first.
    #[must_use]
    pub fn player_activity(&self, player: Option<&str>) -> Vec<PlayerActivity> {
        let mut activity: BTreeMap<&str, PlayerActivity> = BTreeMap::new();
        for record in self.table.iter() {
            let Some(name) = record.player.as_deref() else {
                continue;
            };
            if player.is_some_and(|wanted| wanted != name) {
                continue;
            }
            let entry = activity.entry(name).or_insert_with(|| PlayerActivity {
                player: name.to_string(),
                total_trades: 0,
                operations: BTreeMap::new(),
            });
            entry.total_trades += 1;
            *entry.operations.entry(record.operation).or_default() += 1;
        }

        let mut ranked: Vec<PlayerActivity> = activity.into_values().collect();
        ranked.sort_by(|a, b| b.total_trades.cmp(&a.total_trades));
        ranked
    }
}
