//! Multi-unit currency codec.
//!
//! Prices are written in trade chat as a mix of gold, silver, copper and iron
//! (`"1g 50s"`, `"100c"`, `"250i"`). All arithmetic happens on an integer
//! amount of iron, the smallest unit:
//!
//! | unit   | suffix | iron      |
//! |--------|--------|-----------|
//! | gold   | `g`    | 1,000,000 |
//! | silver | `s`    | 10,000    |
//! | copper | `c`    | 100       |
//! | iron   | `i`    | 1         |
//!
//! Bare numbers carry no unit and are read as copper (see [`CODEC_VERSION`]).

use serde_json::Value;
use std::sync::OnceLock;

use regex::Regex;

/// Version of the encode/decode contract.
///
/// Version 1: bare numeric prices are copper and are scaled by 100 into iron,
/// rounded to the nearest iron. Anything persisted under another version must be
/// re-derived from source.
pub const CODEC_VERSION: u32 = 1;

pub const IRON_PER_GOLD: u64 = 1_000_000;
pub const IRON_PER_SILVER: u64 = 10_000;
pub const IRON_PER_COPPER: u64 = 100;

const ZERO_TOKEN: &str = "0i";

/// One denomination, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denomination {
    Gold,
    Silver,
    Copper,
    Iron,
}

impl Denomination {
    pub const ALL: [Denomination; 4] = [
        Denomination::Gold,
        Denomination::Silver,
        Denomination::Copper,
        Denomination::Iron,
    ];

    #[must_use]
    pub const fn suffix(self) -> char {
        match self {
            Denomination::Gold => 'g',
            Denomination::Silver => 's',
            Denomination::Copper => 'c',
            Denomination::Iron => 'i',
        }
    }

    /// Value of one unit in iron.
    #[must_use]
    pub const fn iron(self) -> u64 {
        match self {
            Denomination::Gold => IRON_PER_GOLD,
            Denomination::Silver => IRON_PER_SILVER,
            Denomination::Copper => IRON_PER_COPPER,
            Denomination::Iron => 1,
        }
    }
}

fn unit_patterns() -> &'static [(Denomination, Regex); 4] {
    static PATTERNS: OnceLock<[(Denomination, Regex); 4]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        Denomination::ALL.map(|unit| {
            let pattern = format!(r"(\d+){}", unit.suffix());
            (unit, Regex::new(&pattern).expect("unit pattern is a valid regex"))
        })
    })
}

/// Converts a bare copper amount into iron.
///
/// Negative, NaN and infinite amounts decode to zero.
#[must_use]
pub fn decode_number(copper: f64) -> u64 {
    if !copper.is_finite() || copper <= 0.0 {
        return 0;
    }
    let iron = (copper * IRON_PER_COPPER as f64).round();
    if iron >= u64::MAX as f64 {
        u64::MAX
    } else {
        iron as u64
    }
}

/// Decodes a price string into iron.
///
/// A string that parses as a plain number is treated like [`decode_number`].
/// Otherwise each unit suffix is extracted independently and the parts are summed;
/// unrecognised text contributes nothing.
#[must_use]
pub fn decode_str(value: &str) -> u64 {
    let text = value.trim().to_lowercase();
    if text.is_empty() || text == "nan" || text == "none" || text == "null" {
        return 0;
    }

    if let Ok(number) = text.parse::<f64>() {
        return decode_number(number);
    }

    unit_patterns()
        .iter()
        .filter_map(|(unit, pattern)| {
            let digits = pattern.captures(&text)?.get(1)?.as_str();
            // Digit runs only fail to parse when they exceed u64
            let count = digits.parse::<u64>().unwrap_or(u64::MAX);
            Some(count.saturating_mul(unit.iron()))
        })
        .fold(0u64, u64::saturating_add)
}

/// Decodes a raw JSON price field into iron.
#[must_use]
pub fn decode_value(value: &Value) -> u64 {
    match value {
        Value::Number(n) => n.as_f64().map_or(0, decode_number),
        Value::String(s) => decode_str(s),
        _ => 0,
    }
}

/// Formats an iron amount as `"1g 50s 25c 3i"`, omitting empty units.
#[must_use]
pub fn encode(iron: u64) -> String {
    if iron == 0 {
        return ZERO_TOKEN.to_string();
    }

    let mut remaining = iron;
    let mut parts = Vec::with_capacity(4);
    for unit in Denomination::ALL {
        let count = remaining / unit.iron();
        remaining %= unit.iron();
        if count > 0 {
            parts.push(format!("{count}{}", unit.suffix()));
        }
    }
    parts.join(" ")
}

/// Iron expressed in copper, the unit bare prices are quoted in.
#[must_use]
pub fn to_copper(iron: u64) -> f64 {
    iron as f64 / IRON_PER_COPPER as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_gold_and_silver() {
        assert_eq!(decode_str("1g 50s"), 1_500_000);
    }

    #[test]
    fn test_encode_gold_and_silver() {
        assert_eq!(encode(1_500_000), "1g 50s");
    }

    #[test]
    fn test_decode_single_units() {
        assert_eq!(decode_str("100c"), 10_000);
        assert_eq!(decode_str("250i"), 250);
        assert_eq!(decode_str("3s"), 30_000);
        assert_eq!(decode_str("2G"), 2_000_000);
    }

    #[test]
    fn test_decode_all_units_any_order() {
        assert_eq!(decode_str("5i 1g 2c 3s"), 1_030_205);
    }

    #[test]
    fn test_bare_numbers_are_copper() {
        assert_eq!(decode_str("15"), 1_500);
        assert_eq!(decode_str("1500.0"), 150_000);
        assert_eq!(decode_number(0.5), 50);
        assert_eq!(decode_value(&json!(50)), 5_000);
        assert_eq!(decode_value(&json!(1.15)), 115);
    }

    #[test]
    fn test_unparseable_degrades_to_zero() {
        assert_eq!(decode_str(""), 0);
        assert_eq!(decode_str("   "), 0);
        assert_eq!(decode_str("NaN"), 0);
        assert_eq!(decode_str("cheap!"), 0);
        assert_eq!(decode_number(f64::NAN), 0);
        assert_eq!(decode_number(-3.0), 0);
        assert_eq!(decode_value(&Value::Null), 0);
        assert_eq!(decode_value(&json!(true)), 0);
        assert_eq!(decode_value(&json!({"g": 1})), 0);
    }

    #[test]
    fn test_unrecognised_tokens_are_ignored() {
        assert_eq!(decode_str("about 2s each, pm me"), 20_000);
    }

    #[test]
    fn test_overflow_saturates() {
        assert_eq!(decode_str("99999999999999999999999g"), u64::MAX);
        assert_eq!(decode_str("99999999999999999999999i"), u64::MAX);
        assert_eq!(decode_str("18446744073710g"), u64::MAX);
    }

    #[test]
    fn test_encode_zero_token() {
        assert_eq!(encode(0), "0i");
    }

    #[test]
    fn test_encode_skips_empty_units() {
        assert_eq!(encode(1_000_003), "1g 3i");
        assert_eq!(encode(10_100), "1s 1c");
    }

    #[test]
    fn test_reencoding_preserves_value() {
        for input in ["1g 50s", "7s 3c 9i", "12c", "4i", "2g 0s 1c", "99s 99c 99i"] {
            let iron = decode_str(input);
            assert_eq!(decode_str(&encode(iron)), iron, "value drift for {input}");
        }
    }

    #[test]
    fn test_to_copper() {
        assert!((to_copper(1_500_000) - 15_000.0).abs() < f64::EPSILON);
    }
}
