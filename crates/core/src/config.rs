use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub noise: NoiseConfig,
    #[serde(default)]
    pub statistics: StatisticsConfig,
    #[serde(default)]
    pub anomaly: AnomalyConfig,
}

/// Where trade logs are read from and where the parsed snapshot is cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Directory (or single file) holding line-delimited JSON trade logs
    pub source_dir: Option<PathBuf>,
    /// Directory the cache artifacts are written to
    pub cache_dir: PathBuf,
    /// File stem shared by the columnar and legacy cache artifacts
    pub cache_stem: String,
    /// Source file extensions considered for ingestion and staleness checks
    pub extensions: Vec<String>,
    /// Stop reading each file after this many lines
    pub sample_limit: Option<usize>,
    /// Optional `;`-delimited reference price table
    pub reference_prices: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseConfig {
    pub terms: Vec<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StatisticsConfig {
    pub window_days: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnomalyConfig {
    /// Number of most frequent items kept as distinct categories
    pub top_n: usize,
    /// Minimum positive-priced observations before an item is scored
    pub min_samples: usize,
    /// Number of most recent observations scored per item
    pub recent_k: usize,
    /// Absolute z-score above which an observation is reported
    pub z_threshold: f64,
}

/// Trade-channel boilerplate plus low-information item tokens.
pub const DEFAULT_NOISE_TERMS: &[&str] = &[
    "You can disable receiving these messages",
    "View the full Trade Chat Etiquette",
    "Please PM the person if you",
    "This is the Trade channel",
    "Only messages starting with WTB, WTS",
    "You can also use @<name> to",
    "common",
    "rare",
    "null",
    "fragment",
    "casket",
    "clay",
];

pub const DEFAULT_NOISE_COLUMNS: &[&str] = &["item", "raw_text", "description"];

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            source_dir: None,
            cache_dir: PathBuf::from("data"),
            cache_stem: "trade_data_cache".to_string(),
            extensions: ["txt", "json", "jsonl", "log"]
                .iter()
                .map(|e| (*e).to_string())
                .collect(),
            sample_limit: None,
            reference_prices: None,
        }
    }
}

impl Default for NoiseConfig {
    fn default() -> Self {
        Self {
            terms: DEFAULT_NOISE_TERMS.iter().map(|t| (*t).to_string()).collect(),
            columns: DEFAULT_NOISE_COLUMNS
                .iter()
                .map(|c| (*c).to_string())
                .collect(),
        }
    }
}

impl Default for StatisticsConfig {
    fn default() -> Self {
        Self { window_days: 7 }
    }
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            top_n: 50,
            min_samples: 5,
            recent_k: 3,
            z_threshold: 1.5,
        }
    }
}
