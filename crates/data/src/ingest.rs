//! Line-delimited JSON ingestion.
//!
//! Walks a source tree for trade-chat logs and turns each JSON object line into a
//! [`TradeRecord`]. Bad lines are skipped; a bad line never aborts its file and a
//! bad file never aborts the run.

use crate::error::IngestError;
use crate::models::{Operation, TradeRecord, TradeTable};
use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound};
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use tradechat_core::currency;

const PROGRESS_EVERY: usize = 10_000;

const DATETIME_FORMATS: [&str; 3] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Keys accepted for each field, in lookup order. Earlier keys win when a line
/// carries several spellings of one field.
const TIMESTAMP_KEYS: &[&str] = &["timestamp"];
const DATE_KEYS: &[&str] = &["date"];
const PLAYER_KEYS: &[&str] = &["player"];
const OPERATION_KEYS: &[&str] = &["operation"];
const ITEM_KEYS: &[&str] = &["main_item", "item"];
const QUANTITY_KEYS: &[&str] = &["main_qty", "quantity"];
const QUALITY_KEYS: &[&str] = &["main_ql", "quality"];
const DAMAGE_KEYS: &[&str] = &["main_dmg", "damage"];
const WEIGHT_KEYS: &[&str] = &["main_wt", "weight"];
const PRICE_KEYS: &[&str] = &["price_s", "price"];
const RAW_TEXT_KEYS: &[&str] = &["raw_text", "raw", "message"];
const DESCRIPTION_KEYS: &[&str] = &["description"];

const ALL_KEYS: [&[&str]; 12] = [
    TIMESTAMP_KEYS,
    DATE_KEYS,
    PLAYER_KEYS,
    OPERATION_KEYS,
    ITEM_KEYS,
    QUANTITY_KEYS,
    QUALITY_KEYS,
    DAMAGE_KEYS,
    WEIGHT_KEYS,
    PRICE_KEYS,
    RAW_TEXT_KEYS,
    DESCRIPTION_KEYS,
];

/// One log line as written by the chat logger. Every field is optional and
/// loosely typed; normalization happens in [`RawLine::into_record`].
#[derive(Debug)]
struct RawLine(Map<String, Value>);

impl RawLine {
    /// First non-null value among `keys`.
    fn field(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter()
            .filter_map(|key| self.0.get(*key))
            .find(|value| !value.is_null())
    }

    fn is_blank(&self) -> bool {
        ALL_KEYS.iter().all(|keys| self.field(keys).is_none())
    }

    fn into_record(self) -> TradeRecord {
        let timestamp = self
            .field(TIMESTAMP_KEYS)
            .and_then(parse_timestamp)
            .map(|t| t.trunc_subsecs(6));
        let date = self
            .field(DATE_KEYS)
            .and_then(parse_date)
            .or_else(|| timestamp.map(|t| t.date()));
        let price_minor = self.field(PRICE_KEYS).map_or(0, currency::decode_value);

        TradeRecord {
            timestamp,
            date,
            player: self.field(PLAYER_KEYS).and_then(text),
            operation: self
                .field(OPERATION_KEYS)
                .and_then(text)
                .map_or(Operation::Unknown, |code| Operation::parse(&code)),
            item: self.field(ITEM_KEYS).and_then(text).map(Arc::from),
            quantity: self.field(QUANTITY_KEYS).and_then(numeric),
            quality: self.field(QUALITY_KEYS).and_then(numeric),
            damage: self.field(DAMAGE_KEYS).and_then(numeric),
            weight: self.field(WEIGHT_KEYS).and_then(numeric),
            price_minor,
            price_display: currency::to_copper(price_minor),
            raw_text: self.field(RAW_TEXT_KEYS).and_then(text),
            description: self.field(DESCRIPTION_KEYS).and_then(text),
        }
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn numeric(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn parse_timestamp_str(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_timestamp(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

fn parse_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
            .ok()
            .or_else(|| parse_timestamp_str(s).map(|t| t.date())),
        _ => None,
    }
}

/// Decodes one line of bytes, falling back to Latin-1 for legacy logs.
fn decode_line(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(line) => line,
        Err(e) => e.into_bytes().iter().map(|&b| char::from(b)).collect(),
    }
}

/// Parses a single log line.
///
/// Returns `None` for blank lines, lines that are not a JSON object, and objects
/// with no recognised field.
#[must_use]
pub fn parse_line(line: &str) -> Option<TradeRecord> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let Value::Object(fields) = serde_json::from_str::<Value>(line).ok()? else {
        return None;
    };
    let raw = RawLine(fields);
    if raw.is_blank() {
        return None;
    }
    Some(raw.into_record())
}

/// Per-file ingestion counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FileStats {
    pub lines: usize,
    pub records: usize,
    pub skipped: usize,
}

/// Reads trade logs from a directory tree into a [`TradeTable`].
#[derive(Debug, Clone)]
pub struct DataIngestor {
    extensions: Vec<String>,
    sample_limit: Option<usize>,
    excluded_prefix: Option<String>,
}

impl DataIngestor {
    /// Creates an ingestor for files with the given extensions (without dots).
    #[must_use]
    pub fn new<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            sample_limit: None,
            excluded_prefix: None,
        }
    }

    /// Stops reading each file after `limit` lines.
    #[must_use]
    pub fn with_sample_limit(mut self, limit: Option<usize>) -> Self {
        self.sample_limit = limit;
        self
    }

    /// Ignores files whose name starts with `prefix` (cache artifacts).
    #[must_use]
    pub fn excluding(mut self, prefix: impl Into<String>) -> Self {
        self.excluded_prefix = Some(prefix.into());
        self
    }

    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn accepts(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if let Some(prefix) = &self.excluded_prefix {
            if name.starts_with(prefix.as_str()) {
                return false;
            }
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .is_some_and(|ext| self.extensions.iter().any(|wanted| *wanted == ext))
    }

    /// Lists the data files under `source`, sorted by path.
    ///
    /// A `source` naming a file yields just that file when its extension matches.
    ///
    /// # Errors
    /// Returns an error if `source` does not exist or the root cannot be listed.
    pub fn discover(&self, source: &Path) -> Result<Vec<PathBuf>, IngestError> {
        if !source.exists() {
            return Err(IngestError::SourceNotFound {
                path: source.to_path_buf(),
            });
        }

        let mut files = Vec::new();
        if source.is_file() {
            if self.accepts(source) {
                files.push(source.to_path_buf());
            }
            return Ok(files);
        }

        let root = fs::read_dir(source).map_err(|e| IngestError::Scan {
            path: source.to_path_buf(),
            source: e,
        })?;
        self.walk(root, &mut files);
        files.sort();
        Ok(files)
    }

    fn walk(&self, entries: fs::ReadDir, files: &mut Vec<PathBuf>) {
        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if file_type.is_dir() {
                match fs::read_dir(&path) {
                    Ok(children) => self.walk(children, files),
                    Err(e) => warn!(path = %path.display(), "Skipping unreadable directory: {}", e),
                }
            } else if self.accepts(&path) {
                files.push(path);
            }
        }
    }

    /// Ingests every data file under `source`.
    ///
    /// # Errors
    /// Returns an error if `source` cannot be discovered. Unreadable files and
    /// malformed lines are logged and skipped.
    pub fn ingest(&self, source: &Path) -> Result<TradeTable, IngestError> {
        let files = self.discover(source)?;
        Ok(self.ingest_files(&files))
    }

    /// Ingests the given files in order.
    #[must_use]
    pub fn ingest_files(&self, files: &[PathBuf]) -> TradeTable {
        let mut records = Vec::new();
        let mut skipped = 0;

        for path in files {
            info!(path = %path.display(), "Reading trade log");
            match self.read_file(path, &mut records) {
                Ok(stats) => {
                    skipped += stats.skipped;
                    debug!(
                        path = %path.display(),
                        lines = stats.lines,
                        records = stats.records,
                        skipped = stats.skipped,
                        "Finished trade log"
                    );
                }
                Err(e) => warn!(path = %path.display(), "Failed to read trade log: {}", e),
            }
        }

        let table = TradeTable::new(records);
        info!(
            files = files.len(),
            records = table.len(),
            skipped,
            categorical = table.is_categorical(),
            "Ingestion complete"
        );
        table
    }

    /// Appends the records of one file to `records`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or read.
    pub fn read_file(
        &self,
        path: &Path,
        records: &mut Vec<TradeRecord>,
    ) -> std::io::Result<FileStats> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut stats = FileStats::default();
        let mut buf = Vec::new();

        loop {
            if self.sample_limit.is_some_and(|limit| stats.lines >= limit) {
                break;
            }
            buf.clear();
            if reader.read_until(b'\n', &mut buf)? == 0 {
                break;
            }
            stats.lines += 1;

            let line = decode_line(std::mem::take(&mut buf));
            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Some(record) => {
                    records.push(record);
                    stats.records += 1;
                }
                None => {
                    stats.skipped += 1;
                    debug!(path = %path.display(), line = stats.lines, "Skipping invalid line");
                }
            }

            if stats.lines % PROGRESS_EVERY == 0 {
                info!(path = %path.display(), lines = stats.lines, "Ingestion progress");
            }
        }

        Ok(stats)
    }
}
