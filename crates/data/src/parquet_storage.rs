//! Columnar cache artifact.
//!
//! The trade table is stored as a single Parquet file with SNAPPY compression.
//! The currency codec version travels in the file's key-value metadata so that
//! artifacts written by an incompatible codec are detected on load.

use crate::error::CacheError;
use crate::models::{Operation, TradeRecord, TradeTable};
use arrow::array::{
    Array, ArrayRef, AsArray, Date32Array, Float64Array, StringArray, StringDictionaryBuilder,
    TimestampMicrosecondArray, UInt64Array,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Date32Type, Field, Float64Type, Int32Type, Schema, TimeUnit,
    TimestampMicrosecondType, UInt64Type,
};
use arrow::record_batch::RecordBatch;
use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::metadata::KeyValue;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use tradechat_core::currency::CODEC_VERSION;

/// Metadata key holding the currency codec version.
pub const CODEC_VERSION_KEY: &str = "tradechat.codec_version";

/// `num_days_from_ce` of 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// A table read back from Parquet together with the codec version it was written with.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredTable {
    pub table: TradeTable,
    pub codec_version: Option<u32>,
}

pub struct ParquetStorage;

impl ParquetStorage {
    fn schema(categorical: bool) -> Schema {
        let item_type = if categorical {
            DataType::Dictionary(Box::new(DataType::Int32), Box::new(DataType::Utf8))
        } else {
            DataType::Utf8
        };
        Schema::new(vec![
            Field::new(
                "timestamp",
                DataType::Timestamp(TimeUnit::Microsecond, None),
                true,
            ),
            Field::new("date", DataType::Date32, true),
            Field::new("player", DataType::Utf8, true),
            Field::new("operation", DataType::Utf8, false),
            Field::new("item", item_type, true),
            Field::new("quantity", DataType::Float64, true),
            Field::new("quality", DataType::Float64, true),
            Field::new("damage", DataType::Float64, true),
            Field::new("weight", DataType::Float64, true),
            Field::new("price_minor", DataType::UInt64, false),
            Field::new("price_display", DataType::Float64, false),
            Field::new("raw_text", DataType::Utf8, true),
            Field::new("description", DataType::Utf8, true),
        ])
    }

    fn item_array(table: &TradeTable) -> ArrayRef {
        if table.is_categorical() {
            let mut builder = StringDictionaryBuilder::<Int32Type>::new();
            for record in table {
                builder.append_option(record.item_name());
            }
            Arc::new(builder.finish())
        } else {
            Arc::new(StringArray::from(
                table.iter().map(TradeRecord::item_name).collect::<Vec<_>>(),
            ))
        }
    }

    fn float_array(table: &TradeTable, field: impl Fn(&TradeRecord) -> Option<f64>) -> ArrayRef {
        Arc::new(Float64Array::from(
            table.iter().map(field).collect::<Vec<_>>(),
        ))
    }

    /// Writes the table to a Parquet file at `path`, replacing any existing file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or if writing to the Parquet file fails.
    pub fn write_table(path: &Path, table: &TradeTable) -> Result<(), CacheError> {
        let schema = Arc::new(Self::schema(table.is_categorical()));

        // Ingestion truncates stamps to microseconds, so this is lossless
        let timestamps: Vec<Option<i64>> = table
            .iter()
            .map(|r| r.timestamp.map(|t| t.and_utc().timestamp_micros()))
            .collect();
        let dates: Vec<Option<i32>> = table
            .iter()
            .map(|r| r.date.map(|d| d.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE))
            .collect();
        let players: Vec<Option<&str>> = table.iter().map(|r| r.player.as_deref()).collect();
        let operations: Vec<&str> = table.iter().map(|r| r.operation.as_str()).collect();
        let raw_texts: Vec<Option<&str>> = table.iter().map(|r| r.raw_text.as_deref()).collect();
        let descriptions: Vec<Option<&str>> =
            table.iter().map(|r| r.description.as_deref()).collect();

        let batch = RecordBatch::try_new(
            schema.clone(),
            vec![
                Arc::new(TimestampMicrosecondArray::from(timestamps)) as ArrayRef,
                Arc::new(Date32Array::from(dates)) as ArrayRef,
                Arc::new(StringArray::from(players)) as ArrayRef,
                Arc::new(StringArray::from(operations)) as ArrayRef,
                Self::item_array(table),
                Self::float_array(table, |r| r.quantity),
                Self::float_array(table, |r| r.quality),
                Self::float_array(table, |r| r.damage),
                Self::float_array(table, |r| r.weight),
                Arc::new(UInt64Array::from(
                    table.iter().map(|r| r.price_minor).collect::<Vec<_>>(),
                )) as ArrayRef,
                Self::float_array(table, |r| Some(r.price_display)),
                Arc::new(StringArray::from(raw_texts)) as ArrayRef,
                Arc::new(StringArray::from(descriptions)) as ArrayRef,
            ],
        )?;

        let file = File::create(path)?;
        let props = WriterProperties::builder()
            .set_compression(parquet::basic::Compression::SNAPPY)
            .set_key_value_metadata(Some(vec![KeyValue::new(
                CODEC_VERSION_KEY.to_string(),
                CODEC_VERSION.to_string(),
            )]))
            .build();
        let mut writer = ArrowWriter::try_new(file, schema, Some(props))?;

        writer.write(&batch)?;
        writer.close()?;

        Ok(())
    }

    /// Reads a table previously written by [`ParquetStorage::write_table`].
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened, is not valid Parquet, or
    /// lacks one of the trade table columns.
    pub fn read_table(path: &Path) -> Result<StoredTable, CacheError> {
        let builder = ParquetRecordBatchReaderBuilder::try_new(File::open(path)?)?;

        let codec_version = builder
            .metadata()
            .file_metadata()
            .key_value_metadata()
            .and_then(|entries| entries.iter().find(|kv| kv.key == CODEC_VERSION_KEY))
            .and_then(|kv| kv.value.as_deref())
            .and_then(|v| v.trim().parse::<u32>().ok());

        let mut records = Vec::new();
        for batch in builder.build()? {
            Self::decode_batch(path, &batch?, &mut records)?;
        }

        Ok(StoredTable {
            table: TradeTable::new(records),
            codec_version,
        })
    }

    fn column<'a>(path: &Path, batch: &'a RecordBatch, name: &str) -> Result<&'a ArrayRef, CacheError> {
        batch
            .column_by_name(name)
            .ok_or_else(|| CacheError::invalid(path, format!("missing column '{name}'")))
    }

    fn strings(path: &Path, batch: &RecordBatch, name: &str) -> Result<StringArray, CacheError> {
        let utf8 = cast(Self::column(path, batch, name)?, &DataType::Utf8)?;
        utf8.as_string_opt::<i32>()
            .cloned()
            .ok_or_else(|| CacheError::invalid(path, format!("column '{name}' is not text")))
    }

    fn floats<'a>(path: &Path, batch: &'a RecordBatch, name: &str) -> Result<&'a Float64Array, CacheError> {
        Self::column(path, batch, name)?
            .as_primitive_opt::<Float64Type>()
            .ok_or_else(|| CacheError::invalid(path, format!("column '{name}' is not Float64")))
    }

    fn decode_batch(
        path: &Path,
        batch: &RecordBatch,
        records: &mut Vec<TradeRecord>,
    ) -> Result<(), CacheError> {
        let timestamps = Self::column(path, batch, "timestamp")?
            .as_primitive_opt::<TimestampMicrosecondType>()
            .ok_or_else(|| CacheError::invalid(path, "column 'timestamp' is not Timestamp(us)"))?;
        let dates = Self::column(path, batch, "date")?
            .as_primitive_opt::<Date32Type>()
            .ok_or_else(|| CacheError::invalid(path, "column 'date' is not Date32"))?;
        let players = Self::strings(path, batch, "player")?;
        let operations = Self::strings(path, batch, "operation")?;
        let items = Self::strings(path, batch, "item")?;
        let quantities = Self::floats(path, batch, "quantity")?;
        let qualities = Self::floats(path, batch, "quality")?;
        let damages = Self::floats(path, batch, "damage")?;
        let weights = Self::floats(path, batch, "weight")?;
        let prices = Self::column(path, batch, "price_minor")?
            .as_primitive_opt::<UInt64Type>()
            .ok_or_else(|| CacheError::invalid(path, "column 'price_minor' is not UInt64"))?;
        let displays = Self::floats(path, batch, "price_display")?;
        let raw_texts = Self::strings(path, batch, "raw_text")?;
        let descriptions = Self::strings(path, batch, "description")?;

        for row in 0..batch.num_rows() {
            records.push(TradeRecord {
                timestamp: opt_value(timestamps, row).and_then(micros_to_datetime),
                date: opt_value(dates, row).and_then(days_to_date),
                player: opt_str(&players, row).map(str::to_string),
                operation: opt_str(&operations, row).map_or(Operation::Unknown, Operation::parse),
                item: opt_str(&items, row).map(Arc::from),
                quantity: opt_value(quantities, row),
                quality: opt_value(qualities, row),
                damage: opt_value(damages, row),
                weight: opt_value(weights, row),
                price_minor: opt_value(prices, row).unwrap_or(0),
                price_display: opt_value(displays, row).unwrap_or(0.0),
                raw_text: opt_str(&raw_texts, row).map(str::to_string),
                description: opt_str(&descriptions, row).map(str::to_string),
            });
        }
        Ok(())
    }
}

fn opt_value<T: arrow::datatypes::ArrowPrimitiveType>(
    array: &arrow::array::PrimitiveArray<T>,
    row: usize,
) -> Option<T::Native> {
    array.is_valid(row).then(|| array.value(row))
}

fn opt_str(array: &StringArray, row: usize) -> Option<&str> {
    array.is_valid(row).then(|| array.value(row))
}

fn micros_to_datetime(micros: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_micros(micros).map(|dt| dt.naive_utc())
}

fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(UNIX_EPOCH_DAYS_FROM_CE)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_table(items: &[&str]) -> TradeTable {
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_milli_opt(10, 30, 0, 250)
            .unwrap();
        TradeTable::new(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| {
                    let mut record = TradeRecord::new(item, Operation::SellOffer, 1_500_000)
                        .at(ts)
                        .with_player("Alice");
                    record.quality = Some(40.0 + i as f64);
                    record
                })
                .collect(),
        )
    }

    #[test]
    fn test_write_and_read_plain_table() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.parquet");
        let table = sample_table(&["rope", "nail", "log"]);

        ParquetStorage::write_table(&path, &table).unwrap();
        let stored = ParquetStorage::read_table(&path).unwrap();

        assert_eq!(stored.codec_version, Some(CODEC_VERSION));
        assert_eq!(stored.table, table);
    }

    #[test]
    fn test_sub_millisecond_timestamps_survive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.parquet");
        let ts = NaiveDate::from_ymd_opt(2025, 1, 1)
            .unwrap()
            .and_hms_micro_opt(10, 0, 0, 123_456)
            .unwrap();
        let table = TradeTable::new(vec![TradeRecord::new("rope", Operation::SellOffer, 100)
            .at(ts)
            .with_description("braided hemp")]);

        ParquetStorage::write_table(&path, &table).unwrap();
        let stored = ParquetStorage::read_table(&path).unwrap();

        assert_eq!(stored.table.records()[0].timestamp, Some(ts));
        assert_eq!(stored.table, table);
    }

    #[test]
    fn test_categorical_items_survive_dictionary_encoding() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.parquet");
        let table = sample_table(&["rope", "rope", "rope", "rope", "nail"]);
        assert!(table.is_categorical());

        ParquetStorage::write_table(&path, &table).unwrap();
        let stored = ParquetStorage::read_table(&path).unwrap();

        assert!(stored.table.is_categorical());
        let items: Vec<_> = stored.table.iter().filter_map(TradeRecord::item_name).collect();
        assert_eq!(items, vec!["rope", "rope", "rope", "rope", "nail"]);
    }

    #[test]
    fn test_nulls_are_preserved() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.parquet");
        let mut bare = TradeRecord::new("rope", Operation::Unknown, 0);
        bare.item = None;
        let table = TradeTable::new(vec![bare]);

        ParquetStorage::write_table(&path, &table).unwrap();
        let record = ParquetStorage::read_table(&path).unwrap().table.records()[0].clone();

        assert!(record.item.is_none());
        assert!(record.timestamp.is_none());
        assert!(record.date.is_none());
        assert!(record.quality.is_none());
        assert_eq!(record.operation, Operation::Unknown);
    }

    #[test]
    fn test_empty_table_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.parquet");

        ParquetStorage::write_table(&path, &TradeTable::empty()).unwrap();
        let stored = ParquetStorage::read_table(&path).unwrap();

        assert!(stored.table.is_empty());
    }

    #[test]
    fn test_garbage_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.parquet");
        std::fs::write(&path, b"definitely not parquet").unwrap();

        assert!(ParquetStorage::read_table(&path).is_err());
    }
}
