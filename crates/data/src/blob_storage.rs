//! Legacy JSON cache artifact.
//!
//! Used only when the Parquet artifact cannot be written. Loading it is
//! supported so an old cache remains usable until the next rebuild.

use crate::error::CacheError;
use crate::models::{TradeRecord, TradeTable};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use tradechat_core::currency::CODEC_VERSION;

#[derive(Debug, Serialize, Deserialize)]
struct CacheBlob {
    #[serde(default)]
    codec_version: Option<u32>,
    records: Vec<TradeRecord>,
}

/// Reads and writes the JSON cache blob.
pub struct BlobStorage;

impl BlobStorage {
    /// Serializes the table to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created or written.
    pub fn write_table(path: &Path, table: &TradeTable) -> Result<(), CacheError> {
        let blob = CacheBlob {
            codec_version: Some(CODEC_VERSION),
            records: table.records().to_vec(),
        };
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, &blob)?;
        writer.flush()?;
        Ok(())
    }

    /// Loads a table and the codec version it was written with.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or does not hold a cache blob.
    pub fn read_table(path: &Path) -> Result<(TradeTable, Option<u32>), CacheError> {
        let reader = BufReader::new(File::open(path)?);
        let blob: CacheBlob = serde_json::from_reader(reader)?;
        Ok((TradeTable::new(blob.records), blob.codec_version))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Operation;
    use tempfile::TempDir;

    #[test]
    fn test_blob_roundtrip_keeps_codec_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let table = TradeTable::new(vec![
            TradeRecord::new("rope", Operation::SellOffer, 5_000).with_player("Bob"),
        ]);

        BlobStorage::write_table(&path, &table).unwrap();
        let (loaded, version) = BlobStorage::read_table(&path).unwrap();

        assert_eq!(loaded, table);
        assert_eq!(version, Some(CODEC_VERSION));
    }

    #[test]
    fn test_blob_without_version_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, r#"{"records": []}"#).unwrap();

        let (loaded, version) = BlobStorage::read_table(&path).unwrap();

        assert!(loaded.is_empty());
        assert_eq!(version, None);
    }

    #[test]
    fn test_corrupt_blob_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            BlobStorage::read_table(&path),
            Err(CacheError::Json(_))
        ));
    }
}
