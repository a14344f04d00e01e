//! Staleness-aware cache of the ingested trade table.
//!
//! The snapshot's own modification time is the freshness token: it is reused only
//! while it is newer than every source file. Artifacts are written to a temporary
//! path and renamed into place, so a failed write leaves the previous snapshot intact.
//!
//! No cross-process locking is attempted. Two processes rebuilding the same cache
//! race, and the last rename wins.

use crate::blob_storage::BlobStorage;
use crate::error::CacheError;
use crate::ingest::DataIngestor;
use crate::models::TradeTable;
use crate::parquet_storage::ParquetStorage;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};
use tradechat_core::config::DataConfig;
use tradechat_core::currency::CODEC_VERSION;

/// Where the cache lives and which source files it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    /// File stem shared by both artifacts; source files starting with it are ignored
    pub stem: String,
    pub extensions: Vec<String>,
    pub sample_limit: Option<usize>,
}

impl CacheConfig {
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>, stem: impl Into<String>) -> Self {
        let defaults = DataConfig::default();
        Self {
            cache_dir: cache_dir.into(),
            stem: stem.into(),
            extensions: defaults.extensions,
            sample_limit: None,
        }
    }
}

impl From<&DataConfig> for CacheConfig {
    fn from(config: &DataConfig) -> Self {
        Self {
            cache_dir: config.cache_dir.clone(),
            stem: config.cache_stem.clone(),
            extensions: config.extensions.clone(),
            sample_limit: config.sample_limit,
        }
    }
}

/// How a table was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOrigin {
    /// Read from a fresh snapshot
    Cached,
    /// Ingested from the source files
    Rebuilt,
}

/// Which artifact a rebuild was persisted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    Parquet,
    Blob,
    /// Both writes failed; the table is only in memory
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheLoad {
    pub table: TradeTable,
    pub origin: LoadOrigin,
}

/// Decides whether the persisted snapshot is still valid and rebuilds it otherwise.
#[derive(Debug, Clone)]
pub struct CacheManager {
    config: CacheConfig,
    ingestor: DataIngestor,
}

impl CacheManager {
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        let ingestor = DataIngestor::new(&config.extensions)
            .with_sample_limit(config.sample_limit)
            .excluding(config.stem.clone());
        Self { config, ingestor }
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    #[must_use]
    pub fn parquet_path(&self) -> PathBuf {
        self.config
            .cache_dir
            .join(format!("{}.parquet", self.config.stem))
    }

    #[must_use]
    pub fn blob_path(&self) -> PathBuf {
        self.config.cache_dir.join(format!("{}.json", self.config.stem))
    }

    /// Latest modification time among the source files, `None` when there are none.
    ///
    /// # Errors
    /// Returns an error if `source` does not exist.
    pub fn latest_source_mtime(&self, source: &Path) -> Result<Option<SystemTime>, CacheError> {
        let files = self.ingestor.discover(source)?;
        Ok(latest_mtime(&files))
    }

    /// Returns the cached table, rebuilding it first when it is missing or stale.
    ///
    /// # Errors
    /// Returns [`CacheError::NoDataFiles`] when a rebuild is needed but `source`
    /// holds no data file, or an ingest error when `source` does not exist.
    pub fn load_or_build(&self, source: &Path, force_rebuild: bool) -> Result<TradeTable, CacheError> {
        self.load(source, force_rebuild).map(|load| load.table)
    }

    /// Like [`CacheManager::load_or_build`], also reporting whether the snapshot was reused.
    ///
    /// # Errors
    /// See [`CacheManager::load_or_build`].
    pub fn load(&self, source: &Path, force_rebuild: bool) -> Result<CacheLoad, CacheError> {
        let files = self.ingestor.discover(source)?;

        if force_rebuild {
            info!(source = %source.display(), "Forced cache rebuild");
        } else if let Some(table) = self.try_reuse(&files) {
            return Ok(CacheLoad {
                table,
                origin: LoadOrigin::Cached,
            });
        }

        let table = self.rebuild_files(source, &files)?;
        Ok(CacheLoad {
            table,
            origin: LoadOrigin::Rebuilt,
        })
    }

    /// Ingests `source` and persists the result unconditionally.
    ///
    /// # Errors
    /// See [`CacheManager::load_or_build`].
    pub fn rebuild(&self, source: &Path) -> Result<TradeTable, CacheError> {
        let files = self.ingestor.discover(source)?;
        self.rebuild_files(source, &files)
    }

    /// The most recently written artifact. Parquet wins a tie.
    fn existing_artifact(&self) -> Option<(PathBuf, ArtifactFormat)> {
        [
            (self.parquet_path(), ArtifactFormat::Parquet),
            (self.blob_path(), ArtifactFormat::Blob),
        ]
        .into_iter()
        .filter(|(path, _)| path.is_file())
        .map(|(path, format)| {
            let mtime = fs::metadata(&path).and_then(|m| m.modified()).ok();
            (mtime, path, format)
        })
        .reduce(|newest, next| if next.0 > newest.0 { next } else { newest })
        .map(|(_, path, format)| (path, format))
    }

    fn try_reuse(&self, files: &[PathBuf]) -> Option<TradeTable> {
        let Some((path, format)) = self.existing_artifact() else {
            info!(cache = %self.parquet_path().display(), "No cache snapshot, building");
            return None;
        };

        let cache_mtime = match fs::metadata(&path).and_then(|m| m.modified()) {
            Ok(mtime) => mtime,
            Err(e) => {
                warn!(cache = %path.display(), "Cannot stat cache snapshot: {}", e);
                return None;
            }
        };
        if let Some(latest) = latest_mtime(files) {
            if cache_mtime <= latest {
                info!(cache = %path.display(), "Cache snapshot is stale, rebuilding");
                return None;
            }
        }

        let loaded = match format {
            ArtifactFormat::Parquet => {
                ParquetStorage::read_table(&path).map(|stored| (stored.table, stored.codec_version))
            }
            ArtifactFormat::Blob | ArtifactFormat::None => BlobStorage::read_table(&path),
        };
        match loaded {
            Ok((table, Some(version))) if version == CODEC_VERSION => {
                info!(cache = %path.display(), records = table.len(), "Loaded cache snapshot");
                Some(table)
            }
            Ok((_, version)) => {
                info!(
                    cache = %path.display(),
                    found = ?version,
                    expected = CODEC_VERSION,
                    "Cache written by another currency codec, rebuilding"
                );
                None
            }
            Err(e) => {
                warn!(cache = %path.display(), "Unreadable cache snapshot, rebuilding: {}", e);
                None
            }
        }
    }

    fn rebuild_files(&self, source: &Path, files: &[PathBuf]) -> Result<TradeTable, CacheError> {
        if files.is_empty() {
            return Err(CacheError::NoDataFiles {
                dir: source.to_path_buf(),
                extensions: self.config.extensions.clone(),
            });
        }

        let table = self.ingestor.ingest_files(files);
        let format = self.persist(&table);
        info!(
            records = table.len(),
            files = files.len(),
            format = ?format,
            "Cache rebuilt"
        );
        Ok(table)
    }

    /// Writes the table, preferring Parquet and falling back to the JSON blob.
    pub fn persist(&self, table: &TradeTable) -> ArtifactFormat {
        if let Err(e) = fs::create_dir_all(&self.config.cache_dir) {
            warn!(dir = %self.config.cache_dir.display(), "Cannot create cache directory: {}", e);
            return ArtifactFormat::None;
        }

        let parquet = self.parquet_path();
        match write_atomic(&parquet, |tmp| ParquetStorage::write_table(tmp, table)) {
            Ok(()) => {
                let blob = self.blob_path();
                if blob.exists() {
                    if let Err(e) = fs::remove_file(&blob) {
                        warn!(path = %blob.display(), "Failed to remove obsolete blob cache: {}", e);
                    }
                }
                return ArtifactFormat::Parquet;
            }
            Err(e) => warn!(
                path = %parquet.display(),
                "Parquet cache write failed, falling back to blob: {}", e
            ),
        }

        let blob = self.blob_path();
        match write_atomic(&blob, |tmp| BlobStorage::write_table(tmp, table)) {
            Ok(()) => ArtifactFormat::Blob,
            Err(e) => {
                warn!(path = %blob.display(), "Blob cache write failed, cache not persisted: {}", e);
                ArtifactFormat::None
            }
        }
    }
}

fn latest_mtime(files: &[PathBuf]) -> Option<SystemTime> {
    files
        .iter()
        .filter_map(|p| fs::metadata(p).and_then(|m| m.modified()).ok())
        .max()
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn write_atomic<F>(path: &Path, write: F) -> Result<(), CacheError>
where
    F: FnOnce(&Path) -> Result<(), CacheError>,
{
    let tmp = tmp_path(path);
    if let Err(e) = write(&tmp) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    Ok(())
}
