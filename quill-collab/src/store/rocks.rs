//! RocksDB-backed version log and checkpoint store.
//!
//! Column families:
//! - `versions`    — one record per committed operation, keyed by
//!                   `doc_id (16 bytes) || index (8 bytes big-endian)` so a
//!                   forward scan over a document prefix is index order
//! - `checkpoints` — sparse snapshots, same key shape, content LZ4
//!                   compressed at rest
//!
//! The conditional append is serialized through an internal write mutex:
//! the last-index check and the batch write happen under one critical
//! section, and the batch itself is a single atomic `WriteBatch`. Readers
//! never take the mutex.
//!
//! Performance targets:
//! - Conditional append (1 op): <100μs (one reverse seek + batch write)
//! - Tail replay (50 entries): <1ms
//! - Latest checkpoint load (1MB): <2ms including LZ4 decompression
//!
//! Reference: Kleppmann — DDIA, Chapter 3 (Log-Structured Storage)

use rocksdb::{
    BlockBasedOptions, Cache, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode,
    Direction, IteratorMode, Options, SingleThreaded, WriteBatch, WriteOptions,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use uuid::Uuid;

use quill_core::FormatVersion;

use super::{
    unix_now, AppendOutcome, Checkpoint, CheckpointStore, CreateOutcome, StoreError, VersionEntry,
    VersionLog, NO_VERSION,
};

const CF_VERSIONS: &str = "versions";
const CF_CHECKPOINTS: &str = "checkpoints";

const COLUMN_FAMILIES: &[&str] = &[CF_VERSIONS, CF_CHECKPOINTS];

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Database directory path
    pub path: PathBuf,
    /// Block cache size in bytes (default: 128MB)
    pub block_cache_size: usize,
    /// Bloom filter bits per key (default: 10)
    pub bloom_filter_bits: i32,
    /// Enable fsync on every write (default: false)
    pub sync_writes: bool,
    /// Max open files for RocksDB (default: 512)
    pub max_open_files: i32,
    /// Write buffer size per column family (default: 32MB)
    pub write_buffer_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("quill_data"),
            block_cache_size: 128 * 1024 * 1024,
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 512,
            write_buffer_size: 32 * 1024 * 1024,
        }
    }
}

impl StoreConfig {
    /// Create config for testing (small caches, temp directory).
    pub fn for_testing(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            block_cache_size: 8 * 1024 * 1024,
            bloom_filter_bits: 10,
            sync_writes: false,
            max_open_files: 64,
            write_buffer_size: 4 * 1024 * 1024,
        }
    }
}

/// Persistent version log + checkpoint store.
pub struct RocksStore {
    /// RocksDB instance (single-threaded mode — concurrency via the trait
    /// callers; writes funnel through `append_lock`)
    db: DBWithThreadMode<SingleThreaded>,
    config: StoreConfig,
    /// Guards the check-then-write window of conditional operations.
    append_lock: Mutex<()>,
}

impl RocksStore {
    /// Open the store at the configured path, creating the database and
    /// column families if they don't exist.
    pub fn open(config: StoreConfig) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(config.max_open_files);
        db_opts.set_keep_log_file_num(5);
        db_opts.increase_parallelism(num_cpus());

        let cf_descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(&config)))
            .collect();

        let db = DBWithThreadMode::<SingleThreaded>::open_cf_descriptors(
            &db_opts,
            &config.path,
            cf_descriptors,
        )
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(Self {
            db,
            config,
            append_lock: Mutex::new(()),
        })
    }

    fn cf_options(config: &StoreConfig) -> Options {
        let mut opts = Options::default();

        // Block-based table with bloom filter and cache; both CFs are
        // prefix-scanned by the 16-byte document id.
        let mut block_opts = BlockBasedOptions::default();
        let cache = Cache::new_lru_cache(config.block_cache_size);
        block_opts.set_block_cache(&cache);
        block_opts.set_bloom_filter(config.bloom_filter_bits as f64, false);
        block_opts.set_block_size(16 * 1024);
        opts.set_block_based_table_factory(&block_opts);

        opts.set_compression_type(DBCompressionType::Lz4);
        opts.set_write_buffer_size(config.write_buffer_size);
        opts.set_max_write_buffer_number(4);
        opts.set_prefix_extractor(rocksdb::SliceTransform::create_fixed_prefix(16));

        opts
    }

    // ─── Helpers ──────────────────────────────────────────────────────

    fn cf(&self, name: &str) -> Result<&rocksdb::ColumnFamily, StoreError> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Backend(format!("Column family '{name}' not found")))
    }

    /// Build a record key: doc_id (16 bytes) + index (8 bytes big-endian).
    /// Only non-negative indices are ever persisted.
    fn record_key(doc_id: Uuid, index: i64) -> Vec<u8> {
        let mut key = Vec::with_capacity(24);
        key.extend_from_slice(doc_id.as_bytes());
        key.extend_from_slice(&(index.max(0) as u64).to_be_bytes());
        key
    }

    fn index_from_key(key: &[u8]) -> Option<i64> {
        if key.len() < 24 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf.copy_from_slice(&key[16..24]);
        Some(u64::from_be_bytes(buf) as i64)
    }

    /// Highest stored index for `doc_id` in `cf_name`, or `NO_VERSION`.
    fn last_index_in(&self, cf_name: &str, doc_id: Uuid) -> Result<i64, StoreError> {
        let cf = self.cf(cf_name)?;
        let mut scan_end = doc_id.as_bytes().to_vec();
        scan_end.extend_from_slice(&u64::MAX.to_be_bytes());

        let mut iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&scan_end, Direction::Reverse));
        match iter.next() {
            Some(Ok((key, _))) if key.len() >= 24 && &key[..16] == doc_id.as_bytes() => {
                Ok(Self::index_from_key(&key).unwrap_or(NO_VERSION))
            }
            Some(Err(e)) => Err(StoreError::Backend(e.to_string())),
            _ => Ok(NO_VERSION),
        }
    }

    fn read_record<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T, StoreError> {
        let (record, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(record)
    }

    fn write_record<T: Serialize>(record: &T) -> Result<Vec<u8>, StoreError> {
        bincode::serde::encode_to_vec(record, bincode::config::standard())
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn write_opts(&self) -> WriteOptions {
        let mut opts = WriteOptions::default();
        opts.set_sync(self.config.sync_writes);
        opts
    }

    /// Force a flush of memtables to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.db
            .flush()
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.config.path
    }
}

impl VersionLog for RocksStore {
    fn read_range(
        &self,
        doc_id: Uuid,
        after_exclusive: i64,
        upto: Option<i64>,
    ) -> Result<Vec<VersionEntry>, StoreError> {
        let cf = self.cf(CF_VERSIONS)?;
        let start_key = Self::record_key(doc_id, after_exclusive + 1);

        let mut entries = Vec::new();
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&start_key, Direction::Forward));
        for item in iter {
            let (key, value) = item.map_err(|e| StoreError::Backend(e.to_string()))?;
            if key.len() < 24 || &key[..16] != doc_id.as_bytes() {
                break;
            }
            let index = Self::index_from_key(&key).unwrap_or(NO_VERSION);
            if let Some(hi) = upto {
                if index > hi {
                    break;
                }
            }
            entries.push(self.read_record::<VersionEntry>(&value)?);
        }
        Ok(entries)
    }

    fn read_last(&self, doc_id: Uuid) -> Result<Option<VersionEntry>, StoreError> {
        let last = self.last_index_in(CF_VERSIONS, doc_id)?;
        if last == NO_VERSION {
            return Ok(None);
        }
        let cf = self.cf(CF_VERSIONS)?;
        let key = Self::record_key(doc_id, last);
        match self
            .db
            .get_cf(&cf, &key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
        {
            Some(bytes) => Ok(Some(self.read_record(&bytes)?)),
            None => Ok(None),
        }
    }

    fn append_batch(
        &self,
        doc_id: Uuid,
        start_index: i64,
        client_id: Uuid,
        operations: Vec<Vec<u8>>,
    ) -> Result<AppendOutcome, StoreError> {
        if operations.is_empty() {
            return Ok(AppendOutcome::Committed);
        }
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| StoreError::Backend("append lock poisoned".into()))?;

        // Condition: the log's last index must be exactly start_index - 1.
        // This rejects both already-taken positions and gaps.
        let last = self.last_index_in(CF_VERSIONS, doc_id)?;
        if last + 1 != start_index {
            return Ok(AppendOutcome::Conflict);
        }

        let cf = self.cf(CF_VERSIONS)?;
        let created_at = unix_now();
        let mut batch = WriteBatch::default();
        for (offset, operation) in operations.into_iter().enumerate() {
            let index = start_index + offset as i64;
            let entry = VersionEntry {
                doc_id,
                index,
                client_id,
                operation,
                created_at,
            };
            batch.put_cf(&cf, Self::record_key(doc_id, index), Self::write_record(&entry)?);
        }
        self.db
            .write_opt(batch, &self.write_opts())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(AppendOutcome::Committed)
    }
}

impl CheckpointStore for RocksStore {
    fn latest_checkpoint(&self, doc_id: Uuid) -> Result<Option<Checkpoint>, StoreError> {
        let last = self.last_index_in(CF_CHECKPOINTS, doc_id)?;
        if last == NO_VERSION {
            return Ok(None);
        }
        let cf = self.cf(CF_CHECKPOINTS)?;
        let key = Self::record_key(doc_id, last);
        let Some(bytes) = self
            .db
            .get_cf(&cf, &key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
        else {
            return Ok(None);
        };

        let mut checkpoint: Checkpoint = self.read_record(&bytes)?;
        checkpoint.content = lz4_flex::decompress_size_prepended(&checkpoint.content)
            .map_err(|e| StoreError::Corrupt(e.to_string()))?;
        Ok(Some(checkpoint))
    }

    fn create_checkpoint(
        &self,
        doc_id: Uuid,
        index: i64,
        format: FormatVersion,
        content: &[u8],
    ) -> Result<CreateOutcome, StoreError> {
        let _guard = self
            .append_lock
            .lock()
            .map_err(|_| StoreError::Backend("append lock poisoned".into()))?;

        let cf = self.cf(CF_CHECKPOINTS)?;
        let key = Self::record_key(doc_id, index);
        if self
            .db
            .get_cf(&cf, &key)
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .is_some()
        {
            return Ok(CreateOutcome::AlreadyExists);
        }

        let checkpoint = Checkpoint {
            doc_id,
            index,
            format,
            content: lz4_flex::compress_prepend_size(content),
            created_at: unix_now(),
        };
        self.db
            .put_cf_opt(&cf, &key, Self::write_record(&checkpoint)?, &self.write_opts())
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(CreateOutcome::Created)
    }
}

/// Get number of CPU cores for RocksDB parallelism.
fn num_cpus() -> i32 {
    std::thread::available_parallelism()
        .map(|n| n.get() as i32)
        .unwrap_or(4)
}
