//! RocksDB plumbing shared by the server store and the offline client store.
//!
//! Everything here is domain-agnostic: opening a database with a fixed set of
//! column families, bincode-typed gets and puts, atomic batches, and the
//! prefix/seek iteration used by the sorted index column families.

use crate::error::{LoopHubError, Result};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, DBWithThreadMode, MultiThreaded, Options,
    WriteBatch,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace, warn};

// =============================================================================
// Configuration
// =============================================================================

/// Tuning knobs applied when a database is opened.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Number of info log files to keep.
    pub keep_log_file_num: usize,
    /// Maximum total WAL size in bytes.
    pub max_wal_size: u64,
    /// Memtable size in bytes.
    pub write_buffer_size: usize,
    /// Maximum number of memtables.
    pub max_write_buffer_number: i32,
    /// Target SST file size.
    pub target_file_size_base: u64,
}

impl Default for RocksDbConfig {
    /// Small footprint, suitable for the CLI's offline store.
    fn default() -> Self {
        Self {
            max_open_files: 64,
            keep_log_file_num: 2,
            max_wal_size: 16 * 1024 * 1024,      // 16MB
            write_buffer_size: 8 * 1024 * 1024, // 8MB
            max_write_buffer_number: 2,
            target_file_size_base: 16 * 1024 * 1024, // 16MB
        }
    }
}

impl RocksDbConfig {
    /// Larger buffers for the long-running server.
    pub fn for_server() -> Self {
        Self {
            max_open_files: 256,
            keep_log_file_num: 3,
            max_wal_size: 64 * 1024 * 1024,      // 64MB
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 3,
            target_file_size_base: 64 * 1024 * 1024, // 64MB
        }
    }

    /// Builds RocksDB `Options` from this configuration.
    pub fn build_options(&self) -> Options {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);
        opts.set_max_open_files(self.max_open_files);
        opts.set_keep_log_file_num(self.keep_log_file_num);
        opts.set_max_total_wal_size(self.max_wal_size);
        opts.increase_parallelism(num_cpus::get() as i32);
        opts.set_write_buffer_size(self.write_buffer_size);
        opts.set_max_write_buffer_number(self.max_write_buffer_number);
        opts.set_target_file_size_base(self.target_file_size_base);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }
}

// =============================================================================
// Key helpers
// =============================================================================

/// Builds `{prefix}{separator}{suffix}`.
pub fn prefixed_key(prefix: &[u8], separator: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + suffix.len());
    key.extend_from_slice(prefix);
    key.push(separator);
    key.extend_from_slice(suffix);
    key
}

/// Builds `{part1}:{part2}`.
pub fn composite_key(part1: &[u8], part2: &[u8]) -> Vec<u8> {
    prefixed_key(part1, b':', part2)
}

/// Big-endian `u64::MAX - ts`, so that lexicographic order is newest first.
pub fn invert_timestamp(timestamp: u64) -> [u8; 8] {
    (u64::MAX - timestamp).to_be_bytes()
}

/// Reverses [`invert_timestamp`].
pub fn revert_timestamp(bytes: &[u8]) -> Option<u64> {
    let arr: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(u64::MAX - u64::from_be_bytes(arr))
}

// =============================================================================
// Batches
// =============================================================================

/// One write inside an atomic [`RocksDbHandle::write_batch`].
#[derive(Debug, Clone)]
pub enum BatchOp {
    /// Store already-encoded bytes.
    Put {
        cf: &'static str,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    /// Remove a key.
    Delete { cf: &'static str, key: Vec<u8> },
}

impl BatchOp {
    /// Encodes `value` with bincode into a put operation.
    pub fn put<T: Serialize>(cf: &'static str, key: Vec<u8>, value: &T) -> Result<Self> {
        let value = bincode::serialize(value)
            .map_err(|e| LoopHubError::serialization(format!("Failed to serialize: {}", e)))?;
        Ok(Self::Put { cf, key, value })
    }

    /// A put with an empty value, used for index entries.
    pub fn marker(cf: &'static str, key: Vec<u8>) -> Self {
        Self::Put {
            cf,
            key,
            value: Vec::new(),
        }
    }

    /// A delete operation.
    pub fn delete(cf: &'static str, key: Vec<u8>) -> Self {
        Self::Delete { cf, key }
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Thread-safe database handle; clones share the same database.
#[derive(Clone)]
pub struct RocksDbHandle {
    db: Arc<DBWithThreadMode<MultiThreaded>>,
}

impl RocksDbHandle {
    /// Opens (creating if needed) a database with the given column families.
    pub fn open(
        db_path: impl AsRef<Path>,
        config: &RocksDbConfig,
        column_families: &[&str],
    ) -> Result<Self> {
        let opts = config.build_options();
        let cf_opts = Options::default();

        let cf_descriptors: Vec<_> = column_families
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(*cf, cf_opts.clone()))
            .collect();

        let db = DBWithThreadMode::<MultiThreaded>::open_cf_descriptors(
            &opts,
            db_path.as_ref(),
            cf_descriptors,
        )
        .map_err(|e| LoopHubError::storage(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| LoopHubError::storage(format!("Column family '{}' not found", name)))
    }

    /// Serializes and stores `value` under `key`.
    pub fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = bincode::serialize(value)
            .map_err(|e| LoopHubError::serialization(format!("Failed to serialize: {}", e)))?;
        trace!(
            cf = cf_name,
            key_len = key.len(),
            value_bytes = bytes.len(),
            "db_put"
        );
        self.put_raw(cf_name, key, &bytes)
    }

    /// Stores raw bytes under `key`.
    pub fn put_raw(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        self.db
            .put_cf(&cf, key, value)
            .map_err(|e| LoopHubError::storage(format!("Failed to write: {}", e)))
    }

    /// Loads and deserializes the value at `key`.
    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw(cf_name, key)? {
            Some(bytes) => {
                let value = bincode::deserialize(&bytes).map_err(|e| {
                    LoopHubError::serialization(format!("Failed to deserialize: {}", e))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Loads raw bytes at `key`.
    pub fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let value = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| LoopHubError::storage(format!("Failed to read: {}", e)))?;
        trace!(
            cf = cf_name,
            key_len = key.len(),
            found = value.is_some(),
            "db_get"
        );
        Ok(value)
    }

    /// Returns true if `key` is present.
    pub fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        Ok(self.get_raw(cf_name, key)?.is_some())
    }

    /// Deletes `key`.
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.cf(cf_name)?;
        trace!(cf = cf_name, key_len = key.len(), "db_delete");
        self.db
            .delete_cf(&cf, key)
            .map_err(|e| LoopHubError::storage(format!("Failed to delete: {}", e)))
    }

    /// Applies all operations atomically.
    pub fn write_batch(&self, ops: Vec<BatchOp>) -> Result<()> {
        let mut batch = WriteBatch::default();
        let op_count = ops.len();
        for op in ops {
            match op {
                BatchOp::Put { cf, key, value } => {
                    let handle = self.cf(cf)?;
                    batch.put_cf(&handle, key, value);
                }
                BatchOp::Delete { cf, key } => {
                    let handle = self.cf(cf)?;
                    batch.delete_cf(&handle, key);
                }
            }
        }
        self.db
            .write(batch)
            .map_err(|e| LoopHubError::storage(format!("Failed to write batch: {}", e)))?;
        trace!(ops = op_count, "db_write_batch");
        Ok(())
    }

    /// Visits every entry whose key starts with `prefix`, in key order.
    ///
    /// The callback returns false to stop early.
    pub fn prefix_iterate<F>(&self, cf_name: &str, prefix: &[u8], callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        self.seek_iterate(cf_name, prefix, prefix, callback)
    }

    /// Seeks to `seek_key` and visits entries while they still start with
    /// `filter_prefix`. Used for cursor pagination over index column families.
    pub fn seek_iterate<F>(
        &self,
        cf_name: &str,
        seek_key: &[u8],
        filter_prefix: &[u8],
        mut callback: F,
    ) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        let cf = self.cf(cf_name)?;
        let mut iter = self.db.raw_iterator_cf(&cf);
        iter.seek(seek_key);

        let mut visited: usize = 0;
        while iter.valid() {
            let (Some(key), Some(value)) = (iter.key(), iter.value()) else {
                break;
            };
            if !key.starts_with(filter_prefix) {
                break;
            }
            visited += 1;
            if !callback(key, value) {
                break;
            }
            iter.next();
        }
        if let Err(e) = iter.status() {
            warn!(cf = cf_name, "Iterator error: {}", e);
        }

        debug!(
            cf = cf_name,
            prefix_len = filter_prefix.len(),
            records_visited = visited,
            "db_seek_iterate"
        );
        Ok(())
    }

    /// Deserializes every value under `prefix`, skipping undecodable records.
    pub fn prefix_collect<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        let mut results = Vec::new();
        let mut errors: usize = 0;

        self.prefix_iterate(cf_name, prefix, |_, value| {
            match bincode::deserialize(value) {
                Ok(item) => results.push(item),
                Err(e) => {
                    errors += 1;
                    warn!(cf = cf_name, "Skipping undecodable record: {}", e);
                }
            }
            true
        })?;

        if errors > 0 {
            debug!(
                cf = cf_name,
                collected = results.len(),
                errors,
                "db_prefix_collect finished with errors"
            );
        }
        Ok(results)
    }

    /// Counts entries under `prefix` without decoding them.
    pub fn count_prefix(&self, cf_name: &str, prefix: &[u8]) -> Result<usize> {
        let mut count = 0;
        self.prefix_iterate(cf_name, prefix, |_, _| {
            count += 1;
            true
        })?;
        Ok(count)
    }

    /// Deletes every entry under `prefix` and returns how many were removed.
    pub fn prefix_delete(&self, cf_name: &str, prefix: &[u8]) -> Result<usize> {
        let mut keys = Vec::new();
        self.prefix_iterate(cf_name, prefix, |key, _| {
            keys.push(key.to_vec());
            true
        })?;
        let deleted = keys.len();
        if deleted > 0 {
            let cf = self.cf(cf_name)?;
            let mut batch = WriteBatch::default();
            for key in keys {
                batch.delete_cf(&cf, key);
            }
            self.db
                .write(batch)
                .map_err(|e| LoopHubError::storage(format!("Failed to delete keys: {}", e)))?;
        }
        debug!(cf = cf_name, records_deleted = deleted, "db_prefix_delete");
        Ok(deleted)
    }

    /// Visits every entry of a column family in key order.
    pub fn iterate_all<F>(&self, cf_name: &str, callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> bool,
    {
        self.seek_iterate(cf_name, &[], &[], callback)
    }

    /// RocksDB's own statistics dump.
    pub fn stats(&self) -> String {
        self.db
            .property_value("rocksdb.stats")
            .ok()
            .flatten()
            .unwrap_or_else(|| "Stats unavailable".to_string())
    }
}

impl std::fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbHandle")
            .field("db", &"RocksDB")
            .finish()
    }
}
