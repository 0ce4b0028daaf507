//! Shared RocksDB storage utilities.
//!
//! This module wraps a RocksDB `TransactionDB` with generic helpers. It
//! contains no forum logic - just key construction, (de)serialization and
//! pessimistic transactions.
//!
//! ## Key Features
//!
//! - Configurable RocksDB setup with sensible defaults
//! - Generic key-value reads with bincode serialization
//! - Prefix iteration patterns
//! - Row-locking transactions (`get_for_update`) with atomic commit

use crate::error::{AgoraError, Result};
use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, ErrorKind, MultiThreaded, Options, Transaction,
    TransactionDB, TransactionDBOptions,
};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

// =============================================================================
// RocksDB Configuration
// =============================================================================

/// Configuration for RocksDB storage.
#[derive(Debug, Clone)]
pub struct RocksDbConfig {
    /// Maximum number of open files.
    pub max_open_files: i32,
    /// Number of log files to keep.
    pub keep_log_file_num: usize,
    /// Maximum WAL size in bytes.
    pub max_wal_size: u64,
    /// Write buffer size in bytes.
    pub write_buffer_size: usize,
    /// Maximum number of write buffers.
    pub max_write_buffer_number: i32,
    /// Target file size for SST files.
    pub target_file_size_base: u64,
    /// How long a transaction waits for a row lock before aborting, in milliseconds.
    pub lock_timeout_ms: i64,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            max_open_files: 128,
            keep_log_file_num: 2,
            max_wal_size: 32 * 1024 * 1024,      // 32MB
            write_buffer_size: 32 * 1024 * 1024, // 32MB
            max_write_buffer_number: 2,
            target_file_size_base: 32 * 1024 * 1024, // 32MB
            lock_timeout_ms: 1_000,
        }
    }
}

impl RocksDbConfig {
    /// Creates a configuration optimized for server workloads.
    ///
    /// Uses larger buffers and more files for higher throughput.
    pub fn for_server() -> Self {
        Self {
            max_open_files: 256,
            keep_log_file_num: 3,
            max_wal_size: 64 * 1024 * 1024,      // 64MB
            write_buffer_size: 64 * 1024 * 1024, // 64MB
            max_write_buffer_number: 3,
            target_file_size_base: 64 * 1024 * 1024, // 64MB
            lock_timeout_ms: 5_000,
        }
    }

    /// Builds RocksDB Options from this configuration.
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

    /// Builds the transaction options (lock timeouts) from this configuration.
    pub fn build_txn_options(&self) -> TransactionDBOptions {
        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(self.lock_timeout_ms);
        txn_opts.set_default_lock_timeout(self.lock_timeout_ms);
        txn_opts
    }
}

// =============================================================================
// Key Generation Utilities
// =============================================================================

/// Creates a prefixed key with a separator.
///
/// Format: `{prefix}{separator}{suffix}`
///
/// This is useful for creating composite keys that enable prefix iteration.
pub fn prefixed_key(prefix: &[u8], separator: u8, suffix: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + 1 + suffix.len());
    key.extend_from_slice(prefix);
    key.push(separator);
    key.extend_from_slice(suffix);
    key
}

/// Creates a composite key from two byte slices.
///
/// Format: `{part1}:{part2}` (using colon separator)
pub fn composite_key(part1: &[u8], part2: &[u8]) -> Vec<u8> {
    prefixed_key(part1, b':', part2)
}

/// Prefix matching every composite key whose first part is `part1`.
pub fn composite_prefix(part1: &[u8]) -> Vec<u8> {
    let mut prefix = Vec::with_capacity(part1.len() + 1);
    prefix.extend_from_slice(part1);
    prefix.push(b':');
    prefix
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value)
        .map_err(|e| AgoraError::serialization(format!("Failed to serialize: {}", e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes)
        .map_err(|e| AgoraError::serialization(format!("Failed to deserialize: {}", e)))
}

fn storage_error(action: &str, e: rocksdb::Error) -> AgoraError {
    match e.kind() {
        ErrorKind::Busy | ErrorKind::TimedOut => {
            AgoraError::storage(format!("Lock contention while trying to {}: {}", action, e))
        }
        _ => AgoraError::storage(format!("Failed to {}: {}", action, e)),
    }
}

// =============================================================================
// Database Handle Wrapper
// =============================================================================

type Db = TransactionDB<MultiThreaded>;

/// A wrapper around a RocksDB `TransactionDB` that provides common operations.
///
/// Reads go straight to the database and see only committed data. All
/// writes go through [`DbTransaction`] so that multi-key mutations commit
/// atomically.
pub struct RocksDbHandle {
    db: Arc<Db>,
}

impl RocksDbHandle {
    /// Opens a RocksDB database with the given column families.
    pub fn open(
        db_path: impl AsRef<Path>,
        config: &RocksDbConfig,
        column_families: &[&str],
    ) -> Result<Self> {
        let opts = config.build_options();
        let txn_opts = config.build_txn_options();
        let cf_opts = Options::default();

        let cf_descriptors: Vec<_> = column_families
            .iter()
            .map(|cf| ColumnFamilyDescriptor::new(*cf, cf_opts.clone()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, &txn_opts, db_path.as_ref(), cf_descriptors)
            .map_err(|e| AgoraError::storage(format!("Failed to open RocksDB: {}", e)))?;

        Ok(Self { db: Arc::new(db) })
    }

    /// Gets a column family handle.
    pub fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| AgoraError::storage(format!("Column family '{}' not found", name)))
    }

    /// Loads and deserializes a committed value from the given key.
    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;

        match self.db.get_cf(&cf, key) {
            Ok(Some(bytes)) => {
                trace!(
                    cf = cf_name,
                    key_len = key.len(),
                    value_bytes = bytes.len(),
                    "db_get: found record"
                );
                decode(&bytes).map(Some)
            }
            Ok(None) => {
                trace!(cf = cf_name, key_len = key.len(), "db_get: key not found");
                Ok(None)
            }
            Err(e) => Err(storage_error("read", e)),
        }
    }

    /// Loads raw bytes from the given key.
    pub fn get_raw(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let cf = self.cf(cf_name)?;
        let value = self
            .db
            .get_cf(&cf, key)
            .map_err(|e| storage_error("read", e))?;

        trace!(
            cf = cf_name,
            key_len = key.len(),
            found = value.is_some(),
            "db_get_raw: looked up key"
        );

        Ok(value)
    }

    /// Checks if a key exists.
    pub fn exists(&self, cf_name: &str, key: &[u8]) -> Result<bool> {
        Ok(self.get_raw(cf_name, key)?.is_some())
    }

    /// Iterates over all entries with the given prefix.
    ///
    /// The callback receives (key, value) pairs and returns `Ok(true)` to
    /// continue or `Ok(false)` to stop. Iterator errors and callback errors
    /// end the iteration and are returned to the caller.
    pub fn prefix_iterate<F>(&self, cf_name: &str, prefix: &[u8], mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        let cf = self.cf(cf_name)?;
        let iter = self.db.prefix_iterator_cf(&cf, prefix);

        let mut count: usize = 0;
        for item in iter {
            let (key, value) = item.map_err(|e| storage_error("iterate", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            count += 1;
            if !callback(&key, &value)? {
                break;
            }
        }

        debug!(
            cf = cf_name,
            prefix_len = prefix.len(),
            records_iterated = count,
            "db_prefix_iterate: completed iteration"
        );

        Ok(())
    }

    /// Collects all values with the given prefix, deserializing each.
    ///
    /// A record that fails to deserialize fails the whole read.
    pub fn prefix_collect<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        prefix: &[u8],
    ) -> Result<Vec<T>> {
        let mut results = Vec::new();

        self.prefix_iterate(cf_name, prefix, |_, value| {
            results.push(decode(value)?);
            Ok(true)
        })?;

        debug!(
            cf = cf_name,
            prefix_len = prefix.len(),
            records_collected = results.len(),
            "db_prefix_collect: collected records"
        );

        Ok(results)
    }

    /// Collects the keys under a prefix with the prefix stripped.
    pub fn prefix_suffixes(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut suffixes = Vec::new();
        self.prefix_iterate(cf_name, prefix, |key, _| {
            suffixes.push(key[prefix.len()..].to_vec());
            Ok(true)
        })?;
        Ok(suffixes)
    }

    /// Iterates over all entries in a column family.
    pub fn iterate_all<F>(&self, cf_name: &str, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8], &[u8]) -> Result<bool>,
    {
        let cf = self.cf(cf_name)?;
        let iter = self.db.iterator_cf(&cf, rocksdb::IteratorMode::Start);

        let mut count: usize = 0;
        for item in iter {
            let (key, value) = item.map_err(|e| storage_error("iterate", e))?;
            count += 1;
            if !callback(&key, &value)? {
                break;
            }
        }

        debug!(
            cf = cf_name,
            records_iterated = count,
            "db_iterate_all: completed full iteration"
        );

        Ok(())
    }

    /// Collects and deserializes every value in a column family.
    pub fn collect_all<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let mut results = Vec::new();
        self.iterate_all(cf_name, |_, value| {
            results.push(decode(value)?);
            Ok(true)
        })?;
        Ok(results)
    }

    /// Starts a pessimistic transaction.
    ///
    /// Dropping the returned transaction without calling
    /// [`DbTransaction::commit`] rolls it back.
    pub fn begin(&self) -> DbTransaction<'_> {
        DbTransaction {
            handle: self,
            txn: self.db.transaction(),
        }
    }
}

impl std::fmt::Debug for RocksDbHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbHandle")
            .field("db", &"RocksDB")
            .finish()
    }
}

// =============================================================================
// Transactions
// =============================================================================

/// An open pessimistic transaction.
///
/// Keys read with [`get_for_update`](Self::get_for_update) stay locked
/// until the transaction commits or is dropped; concurrent writers of the
/// same key block (up to the configured lock timeout) instead of
/// overwriting each other.
pub struct DbTransaction<'a> {
    handle: &'a RocksDbHandle,
    txn: Transaction<'a, Db>,
}

impl<'a> DbTransaction<'a> {
    /// Reads a value and takes an exclusive lock on its key.
    ///
    /// The lock is taken even when the key is absent, which makes
    /// check-then-insert sequences safe.
    pub fn get_for_update<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        match self.get_raw_for_update(cf_name, key)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Locks a key and returns its raw bytes, if any.
    pub fn get_raw_for_update(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.locked_read(cf_name, key, true)
    }

    /// Reads a value under a shared lock.
    ///
    /// Shared locks block writers but not other readers, so several shared
    /// reads in one transaction observe a single committed state.
    pub fn get_shared<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        match self.get_raw_shared(cf_name, key)? {
            Some(bytes) => decode(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Share-locks a key and returns its raw bytes, if any.
    pub fn get_raw_shared(&self, cf_name: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.locked_read(cf_name, key, false)
    }

    fn locked_read(&self, cf_name: &str, key: &[u8], exclusive: bool) -> Result<Option<Vec<u8>>> {
        let cf = self.handle.cf(cf_name)?;
        let value = self
            .txn
            .get_for_update_cf(&cf, key, exclusive)
            .map_err(|e| storage_error("lock", e))?;

        trace!(
            cf = cf_name,
            key_len = key.len(),
            exclusive = exclusive,
            found = value.is_some(),
            "txn_get_for_update: locked key"
        );

        Ok(value)
    }

    /// Stages a serializable value at the given key.
    pub fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = encode(value)?;
        self.put_raw(cf_name, key, &bytes)
    }

    /// Stages raw bytes at the given key.
    pub fn put_raw(&self, cf_name: &str, key: &[u8], value: &[u8]) -> Result<()> {
        let cf = self.handle.cf(cf_name)?;

        trace!(
            cf = cf_name,
            key_len = key.len(),
            value_bytes = value.len(),
            "txn_put: staging value"
        );

        self.txn
            .put_cf(&cf, key, value)
            .map_err(|e| storage_error("write", e))
    }

    /// Stages deletion of a key.
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.handle.cf(cf_name)?;

        trace!(cf = cf_name, key_len = key.len(), "txn_delete: staging delete");

        self.txn
            .delete_cf(&cf, key)
            .map_err(|e| storage_error("delete", e))
    }

    /// Collects the entries under a prefix, as seen by this transaction.
    pub fn prefix_entries(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let cf = self.handle.cf(cf_name)?;
        let mut entries = Vec::new();

        for item in self.txn.prefix_iterator_cf(&cf, prefix) {
            let (key, value) = item.map_err(|e| storage_error("iterate", e))?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_vec(), value.to_vec()));
        }

        Ok(entries)
    }

    /// Collects the keys under a prefix, as seen by this transaction.
    pub fn prefix_keys(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(self
            .prefix_entries(cf_name, prefix)?
            .into_iter()
            .map(|(key, _)| key)
            .collect())
    }

    /// Collects and deserializes the values under a prefix.
    pub fn prefix_collect<T: DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>> {
        self.prefix_entries(cf_name, prefix)?
            .iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    /// Stages deletion of every key under a prefix.
    ///
    /// Returns the number of deleted entries.
    pub fn prefix_delete(&self, cf_name: &str, prefix: &[u8]) -> Result<usize> {
        let keys = self.prefix_keys(cf_name, prefix)?;
        for key in &keys {
            self.delete(cf_name, key)?;
        }

        debug!(
            cf = cf_name,
            prefix_len = prefix.len(),
            records_deleted = keys.len(),
            "txn_prefix_delete: staged deletes for prefix"
        );

        Ok(keys.len())
    }

    /// Commits every staged write atomically.
    pub fn commit(self) -> Result<()> {
        self.txn.commit().map_err(|e| storage_error("commit", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use tempfile::TempDir;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct TestData {
        name: String,
        value: u64,
    }

    fn create_test_db() -> (RocksDbHandle, TempDir) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test_db");
        let config = RocksDbConfig::default();
        let db =
            RocksDbHandle::open(&db_path, &config, &["data", "meta"]).expect("Failed to open db");
        (db, temp_dir)
    }

    #[test]
    fn test_prefixed_key() {
        let key = prefixed_key(b"prefix", b':', b"suffix");
        assert_eq!(key, b"prefix:suffix");
    }

    #[test]
    fn test_composite_key() {
        let key = composite_key(b"part1", b"part2");
        assert_eq!(key, b"part1:part2");
        assert!(key.starts_with(&composite_prefix(b"part1")));
    }

    #[test]
    fn test_put_commit_and_get() {
        let (db, _temp) = create_test_db();

        let data = TestData {
            name: "Test".to_string(),
            value: 12345,
        };

        let txn = db.begin();
        txn.put("data", b"key1", &data).unwrap();
        txn.commit().unwrap();

        let loaded: TestData = db.get("data", b"key1").unwrap().unwrap();
        assert_eq!(loaded, data);
    }

    #[test]
    fn test_dropped_transaction_rolls_back() {
        let (db, _temp) = create_test_db();

        {
            let txn = db.begin();
            txn.put_raw("data", b"key1", b"staged").unwrap();
        }

        assert!(!db.exists("data", b"key1").unwrap());
    }

    #[test]
    fn test_get_for_update_sees_committed_value() {
        let (db, _temp) = create_test_db();

        let txn = db.begin();
        txn.put_raw("meta", b"counter", &7u64.to_be_bytes()).unwrap();
        txn.commit().unwrap();

        let txn = db.begin();
        let raw = txn.get_raw_for_update("meta", b"counter").unwrap().unwrap();
        assert_eq!(raw, 7u64.to_be_bytes().to_vec());
        assert!(txn.get_raw_for_update("meta", b"missing").unwrap().is_none());
    }

    #[test]
    fn test_shared_reads_coexist() {
        let (db, _temp) = create_test_db();

        let txn = db.begin();
        txn.put("data", b"row", &1u64).unwrap();
        txn.commit().unwrap();

        let first = db.begin();
        let second = db.begin();
        assert_eq!(first.get_shared::<u64>("data", b"row").unwrap(), Some(1));
        assert_eq!(second.get_shared::<u64>("data", b"row").unwrap(), Some(1));
    }

    #[test]
    fn test_txn_prefix_collect_sees_own_writes() {
        let (db, _temp) = create_test_db();

        let txn = db.begin();
        txn.put("data", b"p:1", &10u64).unwrap();
        txn.put("data", b"p:2", &20u64).unwrap();
        txn.put("data", b"q:1", &30u64).unwrap();

        let values: Vec<u64> = txn.prefix_collect("data", b"p:").unwrap();
        assert_eq!(values, vec![10, 20]);
    }

    #[test]
    fn test_locked_key_times_out_second_writer() {
        let temp_dir = TempDir::new().unwrap();
        let config = RocksDbConfig {
            lock_timeout_ms: 50,
            ..RocksDbConfig::default()
        };
        let db = RocksDbHandle::open(temp_dir.path().join("db"), &config, &["data"]).unwrap();

        let first = db.begin();
        first.get_raw_for_update("data", b"row").unwrap();

        let second = db.begin();
        let err = second.get_raw_for_update("data", b"row").unwrap_err();
        assert!(matches!(err, AgoraError::Storage(_)));

        drop(first);
        assert!(second.get_raw_for_update("data", b"row").is_ok());
    }

    #[test]
    fn test_prefix_iterate() {
        let (db, _temp) = create_test_db();

        let txn = db.begin();
        txn.put_raw("data", b"prefix1:a", b"data1").unwrap();
        txn.put_raw("data", b"prefix1:b", b"data2").unwrap();
        txn.put_raw("data", b"prefix2:a", b"data3").unwrap();
        txn.commit().unwrap();

        let mut found = Vec::new();
        db.prefix_iterate("data", b"prefix1:", |_, value| {
            found.push(value.to_vec());
            Ok(true)
        })
        .unwrap();

        assert_eq!(found.len(), 2);
        assert_eq!(
            db.prefix_suffixes("data", b"prefix1:").unwrap(),
            vec![b"a".to_vec(), b"b".to_vec()]
        );
    }

    #[test]
    fn test_prefix_delete() {
        let (db, _temp) = create_test_db();

        let txn = db.begin();
        txn.put_raw("data", b"prefix1:a", b"data1").unwrap();
        txn.put_raw("data", b"prefix1:b", b"data2").unwrap();
        txn.put_raw("data", b"prefix2:a", b"data3").unwrap();
        txn.commit().unwrap();

        let txn = db.begin();
        let deleted = txn.prefix_delete("data", b"prefix1:").unwrap();
        assert_eq!(deleted, 2);
        txn.commit().unwrap();

        assert!(db.exists("data", b"prefix2:a").unwrap());
        assert!(!db.exists("data", b"prefix1:a").unwrap());
    }

    #[test]
    fn test_collect_all() {
        let (db, _temp) = create_test_db();

        let txn = db.begin();
        for value in 0..3u64 {
            let data = TestData {
                name: format!("item{}", value),
                value,
            };
            txn.put("data", &value.to_be_bytes(), &data).unwrap();
        }
        txn.commit().unwrap();

        let all: Vec<TestData> = db.collect_all("data").unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].value, 0);
    }

    #[test]
    fn test_undecodable_record_fails_listing() {
        let (db, _temp) = create_test_db();

        let txn = db.begin();
        txn.put("data", b"p:1", &1u64).unwrap();
        txn.put_raw("data", b"p:2", b"\x01").unwrap();
        txn.commit().unwrap();

        let err = db.prefix_collect::<u64>("data", b"p:").unwrap_err();
        assert!(matches!(err, AgoraError::Serialization(_)));
        let err = db.collect_all::<u64>("data").unwrap_err();
        assert!(matches!(err, AgoraError::Serialization(_)));
    }

    #[test]
    fn test_callback_error_stops_iteration() {
        let (db, _temp) = create_test_db();

        let txn = db.begin();
        for key in [b"p:1", b"p:2", b"p:3"] {
            txn.put_raw("data", key, b"x").unwrap();
        }
        txn.commit().unwrap();

        let mut seen = 0;
        let err = db
            .prefix_iterate("data", b"p:", |_, _| {
                seen += 1;
                Err(AgoraError::storage("stop"))
            })
            .unwrap_err();
        assert!(matches!(err, AgoraError::Storage(_)));
        assert_eq!(seen, 1);
    }

    #[test]
    fn test_server_config() {
        let config = RocksDbConfig::for_server();
        assert_eq!(config.max_open_files, 256);
        assert_eq!(config.max_wal_size, 64 * 1024 * 1024);
        assert!(config.lock_timeout_ms > RocksDbConfig::default().lock_timeout_ms);
    }

    #[test]
    fn test_get_missing_key() {
        let (db, _temp) = create_test_db();
        let result: Option<TestData> = db.get("data", b"nonexistent").unwrap();
        assert!(result.is_none());
    }
}
