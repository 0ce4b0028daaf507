//! Storage utilities and abstractions.
//!
//! This module provides shared storage infrastructure that the forum store
//! builds on.
//!
//! ## Modules
//!
//! - `rocksdb`: Generic RocksDB utilities (configuration, handle, transactions, iteration)

pub mod rocksdb;

pub use self::rocksdb::{
    composite_key, composite_prefix, prefixed_key, DbTransaction, RocksDbConfig, RocksDbHandle,
};
