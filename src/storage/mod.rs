//! Storage infrastructure shared by the server and the offline client.
//!
//! - `rocksdb`: generic RocksDB handle, batches, key and iteration helpers

pub mod rocksdb;

pub use rocksdb::{
    composite_key, invert_timestamp, prefixed_key, revert_timestamp, BatchOp, RocksDbConfig,
    RocksDbHandle,
};
