//! Content-addressed result cache for the facemark service.
//!
//! This crate provides:
//! - The `ResultCache` trait (plain get/set, no TTL)
//! - A Redis implementation over a multiplexed async connection
//! - An in-process implementation for tests and single-node runs
//! - JSON encoding of `PipelineResult` with corrupt payloads treated as misses

pub mod cache;
pub mod error;
pub mod memory;
pub mod redis_cache;

pub use cache::{
    build_cache, decode_result, encode_result, CacheConfig, ResultCache, DEFAULT_KEY_PREFIX,
};
pub use error::{CacheError, CacheResult};
pub use memory::InMemoryResultCache;
pub use redis_cache::RedisResultCache;
