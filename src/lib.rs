//! TTL Cache - record lifecycle for an in-memory cache
//!
//! Provides TTL-stamped records, lazy fallback loading, normalized
//! transaction outcomes and expiry-aware table scans.

pub mod cache;
pub mod config;
pub mod error;

pub use cache::{CacheStore, FallbackOutcome, Loader, Record, TtlOverride};
pub use config::{CacheOptions, Config};
pub use error::{CacheError, Result};
