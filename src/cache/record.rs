//! Cache Record Module
//!
//! Defines the stored record shape and the factory that stamps new records.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::cache::{expired_at, Clock};
use crate::config::CacheOptions;

// == Cache Record ==
/// Represents a single stored record with its insertion time and TTL.
///
/// A record is never mutated after creation. Changing the value or TTL of a
/// key means writing a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record<K, V> {
    /// Identifier of the cache owning this record
    pub cache_id: String,
    /// The record key
    pub key: K,
    /// Creation timestamp (Unix milliseconds)
    pub inserted_at_ms: u64,
    /// Time to live in milliseconds, None = never expires
    pub ttl_ms: Option<u64>,
    /// The stored value
    pub value: V,
}

impl<K, V> Record<K, V> {
    /// Absolute expiry instant, or None if the record never expires.
    pub fn expires_at_ms(&self) -> Option<u64> {
        self.ttl_ms
            .map(|ttl| self.inserted_at_ms.saturating_add(ttl))
    }

    /// Checks if the record has expired at `now_ms`.
    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        expired_at(self.inserted_at_ms, self.ttl_ms, now_ms)
    }

    // == Time To Live ==
    /// Returns remaining TTL in milliseconds at `now_ms`.
    ///
    /// # Returns
    /// - `Some(0)` if the record expires at or before `now_ms`
    /// - `Some(remaining_ms)` if the record has a TTL left
    /// - `None` if the record never expires
    pub fn ttl_remaining_ms(&self, now_ms: u64) -> Option<u64> {
        self.expires_at_ms()
            .map(|expires| expires.saturating_sub(now_ms))
    }
}

// == TTL Override ==
/// TTL requested by a single write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TtlOverride {
    /// Use the cache's configured default TTL
    #[default]
    Inherit,
    /// Never expire, even if the cache has a default TTL
    Immortal,
    /// Expire after this many milliseconds
    Millis(u64),
}

impl From<Option<u64>> for TtlOverride {
    fn from(ttl: Option<u64>) -> Self {
        match ttl {
            Some(ms) => TtlOverride::Millis(ms),
            None => TtlOverride::Immortal,
        }
    }
}

// == Record Factory ==
/// Builds records stamped with the current clock reading.
#[derive(Debug, Clone)]
pub struct RecordFactory {
    clock: Arc<dyn Clock>,
}

impl RecordFactory {
    // == Constructor ==
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    // == Create ==
    /// Creates a record for `key` and `value`.
    ///
    /// An explicit override (including [`TtlOverride::Immortal`]) always wins;
    /// [`TtlOverride::Inherit`] takes `options.default_ttl` verbatim.
    pub fn create<K, V>(
        &self,
        cache_id: &str,
        key: K,
        value: V,
        ttl: TtlOverride,
        options: &CacheOptions<K, V>,
    ) -> Record<K, V> {
        let ttl_ms = match ttl {
            TtlOverride::Inherit => options.default_ttl,
            TtlOverride::Immortal => None,
            TtlOverride::Millis(ms) => Some(ms),
        };

        Record {
            cache_id: cache_id.to_string(),
            key,
            inserted_at_ms: self.clock.now_ms(),
            ttl_ms,
            value,
        }
    }
}
