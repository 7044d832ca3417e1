//! Expiration Policy Module
//!
//! Decides whether a record is still alive from its insertion time and TTL.

use std::sync::Arc;

use crate::cache::Clock;

// == Expired At ==
/// Checks expiration against an explicit instant.
///
/// Boundary condition: a record is expired only once `inserted_at_ms + ttl_ms`
/// is strictly less than `now_ms`. At exact equality it is still alive.
/// Records without a TTL never expire.
pub fn expired_at(inserted_at_ms: u64, ttl_ms: Option<u64>, now_ms: u64) -> bool {
    match ttl_ms {
        Some(ttl) => inserted_at_ms.saturating_add(ttl) < now_ms,
        None => false,
    }
}

// == Expiration Policy ==
/// Liveness check bound to a clock.
#[derive(Debug, Clone)]
pub struct ExpirationPolicy {
    clock: Arc<dyn Clock>,
}

impl ExpirationPolicy {
    // == Constructor ==
    /// Creates a policy reading time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    // == Is Expired ==
    /// Checks if a record inserted at `inserted_at_ms` with `ttl_ms` has expired
    /// at the clock's current reading.
    pub fn is_expired(&self, inserted_at_ms: u64, ttl_ms: Option<u64>) -> bool {
        expired_at(inserted_at_ms, ttl_ms, self.clock.now_ms())
    }
}
