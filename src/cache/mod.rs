//! Cache Module
//!
//! Record lifecycle for an in-memory cache: record construction, TTL
//! expiration, fallback loading, transaction normalization and filtered scans.

mod clock;
mod expiration;
mod fallback;
mod record;
mod scan;
mod store;
mod table;
mod transaction;


// Re-export public types
pub use clock::{Clock, ManualClock, SystemClock};
pub use expiration::{expired_at, ExpirationPolicy};
pub use fallback::{FallbackOutcome, FallbackResolver, Loader};
pub use record::{Record, RecordFactory, TtlOverride};
pub use scan::{ScanDescriptor, ScanExecutor, ScanPredicate};
pub use store::CacheStore;
pub use table::{MemoryTable, TableTx};
pub use transaction::{
    normalize, normalize_with, Committed, Transaction, TransactionExecutor,
    TransactionNormalizer, TransactionResult,
};
