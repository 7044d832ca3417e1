//! Cache Store Module
//!
//! Cache operations wired on top of the record factory, expiration policy,
//! fallback resolver, transaction normalizer and scan predicate.

use std::fmt;
use std::hash::Hash;
use std::sync::Arc;

use tracing::{debug, info};

use crate::cache::{
    Clock, Committed, ExpirationPolicy, FallbackOutcome, FallbackResolver, Loader, MemoryTable,
    Record, RecordFactory, ScanExecutor, ScanPredicate, SystemClock, TableTx,
    TransactionNormalizer, TtlOverride,
};
use crate::config::CacheOptions;
use crate::error::{CacheError, Result};

// == Cache Store ==
/// In-memory cache with TTL expiration and fallback loading.
///
/// Every storage access goes through [`TransactionNormalizer`], so each
/// operation reports exactly `Ok` or `Err`.
#[derive(Debug)]
pub struct CacheStore<K, V> {
    options: CacheOptions<K, V>,
    table: MemoryTable<K, V>,
    clock: Arc<dyn Clock>,
    records: RecordFactory,
    expiration: ExpirationPolicy,
    scans: ScanPredicate,
}

impl<K, V> CacheStore<K, V>
where
    K: Eq + Hash + Clone + 'static,
    V: Clone + 'static,
{
    // == Constructor ==
    /// Creates a store reading time from the system clock.
    pub fn new(options: CacheOptions<K, V>) -> Self {
        Self::with_clock(options, Arc::new(SystemClock))
    }

    /// Creates a store reading time from `clock`.
    pub fn with_clock(options: CacheOptions<K, V>, clock: Arc<dyn Clock>) -> Self {
        Self {
            options,
            table: MemoryTable::new(),
            records: RecordFactory::new(Arc::clone(&clock)),
            expiration: ExpirationPolicy::new(Arc::clone(&clock)),
            scans: ScanPredicate::new(Arc::clone(&clock)),
            clock,
        }
    }

    // == Put ==
    /// Stores `value` under `key` as a fresh record.
    pub fn put(&self, key: K, value: V, ttl: TtlOverride) -> Result<bool> {
        let record = self
            .records
            .create(&self.options.cache_id, key, value, ttl, &self.options);

        TransactionNormalizer::run_with(
            &self.table,
            move |tx: &mut TableTx<K, V>| Ok(Committed::Value(tx.insert(record))),
            true,
        )
    }

    // == Get ==
    /// Returns the value of a live record.
    ///
    /// An expired record is removed on read and reported as absent.
    pub fn get(&self, key: &K) -> Result<Option<V>> {
        TransactionNormalizer::run(&self.table, |tx: &mut TableTx<K, V>| {
            let value = self
                .live(tx, key)
                .map(|record| record.value.clone());
            Ok(Committed::Value(value))
        })
    }

    // == Fetch ==
    /// Returns the live value for `key`, resolving a miss through the
    /// fallback chain.
    ///
    /// Hits come back as `Cached`. A `Loaded` value is written back with the
    /// default TTL; a `Cached` default is never written.
    pub fn fetch(
        &self,
        key: K,
        loader: Option<&Loader<K, V>>,
        default: V,
    ) -> Result<FallbackOutcome<V>> {
        if let Some(value) = self.get(&key)? {
            return Ok(FallbackOutcome::Cached(value));
        }

        let outcome = FallbackResolver::resolve(
            &key,
            loader,
            self.options.default_fallback.as_ref(),
            default,
            &self.options.fallback_args,
        );

        if let FallbackOutcome::Loaded(value) = &outcome {
            debug!("Writing back loaded fallback value");
            self.put(key, value.clone(), TtlOverride::Inherit)?;
        }

        Ok(outcome)
    }

    // == Delete ==
    /// Removes `key`. Returns true if a record existed.
    pub fn del(&self, key: &K) -> Result<bool> {
        TransactionNormalizer::run(&self.table, |tx: &mut TableTx<K, V>| {
            Ok(Committed::Value(tx.remove(key)))
        })
    }

    pub fn exists(&self, key: &K) -> Result<bool> {
        TransactionNormalizer::run(&self.table, |tx: &mut TableTx<K, V>| {
            Ok(Committed::Value(self.live(tx, key).is_some()))
        })
    }

    // == Time To Live ==
    /// Remaining TTL in milliseconds of a live record.
    ///
    /// None if the key is absent or its record never expires.
    pub fn ttl(&self, key: &K) -> Result<Option<u64>> {
        TransactionNormalizer::run(&self.table, |tx: &mut TableTx<K, V>| {
            let now = self.clock.now_ms();
            let remaining = self
                .live_at(tx, key, now)
                .and_then(|record| record.ttl_remaining_ms(now));
            Ok(Committed::Value(remaining))
        })
    }

    // == Expire ==
    /// Rewrites the record under `key` with a new TTL and insertion time.
    ///
    /// Fails with [`CacheError::NotFound`] if no live record exists.
    pub fn expire(&self, key: &K, ttl: TtlOverride) -> Result<()>
    where
        K: fmt::Debug,
    {
        TransactionNormalizer::run(&self.table, |tx: &mut TableTx<K, V>| {
            let Some(value) = self.live(tx, key).map(|record| record.value.clone()) else {
                return Ok(Committed::Error(CacheError::NotFound(format!("{:?}", key))));
            };

            let record = self
                .records
                .create(&self.options.cache_id, key.clone(), value, ttl, &self.options);
            tx.insert(record);
            Ok(Committed::Ok(()))
        })
    }

    /// Removes any TTL from the record under `key`.
    pub fn persist(&self, key: &K) -> Result<()>
    where
        K: fmt::Debug,
    {
        self.expire(key, TtlOverride::Immortal)
    }

    // == Scans ==
    pub fn keys(&self) -> Result<Vec<K>> {
        self.table.scan(&self.scans.keys())
    }

    pub fn values(&self) -> Result<Vec<V>> {
        self.table.scan(&self.scans.values())
    }

    pub fn records(&self) -> Result<Vec<Record<K, V>>> {
        self.table.scan(&self.scans.records())
    }

    /// Number of live records.
    pub fn size(&self) -> Result<usize> {
        let live = self.table.scan(&self.scans.build(|_: &Record<K, V>| ()))?;
        Ok(live.len())
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    // == Purge ==
    /// Removes every record expired at a single sampled instant.
    ///
    /// Returns the number of records removed.
    pub fn purge(&self) -> Result<usize> {
        let descriptor = self.scans.build(|_: &Record<K, V>| ());

        let removed = TransactionNormalizer::run(&self.table, |tx: &mut TableTx<K, V>| {
            let expired: Vec<K> = tx
                .records()
                .filter(|record| !descriptor.matches(record))
                .map(|record| record.key.clone())
                .collect();

            for key in &expired {
                tx.remove(key);
            }
            Ok(Committed::Value(expired.len()))
        })?;

        if removed > 0 {
            info!("Purged {} expired records", removed);
        } else {
            debug!("Purge found no expired records");
        }
        Ok(removed)
    }

    /// Returns the live record under `key`, dropping it if it has expired.
    fn live<'a>(&self, tx: &'a mut TableTx<K, V>, key: &K) -> Option<&'a Record<K, V>> {
        Self::live_where(tx, key, |record| {
            self.expiration
                .is_expired(record.inserted_at_ms, record.ttl_ms)
        })
    }

    /// Like `live`, judged at one already sampled instant.
    fn live_at<'a>(
        &self,
        tx: &'a mut TableTx<K, V>,
        key: &K,
        now_ms: u64,
    ) -> Option<&'a Record<K, V>> {
        Self::live_where(tx, key, |record| record.is_expired_at(now_ms))
    }

    fn live_where<'a>(
        tx: &'a mut TableTx<K, V>,
        key: &K,
        expired: impl Fn(&Record<K, V>) -> bool,
    ) -> Option<&'a Record<K, V>> {
        if expired(tx.get(key)?) {
            debug!("Dropping expired record on read");
            tx.remove(key);
            return None;
        }
        tx.get(key)
    }
}
