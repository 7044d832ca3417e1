//! Memory Table Module
//!
//! HashMap-backed storage engine providing the transactional executor and the
//! scan executor the cache runs on.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{trace, warn};

use crate::cache::{
    Committed, Record, ScanDescriptor, ScanExecutor, Transaction, TransactionExecutor,
};
use crate::error::CacheError;

// == Table Transaction ==
/// Write handle given to a transaction operation.
///
/// Every write is journaled so an aborted operation can be rolled back.
#[derive(Debug)]
pub struct TableTx<K, V> {
    records: HashMap<K, Record<K, V>>,
    undo: Vec<(K, Option<Record<K, V>>)>,
}

impl<K, V> TableTx<K, V>
where
    K: Eq + Hash + Clone,
{
    fn begin(records: HashMap<K, Record<K, V>>) -> Self {
        Self {
            records,
            undo: Vec::new(),
        }
    }

    pub fn get(&self, key: &K) -> Option<&Record<K, V>> {
        self.records.get(key)
    }

    /// Stores `record` under its key. Returns true if a record was replaced.
    pub fn insert(&mut self, record: Record<K, V>) -> bool {
        let key = record.key.clone();
        let previous = self.records.insert(key.clone(), record);
        let replaced = previous.is_some();
        self.undo.push((key, previous));
        replaced
    }

    /// Removes the record under `key`. Returns true if one existed.
    pub fn remove(&mut self, key: &K) -> bool {
        match self.records.remove(key) {
            Some(previous) => {
                self.undo.push((key.clone(), Some(previous)));
                true
            }
            None => false,
        }
    }

    pub fn records(&self) -> impl Iterator<Item = &Record<K, V>> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn rollback(&mut self) {
        while let Some((key, previous)) = self.undo.pop() {
            match previous {
                Some(record) => {
                    self.records.insert(key, record);
                }
                None => {
                    self.records.remove(&key);
                }
            }
        }
    }
}

// == Pending Transaction ==
/// Holds the locked records for the duration of one operation.
///
/// Dropping it without a commit undoes every journaled write, and the records
/// always go back under the lock, also when the operation unwinds.
struct Pending<'g, K, V>
where
    K: Eq + Hash + Clone,
{
    slot: &'g mut HashMap<K, Record<K, V>>,
    tx: TableTx<K, V>,
}

impl<'g, K, V> Pending<'g, K, V>
where
    K: Eq + Hash + Clone,
{
    fn begin(slot: &'g mut HashMap<K, Record<K, V>>) -> Self {
        let tx = TableTx::begin(std::mem::take(slot));
        Self { slot, tx }
    }

    fn commit(mut self) {
        self.tx.undo.clear();
    }
}

impl<K, V> Drop for Pending<'_, K, V>
where
    K: Eq + Hash + Clone,
{
    fn drop(&mut self) {
        if !self.tx.undo.is_empty() {
            trace!("Rolling back {} writes", self.tx.undo.len());
            self.tx.rollback();
        }
        *self.slot = std::mem::take(&mut self.tx.records);
    }
}

// == Memory Table ==
/// In-memory table guarded by a single lock.
///
/// Transactions are serialized on the write lock; scans share the read lock.
/// A panicking operation is rolled back before the lock is released, so a
/// poisoned lock still guards consistent data and is recovered.
#[derive(Debug)]
pub struct MemoryTable<K, V> {
    records: RwLock<HashMap<K, Record<K, V>>>,
}

impl<K, V> Default for MemoryTable<K, V> {
    fn default() -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
        }
    }
}

impl<K, V> MemoryTable<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records, expired ones included.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, Record<K, V>>> {
        self.records.read().unwrap_or_else(|poisoned| {
            warn!("Recovering table lock poisoned by a panicked transaction");
            poisoned.into_inner()
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, Record<K, V>>> {
        self.records.write().unwrap_or_else(|poisoned| {
            warn!("Recovering table lock poisoned by a panicked transaction");
            poisoned.into_inner()
        })
    }
}

impl<K, V> TransactionExecutor for MemoryTable<K, V>
where
    K: Eq + Hash + Clone,
{
    type Table = TableTx<K, V>;
    type Reason = CacheError;

    fn execute<T, F>(&self, operation: F) -> Transaction<T, Self::Reason>
    where
        F: FnOnce(&mut Self::Table) -> Result<Committed<T, Self::Reason>, Self::Reason>,
    {
        let mut guard = self.write();
        let mut pending = Pending::begin(&mut guard);

        match operation(&mut pending.tx) {
            Ok(committed) => {
                pending.commit();
                Transaction::Atomic(committed)
            }
            Err(reason) => Transaction::Aborted(reason),
        }
    }
}

impl<K, V> ScanExecutor<K, V> for MemoryTable<K, V>
where
    K: Eq + Hash + Clone,
{
    type Error = CacheError;

    fn scan<O>(&self, descriptor: &ScanDescriptor<K, V, O>) -> Result<Vec<O>, Self::Error> {
        Ok(self
            .read()
            .values()
            .filter_map(|record| descriptor.select(record))
            .collect())
    }
}
