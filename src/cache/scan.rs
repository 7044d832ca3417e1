//! Scan Module
//!
//! Describes full-table scans that skip expired records and project each
//! surviving record to a single field.

use std::fmt;
use std::sync::Arc;

use crate::cache::{Clock, Record};

type Projection<K, V, O> = Box<dyn Fn(&Record<K, V>) -> O + Send + Sync>;

// == Scan Descriptor ==
/// Filter and projection handed to a scan executor.
///
/// The liveness filter is evaluated against `now_ms`, sampled once when the
/// descriptor was built, so every row of one scan sees the same instant.
pub struct ScanDescriptor<K, V, O> {
    now_ms: u64,
    project: Projection<K, V, O>,
}

impl<K, V, O> ScanDescriptor<K, V, O> {
    /// Instant every record in this scan is judged against.
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Checks whether `record` is alive at the scan instant.
    pub fn matches(&self, record: &Record<K, V>) -> bool {
        !record.is_expired_at(self.now_ms)
    }

    /// Projects `record` if it matches.
    pub fn select(&self, record: &Record<K, V>) -> Option<O> {
        self.matches(record).then(|| (self.project)(record))
    }
}

impl<K, V, O> fmt::Debug for ScanDescriptor<K, V, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanDescriptor")
            .field("now_ms", &self.now_ms)
            .finish_non_exhaustive()
    }
}

// == Scan Executor ==
/// A storage engine able to iterate its table with a descriptor.
pub trait ScanExecutor<K, V> {
    type Error;

    /// Returns the projections of every record the descriptor selects.
    fn scan<O>(&self, descriptor: &ScanDescriptor<K, V, O>) -> Result<Vec<O>, Self::Error>;
}

// == Scan Predicate ==
/// Builds scan descriptors stamped with the clock's current reading.
#[derive(Debug, Clone)]
pub struct ScanPredicate {
    clock: Arc<dyn Clock>,
}

impl ScanPredicate {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Builds a descriptor projecting with `project`.
    pub fn build<K, V, O>(
        &self,
        project: impl Fn(&Record<K, V>) -> O + Send + Sync + 'static,
    ) -> ScanDescriptor<K, V, O> {
        ScanDescriptor {
            now_ms: self.clock.now_ms(),
            project: Box::new(project),
        }
    }

    /// Projects whole records.
    pub fn records<K, V>(&self) -> ScanDescriptor<K, V, Record<K, V>>
    where
        K: Clone + 'static,
        V: Clone + 'static,
    {
        self.build(Record::clone)
    }

    pub fn keys<K, V>(&self) -> ScanDescriptor<K, V, K>
    where
        K: Clone + 'static,
        V: 'static,
    {
        self.build(|record: &Record<K, V>| record.key.clone())
    }

    pub fn values<K, V>(&self) -> ScanDescriptor<K, V, V>
    where
        K: 'static,
        V: Clone + 'static,
    {
        self.build(|record: &Record<K, V>| record.value.clone())
    }
}
