//! Integration Tests for the Cache
//!
//! Drives the public API end to end with a manually controlled clock.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use serde_json::{json, Value};
use ttl_cache::cache::{
    normalize, Committed, ExpirationPolicy, FallbackResolver, ManualClock, MemoryTable,
    RecordFactory, ScanExecutor, ScanPredicate, TableTx, Transaction, TransactionNormalizer,
};
use ttl_cache::{
    CacheError, CacheOptions, CacheStore, Config, FallbackOutcome, Loader, Record, TtlOverride,
};

// == Helper Functions ==

fn store_at(
    now_ms: u64,
    default_ttl: Option<u64>,
) -> (CacheStore<String, i64>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(now_ms));
    let config = Config {
        cache_id: "integration".to_string(),
        default_ttl,
        fallback_args: Vec::new(),
    };
    let store = CacheStore::with_clock(CacheOptions::from_config(&config), clock.clone());
    (store, clock)
}

fn key(k: &str) -> String {
    k.to_string()
}

// == Record Creation ==

#[test]
fn test_create_uses_default_ttl() {
    let factory = RecordFactory::new(Arc::new(ManualClock::new(1000)));
    let options: CacheOptions<&str, i64> = CacheOptions {
        default_ttl: Some(5000),
        ..CacheOptions::default()
    };

    let record = factory.create("cache", "a", 1, TtlOverride::Inherit, &options);

    assert_eq!(
        record,
        Record {
            cache_id: "cache".to_string(),
            key: "a",
            inserted_at_ms: 1000,
            ttl_ms: Some(5000),
            value: 1,
        }
    );
}

// == Expiration ==

#[test]
fn test_expiration_boundary() {
    let clock = Arc::new(ManualClock::new(1600));
    let policy = ExpirationPolicy::new(clock.clone());
    assert!(policy.is_expired(1000, Some(500)));

    clock.set(1500);
    assert!(!policy.is_expired(1000, Some(500)));
}

#[test]
fn test_put_then_read_across_expiry() {
    let (store, clock) = store_at(1000, Some(500));
    store.put(key("session"), 7, TtlOverride::Inherit).unwrap();

    clock.set(1500);
    assert_eq!(store.get(&key("session")), Ok(Some(7)));
    assert_eq!(store.ttl(&key("session")), Ok(Some(0)));

    clock.set(1501);
    assert_eq!(store.get(&key("session")), Ok(None));
    assert_eq!(store.exists(&key("session")), Ok(false));
}

#[test]
fn test_rewrite_resets_insertion_time() {
    let (store, clock) = store_at(1000, Some(500));
    store.put(key("a"), 1, TtlOverride::Inherit).unwrap();

    clock.set(1400);
    store.put(key("a"), 2, TtlOverride::Inherit).unwrap();

    clock.set(1800);
    assert_eq!(store.get(&key("a")), Ok(Some(2)));
}

// == Fallback ==

#[test]
fn test_resolve_with_explicit_key_loader() {
    let loader = Loader::key(|k: &i64| k * 2);
    assert_eq!(
        FallbackResolver::resolve(&5, Some(&loader), None, 0, &[]),
        FallbackOutcome::Loaded(10)
    );
}

#[test]
fn test_resolve_without_loader() {
    assert_eq!(
        FallbackResolver::resolve::<i64, &str>(&5, None, None, "missing", &[]),
        FallbackOutcome::Cached("missing")
    );
}

#[test]
fn test_fetch_writes_back_only_loaded_values() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = Loader::key(move |k: &String| {
        counter.fetch_add(1, Ordering::SeqCst);
        k.len() as i64
    });
    let (store, _) = store_at(0, None);

    assert_eq!(
        store.fetch(key("four"), Some(&loader), 0),
        Ok(FallbackOutcome::Loaded(4))
    );
    assert_eq!(
        store.fetch(key("four"), Some(&loader), 0),
        Ok(FallbackOutcome::Cached(4))
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    assert_eq!(
        store.fetch(key("none"), None, -1),
        Ok(FallbackOutcome::Cached(-1))
    );
    assert_eq!(store.get(&key("none")), Ok(None));
}

#[test]
fn test_fetch_with_mismatched_default_loader_falls_back() {
    let clock = Arc::new(ManualClock::new(0));
    let config = Config {
        cache_id: "mismatch".to_string(),
        default_ttl: None,
        fallback_args: vec![json!("only-one")],
    };
    let options = CacheOptions::from_config(&config)
        .with_fallback(Loader::with_args(2, |_: &String, _: &[Value]| 1i64));
    let store = CacheStore::with_clock(options, clock);

    assert_eq!(
        store.fetch(key("a"), None, 0),
        Ok(FallbackOutcome::Cached(0))
    );
    assert_eq!(store.len(), 0);
}

// == Transactions ==

#[test]
fn test_normalize_scenarios() {
    assert_eq!(
        normalize::<i64, _>(Transaction::Atomic(Committed::Error("conflict"))),
        Err("conflict")
    );
    assert_eq!(
        normalize::<i64, _>(Transaction::Aborted("timeout")),
        Err("timeout")
    );
    assert_eq!(
        normalize::<_, &str>(Transaction::Atomic(Committed::Value(42))),
        Ok(42)
    );
}

#[test]
fn test_aborted_transaction_leaves_table_untouched() {
    let table: MemoryTable<String, i64> = MemoryTable::new();
    let factory = RecordFactory::new(Arc::new(ManualClock::new(0)));
    let options = CacheOptions::default();

    let result: Result<(), CacheError> =
        TransactionNormalizer::run(&table, |tx: &mut TableTx<String, i64>| {
            tx.insert(factory.create("t", key("a"), 1, TtlOverride::Inherit, &options));
            Err(CacheError::Aborted("conflict".to_string()))
        });

    assert_eq!(result, Err(CacheError::Aborted("conflict".to_string())));
    assert!(table.is_empty());
}

#[test]
fn test_panicking_transaction_keeps_prior_records() {
    let table: MemoryTable<String, i64> = MemoryTable::new();
    let factory = RecordFactory::new(Arc::new(ManualClock::new(0)));
    let options = CacheOptions::default();

    TransactionNormalizer::run(&table, |tx: &mut TableTx<String, i64>| {
        tx.insert(factory.create("t", key("a"), 1, TtlOverride::Immortal, &options));
        tx.insert(factory.create("t", key("b"), 2, TtlOverride::Immortal, &options));
        Ok(Committed::Value(()))
    })
    .unwrap();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        TransactionNormalizer::run(
            &table,
            |tx: &mut TableTx<String, i64>| -> Result<Committed<(), CacheError>, CacheError> {
                tx.remove(&key("a"));
                panic!("boom")
            },
        )
    }));
    assert!(outcome.is_err());
    assert_eq!(table.len(), 2);

    let count = TransactionNormalizer::run(&table, |tx: &mut TableTx<String, i64>| {
        Ok(Committed::Value(tx.len()))
    });
    assert_eq!(count, Ok(2));
}

#[test]
fn test_expire_missing_key_reports_not_found() {
    let (store, _) = store_at(0, None);
    assert!(matches!(
        store.expire(&key("ghost"), TtlOverride::Millis(10)),
        Err(CacheError::NotFound(_))
    ));
}

// == Concurrency ==

#[test]
fn test_shared_store_across_threads() {
    let (store, _) = store_at(0, None);
    let store = Arc::new(store);

    thread::scope(|s| {
        for t in 0..8i64 {
            let store = Arc::clone(&store);
            s.spawn(move || {
                for i in 0..10i64 {
                    let k = format!("{}:{}", t, i);
                    store.put(k.clone(), t * i, TtlOverride::Inherit).unwrap();
                    assert_eq!(store.get(&k), Ok(Some(t * i)));
                }
                assert_eq!(store.purge(), Ok(0));
            });
        }
    });

    assert_eq!(store.size(), Ok(80));
    assert_eq!(store.len(), 80);
}

// == Scans ==

#[test]
fn test_scan_scenario() {
    let (store, clock) = store_at(1000, None);
    store.put(key("A"), 1, TtlOverride::Millis(5000)).unwrap();
    clock.set(9000);
    store.put(key("B"), 2, TtlOverride::Immortal).unwrap();
    clock.set(9500);
    store.put(key("C"), 3, TtlOverride::Millis(1000)).unwrap();

    clock.set(10_000);
    let mut keys = store.keys().unwrap();
    keys.sort();
    assert_eq!(keys, vec![key("B"), key("C")]);

    assert_eq!(store.purge(), Ok(1));
    assert_eq!(store.len(), 2);
}

#[test]
fn test_scan_projects_custom_field() {
    let table: MemoryTable<String, i64> = MemoryTable::new();
    let clock = Arc::new(ManualClock::new(100));
    let factory = RecordFactory::new(clock.clone());
    let options = CacheOptions::default();

    TransactionNormalizer::run(&table, |tx: &mut TableTx<String, i64>| {
        tx.insert(factory.create("t", key("a"), 1, TtlOverride::Millis(10), &options));
        tx.insert(factory.create("t", key("b"), 2, TtlOverride::Immortal, &options));
        Ok(Committed::Value(()))
    })
    .unwrap();

    clock.set(200);
    let descriptor =
        ScanPredicate::new(clock.clone()).build(|r: &Record<String, i64>| r.inserted_at_ms);
    assert_eq!(table.scan(&descriptor), Ok(vec![100]));
}
