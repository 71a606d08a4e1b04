//! Multi-threaded tests for page locking through the buffer pool.

use heapstore::{
    BufferPoolManager, Error, Field, FieldType, LockMode, PageId, StorageConfig, TableId,
    TransactionId, Tuple, TupleDesc,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn desc() -> TupleDesc {
    TupleDesc::new(vec![FieldType::Int])
}

fn row(n: i32) -> Tuple {
    Tuple::new(vec![Field::Int(n)])
}

/// Helper: a shared pool with one table of `pages` empty pages. Waits give
/// up after a few seconds so a broken lock manager fails instead of hanging.
fn create_bpm(pages: u32) -> (Arc<BufferPoolManager>, TableId, tempfile::TempDir) {
    let dir = tempdir().unwrap();
    let config = StorageConfig::default()
        .with_page_size(256)
        .with_pool_pages(16)
        .with_lock_timeout(Duration::from_secs(10));
    let bpm = BufferPoolManager::new(config);
    let table = bpm.create_table(dir.path().join("t.dat"), desc()).unwrap();
    let file = bpm.table(table).unwrap();
    for _ in 0..pages {
        file.append_empty_page().unwrap();
    }
    (Arc::new(bpm), table, dir)
}

/// A reader waits for an uncommitted writer, then sees its data.
#[test]
fn test_reader_blocks_until_writer_commits() {
    init_logging();
    let (bpm, table, _dir) = create_bpm(1);
    let page_id = PageId::new(table, 0);

    let writer = TransactionId::new();
    bpm.insert_tuple(writer, table, row(42)).unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let child = {
        let bpm = Arc::clone(&bpm);
        let done = Arc::clone(&done);
        thread::spawn(move || {
            let reader = TransactionId::new();
            let count = bpm.fetch_page_read(reader, page_id).unwrap().tuples().count();
            done.store(true, Ordering::SeqCst);
            bpm.transaction_complete(reader, true).unwrap();
            count
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!done.load(Ordering::SeqCst), "reader got past an exclusive lock");

    bpm.transaction_complete(writer, true).unwrap();
    assert_eq!(child.join().unwrap(), 1);
}

/// Any number of readers share a page.
#[test]
fn test_readers_share_page() {
    let (bpm, table, _dir) = create_bpm(1);
    let page_id = PageId::new(table, 0);
    let barrier = Arc::new(Barrier::new(4));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let bpm = Arc::clone(&bpm);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let tid = TransactionId::new();
                drop(bpm.fetch_page_read(tid, page_id).unwrap());
                // Everyone holds the shared lock at once
                barrier.wait();
                assert!(bpm.holds_lock(tid, page_id));
                barrier.wait();
                bpm.transaction_complete(tid, true).unwrap();
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(bpm.lock_manager().locked_page_count(), 0);
}

/// A sole reader upgrades in place; a shared page refuses the upgrade.
#[test]
fn test_lock_upgrade() {
    let (bpm, table, _dir) = create_bpm(1);
    let page_id = PageId::new(table, 0);
    let lm = bpm.lock_manager();

    let t1 = TransactionId::new();
    let t2 = TransactionId::new();
    drop(bpm.fetch_page_read(t1, page_id).unwrap());
    drop(bpm.fetch_page_read(t2, page_id).unwrap());

    assert!(!lm.try_acquire(page_id, t1, LockMode::Exclusive).unwrap());
    bpm.transaction_complete(t2, true).unwrap();

    drop(bpm.fetch_page_write(t1, page_id).unwrap());
    assert_eq!(lm.lock_mode(page_id), Some(LockMode::Exclusive));
}

/// Two transactions each wanting the other's page: exactly one is refused
/// with a deadlock, and the other completes once it aborts.
#[test]
fn test_deadlock_one_victim() {
    init_logging();
    let (bpm, table, _dir) = create_bpm(2);
    let barrier = Arc::new(Barrier::new(2));

    let handles: Vec<_> = [(0, 1), (1, 0)]
        .into_iter()
        .map(|(first, second)| {
            let bpm = Arc::clone(&bpm);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let tid = TransactionId::new();
                drop(bpm.fetch_page_read(tid, PageId::new(table, first)).unwrap());
                barrier.wait();

                let result = bpm
                    .fetch_page_write(tid, PageId::new(table, second))
                    .map(drop);
                let commit = result.is_ok();
                bpm.transaction_complete(tid, commit).unwrap();
                result
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let failures: Vec<&Error> = results.iter().filter_map(|r| r.as_ref().err()).collect();

    assert_eq!(failures.len(), 1, "results: {:?}", results);
    assert!(matches!(failures[0], Error::Deadlock { .. }));
    assert!(failures[0].is_abort());
    assert_eq!(bpm.stats().snapshot().deadlocks, 1);
    assert_eq!(bpm.lock_manager().locked_page_count(), 0);
}

/// A configured timeout turns an endless wait into an abortable error.
#[test]
fn test_lock_timeout() {
    let dir = tempdir().unwrap();
    let config = StorageConfig::default()
        .with_page_size(256)
        .with_lock_timeout(Duration::from_millis(50));
    let bpm = BufferPoolManager::new(config);
    let table = bpm.create_table(dir.path().join("t.dat"), desc()).unwrap();

    let t1 = TransactionId::new();
    bpm.insert_tuple(t1, table, row(1)).unwrap();

    let t2 = TransactionId::new();
    let err = bpm.fetch_page_read(t2, PageId::new(table, 0)).err().unwrap();
    assert!(matches!(err, Error::LockTimeout { .. }));
    assert!(err.is_abort());
    bpm.transaction_complete(t2, false).unwrap();

    // The writer is unaffected
    bpm.transaction_complete(t1, true).unwrap();
}

/// Concurrent inserting transactions lose no tuples.
#[test]
fn test_concurrent_inserts() {
    init_logging();
    let (bpm, table, _dir) = create_bpm(0);

    let handles: Vec<_> = (0..4)
        .map(|worker| {
            let bpm = Arc::clone(&bpm);
            thread::spawn(move || {
                for i in 0..10 {
                    loop {
                        let tid = TransactionId::new();
                        match bpm.insert_tuple(tid, table, row(worker * 100 + i)) {
                            Ok(()) => {
                                bpm.transaction_complete(tid, true).unwrap();
                                break;
                            }
                            Err(e) if e.is_abort() => {
                                bpm.transaction_complete(tid, false).unwrap();
                            }
                            Err(e) => panic!("insert failed: {}", e),
                        }
                    }
                }
            })
        })
        .collect();

    for h in handles {
        h.join().unwrap();
    }

    let tid = TransactionId::new();
    let mut seen: Vec<i32> = bpm
        .scan(tid, table)
        .unwrap()
        .map(|t| t.unwrap().field(0).and_then(Field::as_int).unwrap())
        .collect();
    seen.sort();

    let mut expected: Vec<i32> = (0..4)
        .flat_map(|w| (0..10).map(move |i| w * 100 + i))
        .collect();
    expected.sort();
    assert_eq!(seen, expected);
}
