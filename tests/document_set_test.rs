/*!
 * Document Set Locking Tests
 *
 * Per-document latch acquisition in ascending id order and the
 * "release only what you still hold" unlock contract.
 */

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use xylem_locking::core::types::current_thread_token;
use xylem_locking::{DefaultDocumentSet, LockError, LockManager, LockingConfig};

const CONCURRENCY_LEVEL: u32 = 100;

fn set_of(ids: &[u64]) -> DefaultDocumentSet {
    ids.iter().copied().collect()
}

#[test]
fn shared_lock_and_unlock_round_trip() {
    let manager = LockManager::new(CONCURRENCY_LEVEL).unwrap();
    let documents = set_of(&[3, 1, 2]);
    let me = current_thread_token();

    manager.lock_documents(&documents, false).unwrap();
    for id in [1, 2, 3] {
        assert!(manager.get_document_latch(id).is_held_for_read_by(me));
    }

    manager.unlock_documents(&documents, false);
    for id in [1, 2, 3] {
        assert!(!manager.get_document_latch(id).is_held_for_read_by(me));
    }
}

#[test]
fn exclusive_lock_blocks_other_threads() {
    let manager = Arc::new(LockManager::new(CONCURRENCY_LEVEL).unwrap());
    let documents = set_of(&[10, 11]);

    manager.lock_documents(&documents, true).unwrap();

    let remote = Arc::clone(&manager);
    let blocked = thread::spawn(move || {
        let latch = remote.get_document_latch(10);
        !latch.acquire_read(Some(Instant::now() + Duration::from_millis(50)))
    })
    .join()
    .unwrap();
    assert!(blocked);

    manager.unlock_documents(&documents, true);

    let remote = Arc::clone(&manager);
    let acquired = thread::spawn(move || {
        let latch = remote.get_document_latch(10);
        let ok = latch.acquire_read(Some(Instant::now() + Duration::from_secs(1)));
        if ok {
            latch.release_read();
        }
        ok
    })
    .join()
    .unwrap();
    assert!(acquired);
}

/// Unlocking a superset releases only the documents this thread holds;
/// ids that were never locked are skipped via the hold query
#[test]
fn unlock_skips_documents_not_held() {
    let manager = LockManager::new(CONCURRENCY_LEVEL).unwrap();
    let locked = set_of(&[20, 21]);
    let superset = set_of(&[20, 21, 22, 23]);
    let me = current_thread_token();

    manager.lock_documents(&locked, false).unwrap();
    manager.unlock_documents(&superset, false);

    for id in [20, 21, 22, 23] {
        assert!(!manager.get_document_latch(id).is_held_for_read_by(me));
    }
}

#[test]
fn unlock_twice_is_harmless() {
    let manager = LockManager::new(CONCURRENCY_LEVEL).unwrap();
    let documents = set_of(&[30, 31]);

    manager.lock_documents(&documents, true).unwrap();
    manager.unlock_documents(&documents, true);
    manager.unlock_documents(&documents, true);

    let me = current_thread_token();
    assert!(!manager.get_document_latch(30).is_held_for_write_by(me));
}

/// Unlock in one mode leaves holds of the other mode untouched
#[test]
fn unlock_is_mode_selective() {
    let manager = LockManager::new(CONCURRENCY_LEVEL).unwrap();
    let documents = set_of(&[40]);
    let me = current_thread_token();

    manager.lock_documents(&documents, false).unwrap();
    manager.unlock_documents(&documents, true);
    assert!(manager.get_document_latch(40).is_held_for_read_by(me));

    manager.unlock_documents(&documents, false);
    assert!(!manager.get_document_latch(40).is_held_for_read_by(me));
}

#[test]
fn timeout_unwinds_partially_locked_set() {
    let config = LockingConfig::default()
        .with_concurrency_level(CONCURRENCY_LEVEL)
        .with_lock_timeout(Duration::from_millis(50));
    let manager = Arc::new(LockManager::with_config(&config).unwrap());

    // Another thread exclusively holds the middle document
    let blocker = manager.get_document_latch(51);
    let (started_tx, started_rx) = std::sync::mpsc::channel();
    let holder = {
        let blocker = Arc::clone(&blocker);
        thread::spawn(move || {
            assert!(blocker.acquire_write(None));
            started_tx.send(()).unwrap();
            thread::sleep(Duration::from_millis(300));
            blocker.release_write();
        })
    };
    started_rx.recv().unwrap();

    let documents = set_of(&[50, 51, 52]);
    let result = manager.lock_documents(&documents, false);
    assert!(matches!(result, Err(LockError::Timeout { .. })));

    // Document 50 was acquired before the timeout and must be unwound
    let me = current_thread_token();
    assert!(!manager.get_document_latch(50).is_held_for_read_by(me));
    assert!(!manager.get_document_latch(52).is_held_for_read_by(me));

    holder.join().unwrap();
}

/// Overlapping sets locked exclusively by concurrent threads complete
/// because acquisition order is ascending by id for everyone
#[test]
fn overlapping_exclusive_sets_never_deadlock() {
    let manager = Arc::new(LockManager::new(CONCURRENCY_LEVEL).unwrap());
    let mut workers = Vec::new();

    for worker in 0..4u64 {
        let manager = Arc::clone(&manager);
        workers.push(thread::spawn(move || {
            for round in 0..50u64 {
                let base = (worker + round) % 3;
                let documents: DefaultDocumentSet =
                    (base * 10..base * 10 + 15).collect();
                manager.lock_documents(&documents, true).unwrap();
                manager.unlock_documents(&documents, true);
            }
        }));
    }

    for worker in workers {
        worker.join().unwrap();
    }
}
