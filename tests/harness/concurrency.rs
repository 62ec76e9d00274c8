//! Concurrent first use of one harness.

use crate::common::*;
use seedbed::LifecycleEvent;
use std::sync::{Arc, Barrier};
use std::thread;

fn same<T: ?Sized>(a: &Arc<T>, b: &Arc<T>) -> bool {
    std::ptr::eq(Arc::as_ptr(a).cast::<u8>(), Arc::as_ptr(b).cast::<u8>())
}

#[test]
fn concurrent_sessions_initialize_once() {
    init_tracing();
    let num_threads = 8;
    let sink = Arc::new(RecordingSink::new());
    let harness = Arc::new(
        TestStore::builder()
            .catalog(user_catalog())
            .sink(sink.clone())
            .seed_data(fake_user_seed())
            .index_descriptors([USERS_SEARCH, USERS_TAGS_SUMMARY])
            .build(),
    );
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|i| {
            let harness = Arc::clone(&harness);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                let key = if i % 2 == 0 { "even" } else { "odd" };
                harness.session(key).unwrap()
            })
        })
        .collect();
    let sessions: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(
        sink.count(|e| matches!(e, LifecycleEvent::StoreInitialized { .. })),
        1
    );
    assert_eq!(
        sink.count(|e| matches!(e, LifecycleEvent::SeedCommitted { .. })),
        1
    );
    assert_eq!(harness.session_count(), 2);
    for (i, session) in sessions.iter().enumerate() {
        assert!(same(session, &sessions[i % 2]));
    }
    assert_eq!(
        harness.document_store().unwrap().statistics().unwrap().document_count,
        5
    );
}

#[test]
fn setters_race_with_first_use() {
    let num_threads = 4;
    let harness = Arc::new(user_harness());
    let barrier = Arc::new(Barrier::new(num_threads + 1));

    let setters: Vec<_> = (0..num_threads)
        .map(|_| {
            let harness = Arc::clone(&harness);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                harness.set_seed_data(fake_user_seed())
            })
        })
        .collect();

    barrier.wait();
    let store = harness.document_store().unwrap();

    let mut applied = 0;
    for handle in setters {
        match handle.join().unwrap() {
            Ok(()) => applied += 1,
            Err(HarnessError::ConfigurationLocked { field }) => assert_eq!(field, "seed_data"),
            Err(other) => panic!("unexpected error: {:?}", other),
        }
    }

    // seeded exactly when at least one setter got in before construction
    let expected = if applied > 0 { 5 } else { 0 };
    assert_eq!(store.statistics().unwrap().document_count, expected);
}
