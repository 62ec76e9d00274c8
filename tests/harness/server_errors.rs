//! Server-reported indexing errors at initialization and at dispose.

use crate::common::*;
use seedbed::LifecycleEvent;
use std::sync::Arc;

#[test]
fn bad_index_fails_initialization() {
    let harness = user_harness();
    harness.set_seed_data(fake_user_seed()).unwrap();
    harness.set_scan_modules(["broken"]).unwrap();

    let err = harness.document_store().err().expect("server errors");

    match &err {
        HarnessError::ServerReportedErrors { errors } => {
            assert_eq!(errors.len(), 4);
            assert_eq!(errors[0].document_id.as_deref(), Some("Users/1"));
            assert_eq!(errors[0].index_name.as_deref(), Some("Users/Broken"));
        }
        other => panic!("expected ServerReportedErrors, got {:?}", other),
    }
    let message = err.to_string();
    assert!(message.contains("Document: Users/1; Index: Users/Broken; Error: cannot index Users/1"));

    // memoized, and the partially initialized store still closes cleanly
    assert_eq!(harness.document_store().err(), Some(err));
    harness.close().unwrap();
}

#[test]
fn warnings_mode_tolerates_bad_index() {
    init_tracing();
    let sink = Arc::new(RecordingSink::new());
    let harness = TestStore::builder()
        .catalog(user_catalog())
        .sink(sink.clone())
        .seed_data(fake_user_seed())
        .scan_modules(["users", "broken"])
        .build();
    harness.set_server_errors_as_warnings(true).unwrap();

    let stats = harness.document_store().unwrap().statistics().unwrap();

    assert_eq!(stats.errors.len(), 4);
    assert_eq!(stats.index_count, 3);
    assert_eq!(
        sink.count(|e| matches!(e, LifecycleEvent::ServerErrorsDowngraded { errors } if errors.len() == 4)),
        1
    );

    // the same policy applies at dispose
    harness.close().unwrap();
    assert_eq!(
        sink.count(|e| matches!(e, LifecycleEvent::ServerErrorsDowngraded { .. })),
        2
    );
}

#[test]
fn errors_after_initialization_surface_at_close() {
    let harness = user_harness();
    harness.set_index_descriptors([USERS_TAGS_SUMMARY]).unwrap();

    let session = harness.default_session().unwrap();
    // no Tags array: the map step fails for this document
    let id = session
        .store(User::COLLECTION, serde_json::json!({ "Name": "Tagless" }))
        .unwrap();
    session.commit().unwrap();
    session.query(&Query::index(USERS_TAGS_SUMMARY)).unwrap();

    let store = harness.document_store().unwrap();
    match harness.close() {
        Err(HarnessError::ServerReportedErrors { errors }) => {
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0].document_id.as_deref(), Some(id.as_str()));
        }
        other => panic!("expected ServerReportedErrors, got {:?}", other),
    }
    // cleanup ran despite the failed assertion
    assert!(store.is_closed());
    assert_eq!(harness.session_count(), 0);
}
