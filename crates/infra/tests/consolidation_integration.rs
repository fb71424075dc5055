//! End-to-end consolidation tests over a real SQLite database.
//!
//! Exercises the engine through the SQLite-backed stores: on-demand
//! consolidation, eligibility gating, snapshot re-checks, force close, and
//! the staleness sweep.

use std::sync::Arc;

use chrono::{Duration, Utc};
use worklog_core::{ActivityDirectory, ConsolidationService, RawRecordStore};
use worklog_domain::{
    AccountingPolicy, ConsolidationOutcome, RecordKind, RecordStatus, ScopeKey,
};
use worklog_infra::{
    SqliteActivityDirectory, SqliteTimeClockingRepository, SqliteTimeEntryRepository,
    SqliteWorkProofRepository,
};

mod support;

use support::{closed_proof, open_proof, pending_clocking, test_date, TestDatabase};

fn clocking_service(db: &TestDatabase) -> ConsolidationService {
    ConsolidationService::new(
        RecordKind::TimeClocking,
        Arc::new(SqliteTimeClockingRepository::new(Arc::clone(&db.manager))),
        Arc::new(SqliteActivityDirectory::new(Arc::clone(&db.manager))),
    )
}

fn proof_service(db: &TestDatabase) -> ConsolidationService {
    ConsolidationService::new(
        RecordKind::WorkProof,
        Arc::new(SqliteWorkProofRepository::new(Arc::clone(&db.manager))),
        Arc::new(SqliteActivityDirectory::new(Arc::clone(&db.manager))),
    )
}

#[tokio::test]
async fn clockings_consolidate_into_one_entry_end_to_end() {
    let db = TestDatabase::new();
    let store = SqliteTimeClockingRepository::new(Arc::clone(&db.manager));
    let service = clocking_service(&db);

    for hours in [1.5, 2.0, 0.5] {
        store.insert(pending_clocking(42, 7, hours)).await.expect("insert clocking");
    }

    let scope = ScopeKey::new(42, 7, test_date());
    let outcome = service
        .consolidate_scope(&scope, AccountingPolicy::Sum)
        .await
        .expect("consolidation succeeds");

    let entry = match outcome {
        ConsolidationOutcome::Consolidated(entry) => entry,
        ConsolidationOutcome::NoOp => panic!("expected a consolidated entry"),
    };
    assert_eq!(entry.hours, 4.0);
    assert_eq!(entry.issue_id, 42);
    assert_eq!(entry.user_id, 7);
    assert_eq!(entry.spent_on, test_date());
    // No activities seeded, so the directory fallback applies.
    assert_eq!(entry.activity_id, 9);
    assert_eq!(entry.comments, "Consolidated from 3 time clocking(s) - 4h");

    // Every source row now points at the entry.
    for id in 1..=3 {
        let record = store.find_by_id(id).await.expect("lookup").expect("row exists");
        assert_eq!(record.status, RecordStatus::Consolidated);
        assert!(record.consolidated);
        assert_eq!(record.time_entry_id, Some(entry.id));
        assert!(record.consolidated_at.is_some());
    }

    // Repeat call is a no-op and creates nothing new.
    let repeat = service
        .consolidate_scope(&scope, AccountingPolicy::Sum)
        .await
        .expect("repeat succeeds");
    assert!(repeat.is_noop());

    let entries = SqliteTimeEntryRepository::new(Arc::clone(&db.manager));
    assert_eq!(entries.count().await.expect("count"), 1);
}

#[tokio::test]
async fn open_proofs_are_not_selected_until_closed() {
    let db = TestDatabase::new();
    let store = SqliteWorkProofRepository::new(Arc::clone(&db.manager));
    let service = proof_service(&db);

    store.insert(closed_proof(10, 3, 1.25)).await.expect("insert closed proof");
    store.insert(closed_proof(10, 3, 0.75)).await.expect("insert second proof");
    store.insert(open_proof(10, 3)).await.expect("insert open proof");

    let scope = ScopeKey::new(10, 3, test_date());
    let eligible = store.find_eligible(&scope).await.expect("eligible query");
    assert_eq!(eligible.len(), 2);

    let outcome = service
        .consolidate_scope(&scope, AccountingPolicy::Sum)
        .await
        .expect("consolidation succeeds");
    let entry = outcome.time_entry().expect("entry created").clone();
    assert_eq!(entry.hours, 2.0);

    // The open proof is untouched and still waiting for its interval.
    let open = store.find_by_id(3).await.expect("lookup").expect("row exists");
    assert_eq!(open.status, RecordStatus::ClockedIn);
    assert!(!open.consolidated);
    assert_eq!(open.time_entry_id, None);
}

#[tokio::test]
async fn stale_snapshot_persists_nothing() {
    let db = TestDatabase::new();
    let store = SqliteTimeClockingRepository::new(Arc::clone(&db.manager));

    let inserted = store.insert(pending_clocking(5, 2, 1.0)).await.expect("insert clocking");
    let scope = ScopeKey::new(5, 2, test_date());

    // Pass an id list that no longer matches the eligible set.
    let entry = worklog_domain::NewTimeEntry {
        project_id: 1,
        issue_id: 5,
        user_id: 2,
        spent_on: test_date(),
        hours: 1.0,
        activity_id: 9,
        comments: "Consolidated from 2 time clocking(s) - 1h".into(),
    };
    let result = store
        .consolidate(&scope, &[inserted.id, inserted.id + 1], entry, Utc::now())
        .await
        .expect("mismatch is not an error");
    assert!(result.is_none());

    let entries = SqliteTimeEntryRepository::new(Arc::clone(&db.manager));
    assert_eq!(entries.count().await.expect("count"), 0);

    let record = store.find_by_id(inserted.id).await.expect("lookup").expect("row exists");
    assert!(!record.consolidated);
    assert_eq!(record.status, RecordStatus::Pending);
}

#[tokio::test]
async fn force_close_marks_the_proof_calculated() {
    let db = TestDatabase::new();
    let store = SqliteWorkProofRepository::new(Arc::clone(&db.manager));

    let inserted = store.insert(open_proof(8, 4)).await.expect("insert open proof");
    store.force_close(inserted.id, Utc::now(), 6.0).await.expect("force close");

    let record = store.find_by_id(inserted.id).await.expect("lookup").expect("row exists");
    assert_eq!(record.status, RecordStatus::Calculated);
    assert_eq!(record.hours, Some(6.0));
    assert!(record.clocked_out_at.is_some());
    assert!(record.is_eligible());

    // A second force close finds no open row.
    let err = store.force_close(inserted.id, Utc::now(), 6.0).await.expect_err("already closed");
    assert!(matches!(err, worklog_domain::WorklogError::NotFound(_)));
}

#[tokio::test]
async fn activity_directory_prefers_the_first_configured_activity() {
    let db = TestDatabase::new();
    let directory = SqliteActivityDirectory::new(Arc::clone(&db.manager));

    assert_eq!(directory.default_activity_id().await.expect("fallback"), 9);

    db.execute_batch(
        "INSERT INTO activities (id, name) VALUES (31, 'Development');
         INSERT INTO activities (id, name) VALUES (57, 'Review');",
    );
    assert_eq!(directory.default_activity_id().await.expect("first activity"), 31);
}

#[tokio::test]
async fn sweep_force_closes_and_consolidates_stale_proofs() {
    let db = TestDatabase::new();
    let store = SqliteWorkProofRepository::new(Arc::clone(&db.manager));
    let service = proof_service(&db);

    let stale = store.insert(open_proof(20, 9)).await.expect("insert stale proof");
    let fresh = store.insert(closed_proof(21, 9, 1.0)).await.expect("insert fresh proof");

    // Age the first proof past the threshold; the second stays recent.
    let old_ts = (Utc::now() - Duration::hours(6)).timestamp();
    db.execute_batch(&format!(
        "UPDATE work_proofs SET clocked_in_at = {old_ts}, created_at = {old_ts} WHERE id = {};",
        stale.id
    ));

    let consolidated = service
        .sweep_stale(Duration::hours(4), AccountingPolicy::Sum)
        .await
        .expect("sweep succeeds");
    assert_eq!(consolidated, 1);

    let swept = store.find_by_id(stale.id).await.expect("lookup").expect("row exists");
    assert_eq!(swept.status, RecordStatus::Consolidated);
    assert!(swept.time_entry_id.is_some());
    // Hours were inferred from the elapsed interval.
    let entries = SqliteTimeEntryRepository::new(Arc::clone(&db.manager));
    let entry = entries
        .find_by_id(swept.time_entry_id.expect("entry id"))
        .await
        .expect("entry lookup")
        .expect("entry exists");
    assert!(entry.hours >= 5.9 && entry.hours <= 6.1);

    let untouched = store.find_by_id(fresh.id).await.expect("lookup").expect("row exists");
    assert_eq!(untouched.status, RecordStatus::ClockedOut);
    assert!(!untouched.consolidated);
}

#[tokio::test]
async fn sweep_consolidates_stale_clockings_without_closing_anything() {
    let db = TestDatabase::new();
    let store = SqliteTimeClockingRepository::new(Arc::clone(&db.manager));
    let service = clocking_service(&db);

    let first = store.insert(pending_clocking(30, 5, 2.0)).await.expect("insert clocking");
    let second = store.insert(pending_clocking(30, 5, 1.5)).await.expect("insert clocking");

    let old_ts = (Utc::now() - Duration::hours(5)).timestamp();
    db.execute_batch(&format!(
        "UPDATE time_clockings SET created_at = {old_ts} WHERE id IN ({}, {});",
        first.id, second.id
    ));

    let consolidated = service
        .sweep_stale(Duration::hours(4), AccountingPolicy::Sum)
        .await
        .expect("sweep succeeds");
    assert_eq!(consolidated, 2);

    let entries = SqliteTimeEntryRepository::new(Arc::clone(&db.manager));
    assert_eq!(entries.count().await.expect("count"), 1);
}
