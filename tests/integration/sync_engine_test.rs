//! Sync engine behaviour against a scripted remote

use crate::common::*;
use crate::{assert_ok, assert_pending};
use assert_matches::assert_matches;
use chrono::Utc;
use practice_sync::shared::{EntityKind, Operation, Scenario, Session, SyncConfig};
use practice_sync::sync::SyncOutcome;
use practice_sync::SyncError;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn scenario(id: &str) -> Scenario {
    Scenario::with_id(id, format!("Scenario {}", id), "interview")
}

#[tokio::test]
async fn test_offline_create_is_dirty_and_pending() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), false, test_config());

    assert_ok!(db.save_scenario(&Scenario::with_id("s1", "Interview A", "interview")).await);

    let stored = db.get_scenario("s1").await.unwrap().unwrap();
    assert_eq!(stored.record.title, "Interview A");
    assert!(stored.is_dirty);
    assert_eq!(stored.synced_at, None);
    assert_pending!(engine, 1);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn test_reconnect_drains_queue() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), false, test_config());
    engine.start().await.unwrap();

    db.save_scenario(&Scenario::with_id("s1", "Interview A", "interview"))
        .await
        .unwrap();
    let saved_at = Utc::now();

    engine.connectivity().set_online(true);

    let drained = eventually(Duration::from_secs(5), || {
        let engine = engine.clone();
        async move {
            let stats = engine.get_stats().await.unwrap();
            stats.pending_sync == 0 && stats.last_sync.is_some()
        }
    })
    .await;
    assert!(drained, "queue was not drained after reconnect");

    let stored = db.get_scenario("s1").await.unwrap().unwrap();
    assert!(!stored.is_dirty);
    assert!(stored.synced_at.is_some());

    let last_sync = engine.get_stats().await.unwrap().last_sync.unwrap();
    assert!(last_sync >= saved_at);
    assert_eq!(remote.call_log(), vec![(Operation::Create, "s1".to_string())]);

    engine.stop().await;
}

#[tokio::test]
async fn test_retry_exhaustion_keeps_record_dirty() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    remote.fail_transient("s1", u32::MAX);
    db.save_scenario(&scenario("s1")).await.unwrap();

    for attempt in 1..=2 {
        let outcome = engine.force_sync().await.unwrap();
        assert_matches!(outcome, SyncOutcome::Completed(ref report) if report.retried == 1);
        assert_pending!(engine, 1);
        let entry = &engine.queue().drain().await.unwrap()[0];
        assert_eq!(entry.retry_count, attempt);
        assert!(entry.last_error.is_some());
    }

    let outcome = engine.force_sync().await.unwrap();
    assert_matches!(outcome, SyncOutcome::Completed(ref report) if report.abandoned == 1);

    assert_pending!(engine, 0);
    assert_eq!(remote.call_count(), 3);
    let stored = db.get_scenario("s1").await.unwrap().unwrap();
    assert!(stored.is_dirty);
    assert_eq!(engine.get_stats().await.unwrap().abandoned, 1);

    // The abandoned entry never comes back
    engine.force_sync().await.unwrap();
    assert_eq!(remote.call_count(), 3);
}

#[tokio::test]
async fn test_force_sync_offline_leaves_queue() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), false, test_config());
    db.save_scenario(&scenario("s1")).await.unwrap();

    let result = engine.force_sync().await;
    assert_matches!(result, Err(SyncError::OfflineForceSync));

    assert_pending!(engine, 1);
    let entry = &engine.queue().drain().await.unwrap()[0];
    assert_eq!(entry.retry_count, 0);
    assert_eq!(remote.call_count(), 0);
}

#[tokio::test]
async fn test_second_force_sync_is_coalesced() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    db.save_scenario(&scenario("s1")).await.unwrap();

    let gate = remote.block_next_call();
    let background = engine.clone();
    let pass = tokio::spawn(async move { background.force_sync().await });
    gate.entered.notified().await;

    assert!(engine.is_syncing());
    assert_eq!(engine.force_sync().await.unwrap(), SyncOutcome::AlreadyRunning);

    gate.release.notify_one();
    let outcome = pass.await.unwrap().unwrap();
    assert_matches!(outcome, SyncOutcome::Completed(ref report) if report.applied == 1);
    assert_eq!(remote.call_count(), 1);
    assert!(!engine.is_syncing());
}

#[tokio::test]
async fn test_edit_during_pass_stays_dirty() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    let mut s1 = scenario("s1");
    db.save_scenario(&s1).await.unwrap();

    let gate = remote.block_next_call();
    let background = engine.clone();
    let pass = tokio::spawn(async move { background.force_sync().await });
    gate.entered.notified().await;

    s1.title = "Edited while syncing".to_string();
    db.save_scenario(&s1).await.unwrap();

    gate.release.notify_one();
    pass.await.unwrap().unwrap();

    let stored = db.get_scenario("s1").await.unwrap().unwrap();
    assert!(stored.is_dirty, "newer edit must stay dirty");
    assert!(stored.synced_at.is_some());
    assert_pending!(engine, 1);

    engine.force_sync().await.unwrap();
    let stored = db.get_scenario("s1").await.unwrap().unwrap();
    assert!(!stored.is_dirty);
    assert_eq!(stored.record.title, "Edited while syncing");
    assert_pending!(engine, 0);
}

#[tokio::test]
async fn test_permanent_failure_abandons_immediately() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    remote.reject("bad");
    db.save_scenario(&scenario("bad")).await.unwrap();
    db.save_scenario(&scenario("good")).await.unwrap();

    let outcome = engine.force_sync().await.unwrap();
    assert_matches!(
        outcome,
        SyncOutcome::Completed(ref report) if report.abandoned == 1 && report.applied == 1
    );

    assert_pending!(engine, 0);
    let failures = db.abandoned_mutations(10).await.unwrap();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].record_id, "bad");
    assert_eq!(failures[0].retry_count, 0);
    assert!(db.get_scenario("bad").await.unwrap().unwrap().is_dirty);
}

#[tokio::test]
async fn test_failed_create_holds_back_later_update() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    remote.fail_transient("a", 1);

    let mut a = scenario("a");
    db.save_scenario(&a).await.unwrap();
    a.title = "A v2".to_string();
    db.save_scenario(&a).await.unwrap();
    db.save_scenario(&scenario("b")).await.unwrap();

    let outcome = engine.force_sync().await.unwrap();
    assert_matches!(
        outcome,
        SyncOutcome::Completed(ref report)
            if report.retried == 1 && report.deferred == 1 && report.applied == 1
    );
    assert_eq!(
        remote.call_log(),
        vec![(Operation::Create, "a".to_string()), (Operation::Create, "b".to_string())]
    );

    engine.force_sync().await.unwrap();
    assert_eq!(
        remote.call_log()[2..].to_vec(),
        vec![(Operation::Create, "a".to_string()), (Operation::Update, "a".to_string())]
    );
    assert!(!db.get_scenario("a").await.unwrap().unwrap().is_dirty);
}

#[tokio::test]
async fn test_automatic_pass_respects_backoff() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    remote.fail_transient("s1", 1);
    db.save_scenario(&scenario("s1")).await.unwrap();

    engine.force_sync().await.unwrap();
    assert_eq!(remote.call_count(), 1);

    // 60s backoff: an automatic pass leaves the entry alone
    let outcome = engine.sync_now().await.unwrap();
    assert_matches!(outcome, SyncOutcome::Completed(ref report) if report.deferred == 1);
    assert_eq!(remote.call_count(), 1);

    // A forced pass ignores the gate
    engine.force_sync().await.unwrap();
    assert_eq!(remote.call_count(), 2);
    assert_pending!(engine, 0);
}

#[tokio::test]
async fn test_delete_purges_tombstone_after_remote_confirms() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    db.save_scenario(&scenario("s1")).await.unwrap();
    engine.force_sync().await.unwrap();

    db.delete_scenario("s1").await.unwrap();
    assert!(db.get_scenario("s1").await.unwrap().is_none());
    assert!(db.record_version(EntityKind::Scenario, "s1").await.unwrap().is_some());

    engine.force_sync().await.unwrap();
    assert_eq!(remote.call_log().last(), Some(&(Operation::Delete, "s1".to_string())));
    assert_eq!(db.record_version(EntityKind::Scenario, "s1").await.unwrap(), None);
    assert_pending!(engine, 0);
}

#[tokio::test]
async fn test_panicking_remote_releases_guard() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    remote.panic_on("boom");
    db.save_scenario(&scenario("boom")).await.unwrap();

    let background = engine.clone();
    let joined = tokio::spawn(async move { background.force_sync().await }).await;
    assert!(joined.unwrap_err().is_panic());
    assert!(!engine.is_syncing());

    remote.clear_panics();
    let outcome = engine.force_sync().await.unwrap();
    assert_matches!(outcome, SyncOutcome::Completed(ref report) if report.applied == 1);
}

#[tokio::test]
async fn test_pass_runs_cleanup() {
    let db = memory_db().await;
    let (engine, _remote) = engine_with(db.clone(), true, test_config());
    db.put(&Session::with_id("ancient", "s1", Utc::now() - chrono::Duration::days(90)))
        .await
        .unwrap();

    let outcome = engine.force_sync().await.unwrap();
    assert_matches!(
        outcome,
        SyncOutcome::Completed(ref report)
            if report.cleanup.map(|c| c.sessions_removed) == Some(1)
    );
    assert_eq!(db.count(EntityKind::Session).await.unwrap(), 0);
}

#[tokio::test]
async fn test_cleanup_can_be_disabled() {
    let db = memory_db().await;
    let config = SyncConfig::builder().cleanup_after_sync(false).build().unwrap();
    let (engine, _remote) = engine_with(db.clone(), true, config);
    db.put(&Session::with_id("ancient", "s1", Utc::now() - chrono::Duration::days(90)))
        .await
        .unwrap();

    let outcome = engine.force_sync().await.unwrap();
    assert_matches!(outcome, SyncOutcome::Completed(ref report) if report.cleanup.is_none());
    assert_eq!(db.count(EntityKind::Session).await.unwrap(), 1);
}

#[tokio::test]
async fn test_periodic_scheduler_drains_queue() {
    let db = memory_db().await;
    let config = SyncConfig::builder().sync_interval_seconds(1).build().unwrap();
    let (engine, remote) = engine_with(db.clone(), true, config);
    engine.start().await.unwrap();

    db.save_scenario(&scenario("s1")).await.unwrap();

    let drained = eventually(Duration::from_secs(5), || {
        let remote = remote.clone();
        async move { remote.call_count() == 1 }
    })
    .await;
    assert!(drained, "periodic pass never ran");
    engine.stop().await;
}
