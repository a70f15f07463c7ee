//! Retention cleanup through the engine

use crate::common::*;
use chrono::Utc;
use practice_sync::shared::{EntityKind, Session};
use practice_sync::sync::{CleanupStats, Retention};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_only_recent_session_survives() {
    let db = memory_db().await;
    let (engine, _remote) = engine_with(db.clone(), false, test_config());
    let now = Utc::now();
    db.put(&Session::with_id("forty", "s1", now - chrono::Duration::days(40)))
        .await
        .unwrap();
    db.put(&Session::with_id("five", "s1", now - chrono::Duration::days(5)))
        .await
        .unwrap();

    let stats = engine.run_cleanup().await.unwrap();

    assert_eq!(stats.sessions_removed, 1);
    assert_eq!(db.count(EntityKind::Session).await.unwrap(), 1);
    assert!(db.get_session("five").await.unwrap().is_some());
}

#[tokio::test]
async fn test_cleanup_twice_is_a_no_op() {
    let db = memory_db().await;
    let (engine, _remote) = engine_with(db.clone(), false, test_config());
    db.put(&Session::with_id("old", "s1", Utc::now() - chrono::Duration::days(31)))
        .await
        .unwrap();

    engine.run_cleanup().await.unwrap();
    let remaining = db.get_all::<Session>(&Default::default()).await.unwrap();
    let second = engine.run_cleanup().await.unwrap();

    assert_eq!(second, CleanupStats::default());
    assert_eq!(db.get_all::<Session>(&Default::default()).await.unwrap(), remaining);
}

#[tokio::test]
async fn test_expired_session_with_pending_entry_survives() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    let old = Session::with_id("queued", "s1", Utc::now() - chrono::Duration::days(45));
    db.save_session(&old).await.unwrap();

    let stats = engine.run_cleanup().await.unwrap();
    assert_eq!(stats.sessions_removed, 0);
    assert_eq!(stats.sessions_kept_pending, 1);
    assert!(db.get_session("queued").await.unwrap().is_some());

    // Once synced, the next pass's cleanup removes it
    engine.force_sync().await.unwrap();
    assert_eq!(remote.call_count(), 1);
    assert!(db.get_session("queued").await.unwrap().is_none());
    assert!(!db.queue_references(EntityKind::Session, "queued").await.unwrap());
}

#[tokio::test]
async fn test_retention_prunes_old_failure_log() {
    let db = memory_db().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    remote.reject("s1");
    db.save_session(&Session::with_id("s1", "x", Utc::now())).await.unwrap();
    engine.force_sync().await.unwrap();
    assert_eq!(db.count_abandoned().await.unwrap(), 1);

    let retention = Retention::new(db.clone(), chrono::Duration::days(30));
    let stats = retention
        .run_at(Utc::now() + chrono::Duration::days(31))
        .await
        .unwrap();

    assert_eq!(stats.failures_pruned, 1);
    assert_eq!(db.count_abandoned().await.unwrap(), 0);
}
