//! Data written locally survives a restart

use crate::common::*;
use chrono::Utc;
use practice_sync::shared::{Difficulty, EntityKind, Operation, Progress, Scenario, Session};
use practice_sync::sync::SyncOutcome;
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_records_survive_reopen() {
    let temp = TempDatabase::new();
    let mut scenario = Scenario::with_id("s1", "Salary negotiation", "negotiation");
    scenario.difficulty = Difficulty::Advanced;
    scenario.description = Some("Ask for 10% more".to_string());
    let mut session = Session::with_id("sess-1", "s1", Utc::now());
    session.finish(Utc::now(), Some(72.5));

    {
        let db = temp.open().await;
        db.put(&scenario).await.unwrap();
        db.put(&session).await.unwrap();
        db.close().await;
    }

    let db = temp.open().await;
    let stored = db.get_scenario("s1").await.unwrap().unwrap();
    assert_eq!(stored.record, scenario);
    let stored = db.get_session("sess-1").await.unwrap().unwrap();
    assert_eq!(stored.record, session);
}

#[tokio::test]
async fn test_queue_survives_restart_and_drains() {
    let temp = TempDatabase::new();

    {
        let db = temp.open().await;
        db.save_scenario(&Scenario::with_id("s1", "Interview A", "interview"))
            .await
            .unwrap();
        let mut session = Session::with_id("sess-1", "s1", Utc::now());
        session.finish(Utc::now(), Some(90.0));
        db.complete_session(&session).await.unwrap();
        db.close().await;
    }

    let db = temp.open().await;
    let entries = db.queue_entries().await.unwrap();
    let log: Vec<(Operation, EntityKind)> = entries
        .iter()
        .map(|e| (e.operation, e.entity_kind))
        .collect();
    assert_eq!(
        log,
        vec![
            (Operation::Create, EntityKind::Scenario),
            (Operation::Create, EntityKind::Session),
            (Operation::Create, EntityKind::Progress),
        ]
    );

    let (engine, remote) = engine_with(db.clone(), true, test_config());
    engine.start().await.unwrap();

    assert_eq!(remote.call_count(), 3);
    assert_eq!(db.queue_len().await.unwrap(), 0);
    let progress = db.progress_for_scenario("s1").await.unwrap().unwrap();
    assert_eq!(progress.record, {
        let mut expected = Progress::for_scenario("s1");
        expected.sessions_completed = 1;
        expected.scored_sessions = 1;
        expected.best_score = Some(90.0);
        expected.average_score = Some(90.0);
        expected.last_practiced_at = progress.record.last_practiced_at;
        expected
    });
    assert!(!progress.is_dirty);

    let outcome = engine.force_sync().await.unwrap();
    assert!(matches!(outcome, SyncOutcome::Completed(ref r) if r.attempted() == 0));
    engine.stop().await;
}

#[tokio::test]
async fn test_last_sync_survives_restart() {
    let temp = TempDatabase::new();

    let synced_at = {
        let db = temp.open().await;
        let (engine, _remote) = engine_with(db.clone(), true, test_config());
        engine.force_sync().await.unwrap();
        let at = engine.get_stats().await.unwrap().last_sync;
        db.close().await;
        at
    };
    assert!(synced_at.is_some());

    let db = temp.open().await;
    assert_eq!(db.get_last_sync_time().await.unwrap(), synced_at);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_saves_racing_a_pass_all_commit() {
    let temp = TempDatabase::new();
    let db = temp.open().await;
    let (engine, remote) = engine_with(db.clone(), true, test_config());
    remote.fail_transient("r0", 1);
    for n in 0..4 {
        db.save_scenario(&Scenario::with_id(format!("r{}", n), "seed", "interview"))
            .await
            .unwrap();
    }

    let pass = {
        let engine = engine.clone();
        tokio::spawn(async move { engine.force_sync().await })
    };
    let saves: Vec<_> = (0..12)
        .map(|n| {
            let db = db.clone();
            tokio::spawn(async move {
                db.save_scenario(&Scenario::with_id(format!("new{}", n), "edit", "interview"))
                    .await
            })
        })
        .collect();

    for save in saves {
        assert!(save.await.unwrap().is_ok());
    }
    assert!(pass.await.unwrap().is_ok());

    engine.force_sync().await.unwrap();
    assert_eq!(db.queue_len().await.unwrap(), 0);
    assert_eq!(db.count(EntityKind::Scenario).await.unwrap(), 16);
}
