//! Property-based tests for queue ordering and retry exhaustion

use crate::common::*;
use practice_sync::shared::{Operation, Scenario, SyncConfig};
use proptest::prelude::*;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A pass applies mutations in exactly the order they were enqueued
    #[test]
    fn test_pass_preserves_enqueue_order(edits in prop::collection::vec(0usize..4, 1..20)) {
        let rt = runtime();
        let (expected, applied) = rt.block_on(async {
            let db = memory_db().await;
            let (engine, remote) = engine_with(db.clone(), true, test_config());

            let mut expected = Vec::new();
            let mut seen = std::collections::HashSet::new();
            for (n, record) in edits.iter().enumerate() {
                let id = format!("r{}", record);
                let mut scenario = Scenario::with_id(id.clone(), format!("edit {}", n), "interview");
                scenario.description = Some(n.to_string());
                db.save_scenario(&scenario).await.unwrap();
                let op = if seen.insert(id.clone()) { Operation::Create } else { Operation::Update };
                expected.push((op, id));
            }

            engine.force_sync().await.unwrap();
            (expected, remote.call_log())
        });

        prop_assert_eq!(applied, expected);
    }

    /// An always-failing entry is dropped after exactly `max_retries` attempts
    #[test]
    fn test_retry_budget_is_exact(max_retries in 1u32..6) {
        let rt = runtime();
        let (calls, pending, abandoned) = rt.block_on(async {
            let db = memory_db().await;
            let config = SyncConfig::builder().max_retries(max_retries).build().unwrap();
            let (engine, remote) = engine_with(db.clone(), true, config);
            remote.fail_transient("s1", u32::MAX);
            db.save_scenario(&Scenario::with_id("s1", "x", "interview")).await.unwrap();

            for _ in 0..(max_retries + 2) {
                engine.force_sync().await.unwrap();
            }
            let stats = engine.get_stats().await.unwrap();
            (remote.call_count(), stats.pending_sync, stats.abandoned)
        });

        prop_assert_eq!(calls, max_retries as usize);
        prop_assert_eq!(pending, 0);
        prop_assert_eq!(abandoned, 1);
    }
}
