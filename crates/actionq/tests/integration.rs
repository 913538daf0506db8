use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use actionq::{
    ActionInitiator, ActionQueueError, Interrupt, Permissions, QueueId, SchemaDefinition,
    TableDefinition, TabletAlias, TabletInfo, TabletType, UserPermission,
};
use actionq_testkit::{MemoryTopo, ScriptedRpc};

struct Harness {
    topo: Arc<MemoryTopo>,
    rpc: Arc<ScriptedRpc>,
    interrupt: Interrupt,
    ai: Arc<ActionInitiator>,
}

fn harness() -> Harness {
    let topo = Arc::new(MemoryTopo::new());
    let rpc = Arc::new(ScriptedRpc::new());
    let interrupt = Interrupt::new();
    let ai = Arc::new(ActionInitiator::new(
        topo.clone(),
        rpc.clone(),
        interrupt.clone(),
    ));
    Harness {
        topo,
        rpc,
        interrupt,
        ai,
    }
}

fn tablet(uid: u32) -> TabletAlias {
    TabletAlias::new("nyc", uid)
}

fn register(h: &Harness, alias: &TabletAlias) {
    h.topo.register_tablet(TabletInfo {
        alias: alias.clone(),
        keyspace: "test_keyspace".into(),
        shard: "0".into(),
        tablet_type: TabletType::Replica,
        addr: format!("host{}:15000", alias.uid),
    });
}

// ---------------------------------------------------------------------------
// Queued path: submit, executor resolves, wait returns the reply
// ---------------------------------------------------------------------------

#[tokio::test]
async fn sleep_action_resolves_with_reply() {
    let h = harness();
    let t1 = tablet(1);

    let path = h.ai.sleep(&t1, Duration::from_secs(5)).await.unwrap();
    assert!(!path.as_str().is_empty());

    // The external executor runs the action and removes the node.
    h.topo.resolve(&path, Some(json!({"slept": true}))).unwrap();

    let reply = h
        .ai
        .wait_for_completion_reply(&path, Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(reply, Some(json!({"slept": true})));
}

#[tokio::test]
async fn same_queue_paths_execute_in_submission_order() {
    let h = harness();
    let t1 = tablet(1);
    let q = QueueId::Tablet(t1.clone());

    let first = h.ai.ping(&t1).await.unwrap();
    let second = h.ai.sleep(&t1, Duration::from_secs(1)).await.unwrap();

    assert!(first.as_str() < second.as_str());
    assert_eq!(h.topo.pending(&q), vec![first.clone(), second.clone()]);

    // Independent queue, independent ids.
    let other = h.ai.ping(&tablet(2)).await.unwrap();
    assert!(other.as_str().ends_with("0000000001"));
}

#[tokio::test]
async fn failed_action_surfaces_path_and_message_and_stays_queued() {
    let h = harness();
    let t1 = tablet(1);
    let q = QueueId::Tablet(t1.clone());

    let path = h.ai.change_type(&t1, TabletType::Spare).await.unwrap();
    h.topo.fail(&path, "mysql unreachable").unwrap();

    let err = h
        .ai
        .wait_for_completion_reply(&path, Duration::from_secs(5))
        .await
        .unwrap_err();
    let rendered = err.to_string();
    assert!(rendered.contains(path.as_str()));
    assert!(rendered.contains("mysql unreachable"));
    match err {
        ActionQueueError::Failed {
            path: failed_path,
            message,
        } => {
            assert_eq!(failed_path, path);
            assert_eq!(message, "mysql unreachable");
        }
        other => panic!("expected Failed, got {other:?}"),
    }

    // No auto-cleanup: the annotated node is still in the store.
    assert!(h.topo.node_data(&path).is_some());
    assert_eq!(h.topo.pending(&q), vec![path]);
}

// ---------------------------------------------------------------------------
// Wait protocol: timeout, zero duration, store loss
// ---------------------------------------------------------------------------

#[tokio::test]
async fn zero_duration_wait_is_unbounded_not_instant() {
    let h = harness();
    let path = h.ai.ping(&tablet(1)).await.unwrap();

    let wait = h.ai.wait_for_completion_reply(&path, Duration::ZERO);
    tokio::pin!(wait);
    tokio::select! {
        _ = &mut wait => panic!("zero-duration wait returned immediately"),
        () = tokio::time::sleep(Duration::from_millis(100)) => {}
    }

    // It still resolves once the executor does its part.
    h.topo.resolve(&path, None).unwrap();
    assert_eq!(wait.await.unwrap(), None);
}

#[tokio::test]
async fn wait_times_out_and_leaves_node_pending() {
    let h = harness();
    let path = h.ai.ping(&tablet(1)).await.unwrap();

    let err = h
        .ai
        .wait_for_completion(&path, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionQueueError::Timeout { .. }));
    assert!(h.topo.node_data(&path).is_some());
}

#[tokio::test]
async fn store_loss_during_wait_is_a_store_error() {
    let h = harness();
    let path = h.ai.ping(&tablet(1)).await.unwrap();

    let wait = h.ai.wait_for_completion(&path, Duration::from_secs(5));
    tokio::pin!(wait);
    tokio::select! {
        _ = &mut wait => panic!("wait returned before the store went away"),
        () = tokio::time::sleep(Duration::from_millis(20)) => {}
    }

    h.topo.set_unreachable(true);
    let err = wait.await.unwrap_err();
    assert!(matches!(err, ActionQueueError::Store(_)));
}

// ---------------------------------------------------------------------------
// Interrupt: one signal, every waiter
// ---------------------------------------------------------------------------

#[tokio::test]
async fn interrupt_unblocks_all_outstanding_waits() {
    let h = harness();

    let mut handles = Vec::new();
    for uid in 1..=3 {
        let path = h.ai.ping(&tablet(uid)).await.unwrap();
        let ai = h.ai.clone();
        handles.push(tokio::spawn(async move {
            ai.wait_for_completion(&path, Duration::from_secs(60)).await
        }));
    }

    tokio::time::sleep(Duration::from_millis(50)).await;
    h.interrupt.trigger();

    for handle in handles {
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, ActionQueueError::Interrupted));
    }
}

#[tokio::test]
async fn interrupt_is_idempotent_and_covers_future_waits() {
    let h = harness();
    let path = h.ai.ping(&tablet(1)).await.unwrap();

    h.interrupt.trigger();
    h.interrupt.trigger();

    // A wait started after the trigger still gets the interrupt outcome.
    let err = h
        .ai
        .wait_for_completion(&path, Duration::from_secs(60))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionQueueError::Interrupted));

    // The interrupt never touched the queue entry.
    assert!(h.topo.node_data(&path).is_some());
}

// ---------------------------------------------------------------------------
// Shard / keyspace builders: build first, pick the queue second
// ---------------------------------------------------------------------------

#[tokio::test]
async fn shard_node_is_built_then_submitted_explicitly() {
    let h = harness();
    let q = QueueId::Shard {
        keyspace: "test_keyspace".into(),
        shard: "0-80".into(),
    };

    let node = h
        .ai
        .apply_schema_shard(&tablet(1), "alter table t add c int".into(), true);
    assert!(!node.guid.is_empty());
    assert!(h.topo.pending(&q).is_empty(), "builder must not submit");

    let path = h.ai.submit(&q, &node).await.unwrap();
    assert_eq!(h.topo.pending(&q), vec![path.clone()]);

    h.topo.resolve(&path, None).unwrap();
    h.ai
        .wait_for_completion(&path, Duration::from_secs(5))
        .await
        .unwrap();
}

#[tokio::test]
async fn keyspace_node_goes_to_the_keyspace_queue() {
    let h = harness();
    let q = QueueId::Keyspace("test_keyspace".into());

    let node = h.ai.rebuild_keyspace();
    let path = h.ai.submit(&q, &node).await.unwrap();
    assert_eq!(h.topo.pending(&q), vec![path]);
}

// ---------------------------------------------------------------------------
// Direct RPC fast path
// ---------------------------------------------------------------------------

#[tokio::test]
async fn fast_path_ping_skips_the_queue() {
    let h = harness();
    let t2 = tablet(2);
    register(&h, &t2);

    h.ai.rpc_ping(&t2, Duration::from_secs(2)).await.unwrap();

    assert_eq!(h.rpc.calls(), vec![format!("ping {t2}")]);
    assert!(h.topo.pending(&QueueId::Tablet(t2)).is_empty());
}

#[tokio::test]
async fn fast_path_schema_and_permissions_return_results() {
    let h = harness();
    let t3 = tablet(3);
    register(&h, &t3);

    let schema = SchemaDefinition {
        database_schema: "create database vt_test".into(),
        table_definitions: vec![TableDefinition {
            name: "t".into(),
            schema: "create table t (id int)".into(),
        }],
        version: "abc123".into(),
    };
    h.rpc.set_schema(schema.clone());
    h.rpc.set_permissions(Permissions {
        users: vec![UserPermission {
            user: "vt_dba".into(),
            host: "localhost".into(),
            privileges: vec!["ALL".into()],
        }],
    });

    let got = h
        .ai
        .rpc_get_schema(&t3, &[], true, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(got, schema);

    let perms = h
        .ai
        .rpc_get_permissions(&t3, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(perms.users.len(), 1);

    assert_eq!(
        h.rpc.calls(),
        vec![format!("get_schema {t3}"), format!("get_permissions {t3}")]
    );
}

#[tokio::test]
async fn fast_path_transport_failure_is_an_rpc_error() {
    let h = harness();
    let t2 = tablet(2);
    register(&h, &t2);
    h.rpc.fail_with("connection refused");

    let err = h
        .ai
        .rpc_change_type(&t2, TabletType::Rdonly, Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionQueueError::Rpc(_)));
}

#[tokio::test]
async fn fast_path_unknown_tablet_fails_at_resolution() {
    let h = harness();
    let err = h
        .ai
        .rpc_ping(&tablet(99), Duration::from_secs(2))
        .await
        .unwrap_err();
    assert!(matches!(err, ActionQueueError::TabletNotFound(_)));
    assert!(h.rpc.calls().is_empty(), "transport must not be called");
}

// ---------------------------------------------------------------------------
// Submission errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn unreachable_store_fails_submission_synchronously() {
    let h = harness();
    h.topo.set_unreachable(true);

    let err = h.ai.ping(&tablet(1)).await.unwrap_err();
    assert!(matches!(err, ActionQueueError::Store(_)));

    // Nothing was left behind: the store has no queue for the tablet.
    h.topo.set_unreachable(false);
    assert!(h.topo.pending(&QueueId::Tablet(tablet(1))).is_empty());
}
