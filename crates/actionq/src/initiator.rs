//! Submission and completion-wait protocols.
//!
//! An [`ActionInitiator`] is the producer side of the action queue: it
//! builds nodes, appends them to the right entity queue in the topology
//! store, and (optionally) waits for the external executor to resolve
//! them. For a fixed subset of operations it also offers a direct-RPC
//! fast path that trades queue ordering and durability for latency.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tracing::debug;

use crate::error::ActionQueueError;
use crate::interrupt::Interrupt;
use crate::node::{
    ActionNode, ActionPayload, ApplySchemaKeyspaceArgs, ApplySchemaShardArgs, GetSchemaArgs,
    MigrateServedTypesArgs, MultiRestoreArgs, MultiSnapshotArgs, ReserveForRestoreArgs,
    RestartSlaveData, RestoreArgs, SetShardServedTypesArgs, SlaveWasRestartedArgs, SnapshotArgs,
    SnapshotSourceEndArgs, WaitSlavePositionArgs,
};
use crate::rpc::TabletRpc;
use crate::topo::TopoServer;
use crate::types::{
    ActionPath, BlpPosition, Hook, Permissions, QueueId, ReplicationPosition, SchemaChange,
    SchemaDefinition, TabletAlias, TabletType,
};
use crate::Result;

/// Bound applied when a caller asks for an "unbounded" wait (zero
/// duration). Long enough to be effectively forever, short enough that a
/// wedged process eventually surfaces.
pub const DEFAULT_WAIT_TIME: Duration = Duration::from_secs(24 * 60 * 60);

// ─── ActionInitiator ──────────────────────────────────────────────────────

/// Producer handle over the topology store and the direct-RPC transport.
///
/// Tablet operations construct and submit in one step and return the
/// store-assigned [`ActionPath`]. Shard and keyspace operations are pure
/// builders: they return an [`ActionNode`] (guid already assigned) and the
/// caller picks the destination queue via [`ActionInitiator::submit`] —
/// which queue a shard action lands on is a decision this layer cannot
/// make for the caller.
pub struct ActionInitiator {
    topo: Arc<dyn TopoServer>,
    rpc: Arc<dyn TabletRpc>,
    interrupt: Interrupt,
}

impl ActionInitiator {
    pub fn new(topo: Arc<dyn TopoServer>, rpc: Arc<dyn TabletRpc>, interrupt: Interrupt) -> Self {
        ActionInitiator {
            topo,
            rpc,
            interrupt,
        }
    }

    /// Encode a node and append it to `queue`, returning the path to wait
    /// on. No blocking beyond the store round trip; on failure nothing is
    /// left behind client-side.
    pub async fn submit(&self, queue: &QueueId, node: &ActionNode) -> Result<ActionPath> {
        let data = node.encode()?;
        let path = self.topo.submit_action(queue, &data).await?;
        debug!(kind = %node.kind(), %queue, %path, "submitted action");
        Ok(path)
    }

    async fn submit_tablet_action(
        &self,
        tablet: &TabletAlias,
        payload: ActionPayload,
    ) -> Result<ActionPath> {
        self.submit(&QueueId::Tablet(tablet.clone()), &ActionNode::new(payload))
            .await
    }

    // ─── Tablet actions (queued) ──────────────────────────────────────────

    pub async fn ping(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::Ping).await
    }

    pub async fn sleep(&self, tablet: &TabletAlias, duration: Duration) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::Sleep(duration))
            .await
    }

    pub async fn change_type(
        &self,
        tablet: &TabletAlias,
        tablet_type: TabletType,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::ChangeType(tablet_type))
            .await
    }

    pub async fn set_read_only(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::SetReadOnly)
            .await
    }

    pub async fn set_read_write(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::SetReadWrite)
            .await
    }

    pub async fn demote_master(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::DemoteMaster)
            .await
    }

    pub async fn snapshot(&self, tablet: &TabletAlias, args: SnapshotArgs) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::Snapshot(args))
            .await
    }

    pub async fn snapshot_source_end(
        &self,
        tablet: &TabletAlias,
        args: SnapshotSourceEndArgs,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::SnapshotSourceEnd(args))
            .await
    }

    pub async fn multi_snapshot(
        &self,
        tablet: &TabletAlias,
        args: MultiSnapshotArgs,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::MultiSnapshot(args))
            .await
    }

    pub async fn multi_restore(
        &self,
        tablet: &TabletAlias,
        args: MultiRestoreArgs,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::MultiRestore(args))
            .await
    }

    pub async fn break_slaves(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::BreakSlaves)
            .await
    }

    pub async fn promote_slave(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::PromoteSlave)
            .await
    }

    pub async fn slave_was_promoted(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::SlaveWasPromoted)
            .await
    }

    pub async fn restart_slave(
        &self,
        tablet: &TabletAlias,
        args: RestartSlaveData,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::RestartSlave(args))
            .await
    }

    pub async fn slave_was_restarted(
        &self,
        tablet: &TabletAlias,
        args: SlaveWasRestartedArgs,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::SlaveWasRestarted(args))
            .await
    }

    pub async fn reparent_position(
        &self,
        tablet: &TabletAlias,
        slave_position: ReplicationPosition,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::ReparentPosition(slave_position))
            .await
    }

    pub async fn master_position(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::MasterPosition)
            .await
    }

    pub async fn slave_position(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::SlavePosition)
            .await
    }

    pub async fn wait_slave_position(
        &self,
        tablet: &TabletAlias,
        args: WaitSlavePositionArgs,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::WaitSlavePosition(args))
            .await
    }

    pub async fn stop_slave(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::StopSlave)
            .await
    }

    pub async fn reserve_for_restore(
        &self,
        dst_tablet: &TabletAlias,
        args: ReserveForRestoreArgs,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(dst_tablet, ActionPayload::ReserveForRestore(args))
            .await
    }

    pub async fn restore(&self, dst_tablet: &TabletAlias, args: RestoreArgs) -> Result<ActionPath> {
        self.submit_tablet_action(dst_tablet, ActionPayload::Restore(args))
            .await
    }

    pub async fn scrap(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::Scrap)
            .await
    }

    pub async fn get_schema(
        &self,
        tablet: &TabletAlias,
        tables: Vec<String>,
        include_views: bool,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(
            tablet,
            ActionPayload::GetSchema(GetSchemaArgs {
                tables,
                include_views,
            }),
        )
        .await
    }

    pub async fn preflight_schema(
        &self,
        tablet: &TabletAlias,
        change: String,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::PreflightSchema(change))
            .await
    }

    pub async fn apply_schema(
        &self,
        tablet: &TabletAlias,
        change: SchemaChange,
    ) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::ApplySchema(change))
            .await
    }

    pub async fn execute_hook(&self, tablet: &TabletAlias, hook: Hook) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::ExecuteHook(hook))
            .await
    }

    pub async fn get_slaves(&self, tablet: &TabletAlias) -> Result<ActionPath> {
        self.submit_tablet_action(tablet, ActionPayload::GetSlaves)
            .await
    }

    // ─── Shard actions (builders) ─────────────────────────────────────────

    pub fn reparent_shard(&self, master_elect: &TabletAlias) -> ActionNode {
        ActionNode::new(ActionPayload::ReparentShard(master_elect.clone()))
    }

    pub fn shard_externally_reparented(&self, master_elect: &TabletAlias) -> ActionNode {
        ActionNode::new(ActionPayload::ShardExternallyReparented(
            master_elect.clone(),
        ))
    }

    pub fn rebuild_shard(&self) -> ActionNode {
        ActionNode::new(ActionPayload::RebuildShard)
    }

    pub fn check_shard(&self) -> ActionNode {
        ActionNode::new(ActionPayload::CheckShard)
    }

    pub fn apply_schema_shard(
        &self,
        master_tablet: &TabletAlias,
        change: String,
        simple: bool,
    ) -> ActionNode {
        ActionNode::new(ActionPayload::ApplySchemaShard(ApplySchemaShardArgs {
            master_tablet_alias: Some(master_tablet.clone()),
            change,
            simple,
        }))
    }

    pub fn set_shard_served_types(&self, served_types: Vec<TabletType>) -> ActionNode {
        ActionNode::new(ActionPayload::SetShardServedTypes(SetShardServedTypesArgs {
            served_types,
        }))
    }

    pub fn shard_multi_restore(&self, args: MultiRestoreArgs) -> ActionNode {
        ActionNode::new(ActionPayload::ShardMultiRestore(args))
    }

    pub fn migrate_served_types(&self, served_type: TabletType) -> ActionNode {
        ActionNode::new(ActionPayload::MigrateServedTypes(MigrateServedTypesArgs {
            served_type,
        }))
    }

    pub fn update_shard(&self) -> ActionNode {
        ActionNode::new(ActionPayload::UpdateShard)
    }

    // ─── Keyspace actions (builders) ──────────────────────────────────────

    pub fn rebuild_keyspace(&self) -> ActionNode {
        ActionNode::new(ActionPayload::RebuildKeyspace)
    }

    pub fn apply_schema_keyspace(&self, change: String, simple: bool) -> ActionNode {
        ActionNode::new(ActionPayload::ApplySchemaKeyspace(ApplySchemaKeyspaceArgs {
            change,
            simple,
        }))
    }

    // ─── Direct RPC fast path ─────────────────────────────────────────────

    pub async fn rpc_ping(&self, tablet: &TabletAlias, wait: Duration) -> Result<()> {
        let info = self.topo.get_tablet(tablet).await?;
        self.rpc.ping(&info, wait).await
    }

    pub async fn rpc_change_type(
        &self,
        tablet: &TabletAlias,
        tablet_type: TabletType,
        wait: Duration,
    ) -> Result<()> {
        let info = self.topo.get_tablet(tablet).await?;
        self.rpc.change_type(&info, tablet_type, wait).await
    }

    pub async fn rpc_slave_was_promoted(&self, tablet: &TabletAlias, wait: Duration) -> Result<()> {
        let info = self.topo.get_tablet(tablet).await?;
        self.rpc.slave_was_promoted(&info, wait).await
    }

    pub async fn rpc_slave_was_restarted(
        &self,
        tablet: &TabletAlias,
        args: &SlaveWasRestartedArgs,
        wait: Duration,
    ) -> Result<()> {
        let info = self.topo.get_tablet(tablet).await?;
        self.rpc.slave_was_restarted(&info, args, wait).await
    }

    /// RPC-only: there is no queued form of a binlog-player position wait.
    pub async fn wait_blp_position(
        &self,
        tablet: &TabletAlias,
        position: &BlpPosition,
        wait: Duration,
    ) -> Result<()> {
        let info = self.topo.get_tablet(tablet).await?;
        self.rpc.wait_blp_position(&info, position, wait).await
    }

    pub async fn rpc_get_schema(
        &self,
        tablet: &TabletAlias,
        tables: &[String],
        include_views: bool,
        wait: Duration,
    ) -> Result<SchemaDefinition> {
        let info = self.topo.get_tablet(tablet).await?;
        self.rpc.get_schema(&info, tables, include_views, wait).await
    }

    pub async fn rpc_get_permissions(
        &self,
        tablet: &TabletAlias,
        wait: Duration,
    ) -> Result<Permissions> {
        let info = self.topo.get_tablet(tablet).await?;
        self.rpc.get_permissions(&info, wait).await
    }

    // ─── Completion wait ──────────────────────────────────────────────────

    /// Block until the action at `path` resolves, discarding any reply.
    pub async fn wait_for_completion(&self, path: &ActionPath, wait: Duration) -> Result<()> {
        wait_for_completion(self.topo.as_ref(), &self.interrupt, path, wait).await?;
        Ok(())
    }

    /// Block until the action at `path` resolves and return its reply.
    pub async fn wait_for_completion_reply(
        &self,
        path: &ActionPath,
        wait: Duration,
    ) -> Result<Option<Value>> {
        wait_for_completion(self.topo.as_ref(), &self.interrupt, path, wait).await
    }
}

// ─── Wait protocol ────────────────────────────────────────────────────────

/// Block until the node at `path` is removed (success) or annotated with
/// an error (failure), bounded by `wait` and by the process-wide
/// interrupt.
///
/// A zero `wait` means "effectively unbounded" — it is clamped up to
/// [`DEFAULT_WAIT_TIME`], never treated as an instant poll.
///
/// Outcomes are disjoint: a store failure, malformed node data, a
/// remote-side error annotation, a timeout and an interrupt each map to
/// their own [`ActionQueueError`] variant. Timeout and interrupt leave the
/// queue entry untouched; it may still complete later.
pub async fn wait_for_completion(
    ts: &dyn TopoServer,
    interrupt: &Interrupt,
    path: &ActionPath,
    mut wait: Duration,
) -> Result<Option<Value>> {
    if wait.is_zero() {
        wait = DEFAULT_WAIT_TIME;
    }

    let data = tokio::select! {
        res = ts.wait_for_action(path) => res?,
        () = interrupt.triggered() => return Err(ActionQueueError::Interrupted),
        () = tokio::time::sleep(wait) => {
            return Err(ActionQueueError::Timeout { path: path.clone() })
        }
    };

    let node = ActionNode::decode(&data).map_err(|source| ActionQueueError::Decode {
        path: path.clone(),
        source,
    })?;
    if !node.error.is_empty() {
        return Err(ActionQueueError::Failed {
            path: path.clone(),
            message: node.error,
        });
    }
    debug!(%path, kind = %node.kind(), "action completed");
    Ok(node.reply)
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ActionKind;

    // Builder contract: nodes come back with guid assigned and the right
    // kind, but nothing is submitted. Full queue flows live in
    // tests/integration.rs against the in-memory store.

    struct NoTopo;

    #[async_trait::async_trait]
    impl TopoServer for NoTopo {
        async fn submit_action(&self, _queue: &QueueId, _data: &str) -> Result<ActionPath> {
            Err(ActionQueueError::Store("no store in this test".into()))
        }
        async fn wait_for_action(&self, _path: &ActionPath) -> Result<String> {
            Err(ActionQueueError::Store("no store in this test".into()))
        }
        async fn get_tablet(&self, alias: &TabletAlias) -> Result<crate::types::TabletInfo> {
            Err(ActionQueueError::TabletNotFound(alias.to_string()))
        }
    }

    struct NoRpc;

    #[async_trait::async_trait]
    impl TabletRpc for NoRpc {
        async fn ping(&self, _t: &crate::types::TabletInfo, _w: Duration) -> Result<()> {
            Err(ActionQueueError::Rpc("no transport in this test".into()))
        }
        async fn change_type(
            &self,
            _t: &crate::types::TabletInfo,
            _ty: TabletType,
            _w: Duration,
        ) -> Result<()> {
            Err(ActionQueueError::Rpc("no transport in this test".into()))
        }
        async fn slave_was_promoted(
            &self,
            _t: &crate::types::TabletInfo,
            _w: Duration,
        ) -> Result<()> {
            Err(ActionQueueError::Rpc("no transport in this test".into()))
        }
        async fn slave_was_restarted(
            &self,
            _t: &crate::types::TabletInfo,
            _a: &SlaveWasRestartedArgs,
            _w: Duration,
        ) -> Result<()> {
            Err(ActionQueueError::Rpc("no transport in this test".into()))
        }
        async fn wait_blp_position(
            &self,
            _t: &crate::types::TabletInfo,
            _p: &BlpPosition,
            _w: Duration,
        ) -> Result<()> {
            Err(ActionQueueError::Rpc("no transport in this test".into()))
        }
        async fn get_schema(
            &self,
            _t: &crate::types::TabletInfo,
            _tables: &[String],
            _views: bool,
            _w: Duration,
        ) -> Result<SchemaDefinition> {
            Err(ActionQueueError::Rpc("no transport in this test".into()))
        }
        async fn get_permissions(
            &self,
            _t: &crate::types::TabletInfo,
            _w: Duration,
        ) -> Result<Permissions> {
            Err(ActionQueueError::Rpc("no transport in this test".into()))
        }
    }

    fn initiator() -> ActionInitiator {
        ActionInitiator::new(Arc::new(NoTopo), Arc::new(NoRpc), Interrupt::new())
    }

    #[test]
    fn shard_builders_assign_guid_without_submitting() {
        let ai = initiator();
        let node = ai.reparent_shard(&TabletAlias::new("nyc", 3));
        assert_eq!(node.kind(), ActionKind::ReparentShard);
        assert!(!node.guid.is_empty());
        assert!(node.error.is_empty());
        assert!(node.reply.is_none());

        let node = ai.apply_schema_shard(&TabletAlias::new("nyc", 3), "alter ...".into(), true);
        assert_eq!(node.kind(), ActionKind::ApplySchemaShard);

        let node = ai.rebuild_keyspace();
        assert_eq!(node.kind(), ActionKind::RebuildKeyspace);
    }

    #[tokio::test]
    async fn submission_error_surfaces_synchronously() {
        let ai = initiator();
        let err = ai.ping(&TabletAlias::new("nyc", 1)).await.unwrap_err();
        assert!(matches!(err, ActionQueueError::Store(_)));
    }

    #[tokio::test]
    async fn fast_path_requires_known_tablet() {
        let ai = initiator();
        let err = ai
            .rpc_ping(&TabletAlias::new("nyc", 9), Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, ActionQueueError::TabletNotFound(_)));
    }
}
