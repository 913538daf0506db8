//! The action node: the serializable command record that travels through
//! the per-entity queues in the topology store.
//!
//! Actions modify the state of a tablet, shard or keyspace. Only the
//! lowest-id node in a queue should be executing at any given time; the
//! external executor signals success by removing the node and signals
//! failure by writing the `error` field back into it and leaving it in
//! place for an operator to resolve.

use std::fmt;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::{
    ActionLevel, BlpPosition, Hook, KeyRange, ReplicationPosition, SchemaChange, TabletAlias,
    TabletType,
};

// ─── Kind taxonomy ────────────────────────────────────────────────────────

/// The closed set of action kinds, in three tiers. The tier decides which
/// queue a node belongs on; the kind decides the shape of its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    // Tablet tier
    Ping,
    Sleep,
    ChangeType,
    SetReadOnly,
    SetReadWrite,
    DemoteMaster,
    Snapshot,
    SnapshotSourceEnd,
    MultiSnapshot,
    MultiRestore,
    BreakSlaves,
    PromoteSlave,
    SlaveWasPromoted,
    RestartSlave,
    SlaveWasRestarted,
    ReparentPosition,
    MasterPosition,
    SlavePosition,
    WaitSlavePosition,
    StopSlave,
    WaitBlpPosition,
    ReserveForRestore,
    Restore,
    Scrap,
    GetSchema,
    PreflightSchema,
    ApplySchema,
    ExecuteHook,
    GetSlaves,
    // Shard tier
    ReparentShard,
    ShardExternallyReparented,
    RebuildShard,
    CheckShard,
    ApplySchemaShard,
    SetShardServedTypes,
    ShardMultiRestore,
    MigrateServedTypes,
    UpdateShard,
    // Keyspace tier
    RebuildKeyspace,
    ApplySchemaKeyspace,
}

impl ActionKind {
    /// Which queue tier this kind targets.
    pub fn level(self) -> ActionLevel {
        use ActionKind::*;
        match self {
            ReparentShard | ShardExternallyReparented | RebuildShard | CheckShard
            | ApplySchemaShard | SetShardServedTypes | ShardMultiRestore | MigrateServedTypes
            | UpdateShard => ActionLevel::Shard,
            RebuildKeyspace | ApplySchemaKeyspace => ActionLevel::Keyspace,
            _ => ActionLevel::Tablet,
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

// ─── Per-kind argument payloads ───────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotArgs {
    pub concurrency: usize,
    pub server_mode: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotSourceEndArgs {
    pub slave_start_required: bool,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiSnapshotArgs {
    pub key_name: String,
    pub key_ranges: Vec<KeyRange>,
    pub tables: Vec<String>,
    pub concurrency: usize,
    pub skip_slave_restart: bool,
    pub maximum_file_size: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MultiRestoreArgs {
    pub src_tablet_aliases: Vec<TabletAlias>,
    pub concurrency: usize,
    pub fetch_concurrency: usize,
    pub insert_table_concurrency: usize,
    pub fetch_retry_count: usize,
    pub strategy: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestartSlaveData {
    pub parent: Option<TabletAlias>,
    pub wait_position: ReplicationPosition,
    pub time_promoted: i64,
    pub force: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaveWasRestartedArgs {
    pub parent: Option<TabletAlias>,
    pub expected_master_addr: String,
    pub expected_master_ip_addr: String,
    pub scrap_stragglers: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitSlavePositionArgs {
    pub replication_position: ReplicationPosition,
    /// Seconds; zero means wait indefinitely.
    pub wait_timeout: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WaitBlpPositionArgs {
    pub blp_position: BlpPosition,
    /// Seconds; zero means wait indefinitely.
    pub wait_timeout: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReserveForRestoreArgs {
    pub src_tablet_alias: Option<TabletAlias>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RestoreArgs {
    pub src_tablet_alias: Option<TabletAlias>,
    pub src_file_path: String,
    pub parent_alias: Option<TabletAlias>,
    pub fetch_concurrency: usize,
    pub fetch_retry_count: usize,
    pub was_reserved: bool,
    pub dont_wait_for_slave_start: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetSchemaArgs {
    pub tables: Vec<String>,
    pub include_views: bool,
}

// Parameters on the shard/keyspace schema nodes are stored for debugging;
// the executor re-reads them from the node when it runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplySchemaShardArgs {
    pub master_tablet_alias: Option<TabletAlias>,
    pub change: String,
    pub simple: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetShardServedTypesArgs {
    pub served_types: Vec<TabletType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrateServedTypesArgs {
    pub served_type: TabletType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplySchemaKeyspaceArgs {
    pub change: String,
    pub simple: bool,
}

// ─── Payload union ────────────────────────────────────────────────────────

/// Kind plus arguments as one tagged union. The wire form is adjacently
/// tagged (`actionKind` selects the variant, `args` carries the payload),
/// so the decoder necessarily reads the kind before materializing the
/// arguments — the payload is not self-describing. Adding a kind is a
/// compile-checked change: a variant here and an [`ActionKind`] member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "actionKind", content = "args")]
pub enum ActionPayload {
    // Tablet tier
    Ping,
    Sleep(Duration),
    ChangeType(TabletType),
    SetReadOnly,
    SetReadWrite,
    DemoteMaster,
    Snapshot(SnapshotArgs),
    SnapshotSourceEnd(SnapshotSourceEndArgs),
    MultiSnapshot(MultiSnapshotArgs),
    MultiRestore(MultiRestoreArgs),
    BreakSlaves,
    PromoteSlave,
    SlaveWasPromoted,
    RestartSlave(RestartSlaveData),
    SlaveWasRestarted(SlaveWasRestartedArgs),
    ReparentPosition(ReplicationPosition),
    MasterPosition,
    SlavePosition,
    WaitSlavePosition(WaitSlavePositionArgs),
    StopSlave,
    WaitBlpPosition(WaitBlpPositionArgs),
    ReserveForRestore(ReserveForRestoreArgs),
    Restore(RestoreArgs),
    Scrap,
    GetSchema(GetSchemaArgs),
    PreflightSchema(String),
    ApplySchema(SchemaChange),
    ExecuteHook(Hook),
    GetSlaves,
    // Shard tier
    ReparentShard(TabletAlias),
    ShardExternallyReparented(TabletAlias),
    RebuildShard,
    CheckShard,
    ApplySchemaShard(ApplySchemaShardArgs),
    SetShardServedTypes(SetShardServedTypesArgs),
    ShardMultiRestore(MultiRestoreArgs),
    MigrateServedTypes(MigrateServedTypesArgs),
    UpdateShard,
    // Keyspace tier
    RebuildKeyspace,
    ApplySchemaKeyspace(ApplySchemaKeyspaceArgs),
}

impl ActionPayload {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::Ping => ActionKind::Ping,
            ActionPayload::Sleep(_) => ActionKind::Sleep,
            ActionPayload::ChangeType(_) => ActionKind::ChangeType,
            ActionPayload::SetReadOnly => ActionKind::SetReadOnly,
            ActionPayload::SetReadWrite => ActionKind::SetReadWrite,
            ActionPayload::DemoteMaster => ActionKind::DemoteMaster,
            ActionPayload::Snapshot(_) => ActionKind::Snapshot,
            ActionPayload::SnapshotSourceEnd(_) => ActionKind::SnapshotSourceEnd,
            ActionPayload::MultiSnapshot(_) => ActionKind::MultiSnapshot,
            ActionPayload::MultiRestore(_) => ActionKind::MultiRestore,
            ActionPayload::BreakSlaves => ActionKind::BreakSlaves,
            ActionPayload::PromoteSlave => ActionKind::PromoteSlave,
            ActionPayload::SlaveWasPromoted => ActionKind::SlaveWasPromoted,
            ActionPayload::RestartSlave(_) => ActionKind::RestartSlave,
            ActionPayload::SlaveWasRestarted(_) => ActionKind::SlaveWasRestarted,
            ActionPayload::ReparentPosition(_) => ActionKind::ReparentPosition,
            ActionPayload::MasterPosition => ActionKind::MasterPosition,
            ActionPayload::SlavePosition => ActionKind::SlavePosition,
            ActionPayload::WaitSlavePosition(_) => ActionKind::WaitSlavePosition,
            ActionPayload::StopSlave => ActionKind::StopSlave,
            ActionPayload::WaitBlpPosition(_) => ActionKind::WaitBlpPosition,
            ActionPayload::ReserveForRestore(_) => ActionKind::ReserveForRestore,
            ActionPayload::Restore(_) => ActionKind::Restore,
            ActionPayload::Scrap => ActionKind::Scrap,
            ActionPayload::GetSchema(_) => ActionKind::GetSchema,
            ActionPayload::PreflightSchema(_) => ActionKind::PreflightSchema,
            ActionPayload::ApplySchema(_) => ActionKind::ApplySchema,
            ActionPayload::ExecuteHook(_) => ActionKind::ExecuteHook,
            ActionPayload::GetSlaves => ActionKind::GetSlaves,
            ActionPayload::ReparentShard(_) => ActionKind::ReparentShard,
            ActionPayload::ShardExternallyReparented(_) => ActionKind::ShardExternallyReparented,
            ActionPayload::RebuildShard => ActionKind::RebuildShard,
            ActionPayload::CheckShard => ActionKind::CheckShard,
            ActionPayload::ApplySchemaShard(_) => ActionKind::ApplySchemaShard,
            ActionPayload::SetShardServedTypes(_) => ActionKind::SetShardServedTypes,
            ActionPayload::ShardMultiRestore(_) => ActionKind::ShardMultiRestore,
            ActionPayload::MigrateServedTypes(_) => ActionKind::MigrateServedTypes,
            ActionPayload::UpdateShard => ActionKind::UpdateShard,
            ActionPayload::RebuildKeyspace => ActionKind::RebuildKeyspace,
            ActionPayload::ApplySchemaKeyspace(_) => ActionKind::ApplySchemaKeyspace,
        }
    }
}

// ─── ActionNode ───────────────────────────────────────────────────────────

/// One queued command. Wire shape:
///
/// ```json
/// { "actionGuid": "...", "actionKind": "Sleep", "args": {...},
///   "error": "...", "reply": {...} }
/// ```
///
/// `args` is omitted for kinds with no arguments; `error` and `reply` are
/// omitted until the executor writes one of them back. After terminal
/// execution exactly one of {non-empty `error`, populated `reply`} holds.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionNode {
    /// Best-effort identity: timestamp, acting user and host. Assigned once
    /// at construction, never changed. The store-assigned path is the
    /// authoritative identity; the guid exists for audit trails.
    pub guid: String,
    pub payload: ActionPayload,
    /// Written by the executor on failure; non-empty means the action failed.
    pub error: String,
    /// Written by the executor on success; opaque to this layer.
    pub reply: Option<Value>,
}

impl ActionNode {
    pub fn new(payload: ActionPayload) -> Self {
        ActionNode {
            guid: action_guid(),
            payload,
            error: String::new(),
            reply: None,
        }
    }

    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }

    /// Serialize to the durable wire form. Kind-agnostic: every populated
    /// field is written, empty `error` and absent `reply` are dropped.
    pub fn encode(&self) -> crate::Result<String> {
        use serde::ser::Error as _;

        let value = serde_json::to_value(&self.payload)?;
        let Value::Object(mut obj) = value else {
            return Err(serde_json::Error::custom("action payload must encode to an object").into());
        };
        obj.insert("actionGuid".to_owned(), Value::String(self.guid.clone()));
        if !self.error.is_empty() {
            obj.insert("error".to_owned(), Value::String(self.error.clone()));
        }
        if let Some(reply) = &self.reply {
            obj.insert("reply".to_owned(), reply.clone());
        }
        Ok(serde_json::to_string(&Value::Object(obj))?)
    }

    /// Parse the wire form back into a node. Reads `actionKind` first to
    /// select the argument decoder; tolerates absent `error` and `reply`.
    ///
    /// A failure here means the store handed back something malformed —
    /// a different situation from a well-formed node whose `error` field
    /// is populated, which the wait protocol reports separately.
    pub fn decode(data: &str) -> serde_json::Result<Self> {
        use serde::de::Error as _;

        let value: Value = serde_json::from_str(data)?;
        let Value::Object(mut obj) = value else {
            return Err(serde_json::Error::custom("action node must be a JSON object"));
        };
        let guid = match obj.remove("actionGuid") {
            Some(v) => serde_json::from_value(v)?,
            None => String::new(),
        };
        let error = match obj.remove("error") {
            Some(v) => serde_json::from_value(v)?,
            None => String::new(),
        };
        let reply = obj.remove("reply").filter(|v| !v.is_null());
        let payload = serde_json::from_value(Value::Object(obj))?;
        Ok(ActionNode {
            guid,
            payload,
            error,
            reply,
        })
    }
}

/// Best-effort uniqueness token: wall clock + user + host. Collisions are
/// possible under clock skew or rapid submission within one second; the
/// store-assigned action path is what ordering and waiting key off.
fn action_guid() -> String {
    let now = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let user = std::env::var("USER").unwrap_or_else(|_| "unknown".to_owned());
    let host = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_owned());
    format!("{now}-{user}-{host}")
}

// ─── Tests ────────────────────────────────────────────────────────────────
