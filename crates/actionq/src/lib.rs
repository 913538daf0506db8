//! `actionq` — producer/coordinator client for the cluster action queue.
//!
//! Mutations of a tablet, shard or keyspace (reparents, schema changes,
//! snapshots, restores, type changes) must not race each other on the same
//! entity. Each entity gets a durable, ordered queue in the topology store;
//! an external executor drains each queue in increasing-id order with at
//! most one action in flight. This crate is the producer side: it builds
//! command nodes, appends them, and waits for their resolution.
//!
//! # Architecture
//!
//! ```text
//! ActionInitiator
//!     │  builds ActionNode (guid + tagged payload), encodes to JSON
//!     ▼
//! TopoServer      ← durable per-entity queue; append returns an ActionPath
//!     │              external executor runs nodes in id order
//!     ▼
//! wait_for_completion   ← blocks until removal (success) or error
//!     │                    annotation (failure), bounded by timeout and
//!     ▼                    the process-wide Interrupt
//! reply / ActionQueueError
//! ```
//!
//! For a subset of operations (ping, type change, promotion/restart
//! notifications, schema and permissions introspection, binlog-player
//! position waits) a direct-RPC fast path over [`TabletRpc`] skips the
//! queue entirely and returns a synchronous result under a caller-supplied
//! bound. Queued and direct forms are distinct methods so the
//! durability/ordering contract is visible at the call site.
//!
//! Failed actions are never retried or cleaned up here: the executor
//! leaves the annotated node in the queue for an operator to resolve.

pub mod error;
pub mod initiator;
pub mod interrupt;
pub mod node;
pub mod rpc;
pub mod topo;
pub mod types;

pub use error::ActionQueueError;
pub use initiator::{wait_for_completion, ActionInitiator, DEFAULT_WAIT_TIME};
pub use interrupt::Interrupt;
pub use node::{
    ActionKind, ActionNode, ActionPayload, ApplySchemaKeyspaceArgs, ApplySchemaShardArgs,
    GetSchemaArgs, MigrateServedTypesArgs, MultiRestoreArgs, MultiSnapshotArgs,
    ReserveForRestoreArgs, RestartSlaveData, RestoreArgs, SetShardServedTypesArgs,
    SlaveWasRestartedArgs, SnapshotArgs, SnapshotSourceEndArgs, WaitSlavePositionArgs,
};
pub use rpc::TabletRpc;
pub use topo::TopoServer;
pub use types::{
    ActionLevel, ActionPath, BlpPosition, Hook, KeyRange, Permissions, QueueId,
    ReplicationPosition, SchemaChange, SchemaDefinition, TableDefinition, TabletAlias, TabletInfo,
    TabletType, UserPermission,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ActionQueueError>;
