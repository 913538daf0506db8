use async_trait::async_trait;

use crate::types::{ActionPath, QueueId, TabletAlias, TabletInfo};
use crate::Result;

// ─── TopoServer ───────────────────────────────────────────────────────────

/// What this library needs from the topology/coordination store. The store
/// itself — consensus, storage, watch plumbing — is somebody else's
/// problem; this is the consumed surface only.
///
/// Ordering guarantee (provided by implementations, relied on here): each
/// queue hands out strictly increasing ids, and the executor drains a queue
/// in id order with at most one action in flight. Nothing in this crate
/// re-checks that; it only submits well-formed nodes and reads them back.
#[async_trait]
pub trait TopoServer: Send + Sync {
    /// Append a serialized node to the entity's durable queue and return
    /// the store-assigned path. Durable once acknowledged. Fails fast if
    /// the store is unreachable; nothing is retried.
    async fn submit_action(&self, queue: &QueueId, data: &str) -> Result<ActionPath>;

    /// Resolve when the node at `path` is removed (success — the store
    /// returns its last snapshot) or updated with an error annotation
    /// (returns the updated data). No timeout of its own: the wait
    /// protocol composes timeout and interrupt around this future.
    async fn wait_for_action(&self, path: &ActionPath) -> Result<String>;

    /// Current record for a tablet: address and serving metadata. Used by
    /// the direct-RPC fast path to find the endpoint to call.
    async fn get_tablet(&self, alias: &TabletAlias) -> Result<TabletInfo>;
}
