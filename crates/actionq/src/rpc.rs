use std::time::Duration;

use async_trait::async_trait;

use crate::node::SlaveWasRestartedArgs;
use crate::types::{BlpPosition, Permissions, SchemaDefinition, TabletInfo, TabletType};
use crate::Result;

// ─── TabletRpc ────────────────────────────────────────────────────────────

/// Synchronous per-tablet calls for the fast path: idempotent, quick,
/// informational, or urgent operations that skip the queue entirely.
/// No durable node is created and no per-entity ordering applies — the
/// queued path stays mandatory for mutations that must serialize against
/// other queued mutations.
///
/// Every call takes a caller-supplied bound on wait time; implementations
/// fail the call rather than blocking past it.
#[async_trait]
pub trait TabletRpc: Send + Sync {
    /// Liveness check.
    async fn ping(&self, tablet: &TabletInfo, wait: Duration) -> Result<()>;

    async fn change_type(
        &self,
        tablet: &TabletInfo,
        tablet_type: TabletType,
        wait: Duration,
    ) -> Result<()>;

    async fn slave_was_promoted(&self, tablet: &TabletInfo, wait: Duration) -> Result<()>;

    async fn slave_was_restarted(
        &self,
        tablet: &TabletInfo,
        args: &SlaveWasRestartedArgs,
        wait: Duration,
    ) -> Result<()>;

    /// Block until the tablet's binlog player reaches `position`.
    async fn wait_blp_position(
        &self,
        tablet: &TabletInfo,
        position: &BlpPosition,
        wait: Duration,
    ) -> Result<()>;

    async fn get_schema(
        &self,
        tablet: &TabletInfo,
        tables: &[String],
        include_views: bool,
        wait: Duration,
    ) -> Result<SchemaDefinition>;

    async fn get_permissions(&self, tablet: &TabletInfo, wait: Duration) -> Result<Permissions>;
}
