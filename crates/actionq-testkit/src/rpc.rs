use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use actionq::{
    ActionQueueError, BlpPosition, Permissions, Result, SchemaDefinition, SlaveWasRestartedArgs,
    TabletInfo, TabletRpc, TabletType,
};

// ─── ScriptedRpc ──────────────────────────────────────────────────────────

/// A [`TabletRpc`] that answers from a script. Every call is appended to a
/// log (`"<op> <alias>"`) so tests can assert what was sent where; canned
/// schema/permissions results and a blanket failure mode cover the rest.
#[derive(Default)]
pub struct ScriptedRpc {
    calls: Mutex<Vec<String>>,
    fail_with: Mutex<Option<String>>,
    schema: Mutex<SchemaDefinition>,
    permissions: Mutex<Permissions>,
}

impl ScriptedRpc {
    pub fn new() -> Self {
        ScriptedRpc::default()
    }

    /// All subsequent calls fail with an rpc error carrying `message`.
    pub fn fail_with(&self, message: &str) {
        *lock(&self.fail_with) = Some(message.to_owned());
    }

    pub fn set_schema(&self, schema: SchemaDefinition) {
        *lock(&self.schema) = schema;
    }

    pub fn set_permissions(&self, permissions: Permissions) {
        *lock(&self.permissions) = permissions;
    }

    /// The call log so far, oldest first.
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    fn record(&self, call: String) -> Result<()> {
        lock(&self.calls).push(call);
        match lock(&self.fail_with).clone() {
            Some(message) => Err(ActionQueueError::Rpc(message)),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl TabletRpc for ScriptedRpc {
    async fn ping(&self, tablet: &TabletInfo, _wait: Duration) -> Result<()> {
        self.record(format!("ping {}", tablet.alias))
    }

    async fn change_type(
        &self,
        tablet: &TabletInfo,
        tablet_type: TabletType,
        _wait: Duration,
    ) -> Result<()> {
        self.record(format!("change_type {} {tablet_type}", tablet.alias))
    }

    async fn slave_was_promoted(&self, tablet: &TabletInfo, _wait: Duration) -> Result<()> {
        self.record(format!("slave_was_promoted {}", tablet.alias))
    }

    async fn slave_was_restarted(
        &self,
        tablet: &TabletInfo,
        _args: &SlaveWasRestartedArgs,
        _wait: Duration,
    ) -> Result<()> {
        self.record(format!("slave_was_restarted {}", tablet.alias))
    }

    async fn wait_blp_position(
        &self,
        tablet: &TabletInfo,
        position: &BlpPosition,
        _wait: Duration,
    ) -> Result<()> {
        self.record(format!(
            "wait_blp_position {} {}/{}",
            tablet.alias, position.uid, position.group_id
        ))
    }

    async fn get_schema(
        &self,
        tablet: &TabletInfo,
        _tables: &[String],
        _include_views: bool,
        _wait: Duration,
    ) -> Result<SchemaDefinition> {
        self.record(format!("get_schema {}", tablet.alias))?;
        Ok(lock(&self.schema).clone())
    }

    async fn get_permissions(&self, tablet: &TabletInfo, _wait: Duration) -> Result<Permissions> {
        self.record(format!("get_permissions {}", tablet.alias))?;
        Ok(lock(&self.permissions).clone())
    }
}
