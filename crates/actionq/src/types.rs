use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ActionQueueError;

// ─── Entity identities ────────────────────────────────────────────────────

/// Globally unique name of a single tablet: the cell it lives in plus a
/// numeric uid within that cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TabletAlias {
    pub cell: String,
    pub uid: u32,
}

impl TabletAlias {
    pub fn new(cell: impl Into<String>, uid: u32) -> Self {
        TabletAlias {
            cell: cell.into(),
            uid,
        }
    }
}

impl fmt::Display for TabletAlias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{:010}", self.cell, self.uid)
    }
}

impl FromStr for TabletAlias {
    type Err = ActionQueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (cell, uid) = s
            .rsplit_once('-')
            .ok_or_else(|| ActionQueueError::InvalidAlias(s.to_owned()))?;
        if cell.is_empty() {
            return Err(ActionQueueError::InvalidAlias(s.to_owned()));
        }
        let uid = uid
            .parse()
            .map_err(|_| ActionQueueError::InvalidAlias(s.to_owned()))?;
        Ok(TabletAlias::new(cell, uid))
    }
}

/// The role a tablet currently plays in its shard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TabletType {
    Idle,
    Master,
    Replica,
    Rdonly,
    Spare,
    Backup,
    Restore,
    Lag,
    Scrap,
}

impl TabletType {
    pub fn as_str(self) -> &'static str {
        match self {
            TabletType::Idle => "idle",
            TabletType::Master => "master",
            TabletType::Replica => "replica",
            TabletType::Rdonly => "rdonly",
            TabletType::Spare => "spare",
            TabletType::Backup => "backup",
            TabletType::Restore => "restore",
            TabletType::Lag => "lag",
            TabletType::Scrap => "scrap",
        }
    }
}

impl fmt::Display for TabletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a tablet's record in the topology store: where it lives and
/// what it currently serves. Returned by [`TopoServer::get_tablet`] and used
/// by the direct-RPC fast path to reach the tablet.
///
/// [`TopoServer::get_tablet`]: crate::topo::TopoServer::get_tablet
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TabletInfo {
    pub alias: TabletAlias,
    pub keyspace: String,
    pub shard: String,
    pub tablet_type: TabletType,
    /// host:port the tablet's RPC endpoint listens on.
    pub addr: String,
}

// ─── Queue addressing ─────────────────────────────────────────────────────

/// The three levels at which mutations are queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionLevel {
    Tablet,
    Shard,
    Keyspace,
}

/// Identifies one durable action queue in the topology store. A tablet,
/// a shard, and a keyspace each get their own ordered queue; the executor
/// drains each queue independently in increasing-id order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueueId {
    Tablet(TabletAlias),
    Shard { keyspace: String, shard: String },
    Keyspace(String),
}

impl QueueId {
    pub fn level(&self) -> ActionLevel {
        match self {
            QueueId::Tablet(_) => ActionLevel::Tablet,
            QueueId::Shard { .. } => ActionLevel::Shard,
            QueueId::Keyspace(_) => ActionLevel::Keyspace,
        }
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueId::Tablet(alias) => write!(f, "tablets/{alias}"),
            QueueId::Shard { keyspace, shard } => write!(f, "shards/{keyspace}/{shard}"),
            QueueId::Keyspace(keyspace) => write!(f, "keyspaces/{keyspace}"),
        }
    }
}

/// Opaque handle to a submitted action, assigned by the store at append
/// time. The only thing callers do with it is wait for completion (or
/// hand it to operator tooling).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActionPath(pub String);

impl ActionPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ActionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Replication & schema payload types ───────────────────────────────────

/// Position in the master's binary log.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicationPosition {
    pub master_log_file: String,
    pub master_log_position: u64,
    pub master_log_group_id: u64,
}

/// Position of a binlog player stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlpPosition {
    pub uid: u32,
    pub group_id: u64,
}

/// Half-open keyspace-id range, hex encoded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyRange {
    pub start: String,
    pub end: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDefinition {
    pub name: String,
    /// `CREATE TABLE` statement for the table.
    pub schema: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaDefinition {
    pub database_schema: String,
    pub table_definitions: Vec<TableDefinition>,
    pub version: String,
}

/// A schema change to apply to a tablet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaChange {
    pub sql: String,
    pub force: bool,
    pub allow_replication: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPermission {
    pub user: String,
    pub host: String,
    pub privileges: Vec<String>,
}

/// MySQL grants as seen by the tablet, for cross-replica comparison.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    pub users: Vec<UserPermission>,
}

/// An operator-provided executable to run on the tablet host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hook {
    pub name: String,
    pub parameters: Vec<String>,
    pub extra_env: HashMap<String, String>,
}

// ─── Tests ────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alias_display_roundtrip() {
        let alias = TabletAlias::new("nyc", 42);
        assert_eq!(alias.to_string(), "nyc-0000000042");
        assert_eq!(alias.to_string().parse::<TabletAlias>().unwrap(), alias);
    }

    #[test]
    fn alias_parse_rejects_garbage() {
        assert!("".parse::<TabletAlias>().is_err());
        assert!("nouid".parse::<TabletAlias>().is_err());
        assert!("-12".parse::<TabletAlias>().is_err());
        assert!("nyc-notanumber".parse::<TabletAlias>().is_err());
    }

    #[test]
    fn queue_id_display_and_level() {
        let tablet = QueueId::Tablet(TabletAlias::new("nyc", 1));
        assert_eq!(tablet.to_string(), "tablets/nyc-0000000001");
        assert_eq!(tablet.level(), ActionLevel::Tablet);

        let shard = QueueId::Shard {
            keyspace: "test_keyspace".into(),
            shard: "0-80".into(),
        };
        assert_eq!(shard.to_string(), "shards/test_keyspace/0-80");
        assert_eq!(shard.level(), ActionLevel::Shard);

        let keyspace = QueueId::Keyspace("test_keyspace".into());
        assert_eq!(keyspace.to_string(), "keyspaces/test_keyspace");
        assert_eq!(keyspace.level(), ActionLevel::Keyspace);
    }
}
