use thiserror::Error;

use crate::types::ActionPath;

/// Everything that can go wrong on the initiator side of the action queue.
///
/// The distinctions matter to callers: `Decode` means the store handed us
/// garbage, `Failed` means the remote executor ran the action and it failed
/// (the node is left in the queue for manual cleanup), `Timeout` and
/// `Interrupted` mean the action may still complete later.
#[derive(Debug, Error)]
pub enum ActionQueueError {
    #[error("topology store: {0}")]
    Store(String),

    #[error("tablet not found: {0}")]
    TabletNotFound(String),

    #[error("invalid tablet alias: {0}")]
    InvalidAlias(String),

    #[error("action data error: {path}: {source}")]
    Decode {
        path: ActionPath,
        #[source]
        source: serde_json::Error,
    },

    #[error("action failed: {path} {message}")]
    Failed { path: ActionPath, message: String },

    #[error("timed out waiting for action: {path}")]
    Timeout { path: ActionPath },

    #[error("interrupted")]
    Interrupted,

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ActionQueueError>;
