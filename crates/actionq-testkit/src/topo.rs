use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::watch;

use actionq::{
    ActionNode, ActionPath, ActionQueueError, QueueId, Result, TabletAlias, TabletInfo, TopoServer,
};

// ─── Node slots ───────────────────────────────────────────────────────────

/// Lifecycle of one queue entry. `Failed` nodes stay listed in their queue
/// (manual cleanup is the contract); `Done` nodes are removed, and the
/// slot keeps the final snapshot so late waiters still see the outcome.
#[derive(Debug, Clone)]
enum Slot {
    Pending(String),
    Failed(String),
    Done(String),
}

impl Slot {
    fn data(&self) -> &str {
        match self {
            Slot::Pending(d) | Slot::Failed(d) | Slot::Done(d) => d,
        }
    }

    fn is_settled(&self) -> bool {
        !matches!(self, Slot::Pending(_))
    }
}

struct NodeEntry {
    tx: watch::Sender<Slot>,
    queue_key: String,
    seq: u64,
}

#[derive(Default)]
struct State {
    tablets: HashMap<TabletAlias, TabletInfo>,
    seqs: HashMap<String, u64>,
    queues: HashMap<String, BTreeMap<u64, ActionPath>>,
    nodes: HashMap<ActionPath, NodeEntry>,
}

// ─── MemoryTopo ───────────────────────────────────────────────────────────

/// In-memory topology store: durable-enough for a test, with the same
/// observable contract as the real thing — per-queue increasing ids,
/// wake-on-settle, error-annotated nodes left in place.
pub struct MemoryTopo {
    state: Mutex<State>,
    /// Reachability switch; flips false to simulate a store outage.
    up: watch::Sender<bool>,
}

impl MemoryTopo {
    pub fn new() -> Self {
        let (up, _) = watch::channel(true);
        MemoryTopo {
            state: Mutex::new(State::default()),
            up,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_up(&self) -> Result<()> {
        if *self.up.borrow() {
            Ok(())
        } else {
            Err(ActionQueueError::Store("store unreachable".into()))
        }
    }

    pub fn register_tablet(&self, info: TabletInfo) {
        self.state().tablets.insert(info.alias.clone(), info);
    }

    /// Simulate losing (or regaining) the connection to the store. While
    /// unreachable, submissions and lookups fail and in-flight waits
    /// surface a store error.
    pub fn set_unreachable(&self, unreachable: bool) {
        self.up.send_replace(!unreachable);
    }

    /// Paths still listed in `queue`, in execution order. Failed nodes
    /// remain listed; resolved ones do not.
    pub fn pending(&self, queue: &QueueId) -> Vec<ActionPath> {
        self.state()
            .queues
            .get(&queue.to_string())
            .map(|q| q.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Current serialized data for a node still present in the store, or
    /// `None` once it has been removed by a successful resolution.
    pub fn node_data(&self, path: &ActionPath) -> Option<String> {
        let state = self.state();
        let entry = state.nodes.get(path)?;
        let slot = entry.tx.borrow();
        match &*slot {
            Slot::Pending(d) | Slot::Failed(d) => Some(d.clone()),
            Slot::Done(_) => None,
        }
    }

    /// Play the executor's success move: attach `reply`, remove the node
    /// from its queue, and wake waiters with the final snapshot.
    pub fn resolve(&self, path: &ActionPath, reply: Option<Value>) -> Result<()> {
        let mut state = self.state();
        let entry = state
            .nodes
            .get(path)
            .ok_or_else(|| ActionQueueError::Store(format!("unknown action path: {path}")))?;

        let mut node = ActionNode::decode(&entry.tx.borrow().data().to_owned())?;
        node.reply = reply;
        let snapshot = node.encode()?;
        entry.tx.send_replace(Slot::Done(snapshot));

        let (queue_key, seq) = (entry.queue_key.clone(), entry.seq);
        if let Some(queue) = state.queues.get_mut(&queue_key) {
            queue.remove(&seq);
        }
        Ok(())
    }

    /// Play the executor's failure move: write `message` into the node's
    /// error field and wake waiters. The node stays in its queue.
    pub fn fail(&self, path: &ActionPath, message: &str) -> Result<()> {
        let state = self.state();
        let entry = state
            .nodes
            .get(path)
            .ok_or_else(|| ActionQueueError::Store(format!("unknown action path: {path}")))?;

        let mut node = ActionNode::decode(&entry.tx.borrow().data().to_owned())?;
        node.error = message.to_owned();
        let annotated = node.encode()?;
        entry.tx.send_replace(Slot::Failed(annotated));
        Ok(())
    }
}

impl Default for MemoryTopo {
    fn default() -> Self {
        MemoryTopo::new()
    }
}

#[async_trait]
impl TopoServer for MemoryTopo {
    async fn submit_action(&self, queue: &QueueId, data: &str) -> Result<ActionPath> {
        self.check_up()?;
        let mut state = self.state();

        let queue_key = queue.to_string();
        let seq = state.seqs.entry(queue_key.clone()).or_insert(0);
        *seq += 1;
        let seq = *seq;

        let path = ActionPath(format!("/actionq/{queue_key}/{seq:010}"));
        let (tx, _) = watch::channel(Slot::Pending(data.to_owned()));
        state.nodes.insert(
            path.clone(),
            NodeEntry {
                tx,
                queue_key: queue_key.clone(),
                seq,
            },
        );
        state
            .queues
            .entry(queue_key)
            .or_default()
            .insert(seq, path.clone());
        Ok(path)
    }

    async fn wait_for_action(&self, path: &ActionPath) -> Result<String> {
        self.check_up()?;
        let mut rx = {
            let state = self.state();
            state
                .nodes
                .get(path)
                .ok_or_else(|| ActionQueueError::Store(format!("unknown action path: {path}")))?
                .tx
                .subscribe()
        };
        let mut up_rx = self.up.subscribe();

        tokio::select! {
            settled = rx.wait_for(Slot::is_settled) => {
                let slot = settled
                    .map_err(|_| ActionQueueError::Store("action node dropped".into()))?;
                Ok(slot.data().to_owned())
            }
            down = up_rx.wait_for(|up| !*up) => {
                let _ = down;
                Err(ActionQueueError::Store("store unreachable".into()))
            }
        }
    }

    async fn get_tablet(&self, alias: &TabletAlias) -> Result<TabletInfo> {
        self.check_up()?;
        self.state()
            .tablets
            .get(alias)
            .cloned()
            .ok_or_else(|| ActionQueueError::TabletNotFound(alias.to_string()))
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────
