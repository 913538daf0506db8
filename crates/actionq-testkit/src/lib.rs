//! Test doubles for the `actionq` contracts.
//!
//! [`MemoryTopo`] is an in-memory [`TopoServer`]: per-queue monotonically
//! increasing sequence numbers, watch-based completion wakes, and operator
//! helpers to play the role of the external executor (`resolve`, `fail`).
//! [`ScriptedRpc`] is a [`TabletRpc`] with canned results and a call log.
//!
//! Neither implements the real store or transport — consensus, storage and
//! wire protocols live elsewhere. These exist so queue flows can be
//! exercised end to end in tests without either.
//!
//! [`TopoServer`]: actionq::TopoServer
//! [`TabletRpc`]: actionq::TabletRpc

mod rpc;
mod topo;

pub use rpc::ScriptedRpc;
pub use topo::MemoryTopo;
