//! Flow-table reconciliation core for a local OpenFlow controller agent.
//!
//! Desired flows (and groups, meters) are accumulated incrementally from logical network state;
//! the reconciliation engine diffs them against what's believed installed on the switch and
//! emits the minimum batch of flow-mods to converge, behind a connection state machine that
//! negotiates a tunnel-metadata option and forces a full reinstall after every reconnect.
//!
//! Built on the vocabulary in the `ovs` crate: [`ovs::Transport`] for the reconnecting message
//! channel, [`ovs::FlowKey`]/[`ovs::FlowValue`] for the flow table's key/value types.

pub mod cfg_tracker;
pub mod ctzone;
pub mod desired;
pub mod driver;
pub mod engine;
pub mod error;
pub mod ext_table;
pub mod fsm;
pub mod installed;
pub mod interfaces;
pub mod packet_inject;
mod ratelimit;
pub mod testutil;

pub use cfg_tracker::CfgTracker;
pub use desired::{DesiredTable, FlowId};
pub use driver::Driver;
pub use engine::{put, ReconcileCore};
pub use fsm::ConnFsm;
pub use installed::InstalledTable;
