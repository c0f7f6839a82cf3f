// cfn-core — Offload Decision Engine
//
// "Given what the mesh has told us lately, is this task better
//  run here, on a neighbour, or in the cloud?"
//
// Everything that answers that question lives in this crate.
// Everything that moves bytes between nodes does not.

pub mod classify;
pub mod engine;
pub mod graph;
pub mod redirect;
pub mod select;
pub mod table;
pub mod wire;

use thiserror::Error;

pub use classify::{classify, ExecRequest, MessageClass};
pub use engine::{DecisionEngine, DropReason, EngineConfig, Outcome};
pub use graph::{DataRef, Graph, TaskNode};
pub use redirect::{Destination, Redirect};
pub use select::{pick_by_capacity, pick_by_utility, UtilityPick};
pub use table::{PeerState, ResourceStateTable, LIVENESS_EPOCHS};
pub use wire::{MessageKind, WireError, WireFrame};

/// Stable peer/node identifier, unique across the mesh.
pub type NodeId = u32;

/// Fixed upstream destination used whenever no peer qualifies.
pub const CLOUD_NAME: &str = "/cloud/task";

// ============================================================================
// ERROR TYPES
// ============================================================================

/// Decision-engine errors
///
/// Every variant is recovered locally: malformed messages are dropped,
/// selection failures fall back to the fixed upstream destination. Nothing
/// in this crate is allowed to take the host process down.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// A payload failed to decode — the message is dropped.
    #[error("malformed payload: {0}")]
    Malformed(#[from] WireError),

    /// A query named a peer the table has never seen (or has aged out).
    #[error("unknown peer {0}")]
    UnknownPeer(NodeId),

    /// Selection attempted with zero known peers.
    #[error("resource table is empty")]
    EmptyTable,

    /// Utility-mode selection found no peer with enough spare capacity.
    #[error("no peer can absorb a task of cost {cost}")]
    NoCapacity { cost: u32 },
}
