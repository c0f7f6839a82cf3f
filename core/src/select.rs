//! Selection policy — pure functions choosing a redirection target
//!
//! Two modes over a snapshot of the resource-state table, neither of which
//! mutates it:
//! - capacity mode keys on raw core occupancy,
//! - utility mode keys on the advertised spare-capacity score.

use crate::table::ResourceStateTable;
use crate::{EngineError, NodeId};
use tracing::debug;

/// The peer chosen by utility-mode selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UtilityPick {
    pub node_id: NodeId,
    pub utility: u32,
    pub rtt: i64,
}

/// Capacity mode: keep `target` unless it is saturated, in which case the
/// least-loaded known peer takes its place. Unknown targets are the
/// caller's error to surface.
pub fn pick_by_capacity(
    table: &ResourceStateTable,
    target: NodeId,
) -> Result<NodeId, EngineError> {
    if table.is_saturated(target)? {
        let fallback = table.least_loaded()?;
        debug!(target, fallback, "target saturated, picking least-loaded peer");
        Ok(fallback)
    } else {
        Ok(target)
    }
}

/// Utility mode: among peers advertising `utility >= cost`, pick the one
/// with minimum rtt. Ties keep the first qualifier in scan order. No
/// qualifier at all is `NoCapacity`; the caller falls back upstream.
pub fn pick_by_utility(table: &ResourceStateTable, cost: u32) -> Result<UtilityPick, EngineError> {
    let mut best: Option<UtilityPick> = None;
    for peer in table.iter() {
        if peer.utility < cost {
            continue;
        }
        let qualifies = match best {
            None => true,
            // Strictly lower rtt only: equal rtt keeps the earlier find.
            Some(current) => peer.rtt < current.rtt,
        };
        if qualifies {
            best = Some(UtilityPick {
                node_id: peer.id,
                utility: peer.utility,
                rtt: peer.rtt,
            });
        }
    }
    best.ok_or(EngineError::NoCapacity { cost })
}
