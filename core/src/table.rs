//! Resource-state gossip table
//!
//! One entry per known peer, refreshed by advertisements and aged out by a
//! per-epoch liveness counter. A single `Vec<PeerState>` keyed by id holds
//! every metric for a peer in one record; insertion order is preserved so
//! selection tie-breaks stay deterministic.

use crate::{EngineError, NodeId};
use tracing::{debug, warn};

/// Epochs an entry survives without a refresh.
pub const LIVENESS_EPOCHS: u8 = 3;

/// Everything the table knows about one peer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PeerState {
    pub id: NodeId,
    /// Total compute slots.
    pub cores: u32,
    /// Slots currently busy.
    pub occupied_cores: u32,
    /// Backlog depth, advisory only.
    pub queued_jobs: u32,
    /// Abstract spare-capacity score (higher = more headroom).
    pub utility: u32,
    /// Estimated round-trip latency in milliseconds, never negative.
    pub rtt: i64,
    /// Remaining epochs before eviction; reset on every refresh.
    pub liveness: u8,
}

/// Keyed table of peer resource/latency records with liveness decay.
pub struct ResourceStateTable {
    local_id: NodeId,
    peers: Vec<PeerState>,
}

impl ResourceStateTable {
    pub fn new(local_id: NodeId) -> Self {
        Self {
            local_id,
            peers: Vec::new(),
        }
    }

    /// Ingest one advertised report. Known ids are overwritten in place,
    /// unknown ids appended; either way liveness resets to the full window.
    /// `utility`/`rtt` left unreported keep their previous value (zero for
    /// a brand-new entry). Negative rtt, an artifact of relayed latency
    /// arithmetic, is clamped to zero.
    pub fn upsert(
        &mut self,
        id: NodeId,
        cores: u32,
        occupied_cores: u32,
        queued_jobs: u32,
        utility: Option<u32>,
        rtt: Option<i64>,
    ) {
        if occupied_cores > cores {
            warn!(
                peer = id,
                occupied_cores, cores, "inconsistent advertisement, treating peer as saturated"
            );
        }
        let rtt = rtt.map(|ms| ms.max(0));

        if let Some(peer) = self.peers.iter_mut().find(|p| p.id == id) {
            peer.cores = cores;
            peer.occupied_cores = occupied_cores;
            peer.queued_jobs = queued_jobs;
            if let Some(utility) = utility {
                peer.utility = utility;
            }
            if let Some(rtt) = rtt {
                peer.rtt = rtt;
            }
            peer.liveness = LIVENESS_EPOCHS;
        } else {
            self.peers.push(PeerState {
                id,
                cores,
                occupied_cores,
                queued_jobs,
                utility: utility.unwrap_or(0),
                rtt: rtt.unwrap_or(0),
                liveness: LIVENESS_EPOCHS,
            });
            debug!(peer = id, "new peer learned from advertisement");
        }
    }

    /// Age every entry by one gossip epoch; entries that run out of
    /// liveness are evicted. Returns the evicted ids.
    pub fn tick(&mut self) -> Vec<NodeId> {
        let mut evicted = Vec::new();
        self.peers.retain_mut(|peer| {
            peer.liveness -= 1;
            if peer.liveness == 0 {
                evicted.push(peer.id);
                false
            } else {
                true
            }
        });
        for id in &evicted {
            debug!(peer = id, "peer aged out of resource table");
        }
        evicted
    }

    /// True iff `id` is this node itself.
    pub fn is_local(&self, id: NodeId) -> bool {
        id == self.local_id
    }

    /// True iff `id` currently has a live entry.
    pub fn is_known_peer(&self, id: NodeId) -> bool {
        self.peers.iter().any(|p| p.id == id)
    }

    /// Whether a known peer has no free cores. Inconsistent records
    /// (occupied past total) count as saturated rather than over-admitting.
    /// Unknown ids are an explicit error, never a default answer.
    pub fn is_saturated(&self, id: NodeId) -> Result<bool, EngineError> {
        self.peers
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.occupied_cores >= p.cores)
            .ok_or(EngineError::UnknownPeer(id))
    }

    /// The peer with the fewest occupied cores, first-found on ties.
    pub fn least_loaded(&self) -> Result<NodeId, EngineError> {
        self.peers
            .iter()
            .min_by_key(|p| p.occupied_cores)
            .map(|p| p.id)
            .ok_or(EngineError::EmptyTable)
    }

    pub fn get(&self, id: NodeId) -> Option<&PeerState> {
        self.peers.iter().find(|p| p.id == id)
    }

    /// Live entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &PeerState> {
        self.peers.iter()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn local_id(&self) -> NodeId {
        self.local_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_with(entries: &[(NodeId, u32, u32)]) -> ResourceStateTable {
        let mut table = ResourceStateTable::new(1);
        for &(id, cores, occupied) in entries {
            table.upsert(id, cores, occupied, 0, None, None);
        }
        table
    }

    #[test]
    fn test_upsert_creates_then_overwrites() {
        let mut table = ResourceStateTable::new(1);
        table.upsert(7, 8, 2, 1, Some(10), Some(40));
        assert_eq!(table.len(), 1);

        table.upsert(7, 8, 5, 2, Some(6), Some(25));
        assert_eq!(table.len(), 1);
        let peer = table.get(7).unwrap();
        assert_eq!(peer.occupied_cores, 5);
        assert_eq!(peer.utility, 6);
        assert_eq!(peer.rtt, 25);
    }

    #[test]
    fn test_upsert_is_idempotent_within_epoch() {
        let mut table = ResourceStateTable::new(1);
        table.upsert(7, 8, 2, 1, Some(10), Some(40));
        let before = table.get(7).unwrap().clone();

        table.tick();
        table.upsert(7, 8, 2, 1, Some(10), Some(40));
        let after = table.get(7).unwrap().clone();

        // Identical advertisement: same state, liveness back at full.
        assert_eq!(after.liveness, LIVENESS_EPOCHS);
        assert_eq!(
            (before.cores, before.occupied_cores, before.utility, before.rtt),
            (after.cores, after.occupied_cores, after.utility, after.rtt)
        );
    }

    #[test]
    fn test_unreported_fields_keep_previous_values() {
        let mut table = ResourceStateTable::new(1);
        table.upsert(7, 8, 2, 1, Some(10), Some(40));
        table.upsert(7, 8, 3, 0, None, None);
        let peer = table.get(7).unwrap();
        assert_eq!(peer.utility, 10);
        assert_eq!(peer.rtt, 40);
    }

    #[test]
    fn test_decay_evicts_after_three_epochs() {
        let mut table = table_with(&[(7, 4, 0)]);
        assert!(table.tick().is_empty());
        assert!(table.tick().is_empty());
        assert_eq!(table.tick(), vec![7]);
        assert!(!table.is_known_peer(7));
    }

    #[test]
    fn test_refresh_resets_decay_window() {
        let mut table = table_with(&[(7, 4, 0)]);
        table.tick();
        table.tick();
        // Refreshed on epoch 2 of 3: survives a fresh full window.
        table.upsert(7, 4, 0, 0, None, None);
        assert!(table.tick().is_empty());
        assert!(table.tick().is_empty());
        assert_eq!(table.tick(), vec![7]);
    }

    #[test]
    fn test_is_local_and_known() {
        let table = table_with(&[(7, 4, 0)]);
        assert!(table.is_local(1));
        assert!(!table.is_local(7));
        assert!(table.is_known_peer(7));
        assert!(!table.is_known_peer(99));
    }

    #[test]
    fn test_saturation_matches_core_counts() {
        let table = table_with(&[(7, 4, 4), (8, 4, 3)]);
        assert!(table.is_saturated(7).unwrap());
        assert!(!table.is_saturated(8).unwrap());
    }

    #[test]
    fn test_saturation_unknown_id_is_error() {
        let table = table_with(&[(7, 4, 4)]);
        assert_eq!(table.is_saturated(99), Err(EngineError::UnknownPeer(99)));
    }

    #[test]
    fn test_inconsistent_record_counts_as_saturated() {
        let mut table = ResourceStateTable::new(1);
        table.upsert(7, 4, 6, 0, None, None);
        assert!(table.is_saturated(7).unwrap());
    }

    #[test]
    fn test_least_loaded() {
        let table = table_with(&[(10, 4, 2), (11, 4, 0), (12, 4, 1)]);
        assert_eq!(table.least_loaded().unwrap(), 11);
    }

    #[test]
    fn test_least_loaded_empty_table() {
        let table = ResourceStateTable::new(1);
        assert_eq!(table.least_loaded(), Err(EngineError::EmptyTable));
    }

    #[test]
    fn test_negative_rtt_clamped() {
        let mut table = ResourceStateTable::new(1);
        table.upsert(7, 4, 0, 0, None, Some(-12));
        assert_eq!(table.get(7).unwrap().rtt, 0);
    }
}
