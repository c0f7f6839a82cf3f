//! Decision engine — per-node admission and redirection
//!
//! One engine instance per node, exclusively owning its resource table,
//! graph store, and local capacity counters. The host transport delivers
//! each inbound message synchronously (after its own duplicate
//! suppression), schedules `tick()` once per gossip epoch, and dispatches
//! whatever redirect the engine hands back.
//!
//! Decision path for every message:
//! 1. Classify the name once (advertisement → graph update → execution)
//! 2. Advertisements refresh the resource table
//! 3. Graph updates merge into the known-graph store
//! 4. Execution requests are served locally when capacity allows,
//!    otherwise redirected to the selected peer or the cloud fallback

use crate::classify::{classify, ExecRequest, MessageClass, STATE_SCOPE};
use crate::graph::Graph;
use crate::redirect::{self, Destination, Redirect};
use crate::select::{pick_by_capacity, pick_by_utility};
use crate::table::ResourceStateTable;
use crate::wire::{
    decode_exec_params, GraphUpdate, MessageKind, PeerReport, StateAdvertisement, WireError,
    WireFrame,
};
use crate::NodeId;
use tracing::{debug, info, warn};

/// Startup configuration for one node's engine.
#[derive(Debug, Clone, Copy, serde::Serialize, serde::Deserialize)]
pub struct EngineConfig {
    pub node_id: NodeId,
    /// Local compute slots.
    pub cores: u32,
    /// Local spare-capacity score advertised to the mesh.
    pub utility: u32,
}

impl EngineConfig {
    pub fn new(node_id: NodeId) -> Self {
        Self {
            node_id,
            cores: 4,
            utility: 14,
        }
    }
}

/// Why a message was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Decode failed; carries the codec error text.
    Malformed(String),
    /// The name matched no known namespace.
    Unrecognized,
}

/// Terminal outcome of handling one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An execution request was admitted and ran here.
    ServedLocally { request: String, duration: u64 },
    /// An execution request was re-issued toward an alternate destination.
    Redirected(Redirect),
    /// An advertisement refreshed the resource table.
    StateUpdated { refreshed: usize },
    /// A graph generation was merged into the known-graph store.
    GraphMerged { added: usize, total: usize },
    Dropped(DropReason),
}

/// Snapshot of one engine's state, for diagnostics.
#[derive(Debug, Clone, serde::Serialize)]
pub struct EngineSummary {
    pub node_id: NodeId,
    pub cores: u32,
    pub occupied_cores: u32,
    pub utility: u32,
    pub known_peers: usize,
    pub graph_tasks: usize,
    pub served: u64,
    pub redirected: u64,
    pub dropped: u64,
}

/// The per-node offload decision engine.
pub struct DecisionEngine {
    node_id: NodeId,
    cores: u32,
    occupied_cores: u32,
    queued_jobs: u32,
    utility: u32,
    table: ResourceStateTable,
    graph: Graph,
    served: u64,
    redirected: u64,
    dropped: u64,
}

impl DecisionEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            node_id: config.node_id,
            cores: config.cores,
            occupied_cores: 0,
            queued_jobs: 0,
            utility: config.utility,
            table: ResourceStateTable::new(config.node_id),
            graph: Graph::new(),
            served: 0,
            redirected: 0,
            dropped: 0,
        }
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn table(&self) -> &ResourceStateTable {
        &self.table
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Handle one inbound message. `now_ms` is the host's clock, used for
    /// rtt estimation against advertisement timestamps.
    pub fn handle_message(&mut self, name: &str, payload: &[u8], now_ms: i64) -> Outcome {
        match classify(name) {
            MessageClass::Advertisement {
                sender,
                timestamp_ms,
            } => self.on_advertisement(sender, timestamp_ms, payload, now_ms),
            MessageClass::GraphUpdate => self.on_graph_update(payload),
            MessageClass::Execution(request) => self.on_execution(name, request, payload),
            MessageClass::Unrecognized => {
                debug!(name, "unrecognized message name");
                self.dropped += 1;
                Outcome::Dropped(DropReason::Unrecognized)
            }
        }
    }

    /// Age the resource table by one gossip epoch.
    pub fn tick(&mut self) -> Vec<NodeId> {
        self.table.tick()
    }

    /// Build this node's outbound gossip advertisement: its own state plus
    /// one relayed report per live table entry.
    pub fn advertisement(&self, now_ms: i64) -> Result<(String, Vec<u8>), WireError> {
        let mut reports = Vec::with_capacity(1 + self.table.len());
        reports.push(PeerReport {
            node_id: None,
            cores: self.cores,
            occupied_cores: self.occupied_cores,
            queued_jobs: self.queued_jobs,
            utility: Some(self.utility),
            rtt: None,
        });
        for peer in self.table.iter() {
            reports.push(PeerReport {
                node_id: Some(peer.id),
                cores: peer.cores,
                occupied_cores: peer.occupied_cores,
                queued_jobs: peer.queued_jobs,
                utility: Some(peer.utility),
                rtt: Some(peer.rtt),
            });
        }

        let name = format!("{STATE_SCOPE}/{}/{}", self.node_id, now_ms);
        let bytes = StateAdvertisement { reports }.to_frame()?.to_bytes()?;
        Ok((name, bytes))
    }

    pub fn summary(&self) -> EngineSummary {
        EngineSummary {
            node_id: self.node_id,
            cores: self.cores,
            occupied_cores: self.occupied_cores,
            utility: self.utility,
            known_peers: self.table.len(),
            graph_tasks: self.graph.len(),
            served: self.served,
            redirected: self.redirected,
            dropped: self.dropped,
        }
    }

    // ------------------------------------------------------------------
    // Branch handlers
    // ------------------------------------------------------------------

    fn on_advertisement(
        &mut self,
        sender: NodeId,
        timestamp_ms: i64,
        payload: &[u8],
        now_ms: i64,
    ) -> Outcome {
        let advert = match WireFrame::from_bytes(payload)
            .and_then(|frame| StateAdvertisement::from_frame(&frame))
        {
            Ok(advert) => advert,
            Err(err) => return self.drop_malformed("advertisement", err),
        };

        // The sender's own latency, estimated from its send timestamp.
        // Relayed reports ride on top of it; clock skew can drive either
        // term negative, which upsert clamps away. Timestamps and rtts are
        // attacker-controlled, so the arithmetic saturates instead of
        // wrapping.
        let sender_rtt = now_ms.saturating_sub(timestamp_ms);

        let mut refreshed = 0;
        for report in advert.reports {
            let id = report.node_id.unwrap_or(sender);
            if id == self.node_id {
                continue;
            }
            let rtt = Some(sender_rtt.saturating_add(report.rtt.unwrap_or(0)));
            self.table.upsert(
                id,
                report.cores,
                report.occupied_cores,
                report.queued_jobs,
                report.utility,
                rtt,
            );
            refreshed += 1;
        }
        debug!(sender, refreshed, "advertisement ingested");
        Outcome::StateUpdated { refreshed }
    }

    fn on_graph_update(&mut self, payload: &[u8]) -> Outcome {
        let update = match WireFrame::from_bytes(payload)
            .and_then(|frame| GraphUpdate::from_frame(&frame))
        {
            Ok(update) => update,
            Err(err) => return self.drop_malformed("graph update", err),
        };

        let added = self.graph.merge(update);
        info!(added, total = self.graph.len(), "graph generation merged");
        Outcome::GraphMerged {
            added,
            total: self.graph.len(),
        }
    }

    fn on_execution(&mut self, name: &str, request: ExecRequest, payload: &[u8]) -> Outcome {
        match request {
            ExecRequest::Task { cost } => self.on_task(name, cost),
            ExecRequest::Exec { dst } => {
                let duration = if payload.is_empty() {
                    None
                } else {
                    match self.exec_duration(payload) {
                        Ok(duration) => duration,
                        Err(err) => return self.drop_malformed("exec parameters", err),
                    }
                };
                self.on_exec(name, dst, duration.unwrap_or(1))
            }
        }
    }

    /// Utility-mode request: serve when our own score covers the cost,
    /// else offload to the best-scored peer, else punt to the cloud.
    fn on_task(&mut self, name: &str, cost: u32) -> Outcome {
        if self.utility >= cost {
            // Charge for the task, run it, release. The engine is
            // synchronous, so the two balance within this call; the
            // outcome carries the cost for the host's accounting.
            self.utility -= cost;
            info!(request = name, cost, "serving task locally");
            self.utility += cost;
            self.served += 1;
            return Outcome::ServedLocally {
                request: name.to_string(),
                duration: cost as u64,
            };
        }

        let target = match pick_by_utility(&self.table, cost) {
            Ok(pick) => {
                info!(
                    request = name,
                    peer = pick.node_id,
                    rtt = pick.rtt,
                    "offloading task to peer"
                );
                Destination::Offload(pick.node_id)
            }
            Err(err) => {
                info!(request = name, %err, "no qualifying peer, redirecting upstream");
                Destination::Cloud
            }
        };
        self.redirected += 1;
        Outcome::Redirected(redirect::build(name, target))
    }

    /// Capacity-mode request addressed at a specific node.
    fn on_exec(&mut self, name: &str, dst: NodeId, duration: u64) -> Outcome {
        if self.table.is_local(dst) {
            if self.occupied_cores < self.cores {
                self.occupied_cores += 1;
                info!(request = name, duration, "executing on local worker");
                self.occupied_cores -= 1;
                self.served += 1;
                return Outcome::ServedLocally {
                    request: name.to_string(),
                    duration,
                };
            }
            // Saturated ourselves: hand the request to whoever has room.
            let target = match self.table.least_loaded() {
                Ok(peer) => Destination::Exec(peer),
                Err(_) => Destination::Cloud,
            };
            self.redirected += 1;
            return Outcome::Redirected(redirect::build(name, target));
        }

        if self.table.is_known_peer(dst) {
            let target = match pick_by_capacity(&self.table, dst) {
                Ok(peer) => Destination::Exec(peer),
                Err(err) => {
                    warn!(request = name, dst, %err, "capacity selection failed");
                    Destination::Cloud
                }
            };
            if target == Destination::Exec(dst) {
                debug!(request = name, dst, "destination has free cores, passing through");
            }
            self.redirected += 1;
            return Outcome::Redirected(redirect::build(name, target));
        }

        info!(request = name, dst, "destination unknown, redirecting upstream");
        self.redirected += 1;
        Outcome::Redirected(redirect::build(name, Destination::Cloud))
    }

    fn exec_duration(&self, payload: &[u8]) -> Result<Option<u64>, WireError> {
        let frame = WireFrame::from_bytes(payload)?;
        if frame.kind != MessageKind::ExecParams {
            return Err(WireError::InvalidKind(frame.kind.as_u8()));
        }
        decode_exec_params(&frame.payload)
    }

    fn drop_malformed(&mut self, context: &str, err: WireError) -> Outcome {
        warn!(context, %err, "dropping malformed message");
        self.dropped += 1;
        Outcome::Dropped(DropReason::Malformed(err.to_string()))
    }
}
