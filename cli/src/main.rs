// cfn-cli — demo host for the offload decision engine
//
// Plays the transport collaborator's role for a small in-process mesh:
// delivers gossip between engines, suppresses duplicate request names,
// drives the per-epoch aging tick, and follows one redirection hop.

use anyhow::{bail, Context, Result};
use cfn_core::wire::{GraphUpdate, StateAdvertisement, WireFrame};
use cfn_core::{DecisionEngine, Destination, EngineConfig, MessageKind, NodeId, Outcome};
use clap::{Parser, Subcommand};
use colored::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "cfn")]
#[command(about = "CFN — compute-offload decision engine demo", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated gossip mesh of decision engines
    Simulate {
        /// Number of nodes in the mesh
        #[arg(short, long, default_value = "4")]
        nodes: u32,
        /// Gossip epochs to run
        #[arg(short, long, default_value = "8")]
        epochs: u32,
        /// Task requests injected per epoch
        #[arg(short, long, default_value = "3")]
        tasks: u32,
        /// RNG seed
        #[arg(short, long, default_value = "7")]
        seed: u64,
    },
    /// Decode a hex-encoded wire frame and print it as JSON
    Decode { frame: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate {
            nodes,
            epochs,
            tasks,
            seed,
        } => cmd_simulate(nodes, epochs, tasks, seed).await,
        Commands::Decode { frame } => cmd_decode(&frame),
    }
}

/// Running totals across the whole mesh.
#[derive(Default)]
struct MeshStats {
    served: u64,
    offloaded: u64,
    cloud: u64,
    dropped: u64,
    duplicates: u64,
}

async fn cmd_simulate(nodes: u32, epochs: u32, tasks: u32, seed: u64) -> Result<()> {
    if nodes < 2 {
        bail!("a mesh needs at least 2 nodes");
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut engines: Vec<DecisionEngine> = (1..=nodes)
        .map(|id| {
            DecisionEngine::new(EngineConfig {
                node_id: id,
                cores: rng.gen_range(2..=8),
                utility: rng.gen_range(4..=20),
            })
        })
        .collect();

    println!("{}", format!("mesh of {nodes} nodes, {epochs} epochs").bold());

    // The host owns duplicate suppression; the engines treat every
    // delivered request as new.
    let mut seen: HashSet<String> = HashSet::new();
    let mut stats = MeshStats::default();
    let mut request_seq = 0u64;

    let mut epoch_timer = tokio::time::interval(Duration::from_millis(20));
    for epoch in 0..epochs {
        epoch_timer.tick().await;
        let now_ms = (epoch as i64) * 1000;

        gossip_round(&mut engines, now_ms, &mut rng)?;

        for _ in 0..tasks {
            request_seq += 1;
            let origin = rng.gen_range(0..engines.len());
            let name = if rng.gen_bool(0.7) {
                format!("/cfn/task/{}/{request_seq}", rng.gen_range(1..=30))
            } else {
                let dst = rng.gen_range(1..=nodes);
                format!("/cfn/exec/{dst}/{request_seq}")
            };
            inject_request(&mut engines, origin, &name, now_ms, &mut seen, &mut stats);
        }

        for engine in engines.iter_mut() {
            let evicted = engine.tick();
            if !evicted.is_empty() {
                debug!(node = engine.node_id(), ?evicted, "peers aged out");
            }
        }
    }

    println!("\n{}", "per-node state".bold());
    for engine in &engines {
        let summary = serde_json::to_string(&engine.summary())
            .context("serializing engine summary")?;
        println!("  {summary}");
    }

    println!("\n{}", "mesh totals".bold());
    println!("  {} {}", "served locally:".green(), stats.served);
    println!("  {} {}", "offloaded to peer:".cyan(), stats.offloaded);
    println!("  {} {}", "sent to cloud:".yellow(), stats.cloud);
    println!("  {} {}", "dropped:".red(), stats.dropped);
    println!("  duplicates suppressed: {}", stats.duplicates);

    Ok(())
}

/// Every node advertises to every other node, with per-link jitter so rtt
/// estimates differ.
fn gossip_round(
    engines: &mut [DecisionEngine],
    now_ms: i64,
    rng: &mut StdRng,
) -> Result<()> {
    let adverts: Vec<(String, Vec<u8>)> = engines
        .iter()
        .map(|e| e.advertisement(now_ms))
        .collect::<std::result::Result<_, _>>()
        .context("building advertisements")?;

    for (i, engine) in engines.iter_mut().enumerate() {
        for (j, (name, bytes)) in adverts.iter().enumerate() {
            if i == j {
                continue;
            }
            let delivered_at = now_ms + rng.gen_range(5..60);
            engine.handle_message(name, bytes, delivered_at);
        }
    }
    Ok(())
}

/// Deliver one request to its origin engine, following at most one
/// redirection hop, and account for the terminal outcome.
fn inject_request(
    engines: &mut [DecisionEngine],
    origin: usize,
    name: &str,
    now_ms: i64,
    seen: &mut HashSet<String>,
    stats: &mut MeshStats,
) {
    if !seen.insert(name.to_string()) {
        stats.duplicates += 1;
        return;
    }

    let outcome = engines[origin].handle_message(name, &[], now_ms);
    match outcome {
        Outcome::ServedLocally { .. } => stats.served += 1,
        Outcome::Dropped(_) => stats.dropped += 1,
        Outcome::Redirected(redirect) => match redirect.alternates.first() {
            Some(&Destination::Offload(peer)) | Some(&Destination::Exec(peer)) => {
                match deliver_to(engines, peer, name, now_ms) {
                    Some(Outcome::ServedLocally { .. }) => {
                        stats.offloaded += 1;
                        info!(request = name, peer, "offloaded and served");
                    }
                    // One redirection hop only: anything the peer cannot
                    // serve itself ends up upstream.
                    _ => stats.cloud += 1,
                }
            }
            _ => stats.cloud += 1,
        },
        Outcome::StateUpdated { .. } | Outcome::GraphMerged { .. } => {}
    }
}

fn deliver_to(
    engines: &mut [DecisionEngine],
    peer: NodeId,
    name: &str,
    now_ms: i64,
) -> Option<Outcome> {
    engines
        .iter_mut()
        .find(|e| e.node_id() == peer)
        .map(|e| e.handle_message(name, &[], now_ms))
}

fn cmd_decode(frame_hex: &str) -> Result<()> {
    let bytes = hex::decode(frame_hex.trim()).context("frame is not valid hex")?;
    let frame = WireFrame::from_bytes(&bytes).context("frame failed to parse")?;

    match frame.kind {
        MessageKind::StateAdvert => {
            let advert = StateAdvertisement::from_frame(&frame)?;
            println!("{}", serde_json::to_string_pretty(&advert)?);
        }
        MessageKind::GraphUpdate => {
            let update = GraphUpdate::from_frame(&frame)?;
            println!("{}", serde_json::to_string_pretty(&update)?);
        }
        MessageKind::ExecParams => {
            let duration = cfn_core::wire::decode_exec_params(&frame.payload)?;
            println!("{}", serde_json::to_string_pretty(&duration)?);
        }
    }
    Ok(())
}
