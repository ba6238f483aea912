use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use containers::{BlockHeader, Bytes32, Status, Uint64};
use libp2p_identity::PeerId;
use metrics::Metrics;
use networking::req_resp::ServingPeer;
use networking::sync::{HeaderCache, LightSyncService, LocalChain, PeerManager, SyncConfig};
use networking::types::ConnectionState;
use parking_lot::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Sync a local header chain from an in-process peer.
#[derive(Parser, Debug)]
struct Args {
    /// YAML file with sync settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 10)]
    local_height: u64,

    #[arg(long, default_value_t = 1000)]
    peer_height: u64,

    /// Let the local chain leave the peer's chain above this number
    #[arg(long)]
    fork_at: Option<u64>,

    #[arg(long)]
    json_logs: bool,

    /// Print Prometheus metrics when done
    #[arg(long)]
    print_metrics: bool,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn extend(chain: &mut HeaderCache, best: u64, salt: u8) {
    let mut tip = chain.best_header();
    while tip.number() < best {
        tip = tip.child(Bytes32::from([salt; 32]), (tip.number() + 1) * 12);
        chain.add_header(tip.clone());
    }
}

fn build_chains(args: &Args) -> (HeaderCache, HeaderCache) {
    let genesis = BlockHeader::genesis(Bytes32::zero(), 0);

    let mut peer = HeaderCache::new(genesis.clone());
    extend(&mut peer, args.peer_height, 0);

    let mut local = HeaderCache::new(genesis);
    let shared = args.fork_at.unwrap_or(args.local_height).min(args.local_height);
    for number in 1..=shared.min(args.peer_height) {
        if let Some(header) = peer.header_by_number(number) {
            local.add_header(header);
        }
    }
    extend(&mut local, args.local_height, 1);

    (local, peer)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = match &args.config {
        Some(path) => SyncConfig::load_from_file(path)?,
        None => SyncConfig::default(),
    };
    let metrics = Arc::new(Metrics::new().context("failed to register metrics")?);

    let (local, peer) = build_chains(&args);
    let best = peer.best_header();
    let status = Status::new(best.hash(), best.number(), Uint64(best.number()));
    info!(
        local_best = local.best_header().number(),
        peer_best = best.number(),
        fork_at = ?args.fork_at,
        "Chains ready"
    );

    let network = ServingPeer::new(Arc::new(RwLock::new(peer)), config.max_response_headers);
    let mut service = LightSyncService::new(
        network,
        Arc::new(RwLock::new(local)),
        PeerManager::new(),
        config,
    )
    .with_metrics(metrics.clone());

    let peer_id = PeerId::random();
    service.add_peer(peer_id, ConnectionState::Connected);
    service.update_peer_status(&peer_id, status);

    let report = service.run(peer_id).await.context("header sync failed")?;
    info!(
        best = report.best_number,
        target = report.target,
        rounds = report.rounds,
        imported = report.imported,
        reached_target = report.reached_target(),
        "Done"
    );

    if args.print_metrics {
        println!("{}", metrics.gather()?);
    }

    Ok(())
}
