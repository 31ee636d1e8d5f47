//! # Peer Runtime
//!
//! Wires [`GossipEngine`], [`LivenessDetector`], and the overlay builder
//! into a running peer process: registration with a seed, periodic
//! `GET_PEER_LIST` refresh (which doubles as this peer's channel for
//! learning about REMOVAL_NOTIFY-driven evictions, since this
//! implementation does not keep a persistent seed-to-peer push channel
//! open), gossip generation, and neighbor liveness probing.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant as StdInstant};

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use parking_lot::RwLock;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, timeout};
use tracing::{info, warn};

use meshring_protocol::config::{GOSSIP_INTERVAL, PING_INTERVAL, PING_TIMEOUT};
use meshring_protocol::events::{EventLog, Role};
use meshring_protocol::gossip::{GossipAction, GossipEngine};
use meshring_protocol::identity::NodeId;
use meshring_protocol::liveness::{LivenessDetector, SuspicionOutcome};
use meshring_protocol::overlay::select_neighbors;
use meshring_protocol::seeds::SeedDirectory;
use meshring_protocol::wire::{FrameDecoder, Message, Verdict};

use crate::api::{AppState, NodeRole};
use crate::cli::{resolve_data_dir, PeerArgs};
use crate::metrics::{NodeMetrics, SharedMetrics};
use crate::transport;

/// Cadence at which a peer re-fetches the peer list from a seed. Not pinned
/// by the wire protocol (spec only requires "at least on startup and on
/// explicit REMOVAL_NOTIFY"); since this implementation has no persistent
/// server-push channel from seeds, this polling interval is what actually
/// carries eviction notice to peers, so it is kept well under
/// `SYNC_INTERVAL` to bound staleness.
const PEER_LIST_REFRESH_INTERVAL: Duration = Duration::from_secs(8);

/// How long to wait for `SUSPECT_RESPONSE`s from other neighbors before
/// tallying with whatever has arrived so far.
const SUSPECT_COLLECTION_WINDOW: Duration = Duration::from_secs(2);

struct PeerState {
    self_id: NodeId,
    seeds: SeedDirectory,
    peer_list: RwLock<Vec<NodeId>>,
    neighbors: RwLock<Vec<NodeId>>,
    gossip: GossipEngine,
    liveness: LivenessDetector,
    event_log: Arc<EventLog>,
    metrics: SharedMetrics,
}

pub async fn run(args: PeerArgs) -> Result<()> {
    let common = args.common.clone();
    let data_dir =
        resolve_data_dir(&common.data_dir).context("failed to resolve data directory")?;

    let self_id = NodeId::new(common.host.clone(), common.port);
    let directory_text = std::fs::read_to_string(&common.config)
        .with_context(|| format!("failed to read seed config {}", common.config.display()))?;
    let seeds = SeedDirectory::parse(&directory_text).context("malformed seed directory")?;

    let event_log = Arc::new(
        EventLog::open(data_dir.join("events.log"), Role::Peer, common.port)
            .context("failed to open event log")?,
    );
    event_log.info(&format!("starting peer {self_id}, seeds {seeds}"));

    register_with_seeds(&seeds, &self_id).await?;
    event_log.info("registration ACKed");

    let metrics: SharedMetrics = Arc::new(NodeMetrics::new());
    let state = Arc::new(PeerState {
        self_id: self_id.clone(),
        seeds,
        peer_list: RwLock::new(Vec::new()),
        neighbors: RwLock::new(Vec::new()),
        gossip: GossipEngine::new(self_id.clone()),
        liveness: LivenessDetector::new(self_id.clone()),
        event_log: event_log.clone(),
        metrics: metrics.clone(),
    });

    // Prime the peer list and neighbor set before serving anything.
    refresh_peer_list(&state).await;

    let peer_listener = TcpListener::bind((common.host.as_str(), common.port))
        .await
        .with_context(|| {
            format!("failed to bind peer listener on {}:{}", common.host, common.port)
        })?;

    let membership_count = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let neighbor_count = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let app_state = AppState {
        role: NodeRole::Peer,
        self_id: self_id.clone(),
        membership_count: membership_count.clone(),
        neighbor_count: neighbor_count.clone(),
        started_at: StdInstant::now(),
        metrics: metrics.clone(),
    };
    let status_router = crate::api::create_router(app_state);
    let status_addr: SocketAddr = format!("{}:{}", common.host, common.status_port)
        .parse()
        .context("invalid status address")?;
    let metrics_addr: SocketAddr = format!("{}:{}", common.host, common.metrics_port)
        .parse()
        .context("invalid metrics address")?;
    let metrics_router = axum::Router::new()
        .route("/metrics", axum::routing::get(crate::metrics::metrics_handler))
        .with_state(metrics.clone());

    let listen_task = tokio::spawn(accept_connections(peer_listener, state.clone()));
    let refresh_task = tokio::spawn(refresh_loop(state.clone(), membership_count, neighbor_count));
    let gossip_task = tokio::spawn(gossip_loop(state.clone()));
    let liveness_task = tokio::spawn(liveness_loop(state.clone()));
    let status_task = tokio::spawn(async move {
        let listener = TcpListener::bind(status_addr).await?;
        axum::serve(listener, status_router).await
    });
    let metrics_task = tokio::spawn(async move {
        let listener = TcpListener::bind(metrics_addr).await?;
        axum::serve(listener, metrics_router).await
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, stopping peer");

    listen_task.abort();
    refresh_task.abort();
    gossip_task.abort();
    liveness_task.abort();
    status_task.abort();
    metrics_task.abort();

    event_log.info("peer shut down cleanly");
    Ok(())
}

async fn register_with_seeds(seeds: &SeedDirectory, self_id: &NodeId) -> Result<()> {
    let mut last_reason = None;
    for seed in seeds.seeds() {
        let request = Message::RegisterRequest {
            peer: self_id.clone(),
        };
        match transport::send_and_recv(seed.canonical(), &request).await {
            Ok(Some(Message::RegisterAck { .. })) => {
                info!(%seed, "registered");
                return Ok(());
            }
            Ok(Some(Message::RegisterNack { reason })) => {
                warn!(%seed, ?reason, "registration NACKed, trying next seed");
                last_reason = reason;
            }
            Ok(Some(other)) => {
                warn!(%seed, msg_type = other.type_tag(), "unexpected reply to REGISTER_REQUEST");
            }
            Ok(None) => warn!(%seed, "seed closed connection without replying"),
            Err(err) => warn!(%seed, %err, "failed to reach seed for registration"),
        }
    }
    Err(anyhow!(
        "registration failed against every seed in the directory: {:?}",
        last_reason
    ))
}

async fn refresh_peer_list(state: &Arc<PeerState>) {
    for seed in state.seeds.seeds() {
        match transport::send_and_recv(seed.canonical(), &Message::GetPeerList).await {
            Ok(Some(Message::PeerList { members })) => {
                let candidates: Vec<NodeId> = members
                    .into_iter()
                    .filter(|m| m != &state.self_id)
                    .collect();
                let seed_value = GossipEngine::stable_seed(&state.self_id.canonical());
                let neighbors = select_neighbors(&candidates, seed_value);

                *state.peer_list.write() = candidates;
                *state.neighbors.write() = neighbors;
                return;
            }
            Ok(Some(other)) => {
                warn!(%seed, msg_type = other.type_tag(), "unexpected reply to GET_PEER_LIST")
            }
            Ok(None) => warn!(%seed, "seed closed connection without a peer list"),
            Err(err) => warn!(%seed, %err, "failed to fetch peer list"),
        }
    }
}

async fn refresh_loop(
    state: Arc<PeerState>,
    membership_count: Arc<std::sync::atomic::AtomicU64>,
    neighbor_count: Arc<std::sync::atomic::AtomicU64>,
) {
    let mut ticker = interval(PEER_LIST_REFRESH_INTERVAL);
    loop {
        ticker.tick().await;
        refresh_peer_list(&state).await;
        let members = state.peer_list.read().len() as u64;
        let neighbors = state.neighbors.read().len() as u64;
        membership_count.store(members, Ordering::Relaxed);
        neighbor_count.store(neighbors, Ordering::Relaxed);
        state.metrics.neighbor_count.set(neighbors as i64);
    }
}

async fn gossip_loop(state: Arc<PeerState>) {
    let mut ticker = interval(GOSSIP_INTERVAL);
    loop {
        ticker.tick().await;
        let timestamp = Utc::now().to_rfc3339();
        let Some(msg) = state.gossip.generate(&timestamp, None) else {
            continue;
        };
        state.metrics.gossip_generated_total.inc();
        let neighbors = state.neighbors.read().clone();
        for neighbor in neighbors {
            if let Err(err) = transport::send_only(neighbor.canonical(), &msg).await {
                warn!(%neighbor, %err, "failed to forward originated gossip");
            }
        }
    }
}

async fn liveness_loop(state: Arc<PeerState>) {
    let mut ticker = interval(PING_INTERVAL);
    loop {
        ticker.tick().await;
        let neighbors = state.neighbors.read().clone();
        // Probe every neighbor concurrently — sequential awaits would let
        // PING_TIMEOUT on one dead neighbor delay detection for everything
        // after it in the list, well past PING_INTERVAL.
        for neighbor in neighbors {
            let state = state.clone();
            tokio::spawn(async move {
                probe_neighbor(&state, &neighbor).await;
            });
        }
    }
}

async fn probe_neighbor(state: &Arc<PeerState>, neighbor: &NodeId) {
    let result = timeout(
        PING_TIMEOUT,
        transport::send_and_recv(neighbor.canonical(), &Message::Ping),
    )
    .await;

    match result {
        Ok(Ok(Some(Message::Pong))) => {
            state.liveness.record_alive(neighbor);
        }
        _ => {
            let opened_suspicion = state.liveness.record_miss(neighbor, StdInstant::now());
            if opened_suspicion {
                state.metrics.suspicions_raised_total.inc();
            }
            // Re-run escalation on every missed probe while the neighbor is
            // still an open suspect, not just on the round that opened it —
            // an Inconclusive tally (too few SUSPECT_RESPONSEs arrived in
            // time) otherwise leaves the record stuck open forever, since
            // `record_miss` is a no-op once a suspect entry already exists.
            if state.liveness.is_suspect(neighbor) {
                escalate_suspicion(state, neighbor).await;
            }
        }
    }
}

async fn escalate_suspicion(state: &Arc<PeerState>, subject: &NodeId) {
    let others: Vec<NodeId> = state
        .neighbors
        .read()
        .iter()
        .filter(|n| *n != subject)
        .cloned()
        .collect();

    let (tx, mut rx) = tokio::sync::mpsc::channel(others.len().max(1));
    for other in &others {
        let tx = tx.clone();
        let other = other.clone();
        let subject = subject.clone();
        tokio::spawn(async move {
            let query = Message::SuspectQuery {
                subject: subject.clone(),
            };
            if let Ok(Some(Message::SuspectResponse { verdict, .. })) =
                transport::send_and_recv(other.canonical(), &query).await
            {
                let _ = tx.send((other, verdict)).await;
            }
        });
    }
    drop(tx);

    let collect = async {
        while let Some((responder, verdict)) = rx.recv().await {
            state.liveness.record_response(subject, responder, verdict);
        }
    };
    let _ = timeout(SUSPECT_COLLECTION_WINDOW, collect).await;

    match state.liveness.tally(subject, others.len()) {
        SuspicionOutcome::Confirmed => {
            state.metrics.suspicions_confirmed_total.inc();
            let timestamp = Utc::now().to_rfc3339();
            let body = state.liveness.confirm_and_report(subject, &timestamp);
            state
                .event_log
                .warning(&format!("CONFIRMED REMOVAL — dead neighbor {subject}"));
            report_dead_node(state, subject, &timestamp, body).await;
        }
        SuspicionOutcome::Refuted => {
            state.liveness.refute(subject);
        }
        SuspicionOutcome::Inconclusive => {
            // Leave the suspect record open; the next probe round either
            // gathers more responses or misses again and re-escalates.
        }
    }
}

async fn report_dead_node(state: &Arc<PeerState>, subject: &NodeId, timestamp: &str, body: String) {
    let report = Message::DeadNodeReport {
        subject: subject.clone(),
        reporter: state.self_id.clone(),
        timestamp: timestamp.to_string(),
        body,
    };
    for seed in state.seeds.seeds() {
        if transport::send_only(seed.canonical(), &report).await.is_ok() {
            return;
        }
    }
    warn!(%subject, "failed to deliver DEAD_NODE_REPORT to any seed");
}

async fn accept_connections(listener: TcpListener, state: Arc<PeerState>) {
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(ok) => ok,
            Err(err) => {
                warn!(%err, "peer listener accept failed");
                continue;
            }
        };
        let state = state.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_connection(stream, state).await {
                warn!(%err, "peer connection handling failed");
            }
        });
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<PeerState>) -> anyhow::Result<()> {
    let mut decoder = FrameDecoder::default();
    let msg = match transport::recv_one(&mut stream, &mut decoder).await? {
        Some(m) => m,
        None => return Ok(()),
    };

    match msg {
        Message::Ping => {
            transport::send(&mut stream, &Message::Pong).await?;
        }
        Message::Gossip { msg_id, body, hash, sender } => {
            state.metrics.gossip_received_total.inc();
            let neighbors = state.neighbors.read().clone();
            let action = state.gossip.handle_gossip(
                &msg_id,
                body.as_deref(),
                &hash,
                &sender,
                &neighbors,
            );
            match action {
                GossipAction::Forward { to } => {
                    state.event_log.info(&format!("Gossip received {msg_id}"));
                    state.metrics.gossip_forwarded_total.inc();
                    let forward = Message::Gossip {
                        msg_id,
                        body,
                        hash,
                        sender: state.self_id.clone(),
                    };
                    for target in to {
                        if let Err(err) = transport::send_only(target.canonical(), &forward).await {
                            warn!(%target, %err, "failed to forward gossip");
                        }
                    }
                }
                GossipAction::Drop => {
                    state.metrics.gossip_dropped_total.inc();
                }
            }
        }
        Message::SuspectQuery { subject } => {
            let verdict = if subject == state.self_id {
                Verdict::Alive
            } else if state.liveness.is_suspect(&subject) {
                Verdict::Dead
            } else if state.peer_list.read().contains(&subject) {
                Verdict::Alive
            } else {
                Verdict::Unknown
            };
            transport::send(&mut stream, &Message::SuspectResponse { subject, verdict }).await?;
        }
        Message::RemovalNotify { peer } => {
            state.peer_list.write().retain(|p| p != &peer);
            state.neighbors.write().retain(|p| p != &peer);
        }
        other => {
            warn!(msg_type = other.type_tag(), "unexpected message on peer listener");
        }
    }

    Ok(())
}
