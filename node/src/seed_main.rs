//! # Seed Runtime
//!
//! Wires [`SeedDirectory`], [`MembershipStore`]/[`Coordinator`], and the
//! anti-entropy sync loop into a running seed process: a peer-facing
//! listener (REGISTER_REQUEST/DEAD_NODE_REPORT/GET_PEER_LIST) and a
//! seed-facing listener (PROPOSE_*/REMOVAL_NOTIFY/SYNC_MEMBERSHIP).

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant as StdInstant;

use anyhow::{Context, Result};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{interval, timeout};
use tracing::{info, warn};
use uuid::Uuid;

use meshring_protocol::config::{PROPOSAL_DEADLINE, SYNC_INTERVAL};
use meshring_protocol::consensus::{Coordinator, Decision, OriginationOutcome};
use meshring_protocol::events::{EventLog, Role};
use meshring_protocol::identity::NodeId;
use meshring_protocol::membership::MembershipStore;
use meshring_protocol::seeds::SeedDirectory;
use meshring_protocol::wire::{FrameDecoder, Message, ProposalKind};

use crate::api::{AppState, NodeRole};
use crate::cli::{resolve_data_dir, SeedArgs};
use crate::metrics::{NodeMetrics, SharedMetrics};
use crate::transport;

pub async fn run(args: SeedArgs) -> Result<()> {
    let common = args.common.clone();
    let data_dir =
        resolve_data_dir(&common.data_dir).context("failed to resolve data directory")?;

    let self_id = NodeId::new(common.host.clone(), common.port);
    let directory_text = std::fs::read_to_string(&common.config)
        .with_context(|| format!("failed to read seed config {}", common.config.display()))?;
    let directory = SeedDirectory::parse(&directory_text).context("malformed seed directory")?;

    let event_log = Arc::new(
        EventLog::open(data_dir.join("events.log"), Role::Seed, common.port)
            .context("failed to open event log")?,
    );
    event_log.info(&format!("starting seed {self_id}, directory {directory}"));

    let coordinator = Arc::new(Coordinator::new(
        self_id.clone(),
        directory,
        MembershipStore::new(),
    ));
    let metrics: SharedMetrics = Arc::new(NodeMetrics::new());

    let peer_listener = TcpListener::bind((common.host.as_str(), common.port))
        .await
        .with_context(|| {
            format!("failed to bind peer listener on {}:{}", common.host, common.port)
        })?;
    let seed_listener = TcpListener::bind((common.host.as_str(), args.seed_port))
        .await
        .with_context(|| {
            format!(
                "failed to bind seed-facing listener on {}:{}",
                common.host, args.seed_port
            )
        })?;

    info!(%self_id, seed_port = args.seed_port, "seed listeners bound");

    let membership_count = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let app_state = AppState {
        role: NodeRole::Seed,
        self_id: self_id.clone(),
        membership_count: membership_count.clone(),
        neighbor_count: Arc::new(std::sync::atomic::AtomicU64::new(0)),
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

    let peer_task = tokio::spawn(accept_peer_connections(
        peer_listener,
        coordinator.clone(),
        event_log.clone(),
        metrics.clone(),
    ));
    let seed_task = tokio::spawn(accept_seed_connections(seed_listener, coordinator.clone()));
    let sync_task = tokio::spawn(sync_loop(coordinator.clone()));
    let gauge_task = tokio::spawn(membership_gauge_loop(
        coordinator.clone(),
        metrics.clone(),
        membership_count,
    ));
    let reap_task = tokio::spawn(reap_loop(coordinator.clone()));
    let status_task = tokio::spawn(async move {
        let listener = TcpListener::bind(status_addr).await?;
        axum::serve(listener, status_router).await
    });
    let metrics_task = tokio::spawn(async move {
        let listener = TcpListener::bind(metrics_addr).await?;
        axum::serve(listener, metrics_router).await
    });

    tokio::signal::ctrl_c().await.ok();
    info!("shutdown signal received, stopping seed");

    peer_task.abort();
    seed_task.abort();
    sync_task.abort();
    gauge_task.abort();
    reap_task.abort();
    status_task.abort();
    metrics_task.abort();

    event_log.info("seed shut down cleanly");
    Ok(())
}

async fn membership_gauge_loop(
    coordinator: Arc<Coordinator>,
    metrics: SharedMetrics,
    membership_count: Arc<std::sync::atomic::AtomicU64>,
) {
    let mut ticker = interval(std::time::Duration::from_secs(2));
    loop {
        ticker.tick().await;
        let len = coordinator.membership().len() as u64;
        membership_count.store(len, Ordering::Relaxed);
        metrics.membership_size.set(len as i64);
    }
}

/// Periodically drops terminal (approved/rejected) proposals from the
/// coordinator's table so it doesn't grow without bound over the seed's
/// uptime. Proposals are ephemeral per spec; only PENDING ones are kept.
async fn reap_loop(coordinator: Arc<Coordinator>) {
    let mut ticker = interval(std::time::Duration::from_secs(30));
    loop {
        ticker.tick().await;
        coordinator.reap_terminal();
    }
}

async fn accept_peer_connections(
    listener: TcpListener,
    coordinator: Arc<Coordinator>,
    event_log: Arc<EventLog>,
    metrics: SharedMetrics,
) {
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(ok) => ok,
            Err(err) => {
                warn!(%err, "peer listener accept failed");
                continue;
            }
        };
        let coordinator = coordinator.clone();
        let event_log = event_log.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_peer_connection(stream, coordinator, event_log, metrics).await
            {
                warn!(%err, "peer connection handling failed");
            }
        });
    }
}

async fn handle_peer_connection(
    mut stream: TcpStream,
    coordinator: Arc<Coordinator>,
    event_log: Arc<EventLog>,
    metrics: SharedMetrics,
) -> anyhow::Result<()> {
    let mut decoder = FrameDecoder::default();
    let msg = match transport::recv_one(&mut stream, &mut decoder).await? {
        Some(m) => m,
        None => return Ok(()),
    };

    match msg {
        Message::RegisterRequest { peer } => {
            let reply = match coordinator.originate_register(peer.clone(), PROPOSAL_DEADLINE) {
                OriginationOutcome::Idempotent => Message::RegisterAck { reason: None },
                OriginationOutcome::Resolved { decision, .. } => {
                    register_reply_for(decision, &peer, &event_log, &metrics)
                }
                OriginationOutcome::Started { proposal_id } => {
                    let decision = broadcast_and_collect(
                        coordinator.clone(),
                        proposal_id,
                        ProposalKind::Register,
                        peer.clone(),
                    )
                    .await;
                    register_reply_for(decision, &peer, &event_log, &metrics)
                }
            };
            transport::send(&mut stream, &reply).await?;
        }
        Message::DeadNodeReport {
            subject,
            reporter,
            timestamp,
            ..
        } => match coordinator.originate_remove(subject.clone(), PROPOSAL_DEADLINE) {
            OriginationOutcome::Idempotent => {
                event_log.info(&format!("ignored DEAD_NODE_REPORT for non-member {subject}"));
            }
            OriginationOutcome::Resolved { decision, .. } => {
                finish_remove(decision, &subject, &reporter, &timestamp, &coordinator, &event_log, &metrics).await;
            }
            OriginationOutcome::Started { proposal_id } => {
                let decision = broadcast_and_collect(
                    coordinator.clone(),
                    proposal_id,
                    ProposalKind::Remove,
                    subject.clone(),
                )
                .await;
                finish_remove(decision, &subject, &reporter, &timestamp, &coordinator, &event_log, &metrics).await;
            }
        },
        Message::GetPeerList => {
            let members: Vec<NodeId> = coordinator.membership().snapshot().into_iter().collect();
            transport::send(&mut stream, &Message::PeerList { members }).await?;
        }
        other => {
            warn!(msg_type = other.type_tag(), "unexpected message on peer-facing listener");
        }
    }

    Ok(())
}

fn register_reply_for(
    decision: Decision,
    peer: &NodeId,
    event_log: &EventLog,
    metrics: &SharedMetrics,
) -> Message {
    match decision {
        Decision::Approved => {
            metrics.proposals_approved_total.inc();
            event_log.info(&format!("CONSENSUS OUTCOME — APPROVED register {peer}"));
            Message::RegisterAck { reason: None }
        }
        Decision::Rejected => {
            metrics.proposals_rejected_total.inc();
            event_log.warning(&format!("CONSENSUS OUTCOME — REJECTED register {peer}"));
            Message::RegisterNack {
                reason: Some("quorum not reached".into()),
            }
        }
    }
}

async fn finish_remove(
    decision: Decision,
    subject: &NodeId,
    reporter: &NodeId,
    timestamp: &str,
    coordinator: &Coordinator,
    event_log: &EventLog,
    metrics: &SharedMetrics,
) {
    if decision == Decision::Approved {
        metrics.proposals_approved_total.inc();
        event_log.info(&format!(
            "CONFIRMED REMOVAL — {subject} (reported by {reporter} at {timestamp})"
        ));
        notify_removal(coordinator.directory().others(coordinator.self_id()), subject).await;
        let peers: Vec<NodeId> = coordinator
            .membership()
            .snapshot()
            .into_iter()
            .filter(|m| m != subject && !coordinator.directory().contains(m))
            .collect();
        notify_removal(peers, subject).await;
    } else {
        metrics.proposals_rejected_total.inc();
        event_log.warning(&format!("CONSENSUS OUTCOME — REJECTED remove {subject}"));
    }
}

/// Broadcasts REMOVAL_NOTIFY to `targets`, used both seed-to-seed (the
/// commit coordinator informing its peer seeds) and seed-to-peer (informing
/// every currently registered member directly rather than waiting for their
/// next GET_PEER_LIST poll).
async fn notify_removal(targets: Vec<NodeId>, subject: &NodeId) {
    for target in targets {
        let msg = Message::RemovalNotify {
            peer: subject.clone(),
        };
        if let Err(err) = transport::send_only(target.canonical(), &msg).await {
            warn!(%target, %err, "failed to notify of removal");
        }
    }
}

async fn accept_seed_connections(listener: TcpListener, coordinator: Arc<Coordinator>) {
    loop {
        let (stream, _) = match listener.accept().await {
            Ok(ok) => ok,
            Err(err) => {
                warn!(%err, "seed listener accept failed");
                continue;
            }
        };
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_seed_connection(stream, coordinator).await {
                warn!(%err, "seed connection handling failed");
            }
        });
    }
}

async fn handle_seed_connection(
    mut stream: TcpStream,
    coordinator: Arc<Coordinator>,
) -> anyhow::Result<()> {
    let mut decoder = FrameDecoder::default();
    let msg = match transport::recv_one(&mut stream, &mut decoder).await? {
        Some(m) => m,
        None => return Ok(()),
    };

    match msg {
        Message::ProposeRegister { proposal_id, peer, .. } => {
            let vote = coordinator.decide_vote(ProposalKind::Register, &peer);
            let reply = Message::VoteMsg {
                proposal_id,
                vote,
                voter: coordinator.self_id().clone(),
            };
            transport::send(&mut stream, &reply).await?;
        }
        Message::ProposeRemove { proposal_id, peer, .. } => {
            let vote = coordinator.decide_vote(ProposalKind::Remove, &peer);
            let reply = Message::VoteMsg {
                proposal_id,
                vote,
                voter: coordinator.self_id().clone(),
            };
            transport::send(&mut stream, &reply).await?;
        }
        Message::RemovalNotify { peer } => {
            coordinator.apply_removal_notify(&peer);
        }
        Message::SyncMembership { members } => {
            let learned = coordinator.apply_sync(members);
            if !learned.is_empty() {
                info!(count = learned.len(), "learned new members via sync");
            }
        }
        other => {
            warn!(msg_type = other.type_tag(), "unexpected message on seed-facing listener");
        }
    }

    Ok(())
}

/// Dials every other seed concurrently, collecting `VOTE` replies into
/// `coordinator` until quorum resolves the proposal or `PROPOSAL_DEADLINE`
/// elapses, whichever comes first.
async fn broadcast_and_collect(
    coordinator: Arc<Coordinator>,
    proposal_id: Uuid,
    kind: ProposalKind,
    subject: NodeId,
) -> Decision {
    let self_id = coordinator.self_id().clone();
    let others = coordinator.directory().others(&self_id);
    let (tx, mut rx) = tokio::sync::mpsc::channel(others.len().max(1));
    let proposal_id_str = proposal_id.to_string();

    for seed in others {
        let tx = tx.clone();
        let subject = subject.clone();
        let self_id = self_id.clone();
        let proposal_id_str = proposal_id_str.clone();
        tokio::spawn(async move {
            let propose = match kind {
                ProposalKind::Register => Message::ProposeRegister {
                    proposal_id: proposal_id_str,
                    peer: subject,
                    originator: self_id,
                },
                ProposalKind::Remove => Message::ProposeRemove {
                    proposal_id: proposal_id_str,
                    peer: subject,
                    originator: self_id,
                },
            };
            if let Ok(Some(Message::VoteMsg { vote, voter, .. })) =
                transport::send_and_recv(seed.canonical(), &propose).await
            {
                let _ = tx.send((voter, vote)).await;
            }
        });
    }
    drop(tx);

    let collect = async {
        while let Some((voter, vote)) = rx.recv().await {
            if let Ok(Some(decision)) = coordinator.record_vote(proposal_id, voter, vote) {
                return decision;
            }
        }
        Decision::Rejected
    };

    match timeout(PROPOSAL_DEADLINE, collect).await {
        Ok(decision) => decision,
        Err(_) => coordinator
            .expire_if_pending(proposal_id)
            .ok()
            .flatten()
            .unwrap_or(Decision::Rejected),
    }
}

async fn sync_loop(coordinator: Arc<Coordinator>) {
    let mut ticker = interval(SYNC_INTERVAL);
    loop {
        ticker.tick().await;
        let self_id = coordinator.self_id().clone();
        let others = coordinator.directory().others(&self_id);
        let members: Vec<NodeId> = coordinator.membership().snapshot().into_iter().collect();
        for seed in others {
            let msg = Message::SyncMembership {
                members: members.clone(),
            };
            if let Err(err) = transport::send_only(seed.canonical(), &msg).await {
                warn!(%seed, %err, "sync to seed failed");
            }
        }
    }
}
