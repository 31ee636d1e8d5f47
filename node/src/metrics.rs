//! # Prometheus Metrics
//!
//! Exposes operational metrics for a meshring node. Scraped by Prometheus at
//! the `/metrics` HTTP endpoint on the configured metrics port.
//!
//! All metrics are registered in a dedicated [`prometheus::Registry`] so
//! they do not collide with any default global registry consumers.

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

/// Holds all Prometheus metric handles for the node.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    /// Current size of the membership set (seed role only; zero on peers).
    pub membership_size: IntGauge,
    /// Total REGISTER proposals that committed as APPROVED.
    pub proposals_approved_total: IntCounter,
    /// Total proposals (REGISTER or REMOVE) that ended REJECTED.
    pub proposals_rejected_total: IntCounter,
    /// Total gossip messages this node originated.
    pub gossip_generated_total: IntCounter,
    /// Total gossip messages received (first-time or duplicate).
    pub gossip_received_total: IntCounter,
    /// Total gossip messages forwarded to a neighbor.
    pub gossip_forwarded_total: IntCounter,
    /// Total gossip messages dropped as duplicates or hash mismatches.
    pub gossip_dropped_total: IntCounter,
    /// Total suspicions raised (miss-threshold reached).
    pub suspicions_raised_total: IntCounter,
    /// Total suspicions confirmed (peer-quorum agreed DEAD).
    pub suspicions_confirmed_total: IntCounter,
    /// Current neighbor-set size (peer role only).
    pub neighbor_count: IntGauge,
}

impl NodeMetrics {
    /// Creates and registers all metrics. Call once at startup.
    pub fn new() -> Self {
        let registry = Registry::new_custom(Some("meshring".into()), None)
            .expect("failed to create prometheus registry");

        macro_rules! counter {
            ($name:literal, $help:literal) => {{
                let c = IntCounter::new($name, $help).expect("metric creation");
                registry
                    .register(Box::new(c.clone()))
                    .expect("metric registration");
                c
            }};
        }
        macro_rules! gauge {
            ($name:literal, $help:literal) => {{
                let g = IntGauge::new($name, $help).expect("metric creation");
                registry
                    .register(Box::new(g.clone()))
                    .expect("metric registration");
                g
            }};
        }

        Self {
            membership_size: gauge!("membership_size", "Current size of the membership set"),
            proposals_approved_total: counter!(
                "proposals_approved_total",
                "Total REGISTER/REMOVE proposals that committed as APPROVED"
            ),
            proposals_rejected_total: counter!(
                "proposals_rejected_total",
                "Total proposals that ended REJECTED"
            ),
            gossip_generated_total: counter!(
                "gossip_generated_total",
                "Total gossip messages this node originated"
            ),
            gossip_received_total: counter!(
                "gossip_received_total",
                "Total gossip messages received"
            ),
            gossip_forwarded_total: counter!(
                "gossip_forwarded_total",
                "Total gossip messages forwarded to a neighbor"
            ),
            gossip_dropped_total: counter!(
                "gossip_dropped_total",
                "Total gossip messages dropped (duplicate or hash mismatch)"
            ),
            suspicions_raised_total: counter!(
                "suspicions_raised_total",
                "Total neighbor suspicions raised"
            ),
            suspicions_confirmed_total: counter!(
                "suspicions_confirmed_total",
                "Total neighbor suspicions confirmed by peer quorum"
            ),
            neighbor_count: gauge!("neighbor_count", "Current neighbor-set size"),
            registry,
        }
    }

    /// Encodes all registered metrics into the Prometheus text exposition
    /// format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer).expect("prometheus output is valid utf-8"))
    }
}

impl Default for NodeMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared metrics state passed to axum handlers via extension.
pub type SharedMetrics = Arc<NodeMetrics>;

/// Axum handler that renders `/metrics` in Prometheus text format.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
