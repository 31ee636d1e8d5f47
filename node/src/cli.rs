//! # CLI Interface
//!
//! Defines the command-line argument structure for `meshring-node` using
//! `clap` derive. Two subcommands, one per role: `seed` and `peer`. Each
//! accepts the required `--host`/`--port`/`--config` surface spec.md §6
//! pins, plus ambient flags for the metrics/status/log-level surface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Meshring overlay node.
///
/// Runs as either a seed (membership authority) or a peer (gossip overlay
/// participant).
#[derive(Parser, Debug)]
#[command(
    name = "meshring-node",
    about = "Meshring peer-to-peer overlay node",
    version,
    propagate_version = true
)]
pub struct MeshringCli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the meshring node binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run as a seed node (membership authority).
    Seed(SeedArgs),
    /// Run as a peer node (gossip overlay participant).
    Peer(PeerArgs),
    /// Print version information and exit.
    Version,
}

/// Arguments shared by both roles.
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    /// Host this node binds and advertises as.
    #[arg(long, env = "MESHRING_HOST")]
    pub host: String,

    /// Port this node binds and advertises as.
    #[arg(long, env = "MESHRING_PORT")]
    pub port: u16,

    /// Path to the seed directory config (one seed per line, `:`/`,`
    /// separated host/port).
    #[arg(long, env = "MESHRING_CONFIG")]
    pub config: PathBuf,

    /// Directory the event log and any other runtime state is written to.
    #[arg(long, env = "MESHRING_DATA_DIR", default_value = "./meshring-data")]
    pub data_dir: PathBuf,

    /// Port for the Prometheus `/metrics` endpoint.
    #[arg(long, env = "MESHRING_METRICS_PORT", default_value_t = 9900)]
    pub metrics_port: u16,

    /// Port for the `/health` and `/status` HTTP endpoints.
    #[arg(long, env = "MESHRING_STATUS_PORT", default_value_t = 9901)]
    pub status_port: u16,

    /// `RUST_LOG`-style filter directive for console logging.
    #[arg(long, env = "MESHRING_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

/// Arguments for the `seed` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct SeedArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Port the seed-facing listener (PROPOSE_*/VOTE/SYNC_MEMBERSHIP) binds
    /// to, distinct from the peer-facing listener on `--port`.
    #[arg(long, env = "MESHRING_SEED_PORT")]
    pub seed_port: u16,
}

/// Arguments for the `peer` subcommand.
#[derive(Parser, Debug, Clone)]
pub struct PeerArgs {
    #[command(flatten)]
    pub common: CommonArgs,
}

/// Resolves the data directory to an absolute path, creating it if needed.
pub fn resolve_data_dir(data_dir: &std::path::Path) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(data_dir)?;
    std::fs::canonicalize(data_dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        MeshringCli::command().debug_assert();
    }

    #[test]
    fn parses_seed_subcommand() {
        let cli = MeshringCli::parse_from([
            "meshring-node",
            "seed",
            "--host",
            "127.0.0.1",
            "--port",
            "6000",
            "--seed-port",
            "6100",
            "--config",
            "seeds.txt",
        ]);
        match cli.command {
            Commands::Seed(args) => {
                assert_eq!(args.common.host, "127.0.0.1");
                assert_eq!(args.common.port, 6000);
                assert_eq!(args.seed_port, 6100);
            }
            _ => panic!("expected Seed"),
        }
    }

    #[test]
    fn parses_peer_subcommand() {
        let cli = MeshringCli::parse_from([
            "meshring-node",
            "peer",
            "--host",
            "127.0.0.1",
            "--port",
            "7000",
            "--config",
            "seeds.txt",
        ]);
        match cli.command {
            Commands::Peer(args) => {
                assert_eq!(args.common.port, 7000);
            }
            _ => panic!("expected Peer"),
        }
    }
}
