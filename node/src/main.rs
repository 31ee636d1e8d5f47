// Copyright (c) 2026 Meshring Contributors. MIT License.
// See LICENSE for details.

//! # Meshring Node
//!
//! Entry point for the `meshring-node` binary. Parses CLI arguments,
//! initializes logging, and runs one of two roles:
//!
//! - `seed`    — membership authority: runs REGISTER/REMOVE consensus and
//!   the seed-to-seed anti-entropy sync loop.
//! - `peer`    — gossip overlay participant: registers with a seed,
//!   maintains a Zipf-sampled neighbor set, disseminates gossip, and probes
//!   neighbor liveness.
//! - `version` — print build version information and exit.

mod api;
mod cli;
mod logging;
mod metrics;
mod peer_main;
mod seed_main;
mod transport;

use anyhow::Result;
use clap::Parser;

use cli::{Commands, MeshringCli};
use logging::LogFormat;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = MeshringCli::parse();

    match cli.command {
        Commands::Seed(args) => {
            init_logging_for(&args.common.log_level);
            seed_main::run(args).await
        }
        Commands::Peer(args) => {
            init_logging_for(&args.common.log_level);
            peer_main::run(args).await
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

fn init_logging_for(level: &str) {
    let filter = format!("meshring_node={level},meshring_protocol={level},tower_http=info");
    logging::init_logging(&filter, LogFormat::Pretty);
}

fn print_version() {
    println!("meshring-node {}", env!("CARGO_PKG_VERSION"));
    println!("rustc        {}", rustc_version());
    if let Some(commit) = option_env!("GIT_COMMIT") {
        println!("commit       {}", commit);
    }
}

fn rustc_version() -> &'static str {
    option_env!("RUSTC_VERSION").unwrap_or("unknown")
}
