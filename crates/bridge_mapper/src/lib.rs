//! Entry point wiring for the Meshtastic <-> Matrix bridge (§5, §6): reads
//! configuration from the environment, builds the persistence and
//! collaborator layers, spawns the bridge's actors, and runs until an
//! interrupt signal arrives.
mod config;
mod health;
mod wiring;

use clap::Parser;
use flockfile::check_another_instance_is_not_running;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Parser)]
#[clap(
    name = "bridge-matrix-mapper",
    version = clap::crate_version!(),
    about = "Bridges a Meshtastic mesh network and a Matrix room"
)]
pub struct CliOpt {
    /// Directory holding the run-time lock file that prevents two
    /// instances from running against the same mesh/room at once.
    #[clap(long, env = "BRIDGE_RUN_DIR", default_value = "/tmp")]
    pub run_dir: std::path::PathBuf,
}

pub async fn run(opt: CliOpt) -> anyhow::Result<()> {
    let _flock = check_another_instance_is_not_running("bridge-matrix-mapper", &opt.run_dir)?;

    let config = config::BridgeConfig::from_env()?;
    info!(target: "bridge_mapper", "starting");
    let runtime = wiring::start(config).await?;

    tokio::signal::ctrl_c().await?;
    info!(target: "bridge_mapper", "shutdown requested, draining actors");
    runtime.shutdown(Duration::from_secs(10)).await;
    Ok(())
}
