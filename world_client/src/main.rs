//! Headless client binary.
//!
//! Usage:
//!   cargo run -p world_client -- [--addr 127.0.0.1:50051] [--name Wanderer] [--tick-hz 10]
//!
//! Connects, creates a character, subscribes to the update stream, and
//! echoes the server's view of that character back as movement reports —
//! the minimal well-behaved client. Snapshots are logged as they arrive.

use std::env;
use std::time::Duration;

use anyhow::Context;
use tracing::{info, warn};
use world_client::WorldClient;
use world_shared::config::Config;
use world_shared::entity::Character;

fn parse_args() -> Config {
    let mut cfg = Config::default();
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--addr" if i + 1 < args.len() => {
                cfg.server_addr = args[i + 1].clone();
                i += 2;
            }
            "--name" if i + 1 < args.len() => {
                cfg.character_name = args[i + 1].clone();
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(10);
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

/// One client step: wait for a snapshot, adopt the server's view of our
/// character, and report it back.
async fn step(
    client: &mut WorldClient,
    me: &mut Character,
    timeout: Duration,
) -> anyhow::Result<()> {
    match client.next_snapshot(timeout).await? {
        Some(snapshot) => {
            if let Some(server_me) = snapshot.characters.iter().find(|c| c.name == me.name) {
                *me = server_me.clone();
                info!(
                    time = snapshot.time,
                    x = me.physic.position.x,
                    y = me.physic.position.y,
                    z = me.physic.position.z,
                    status = ?me.status,
                    "snapshot"
                );
            }
            client.report_movement(me).await.context("report movement")?;
        }
        None => warn!("no snapshot within timeout"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    let mut client = WorldClient::connect(&cfg).await.context("connect")?;

    let mut me = client
        .create_character(&cfg.character_name)
        .await
        .context("create character")?;
    info!(name = %me.name, "character created");

    client.subscribe().await.context("subscribe")?;

    let timeout = cfg.tick_period() * 4;
    loop {
        tokio::select! {
            stepped = step(&mut client, &mut me, timeout) => {
                stepped?;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("ctrl-c received, disconnecting");
                break;
            }
        }
    }

    Ok(())
}
