//! Standalone server binary.
//!
//! Usage:
//!   cargo run -p world_server -- [--addr 127.0.0.1:50051] [--tick-hz 10] [--world-db world.json]
//!
//! The server listens for client connections, runs a fixed timestep
//! simulation, and pushes world snapshots to every subscribed client.
//! Ctrl-C stops the loop and, when a database path was given, saves the
//! world before exiting. A missing or malformed database at startup is
//! fatal: the process must not run on a partially-loaded world.

use std::env;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;
use world_server::server::WorldServer;
use world_server::world::WorldState;
use world_shared::config::Config;
use world_shared::store::WorldDatabase;

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
            "--tick-hz" if i + 1 < args.len() => {
                cfg.tick_hz = args[i + 1].parse().unwrap_or(10);
                i += 2;
            }
            "--world-db" if i + 1 < args.len() => {
                cfg.world_db = Some(args[i + 1].clone());
                i += 2;
            }
            _ => i += 1,
        }
    }
    cfg
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cfg = parse_args();
    info!(addr = %cfg.server_addr, tick_hz = cfg.tick_hz, "starting server");

    let world = match &cfg.world_db {
        Some(path) => {
            let db = WorldDatabase::load(path).context("load world database")?;
            info!(
                path = %path,
                elements = db.elements.len(),
                characters = db.characters.len(),
                "world database loaded"
            );
            WorldState::from_database(db)
        }
        None => WorldState::new(),
    };

    let server = WorldServer::bind(cfg.clone(), world)
        .await
        .context("bind server")?;
    let local = server.local_addr()?;
    info!(%local, "server listening");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let world = server.world();
    let sim = server.simulation_loop(shutdown_rx.clone());

    let sim_task = tokio::spawn(sim.run());
    let accept_task = tokio::spawn(server.run_accept_loop(shutdown_rx));

    tokio::signal::ctrl_c().await.context("wait for ctrl-c")?;
    info!("ctrl-c received, shutting down");
    let _ = shutdown_tx.send(true);

    sim_task.await.context("join simulation loop")?;
    accept_task.await.context("join accept loop")?;

    if let Some(path) = &cfg.world_db {
        let db = world.lock().expect("world state poisoned").to_database();
        db.save(path).context("save world database")?;
        info!(path = %path, "world database saved");
    }

    Ok(())
}
