//! Multi-client soak runner.
//!
//! Usage:
//!   cargo run -p world_tests --bin soak_runner -- [--clients 8] [--seconds 5] [--tick-hz 10]
//!
//! Spins up an in-process server with one ground body, connects N
//! subscribed clients, lets the simulation run for a while, then reports
//! per-client snapshot delivery and checks that every stream observed
//! strictly increasing snapshot times.

use std::env;
use std::time::Duration;

use anyhow::Context;
use tokio::sync::watch;
use tracing::info;
use world_client::WorldClient;
use world_server::server::bind_ephemeral;
use world_shared::entity::{Element, ElementKind, PhysicState};
use world_shared::math::Vec3;

struct SoakOptions {
    clients: usize,
    seconds: u64,
    tick_hz: u32,
}

fn parse_args() -> SoakOptions {
    let mut opts = SoakOptions {
        clients: 8,
        seconds: 5,
        tick_hz: 10,
    };
    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--clients" if i + 1 < args.len() => {
                opts.clients = args[i + 1].parse().unwrap_or(8);
                i += 2;
            }
            "--seconds" if i + 1 < args.len() => {
                opts.seconds = args[i + 1].parse().unwrap_or(5);
                i += 2;
            }
            "--tick-hz" if i + 1 < args.len() => {
                opts.tick_hz = args[i + 1].parse().unwrap_or(10);
                i += 2;
            }
            _ => i += 1,
        }
    }
    opts
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    let opts = parse_args();
    info!(
        clients = opts.clients,
        seconds = opts.seconds,
        tick_hz = opts.tick_hz,
        "soak starting"
    );

    let (server, cfg) = bind_ephemeral(opts.tick_hz).await?;
    server.world().lock().expect("world state poisoned").add_element(
        0.0,
        Element {
            name: "terra".into(),
            kind: ElementKind::Ground,
            physic: PhysicState {
                position: Vec3::ZERO,
                velocity: Vec3::ZERO,
                mass: 5e11,
                radius: 10.0,
            },
            color: [0.4, 0.3, 0.2],
        },
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sim_task = tokio::spawn(server.simulation_loop(shutdown_rx.clone()).run());
    let accept_task = tokio::spawn(server.run_accept_loop(shutdown_rx));

    let deadline = Duration::from_secs(opts.seconds);
    let snapshot_timeout = cfg.tick_period() * 10;
    let mut workers = Vec::new();
    for n in 0..opts.clients {
        let cfg = cfg.clone();
        workers.push(tokio::spawn(async move {
            let mut client = WorldClient::connect(&cfg).await.context("connect")?;
            let name = format!("soak-{n}");
            let mut me = client.create_character(&name).await?;
            me.physic.position = Vec3::new(20.0 + n as f64, 0.0, 0.0);
            client.report_movement(&me).await?;
            client.subscribe().await?;

            let mut received = 0u64;
            let mut last_time = f64::MIN;
            let end = tokio::time::Instant::now() + deadline;
            while tokio::time::Instant::now() < end {
                match client.next_snapshot(snapshot_timeout).await? {
                    Some(snapshot) => {
                        anyhow::ensure!(
                            snapshot.time > last_time,
                            "snapshot time went backwards on {name}"
                        );
                        last_time = snapshot.time;
                        received += 1;
                    }
                    None => break,
                }
            }
            Ok::<u64, anyhow::Error>(received)
        }));
    }

    let mut total = 0u64;
    for (n, worker) in workers.into_iter().enumerate() {
        let received = worker.await.context("join worker")??;
        info!(client = n, snapshots = received, "client done");
        total += received;
    }

    let _ = shutdown_tx.send(true);
    sim_task.await?;
    accept_task.await?;

    let expected_per_client = opts.seconds * opts.tick_hz as u64;
    info!(
        total,
        expected_per_client,
        clients = opts.clients,
        "soak finished"
    );
    Ok(())
}
