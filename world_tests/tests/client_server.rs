//! Full socket-based integration tests for client ↔ server communication.

use std::time::Duration;

use tokio::sync::watch;
use world_client::WorldClient;
use world_server::server::bind_ephemeral;
use world_shared::entity::CharacterStatus;
use world_shared::math::Vec3;
use world_shared::net::{decode_from_bytes, encode_to_bytes, NetMsg, PROTOCOL_VERSION};

const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(2);

/// Unit-style test: protocol messages roundtrip correctly.
#[test]
fn protocol_messages_roundtrip() -> anyhow::Result<()> {
    let hello = NetMsg::Hello {
        protocol: PROTOCOL_VERSION,
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&hello)?)?, hello);

    let report = NetMsg::DeathReport {
        name: "hero".into(),
    };
    assert_eq!(decode_from_bytes(&encode_to_bytes(&report)?)?, report);

    Ok(())
}

/// Full integration: spawn server, connect client, exchange calls/snapshots.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn client_server_full_roundtrip() -> anyhow::Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info")
        .with_test_writer()
        .try_init();

    let (server, cfg) = bind_ephemeral(50).await?;
    let registry = server.registry();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sim_task = tokio::spawn(server.simulation_loop(shutdown_rx.clone()).run());
    let accept_task = tokio::spawn(server.run_accept_loop(shutdown_rx));

    let mut client = WorldClient::connect(&cfg).await?;

    // Unary calls before subscribing.
    assert_eq!(client.ping(7).await?, 7);
    let mut hero = client.create_character("hero").await?;
    assert_eq!(hero.status, CharacterStatus::Loading);

    // Stream subscription: snapshot times must be strictly increasing and
    // the created character must show up once a tick has drained it.
    client.subscribe().await?;
    let mut last_time = f64::MIN;
    let mut seen_hero = false;
    for _ in 0..10 {
        let snap = client
            .next_snapshot(SNAPSHOT_TIMEOUT)
            .await?
            .expect("expected a snapshot before timeout");
        assert!(snap.time > last_time, "snapshot times must increase");
        last_time = snap.time;
        if snap.characters.iter().any(|c| c.name == "hero") {
            seen_hero = true;
            break;
        }
    }
    assert!(seen_hero, "created character never appeared in a snapshot");

    // Movement report: in a world with no ground bodies the reported
    // position survives integration bit-for-bit.
    hero.physic.position = Vec3::new(5.0, 0.0, 0.0);
    client.report_movement(&hero).await?;
    let mut reported_seen = false;
    for _ in 0..10 {
        let snap = client
            .next_snapshot(SNAPSHOT_TIMEOUT)
            .await?
            .expect("expected a snapshot before timeout");
        if snap
            .characters
            .iter()
            .any(|c| c.name == "hero" && c.physic.position == hero.physic.position)
        {
            reported_seen = true;
            break;
        }
    }
    assert!(reported_seen, "movement report never reflected in a snapshot");

    assert_eq!(registry.len(), 1);

    // Disconnect: the reader task unregisters the responder.
    drop(client);
    let mut drained = false;
    for _ in 0..50 {
        if registry.is_empty() {
            drained = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(drained, "responder not removed after disconnect");

    shutdown_tx.send(true)?;
    sim_task.await?;
    accept_task.await?;
    Ok(())
}

/// A second subscriber receives snapshots independently of the first.
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn two_clients_both_receive_snapshots() -> anyhow::Result<()> {
    let (server, cfg) = bind_ephemeral(50).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sim_task = tokio::spawn(server.simulation_loop(shutdown_rx.clone()).run());
    let accept_task = tokio::spawn(server.run_accept_loop(shutdown_rx));

    let mut a = WorldClient::connect(&cfg).await?;
    let mut b = WorldClient::connect(&cfg).await?;
    a.subscribe().await?;
    b.subscribe().await?;

    let snap_a = a.next_snapshot(SNAPSHOT_TIMEOUT).await?;
    let snap_b = b.next_snapshot(SNAPSHOT_TIMEOUT).await?;
    assert!(snap_a.is_some());
    assert!(snap_b.is_some());

    shutdown_tx.send(true)?;
    sim_task.await?;
    accept_task.await?;
    Ok(())
}
