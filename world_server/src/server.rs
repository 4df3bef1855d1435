//! Server implementation.
//!
//! An authoritative world server: clients connect over TCP, handshake, and
//! then issue unary calls or subscribe to the per-tick snapshot stream.
//! Each connection runs two tasks:
//! - a reader that dispatches incoming frames, and
//! - a writer that owns the socket's write half and drains an mpsc queue.
//!
//! The writer reports every snapshot completion back to the responder
//! registry; a failed write removes the connection's responder, which is
//! the only disconnect detection the stream has.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use world_shared::{
    clock::wall_clock_seconds,
    config::Config,
    entity::{Character, CharacterStatus},
    net::{ConnectionId, FrameReader, FrameWriter, FramedConn, Listener, NetMsg, PROTOCOL_VERSION},
};

use crate::registry::{Outbound, Responder, ResponderRegistry};
use crate::sim::{ReportQueue, SimulationLoop};
use crate::world::WorldState;

/// Per-connection writer queue depth: unary replies plus at most one
/// in-flight snapshot.
const OUTBOUND_QUEUE: usize = 8;

/// Game world server.
pub struct WorldServer {
    pub cfg: Config,
    listener: Listener,
    world: Arc<Mutex<WorldState>>,
    reports: Arc<ReportQueue>,
    registry: Arc<ResponderRegistry>,
}

impl WorldServer {
    /// Binds the listen socket around an already-seeded world.
    pub async fn bind(cfg: Config, world: WorldState) -> anyhow::Result<Self> {
        let addr: SocketAddr = cfg.server_addr.parse().context("parse server_addr")?;
        let listener = Listener::bind(addr).await?;
        Ok(Self {
            cfg,
            listener,
            world: Arc::new(Mutex::new(world)),
            reports: Arc::new(ReportQueue::new()),
            registry: Arc::new(ResponderRegistry::new()),
        })
    }

    /// Returns the local address (after binding).
    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn world(&self) -> Arc<Mutex<WorldState>> {
        self.world.clone()
    }

    pub fn reports(&self) -> Arc<ReportQueue> {
        self.reports.clone()
    }

    pub fn registry(&self) -> Arc<ResponderRegistry> {
        self.registry.clone()
    }

    /// Builds the fixed-rate simulation loop for this server's world.
    pub fn simulation_loop(&self, shutdown: watch::Receiver<bool>) -> SimulationLoop {
        SimulationLoop::new(
            self.world.clone(),
            self.reports.clone(),
            self.registry.clone(),
            self.cfg.tick_period(),
            shutdown,
        )
    }

    /// Accepts connections until the shutdown signal flips, spawning a
    /// handler per connection.
    pub async fn run_accept_loop(self, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((conn, peer)) => {
                            let world = self.world.clone();
                            let reports = self.reports.clone();
                            let registry = self.registry.clone();
                            tokio::spawn(async move {
                                if let Err(error) =
                                    handle_connection(conn, peer, world, reports, registry).await
                                {
                                    debug!(%peer, %error, "connection ended with error");
                                }
                            });
                        }
                        Err(error) => {
                            warn!(%error, "accept failed");
                        }
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("accept loop stopped");
    }
}

/// Handshakes one connection, then splits it into reader/writer tasks.
async fn handle_connection(
    mut conn: FramedConn,
    peer: SocketAddr,
    world: Arc<Mutex<WorldState>>,
    reports: Arc<ReportQueue>,
    registry: Arc<ResponderRegistry>,
) -> anyhow::Result<()> {
    let msg = conn.recv().await?;
    match msg {
        NetMsg::Hello { protocol } if protocol == PROTOCOL_VERSION => {}
        NetMsg::Hello { protocol } => {
            conn.send(&NetMsg::Disconnect {
                reason: format!("protocol mismatch: client {protocol}, server {PROTOCOL_VERSION}"),
            })
            .await
            .ok();
            anyhow::bail!("protocol mismatch from {peer}: {protocol}");
        }
        other => anyhow::bail!("unexpected handshake msg: {other:?}"),
    }

    let id = ConnectionId::new_unique();
    conn.send(&NetMsg::Welcome { connection_id: id }).await?;
    info!(connection = ?id, %peer, "client connected");

    let (reader, writer) = conn.into_split();
    let (tx, rx) = mpsc::channel(OUTBOUND_QUEUE);

    let writer_registry = registry.clone();
    tokio::spawn(write_loop(id, writer, rx, writer_registry));

    read_loop(id, reader, tx, world, reports, registry).await
}

/// Drains the outbound queue onto the socket. Snapshot completions are
/// reported to the registry; the first failed write ends the task.
async fn write_loop(
    id: ConnectionId,
    mut writer: FrameWriter,
    mut rx: mpsc::Receiver<Outbound>,
    registry: Arc<ResponderRegistry>,
) {
    while let Some(out) = rx.recv().await {
        match out {
            Outbound::Reply(msg) => {
                if let Err(error) = writer.send(&msg).await {
                    debug!(connection = ?id, %error, "reply write failed");
                    registry.remove(id);
                    break;
                }
            }
            Outbound::Snapshot(payload) => {
                let ok = writer.send_bytes(&payload).await.is_ok();
                registry.complete(id, ok);
                if !ok {
                    debug!(connection = ?id, "snapshot write failed");
                    break;
                }
            }
        }
    }
}

/// Dispatches incoming frames until the peer goes away, then unregisters.
async fn read_loop(
    id: ConnectionId,
    mut reader: FrameReader,
    tx: mpsc::Sender<Outbound>,
    world: Arc<Mutex<WorldState>>,
    reports: Arc<ReportQueue>,
    registry: Arc<ResponderRegistry>,
) -> anyhow::Result<()> {
    loop {
        let msg = match reader.recv().await {
            Ok(msg) => msg,
            Err(error) => {
                debug!(connection = ?id, %error, "connection closed");
                break;
            }
        };

        let reply = match msg {
            NetMsg::UpdateRequest => {
                registry.add(Responder::new(id, tx.clone()));
                info!(connection = ?id, "update stream subscribed");
                None
            }
            NetMsg::MovementReport { character } => {
                if character.physic.mass <= 0.0 || character.physic.radius < 0.0 {
                    warn!(
                        connection = ?id,
                        name = %character.name,
                        "discarding movement report with invalid mass/radius"
                    );
                } else {
                    reports.push(wall_clock_seconds(), character);
                }
                Some(NetMsg::MovementAck)
            }
            NetMsg::CreateCharacter { name } => {
                let character = Character::named(&name);
                reports.push(wall_clock_seconds(), character.clone());
                info!(connection = ?id, name = %name, "character created");
                Some(NetMsg::CharacterCreated { character })
            }
            NetMsg::DeathReport { name } => {
                let mut character = {
                    let world = world.lock().expect("world state poisoned");
                    world
                        .characters()
                        .into_iter()
                        .find(|c| c.name == name)
                        .unwrap_or_else(|| Character::named(&name))
                };
                character.status = CharacterStatus::Dead;
                reports.push(wall_clock_seconds(), character);
                info!(connection = ?id, name = %name, "death reported");
                Some(NetMsg::DeathAck)
            }
            NetMsg::Ping { nonce } => Some(NetMsg::Pong { nonce }),
            NetMsg::Disconnect { reason } => {
                debug!(connection = ?id, %reason, "client disconnecting");
                break;
            }
            other => {
                debug!(connection = ?id, ?other, "unexpected message");
                None
            }
        };

        if let Some(reply) = reply {
            if tx.send(Outbound::Reply(reply)).await.is_err() {
                // Writer task already died on a failed write.
                break;
            }
        }
    }

    registry.remove(id);
    Ok(())
}

/// Helper for tests: bind to an ephemeral port with an empty world.
pub async fn bind_ephemeral(tick_hz: u32) -> anyhow::Result<(WorldServer, Config)> {
    let cfg = Config {
        server_addr: format!("{}:{}", IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
        tick_hz,
        ..Default::default()
    };
    let server = WorldServer::bind(cfg.clone(), WorldState::new()).await?;
    let mut cfg = cfg;
    cfg.server_addr = server.local_addr()?.to_string();
    Ok((server, cfg))
}
