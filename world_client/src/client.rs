//! Client implementation.
//!
//! A headless programmatic client:
//! - Connects and handshakes over one framed TCP connection.
//! - Issues unary calls (create character, movement report, ping, death).
//! - Subscribes to the server's per-tick snapshot stream.
//!
//! Snapshots interleave with unary replies on the wire once subscribed;
//! reply helpers buffer any snapshot frames they skip past.

use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpStream;
use tracing::{debug, info};
use world_shared::{
    config::Config,
    entity::Character,
    net::{ConnectionId, FramedConn, NetMsg, WorldSnapshot, PROTOCOL_VERSION},
};

/// High-level world client.
pub struct WorldClient {
    pub connection_id: ConnectionId,
    conn: FramedConn,
    last_snapshot: Option<WorldSnapshot>,
}

impl WorldClient {
    /// Connects to a server and performs the handshake.
    pub async fn connect(cfg: &Config) -> anyhow::Result<Self> {
        info!(server = %cfg.server_addr, "connecting to server");
        let stream = TcpStream::connect(&cfg.server_addr)
            .await
            .context("tcp connect")?;
        let mut conn = FramedConn::new(stream);

        conn.send(&NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        })
        .await?;

        let connection_id = match conn.recv().await? {
            NetMsg::Welcome { connection_id } => connection_id,
            NetMsg::Disconnect { reason } => anyhow::bail!("server refused connection: {reason}"),
            other => anyhow::bail!("expected Welcome, got {other:?}"),
        };
        info!(connection = ?connection_id, "connected to server");

        Ok(Self {
            connection_id,
            conn,
            last_snapshot: None,
        })
    }

    /// Subscribes this connection to the per-tick snapshot stream.
    pub async fn subscribe(&mut self) -> anyhow::Result<()> {
        self.conn.send(&NetMsg::UpdateRequest).await
    }

    /// Asks the server to create a named character.
    pub async fn create_character(&mut self, name: &str) -> anyhow::Result<Character> {
        self.conn
            .send(&NetMsg::CreateCharacter { name: name.into() })
            .await?;
        match self.recv_reply().await? {
            NetMsg::CharacterCreated { character } => Ok(character),
            other => anyhow::bail!("expected CharacterCreated, got {other:?}"),
        }
    }

    /// Uploads this client's current character state.
    pub async fn report_movement(&mut self, character: &Character) -> anyhow::Result<()> {
        self.conn
            .send(&NetMsg::MovementReport {
                character: character.clone(),
            })
            .await?;
        match self.recv_reply().await? {
            NetMsg::MovementAck => Ok(()),
            other => anyhow::bail!("expected MovementAck, got {other:?}"),
        }
    }

    /// Round-trips a nonce through the server.
    pub async fn ping(&mut self, nonce: u32) -> anyhow::Result<u32> {
        self.conn.send(&NetMsg::Ping { nonce }).await?;
        match self.recv_reply().await? {
            NetMsg::Pong { nonce } => Ok(nonce),
            other => anyhow::bail!("expected Pong, got {other:?}"),
        }
    }

    /// Reports the named character as dead.
    pub async fn death_report(&mut self, name: &str) -> anyhow::Result<()> {
        self.conn
            .send(&NetMsg::DeathReport { name: name.into() })
            .await?;
        match self.recv_reply().await? {
            NetMsg::DeathAck => Ok(()),
            other => anyhow::bail!("expected DeathAck, got {other:?}"),
        }
    }

    /// Waits for the next snapshot, or `None` if the timeout elapses first.
    pub async fn next_snapshot(
        &mut self,
        timeout: Duration,
    ) -> anyhow::Result<Option<WorldSnapshot>> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let msg = match tokio::time::timeout_at(deadline, self.conn.recv()).await {
                Ok(msg) => msg?,
                Err(_) => return Ok(None),
            };
            match msg {
                NetMsg::Snapshot(snapshot) => {
                    self.last_snapshot = Some(snapshot.clone());
                    return Ok(Some(snapshot));
                }
                other => {
                    debug!(?other, "skipping non-snapshot frame");
                }
            }
        }
    }

    /// Most recent snapshot seen on this connection.
    pub fn last_snapshot(&self) -> Option<&WorldSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// Receives the next non-snapshot frame, buffering snapshots passed over.
    async fn recv_reply(&mut self) -> anyhow::Result<NetMsg> {
        loop {
            match self.conn.recv().await? {
                NetMsg::Snapshot(snapshot) => {
                    self.last_snapshot = Some(snapshot);
                }
                other => return Ok(other),
            }
        }
    }
}
