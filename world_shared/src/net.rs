//! Networking primitives.
//!
//! Goals:
//! - One TCP connection per client carrying length-prefixed JSON frames.
//! - A single message envelope for handshake, unary calls, and the
//!   server-pushed snapshot stream.
//! - Keep serialization explicit and versionable.
//!
//! The update stream is a subscription: after `UpdateRequest` the server
//! pushes a `Snapshot` frame every tick until the connection dies. There is
//! no client-side flow control; a client that cannot drain its socket is
//! dropped by the server on the next failed write.

use anyhow::Context;
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::{
    net::SocketAddr,
    sync::atomic::{AtomicU64, Ordering},
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpListener, TcpStream,
    },
};

use crate::entity::{Character, Element};

/// Protocol version for compatibility checks.
pub const PROTOCOL_VERSION: u32 = 1;

/// Frames larger than this are rejected as corrupt.
const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Identifies one live client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    pub fn new_unique() -> Self {
        ConnectionId(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// High-level message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum NetMsg {
    // ─── Connection handshake ───
    Hello {
        protocol: u32,
    },
    Welcome {
        connection_id: ConnectionId,
    },

    // ─── Update stream ───
    /// Client -> server: subscribe this connection to the tick stream.
    UpdateRequest,
    /// Server -> client: world snapshot, pushed once per tick.
    Snapshot(WorldSnapshot),

    // ─── Unary calls ───
    /// Client -> server: the client's own current character state.
    MovementReport {
        character: Character,
    },
    MovementAck,
    /// Client -> server: create (or re-create) a named character.
    CreateCharacter {
        name: String,
    },
    CharacterCreated {
        character: Character,
    },
    Ping {
        nonce: u32,
    },
    Pong {
        nonce: u32,
    },
    /// Client -> server: the named character has died.
    DeathReport {
        name: String,
    },
    DeathAck,

    // ─── Disconnect ───
    Disconnect {
        reason: String,
    },
}

/// World snapshot pushed to every subscribed connection each tick.
///
/// Entries are in name order; consecutive snapshots on one connection carry
/// strictly increasing `time` values.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorldSnapshot {
    pub time: f64,
    pub elements: Vec<Element>,
    pub characters: Vec<Character>,
}

async fn write_frame(stream: &mut (impl AsyncWriteExt + Unpin), payload: &[u8]) -> anyhow::Result<()> {
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(payload.len() as u32);
    buf.extend_from_slice(payload);
    stream.write_all(&buf).await.context("tcp write")?;
    Ok(())
}

async fn read_frame(stream: &mut (impl AsyncReadExt + Unpin)) -> anyhow::Result<NetMsg> {
    let mut len_buf = [0u8; 4];
    stream
        .read_exact(&mut len_buf)
        .await
        .context("tcp read len")?;
    let len = u32::from_be_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_FRAME_LEN, "frame too large: {len} bytes");
    let mut payload = vec![0u8; len];
    stream
        .read_exact(&mut payload)
        .await
        .context("tcp read payload")?;
    let msg = serde_json::from_slice(&payload).context("deserialize msg")?;
    Ok(msg)
}

/// Message-framed connection over TCP.
#[derive(Debug)]
pub struct FramedConn {
    stream: TcpStream,
}

impl FramedConn {
    pub fn new(stream: TcpStream) -> Self {
        Self { stream }
    }

    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        write_frame(&mut self.stream, &payload).await
    }

    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.stream).await
    }

    pub fn peer_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.stream.peer_addr()?)
    }

    /// Splits into independently-owned read and write halves so that a
    /// reader task and a writer task can drive the same connection.
    pub fn into_split(self) -> (FrameReader, FrameWriter) {
        let (read, write) = self.stream.into_split();
        (FrameReader { half: read }, FrameWriter { half: write })
    }
}

/// Read half of a framed connection.
#[derive(Debug)]
pub struct FrameReader {
    half: OwnedReadHalf,
}

impl FrameReader {
    pub async fn recv(&mut self) -> anyhow::Result<NetMsg> {
        read_frame(&mut self.half).await
    }
}

/// Write half of a framed connection.
#[derive(Debug)]
pub struct FrameWriter {
    half: OwnedWriteHalf,
}

impl FrameWriter {
    pub async fn send(&mut self, msg: &NetMsg) -> anyhow::Result<()> {
        let payload = serde_json::to_vec(msg).context("serialize msg")?;
        write_frame(&mut self.half, &payload).await
    }

    /// Writes an already-encoded message payload. Broadcast encodes a
    /// snapshot once and hands every connection the same bytes.
    pub async fn send_bytes(&mut self, payload: &Bytes) -> anyhow::Result<()> {
        write_frame(&mut self.half, payload).await
    }
}

/// TCP server listener.
pub struct Listener {
    listener: TcpListener,
}

impl Listener {
    pub async fn bind(addr: SocketAddr) -> anyhow::Result<Self> {
        let listener = TcpListener::bind(addr).await.context("tcp bind")?;
        Ok(Self { listener })
    }

    pub async fn accept(&self) -> anyhow::Result<(FramedConn, SocketAddr)> {
        let (stream, addr) = self.listener.accept().await.context("tcp accept")?;
        Ok((FramedConn::new(stream), addr))
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

/// Convenience codec helpers.
pub fn encode_to_bytes(msg: &NetMsg) -> anyhow::Result<Bytes> {
    let payload = serde_json::to_vec(msg).context("serialize")?;
    Ok(Bytes::from(payload))
}

pub fn decode_from_bytes(b: &[u8]) -> anyhow::Result<NetMsg> {
    serde_json::from_slice(b).context("deserialize")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::Character;

    #[test]
    fn netmsg_roundtrip_bytes() {
        let msg = NetMsg::Hello {
            protocol: PROTOCOL_VERSION,
        };
        let bytes = encode_to_bytes(&msg).unwrap();
        let back = decode_from_bytes(&bytes).unwrap();
        assert_eq!(msg, back);
    }

    #[test]
    fn snapshot_roundtrip_bytes() {
        let msg = NetMsg::Snapshot(WorldSnapshot {
            time: 42.5,
            elements: Vec::new(),
            characters: vec![Character::named("hero")],
        });
        let bytes = encode_to_bytes(&msg).unwrap();
        assert_eq!(decode_from_bytes(&bytes).unwrap(), msg);
    }

    #[test]
    fn connection_ids_are_unique() {
        let a = ConnectionId::new_unique();
        let b = ConnectionId::new_unique();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn framed_conn_roundtrip_over_socket() -> anyhow::Result<()> {
        let listener = Listener::bind("127.0.0.1:0".parse()?).await?;
        let addr = listener.local_addr()?;

        let server = tokio::spawn(async move {
            let (mut conn, _) = listener.accept().await?;
            let msg = conn.recv().await?;
            conn.send(&msg).await?;
            Ok::<_, anyhow::Error>(())
        });

        let stream = TcpStream::connect(addr).await?;
        let mut conn = FramedConn::new(stream);
        let sent = NetMsg::Ping { nonce: 7 };
        conn.send(&sent).await?;
        let echoed = conn.recv().await?;
        assert_eq!(echoed, sent);

        server.await??;
        Ok(())
    }
}
