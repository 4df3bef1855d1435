//! Responder registry.
//!
//! One responder per live update stream. Each connection owns a writer task
//! fed by an mpsc channel; the registry maps connection identity to that
//! channel plus an in-flight-write flag. Broadcast is best-effort and
//! at-most-once-in-flight: a responder whose previous snapshot write has
//! not completed is skipped, and the completion callback is the only place
//! the flag clears or a failed responder is removed.

use std::collections::HashMap;
use std::sync::Mutex;

use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use world_shared::net::{encode_to_bytes, ConnectionId, NetMsg, WorldSnapshot};

/// Messages a connection's writer task consumes.
#[derive(Debug)]
pub enum Outbound {
    /// A unary reply, encoded by the writer.
    Reply(NetMsg),
    /// A pre-encoded snapshot frame; completion must be reported back.
    Snapshot(Bytes),
}

/// Write state machine for one subscribed connection.
#[derive(Debug)]
pub struct Responder {
    id: ConnectionId,
    tx: mpsc::Sender<Outbound>,
    writing: bool,
}

impl Responder {
    pub fn new(id: ConnectionId, tx: mpsc::Sender<Outbound>) -> Self {
        Self {
            id,
            tx,
            writing: false,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Thread-safe collection of live responders.
#[derive(Debug, Default)]
pub struct ResponderRegistry {
    inner: Mutex<HashMap<ConnectionId, Responder>>,
}

impl ResponderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a responder; it becomes eligible for the next broadcast.
    /// Re-subscribing a connection replaces its previous entry.
    pub fn add(&self, responder: Responder) {
        let id = responder.id;
        let mut inner = self.inner.lock().expect("responder registry poisoned");
        if inner.insert(id, responder).is_some() {
            debug!(connection = ?id, "responder replaced");
        } else {
            debug!(connection = ?id, "responder added");
        }
    }

    /// Removes a responder. Removing an absent id is a no-op.
    pub fn remove(&self, id: ConnectionId) {
        let mut inner = self.inner.lock().expect("responder registry poisoned");
        if inner.remove(&id).is_some() {
            debug!(connection = ?id, "responder removed");
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("responder registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Issues one asynchronous snapshot write to every idle responder.
    ///
    /// The snapshot is encoded once and the same payload handed to every
    /// writer task. Returns the number of writes issued. Never waits for
    /// write completions.
    pub fn broadcast(&self, snapshot: &WorldSnapshot) -> usize {
        let payload = match encode_to_bytes(&NetMsg::Snapshot(snapshot.clone())) {
            Ok(payload) => payload,
            Err(error) => {
                warn!(%error, "failed to encode snapshot, skipping broadcast");
                return 0;
            }
        };

        let mut inner = self.inner.lock().expect("responder registry poisoned");
        let mut issued = 0;
        let mut dead = Vec::new();
        for (id, responder) in inner.iter_mut() {
            if responder.writing {
                continue;
            }
            match responder.tx.try_send(Outbound::Snapshot(payload.clone())) {
                Ok(()) => {
                    responder.writing = true;
                    issued += 1;
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(connection = ?id, "writer queue full, skipping this tick");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => dead.push(*id),
            }
        }
        for id in dead {
            debug!(connection = ?id, "writer gone, dropping responder");
            inner.remove(&id);
        }
        issued
    }

    /// Completion callback from a connection's writer task.
    ///
    /// `ok == false` means the stream failed or was cancelled: the
    /// responder is removed, a routine lifecycle event rather than an
    /// error. `ok == true` clears the in-flight flag.
    pub fn complete(&self, id: ConnectionId, ok: bool) {
        let mut inner = self.inner.lock().expect("responder registry poisoned");
        if ok {
            if let Some(responder) = inner.get_mut(&id) {
                responder.writing = false;
            }
        } else if inner.remove(&id).is_some() {
            debug!(connection = ?id, "snapshot write failed, dropping responder");
        }
    }
}
