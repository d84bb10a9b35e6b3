//! A single client connection: one socket, one reader thread, one inbound
//! queue, and a mutex-guarded write path.
//!
//! ```text
//!                 ┌──────────── reader thread ────────────┐
//!   socket ──────▶│ read_frame → InboundSender::push      │──▶ InboundReceiver
//!                 └───────────────────────────────────────┘        │
//!                                                                  ▼
//!   socket ◀──── Mutex<TcpStream> ◀──── send() ◀──── simulation (drain_inbound)
//! ```
//!
//! The reader thread never sees world state. On a fatal read it flips the
//! shared `connected` flag, records why, and shuts the socket down; the
//! simulation observes the flag on its next step and removes the actor.

use std::fmt;
use std::io::{ErrorKind, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pestle_protocol::{
    ClientId, DEFAULT_MAX_PAYLOAD_LEN, Packet, RawPacket, encode_frame, read_frame,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::TransportError;
use crate::queue::{InboundReceiver, InboundSender, inbound_queue};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Per-connection socket settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Largest payload a peer may declare in a frame header. Larger frames
    /// drop the connection before any buffer is allocated.
    pub max_payload_len: usize,

    /// Upper bound on a single blocking write. A peer that stops reading
    /// surfaces as a write failure instead of stalling the simulation.
    /// `None` disables the timeout.
    pub write_timeout: Option<Duration>,

    /// Disable Nagle's algorithm. Frames are small and latency-sensitive.
    pub nodelay: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_payload_len: DEFAULT_MAX_PAYLOAD_LEN,
            write_timeout: Some(Duration::from_secs(2)),
            nodelay: true,
        }
    }
}

// ---------------------------------------------------------------------------
// DisconnectReason
// ---------------------------------------------------------------------------

/// Why a connection stopped being connected. Only the first reason is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The peer closed the socket between frames.
    PeerClosed,
    /// The reader thread hit a framing or socket error.
    ReadFailed(String),
    /// An outbound write failed.
    WriteFailed(String),
    /// A packet failed to decode or dispatch.
    Rejected(String),
    /// The server closed the connection (shutdown or capacity).
    ServerClosed,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeerClosed => write!(f, "peer closed"),
            Self::ReadFailed(e) => write!(f, "read failed: {e}"),
            Self::WriteFailed(e) => write!(f, "write failed: {e}"),
            Self::Rejected(e) => write!(f, "rejected: {e}"),
            Self::ServerClosed => write!(f, "closed by server"),
        }
    }
}

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// State touched by both the reader thread and the owning simulation.
struct Shared {
    client_id: ClientId,
    connected: AtomicBool,
    closed: AtomicBool,
    /// Handle kept only to shut the socket down from either side.
    socket: TcpStream,
    reason: OnceLock<DisconnectReason>,
}

impl Shared {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn disconnect(&self, reason: DisconnectReason) {
        self.connected.store(false, Ordering::Release);
        let _ = self.reason.set(reason);
        self.close_socket();
    }

    /// Shuts the socket down. Only the first call does anything; the
    /// shutdown also wakes a reader blocked in `read`.
    fn close_socket(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        match self.socket.shutdown(Shutdown::Both) {
            Ok(()) => debug!(client_id = %self.client_id, "socket closed"),
            Err(e) if e.kind() == ErrorKind::NotConnected => {}
            Err(e) => debug!(client_id = %self.client_id, error = %e, "socket shutdown failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One connected client.
///
/// Owned by the simulation. Dropping it closes the socket and joins the
/// reader thread.
pub struct Connection {
    client_id: ClientId,
    peer_addr: SocketAddr,
    shared: Arc<Shared>,
    writer: Mutex<TcpStream>,
    inbound: InboundReceiver,
    reader: Option<JoinHandle<()>>,
}

impl Connection {
    /// Takes ownership of an accepted socket and starts its reader thread.
    ///
    /// The socket is switched to blocking mode; the reader thread blocks in
    /// `read` and nowhere else.
    ///
    /// # Errors
    /// Returns [`TransportError::SocketSetup`] if the socket can't be
    /// configured or cloned, and [`TransportError::SpawnFailed`] if the
    /// thread can't be started.
    pub fn open(
        socket: TcpStream,
        peer_addr: SocketAddr,
        client_id: ClientId,
        config: &ConnectionConfig,
    ) -> Result<Self, TransportError> {
        socket
            .set_nonblocking(false)
            .map_err(TransportError::SocketSetup)?;
        socket
            .set_nodelay(config.nodelay)
            .map_err(TransportError::SocketSetup)?;
        socket
            .set_write_timeout(config.write_timeout)
            .map_err(TransportError::SocketSetup)?;

        let read_half = socket.try_clone().map_err(TransportError::SocketSetup)?;
        let shutdown_handle = socket.try_clone().map_err(TransportError::SocketSetup)?;

        let shared = Arc::new(Shared {
            client_id,
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            socket: shutdown_handle,
            reason: OnceLock::new(),
        });

        let (tx, rx) = inbound_queue();
        let max_payload_len = config.max_payload_len;
        let reader = thread::Builder::new()
            .name(format!("pestle-reader-{}", client_id.0))
            .spawn({
                let shared = Arc::clone(&shared);
                move || read_loop(read_half, peer_addr, shared, tx, max_payload_len)
            })
            .map_err(|e| {
                shared.close_socket();
                TransportError::SpawnFailed(e)
            })?;

        info!(%client_id, peer = %peer_addr, "connection opened");

        Ok(Self {
            client_id,
            peer_addr,
            shared,
            writer: Mutex::new(socket),
            inbound: rx,
            reader: Some(reader),
        })
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Whether the connection is still usable. Goes `false` once, never
    /// back.
    pub fn is_connected(&self) -> bool {
        self.shared.is_connected()
    }

    /// Why the connection stopped, if it has.
    pub fn disconnect_reason(&self) -> Option<&DisconnectReason> {
        self.shared.reason.get()
    }

    /// Writes one frame. Blocks until the whole frame is written; writes
    /// from different callers never interleave.
    ///
    /// # Errors
    /// - [`TransportError::Disconnected`] if the connection is already down.
    /// - [`TransportError::WriteFailed`] if the socket write fails. The
    ///   caller must tear the connection down.
    /// - [`TransportError::Protocol`] if the payload doesn't fit a frame.
    pub fn send(&self, type_id: u16, payload: &[u8]) -> Result<(), TransportError> {
        let frame = encode_frame(type_id, payload)?;
        self.write_frame(&frame)
    }

    /// Encodes and sends a registered packet.
    pub fn send_packet<P: Packet>(&self, packet: &P) -> Result<(), TransportError> {
        let raw = packet.to_raw();
        self.send(raw.type_id, &raw.payload)
    }

    fn write_frame(&self, frame: &[u8]) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Disconnected(self.client_id));
        }
        // A panic mid-write can only have come from this function, and the
        // stream itself holds no invariants we could have broken.
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer
            .write_all(frame)
            .map_err(|source| TransportError::WriteFailed {
                client_id: self.client_id,
                source,
            })?;
        trace!(client_id = %self.client_id, len = frame.len(), "frame written");
        Ok(())
    }

    /// Takes every packet the reader has queued so far, oldest first.
    /// Never blocks.
    pub fn drain_inbound(&mut self) -> Vec<RawPacket> {
        self.inbound.drain()
    }

    /// Tears the connection down: marks it disconnected, shuts the socket
    /// (once), and waits for the reader thread to exit.
    ///
    /// Idempotent. If the reader already failed, its reason is kept.
    pub fn close(&mut self, reason: DisconnectReason) {
        self.shared.disconnect(reason);
        if let Some(handle) = self.reader.take() {
            if handle.join().is_err() {
                warn!(client_id = %self.client_id, "reader thread panicked");
            }
            info!(
                client_id = %self.client_id,
                reason = %self.disconnect_reason().map(ToString::to_string).unwrap_or_default(),
                "connection closed"
            );
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close(DisconnectReason::ServerClosed);
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("client_id", &self.client_id)
            .field("peer_addr", &self.peer_addr)
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Reader thread
// ---------------------------------------------------------------------------

fn read_loop(
    mut stream: TcpStream,
    peer: SocketAddr,
    shared: Arc<Shared>,
    inbound: InboundSender,
    max_payload_len: usize,
) {
    let span = tracing::info_span!("reader", client_id = %shared.client_id, %peer);
    let _enter = span.enter();
    debug!("reader started");

    while shared.is_connected() {
        match read_frame(&mut stream, max_payload_len) {
            Ok(packet) => {
                trace!(type_id = packet.type_id, len = packet.byte_len(), "packet queued");
                if inbound.push(packet).is_err() {
                    debug!("inbound queue closed");
                    break;
                }
            }
            Err(e) => {
                let reason = if e.is_clean_close() {
                    DisconnectReason::PeerClosed
                } else {
                    DisconnectReason::ReadFailed(e.to_string())
                };
                // After a server-side close the read error is expected.
                if shared.is_connected() {
                    if e.is_clean_close() {
                        info!("peer closed connection");
                    } else {
                        warn!(error = %e, "read failed, dropping client");
                    }
                }
                shared.disconnect(reason);
                break;
            }
        }
    }

    debug!("reader stopped");
}
