//! Per-client TCP connections for Pestle.
//!
//! Each client gets:
//!
//! - a **reader thread** that blocks on the socket, frames packets with
//!   [`pestle_protocol::read_frame`], and pushes them onto
//! - an **inbound queue** ([`InboundSender`] / [`InboundReceiver`]) that the
//!   simulation drains once per tick, and
//! - a **write path** guarded by a mutex so whole frames never interleave.
//!
//! The [`Listener`] accepts sockets asynchronously; everything after accept
//! is plain blocking I/O on a dedicated thread.

mod connection;
mod error;
mod listener;
mod queue;

pub use connection::{Connection, ConnectionConfig, DisconnectReason};
pub use error::TransportError;
pub use listener::Listener;
pub use queue::{InboundReceiver, InboundSender, inbound_queue};
