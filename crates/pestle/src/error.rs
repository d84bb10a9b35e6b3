//! Unified error type for the Pestle server.

use pestle_protocol::ProtocolError;
use pestle_room::RoomError;
use pestle_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The `#[from]` conversions let `?` lift sub-crate errors without
/// mapping at each call site.
#[derive(Debug, thiserror::Error)]
pub enum PestleError {
    /// Socket, accept, or write failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Framing or decoding failure.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// World edit failure.
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A socket arrived while every client slot was taken.
    #[error("server full ({max_clients} clients)")]
    ServerFull { max_clients: usize },
}
