use pestle_protocol::{ClientId, ProtocolError};

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Writing a frame to the socket failed. The connection must be torn
    /// down by whoever called `send`.
    #[error("write to {client_id} failed: {source}")]
    WriteFailed {
        client_id: ClientId,
        #[source]
        source: std::io::Error,
    },

    /// The connection is no longer connected.
    #[error("{0} is disconnected")]
    Disconnected(ClientId),

    /// Configuring the accepted socket failed.
    #[error("socket setup failed: {0}")]
    SocketSetup(#[source] std::io::Error),

    /// The reader thread could not be started.
    #[error("failed to spawn reader thread: {0}")]
    SpawnFailed(#[source] std::io::Error),

    /// Binding or accepting connections failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// Framing an outbound packet failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
