//! Error types for the protocol layer.
//!
//! Every failure while turning socket bytes into packets ends up here:
//! short reads while framing, oversized frames, payloads that don't match
//! their schema, and type ids nobody registered.

/// Errors that can occur while framing or decoding packets.
///
/// All variants except [`ProtocolError::Io`] are produced by the codec
/// itself. `Io` wraps socket errors that are not a simple short read
/// (for example a reset, or a read interrupted by the socket being shut
/// down during teardown).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The stream ended before a frame field was fully read.
    ///
    /// `field` names the part of the frame being read (`"type id"`,
    /// `"length"`, or `"payload"`), so a clean close between frames
    /// (`received == 0` on the type id) can be told apart from a peer
    /// dying mid-frame.
    #[error("truncated stream: read {received} of {expected} bytes of {field}")]
    TruncatedStream {
        field: &'static str,
        expected: usize,
        received: usize,
    },

    /// The frame header declares a payload larger than the configured limit.
    ///
    /// Checked before the payload buffer is allocated.
    #[error("frame of {length} bytes exceeds limit of {max} bytes")]
    FrameTooLarge { length: usize, max: usize },

    /// The payload is shorter than the schema registered for its type id.
    #[error("malformed packet {type_id:#06x}: need {expected} bytes, got {received}")]
    MalformedPacket {
        type_id: u16,
        expected: usize,
        received: usize,
    },

    /// The type id is not registered, or is registered but not accepted
    /// from clients.
    #[error("unknown packet type {0:#06x}")]
    UnknownPacketType(u16),

    /// An I/O error other than a short read.
    #[error("i/o error: {0}")]
    Io(#[source] std::io::Error),
}

impl ProtocolError {
    /// Returns `true` if the peer closed cleanly on a frame boundary.
    pub fn is_clean_close(&self) -> bool {
        matches!(
            self,
            Self::TruncatedStream {
                field: "type id",
                received: 0,
                ..
            }
        )
    }
}
