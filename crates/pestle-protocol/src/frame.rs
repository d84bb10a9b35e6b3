//! The frame codec: how packets are delimited on a byte stream.
//!
//! Every packet on the wire is one frame:
//!
//! ```text
//! +-------------+---------------+---------------------+
//! | type id u16 | length u32    | payload             |
//! | (LE)        | (LE)          | (`length` bytes)    |
//! +-------------+---------------+---------------------+
//! ```
//!
//! Reading is all-or-nothing. [`read_frame`] either returns a complete
//! [`RawPacket`] or an error; a partially read frame is never handed out.

use std::io::{ErrorKind, Read};

use bytes::{BufMut, Bytes, BytesMut};

use crate::ProtocolError;

/// Size of the type id field.
pub const TYPE_ID_LEN: usize = 2;

/// Size of the length field.
pub const LENGTH_LEN: usize = 4;

/// Size of the full frame header.
pub const HEADER_LEN: usize = TYPE_ID_LEN + LENGTH_LEN;

/// Default upper bound on a single payload.
pub const DEFAULT_MAX_PAYLOAD_LEN: usize = 64 * 1024;

/// One framed packet, not yet decoded.
///
/// The payload is a [`Bytes`] buffer: it is freed when the last handle
/// drops, which is right after dispatch for inbound packets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPacket {
    pub type_id: u16,
    pub payload: Bytes,
}

impl RawPacket {
    pub fn new(type_id: u16, payload: impl Into<Bytes>) -> Self {
        Self {
            type_id,
            payload: payload.into(),
        }
    }

    /// The payload length as carried in the frame header.
    pub fn byte_len(&self) -> usize {
        self.payload.len()
    }

    /// Encodes this packet as a frame.
    pub fn to_frame(&self) -> Result<Bytes, ProtocolError> {
        encode_frame(self.type_id, &self.payload)
    }
}

/// Encodes a frame for a single write.
///
/// # Errors
/// Returns [`ProtocolError::FrameTooLarge`] if the payload length doesn't
/// fit the `u32` length field.
pub fn encode_frame(type_id: u16, payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let length = u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge {
        length: payload.len(),
        max: u32::MAX as usize,
    })?;

    let mut buf = BytesMut::with_capacity(HEADER_LEN + payload.len());
    buf.put_u16_le(type_id);
    buf.put_u32_le(length);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Reads exactly one frame from a blocking reader.
///
/// Performs three reads in order (type id, length, payload). The payload
/// buffer is allocated only after the declared length has been checked
/// against `max_payload_len`.
///
/// # Errors
/// - [`ProtocolError::TruncatedStream`] if the stream ends before any
///   field is complete (including a clean close between frames).
/// - [`ProtocolError::FrameTooLarge`] if the declared length exceeds
///   `max_payload_len`.
/// - [`ProtocolError::Io`] for any other read error.
pub fn read_frame<R: Read>(
    reader: &mut R,
    max_payload_len: usize,
) -> Result<RawPacket, ProtocolError> {
    let mut type_id = [0u8; TYPE_ID_LEN];
    read_field(reader, &mut type_id, "type id")?;
    let type_id = u16::from_le_bytes(type_id);

    let mut length = [0u8; LENGTH_LEN];
    read_field(reader, &mut length, "length")?;
    let length = u32::from_le_bytes(length) as usize;

    if length > max_payload_len {
        return Err(ProtocolError::FrameTooLarge {
            length,
            max: max_payload_len,
        });
    }

    let mut payload = BytesMut::zeroed(length);
    read_field(reader, &mut payload, "payload")?;

    tracing::trace!(type_id, length, "frame read");
    Ok(RawPacket {
        type_id,
        payload: payload.freeze(),
    })
}

/// Fills `buf` completely, counting bytes so a short read can report how
/// far it got.
fn read_field<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    field: &'static str,
) -> Result<(), ProtocolError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => {
                return Err(ProtocolError::TruncatedStream {
                    field,
                    expected: buf.len(),
                    received: filled,
                });
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                return Err(ProtocolError::TruncatedStream {
                    field,
                    expected: buf.len(),
                    received: filled,
                });
            }
            Err(e) => return Err(ProtocolError::Io(e)),
        }
    }
    Ok(())
}
