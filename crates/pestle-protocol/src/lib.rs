//! Wire protocol for Pestle.
//!
//! This crate defines the bytes that travel between game clients and the
//! server:
//!
//! - **Frames** ([`encode_frame`], [`read_frame`], [`RawPacket`]): the
//!   length-prefixed envelope every packet travels in.
//! - **Packets** ([`Packet`], [`ActorMove`], [`ClientAction`], ...):
//!   fixed-layout payloads, and the registry ([`decode_packet`]) that maps a
//!   frame's type id to the right one.
//! - **Types** ([`ClientId`], [`ActorId`], [`Vec2`]): ids and geometry
//!   shared with the room and server layers.
//! - **Errors** ([`ProtocolError`]).
//!
//! # Architecture
//!
//! The protocol layer knows nothing about sockets, threads or the world. It
//! frames and decodes; the transport layer feeds it a blocking reader and
//! the server decides what a decoded packet means.
//!
//! ```text
//! Transport (socket) → Protocol (RawPacket → DecodedPacket) → Dispatcher (world)
//! ```

mod error;
mod frame;
pub mod packets;
mod types;

pub use error::ProtocolError;
pub use frame::{
    DEFAULT_MAX_PAYLOAD_LEN, HEADER_LEN, LENGTH_LEN, RawPacket, TYPE_ID_LEN, encode_frame,
    read_frame,
};
pub use packets::{
    Action, ActorKind, ActorMove, ActorRemoved, ActorSpawned, ClientAction, DecodedPacket,
    Direction, FieldKind, FieldSpec, Packet, PacketSchema, REGISTRY, Welcome, decode_packet,
    schema, type_ids,
};
pub use types::{ActorId, ClientId, Vec2};
