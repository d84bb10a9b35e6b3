//! Packet schemas and the type registry.
//!
//! Each packet kind is a fixed-layout struct implementing [`Packet`]. The
//! registry ([`REGISTRY`], [`schema`], [`decode_packet`]) maps the type id
//! from a frame header to the schema that decodes its payload.
//!
//! The registry is closed: adding a packet kind means adding a struct, an
//! entry in [`REGISTRY`], and a variant in [`DecodedPacket`].

use bytes::{Buf, BufMut, BytesMut};

use crate::{ActorId, ClientId, ProtocolError, RawPacket, Vec2};

// ---------------------------------------------------------------------------
// Type ids
// ---------------------------------------------------------------------------

/// Frame type ids of the registered packet kinds.
pub mod type_ids {
    pub const ACTOR_MOVE: u16 = 1;
    pub const CLIENT_ACTION: u16 = 2;
    pub const WELCOME: u16 = 3;
    pub const ACTOR_SPAWNED: u16 = 4;
    pub const ACTOR_REMOVED: u16 = 5;
}

// ---------------------------------------------------------------------------
// Schema description
// ---------------------------------------------------------------------------

/// Wire type of a single payload field. All multi-byte fields are
/// little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    U8,
    U32,
    F64,
}

impl FieldKind {
    pub const fn size(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U32 => 4,
            Self::F64 => 8,
        }
    }
}

/// One named field of a payload layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn field(name: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { name, kind }
}

/// Which side is allowed to send a packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    ClientToServer,
    ServerToClient,
    Bidirectional,
}

impl Direction {
    /// Whether the server accepts this packet kind from a client.
    pub fn accepted_from_client(self) -> bool {
        matches!(self, Self::ClientToServer | Self::Bidirectional)
    }
}

/// The registered layout of one packet kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketSchema {
    pub type_id: u16,
    pub name: &'static str,
    pub direction: Direction,
    pub fields: &'static [FieldSpec],
}

impl PacketSchema {
    /// Minimum payload length for this schema.
    pub const fn wire_len(&self) -> usize {
        let mut len = 0;
        let mut i = 0;
        while i < self.fields.len() {
            len += self.fields[i].kind.size();
            i += 1;
        }
        len
    }
}

// ---------------------------------------------------------------------------
// Packet trait
// ---------------------------------------------------------------------------

/// A fixed-layout payload with a registered type id.
pub trait Packet: Sized {
    /// The schema this packet is registered under.
    const SCHEMA: PacketSchema;

    /// The frame type id.
    const TYPE_ID: u16 = Self::SCHEMA.type_id;

    /// Writes the payload fields in schema order.
    fn encode_body(&self, dst: &mut impl BufMut);

    /// Reads the payload fields in schema order. Only called once the
    /// source is known to hold at least `SCHEMA.wire_len()` bytes.
    fn decode_body(src: &mut impl Buf) -> Self;

    /// Decodes a payload, checking its length against the schema first.
    ///
    /// Bytes past the end of the schema are ignored.
    ///
    /// # Errors
    /// Returns [`ProtocolError::MalformedPacket`] if the payload is
    /// shorter than the schema.
    fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let expected = Self::SCHEMA.wire_len();
        if payload.len() < expected {
            return Err(ProtocolError::MalformedPacket {
                type_id: Self::TYPE_ID,
                expected,
                received: payload.len(),
            });
        }
        if payload.len() > expected {
            tracing::trace!(
                type_id = Self::TYPE_ID,
                extra = payload.len() - expected,
                "ignoring trailing payload bytes"
            );
        }
        let mut src = payload;
        Ok(Self::decode_body(&mut src))
    }

    /// Encodes this packet as a raw record ready to be framed.
    fn to_raw(&self) -> RawPacket {
        let mut buf = BytesMut::with_capacity(Self::SCHEMA.wire_len());
        self.encode_body(&mut buf);
        RawPacket::new(Self::TYPE_ID, buf.freeze())
    }
}

// ---------------------------------------------------------------------------
// Packet kinds
// ---------------------------------------------------------------------------

/// Position and velocity of a moving actor.
///
/// Sent by clients to move the actors they simulate, and broadcast by the
/// server every tick for every moving actor. No sequence number is carried,
/// so the last one applied wins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorMove {
    pub actor_id: ActorId,
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Packet for ActorMove {
    const SCHEMA: PacketSchema = PacketSchema {
        type_id: type_ids::ACTOR_MOVE,
        name: "ActorMove",
        direction: Direction::Bidirectional,
        fields: &[
            field("actor_id", FieldKind::U32),
            field("px", FieldKind::F64),
            field("py", FieldKind::F64),
            field("vx", FieldKind::F64),
            field("vy", FieldKind::F64),
        ],
    };

    fn encode_body(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.actor_id.0);
        dst.put_f64_le(self.position.x);
        dst.put_f64_le(self.position.y);
        dst.put_f64_le(self.velocity.x);
        dst.put_f64_le(self.velocity.y);
    }

    fn decode_body(src: &mut impl Buf) -> Self {
        let actor_id = ActorId(src.get_u32_le());
        let position = Vec2::new(src.get_f64_le(), src.get_f64_le());
        let velocity = Vec2::new(src.get_f64_le(), src.get_f64_le());
        Self {
            actor_id,
            position,
            velocity,
        }
    }
}

/// What a client asked its actor to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    None,
    Shoot,
    /// A byte outside the known range. Logged and ignored on dispatch.
    Unrecognized(u8),
}

impl Action {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Shoot => 1,
            Self::Unrecognized(b) => b,
        }
    }
}

impl From<u8> for Action {
    fn from(b: u8) -> Self {
        match b {
            0 => Self::None,
            1 => Self::Shoot,
            other => Self::Unrecognized(other),
        }
    }
}

/// An action aimed at a point in the world. The acting actor is always the
/// sender's own actor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClientAction {
    pub action: Action,
    pub target: Vec2,
}

impl Packet for ClientAction {
    const SCHEMA: PacketSchema = PacketSchema {
        type_id: type_ids::CLIENT_ACTION,
        name: "ClientAction",
        direction: Direction::ClientToServer,
        fields: &[
            field("action", FieldKind::U8),
            field("world_x", FieldKind::F64),
            field("world_y", FieldKind::F64),
        ],
    };

    fn encode_body(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.action.as_u8());
        dst.put_f64_le(self.target.x);
        dst.put_f64_le(self.target.y);
    }

    fn decode_body(src: &mut impl Buf) -> Self {
        let action = Action::from(src.get_u8());
        let target = Vec2::new(src.get_f64_le(), src.get_f64_le());
        Self { action, target }
    }
}

/// Sent once after accept: which client id the peer has and which actor
/// it controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Welcome {
    pub client_id: ClientId,
    pub actor_id: ActorId,
}

impl Packet for Welcome {
    const SCHEMA: PacketSchema = PacketSchema {
        type_id: type_ids::WELCOME,
        name: "Welcome",
        direction: Direction::ServerToClient,
        fields: &[
            field("client_id", FieldKind::U32),
            field("actor_id", FieldKind::U32),
        ],
    };

    fn encode_body(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.client_id.0);
        dst.put_u32_le(self.actor_id.0);
    }

    fn decode_body(src: &mut impl Buf) -> Self {
        Self {
            client_id: ClientId(src.get_u32_le()),
            actor_id: ActorId(src.get_u32_le()),
        }
    }
}

/// Actor categories known to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActorKind {
    Player,
    Projectile,
    Prop,
}

impl ActorKind {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Player => 0,
            Self::Projectile => 1,
            Self::Prop => 2,
        }
    }

    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Player),
            1 => Some(Self::Projectile),
            2 => Some(Self::Prop),
            _ => None,
        }
    }
}

/// A new actor appeared in the world.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorSpawned {
    pub actor_id: ActorId,
    /// Raw [`ActorKind`] byte; see [`ActorSpawned::kind`].
    pub kind: u8,
    pub position: Vec2,
}

impl ActorSpawned {
    pub fn new(actor_id: ActorId, kind: ActorKind, position: Vec2) -> Self {
        Self {
            actor_id,
            kind: kind.as_u8(),
            position,
        }
    }

    pub fn kind(&self) -> Option<ActorKind> {
        ActorKind::from_u8(self.kind)
    }
}

impl Packet for ActorSpawned {
    const SCHEMA: PacketSchema = PacketSchema {
        type_id: type_ids::ACTOR_SPAWNED,
        name: "ActorSpawned",
        direction: Direction::ServerToClient,
        fields: &[
            field("actor_id", FieldKind::U32),
            field("kind", FieldKind::U8),
            field("px", FieldKind::F64),
            field("py", FieldKind::F64),
        ],
    };

    fn encode_body(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.actor_id.0);
        dst.put_u8(self.kind);
        dst.put_f64_le(self.position.x);
        dst.put_f64_le(self.position.y);
    }

    fn decode_body(src: &mut impl Buf) -> Self {
        let actor_id = ActorId(src.get_u32_le());
        let kind = src.get_u8();
        let position = Vec2::new(src.get_f64_le(), src.get_f64_le());
        Self {
            actor_id,
            kind,
            position,
        }
    }
}

/// An actor left the world (reaped, or its client disconnected).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorRemoved {
    pub actor_id: ActorId,
}

impl Packet for ActorRemoved {
    const SCHEMA: PacketSchema = PacketSchema {
        type_id: type_ids::ACTOR_REMOVED,
        name: "ActorRemoved",
        direction: Direction::ServerToClient,
        fields: &[field("actor_id", FieldKind::U32)],
    };

    fn encode_body(&self, dst: &mut impl BufMut) {
        dst.put_u32_le(self.actor_id.0);
    }

    fn decode_body(src: &mut impl Buf) -> Self {
        Self {
            actor_id: ActorId(src.get_u32_le()),
        }
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Every registered packet kind, in type id order.
pub static REGISTRY: &[PacketSchema] = &[
    ActorMove::SCHEMA,
    ClientAction::SCHEMA,
    Welcome::SCHEMA,
    ActorSpawned::SCHEMA,
    ActorRemoved::SCHEMA,
];

/// Looks up the schema registered for `type_id`.
pub fn schema(type_id: u16) -> Option<&'static PacketSchema> {
    REGISTRY.iter().find(|s| s.type_id == type_id)
}

/// A payload decoded through the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPacket {
    ActorMove(ActorMove),
    ClientAction(ClientAction),
    Welcome(Welcome),
    ActorSpawned(ActorSpawned),
    ActorRemoved(ActorRemoved),
}

impl DecodedPacket {
    pub fn type_id(&self) -> u16 {
        match self {
            Self::ActorMove(_) => ActorMove::TYPE_ID,
            Self::ClientAction(_) => ClientAction::TYPE_ID,
            Self::Welcome(_) => Welcome::TYPE_ID,
            Self::ActorSpawned(_) => ActorSpawned::TYPE_ID,
            Self::ActorRemoved(_) => ActorRemoved::TYPE_ID,
        }
    }
}

/// Decodes a raw packet into its registered payload type.
///
/// # Errors
/// - [`ProtocolError::UnknownPacketType`] if no schema is registered for
///   the type id.
/// - [`ProtocolError::MalformedPacket`] if the payload is too short.
pub fn decode_packet(raw: &RawPacket) -> Result<DecodedPacket, ProtocolError> {
    let payload = raw.payload.as_ref();
    match raw.type_id {
        type_ids::ACTOR_MOVE => ActorMove::decode(payload).map(DecodedPacket::ActorMove),
        type_ids::CLIENT_ACTION => ClientAction::decode(payload).map(DecodedPacket::ClientAction),
        type_ids::WELCOME => Welcome::decode(payload).map(DecodedPacket::Welcome),
        type_ids::ACTOR_SPAWNED => ActorSpawned::decode(payload).map(DecodedPacket::ActorSpawned),
        type_ids::ACTOR_REMOVED => ActorRemoved::decode(payload).map(DecodedPacket::ActorRemoved),
        other => Err(ProtocolError::UnknownPacketType(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_lengths_match_layout() {
        assert_eq!(ActorMove::SCHEMA.wire_len(), 36);
        assert_eq!(ClientAction::SCHEMA.wire_len(), 17);
        assert_eq!(Welcome::SCHEMA.wire_len(), 8);
        assert_eq!(ActorSpawned::SCHEMA.wire_len(), 21);
        assert_eq!(ActorRemoved::SCHEMA.wire_len(), 4);
    }

    #[test]
    fn test_registry_ids_are_unique_and_ordered() {
        for pair in REGISTRY.windows(2) {
            assert!(pair[0].type_id < pair[1].type_id);
        }
    }

    #[test]
    fn test_schema_lookup() {
        assert_eq!(schema(2).map(|s| s.name), Some("ClientAction"));
        assert!(schema(0xFFFF).is_none());
    }

    #[test]
    fn test_encoded_length_matches_schema() {
        let mv = ActorMove {
            actor_id: ActorId(1),
            position: Vec2::ZERO,
            velocity: Vec2::ZERO,
        };
        assert_eq!(mv.to_raw().byte_len(), ActorMove::SCHEMA.wire_len());

        let spawned = ActorSpawned::new(ActorId(2), ActorKind::Prop, Vec2::ZERO);
        assert_eq!(spawned.to_raw().byte_len(), ActorSpawned::SCHEMA.wire_len());
    }

    #[test]
    fn test_actor_move_field_order() {
        let mv = ActorMove {
            actor_id: ActorId(0x0A0B0C0D),
            position: Vec2::new(1.0, 2.0),
            velocity: Vec2::new(3.0, 4.0),
        };
        let raw = mv.to_raw();
        let bytes = raw.payload.as_ref();
        assert_eq!(&bytes[0..4], &[0x0D, 0x0C, 0x0B, 0x0A]);
        assert_eq!(&bytes[4..12], &1.0f64.to_le_bytes());
        assert_eq!(&bytes[28..36], &4.0f64.to_le_bytes());
    }

    #[test]
    fn test_decode_registered_packet() {
        let action = ClientAction {
            action: Action::Shoot,
            target: Vec2::new(10.0, -2.5),
        };
        let decoded = decode_packet(&action.to_raw()).unwrap();
        assert_eq!(decoded, DecodedPacket::ClientAction(action));
        assert_eq!(decoded.type_id(), ClientAction::TYPE_ID);
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let raw = RawPacket::new(ActorMove::TYPE_ID, vec![0u8; 20]);
        let err = decode_packet(&raw).unwrap_err();
        assert!(matches!(
            err,
            ProtocolError::MalformedPacket {
                type_id: 1,
                expected: 36,
                received: 20,
            }
        ));
    }

    #[test]
    fn test_trailing_bytes_ignored() {
        let removed = ActorRemoved {
            actor_id: ActorId(9),
        };
        let mut payload = removed.to_raw().payload.to_vec();
        payload.extend_from_slice(&[0xEE; 3]);

        let decoded = decode_packet(&RawPacket::new(ActorRemoved::TYPE_ID, payload)).unwrap();
        assert_eq!(decoded, DecodedPacket::ActorRemoved(removed));
    }

    #[test]
    fn test_unregistered_type_id() {
        let err = decode_packet(&RawPacket::new(0xFFFF, vec![])).unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacketType(0xFFFF)));
    }

    #[test]
    fn test_action_byte_mapping() {
        assert_eq!(Action::from(0), Action::None);
        assert_eq!(Action::from(1), Action::Shoot);
        assert_eq!(Action::from(9), Action::Unrecognized(9));
        assert_eq!(Action::Unrecognized(9).as_u8(), 9);
    }

    #[test]
    fn test_direction_filter() {
        assert!(ActorMove::SCHEMA.direction.accepted_from_client());
        assert!(ClientAction::SCHEMA.direction.accepted_from_client());
        assert!(!Welcome::SCHEMA.direction.accepted_from_client());
        assert!(!ActorRemoved::SCHEMA.direction.accepted_from_client());
    }
}
