//! Error types for the room layer.

use pestle_protocol::ActorId;

/// Errors that can occur while editing the world.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoomError {
    /// An actor with this id is already registered.
    #[error("actor {0} already exists")]
    DuplicateActor(ActorId),

    /// No live actor has this id.
    #[error("actor {0} not found")]
    ActorNotFound(ActorId),
}
