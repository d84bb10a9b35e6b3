//! The seam between the network layer and world state.
//!
//! The dispatcher only needs to look actors up by id, mint new ids, and
//! register new actors. It does that through this trait, so it can be
//! driven by the real [`World`](crate::World) or by a small fake in tests.

use pestle_protocol::ActorId;

use crate::{Actor, RoomError, WorldConfig};

/// World access available to the simulation task.
///
/// Only the simulation task holds a `RoomBridge`. Reader threads never see
/// one; the most they do is flip a connection's flag, which the simulation
/// turns into [`Actor::mark_for_removal`] on its next step.
pub trait RoomBridge {
    /// Looks up a live actor. `None` if the id was never issued or the actor
    /// has already been reaped.
    fn actor(&self, id: ActorId) -> Option<&dyn Actor>;

    /// Mutable lookup, same rules as [`actor`](RoomBridge::actor).
    fn actor_mut(&mut self, id: ActorId) -> Option<&mut dyn Actor>;

    /// Reserves a fresh actor id. Ids are never reused.
    fn new_actor_id(&mut self) -> ActorId;

    /// Registers an actor under its own [`Actor::id`].
    ///
    /// # Errors
    /// [`RoomError::DuplicateActor`] if that id is already live.
    fn new_actor(&mut self, actor: Box<dyn Actor>) -> Result<ActorId, RoomError>;

    /// World settings, e.g. how long spawned projectiles live.
    fn config(&self) -> &WorldConfig;
}
