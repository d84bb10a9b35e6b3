//! The world: every live actor, keyed by id.

use std::collections::BTreeMap;

use pestle_protocol::{ActorId, ClientId, Vec2};
use rand::Rng;

use crate::{Actor, Player, RoomBridge, RoomError, WorldConfig};

/// Owns all actors. Lives on the simulation task and nowhere else.
///
/// Actors are kept in id order so iteration, and therefore broadcast
/// order, is deterministic.
pub struct World {
    config: WorldConfig,
    actors: BTreeMap<ActorId, Box<dyn Actor>>,
    next_actor_id: u32,
    tick: u64,
}

impl World {
    pub fn new(config: WorldConfig) -> Self {
        Self {
            config,
            actors: BTreeMap::new(),
            next_actor_id: 1,
            tick: 0,
        }
    }

    /// Number of live actors, including ones marked but not yet reaped.
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Ticks advanced so far.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// All live actors in ascending id order.
    pub fn actors(&self) -> impl Iterator<Item = &dyn Actor> {
        self.actors.values().map(|actor| actor.as_ref() as &dyn Actor)
    }

    /// A uniformly random point inside the configured spawn area.
    pub fn spawn_point(&self) -> Vec2 {
        let (min, max) = (self.config.spawn_min, self.config.spawn_max);
        let mut rng = rand::rng();
        Vec2::new(
            rng.random_range(min.x.min(max.x)..=min.x.max(max.x)),
            rng.random_range(min.y.min(max.y)..=min.y.max(max.y)),
        )
    }

    /// Creates the player actor for a newly admitted client.
    pub fn spawn_player(&mut self, client_id: ClientId) -> Result<ActorId, RoomError> {
        let id = self.new_actor_id();
        let position = self.spawn_point();
        self.new_actor(Box::new(Player::new(id, client_id, position)))
    }

    /// Flags an actor for removal at the end of the tick.
    ///
    /// # Errors
    /// [`RoomError::ActorNotFound`] if no live actor has that id.
    pub fn mark_for_removal(&mut self, id: ActorId) -> Result<(), RoomError> {
        let actor = self
            .actors
            .get_mut(&id)
            .ok_or(RoomError::ActorNotFound(id))?;
        actor.mark_for_removal();
        Ok(())
    }

    /// Advances every actor not already marked for removal by one tick.
    pub fn update(&mut self) {
        self.tick += 1;
        for actor in self.actors.values_mut() {
            if !actor.is_marked_for_removal() {
                actor.update();
            }
        }
    }

    /// Drops every actor marked for removal and returns their ids in
    /// ascending order.
    pub fn reap(&mut self) -> Vec<ActorId> {
        let doomed: Vec<ActorId> = self
            .actors
            .iter()
            .filter(|(_, actor)| actor.is_marked_for_removal())
            .map(|(id, _)| *id)
            .collect();

        for id in &doomed {
            if let Some(actor) = self.actors.remove(id) {
                tracing::info!(actor_id = %id, kind = ?actor.kind(), "actor removed");
            }
        }
        doomed
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl RoomBridge for World {
    fn actor(&self, id: ActorId) -> Option<&dyn Actor> {
        self.actors.get(&id).map(|actor| actor.as_ref() as &dyn Actor)
    }

    fn actor_mut(&mut self, id: ActorId) -> Option<&mut dyn Actor> {
        self.actors
            .get_mut(&id)
            .map(|actor| actor.as_mut() as &mut dyn Actor)
    }

    fn new_actor_id(&mut self) -> ActorId {
        let id = ActorId(self.next_actor_id);
        self.next_actor_id += 1;
        id
    }

    fn new_actor(&mut self, actor: Box<dyn Actor>) -> Result<ActorId, RoomError> {
        let id = actor.id();
        if self.actors.contains_key(&id) {
            return Err(RoomError::DuplicateActor(id));
        }
        tracing::info!(
            actor_id = %id,
            kind = ?actor.kind(),
            position = %actor.position(),
            "actor spawned"
        );
        self.actors.insert(id, actor);
        Ok(id)
    }

    fn config(&self) -> &WorldConfig {
        &self.config
    }
}
