//! The `Actor` trait and the concrete actors the server spawns.
//!
//! Actors are owned by the [`World`](crate::World) and only ever touched by
//! the simulation task. Code outside the world holds an [`ActorId`] and
//! looks the actor up each time; it never keeps a reference across ticks.
//!
//! Capabilities are queried, not downcast: an actor that can move returns
//! its [`Motion`] from [`Actor::motion_mut`], a static one returns `None`.

use pestle_protocol::{ActorId, ActorKind, ClientId, Vec2};

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// Position and per-tick velocity of a moving actor.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    pub position: Vec2,
    pub velocity: Vec2,
}

impl Motion {
    pub fn new(position: Vec2, velocity: Vec2) -> Self {
        Self { position, velocity }
    }

    /// Advances one tick: `position += velocity`.
    pub fn step(&mut self) {
        self.position = self.position + self.velocity;
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// Anything that lives in the world.
///
/// The default methods describe a static actor. Moving actors override
/// [`motion`](Actor::motion) and [`motion_mut`](Actor::motion_mut); the
/// default [`update`](Actor::update) then integrates their velocity.
pub trait Actor: Send + 'static {
    fn id(&self) -> ActorId;

    fn kind(&self) -> ActorKind;

    fn position(&self) -> Vec2;

    /// Read-only view of the moving fields, if this actor moves.
    fn motion(&self) -> Option<&Motion> {
        None
    }

    /// Writable view of the moving fields, if this actor moves.
    fn motion_mut(&mut self) -> Option<&mut Motion> {
        None
    }

    /// Whether the world should drop this actor at the end of the tick.
    fn is_marked_for_removal(&self) -> bool;

    /// Flags the actor for removal. Idempotent; the world reaps it later.
    fn mark_for_removal(&mut self);

    /// Advances the actor by one tick.
    fn update(&mut self) {
        if let Some(motion) = self.motion_mut() {
            motion.step();
        }
    }
}

// ---------------------------------------------------------------------------
// Player
// ---------------------------------------------------------------------------

/// The actor a connected client controls.
#[derive(Debug, Clone)]
pub struct Player {
    id: ActorId,
    client_id: ClientId,
    motion: Motion,
    removed: bool,
}

impl Player {
    pub fn new(id: ActorId, client_id: ClientId, position: Vec2) -> Self {
        Self {
            id,
            client_id,
            motion: Motion::new(position, Vec2::ZERO),
            removed: false,
        }
    }

    /// The connection that owns this player.
    pub fn client_id(&self) -> ClientId {
        self.client_id
    }
}

impl Actor for Player {
    fn id(&self) -> ActorId {
        self.id
    }

    fn kind(&self) -> ActorKind {
        ActorKind::Player
    }

    fn position(&self) -> Vec2 {
        self.motion.position
    }

    fn motion(&self) -> Option<&Motion> {
        Some(&self.motion)
    }

    fn motion_mut(&mut self) -> Option<&mut Motion> {
        Some(&mut self.motion)
    }

    fn is_marked_for_removal(&self) -> bool {
        self.removed
    }

    fn mark_for_removal(&mut self) {
        self.removed = true;
    }
}

// ---------------------------------------------------------------------------
// Projectile
// ---------------------------------------------------------------------------

/// A shot. Flies in a straight line and expires after its time to live.
#[derive(Debug, Clone)]
pub struct Projectile {
    id: ActorId,
    owner: ActorId,
    motion: Motion,
    ttl: u32,
    removed: bool,
}

impl Projectile {
    pub fn new(id: ActorId, owner: ActorId, position: Vec2, velocity: Vec2, ttl: u32) -> Self {
        Self {
            id,
            owner,
            motion: Motion::new(position, velocity),
            ttl,
            removed: ttl == 0,
        }
    }

    /// The actor that fired it.
    pub fn owner(&self) -> ActorId {
        self.owner
    }

    /// Ticks left before it expires.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }
}

impl Actor for Projectile {
    fn id(&self) -> ActorId {
        self.id
    }

    fn kind(&self) -> ActorKind {
        ActorKind::Projectile
    }

    fn position(&self) -> Vec2 {
        self.motion.position
    }

    fn motion(&self) -> Option<&Motion> {
        Some(&self.motion)
    }

    fn motion_mut(&mut self) -> Option<&mut Motion> {
        Some(&mut self.motion)
    }

    fn is_marked_for_removal(&self) -> bool {
        self.removed
    }

    fn mark_for_removal(&mut self) {
        self.removed = true;
    }

    fn update(&mut self) {
        self.motion.step();
        self.ttl = self.ttl.saturating_sub(1);
        if self.ttl == 0 {
            self.removed = true;
        }
    }
}

// ---------------------------------------------------------------------------
// Prop
// ---------------------------------------------------------------------------

/// Static scenery. Has a position but can't be moved.
#[derive(Debug, Clone)]
pub struct Prop {
    id: ActorId,
    position: Vec2,
    removed: bool,
}

impl Prop {
    pub fn new(id: ActorId, position: Vec2) -> Self {
        Self {
            id,
            position,
            removed: false,
        }
    }
}

impl Actor for Prop {
    fn id(&self) -> ActorId {
        self.id
    }

    fn kind(&self) -> ActorKind {
        ActorKind::Prop
    }

    fn position(&self) -> Vec2 {
        self.position
    }

    fn is_marked_for_removal(&self) -> bool {
        self.removed
    }

    fn mark_for_removal(&mut self) {
        self.removed = true;
    }
}
