//! Applies decoded client packets to the world.
//!
//! Runs on the simulation task only, one packet at a time. The dispatcher
//! reaches actors through [`RoomBridge`] by id and never keeps a reference
//! past the call.
//!
//! | Packet             | Effect                                             |
//! |--------------------|----------------------------------------------------|
//! | `ActorMove`        | overwrite position and velocity of a moving actor |
//! | `ClientAction` 0   | nothing (logged)                                   |
//! | `ClientAction` 1   | spawn a projectile toward the target              |
//! | anything else      | [`ProtocolError::UnknownPacketType`], fatal        |

use pestle_protocol::{
    Action, ActorId, ActorMove, ClientAction, ClientId, DecodedPacket, ProtocolError, RawPacket,
    Vec2, decode_packet, schema,
};
use pestle_room::{Projectile, RoomBridge};
use tracing::{debug, info, trace, warn};

use crate::DispatchConfig;

/// Who a packet came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sender {
    pub client_id: ClientId,
    /// The sender's player actor.
    pub actor_id: ActorId,
}

/// What a successfully dispatched packet did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// An actor's motion was overwritten.
    Moved(ActorId),
    /// A new actor was added to the world.
    Spawned(ActorId),
    /// The packet was valid but had no effect.
    Ignored,
}

/// Turns client packets into world edits.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(config: DispatchConfig) -> Self {
        Self { config }
    }

    /// Decodes `packet` and applies it on behalf of `sender`.
    ///
    /// # Errors
    /// Every error is fatal to the sender's connection:
    /// - [`ProtocolError::UnknownPacketType`] for ids missing from the
    ///   registry and for registered server-to-client packets.
    /// - [`ProtocolError::MalformedPacket`] for short payloads.
    pub fn dispatch(
        &self,
        world: &mut impl RoomBridge,
        sender: Sender,
        packet: &RawPacket,
    ) -> Result<DispatchOutcome, ProtocolError> {
        let accepted = schema(packet.type_id).is_some_and(|s| s.direction.accepted_from_client());
        if !accepted {
            return Err(ProtocolError::UnknownPacketType(packet.type_id));
        }

        match decode_packet(packet)? {
            DecodedPacket::ActorMove(mv) => Ok(apply_move(world, sender, mv)),
            DecodedPacket::ClientAction(action) => Ok(self.apply_action(world, sender, action)),
            other => Err(ProtocolError::UnknownPacketType(other.type_id())),
        }
    }

    fn apply_action(
        &self,
        world: &mut impl RoomBridge,
        sender: Sender,
        action: ClientAction,
    ) -> DispatchOutcome {
        match action.action {
            Action::None => {
                info!(client_id = %sender.client_id, "client action: none");
                DispatchOutcome::Ignored
            }
            Action::Shoot => self.shoot(world, sender, action.target),
            Action::Unrecognized(code) => {
                debug!(client_id = %sender.client_id, code, "unrecognized action dropped");
                DispatchOutcome::Ignored
            }
        }
    }

    /// Fires a projectile from the sender's actor toward `target`.
    fn shoot(&self, world: &mut impl RoomBridge, sender: Sender, target: Vec2) -> DispatchOutcome {
        let Some(shooter) = world.actor(sender.actor_id) else {
            debug!(
                client_id = %sender.client_id,
                actor_id = %sender.actor_id,
                "shot from missing actor dropped"
            );
            return DispatchOutcome::Ignored;
        };
        let origin = shooter.position();

        // Zero distance has no direction.
        let Some(direction) = origin.direction_to(target) else {
            debug!(client_id = %sender.client_id, %target, "shot at own position ignored");
            return DispatchOutcome::Ignored;
        };

        let id = world.new_actor_id();
        let ttl = world.config().projectile_ttl_ticks;
        let velocity = direction * self.config.projectile_speed;
        let projectile = Projectile::new(id, sender.actor_id, origin, velocity, ttl);

        match world.new_actor(Box::new(projectile)) {
            Ok(id) => {
                trace!(client_id = %sender.client_id, actor_id = %id, %velocity, "projectile spawned");
                DispatchOutcome::Spawned(id)
            }
            Err(e) => {
                warn!(client_id = %sender.client_id, error = %e, "projectile spawn failed");
                DispatchOutcome::Ignored
            }
        }
    }
}

/// Overwrites an actor's motion. Last write wins; there is no sequence
/// number to reject stale moves.
fn apply_move(world: &mut impl RoomBridge, sender: Sender, mv: ActorMove) -> DispatchOutcome {
    let Some(actor) = world.actor_mut(mv.actor_id) else {
        debug!(
            client_id = %sender.client_id,
            actor_id = %mv.actor_id,
            "move for unknown actor dropped"
        );
        return DispatchOutcome::Ignored;
    };
    let Some(motion) = actor.motion_mut() else {
        debug!(
            client_id = %sender.client_id,
            actor_id = %mv.actor_id,
            "move for static actor dropped"
        );
        return DispatchOutcome::Ignored;
    };

    motion.position = mv.position;
    motion.velocity = mv.velocity;
    trace!(actor_id = %mv.actor_id, position = %mv.position, "actor moved");
    DispatchOutcome::Moved(mv.actor_id)
}

#[cfg(test)]
mod tests {
    use pestle_protocol::{ActorKind, Packet, Welcome, type_ids};
    use pestle_room::{Actor, Player, Prop, World, WorldConfig};

    use super::*;

    fn world_with_player_at(position: Vec2) -> (World, Sender) {
        let mut world = World::new(WorldConfig {
            spawn_min: position,
            spawn_max: position,
            ..WorldConfig::default()
        });
        let client_id = ClientId(1);
        let actor_id = world.new_actor_id();
        world
            .new_actor(Box::new(Player::new(actor_id, client_id, position)))
            .unwrap();
        (
            world,
            Sender {
                client_id,
                actor_id,
            },
        )
    }

    fn shoot_at(target: Vec2) -> RawPacket {
        ClientAction {
            action: Action::Shoot,
            target,
        }
        .to_raw()
    }

    #[test]
    fn test_shoot_spawns_projectile_toward_target() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let dispatcher = Dispatcher::default();

        let outcome = dispatcher
            .dispatch(&mut world, sender, &shoot_at(Vec2::new(10.0, 0.0)))
            .unwrap();

        let DispatchOutcome::Spawned(id) = outcome else {
            panic!("expected a spawn, got {outcome:?}");
        };
        let projectile = world.actor(id).unwrap();
        assert_eq!(projectile.kind(), ActorKind::Projectile);
        assert_eq!(projectile.position(), Vec2::ZERO);
        let motion = projectile.motion().unwrap();
        assert!((motion.velocity.x - 0.2).abs() < 1e-12);
        assert_eq!(motion.velocity.y, 0.0);
    }

    #[test]
    fn test_shoot_at_own_position_is_noop() {
        let (mut world, sender) = world_with_player_at(Vec2::new(3.0, 4.0));
        let dispatcher = Dispatcher::default();

        let outcome = dispatcher
            .dispatch(&mut world, sender, &shoot_at(Vec2::new(3.0, 4.0)))
            .unwrap();

        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_projectile_speed_is_configurable() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let dispatcher = Dispatcher::new(DispatchConfig {
            projectile_speed: 1.5,
        });

        let DispatchOutcome::Spawned(id) = dispatcher
            .dispatch(&mut world, sender, &shoot_at(Vec2::new(0.0, -4.0)))
            .unwrap()
        else {
            panic!("expected a spawn");
        };
        let velocity = world.actor(id).unwrap().motion().unwrap().velocity;
        assert_eq!(velocity, Vec2::new(0.0, -1.5));
    }

    #[test]
    fn test_action_none_is_noop() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let raw = ClientAction {
            action: Action::None,
            target: Vec2::new(1.0, 1.0),
        }
        .to_raw();

        let outcome = Dispatcher::default().dispatch(&mut world, sender, &raw).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(world.len(), 1);
    }

    #[test]
    fn test_unrecognized_action_is_dropped() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let mut payload = vec![9u8];
        payload.extend_from_slice(&1.0f64.to_le_bytes());
        payload.extend_from_slice(&1.0f64.to_le_bytes());
        let raw = RawPacket::new(type_ids::CLIENT_ACTION, payload);

        let outcome = Dispatcher::default().dispatch(&mut world, sender, &raw).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
    }

    #[test]
    fn test_move_overwrites_motion() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let raw = ActorMove {
            actor_id: sender.actor_id,
            position: Vec2::new(5.0, 6.0),
            velocity: Vec2::new(0.5, 0.0),
        }
        .to_raw();

        let outcome = Dispatcher::default().dispatch(&mut world, sender, &raw).unwrap();

        assert_eq!(outcome, DispatchOutcome::Moved(sender.actor_id));
        let motion = *world.actor(sender.actor_id).unwrap().motion().unwrap();
        assert_eq!(motion.position, Vec2::new(5.0, 6.0));
        assert_eq!(motion.velocity, Vec2::new(0.5, 0.0));
    }

    #[test]
    fn test_move_for_missing_actor_is_noop() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let raw = ActorMove {
            actor_id: ActorId(999),
            position: Vec2::new(5.0, 6.0),
            velocity: Vec2::ZERO,
        }
        .to_raw();

        let outcome = Dispatcher::default().dispatch(&mut world, sender, &raw).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(world.actor(sender.actor_id).unwrap().position(), Vec2::ZERO);
    }

    #[test]
    fn test_move_for_static_actor_is_noop() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let prop_id = world.new_actor_id();
        world
            .new_actor(Box::new(Prop::new(prop_id, Vec2::new(2.0, 2.0))))
            .unwrap();
        let raw = ActorMove {
            actor_id: prop_id,
            position: Vec2::ZERO,
            velocity: Vec2::new(1.0, 1.0),
        }
        .to_raw();

        let outcome = Dispatcher::default().dispatch(&mut world, sender, &raw).unwrap();
        assert_eq!(outcome, DispatchOutcome::Ignored);
        assert_eq!(world.actor(prop_id).unwrap().position(), Vec2::new(2.0, 2.0));
    }

    #[test]
    fn test_unregistered_type_is_fatal() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let raw = RawPacket::new(0xFFFF, vec![0u8; 8]);

        let err = Dispatcher::default()
            .dispatch(&mut world, sender, &raw)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacketType(0xFFFF)));
    }

    #[test]
    fn test_server_only_packet_from_client_is_fatal() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let raw = Welcome {
            client_id: ClientId(1),
            actor_id: ActorId(1),
        }
        .to_raw();

        let err = Dispatcher::default()
            .dispatch(&mut world, sender, &raw)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::UnknownPacketType(t) if t == type_ids::WELCOME));
    }

    #[test]
    fn test_short_payload_is_malformed() {
        let (mut world, sender) = world_with_player_at(Vec2::ZERO);
        let raw = RawPacket::new(type_ids::ACTOR_MOVE, vec![0u8; 10]);

        let err = Dispatcher::default()
            .dispatch(&mut world, sender, &raw)
            .unwrap_err();
        assert!(matches!(err, ProtocolError::MalformedPacket { .. }));
    }
}
