//! Integration tests driving the world through the `RoomBridge` seam.

use pestle_protocol::{ActorId, ActorKind, ClientId, Vec2};
use pestle_room::{Actor, Projectile, Prop, RoomBridge, World, WorldConfig};

/// Moves an actor the way the dispatcher does: look up, check capability,
/// overwrite.
fn apply_move(bridge: &mut impl RoomBridge, id: ActorId, position: Vec2, velocity: Vec2) -> bool {
    let Some(actor) = bridge.actor_mut(id) else {
        return false;
    };
    let Some(motion) = actor.motion_mut() else {
        return false;
    };
    motion.position = position;
    motion.velocity = velocity;
    true
}

#[test]
fn test_moves_apply_only_to_moving_actors() {
    let mut world = World::default();
    let player = world.spawn_player(ClientId(1)).unwrap();
    let prop_id = world.new_actor_id();
    world
        .new_actor(Box::new(Prop::new(prop_id, Vec2::new(5.0, 5.0))))
        .unwrap();

    assert!(apply_move(&mut world, player, Vec2::new(1.0, 2.0), Vec2::ZERO));
    assert!(!apply_move(&mut world, prop_id, Vec2::ZERO, Vec2::ZERO));
    assert!(!apply_move(&mut world, ActorId(404), Vec2::ZERO, Vec2::ZERO));

    assert_eq!(world.actor(player).unwrap().position(), Vec2::new(1.0, 2.0));
    assert_eq!(world.actor(prop_id).unwrap().position(), Vec2::new(5.0, 5.0));
}

#[test]
fn test_projectile_lifecycle_through_bridge() {
    let config = WorldConfig {
        projectile_ttl_ticks: 5,
        ..WorldConfig::default()
    };
    let mut world = World::new(config);

    let id = world.new_actor_id();
    let ttl = world.config().projectile_ttl_ticks;
    world
        .new_actor(Box::new(Projectile::new(
            id,
            ActorId(1),
            Vec2::ZERO,
            Vec2::new(0.2, 0.0),
            ttl,
        )))
        .unwrap();
    assert_eq!(world.actor(id).unwrap().kind(), ActorKind::Projectile);

    let mut reaped = Vec::new();
    for _ in 0..5 {
        world.update();
        reaped.extend(world.reap());
    }

    assert_eq!(reaped, vec![id]);
    assert!(world.is_empty());
}

#[test]
fn test_reaped_ids_are_never_reissued() {
    let mut world = World::default();
    let first = world.spawn_player(ClientId(1)).unwrap();
    world.mark_for_removal(first).unwrap();
    world.reap();

    let second = world.spawn_player(ClientId(2)).unwrap();
    assert!(second > first);
    assert!(world.actor(first).is_none());
}
