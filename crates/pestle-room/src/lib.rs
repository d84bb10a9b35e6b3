//! World state for Pestle.
//!
//! The world is a map of actors owned by the single simulation task. The
//! network layer reaches it only through the [`RoomBridge`] trait, by id.
//!
//! # Key types
//!
//! - [`Actor`]: anything in the world; moving actors expose a [`Motion`]
//! - [`Player`], [`Projectile`], [`Prop`]: the concrete actors
//! - [`World`]: owns actors, advances them, reaps removed ones
//! - [`RoomBridge`]: id-based access used by the dispatcher
//! - [`WorldConfig`]: spawn area and projectile lifetime

mod actor;
mod bridge;
mod config;
mod error;
mod world;

pub use actor::{Actor, Motion, Player, Projectile, Prop};
pub use bridge::RoomBridge;
pub use config::WorldConfig;
pub use error::RoomError;
pub use world::World;
