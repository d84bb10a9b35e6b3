//! The simulation: world state, connected clients, and the per-tick step.
//!
//! Everything here runs on one task. Reader threads only fill inbound
//! queues and flip connection flags; this module is where those flags turn
//! into teardown and actor removal.
//!
//! Each [`step`](Simulation::step), in order:
//!
//! 1. admit sockets accepted since the last step
//! 2. for each client in ascending id: drain and dispatch its packets, then
//!    tear it down if its reader had already stopped
//! 3. broadcast spawns caused by dispatch
//! 4. advance the world one tick
//! 5. broadcast `ActorMove` for every moving actor
//! 6. reap removed actors and broadcast `ActorRemoved`

use std::net::{SocketAddr, TcpStream};

use pestle_protocol::{
    ActorId, ActorMove, ActorRemoved, ActorSpawned, ClientId, Packet, RawPacket, Welcome,
};
use pestle_room::{Actor, RoomBridge, World};
use pestle_transport::{Connection, ConnectionConfig, DisconnectReason};
use tracing::{debug, info, warn};

use crate::dispatch::{DispatchOutcome, Dispatcher, Sender};
use crate::registry::ConnectionRegistry;
use crate::{PestleError, ServerConfig};

/// What one [`Simulation::step`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    pub admitted: Vec<ClientId>,
    pub dispatched: usize,
    pub torn_down: Vec<ClientId>,
    pub spawned: Vec<ActorId>,
    pub removed: Vec<ActorId>,
}

/// Owns the world and every connection.
pub struct Simulation {
    world: World,
    registry: ConnectionRegistry,
    dispatcher: Dispatcher,
    connection_config: ConnectionConfig,
    pending: Vec<(TcpStream, SocketAddr)>,
}

impl Simulation {
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            world: World::new(config.world.clone()),
            registry: ConnectionRegistry::new(config.max_clients),
            dispatcher: Dispatcher::new(config.dispatch.clone()),
            connection_config: config.connection.clone(),
            pending: Vec::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access, e.g. to place props before clients connect.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Queues an accepted socket for admission on the next step.
    pub fn queue_socket(&mut self, socket: TcpStream, peer: SocketAddr) {
        self.pending.push((socket, peer));
    }

    // -----------------------------------------------------------------------
    // Step
    // -----------------------------------------------------------------------

    /// Runs one tick.
    pub fn step(&mut self) -> StepReport {
        let mut report = StepReport::default();

        for (socket, peer) in std::mem::take(&mut self.pending) {
            match self.admit(socket, peer, &mut report) {
                Ok(client_id) => report.admitted.push(client_id),
                Err(e) => warn!(%peer, error = %e, "client rejected"),
            }
        }

        self.drain_all(&mut report);

        for id in report.spawned.clone() {
            if let Some(spawned) = self.world.actor(id).map(spawned_packet) {
                self.broadcast(&spawned.to_raw(), None, &mut report);
            }
        }

        self.world.update();

        let moves: Vec<RawPacket> = self
            .world
            .actors()
            .filter(|actor| !actor.is_marked_for_removal())
            .filter_map(|actor| {
                actor.motion().map(|motion| {
                    ActorMove {
                        actor_id: actor.id(),
                        position: motion.position,
                        velocity: motion.velocity,
                    }
                    .to_raw()
                })
            })
            .collect();
        for raw in &moves {
            self.broadcast(raw, None, &mut report);
        }

        // Removals are broadcast last so teardowns from this tick's
        // broadcasts are included.
        let removed = self.world.reap();
        for &actor_id in &removed {
            self.broadcast(&ActorRemoved { actor_id }.to_raw(), None, &mut report);
        }
        report.removed = removed;

        report
    }

    fn drain_all(&mut self, report: &mut StepReport) {
        for client_id in self.registry.client_ids() {
            let Some(entry) = self.registry.get_mut(client_id) else {
                continue;
            };
            // The reader queues every complete frame before it clears the
            // flag, so once the flag reads false the drain below sees all of
            // that client's remaining traffic.
            let reader_done = !entry.connection.is_connected();
            let sender = Sender {
                client_id,
                actor_id: entry.actor_id,
            };

            let mut rejected = false;
            for packet in entry.connection.drain_inbound() {
                match self.dispatcher.dispatch(&mut self.world, sender, &packet) {
                    Ok(DispatchOutcome::Spawned(id)) => {
                        report.dispatched += 1;
                        report.spawned.push(id);
                    }
                    Ok(_) => report.dispatched += 1,
                    Err(e) => {
                        warn!(%client_id, type_id = packet.type_id, error = %e, "dropping client");
                        self.teardown(client_id, DisconnectReason::Rejected(e.to_string()), report);
                        rejected = true;
                        break;
                    }
                }
            }

            if reader_done && !rejected {
                self.teardown(client_id, DisconnectReason::ServerClosed, report);
            }
        }
    }

    // -----------------------------------------------------------------------
    // Admission
    // -----------------------------------------------------------------------

    /// Registers a new client: opens its connection, spawns its player,
    /// sends it the current world, and announces it to everyone else.
    ///
    /// Clients whose write fails during the announcement are torn down and
    /// recorded in `report`.
    ///
    /// # Errors
    /// [`PestleError::ServerFull`] if every slot is taken (the socket is
    /// closed), or a transport/room error if setup fails.
    pub fn admit(
        &mut self,
        socket: TcpStream,
        peer: SocketAddr,
        report: &mut StepReport,
    ) -> Result<ClientId, PestleError> {
        if self.registry.is_full() {
            // Dropping the socket closes it.
            drop(socket);
            return Err(PestleError::ServerFull {
                max_clients: self.registry.max_clients(),
            });
        }

        let client_id = self.registry.next_client_id();
        let connection = Connection::open(socket, peer, client_id, &self.connection_config)?;
        let actor_id = self.world.spawn_player(client_id)?;

        let welcome = Welcome {
            client_id,
            actor_id,
        };
        let greeting: Vec<RawPacket> = std::iter::once(welcome.to_raw())
            .chain(self.world.actors().map(|actor| spawned_packet(actor).to_raw()))
            .collect();
        for raw in &greeting {
            if let Err(e) = connection.send(raw.type_id, &raw.payload) {
                warn!(%client_id, error = %e, "greeting failed");
                // The connection closes on drop; the fresh player goes with it.
                if let Err(e) = self.world.mark_for_removal(actor_id) {
                    debug!(%client_id, error = %e, "actor already gone");
                }
                return Err(e.into());
            }
        }

        self.registry.insert(client_id, connection, actor_id)?;
        info!(%client_id, %actor_id, %peer, "client admitted");

        if let Some(spawned) = self.world.actor(actor_id).map(spawned_packet) {
            self.broadcast(&spawned.to_raw(), Some(client_id), report);
        }
        Ok(client_id)
    }

    // -----------------------------------------------------------------------
    // Teardown and broadcast
    // -----------------------------------------------------------------------

    /// Closes a client's connection, marks its actor for removal, and drops
    /// the registry entry. Safe to call for an already removed client.
    fn teardown(&mut self, client_id: ClientId, reason: DisconnectReason, report: &mut StepReport) {
        let Some(mut entry) = self.registry.remove(client_id) else {
            return;
        };
        entry.connection.close(reason);
        if let Err(e) = self.world.mark_for_removal(entry.actor_id) {
            debug!(%client_id, error = %e, "actor already gone");
        }
        info!(
            %client_id,
            actor_id = %entry.actor_id,
            reason = %entry
                .connection
                .disconnect_reason()
                .map(ToString::to_string)
                .unwrap_or_default(),
            "client torn down"
        );
        report.torn_down.push(client_id);
    }

    /// Sends `raw` to every client except `skip`. Clients whose write fails
    /// are torn down after the loop.
    fn broadcast(&mut self, raw: &RawPacket, skip: Option<ClientId>, report: &mut StepReport) {
        let mut failed = Vec::new();
        for (client_id, entry) in self.registry.iter() {
            if Some(client_id) == skip {
                continue;
            }
            if let Err(e) = entry.connection.send(raw.type_id, &raw.payload) {
                debug!(%client_id, error = %e, "broadcast write failed");
                failed.push((client_id, e.to_string()));
            }
        }
        for (client_id, error) in failed {
            self.teardown(client_id, DisconnectReason::WriteFailed(error), report);
        }
    }

    /// Tears every client down. Called once when the server stops.
    pub fn shutdown(&mut self) {
        let mut report = StepReport::default();
        for client_id in self.registry.client_ids() {
            self.teardown(client_id, DisconnectReason::ServerClosed, &mut report);
        }
        self.pending.clear();
        info!(clients = report.torn_down.len(), "simulation shut down");
    }
}

fn spawned_packet(actor: &dyn Actor) -> ActorSpawned {
    ActorSpawned::new(actor.id(), actor.kind(), actor.position())
}
