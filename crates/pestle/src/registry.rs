//! Connection registry: which connection drives which actor.

use std::collections::BTreeMap;

use pestle_protocol::{ActorId, ClientId};
use pestle_transport::Connection;

use crate::PestleError;

/// A connected client and the actor it controls.
#[derive(Debug)]
pub struct ClientEntry {
    pub connection: Connection,
    pub actor_id: ActorId,
}

/// Maps each connected client to its connection and player actor.
///
/// Owned by the simulation task. Entries are kept in [`ClientId`] order,
/// which is the order connections are drained each tick.
#[derive(Debug)]
pub struct ConnectionRegistry {
    clients: BTreeMap<ClientId, ClientEntry>,
    next_client_id: u32,
    max_clients: usize,
}

impl ConnectionRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: BTreeMap::new(),
            next_client_id: 1,
            max_clients,
        }
    }

    /// Issues the next client id. Ids start at 1 and are never reused.
    pub fn next_client_id(&mut self) -> ClientId {
        let id = ClientId(self.next_client_id);
        self.next_client_id += 1;
        id
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn max_clients(&self) -> usize {
        self.max_clients
    }

    /// Registers a client.
    ///
    /// # Errors
    /// [`PestleError::ServerFull`] if every slot is taken. The connection
    /// is dropped, which closes it.
    pub fn insert(
        &mut self,
        client_id: ClientId,
        connection: Connection,
        actor_id: ActorId,
    ) -> Result<(), PestleError> {
        if self.is_full() {
            return Err(PestleError::ServerFull {
                max_clients: self.max_clients,
            });
        }
        self.clients.insert(
            client_id,
            ClientEntry {
                connection,
                actor_id,
            },
        );
        Ok(())
    }

    /// The actor a client controls. `None` once the client is removed.
    pub fn actor_of(&self, client_id: ClientId) -> Option<ActorId> {
        self.clients.get(&client_id).map(|entry| entry.actor_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&ClientEntry> {
        self.clients.get(&client_id)
    }

    pub fn get_mut(&mut self, client_id: ClientId) -> Option<&mut ClientEntry> {
        self.clients.get_mut(&client_id)
    }

    pub fn remove(&mut self, client_id: ClientId) -> Option<ClientEntry> {
        self.clients.remove(&client_id)
    }

    /// Snapshot of registered ids, ascending. Safe to hold while entries
    /// are removed.
    pub fn client_ids(&self) -> Vec<ClientId> {
        self.clients.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ClientId, &ClientEntry)> {
        self.clients.iter().map(|(id, entry)| (*id, entry))
    }

    /// Removes every entry, ascending by id.
    pub fn drain(&mut self) -> impl Iterator<Item = (ClientId, ClientEntry)> {
        std::mem::take(&mut self.clients).into_iter()
    }
}
