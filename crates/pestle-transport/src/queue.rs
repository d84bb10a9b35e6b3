//! The inbound queue between a reader thread and the simulation.
//!
//! One producer (the connection's reader thread) and one consumer (the
//! simulation). Neither half is `Clone`, so the single-producer,
//! single-consumer shape is enforced by the types.
//!
//! Backed by an unbounded Tokio channel. Pushing never blocks, which keeps
//! the reader thread's only suspension point inside the socket read.

use pestle_protocol::RawPacket;
use tokio::sync::mpsc;

/// Creates a connected producer/consumer pair.
pub fn inbound_queue() -> (InboundSender, InboundReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (InboundSender { tx }, InboundReceiver { rx })
}

/// Producer half, owned by the reader thread.
#[derive(Debug)]
pub struct InboundSender {
    tx: mpsc::UnboundedSender<RawPacket>,
}

impl InboundSender {
    /// Enqueues a complete packet.
    ///
    /// # Errors
    /// Hands the packet back if the receiving half has been dropped, which
    /// means the connection was torn down.
    pub fn push(&self, packet: RawPacket) -> Result<(), RawPacket> {
        self.tx.send(packet).map_err(|e| e.0)
    }
}

/// Consumer half, owned by the connection and drained by the simulation.
#[derive(Debug)]
pub struct InboundReceiver {
    rx: mpsc::UnboundedReceiver<RawPacket>,
}

impl InboundReceiver {
    /// Removes and returns every packet queued right now, oldest first.
    ///
    /// Never blocks. An empty vector means no pending traffic.
    pub fn drain(&mut self) -> Vec<RawPacket> {
        let mut out = Vec::new();
        while let Ok(packet) = self.rx.try_recv() {
            out.push(packet);
        }
        out
    }
}
