//! # Pestle
//!
//! Authoritative game server core over plain TCP.
//!
//! Clients send length-prefixed binary packets. Each connection has a
//! reader thread that frames packets into a queue; a single simulation task
//! drains the queues once per tick, applies packets to the world through
//! the [`Dispatcher`], advances the world, and broadcasts the result.
//!
//! ```text
//! socket → reader thread → inbound queue ─┐
//!                                          ├→ Simulation::step → World
//! socket ← Connection::send ← broadcast ──┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pestle::PestleServer;
//!
//! # async fn start() -> Result<(), pestle::PestleError> {
//! let server = PestleServer::builder()
//!     .bind("0.0.0.0:7777")
//!     .tick_rate(30)
//!     .build()
//!     .await?;
//! server.run().await
//! # }
//! ```

mod config;
mod dispatch;
mod error;
mod registry;
mod server;
mod simulation;

pub use config::{DispatchConfig, ENV_BIND, ENV_TICK_RATE, ServerConfig};
pub use dispatch::{DispatchOutcome, Dispatcher, Sender};
pub use error::PestleError;
pub use registry::{ClientEntry, ConnectionRegistry};
pub use server::{PestleServer, PestleServerBuilder};
pub use simulation::{Simulation, StepReport};
