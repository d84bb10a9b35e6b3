//! `PestleServer` builder and server loop.
//!
//! One task runs everything that touches world state: it accepts sockets,
//! waits for ticks, and steps the simulation. Blocking socket reads happen
//! on per-connection reader threads and never on this task. Blocking
//! writes happen inside the step, which gives up its runtime worker first.

use std::future::Future;
use std::net::SocketAddr;

use pestle_room::WorldConfig;
use pestle_tick::TickScheduler;
use pestle_transport::Listener;
use tokio::runtime::{Handle, RuntimeFlavor};

use crate::simulation::{Simulation, StepReport};
use crate::{PestleError, ServerConfig};

/// Builder for configuring and starting a Pestle server.
///
/// # Example
///
/// ```rust,ignore
/// let server = PestleServer::builder()
///     .bind("0.0.0.0:7777")
///     .tick_rate(30)
///     .build()
///     .await?;
/// server.run().await
/// ```
pub struct PestleServerBuilder {
    config: ServerConfig,
}

impl PestleServerBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind to. Port `0` picks a free port.
    pub fn bind(mut self, addr: &str) -> Self {
        self.config.bind_addr = addr.to_string();
        self
    }

    /// Sets the tick rate in Hz (clamped to 1–128).
    pub fn tick_rate(mut self, hz: u32) -> Self {
        self.config.tick.tick_rate_hz = hz;
        self
    }

    /// Sets how many clients may be connected at once.
    pub fn max_clients(mut self, max: usize) -> Self {
        self.config.max_clients = max;
        self
    }

    pub fn world(mut self, world: WorldConfig) -> Self {
        self.config.world = world;
        self
    }

    /// Binds the listener and builds the server.
    pub async fn build(self) -> Result<PestleServer, PestleError> {
        let listener = Listener::bind(&self.config.bind_addr).await?;
        let scheduler = TickScheduler::new(self.config.tick.clone());
        let simulation = Simulation::new(&self.config);

        Ok(PestleServer {
            listener,
            scheduler,
            simulation,
        })
    }
}

impl Default for PestleServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound Pestle server.
///
/// Call [`run`](Self::run) or [`run_until`](Self::run_until) to start
/// accepting clients and ticking.
pub struct PestleServer {
    listener: Listener,
    scheduler: TickScheduler,
    simulation: Simulation,
}

impl PestleServer {
    /// Creates a new builder.
    pub fn builder() -> PestleServerBuilder {
        PestleServerBuilder::new()
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, PestleError> {
        Ok(self.listener.local_addr()?)
    }

    /// The simulation, e.g. to seed the world before running.
    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.simulation
    }

    /// Runs until the process is terminated.
    pub async fn run(self) -> Result<(), PestleError> {
        self.run_until(std::future::pending()).await
    }

    /// Runs until `shutdown` completes, then tears every client down.
    ///
    /// Accept errors are logged and the loop keeps going. On a multi-thread
    /// runtime each step runs under [`tokio::task::block_in_place`], so a
    /// peer that stops reading stalls this loop (up to the write timeout) but
    /// not the other tasks on the runtime.
    pub async fn run_until(mut self, shutdown: impl Future<Output = ()>) -> Result<(), PestleError> {
        tokio::pin!(shutdown);
        tracing::info!(
            addr = %self.local_addr()?,
            rate_hz = self.scheduler.tick_rate_hz(),
            "Pestle server running"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("shutdown requested");
                    break;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok((socket, peer)) => self.simulation.queue_socket(socket, peer),
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                tick = self.scheduler.wait_for_tick() => {
                    let report = step_blocking(&mut self.simulation);
                    self.scheduler.record_tick_end();
                    if !report.torn_down.is_empty() || !report.admitted.is_empty() {
                        tracing::debug!(
                            tick = tick.tick,
                            admitted = report.admitted.len(),
                            torn_down = report.torn_down.len(),
                            clients = self.simulation.registry().len(),
                            "tick"
                        );
                    }
                }
            }
        }

        self.simulation.shutdown();
        let metrics = self.scheduler.metrics();
        tracing::info!(
            ticks = metrics.total_ticks,
            overruns = metrics.total_overruns,
            max_tick_ms = metrics.max_tick_time.as_secs_f64() * 1000.0,
            "Pestle server stopped"
        );
        Ok(())
    }
}

/// Runs one step, handing this worker's other tasks to the runtime while
/// the step's blocking socket writes are in flight.
fn step_blocking(simulation: &mut Simulation) -> StepReport {
    match Handle::current().runtime_flavor() {
        RuntimeFlavor::CurrentThread => simulation.step(),
        _ => tokio::task::block_in_place(|| simulation.step()),
    }
}
