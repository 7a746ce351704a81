pub mod config;
pub mod engine;

pub use config::SimConfig;
pub use engine::{Engine, EnqueueError};

use crate::metrics::TickReport;
use crate::metrics::logger::MetricsLogger;
use crate::server;
use crate::traffic::RandomDestinations;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// The engine as shared between the ticker and status readers. A tick runs
/// entirely under the lock, so readers never observe half of one.
pub type SharedEngine = Arc<Mutex<Engine>>;

pub struct Simulation {
    config: SimConfig,
    engine: SharedEngine,
    shutdown: CancellationToken,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Result<Self> {
        let source = RandomDestinations::from_seed_option(config.seed);
        let engine = Engine::new(&config.topology, Box::new(source))?;
        Ok(Self {
            config,
            engine: Arc::new(Mutex::new(engine)),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn engine(&self) -> SharedEngine {
        self.engine.clone()
    }

    /// Cancelling this stops [`Simulation::run`] and its status server.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn step(&self) -> TickReport {
        self.engine.lock().advance_tick()
    }

    /// Runs `ticks` ticks back to back, without waiting on the interval.
    pub fn run_ticks(&self, ticks: u64) -> Vec<TickReport> {
        (0..ticks).map(|_| self.step()).collect()
    }

    fn budget_spent(&self, tick: u64) -> bool {
        self.config.ticks.is_some_and(|limit| tick >= limit)
    }

    /// Serves `/api/status` and ticks on the configured interval until the
    /// tick budget runs out, Ctrl-C arrives or the shutdown token is cancelled.
    pub async fn run(&self) -> Result<()> {
        info!("Starting simulation: {}", self.config.name);
        info!(
            "Topology: {} nodes, {} links",
            self.config.topology.nodes.len(),
            self.config.topology.links.len()
        );
        info!("Tick interval: {:?}", self.config.tick_interval);

        let mut logger = match &self.config.log_path {
            Some(path) => {
                info!("Logging ticks to: {}", path.display());
                Some(MetricsLogger::new(path)?)
            }
            None => None,
        };

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        info!("Status endpoint on http://{}/api/status", listener.local_addr()?);

        let router = server::router(self.engine());
        let cancel = self.shutdown.clone();
        let server_handle = tokio::spawn(async move {
            if let Err(e) = server::serve(listener, router, cancel).await {
                error!("Status server error: {}", e);
            }
        });

        let result = self.tick_loop(logger.as_mut()).await;

        info!("Shutting down simulation..");
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(2), server_handle).await;

        let engine = self.engine.lock();
        info!("Ticks run: {}", engine.tick());
        info!("Packets still queued: {}", engine.total_queued());

        result
    }

    async fn tick_loop(&self, mut logger: Option<&mut MetricsLogger>) -> Result<()> {
        let pb = match self.config.ticks {
            Some(limit) => {
                let pb = ProgressBar::new(limit);
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} ticks {msg}")?
                        .progress_chars("█▓░"),
                );
                pb
            }
            None => ProgressBar::hidden(),
        };

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        let mut tick = interval(self.config.tick_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick of an interval fires immediately
        tick.tick().await;

        let mut current = self.engine.lock().tick();
        while !self.budget_spent(current) {
            tokio::select! {
                _ = tick.tick() => {}
                _ = self.shutdown.cancelled() => {
                    info!("Shutdown requested, stopping");
                    break;
                }
                _ = &mut shutdown => {
                    info!("Interrupted, stopping");
                    break;
                }
            }

            let report = self.step();
            current = report.tick;
            self.observe(&report);
            if let Some(logger) = logger.as_deref_mut() {
                logger.log(&report)?;
            }

            pb.inc(1);
            pb.set_message(format!(
                "Queued: {} | Saturated links: {}",
                report.queued, report.saturated_links
            ));
        }

        pb.finish_with_message("Simulation complete");
        Ok(())
    }

    fn observe(&self, report: &TickReport) {
        debug!(
            "Tick {}: generated {}, delivered {}, forwarded {}, blocked {}, unroutable {}, queued {}",
            report.tick,
            report.generated,
            report.delivered,
            report.forwarded,
            report.blocked,
            report.unroutable,
            report.queued
        );

        if report.unroutable > 0 {
            warn!("Tick {}: {} packets have no route", report.tick, report.unroutable);
        }
        if report.saturated_links > 0 {
            warn!("Tick {}: {} directed links saturated", report.tick, report.saturated_links);
        }
    }
}
