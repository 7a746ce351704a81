use crate::topology::Topology;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub tick_interval: Duration,
    /// `None` keeps ticking until interrupted.
    pub ticks: Option<u64>,
    pub seed: Option<u64>,
    pub log_path: Option<PathBuf>,
    pub topology: Topology,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            name: "meshflow".to_string(),
            host: "0.0.0.0".to_string(),
            port: 3001,
            tick_interval: Duration::from_secs(1),
            ticks: None,
            seed: None,
            log_path: None,
            topology: Topology::reference(),
        }
    }
}

impl SimConfig {
    pub fn with_topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_ticks(mut self, ticks: Option<u64>) -> Self {
        self.ticks = ticks;
        self
    }

    pub fn with_tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    pub fn with_address(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// `results/<name>_<timestamp>.csv`
    pub fn default_log_path(&self) -> PathBuf {
        let timestamp = chrono::Local::now().format("%Y%m%d_%H%M%S");
        PathBuf::from(format!("results/{}_{}.csv", self.name, timestamp))
    }
}
