// Copyright 2025 Servus Altissimi (Pseudonym)

// Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction, including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software, and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
// The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use meshflow::prelude::*;
use meshflow::metrics::logger::MetricsLogger;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{Level, info};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Tick the simulation on a timer and serve /api/status
    Serve {
        #[arg(short, long)]
        topology: Option<PathBuf>,
        #[arg(long, default_value = "0.0.0.0")]
        host: String,
        #[arg(short, long, env = "PORT", default_value_t = 3001)]
        port: u16,
        #[arg(short, long, default_value_t = 1000)]
        interval_ms: u64,
        /// Stop after this many ticks
        #[arg(short = 'n', long)]
        ticks: Option<u64>,
        #[arg(short, long)]
        seed: Option<u64>,
        /// Write a CSV row per tick (default path under results/)
        #[arg(long)]
        log: bool,
        #[arg(long)]
        log_path: Option<PathBuf>,
    },

    /// Run ticks back to back and print the final status
    Step {
        #[arg(short, long)]
        topology: Option<PathBuf>,
        #[arg(short = 'n', long, default_value_t = 10)]
        ticks: u64,
        #[arg(short, long)]
        seed: Option<u64>,
        /// Write the tick reports to this CSV file
        #[arg(long)]
        log_path: Option<PathBuf>,
    },

    /// Print the route chosen for every node pair
    Routes {
        #[arg(short, long)]
        topology: Option<PathBuf>,
    },

    /// Print the built-in topology as JSON
    Topology,
}

#[tokio::main]
async fn main() -> Result<()> {
    let program_start = Instant::now();

    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve {
            topology,
            host,
            port,
            interval_ms,
            ticks,
            seed,
            log,
            log_path,
        } => {
            let mut config = SimConfig::default()
                .with_topology(load_topology(topology.as_ref())?)
                .with_address(host, port)
                .with_tick_interval(Duration::from_millis(interval_ms))
                .with_ticks(ticks)
                .with_seed(seed);
            if let Some(path) = log_path {
                config = config.with_log(path);
            } else if log {
                let path = config.default_log_path();
                config = config.with_log(path);
            }

            let sim = Simulation::new(config)?;
            sim.run().await?;
        }

        Commands::Step {
            topology,
            ticks,
            seed,
            log_path,
        } => {
            run_headless(load_topology(topology.as_ref())?, ticks, seed, log_path.as_ref())?;
        }

        Commands::Routes { topology } => {
            print_routes(&load_topology(topology.as_ref())?)?;
        }

        Commands::Topology => {
            println!("{}", serde_json::to_string_pretty(&Topology::reference())?);
        }
    }

    let total_time = program_start.elapsed();
    info!("Total runtime: {:.2}s", total_time.as_secs_f64());

    Ok(())
}

fn load_topology(path: Option<&PathBuf>) -> Result<Topology> {
    match path {
        Some(path) => {
            info!("Loading topology from: {}", path.display());
            Topology::load(path)
        }
        None => Ok(Topology::reference()),
    }
}

fn run_headless(topology: Topology, ticks: u64, seed: Option<u64>, log_path: Option<&PathBuf>) -> Result<()> {
    let config = SimConfig::default().with_topology(topology).with_seed(seed);
    let sim = Simulation::new(config)?;

    info!("Running {} ticks", ticks);
    let reports = sim.run_ticks(ticks);

    let delivered: u64 = reports.iter().map(|r| r.delivered).sum();
    let generated: u64 = reports.iter().map(|r| r.generated).sum();
    info!("Generated: {}, delivered: {}", generated, delivered);

    if let Some(path) = log_path {
        MetricsLogger::new(path)?.log_batch(&reports)?;
        info!("Tick reports saved to: {}", path.display());
    }

    let status = sim.engine().lock().status();
    status_table(&status);
    Ok(())
}

fn print_routes(topology: &Topology) -> Result<()> {
    let index = RoutingIndex::new(topology)?;
    for from in index.ids() {
        for to in index.ids() {
            if from == to {
                continue;
            }
            match index.shortest_path(from.as_str(), to.as_str())? {
                Some(path) => {
                    let hops: Vec<&str> = path.iter().map(NodeId::as_str).collect();
                    println!("{} -> {}: {}", from, to, hops.join(" -> "));
                }
                None => println!("{} -> {}: unreachable", from, to),
            }
        }
    }
    Ok(())
}

fn status_table(status: &StatusSnapshot) {
    println!("\n╔════════════╦════════════╦════════════╦═══════════╗");
    println!("║ Link       ║ Load       ║ Capacity   ║ Congested ║");
    println!("╠════════════╬════════════╬════════════╬═══════════╣");
    for (key, link) in &status.links {
        println!(
            "║ {:<10} ║ {:>10} ║ {:>10} ║ {:>9} ║",
            key,
            link.current_load,
            link.capacity,
            if link.is_congested() { "yes" } else { "" },
        );
    }
    println!("╚════════════╩════════════╩════════════╩═══════════╝");
    println!("Congested links: {}", status.congested_links().count());

    println!("\n╔════════════╦════════════╗");
    println!("║ Node       ║ Queue      ║");
    println!("╠════════════╬════════════╣");
    for (id, node) in &status.nodes {
        println!("║ {:<10} ║ {:>10} ║", id.as_str(), node.queue_length);
    }
    println!("╚════════════╩════════════╝");
    println!("Total queued: {}\n", status.total_queued());
}
