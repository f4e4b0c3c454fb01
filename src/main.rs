//! rosnode: a client node that runs until SIGINT/SIGTERM, then shuts down in
//! order.
//!
//! ```text
//! config → tracing/metrics → Node (coordinator, signals, logger, rpc cache)
//!     → tracked workers (heartbeat logging, master probe)
//!     → wait for shutdown → hooks → join workers → exit
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use rosnode_core::config::validation::validate_config;
use rosnode_core::config::{load_config, ConfigError, NodeConfig};
use rosnode_core::observability::{logging, metrics};
use rosnode_core::{logdebug, loginfo, loginfo_once, loginfo_throttle, logwarn_once};
use rosnode_core::{logwarn_throttle_identical, Node};

const TICK: Duration = Duration::from_millis(100);
const HEARTBEAT: Duration = Duration::from_secs(5);
const PROBE_INTERVAL: Duration = Duration::from_secs(2);
const PROBE_WARN: Duration = Duration::from_secs(30);

#[derive(Parser, Debug)]
#[command(name = "rosnode")]
#[command(about = "Client node runtime with ordered shutdown", long_about = None)]
struct Cli {
    /// Path to a TOML config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the node name
    #[arg(short, long)]
    name: Option<String>,

    /// Number of heartbeat worker threads
    #[arg(short, long, default_value_t = 2)]
    workers: usize,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => NodeConfig::default(),
    };
    if let Some(name) = cli.name {
        config.node.name = name;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_tracing(&config.logging)?;
    tracing::info!(node = %config.node.name, "rosnode v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        } else {
            tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            );
        }
    }

    // The HTTP transport is blocking and must be built off the async workers.
    let node = Arc::new(tokio::task::spawn_blocking(move || Node::new(config)).await??);
    node.install_signal_handlers()?;
    let backstop = node.exit_backstop();

    let logger = Arc::clone(node.logger());
    node.coordinator().add_preshutdown_hook(move |reason| {
        loginfo!(logger, "stopping workers: {}", reason);
    });
    let logger = Arc::clone(node.logger());
    node.coordinator().add_shutdown_hook(move |reason| {
        loginfo!(logger, "node down: {}", reason);
    });

    for index in 0..cli.workers {
        let worker = Arc::clone(&node);
        node.coordinator()
            .spawn_tracked(&format!("worker-{}", index), move || heartbeat(&worker, index))?;
    }
    let probe = Arc::clone(&node);
    node.coordinator().spawn_tracked("master-probe", move || probe_master(&probe))?;

    tracing::info!(workers = cli.workers, "Node running, waiting for shutdown");
    node.coordinator().wait_for_shutdown().await;
    drop(backstop);

    tracing::info!(
        reason = node.coordinator().shutdown_reason().as_deref().unwrap_or("<none>"),
        "rosnode exiting"
    );
    Ok(())
}

fn heartbeat(node: &Node, index: usize) {
    let logger = node.logger();
    loginfo_once!(logger, "{} workers online", node.config().node.name);

    let mut ticks = 0u64;
    while !node.is_shutdown_requested() {
        ticks += 1;
        // Shared call site: the heartbeat is throttled across all workers.
        loginfo_throttle!(logger, HEARTBEAT, "worker {} alive ({} ticks)", index, ticks);
        std::thread::sleep(TICK);
    }
    logdebug!(logger, "worker {} exiting after {} ticks", index, ticks);
}

fn probe_master(node: &Node) {
    let logger = node.logger();
    let Some(master) = node.master() else {
        logwarn_once!(logger, "no master_uri configured, skipping master probe");
        return;
    };
    let body = get_pid_request(node.name());

    while !node.is_shutdown_requested() {
        match master.call(|client| client.post(body.as_str())) {
            Ok(_) => {
                loginfo_once!(logger, "master reachable");
            }
            Err(e) => {
                logwarn_throttle_identical!(logger, PROBE_WARN, "master unreachable: {}", e);
            }
        }
        let mut waited = Duration::ZERO;
        while waited < PROBE_INTERVAL && !node.is_shutdown_requested() {
            std::thread::sleep(TICK);
            waited += TICK;
        }
    }
}

fn get_pid_request(caller_id: &str) -> String {
    format!(
        "<?xml version=\"1.0\"?><methodCall><methodName>getPid</methodName><params>\
         <param><value><string>/{}</string></value></param></params></methodCall>",
        caller_id
    )
}
