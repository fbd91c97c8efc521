//! # Ring Node Binary
//!
//! Starts one node of the election ring.
//!
//! ## Usage
//!
//! ```bash
//! cargo run --bin node -- --config config/node1.toml
//! cargo run --bin node -- --id alice --next 10.0.0.2 --port 8080
//! ```
//!
//! The node will:
//! 1. Load configuration (file first, flags override)
//! 2. Bind the listen address
//! 3. Forward election messages to the next node
//! 4. Start an election when Space + Enter is typed on stdin

use clap::Parser;
use env_logger::Builder;
use log::LevelFilter;
use std::io::Write;
use tokio::io::BufReader;

use ring_election::common::config::{NodeConfig, Overrides};
use ring_election::node::trigger::run_trigger;
use ring_election::node::{InboundListener, NodeMiddleware};

/// Command-line arguments for the node binary
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a node configuration file (TOML format)
    #[arg(short, long)]
    config: Option<String>,

    /// Self ID, unique in the ring
    #[arg(long)]
    id: Option<String>,

    /// Next node address (host or host:port)
    #[arg(long)]
    next: Option<String>,

    /// Port to listen on (default 8080)
    #[arg(short, long)]
    port: Option<u16>,
}

/// Format: `[HH:MM:SS] [LEVEL] message`, INFO unless `RUST_LOG` says otherwise.
fn init_logger() {
    Builder::new()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] [{}] {}",
                chrono::Local::now().format("%H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter_level(LevelFilter::Info)
        .parse_default_env()
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logger();

    let args = Args::parse();

    let config = NodeConfig::load(
        args.config.as_deref(),
        Overrides {
            id: args.id,
            next: args.next,
            port: args.port,
        },
    )?;

    let listener = InboundListener::bind(config.listen_address).await?;
    let node = NodeMiddleware::from_config(&config);

    tokio::spawn(run_trigger(BufReader::new(tokio::io::stdin()), node.handle()));

    node.run(listener).await;

    Ok(())
}
