//! Memsulator command line
//!
//! Talks to a Rover MEMS 1.6 ECU over a serial line, or emulates one.
//!
//! # Usage
//!
//! Emulate an ECU on a socat pseudo-terminal pair:
//! ```bash
//! memsulator emulate --socat
//! ```
//!
//! Read data frame B from a real ECU:
//! ```bash
//! memsulator send --port /dev/ttyUSB0 --init request_data_frame_b
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use memsulator_core::protocol::DEFAULT_RESPONSE_TIMEOUT_MS;
use memsulator_core::transport::ConnectionConfig;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser, Debug)]
#[command(name = "memsulator", version)]
#[command(about = "Rover MEMS 1.6 diagnostic client and ECU emulator")]
struct Args {
    /// Connection settings (JSON); missing keys take the MEMS defaults
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// How long to wait for the ECU to answer a command
    #[arg(long, global = true, default_value_t = DEFAULT_RESPONSE_TIMEOUT_MS)]
    timeout_ms: u64,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Answer MEMS commands as an ECU would
    Emulate {
        /// Serve on a socat pair (~/ttyecu, ~/ttycodereader) instead of
        /// running an in-process self-check
        #[arg(long)]
        socat: bool,

        /// Delay between data frame polls in self-check mode
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },

    /// Send one command and print the reply
    Send {
        /// Serial port (overrides the config file)
        #[arg(short, long)]
        port: Option<String>,

        /// Run the initialization handshake first
        #[arg(long)]
        init: bool,

        /// Command name (e.g. heartbeat) or raw hex opcode (e.g. F4)
        command: String,

        /// Payload bytes appended to the command, as hex
        payload: Option<String>,
    },

    /// List available serial ports
    Ports,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = if args.verbose {
        "memsulator=debug,memsulator_core=debug"
    } else {
        "memsulator=info,memsulator_core=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = match &args.config {
        Some(path) => ConnectionConfig::from_json_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => ConnectionConfig::default(),
    };
    let timeout = Duration::from_millis(args.timeout_ms);

    match args.command {
        Command::Emulate { socat, interval_ms } => {
            commands::emulate(config, timeout, socat, Duration::from_millis(interval_ms))
        }
        Command::Send {
            port,
            init,
            command,
            payload,
        } => commands::send(config, timeout, port, init, &command, payload.as_deref()),
        Command::Ports => {
            commands::ports();
            Ok(())
        }
    }
}
