//! CLI for scanning files with a clamd daemon.

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::missing_docs_in_private_items
)]

mod scan;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clamwire::{Address, Config, PartialConfig, Probe};
use clap::{ArgAction, CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing_subscriber::EnvFilter;

/// Exit code when a scan or probe could not complete.
const EXIT_ERROR: i32 = 2;

#[derive(Parser)]
#[command(name = "clamwire", version, about = "Stream files to clamd for scanning")]
struct Cli {
    /// JSON configuration file (default: <config dir>/clamwire/config.json).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Daemon address: host:port or unix:/path.
    #[arg(long, short = 'a', global = true)]
    address: Option<Address>,

    /// Seconds to wait for the daemon to become ready (0 keeps the default).
    #[arg(long, global = true)]
    ready_timeout: Option<u64>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check that the daemon answers PING.
    Ping {
        /// Retry until the ready timeout instead of trying once.
        #[arg(long)]
        wait: bool,
    },

    /// Scan files (or stdin) and print verdicts.
    ///
    /// Exits 0 if everything is clean, 1 if anything was flagged, 2 on error.
    Scan(scan::ScanArgs),

    /// Generate shell completion scripts.
    #[command(hide = true)]
    Completion {
        /// Target shell.
        shell: Shell,
    },
}

/// Output format for scan results.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub(crate) enum OutputFormat {
    /// Human-readable table.
    #[default]
    Table,
    /// Machine-readable JSON.
    Json,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.dispatch() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("clamwire: {e:#}");
            std::process::exit(EXIT_ERROR);
        }
    }
}

impl Cli {
    fn dispatch(self) -> Result<i32> {
        if let Command::Completion { shell } = self.command {
            clap_complete::generate(shell, &mut Self::command(), "clamwire", &mut std::io::stdout());
            return Ok(0);
        }

        let cfg = self.load_config()?;
        match self.command {
            Command::Ping { wait } => ping(&cfg, wait),
            Command::Scan(args) => scan::run(&cfg, &args),
            Command::Completion { .. } => Ok(0),
        }
    }

    /// Layers defaults, config file, environment and flags.
    fn load_config(&self) -> Result<Config> {
        let mut layers = PartialConfig::default();

        if let Some(path) = self.config.clone().or_else(default_config_path) {
            let file = PartialConfig::from_file(&path)
                .with_context(|| format!("loading {}", path.display()))?;
            layers = layers.merge(file);
        }
        layers = layers.merge(PartialConfig::from_env()?);

        let mut flags = PartialConfig::default();
        flags.address.clone_from(&self.address);
        flags.ready_timeout_secs = self.ready_timeout;
        if let Command::Scan(args) = &self.command {
            flags.chunk_size = args.chunk_size;
            flags.max_stream_len = args.max_size;
        }

        Ok(layers.merge(flags).resolve()?)
    }
}

fn ping(cfg: &Config, wait: bool) -> Result<i32> {
    let probe = Probe::from_config(cfg);
    if wait {
        let ready = probe.wait_until_ready()?;
        println!(
            "PONG from {} after {} attempt(s) in {:.1?}",
            cfg.address, ready.attempts, ready.elapsed
        );
    } else {
        probe.ping_once()?;
        println!("PONG from {}", cfg.address);
    }
    Ok(0)
}

/// Config file in the platform config directory, if one exists.
fn default_config_path() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("clamwire").join("config.json");
    path.is_file().then_some(path)
}

/// Installs the stderr log subscriber. `RUST_LOG` overrides `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
