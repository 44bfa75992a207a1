//! Blocking client for the clamd `INSTREAM` scanning protocol.
//!
//! Streams any [`std::io::Read`] to a scanning daemon as length-prefixed
//! frames and classifies the reply as clean or flagged. A readiness
//! [`Probe`] confirms the daemon answers `PING` before scan traffic starts.
//!
//! # Quick start
//!
//! ```no_run
//! use clamwire::PartialConfig;
//!
//! let cfg = PartialConfig::from_env()?.resolve()?;
//! // Blocks until the daemon answers PING (or the ready timeout passes).
//! let scanner = clamwire::connect(&cfg)?;
//!
//! let verdict = scanner.scan_path("upload.bin")?;
//! if verdict.is_flagged() {
//!     println!("infected: {}", verdict.diagnostic());
//! }
//! # Ok::<(), clamwire::Error>(())
//! ```
//!
//! Every scan and probe attempt uses its own connection, so a [`Scanner`]
//! can be shared across threads and used concurrently.

mod address;
mod config;
mod connection;
mod error;
mod probe;
mod scanner;

pub use address::Address;
pub use clamwire_proto::Verdict;
pub use config::{
    Config, DEFAULT_CHUNK_SIZE, DEFAULT_CONNECT_TIMEOUT, DEFAULT_IO_TIMEOUT,
    DEFAULT_PROBE_CONNECT_TIMEOUT, DEFAULT_READY_TIMEOUT, DEFAULT_RETRY_INTERVAL, ENV_ADDRESS,
    ENV_MAX_FILE_SIZE, ENV_TIMEOUT, PartialConfig,
};
pub use connection::{Connection, Connector, Dial};
pub use error::{Error, ErrorCategory, Result};
pub use probe::{MIN_RETRY_INTERVAL, Probe, Ready, RetryPolicy};
pub use scanner::Scanner;

/// Waits for the daemon to become ready, then returns a [`Scanner`].
///
/// Fails with [`Error::Timeout`] if the daemon never answers within
/// [`Config::ready_timeout`].
pub fn connect(cfg: &Config) -> Result<Scanner> {
    cfg.validate()?;
    Probe::from_config(cfg).wait_until_ready()?;
    Ok(Scanner::from_config(cfg))
}
