//! Client configuration and its sources.
//!
//! Values are layered: defaults, then a JSON file, then environment
//! variables, then whatever the caller sets last. Each layer is a
//! [`PartialConfig`]; [`PartialConfig::resolve`] validates the merged result.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connection::Connector;
use crate::{Address, Error, Result};

/// Default bound on establishing a scan connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
/// Default per-read/write deadline.
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(60);
/// Default overall readiness timeout.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(30);
/// Default pause between readiness attempts.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
/// Default bound on establishing a probe connection.
pub const DEFAULT_PROBE_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
/// Default size of each streamed chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 2048;

/// Environment variable holding the daemon address.
pub const ENV_ADDRESS: &str = "CLAM_AV_ADDRESS";
/// Environment variable holding the readiness timeout in seconds.
pub const ENV_TIMEOUT: &str = "CLAM_AV_TIMEOUT";
/// Environment variable holding the maximum stream length in bytes.
pub const ENV_MAX_FILE_SIZE: &str = "MAX_FILE_SIZE";

/// Validated, immutable client configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub struct Config {
    /// Daemon address.
    pub address: Address,
    /// Bound on establishing a scan connection.
    pub connect_timeout: Duration,
    /// Per-read/write deadline on open connections (`None` = no deadline).
    pub io_timeout: Option<Duration>,
    /// Overall time the readiness probe may take.
    pub ready_timeout: Duration,
    /// Pause between readiness attempts.
    pub retry_interval: Duration,
    /// Bound on establishing each probe connection.
    pub probe_connect_timeout: Duration,
    /// Bytes read from the source per frame.
    pub chunk_size: usize,
    /// Largest stream the client will send (`None` = unlimited).
    pub max_stream_len: Option<u64>,
}

impl Config {
    /// Creates a configuration with default timeouts.
    pub const fn new(address: Address) -> Self {
        Self {
            address,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            io_timeout: Some(DEFAULT_IO_TIMEOUT),
            ready_timeout: DEFAULT_READY_TIMEOUT,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            probe_connect_timeout: DEFAULT_PROBE_CONNECT_TIMEOUT,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_stream_len: None,
        }
    }

    /// Checks invariants the client relies on.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 || u32::try_from(self.chunk_size).is_err() {
            return Err(Error::Config(format!(
                "chunk size {} out of range 1..=u32::MAX",
                self.chunk_size
            )));
        }
        let zero = [
            ("connect timeout", self.connect_timeout),
            ("probe connect timeout", self.probe_connect_timeout),
            ("retry interval", self.retry_interval),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, d)| d.is_zero()) {
            return Err(Error::Config(format!("{name} must be non-zero")));
        }
        if self.io_timeout.is_some_and(|d| d.is_zero()) {
            return Err(Error::Config("io timeout must be non-zero".into()));
        }
        Ok(())
    }

    /// Connector used for scan sessions.
    pub fn connector(&self) -> Connector {
        Connector::new(self.address.clone(), self.connect_timeout).io_timeout(self.io_timeout)
    }

    /// Connector used for readiness attempts.
    pub fn probe_connector(&self) -> Connector {
        Connector::new(self.address.clone(), self.probe_connect_timeout)
            .io_timeout(Some(self.probe_connect_timeout))
    }
}

/// One configuration layer. Unset fields fall through to lower layers.
///
/// The JSON form uses integer milliseconds for timeouts; an `io_timeout_ms`
/// of zero disables the I/O deadline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
#[non_exhaustive]
pub struct PartialConfig {
    /// Daemon address.
    pub address: Option<Address>,
    /// Scan connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// I/O deadline in milliseconds (0 disables).
    pub io_timeout_ms: Option<u64>,
    /// Readiness timeout in seconds (0 keeps the default).
    pub ready_timeout_secs: Option<u64>,
    /// Readiness retry interval in milliseconds.
    pub retry_interval_ms: Option<u64>,
    /// Probe connect timeout in milliseconds.
    pub probe_connect_timeout_ms: Option<u64>,
    /// Streamed chunk size in bytes.
    pub chunk_size: Option<usize>,
    /// Maximum stream length in bytes.
    pub max_stream_len: Option<u64>,
}

impl PartialConfig {
    /// Reads a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Ok(serde_json::from_slice(&data)?)
    }

    /// Reads the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a layer from `CLAM_AV_*` style variables supplied by `lookup`.
    ///
    /// A timeout or size of `0` counts as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let address = lookup(ENV_ADDRESS)
            .filter(|v| !v.trim().is_empty())
            .map(|v| v.parse())
            .transpose()?;
        let ready_timeout_secs = parse_u64(&lookup, ENV_TIMEOUT)?.filter(|&v| v != 0);
        let max_stream_len = parse_u64(&lookup, ENV_MAX_FILE_SIZE)?.filter(|&v| v != 0);
        Ok(Self {
            address,
            ready_timeout_secs,
            max_stream_len,
            ..Self::default()
        })
    }

    /// Overlays `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn merge(self, other: Self) -> Self {
        Self {
            address: other.address.or(self.address),
            connect_timeout_ms: other.connect_timeout_ms.or(self.connect_timeout_ms),
            io_timeout_ms: other.io_timeout_ms.or(self.io_timeout_ms),
            ready_timeout_secs: other.ready_timeout_secs.or(self.ready_timeout_secs),
            retry_interval_ms: other.retry_interval_ms.or(self.retry_interval_ms),
            probe_connect_timeout_ms: other
                .probe_connect_timeout_ms
                .or(self.probe_connect_timeout_ms),
            chunk_size: other.chunk_size.or(self.chunk_size),
            max_stream_len: other.max_stream_len.or(self.max_stream_len),
        }
    }

    /// Fills defaults and validates.
    pub fn resolve(self) -> Result<Config> {
        let address = self
            .address
            .ok_or_else(|| Error::Config(format!("no daemon address (set {ENV_ADDRESS})")))?;
        let mut cfg = Config::new(address);
        if let Some(ms) = self.connect_timeout_ms {
            cfg.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = self.io_timeout_ms {
            cfg.io_timeout = (ms != 0).then(|| Duration::from_millis(ms));
        }
        if let Some(secs) = self.ready_timeout_secs.filter(|&secs| secs != 0) {
            cfg.ready_timeout = Duration::from_secs(secs);
        }
        if let Some(ms) = self.retry_interval_ms {
            cfg.retry_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.probe_connect_timeout_ms {
            cfg.probe_connect_timeout = Duration::from_millis(ms);
        }
        if let Some(n) = self.chunk_size {
            cfg.chunk_size = n;
        }
        cfg.max_stream_len = self.max_stream_len;
        cfg.validate()?;
        Ok(cfg)
    }
}

/// Parses an optional unsigned integer variable.
fn parse_u64(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<u64>> {
    lookup(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|e| Error::Config(format!("{key}={v:?}: {e}")))
        })
        .transpose()
}
