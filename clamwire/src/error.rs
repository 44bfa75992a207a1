//! Error types for clamwire operations.

use std::io;
use std::time::Duration;

use crate::Address;

/// Alias for `Result<T, clamwire::Error>`.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by scan sessions and readiness probes.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The daemon could not be reached.
    #[error("failed to connect to {address}: {source}")]
    Connect {
        /// Address that was dialed.
        address: Address,
        /// Underlying transport error.
        #[source]
        source: io::Error,
    },

    /// Writing a command or frame failed; the session was abandoned.
    #[error("failed to write to daemon: {0}")]
    Write(#[source] io::Error),

    /// Reading the daemon's reply failed.
    #[error("failed to read daemon reply: {0}")]
    Read(#[source] io::Error),

    /// The caller-supplied byte source failed.
    #[error("failed to read scan source: {0}")]
    Source(#[source] io::Error),

    /// The daemon closed the session without replying.
    #[error("daemon closed the connection without a reply")]
    EmptyReply,

    /// A liveness attempt got something other than `PONG`.
    #[error("unexpected liveness reply: {0:?}")]
    UnexpectedReply(String),

    /// The source yielded more bytes than the configured limit.
    #[error("scan source exceeds {limit} bytes")]
    StreamTooLarge {
        /// Configured maximum stream length.
        limit: u64,
    },

    /// The daemon did not become ready in time.
    #[error("daemon not ready after {waited:?} ({attempts} attempts){}", suffix(.last.as_deref()))]
    Timeout {
        /// Time spent probing.
        waited: Duration,
        /// Number of attempts made.
        attempts: u32,
        /// Description of the last failed attempt.
        last: Option<String>,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Coarse grouping of [`Error`] for callers that map failures to statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorCategory {
    /// The daemon is unreachable or not ready.
    Unavailable,
    /// The daemon misbehaved or the session broke mid-way.
    Protocol,
    /// The caller's input was unreadable or too large.
    Input,
    /// Configuration was rejected.
    Config,
}

impl Error {
    /// Returns the category this error belongs to.
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } => ErrorCategory::Unavailable,
            Self::Write(_) | Self::Read(_) | Self::EmptyReply | Self::UnexpectedReply(_) => {
                ErrorCategory::Protocol
            }
            Self::Source(_) | Self::StreamTooLarge { .. } => ErrorCategory::Input,
            Self::Config(_) | Self::Json(_) => ErrorCategory::Config,
        }
    }
}

/// Formats the optional last failure as `": <text>"`.
fn suffix(last: Option<&str>) -> String {
    last.map_or_else(String::new, |e| format!(": {e}"))
}
