//! Command tokens understood by the daemon.

/// Reply expected for [`Command::Ping`], after trimming.
pub const PONG: &str = "PONG";

/// A NUL-delimited daemon command.
///
/// The `z` prefix tells the daemon to read the command up to a NUL byte
/// instead of a newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Command {
    /// Liveness check; answered with `PONG\0`.
    Ping,
    /// Starts a framed stream scan session.
    Instream,
}

impl Command {
    /// Returns the exact bytes sent on the wire, including the NUL delimiter.
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Ping => b"zPING\0",
            Self::Instream => b"zINSTREAM\0",
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Ping => "PING",
            Self::Instream => "INSTREAM",
        })
    }
}
