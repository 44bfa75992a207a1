//! Daemon readiness probe.
//!
//! Repeats a `zPING\0` / `PONG\0` exchange on fresh connections until the
//! daemon answers or the overall timeout passes. Every failure before the
//! deadline (refused connections, I/O errors, wrong replies) is retried.

use std::io::{self, Read, Write};
use std::time::{Duration, Instant};

use clamwire_proto::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::connection::{Connector, Dial};
use crate::{Error, Result};

/// Size of the buffer for the liveness reply.
const PONG_BUF: usize = 64;

/// Shortest pause between readiness attempts.
pub const MIN_RETRY_INTERVAL: Duration = Duration::from_millis(1);

/// When to retry and when to give up, as a function of elapsed time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Overall deadline measured from the first attempt.
    timeout: Duration,
    /// Pause between attempts.
    interval: Duration,
}

impl RetryPolicy {
    /// Creates a policy with a fixed retry interval.
    ///
    /// A zero interval is raised to [`MIN_RETRY_INTERVAL`].
    pub const fn new(timeout: Duration, interval: Duration) -> Self {
        let interval = if interval.is_zero() {
            MIN_RETRY_INTERVAL
        } else {
            interval
        };
        Self { timeout, interval }
    }

    /// Returns `true` once `elapsed` reaches the overall timeout.
    pub fn expired(&self, elapsed: Duration) -> bool {
        elapsed >= self.timeout
    }

    /// Pause before the next attempt, or `None` if the deadline has passed.
    ///
    /// The pause never extends past the deadline.
    pub fn next_delay(&self, elapsed: Duration) -> Option<Duration> {
        let remaining = self.timeout.checked_sub(elapsed).filter(|r| !r.is_zero())?;
        Some(self.interval.min(remaining))
    }
}

/// Proof that the daemon answered a liveness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub struct Ready {
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Time from the first attempt until success.
    pub elapsed: Duration,
}

/// Checks whether the daemon is reachable and speaking the protocol.
#[derive(Debug, Clone)]
pub struct Probe<D = Connector> {
    /// Opens one connection per attempt.
    dial: D,
    /// Retry schedule.
    policy: RetryPolicy,
}

impl Probe {
    /// Creates a probe from validated configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(
            cfg.probe_connector(),
            RetryPolicy::new(cfg.ready_timeout, cfg.retry_interval),
        )
    }
}

impl<D: Dial> Probe<D> {
    /// Creates a probe.
    pub const fn new(dial: D, policy: RetryPolicy) -> Self {
        Self { dial, policy }
    }

    /// Blocks until the daemon answers `PONG` or the policy's timeout passes.
    ///
    /// Only [`Error::Timeout`] is ever returned, and never before the
    /// timeout has elapsed.
    pub fn wait_until_ready(&self) -> Result<Ready> {
        let start = Instant::now();
        let mut attempts = 0u32;
        let mut last = None;
        loop {
            let elapsed = start.elapsed();
            if self.policy.expired(elapsed) {
                warn!(attempts, ?elapsed, "daemon did not become ready");
                return Err(Error::Timeout {
                    waited: elapsed,
                    attempts,
                    last,
                });
            }

            attempts += 1;
            match self.ping_once() {
                Ok(()) => {
                    let elapsed = start.elapsed();
                    info!(attempts, ?elapsed, "daemon ready");
                    return Ok(Ready { attempts, elapsed });
                }
                Err(e) => {
                    debug!(attempt = attempts, error = %e, "daemon not ready");
                    last = Some(e.to_string());
                }
            }

            if let Some(delay) = self.policy.next_delay(start.elapsed()) {
                std::thread::sleep(delay);
            }
        }
    }

    /// Makes a single liveness attempt without retrying.
    pub fn ping_once(&self) -> Result<()> {
        let mut conn = self.dial.dial()?;
        conn.write_all(Command::Ping.as_bytes())
            .and_then(|()| conn.flush())
            .map_err(Error::Write)?;

        let mut buf = [0u8; PONG_BUF];
        let n = loop {
            match conn.read(&mut buf) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Read(e)),
            }
        };
        if clamwire_proto::is_pong(&buf[..n]) {
            Ok(())
        } else {
            Err(Error::UnexpectedReply(
                clamwire_proto::trim_reply(&buf[..n]).into_owned(),
            ))
        }
    }
}
