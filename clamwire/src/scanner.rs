//! Stream scan sessions.
//!
//! A session sends `zINSTREAM\0`, pumps the source through length-prefixed
//! frames as it is read, ends with a zero-length frame and then reads the
//! verdict. Memory use is bounded by the chunk size, not the source size.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use clamwire_proto::{Command, Verdict};
use tracing::{debug, trace};

use crate::config::{Config, DEFAULT_CHUNK_SIZE};
use crate::connection::{Connector, Dial};
use crate::{Error, Result};

/// Scans byte sources, one connection per call.
///
/// Safe to share between threads when `D` is: sessions never share state.
#[derive(Debug, Clone)]
pub struct Scanner<D = Connector> {
    /// Opens one connection per session.
    dial: D,
    /// Bytes read from the source per frame.
    chunk_size: usize,
    /// Largest stream sent before the session is abandoned.
    max_stream_len: Option<u64>,
}

impl Scanner {
    /// Creates a scanner from validated configuration.
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.connector())
            .chunk_size(cfg.chunk_size)
            .max_stream_len(cfg.max_stream_len)
    }
}

impl<D: Dial> Scanner<D> {
    /// Creates a scanner with 2 KiB chunks and no stream limit.
    pub const fn new(dial: D) -> Self {
        Self {
            dial,
            chunk_size: DEFAULT_CHUNK_SIZE,
            max_stream_len: None,
        }
    }

    /// Sets the number of bytes read from the source per frame (minimum 1).
    #[must_use]
    pub fn chunk_size(mut self, n: usize) -> Self {
        self.chunk_size = n.clamp(1, u32::MAX as usize);
        self
    }

    /// Caps the number of bytes a session may stream.
    #[must_use]
    pub const fn max_stream_len(mut self, limit: Option<u64>) -> Self {
        self.max_stream_len = limit;
        self
    }

    /// Streams `source` to the daemon and returns its verdict.
    ///
    /// Fails fast with no retry. The connection is closed on every path.
    pub fn scan(&self, mut source: impl Read) -> Result<Verdict> {
        let mut conn = self.dial.dial()?;
        self.session(&mut conn, &mut source)
    }

    /// Scans an in-memory buffer.
    pub fn scan_bytes(&self, data: &[u8]) -> Result<Verdict> {
        self.scan(data)
    }

    /// Scans the file at `path`.
    pub fn scan_path(&self, path: impl AsRef<Path>) -> Result<Verdict> {
        let file = File::open(path).map_err(Error::Source)?;
        self.scan(file)
    }

    /// Runs one session over an open connection.
    fn session(&self, conn: &mut D::Conn, source: &mut impl Read) -> Result<Verdict> {
        let mut w = BufWriter::with_capacity(self.chunk_size + 4, &mut *conn);
        let pumped = self.pump(&mut w, source);
        // Never flush after a failure: unsent frame bytes are dropped with
        // the connection.
        let _ = w.into_parts();
        let (sent, frames) = pumped?;

        let reply = clamwire_proto::read_reply(conn).map_err(Error::Read)?;
        let verdict = clamwire_proto::classify(&reply).ok_or(Error::EmptyReply)?;
        debug!(
            bytes = sent,
            frames,
            flagged = verdict.is_flagged(),
            "scan finished"
        );
        Ok(verdict)
    }

    /// Sends the command, every frame and the end marker.
    ///
    /// Returns the byte and frame counts.
    fn pump(&self, w: &mut impl Write, source: &mut impl Read) -> Result<(u64, u64)> {
        w.write_all(Command::Instream.as_bytes())
            .map_err(Error::Write)?;

        let mut buf = vec![0u8; self.chunk_size];
        let mut sent: u64 = 0;
        let mut frames: u64 = 0;
        loop {
            let n = match source.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Source(e)),
            };
            sent += n as u64;
            if let Some(limit) = self.max_stream_len.filter(|&limit| sent > limit) {
                return Err(Error::StreamTooLarge { limit });
            }
            clamwire_proto::write_chunk(w, &buf[..n]).map_err(Error::Write)?;
            frames += 1;
            trace!(len = n, "frame sent");
        }
        clamwire_proto::write_end_marker(w).map_err(Error::Write)?;
        Ok((sent, frames))
    }
}
