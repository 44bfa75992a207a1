//! Daemon replies and their classification.

use std::borrow::Cow;
use std::io::{self, Read};

use serde::Serialize;

use crate::command::PONG;

/// Reply text meaning the stream is clean.
pub const REPLY_OK: &str = "OK";

/// Size of each read while collecting a reply.
const READ_BUF: usize = 2048;

/// Largest reply accepted before giving up (64 KiB).
const MAX_REPLY: usize = 64 * 1024;

/// Outcome of one scan session.
///
/// `diagnostic` is empty exactly when the stream is clean.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Verdict {
    /// Whether the daemon reported anything other than `OK`.
    flagged: bool,
    /// Daemon-supplied text for a flagged stream.
    diagnostic: String,
}

impl Verdict {
    /// A clean verdict.
    pub const fn clean() -> Self {
        Self {
            flagged: false,
            diagnostic: String::new(),
        }
    }

    /// Returns `true` if the daemon flagged the stream.
    pub const fn is_flagged(&self) -> bool {
        self.flagged
    }

    /// Daemon text for a flagged stream; empty when clean.
    pub fn diagnostic(&self) -> &str {
        &self.diagnostic
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.flagged {
            f.write_str(&self.diagnostic)
        } else {
            f.write_str(REPLY_OK)
        }
    }
}

/// Collects a reply from `r`.
///
/// Reads until the connection reaches EOF or a read ends with a NUL byte.
/// The NUL is dropped; everything before it is kept as-is. Replies longer
/// than 64 KiB fail with `InvalidData` however they are terminated.
pub fn read_reply(r: &mut impl Read) -> io::Result<Vec<u8>> {
    let mut buf = [0u8; READ_BUF];
    let mut reply = Vec::new();
    loop {
        let n = match r.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        let (chunk, last) = match buf[..n].split_last() {
            Some((0, rest)) => (rest, true),
            _ => (&buf[..n], false),
        };
        reply.extend_from_slice(chunk);
        if reply.len() > MAX_REPLY {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "reply exceeds 64 KiB limit",
            ));
        }
        if last {
            break;
        }
    }
    Ok(reply)
}

/// Decodes a reply and strips surrounding whitespace and NUL bytes.
pub fn trim_reply(reply: &[u8]) -> Cow<'_, str> {
    match String::from_utf8_lossy(reply) {
        Cow::Borrowed(s) => Cow::Borrowed(s.trim_matches(is_padding)),
        Cow::Owned(s) => Cow::Owned(s.trim_matches(is_padding).to_owned()),
    }
}

/// Classifies a scan reply.
///
/// Returns `None` when the reply is empty after trimming: the daemon closed
/// without saying anything, which is neither clean nor a detection.
pub fn classify(reply: &[u8]) -> Option<Verdict> {
    let text = trim_reply(reply);
    if text.is_empty() {
        None
    } else if text == REPLY_OK {
        Some(Verdict::clean())
    } else {
        Some(Verdict {
            flagged: true,
            diagnostic: text.into_owned(),
        })
    }
}

/// Returns `true` if `reply` is the liveness answer.
pub fn is_pong(reply: &[u8]) -> bool {
    trim_reply(reply) == PONG
}

/// Whitespace or NUL.
fn is_padding(c: char) -> bool {
    c.is_whitespace() || c == '\0'
}
