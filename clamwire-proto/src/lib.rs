//! Wire protocol for the clamd streaming scan interface.
//!
//! Commands are NUL-delimited ASCII tokens (`zPING\0`, `zINSTREAM\0`).
//! Stream payloads are framed with a 4-byte big-endian length prefix and
//! terminated by a zero-length frame. Replies are free text, terminated by
//! a trailing NUL or by the daemon closing the connection.
//!
//! This crate does no socket handling: every function works over any
//! [`std::io::Read`] / [`std::io::Write`].

mod command;
mod frame;
mod reply;

pub use command::{Command, PONG};
pub use frame::{MAX_FRAME, read_frame, write_chunk, write_end_marker};
pub use reply::{REPLY_OK, Verdict, classify, is_pong, read_reply, trim_reply};
