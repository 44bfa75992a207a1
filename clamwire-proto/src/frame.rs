//! Length-prefixed stream frames over any `Read`/`Write` stream.
//!
//! Each frame is: `[u32 big-endian length][payload]`. A length of zero with
//! no payload marks the end of the stream and is never used for data.

use std::io::{self, Read, Write};

/// Largest payload [`read_frame`] accepts (25 MiB).
pub const MAX_FRAME: u32 = 25 * 1024 * 1024;

/// Writes `chunk` as one frame.
///
/// An empty chunk writes nothing: a zero-length frame would end the stream.
/// If this fails partway the stream is left mid-frame and must be dropped.
pub fn write_chunk<W: Write>(w: &mut W, chunk: &[u8]) -> io::Result<()> {
    if chunk.is_empty() {
        return Ok(());
    }
    let len = u32::try_from(chunk.len())
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "chunk exceeds u32::MAX"))?;
    w.write_all(&len.to_be_bytes())?;
    w.write_all(chunk)
}

/// Writes the zero-length end-of-stream marker and flushes.
pub fn write_end_marker<W: Write>(w: &mut W) -> io::Result<()> {
    w.write_all(&0u32.to_be_bytes())?;
    w.flush()
}

/// Reads one frame from `r`.
///
/// Returns `Ok(None)` for the end-of-stream marker.
pub fn read_frame(r: &mut impl Read) -> io::Result<Option<Vec<u8>>> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    let len = u32::from_be_bytes(buf);
    if len == 0 {
        return Ok(None);
    }
    if len > MAX_FRAME {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "frame exceeds 25 MiB limit",
        ));
    }
    let mut payload = vec![0u8; len as usize];
    r.read_exact(&mut payload)?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Writer that accepts `budget` bytes and then fails.
    struct Budget {
        written: Vec<u8>,
        budget: usize,
    }

    impl Write for Budget {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::ErrorKind::BrokenPipe.into());
            }
            let n = buf.len().min(self.budget);
            self.written.extend_from_slice(&buf[..n]);
            self.budget -= n;
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn chunk_has_big_endian_prefix() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"hello").unwrap();
        assert_eq!(buf, [0, 0, 0, 5, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn empty_chunk_writes_nothing() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, &[]).unwrap();
        assert!(buf.is_empty());
    }

    #[test]
    fn end_marker_is_four_zero_bytes() {
        let mut buf = Vec::new();
        write_end_marker(&mut buf).unwrap();
        assert_eq!(buf, [0, 0, 0, 0]);
    }

    #[test]
    fn prefix_for_large_chunk() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, &vec![7u8; 0x0102]).unwrap();
        assert_eq!(&buf[..4], &[0, 0, 1, 2]);
        assert_eq!(buf.len(), 4 + 0x0102);
    }

    #[test]
    fn decodes_frames_until_marker() {
        let mut buf = Vec::new();
        write_chunk(&mut buf, b"abc").unwrap();
        write_chunk(&mut buf, b"de").unwrap();
        write_end_marker(&mut buf).unwrap();

        let mut cursor = io::Cursor::new(&buf);
        assert_eq!(read_frame(&mut cursor).unwrap().as_deref(), Some(&b"abc"[..]));
        assert_eq!(read_frame(&mut cursor).unwrap().as_deref(), Some(&b"de"[..]));
        assert_eq!(read_frame(&mut cursor).unwrap(), None);
    }

    #[test]
    fn rejects_oversized_frame() {
        let header = (MAX_FRAME + 1).to_be_bytes();
        let mut cursor = io::Cursor::new(&header[..]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn truncated_payload_is_an_error() {
        let mut cursor = io::Cursor::new(&[0u8, 0, 0, 4, b'x'][..]);
        let err = read_frame(&mut cursor).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn write_failure_mid_payload_surfaces() {
        let mut w = Budget {
            written: Vec::new(),
            budget: 6,
        };
        let err = write_chunk(&mut w, b"payload").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(w.written, [0, 0, 0, 7, b'p', b'a']);
    }
}
