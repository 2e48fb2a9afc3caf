//! Length-delimited framing for byte streams.
//!
//! ```text
//! [frame_len:4][frame:N]   (frame_len big-endian)
//! ```

use std::io::{self, Read, Write};

use crate::transport::{ByteSink, ByteSource, TransportError};

/// Largest frame accepted by default (16 MiB).
pub const DEFAULT_MAX_FRAME: usize = 16 * 1024 * 1024;

/// Writes each frame with a 4-byte length prefix.
#[derive(Debug)]
pub struct StreamSink<W> {
    writer: W,
    max_frame: usize,
}

impl<W: Write> StreamSink<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            max_frame: DEFAULT_MAX_FRAME,
        }
    }

    pub fn with_max_frame(writer: W, max_frame: usize) -> Self {
        Self { writer, max_frame }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> ByteSink for StreamSink<W> {
    fn send(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        if frame.len() > self.max_frame {
            return Err(TransportError::Oversized {
                len: frame.len(),
                max: self.max_frame,
            });
        }
        let len = u32::try_from(frame.len()).map_err(|_| TransportError::Oversized {
            len: frame.len(),
            max: u32::MAX as usize,
        })?;

        let mut buf = Vec::with_capacity(4 + frame.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.extend_from_slice(frame);
        self.writer.write_all(&buf)?;
        self.writer.flush()?;
        Ok(frame.len())
    }
}

/// Reads 4-byte length-prefixed frames.
///
/// Bytes of a partly read frame are kept across calls, so a reader with a
/// read timeout can return `WouldBlock`/`TimedOut` mid-frame and the next
/// `receive` resumes where it stopped.
#[derive(Debug)]
pub struct StreamSource<R> {
    reader: R,
    max_frame: usize,
    pending: Vec<u8>,
}

impl<R: Read> StreamSource<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_frame(reader, DEFAULT_MAX_FRAME)
    }

    pub fn with_max_frame(reader: R, max_frame: usize) -> Self {
        Self {
            reader,
            max_frame,
            pending: Vec::new(),
        }
    }

    /// Reads until `pending` holds `want` bytes.  `Ok(false)` on a clean end
    /// of stream between frames.
    fn fill(&mut self, want: usize) -> io::Result<bool> {
        while self.pending.len() < want {
            let start = self.pending.len();
            self.pending.resize(want, 0);
            match self.reader.read(&mut self.pending[start..]) {
                Ok(0) => {
                    self.pending.truncate(start);
                    if start == 0 {
                        return Ok(false);
                    }
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "stream ended inside a frame",
                    ));
                }
                Ok(n) => self.pending.truncate(start + n),
                Err(e) => {
                    self.pending.truncate(start);
                    if e.kind() != io::ErrorKind::Interrupted {
                        return Err(e);
                    }
                }
            }
        }
        Ok(true)
    }
}

impl<R: Read> ByteSource for StreamSource<R> {
    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if !self.fill(4)? {
            return Ok(None);
        }
        let len = u32::from_be_bytes([
            self.pending[0],
            self.pending[1],
            self.pending[2],
            self.pending[3],
        ]) as usize;
        if len > self.max_frame {
            self.pending.clear();
            return Err(TransportError::Oversized {
                len,
                max: self.max_frame,
            });
        }
        self.fill(4 + len)?;
        let frame = self.pending.split_off(4);
        self.pending.clear();
        Ok(Some(frame))
    }
}
