//! Transport seams.
//!
//! The codec never owns a socket.  It hands finished frames to a
//! [`ByteSink`] and pulls frames from a [`ByteSource`]; the caller decides
//! whether that is a UDP socket, a TCP stream, or a test double.
//!
//! Implementations provided here:
//!
//! - [`LoopbackTransport`] – in-memory queue, useful for tests and for
//!   wiring a producer directly to a consumer in one process.
//! - [`StreamSink`] / [`StreamSource`] – `u32` length-delimited framing over
//!   any `Write` / `Read`, for connection-oriented streams that do not frame
//!   messages themselves.

mod loopback;
mod stream;

use thiserror::Error;

pub use loopback::LoopbackTransport;
pub use stream::{StreamSink, StreamSource, DEFAULT_MAX_FRAME};

/// Errors surfaced by a transport.  The codec passes these through untouched.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying socket or stream failed.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The transport has been closed and accepts no more frames.
    #[error("transport closed")]
    Closed,

    /// The frame is larger than the transport can carry in one unit.
    #[error("frame of {len} bytes exceeds transport limit of {max} bytes")]
    Oversized { len: usize, max: usize },

    /// The transport refused the frame for an implementation-specific reason.
    #[error("transport rejected frame: {0}")]
    Rejected(String),
}

/// Something that accepts one complete frame per call.
#[cfg_attr(test, mockall::automock)]
pub trait ByteSink {
    /// Sends `frame` as a single unit and returns the number of bytes the
    /// transport accepted.
    fn send(&mut self, frame: &[u8]) -> Result<usize, TransportError>;
}

/// Something that yields one complete frame per call.
pub trait ByteSource {
    /// Returns the next frame, or `None` at end of stream.
    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError>;
}
