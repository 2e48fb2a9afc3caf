use std::collections::VecDeque;

use crate::transport::{ByteSink, ByteSource, TransportError};

/// In-memory transport: frames sent are queued and received in FIFO order.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    frames: VecDeque<Vec<u8>>,
    max_frame: Option<usize>,
    closed: bool,
    sends: usize,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rejects frames larger than `max` bytes, like a datagram socket would.
    pub fn with_max_frame(max: usize) -> Self {
        Self {
            max_frame: Some(max),
            ..Self::default()
        }
    }

    /// Refuses further sends; queued frames can still be received.
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Number of successful `send` calls so far.
    pub fn send_count(&self) -> usize {
        self.sends
    }

    /// Number of frames waiting to be received.
    pub fn pending(&self) -> usize {
        self.frames.len()
    }
}

impl ByteSink for LoopbackTransport {
    fn send(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        if let Some(max) = self.max_frame {
            if frame.len() > max {
                return Err(TransportError::Oversized {
                    len: frame.len(),
                    max,
                });
            }
        }
        self.frames.push_back(frame.to_vec());
        self.sends += 1;
        Ok(frame.len())
    }
}

impl ByteSource for LoopbackTransport {
    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.frames.pop_front())
    }
}
