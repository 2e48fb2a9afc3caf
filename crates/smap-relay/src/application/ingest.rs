//! IngestFrames: turns received frames into documents.

use std::net::SocketAddr;

use smap_core::{decode_frame, BatchError, Document, KeyPathConfig, Received};
use tracing::debug;

/// A successfully decoded request, tagged with the peer that sent it.
#[derive(Debug, Clone, PartialEq)]
pub enum IngestEvent {
    /// A `Void` request: credential only, no data.
    Keepalive {
        source: SocketAddr,
        credential: String,
    },
    /// A `WriteData` request rebuilt into nested form.
    Document {
        source: SocketAddr,
        credential: String,
        document: Document,
    },
}

impl IngestEvent {
    pub fn source(&self) -> SocketAddr {
        match self {
            IngestEvent::Keepalive { source, .. } | IngestEvent::Document { source, .. } => {
                *source
            }
        }
    }

    pub fn credential(&self) -> &str {
        match self {
            IngestEvent::Keepalive { credential, .. }
            | IngestEvent::Document { credential, .. } => credential,
        }
    }
}

/// Decodes frames with a fixed key-path configuration.
#[derive(Debug, Clone, Default)]
pub struct IngestFrames {
    keypath: KeyPathConfig,
}

impl IngestFrames {
    pub fn new(keypath: KeyPathConfig) -> Self {
        Self { keypath }
    }

    /// Decodes one complete frame from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Protocol`] for a malformed frame and
    /// [`BatchError::Record`] if a record cannot be rebuilt.  The caller
    /// decides whether to drop the frame or the connection.
    pub fn handle(&self, frame: &[u8], source: SocketAddr) -> Result<IngestEvent, BatchError> {
        let event = match decode_frame(frame, &self.keypath)? {
            Received::Void { credential } => IngestEvent::Keepalive { source, credential },
            received @ Received::Data { .. } => {
                let document = received.document();
                debug!("{} paths from {source}", document.len());
                IngestEvent::Document {
                    source,
                    credential: received.credential().to_string(),
                    document,
                }
            }
        };
        Ok(event)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
