//! PublishDocument: sends a whole document as one authenticated batch.

use smap_core::{send_void, BatchError, BatchRequest, ByteSink, Document, KeyPathConfig};
use tracing::{debug, info, warn};

/// Outcome of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    /// Number of path records in the batch.
    pub records: usize,
    /// Bytes the transport accepted.
    pub bytes: usize,
}

/// Publishes documents with a fixed credential and key-path configuration.
#[derive(Debug, Clone)]
pub struct PublishDocument {
    credential: String,
    keypath: KeyPathConfig,
    sort_paths: bool,
}

impl PublishDocument {
    pub fn new(credential: impl Into<String>, keypath: KeyPathConfig) -> Self {
        Self {
            credential: credential.into(),
            keypath,
            sort_paths: false,
        }
    }

    /// Publish paths in lexicographic order rather than document order.
    pub fn with_sorted_paths(mut self, sort_paths: bool) -> Self {
        self.sort_paths = sort_paths;
        self
    }

    /// Builds every record and, only if all succeed, sends the batch with a
    /// single `sink.send` call.
    ///
    /// # Errors
    ///
    /// Returns the [`BatchError`] from building, encoding or sending.  On a
    /// build error the sink is never called.
    pub fn execute(
        &self,
        mut document: Document,
        sink: &mut dyn ByteSink,
    ) -> Result<PublishReport, BatchError> {
        if self.sort_paths {
            document.sort_paths();
        }
        if document.is_empty() {
            warn!("publishing an empty document");
        }

        let batch = BatchRequest::build(self.credential.as_str(), &document, &self.keypath)?;
        let bytes = batch.send(sink)?;
        info!("published {} records ({bytes} bytes)", batch.len());
        Ok(PublishReport {
            records: batch.len(),
            bytes,
        })
    }

    /// Sends a `Void` request carrying only the credential.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Protocol`] or [`BatchError::Transport`].
    pub fn ping(&self, sink: &mut dyn ByteSink) -> Result<usize, BatchError> {
        let bytes = send_void(&self.credential, sink)?;
        debug!("sent void request ({bytes} bytes)");
        Ok(bytes)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
