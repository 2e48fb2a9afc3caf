//! Batching records into one authenticated request, and back.
//!
//! Building never performs I/O.  Sending performs exactly one
//! [`ByteSink::send`] call per batch, so either the whole request reaches
//! the transport or nothing does.  A failure in any record aborts the batch
//! before the transport is touched.

use thiserror::Error;
use tracing::debug;

use crate::document::Document;
use crate::keypath::KeyPathConfig;
use crate::protocol::codec::{decode_request, encode_batch, encode_void, ProtocolError};
use crate::protocol::messages::{BatchRequest, Request};
use crate::record::{build_record, read_record, DecodedRecord, RecordError};
use crate::transport::{ByteSink, ByteSource, TransportError};

/// Errors from building, sending or receiving a batch.
#[derive(Debug, Error)]
pub enum BatchError {
    /// A record could not be built or read; the error names its path.
    #[error("record error: {0}")]
    Record(#[from] RecordError),

    /// The request could not be encoded or decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The injected transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl BatchRequest {
    /// Builds one wire record per document entry, in the document's order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordError`] encountered; no partial batch is
    /// returned.
    pub fn build(
        credential: impl Into<String>,
        document: &Document,
        config: &KeyPathConfig,
    ) -> Result<Self, BatchError> {
        let records = document
            .iter()
            .map(|(path, record)| build_record(path, record, config))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("built batch of {} records", records.len());
        Ok(Self {
            credential: credential.into(),
            records,
        })
    }

    /// Encodes this batch as a framed `WriteData` request.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Protocol`] if a field is too large to encode.
    pub fn encode(&self) -> Result<Vec<u8>, BatchError> {
        Ok(encode_batch(self)?)
    }

    /// Encodes the batch and hands it to `sink` in a single call.
    ///
    /// Returns the number of bytes the transport accepted.
    ///
    /// # Errors
    ///
    /// Returns [`BatchError::Protocol`] on encoding failure (nothing is sent)
    /// or [`BatchError::Transport`] if the sink fails.
    pub fn send(&self, sink: &mut dyn ByteSink) -> Result<usize, BatchError> {
        let frame = self.encode()?;
        let sent = sink.send(&frame)?;
        debug!(
            "sent batch: {} records, {} bytes accepted of {}",
            self.records.len(),
            sent,
            frame.len()
        );
        Ok(sent)
    }

    /// Reads every record back into the nested shape, in wire order.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordError`] encountered.
    pub fn read_records(&self, config: &KeyPathConfig) -> Result<Vec<DecodedRecord>, BatchError> {
        Ok(self
            .records
            .iter()
            .map(|wire| read_record(wire, config))
            .collect::<Result<Vec<_>, _>>()?)
    }

    /// Consumes the batch and collects its records into a document keyed by
    /// path.  A path repeated within the batch keeps its last record.
    ///
    /// # Errors
    ///
    /// Returns the first [`RecordError`] encountered.
    pub fn into_document(self, config: &KeyPathConfig) -> Result<Document, BatchError> {
        Ok(self
            .read_records(config)?
            .into_iter()
            .map(|decoded| (decoded.path, decoded.record))
            .collect())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Builds a batch from `document` and sends it.
///
/// The transport is only touched after every record has been built.
///
/// # Errors
///
/// See [`BatchRequest::build`] and [`BatchRequest::send`].
pub fn publish(
    credential: &str,
    document: &Document,
    config: &KeyPathConfig,
    sink: &mut dyn ByteSink,
) -> Result<usize, BatchError> {
    BatchRequest::build(credential, document, config)?.send(sink)
}

/// Sends a `Void` request carrying only the credential.
///
/// # Errors
///
/// Returns [`BatchError::Protocol`] or [`BatchError::Transport`].
pub fn send_void(credential: &str, sink: &mut dyn ByteSink) -> Result<usize, BatchError> {
    let frame = encode_void(credential)?;
    Ok(sink.send(&frame)?)
}

/// A request received from a transport.
#[derive(Debug, Clone, PartialEq)]
pub enum Received {
    Void {
        credential: String,
    },
    Data {
        credential: String,
        records: Vec<DecodedRecord>,
    },
}

impl Received {
    pub fn credential(&self) -> &str {
        match self {
            Received::Void { credential } | Received::Data { credential, .. } => credential,
        }
    }

    /// The received records as a document keyed by path.  A path repeated
    /// within one batch keeps its last record.
    pub fn document(&self) -> Document {
        match self {
            Received::Void { .. } => Document::new(),
            Received::Data { records, .. } => records
                .iter()
                .map(|decoded| (decoded.path.clone(), decoded.record.clone()))
                .collect(),
        }
    }
}

/// Pulls one frame from `source` and decodes it.
///
/// Returns `Ok(None)` when the source reports end of stream.  A frame must
/// contain exactly one request.
///
/// # Errors
///
/// Returns [`BatchError::Transport`] from the source,
/// [`BatchError::Protocol`] for malformed frames, and [`BatchError::Record`]
/// if a record cannot be read back.
pub fn receive(
    source: &mut dyn ByteSource,
    config: &KeyPathConfig,
) -> Result<Option<Received>, BatchError> {
    let Some(frame) = source.receive()? else {
        return Ok(None);
    };
    decode_frame(&frame, config).map(Some)
}

/// Decodes one complete frame, e.g. a datagram, into a [`Received`] request.
///
/// # Errors
///
/// See [`receive`].
pub fn decode_frame(frame: &[u8], config: &KeyPathConfig) -> Result<Received, BatchError> {
    let (request, consumed) = decode_request(frame)?;
    if consumed != frame.len() {
        return Err(ProtocolError::MalformedPayload(format!(
            "{} trailing bytes after request",
            frame.len() - consumed
        ))
        .into());
    }

    let received = match request {
        Request::Void { credential } => Received::Void { credential },
        Request::WriteData(batch) => {
            let records = batch.read_records(config)?;
            Received::Data {
                credential: batch.credential,
                records,
            }
        }
    };
    debug!(
        "received {} request",
        match &received {
            Received::Void { .. } => "void".to_string(),
            Received::Data { records, .. } => format!("{}-record", records.len()),
        }
    );
    Ok(received)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
