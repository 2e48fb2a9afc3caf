//! # smap-core
//!
//! Codec between the nested sMAP document model and a flat, schema-bound
//! binary wire format.
//!
//! This crate has no dependencies on sockets or async runtimes.  Transports
//! are injected through the [`transport::ByteSink`] and
//! [`transport::ByteSource`] traits, so the same code runs over UDP, TCP, or
//! an in-memory test double.
//!
//! # Architecture overview
//!
//! A *document* maps hierarchical paths (`/fast/sensor0`) to records holding
//! contents, properties, nested metadata, time-series readings and a UUID.
//! The wire schema only understands flat lists, so the pieces fit together
//! like this:
//!
//! - **`keypath`** – Flattens nested metadata into `("Nested/key", "value")`
//!   pairs and rebuilds the tree from such pairs.
//!
//! - **`document`** – The nested document model: [`Node`], [`PathRecord`],
//!   [`Document`].
//!
//! - **`record`** – Turns one `(path, PathRecord)` into a [`WireRecord`] and
//!   back.
//!
//! - **`protocol`** – Wire types and the big-endian binary codec
//!   (8-byte header + payload).
//!
//! - **`batch`** – Packages a credential plus many records into one request
//!   and hands it to a transport in a single call.
//!
//! - **`transport`** – The byte sink/source seams plus loopback and
//!   length-delimited stream adapters.

pub mod batch;
pub mod document;
pub mod keypath;
pub mod protocol;
pub mod record;
pub mod transport;

pub use batch::{decode_frame, publish, receive, send_void, BatchError, Received};
pub use document::{Document, Identifier, Node, NodeMap, PathRecord, Reading, ReadingValue};
pub use keypath::{flatten, unflatten, KeyPathConfig, KeyPathError, Suppression};
pub use protocol::codec::{decode_request, encode_batch, encode_void, ProtocolError};
pub use protocol::messages::{BatchRequest, Pair, Request, WireReading, WireRecord};
pub use record::{build_record, read_record, DecodedRecord, RecordError};
pub use transport::{ByteSink, ByteSource, TransportError};
