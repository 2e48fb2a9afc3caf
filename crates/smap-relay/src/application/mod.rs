//! Application layer use cases for the relay.
//!
//! Both use cases depend on the `smap-core` transport traits only; sockets
//! are injected by the infrastructure layer.
//!
//! - **`publish`** – Builds one batch from a document and hands it to a
//!   [`smap_core::ByteSink`].
//! - **`ingest`** – Decodes a received frame into an [`IngestEvent`].

pub mod ingest;
pub mod publish;

pub use ingest::{IngestEvent, IngestFrames};
pub use publish::{PublishDocument, PublishReport};
