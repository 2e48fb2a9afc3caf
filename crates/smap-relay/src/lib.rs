//! smap-relay library crate.
//!
//! Publishes JSON sMAP documents as single wire batches and listens for
//! batches from other producers.
//!
//! # Architecture
//!
//! ```text
//! JSON document file                      UDP / TCP socket
//!         ↓                                       ↓
//! infrastructure::json_document      infrastructure::{udp, tcp}
//!         ↓                                       ↓
//! application::publish  ── smap-core ──  application::ingest
//!         ↓                                       ↓
//! infrastructure::{udp, tcp}          stdout (rendered JSON)
//! ```
//!
//! - `domain` holds the relay configuration and has no I/O apart from
//!   reading the config file.
//! - `application` depends on `domain` and the `smap-core` transport traits.
//! - `infrastructure` owns sockets and JSON conversion.

/// Domain layer: relay configuration.
pub mod domain;

/// Application layer: publish and ingest use cases.
pub mod application;

/// Infrastructure layer: JSON documents and socket transports.
pub mod infrastructure;
