//! Infrastructure layer: JSON documents and socket transports.
//!
//! - **`json_document`** – JSON text ↔ [`smap_core::Document`].
//! - **`udp`** – One frame per datagram.
//! - **`tcp`** – Length-delimited frames over a TCP stream.
//!
//! Both listeners are blocking loops meant to run on a dedicated thread.
//! They poll a shared `running` flag between receives and forward decoded
//! requests over a `tokio` channel.

pub mod json_document;
pub mod tcp;
pub mod udp;

use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{atomic::AtomicBool, Arc};

use smap_core::ByteSink;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::info;

use crate::application::{IngestEvent, IngestFrames};
use crate::domain::{NetworkConfig, TransportKind};

/// Error type for socket setup.
#[derive(Debug, Error)]
pub enum NetworkError {
    /// The address string could not be resolved.
    #[error("failed to resolve '{addr}': {source}")]
    Resolve {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// The address resolved to nothing.
    #[error("'{addr}' did not resolve to any socket address")]
    Unresolved { addr: String },

    /// A socket could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// A TCP connection could not be established.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// Socket option or other I/O failure.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opens the sink `send` publishes through.
///
/// # Errors
///
/// Returns a [`NetworkError`] if the target cannot be resolved, bound or
/// connected.
pub fn open_sink(network: &NetworkConfig) -> Result<Box<dyn ByteSink + Send>, NetworkError> {
    let sink: Box<dyn ByteSink + Send> = match network.transport {
        TransportKind::Udp => Box::new(udp::UdpSink::connect(
            &network.target,
            network.max_datagram_size,
        )?),
        TransportKind::Tcp => Box::new(tcp::connect_sink(
            &network.target,
            network.max_datagram_size,
        )?),
    };
    info!("publishing over {} to {}", network.transport, network.target);
    Ok(sink)
}

/// Binds `network.bind_address` and runs the matching listener until
/// `running` is cleared.  Blocks the calling thread.
///
/// # Errors
///
/// Returns a [`NetworkError`] if the socket cannot be bound.
pub fn run_listener(
    network: &NetworkConfig,
    ingest: IngestFrames,
    tx: mpsc::Sender<IngestEvent>,
    running: Arc<AtomicBool>,
) -> Result<(), NetworkError> {
    match network.transport {
        TransportKind::Udp => {
            let socket = udp::bind_listener(&network.bind_address, network.read_timeout())?;
            info!("listening on UDP {}", socket.local_addr()?);
            udp::run_udp_listener(socket, network.max_datagram_size, ingest, tx, running);
        }
        TransportKind::Tcp => {
            let listener = tcp::bind_listener(&network.bind_address)?;
            info!("listening on TCP {}", listener.local_addr()?);
            let limits = tcp::TcpLimits {
                max_frame: network.max_datagram_size,
                poll_interval: network.read_timeout(),
                max_connections: network.max_connections,
            };
            tcp::run_tcp_listener(listener, limits, ingest, tx, running);
        }
    }
    Ok(())
}

/// Resolves `addr` to its first socket address.
pub(crate) fn resolve(addr: &str) -> Result<SocketAddr, NetworkError> {
    addr.to_socket_addrs()
        .map_err(|source| NetworkError::Resolve {
            addr: addr.to_string(),
            source,
        })?
        .next()
        .ok_or_else(|| NetworkError::Unresolved {
            addr: addr.to_string(),
        })
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
pub(crate) fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}
