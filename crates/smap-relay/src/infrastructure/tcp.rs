//! TCP transport: `u32` length-delimited frames over a stream.
//!
//! The accept loop runs on a non-blocking listener and sleeps for the poll
//! interval when no connection is pending.  Each accepted connection is
//! served on its own thread, up to a fixed number at once, until the peer
//! closes it, sends something that breaks the framing, or `running` is
//! cleared.  Connection threads wake every poll interval to re-check the
//! flag, so shutdown does not wait for idle clients.

use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::time::Duration;

use smap_core::transport::{StreamSink, StreamSource};
use smap_core::{ByteSource, TransportError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{is_timeout_error, resolve, NetworkError};
use crate::application::{IngestEvent, IngestFrames};

/// How long `connect_sink` waits for the handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connects to `target` and wraps the stream in a length-delimited sink.
///
/// # Errors
///
/// Returns [`NetworkError`] if `target` does not resolve or refuses the
/// connection.
pub fn connect_sink(target: &str, max_frame: usize) -> Result<StreamSink<TcpStream>, NetworkError> {
    let addr = resolve(target)?;
    let stream = TcpStream::connect_timeout(&addr, CONNECT_TIMEOUT)
        .map_err(|source| NetworkError::Connect { addr, source })?;
    stream.set_nodelay(true)?;
    Ok(StreamSink::with_max_frame(stream, max_frame))
}

/// Binds a non-blocking listener on `bind_address`.
///
/// # Errors
///
/// Returns [`NetworkError`] if the address does not resolve or the bind
/// fails.
pub fn bind_listener(bind_address: &str) -> Result<TcpListener, NetworkError> {
    let addr = resolve(bind_address)?;
    let listener = TcpListener::bind(addr).map_err(|source| NetworkError::Bind { addr, source })?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

/// Limits shared by the accept loop and every connection thread.
#[derive(Debug, Clone, Copy)]
pub struct TcpLimits {
    pub max_frame: usize,
    pub poll_interval: Duration,
    pub max_connections: usize,
}

/// Releases a connection slot when its thread ends.
struct ConnectionSlot(Arc<AtomicUsize>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::Relaxed);
    }
}

/// The accept loop.  Returns when `running` is cleared; connection threads
/// follow within one poll interval.
pub fn run_tcp_listener(
    listener: TcpListener,
    limits: TcpLimits,
    ingest: IngestFrames,
    tx: mpsc::Sender<IngestEvent>,
    running: Arc<AtomicBool>,
) {
    let active = Arc::new(AtomicUsize::new(0));

    while running.load(Ordering::Relaxed) {
        let (stream, peer) = match listener.accept() {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => {
                std::thread::sleep(limits.poll_interval);
                continue;
            }
            Err(e) => {
                error!("tcp accept error: {e}");
                std::thread::sleep(limits.poll_interval);
                continue;
            }
        };

        let count = active.load(Ordering::Relaxed);
        if count >= limits.max_connections {
            warn!("refusing connection from {peer}: {count} connections already active");
            continue;
        }
        active.fetch_add(1, Ordering::Relaxed);
        let slot = ConnectionSlot(Arc::clone(&active));
        debug!("connection from {peer} ({} active)", count + 1);

        let ingest = ingest.clone();
        let tx = tx.clone();
        let running = Arc::clone(&running);
        let spawned = std::thread::Builder::new()
            .name(format!("smap-relay-{peer}"))
            .spawn(move || {
                let _slot = slot;
                serve_connection(stream, peer, limits, ingest, tx, running)
            });
        if let Err(e) = spawned {
            error!("failed to spawn connection thread for {peer}: {e}");
        }
    }

    info!(
        "tcp listener stopped ({} connections still closing)",
        active.load(Ordering::Relaxed)
    );
}

/// Reads frames from one connection until it closes or `running` is
/// cleared.
///
/// A frame that fails to decode is dropped; the length prefix keeps the
/// stream aligned so the next frame is still readable.  Transport errors
/// close the connection.
fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    limits: TcpLimits,
    ingest: IngestFrames,
    tx: mpsc::Sender<IngestEvent>,
    running: Arc<AtomicBool>,
) {
    let configured = stream
        .set_nonblocking(false)
        .and_then(|()| stream.set_read_timeout(Some(limits.poll_interval)));
    if let Err(e) = configured {
        warn!("closing connection from {peer}: {e}");
        return;
    }
    let mut source = StreamSource::with_max_frame(stream, limits.max_frame);

    while running.load(Ordering::Relaxed) {
        match source.receive() {
            Ok(Some(frame)) => match ingest.handle(&frame, peer) {
                Ok(event) => {
                    if tx.blocking_send(event).is_err() {
                        break;
                    }
                }
                Err(e) => warn!("dropping frame from {peer}: {e}"),
            },
            Ok(None) => {
                debug!("{peer} closed the connection");
                break;
            }
            Err(TransportError::Io(e)) if is_timeout_error(&e) => continue,
            Err(e) => {
                warn!("closing connection from {peer}: {e}");
                break;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
