//! UDP transport: one frame per datagram.
//!
//! The listener socket has a read timeout so `recv_from` returns
//! periodically; on each timeout the loop re-checks the `running` flag and
//! exits once it is cleared.  Datagrams that fail to decode are logged and
//! dropped, and the loop keeps going.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

use smap_core::{ByteSink, TransportError};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::{is_timeout_error, resolve, NetworkError};
use crate::application::{IngestEvent, IngestFrames};

/// Sends each frame as a single datagram to a fixed target.
#[derive(Debug)]
pub struct UdpSink {
    socket: UdpSocket,
    target: SocketAddr,
    max_datagram: usize,
}

impl UdpSink {
    /// Binds an ephemeral local socket for sending to `target`.
    ///
    /// # Errors
    ///
    /// Returns [`NetworkError`] if `target` does not resolve or the local
    /// socket cannot be bound.
    pub fn connect(target: &str, max_datagram: usize) -> Result<Self, NetworkError> {
        let target = resolve(target)?;
        let local: SocketAddr = if target.is_ipv4() {
            (Ipv4Addr::UNSPECIFIED, 0).into()
        } else {
            (Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket =
            UdpSocket::bind(local).map_err(|source| NetworkError::Bind { addr: local, source })?;
        Ok(Self {
            socket,
            target,
            max_datagram,
        })
    }

    pub fn target(&self) -> SocketAddr {
        self.target
    }
}

impl ByteSink for UdpSink {
    fn send(&mut self, frame: &[u8]) -> Result<usize, TransportError> {
        if frame.len() > self.max_datagram {
            return Err(TransportError::Oversized {
                len: frame.len(),
                max: self.max_datagram,
            });
        }
        let sent = self.socket.send_to(frame, self.target)?;
        if sent != frame.len() {
            return Err(TransportError::Rejected(format!(
                "datagram truncated: sent {sent} of {} bytes",
                frame.len()
            )));
        }
        Ok(sent)
    }
}

/// Binds the listening socket with `read_timeout` applied.
///
/// # Errors
///
/// Returns [`NetworkError`] if the address does not resolve, the bind fails
/// or the timeout cannot be set.
pub fn bind_listener(bind_address: &str, read_timeout: Duration) -> Result<UdpSocket, NetworkError> {
    let addr = resolve(bind_address)?;
    let socket = UdpSocket::bind(addr).map_err(|source| NetworkError::Bind { addr, source })?;
    socket.set_read_timeout(Some(read_timeout))?;
    Ok(socket)
}

/// The receive loop.  Returns when `running` is cleared or the receiving end
/// of `tx` is dropped.
pub fn run_udp_listener(
    socket: UdpSocket,
    max_datagram: usize,
    ingest: IngestFrames,
    tx: mpsc::Sender<IngestEvent>,
    running: Arc<AtomicBool>,
) {
    // One spare byte detects datagrams longer than the limit.
    let mut buf = vec![0u8; max_datagram + 1];

    while running.load(Ordering::Relaxed) {
        let (len, src) = match socket.recv_from(&mut buf) {
            Ok(pair) => pair,
            Err(e) if is_timeout_error(&e) => continue,
            Err(e) => {
                error!("udp recv error: {e}");
                continue;
            }
        };

        if len > max_datagram {
            warn!("dropping datagram from {src}: larger than {max_datagram} bytes");
            continue;
        }

        match ingest.handle(&buf[..len], src) {
            Ok(event) => {
                debug!("{len}-byte request from {src}");
                if tx.blocking_send(event).is_err() {
                    // Receiver dropped – relay is shutting down.
                    break;
                }
            }
            Err(e) => warn!("dropping datagram from {src}: {e}"),
        }
    }

    info!("udp listener stopped");
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::PublishDocument;
    use smap_core::{Document, KeyPathConfig, Node, NodeMap, PathRecord, Reading};

    fn sample_document() -> Document {
        let mut metadata = NodeMap::new();
        metadata.insert("Site".into(), Node::from("Test Site"));
        let mut doc = Document::new();
        doc.insert(
            "/fast/sensor0",
            PathRecord {
                metadata,
                readings: vec![Reading::new(1, 2.0)],
                ..Default::default()
            },
        );
        doc
    }

    #[test]
    fn test_sink_rejects_frame_over_datagram_limit() {
        // Arrange
        let mut sink = UdpSink::connect("127.0.0.1:9", 16).unwrap();

        // Act
        let result = sink.send(&[0u8; 17]);

        // Assert
        assert!(matches!(
            result,
            Err(TransportError::Oversized { len: 17, max: 16 })
        ));
    }

    #[test]
    fn test_sink_resolves_target() {
        let sink = UdpSink::connect("127.0.0.1:8002", 1024).unwrap();
        assert_eq!(sink.target().port(), 8002);
    }

    #[test]
    fn test_listener_drops_garbage_and_delivers_valid_request() {
        // Arrange
        let socket = bind_listener("127.0.0.1:0", Duration::from_millis(20)).unwrap();
        let addr = socket.local_addr().unwrap();
        let running = Arc::new(AtomicBool::new(true));
        let (tx, mut rx) = mpsc::channel(8);
        let listener = {
            let running = Arc::clone(&running);
            std::thread::spawn(move || {
                run_udp_listener(socket, 65_507, IngestFrames::default(), tx, running)
            })
        };
        let mut sink = UdpSink::connect(&addr.to_string(), 65_507).unwrap();

        // Act
        sink.send(b"not a frame").unwrap();
        PublishDocument::new("apikey", KeyPathConfig::default())
            .execute(sample_document(), &mut sink)
            .unwrap();
        let event = tokio_test::block_on(rx.recv()).expect("one event");

        // Assert
        running.store(false, Ordering::Relaxed);
        listener.join().unwrap();
        assert_eq!(event.credential(), "apikey");
        match event {
            IngestEvent::Document { document, .. } => assert_eq!(document, sample_document()),
            other => panic!("expected document, got {other:?}"),
        }
    }

    #[test]
    fn test_listener_stops_when_flag_cleared() {
        let socket = bind_listener("127.0.0.1:0", Duration::from_millis(10)).unwrap();
        let running = Arc::new(AtomicBool::new(false));
        let (tx, mut rx) = mpsc::channel(1);

        run_udp_listener(socket, 1024, IngestFrames::default(), tx, running);

        // The sender was dropped when the loop returned.
        assert!(tokio_test::block_on(rx.recv()).is_none());
    }
}
