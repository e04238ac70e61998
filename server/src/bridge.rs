//! Per-connection bridge between a client socket and the server core.
//!
//! Each accepted connection gets one bridge task. The bridge is the only
//! code that touches the socket: it decodes whole packets, validates them
//! and forwards them to the core over a bounded channel, and it writes
//! every packet the core queues for the session. The core never blocks on
//! a socket, so a slow peer only ever stalls its own bridge.
//!
//! The core kills a session by dropping its sending end of the outbound
//! channel. The bridge then writes whatever is still queued, closes the
//! socket and exits.

use futures::StreamExt;
use log::{debug, info, log_enabled, trace, warn, Level};
use shared::{write_packet, GlsCodec, Packet, ProtocolError};
use std::backtrace::Backtrace;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::FramedRead;

/// What a bridge reports to the core.
#[derive(Debug)]
pub enum BridgeEvent {
    /// A well-formed packet whose fields all passed validation.
    Packet(Packet),
    /// A well-formed packet with a field that failed validation. The
    /// stream is still in sync, so the core decides how to answer.
    Invalid { packet: Packet, error: ProtocolError },
    /// Framing or socket failure. Nothing more will be read.
    Failed(ProtocolError),
}

impl BridgeEvent {
    fn from_packet(packet: Packet) -> Self {
        match packet.validate() {
            Ok(()) => BridgeEvent::Packet(packet),
            Err(error) => BridgeEvent::Invalid { packet, error },
        }
    }
}

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("channel capacity {0} cannot hold a whole packet")]
    Capacity(usize),
}

/// The core's ends of a session's channels.
#[derive(Debug)]
pub struct CoreEnd {
    pub events: mpsc::Receiver<BridgeEvent>,
    pub outbound: mpsc::Sender<Packet>,
    pub capacity: usize,
}

/// The bridge's ends of a session's channels.
#[derive(Debug)]
pub struct BridgeEnd {
    events: mpsc::Sender<BridgeEvent>,
    outbound: mpsc::Receiver<Packet>,
    notify: Arc<Notify>,
}

/// Creates both channels of a session. Capacity counts whole packets, so
/// anything below one could never move a packet.
pub fn duplex(capacity: usize, notify: Arc<Notify>) -> Result<(CoreEnd, BridgeEnd), BridgeError> {
    if capacity == 0 {
        return Err(BridgeError::Capacity(capacity));
    }
    let (events_tx, events_rx) = mpsc::channel(capacity);
    let (outbound_tx, outbound_rx) = mpsc::channel(capacity);

    Ok((
        CoreEnd {
            events: events_rx,
            outbound: outbound_tx,
            capacity,
        },
        BridgeEnd {
            events: events_tx,
            outbound: outbound_rx,
            notify,
        },
    ))
}

pub struct Bridge {
    id: u32,
    addr: SocketAddr,
    stream: TcpStream,
    end: BridgeEnd,
    read_timeout: Duration,
}

impl Bridge {
    pub fn new(
        id: u32,
        addr: SocketAddr,
        stream: TcpStream,
        end: BridgeEnd,
        read_timeout: Duration,
    ) -> Self {
        Self {
            id,
            addr,
            stream,
            end,
            read_timeout,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        let Bridge {
            id,
            addr,
            stream,
            mut end,
            read_timeout,
        } = self;
        let (read_half, mut write_half) = stream.into_split();
        let mut frames = FramedRead::new(read_half, GlsCodec);
        let mut reading = true;

        debug!("Session {} bridge started for {}", id, addr);

        loop {
            tokio::select! {
                // drain replies before reading more requests
                biased;

                outbound = end.outbound.recv() => match outbound {
                    Some(packet) => {
                        trace!("Session {} <- {:?}", id, packet.event());
                        if let Err(e) = write_packet(&mut write_half, &packet).await {
                            warn!("Session {} write failed: {}", id, e);
                            if reading {
                                end.forward(BridgeEvent::Failed(e)).await;
                            }
                            break;
                        }
                    }
                    None => {
                        debug!("Session {} closed by server", id);
                        break;
                    }
                },

                inbound = timeout(read_timeout, frames.next()), if reading => match inbound {
                    Err(_) => trace!("Session {} idle", id),
                    Ok(Some(Ok(packet))) => {
                        trace!("Session {} -> {:?}", id, packet.event());
                        if !end.forward(BridgeEvent::from_packet(packet)).await {
                            break;
                        }
                    }
                    Ok(Some(Err(e))) => {
                        warn!("Session {} read failed: {}", id, e);
                        if log_enabled!(Level::Debug) {
                            debug!("Session {} failure trace:\n{}", id, Backtrace::capture());
                        }
                        reading = false;
                        if !end.forward(BridgeEvent::Failed(e)).await {
                            break;
                        }
                    }
                    Ok(None) => {
                        info!("Session {} hung up", id);
                        end.forward(BridgeEvent::Failed(ProtocolError::Closed)).await;
                        break;
                    }
                },
            }
        }

        if let Err(e) = write_half.shutdown().await {
            trace!("Session {} socket shutdown: {}", id, e);
        }
        end.notify.notify_one();
        debug!("Session {} bridge exited", id);
    }
}

impl BridgeEnd {
    #[cfg(test)]
    pub(crate) fn into_parts(self) -> (mpsc::Sender<BridgeEvent>, mpsc::Receiver<Packet>) {
        (self.events, self.outbound)
    }

    /// Hands an event to the core and wakes it. False once the core has
    /// gone away.
    async fn forward(&self, event: BridgeEvent) -> bool {
        if self.events.send(event).await.is_err() {
            return false;
        }
        self.notify.notify_one();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::read_packet;
    use tokio::io::AsyncWriteExt;
    use tokio::net::TcpListener;

    async fn connected_bridge(
        capacity: usize,
    ) -> (TcpStream, CoreEnd, Arc<Notify>, JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = TcpStream::connect(addr).await.unwrap();
        let (stream, remote) = listener.accept().await.unwrap();

        let notify = Arc::new(Notify::new());
        let (core, end) = duplex(capacity, Arc::clone(&notify)).unwrap();
        let handle = Bridge::new(1, remote, stream, end, Duration::from_millis(50)).spawn();
        (peer, core, notify, handle)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let notify = Arc::new(Notify::new());
        assert!(matches!(
            duplex(0, notify),
            Err(BridgeError::Capacity(0))
        ));
    }

    #[tokio::test]
    async fn test_forwards_and_classifies_packets() {
        let (mut peer, mut core, notify, _handle) = connected_bridge(4).await;

        let good = Packet::Say {
            message: "hi".to_string(),
        };
        let bad = Packet::NickReq {
            nick: "two words".to_string(),
        };
        peer.write_all(&good.encode()).await.unwrap();
        peer.write_all(&bad.encode()).await.unwrap();

        notify.notified().await;
        match core.events.recv().await {
            Some(BridgeEvent::Packet(p)) => assert_eq!(p, good),
            other => panic!("Unexpected event: {:?}", other),
        }
        match core.events.recv().await {
            Some(BridgeEvent::Invalid { packet, error }) => {
                assert_eq!(packet, bad);
                assert!(!error.is_fatal());
            }
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unknown_event_fails_session() {
        let (mut peer, mut core, _notify, _handle) = connected_bridge(4).await;
        peer.write_all(&[0, 0, 0, 99]).await.unwrap();

        match core.events.recv().await {
            Some(BridgeEvent::Failed(ProtocolError::UnknownEvent(99))) => {}
            other => panic!("Unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_hangup_reported_and_bridge_exits() {
        let (peer, mut core, _notify, handle) = connected_bridge(4).await;
        drop(peer);

        match core.events.recv().await {
            Some(BridgeEvent::Failed(ProtocolError::Closed)) => {}
            other => panic!("Unexpected event: {:?}", other),
        }
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_kill_flushes_queued_packets() {
        let (mut peer, core, _notify, handle) = connected_bridge(4).await;

        let notice = Packet::Shutdown {
            reason: "bye".to_string(),
        };
        core.outbound.try_send(notice.clone()).unwrap();
        drop(core);

        assert_eq!(read_packet(&mut peer, true).await.unwrap(), notice);
        assert!(matches!(
            read_packet(&mut peer, true).await,
            Err(ProtocolError::Closed)
        ));
        handle.await.unwrap();
    }
}
