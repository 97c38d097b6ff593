//! UDP channel to a relay
//!
//! Each joined topic gets its own socket and three background tasks:
//! - a sender draining the outgoing packet queue
//! - a receiver turning relay packets into [`ChannelEvent`]s
//! - a keepalive that (re)sends `Subscribe` until confirmed, then heartbeats
//!
//! `join` must be called from inside a tokio runtime.

use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Channel, ChannelEvent, Error, RelayPacket, Result, RoomTransport};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::time::interval;

/// Joins topics on a relay over UDP
#[derive(Debug, Clone)]
pub struct UdpTransport {
    relay: SocketAddr,
    heartbeat: Duration,
}

impl UdpTransport {
    pub fn new(relay: SocketAddr) -> Self {
        Self {
            relay,
            heartbeat: Duration::from_secs(shared::HEARTBEAT_INTERVAL_SECS),
        }
    }

    pub fn with_heartbeat(mut self, heartbeat: Duration) -> Self {
        self.heartbeat = heartbeat;
        self
    }

    pub fn relay(&self) -> SocketAddr {
        self.relay
    }
}

impl RoomTransport for UdpTransport {
    type Channel = UdpChannel;

    fn join(
        &self,
        topic: &str,
        member: &str,
    ) -> Result<(UdpChannel, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let std_socket = std::net::UdpSocket::bind("0.0.0.0:0")?;
        std_socket.set_nonblocking(true)?;
        let socket = Arc::new(UdpSocket::from_std(std_socket)?);

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let ready = Arc::new(AtomicBool::new(false));

        spawn_sender(Arc::clone(&socket), self.relay, out_rx);
        spawn_receiver(
            Arc::clone(&socket),
            self.relay,
            topic.to_string(),
            Arc::clone(&ready),
            event_tx,
            shutdown_rx.clone(),
        );
        spawn_keepalive(
            out_tx.clone(),
            RelayPacket::Subscribe {
                topic: topic.to_string(),
                member: member.to_string(),
            },
            self.heartbeat,
            Arc::clone(&ready),
            shutdown_rx,
        );

        info!("Joining {} on relay {} as {}", topic, self.relay, member);
        Ok((
            UdpChannel {
                topic: topic.to_string(),
                out_tx,
                ready,
                shutdown: shutdown_tx,
            },
            event_rx,
        ))
    }
}

/// Spawns task that processes the outgoing packet queue
fn spawn_sender(
    socket: Arc<UdpSocket>,
    relay: SocketAddr,
    mut out_rx: mpsc::UnboundedReceiver<RelayPacket>,
) {
    tokio::spawn(async move {
        while let Some(packet) = out_rx.recv().await {
            let data = match serialize(&packet) {
                Ok(data) => data,
                Err(e) => {
                    error!("Failed to encode relay packet: {}", e);
                    continue;
                }
            };
            if let Err(e) = socket.send_to(&data, relay).await {
                error!("Failed to send to relay {}: {}", relay, e);
            }
        }
    });
}

/// Spawns task that listens for relay packets
fn spawn_receiver(
    socket: Arc<UdpSocket>,
    relay: SocketAddr,
    topic: String,
    ready: Arc<AtomicBool>,
    event_tx: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut buffer = vec![0u8; shared::MAX_DATAGRAM + 1024];

        loop {
            tokio::select! {
                result = socket.recv_from(&mut buffer) => {
                    let (len, addr) = match result {
                        Ok(received) => received,
                        Err(e) => {
                            error!("Error receiving packet: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                            continue;
                        }
                    };
                    if addr != relay {
                        debug!("Ignoring datagram from {}", addr);
                        continue;
                    }

                    let event = match deserialize::<RelayPacket>(&buffer[..len]) {
                        Ok(RelayPacket::Subscribed { topic: confirmed }) if confirmed == topic => {
                            if ready.swap(true, Ordering::SeqCst) {
                                continue;
                            }
                            ChannelEvent::Subscribed
                        }
                        Ok(RelayPacket::Deliver { topic: from, payload }) if from == topic => {
                            ChannelEvent::Message(payload)
                        }
                        Ok(RelayPacket::NotSubscribed) => {
                            // keepalive resubscribes; `Subscribed` fires again once confirmed
                            if ready.swap(false, Ordering::SeqCst) {
                                warn!("Relay dropped our subscription to {}", topic);
                            }
                            continue;
                        }
                        Ok(RelayPacket::Rejected { reason }) => {
                            warn!("Relay rejected subscription to {}: {}", topic, reason);
                            ready.store(false, Ordering::SeqCst);
                            let _ = event_tx.send(ChannelEvent::Closed);
                            break;
                        }
                        Ok(other) => {
                            debug!("Unexpected relay packet {:?}", other);
                            continue;
                        }
                        Err(e) => {
                            warn!("Failed to deserialize relay packet: {}", e);
                            continue;
                        }
                    };

                    if event_tx.send(event).is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    });
}

/// Spawns task that subscribes until confirmed and then keeps the
/// subscription alive
fn spawn_keepalive(
    out_tx: mpsc::UnboundedSender<RelayPacket>,
    subscribe: RelayPacket,
    period: Duration,
    ready: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    tokio::spawn(async move {
        let mut ticker = interval(period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let packet = if ready.load(Ordering::SeqCst) {
                        RelayPacket::Heartbeat
                    } else {
                        subscribe.clone()
                    };
                    if out_tx.send(packet).is_err() {
                        break;
                    }
                }
                _ = shutdown.changed() => break,
            }
        }
    });
}

pub struct UdpChannel {
    topic: String,
    out_tx: mpsc::UnboundedSender<RelayPacket>,
    ready: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

impl Channel for UdpChannel {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn send(&self, payload: Vec<u8>) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        if payload.len() > shared::MAX_DATAGRAM {
            return Err(Error::Rejected(format!(
                "payload of {} bytes exceeds datagram limit",
                payload.len()
            )));
        }
        self.out_tx
            .send(RelayPacket::Publish {
                topic: self.topic.clone(),
                payload,
            })
            .map_err(|_| Error::ChannelClosed)
    }

    fn leave(&self) {
        if *self.shutdown.borrow() {
            return;
        }
        let _ = self.out_tx.send(RelayPacket::Unsubscribe {
            topic: self.topic.clone(),
        });
        self.ready.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);
    }
}

impl Drop for UdpChannel {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    async fn fake_relay() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    async fn recv_packet(socket: &UdpSocket) -> (RelayPacket, SocketAddr) {
        let mut buffer = vec![0u8; 2048];
        let (len, from) = timeout(Duration::from_secs(2), socket.recv_from(&mut buffer))
            .await
            .unwrap()
            .unwrap();
        (deserialize(&buffer[..len]).unwrap(), from)
    }

    #[tokio::test]
    async fn test_send_before_subscribed_fails() {
        let (_relay, addr) = fake_relay().await;
        let (channel, _events) = UdpTransport::new(addr).join("r:g", "a").unwrap();
        assert!(!channel.is_ready());
        assert!(matches!(channel.send(vec![1]), Err(Error::NotReady)));
    }

    #[tokio::test]
    async fn test_subscribe_confirm_and_leave() {
        let (relay, addr) = fake_relay().await;
        let (channel, mut events) = UdpTransport::new(addr).join("r:g", "a").unwrap();

        let (packet, from) = recv_packet(&relay).await;
        assert_eq!(
            packet,
            RelayPacket::Subscribe {
                topic: "r:g".into(),
                member: "a".into()
            }
        );

        // confirmations for other topics are ignored
        let other = serialize(&RelayPacket::Subscribed {
            topic: "x:g".into(),
        })
        .unwrap();
        relay.send_to(&other, from).await.unwrap();
        let confirm = serialize(&RelayPacket::Subscribed {
            topic: "r:g".into(),
        })
        .unwrap();
        relay.send_to(&confirm, from).await.unwrap();

        let event = timeout(Duration::from_secs(2), events.recv()).await.unwrap();
        assert_eq!(event, Some(ChannelEvent::Subscribed));
        assert!(channel.is_ready());

        tokio_test::assert_ok!(channel.send(vec![7; 16]));
        tokio_test::assert_err!(channel.send(vec![0; shared::MAX_DATAGRAM + 1]));
        let (packet, _) = recv_packet(&relay).await;
        assert_eq!(
            packet,
            RelayPacket::Publish {
                topic: "r:g".into(),
                payload: vec![7; 16]
            }
        );

        channel.leave();
        assert!(!channel.is_ready());
        let (packet, _) = recv_packet(&relay).await;
        assert_eq!(
            packet,
            RelayPacket::Unsubscribe {
                topic: "r:g".into()
            }
        );
    }

    #[tokio::test]
    async fn test_resubscribes_after_relay_forgets_us() {
        let (relay, addr) = fake_relay().await;
        let transport = UdpTransport::new(addr).with_heartbeat(Duration::from_millis(100));
        let (channel, mut events) = transport.join("r:g", "a").unwrap();
        let confirm = serialize(&RelayPacket::Subscribed {
            topic: "r:g".into(),
        })
        .unwrap();

        let (_, from) = recv_packet(&relay).await;
        relay.send_to(&confirm, from).await.unwrap();
        let event = timeout(Duration::from_secs(2), events.recv()).await.unwrap();
        assert_eq!(event, Some(ChannelEvent::Subscribed));

        let forgotten = serialize(&RelayPacket::NotSubscribed).unwrap();
        relay.send_to(&forgotten, from).await.unwrap();

        // heartbeats already in flight are skipped until the keepalive resubscribes
        loop {
            let (packet, _) = recv_packet(&relay).await;
            if matches!(packet, RelayPacket::Subscribe { .. }) {
                break;
            }
        }
        assert!(!channel.is_ready());
        assert!(matches!(channel.send(vec![1]), Err(Error::NotReady)));

        relay.send_to(&confirm, from).await.unwrap();
        let event = timeout(Duration::from_secs(2), events.recv()).await.unwrap();
        assert_eq!(event, Some(ChannelEvent::Subscribed));
        assert!(channel.is_ready());
    }
}
