//! Relay network layer: UDP receive, topic fan-out and subscriber timeouts

use crate::subscribers::{SubscriberTable, Subscription};
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{RelayPacket, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Relay tuning
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub max_subscribers: usize,
    pub subscriber_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_subscribers: 256,
            subscriber_timeout: Duration::from_secs(shared::SUBSCRIBER_TIMEOUT_SECS),
        }
    }
}

/// Messages sent from network tasks to the main relay loop
#[derive(Debug)]
pub enum RelayEvent {
    PacketReceived {
        packet: RelayPacket,
        addr: SocketAddr,
    },
    SubscriberTimeout {
        addr: SocketAddr,
        member: String,
    },
    Shutdown,
}

/// Messages sent from the relay loop to the sender task
#[derive(Debug)]
pub enum Outgoing {
    SendPacket {
        packet: RelayPacket,
        addr: SocketAddr,
    },
    /// Deliver to every subscriber of `topic` except `exclude`
    Fanout {
        packet: RelayPacket,
        topic: String,
        exclude: SocketAddr,
    },
}

/// Best-effort pub/sub relay
pub struct RelayServer {
    socket: Arc<UdpSocket>,
    subscribers: Arc<RwLock<SubscriberTable>>,
    config: RelayConfig,

    // Communication channels
    relay_tx: mpsc::UnboundedSender<RelayEvent>,
    relay_rx: mpsc::UnboundedReceiver<RelayEvent>,
    out_tx: mpsc::UnboundedSender<Outgoing>,
    out_rx: mpsc::UnboundedReceiver<Outgoing>,
}

impl RelayServer {
    pub async fn bind(addr: &str, config: RelayConfig) -> Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Relay listening on {}", socket.local_addr()?);

        let (relay_tx, relay_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();

        Ok(RelayServer {
            socket,
            subscribers: Arc::new(RwLock::new(SubscriberTable::new(config.max_subscribers))),
            config,
            relay_tx,
            relay_rx,
            out_tx,
            out_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Handle that stops `run` when sent `RelayEvent::Shutdown`
    pub fn control(&self) -> mpsc::UnboundedSender<RelayEvent> {
        self.relay_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let relay_tx = self.relay_tx.clone();

        tokio::spawn(async move {
            let mut buffer = vec![0u8; shared::MAX_DATAGRAM + 1024];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => match deserialize::<RelayPacket>(&buffer[..len]) {
                        Ok(packet) => {
                            if relay_tx
                                .send(RelayEvent::PacketReceived { packet, addr })
                                .is_err()
                            {
                                break;
                            }
                        }
                        Err(_) => warn!("Failed to deserialize packet from {}", addr),
                    },
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let subscribers = Arc::clone(&self.subscribers);
        let mut out_rx = std::mem::replace(&mut self.out_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = out_rx.recv().await {
                match message {
                    Outgoing::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    Outgoing::Fanout {
                        packet,
                        topic,
                        exclude,
                    } => {
                        let peers = {
                            let guard = subscribers.read().await;
                            guard.peers(&topic, exclude)
                        };

                        for addr in peers {
                            if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                                error!("Failed to deliver to {}: {}", addr, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that drops silent subscribers
    fn spawn_timeout_checker(&self) {
        let subscribers = Arc::clone(&self.subscribers);
        let relay_tx = self.relay_tx.clone();
        let timeout = self.config.subscriber_timeout;
        let period = (timeout / 4).clamp(Duration::from_millis(10), Duration::from_secs(1));

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut guard = subscribers.write().await;
                    guard.check_timeouts(timeout)
                };

                for subscriber in timed_out {
                    let event = RelayEvent::SubscriberTimeout {
                        addr: subscriber.addr,
                        member: subscriber.member,
                    };
                    if relay_tx.send(event).is_err() {
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &RelayPacket,
        addr: SocketAddr,
    ) -> Result<()> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn queue(&self, message: Outgoing) {
        if let Err(e) = self.out_tx.send(message) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Processes one incoming packet
    async fn handle_packet(&mut self, packet: RelayPacket, addr: SocketAddr) {
        match packet {
            RelayPacket::Subscribe { topic, member } => {
                let outcome = {
                    let mut guard = self.subscribers.write().await;
                    guard.subscribe(addr, &topic, &member)
                };

                let response = match outcome {
                    Subscription::New | Subscription::Renewed => {
                        RelayPacket::Subscribed { topic }
                    }
                    Subscription::Full => {
                        warn!("Rejecting {} from {}: relay full", member, addr);
                        RelayPacket::Rejected {
                            reason: "Relay full".to_string(),
                        }
                    }
                };
                self.queue(Outgoing::SendPacket {
                    packet: response,
                    addr,
                });
            }

            RelayPacket::Publish { topic, payload } => {
                let subscribed = {
                    let mut guard = self.subscribers.write().await;
                    guard.touch(&addr) && guard.get(&addr).map(|s| s.topic == topic).unwrap_or(false)
                };

                if !subscribed {
                    debug!("Dropping publish to {} from unsubscribed {}", topic, addr);
                    self.queue(Outgoing::SendPacket {
                        packet: RelayPacket::NotSubscribed,
                        addr,
                    });
                    return;
                }

                self.queue(Outgoing::Fanout {
                    packet: RelayPacket::Deliver {
                        topic: topic.clone(),
                        payload,
                    },
                    topic,
                    exclude: addr,
                });
            }

            RelayPacket::Heartbeat => {
                let known = self.subscribers.write().await.touch(&addr);
                if !known {
                    debug!("Heartbeat from unknown {}, asking it to resubscribe", addr);
                    self.queue(Outgoing::SendPacket {
                        packet: RelayPacket::NotSubscribed,
                        addr,
                    });
                }
            }

            RelayPacket::Unsubscribe { topic } => {
                let mut guard = self.subscribers.write().await;
                if guard.get(&addr).map(|s| s.topic == topic).unwrap_or(false) {
                    guard.unsubscribe(&addr);
                }
            }

            _ => {
                warn!("Unexpected packet type from {}", addr);
            }
        }
    }

    /// Main relay loop
    pub async fn run(&mut self) -> Result<()> {
        self.spawn_network_receiver();
        self.spawn_network_sender();
        self.spawn_timeout_checker();

        info!("Relay started");

        while let Some(event) = self.relay_rx.recv().await {
            match event {
                RelayEvent::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                RelayEvent::SubscriberTimeout { addr, member } => {
                    info!("{} at {} timed out", member, addr);
                }
                RelayEvent::Shutdown => {
                    info!("Relay shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
