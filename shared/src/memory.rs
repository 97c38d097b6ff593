//! In-process broadcast hub implementing `RoomTransport`
//!
//! Used by tests and local demos. Delivery is immediate and per-sender FIFO;
//! a drop filter can discard individual deliveries to simulate loss.

use crate::error::{Error, Result};
use crate::transport::{Channel, ChannelEvent, RoomTransport};
use log::debug;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Returns true when the delivery `from -> to` of `payload` should be dropped
pub type DropFilter = Arc<dyn Fn(&str, &str, &[u8]) -> bool + Send + Sync>;

struct Subscriber {
    id: u64,
    member: String,
    tx: mpsc::UnboundedSender<ChannelEvent>,
}

#[derive(Default)]
struct HubInner {
    topics: HashMap<String, Vec<Subscriber>>,
    next_id: u64,
    filter: Option<DropFilter>,
}

#[derive(Clone, Default)]
pub struct MemoryHub {
    inner: Arc<Mutex<HubInner>>,
}

impl MemoryHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_drop_filter(&self, filter: DropFilter) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.filter = Some(filter);
        }
    }

    pub fn clear_drop_filter(&self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.filter = None;
        }
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.topics.get(topic).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    fn publish(&self, topic: &str, sender_id: u64, sender: &str, payload: &[u8]) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let filter = inner.filter.clone();
        if let Some(subscribers) = inner.topics.get_mut(topic) {
            subscribers.retain(|s| !s.tx.is_closed());
            for subscriber in subscribers.iter().filter(|s| s.id != sender_id) {
                if let Some(filter) = &filter {
                    if filter(sender, &subscriber.member, payload) {
                        debug!("Dropped delivery {} -> {} on {}", sender, subscriber.member, topic);
                        continue;
                    }
                }
                let _ = subscriber.tx.send(ChannelEvent::Message(payload.to_vec()));
            }
        }
    }

    fn remove(&self, topic: &str, id: u64) {
        let Ok(mut inner) = self.inner.lock() else {
            return;
        };
        let mut now_empty = false;
        if let Some(subscribers) = inner.topics.get_mut(topic) {
            if let Some(pos) = subscribers.iter().position(|s| s.id == id) {
                let subscriber = subscribers.remove(pos);
                let _ = subscriber.tx.send(ChannelEvent::Closed);
            }
            now_empty = subscribers.is_empty();
        }
        if now_empty {
            inner.topics.remove(topic);
        }
    }
}

impl RoomTransport for MemoryHub {
    type Channel = MemoryChannel;

    fn join(
        &self,
        topic: &str,
        member: &str,
    ) -> Result<(MemoryChannel, mpsc::UnboundedReceiver<ChannelEvent>)> {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = {
            let mut inner = self.inner.lock().map_err(|_| Error::ChannelClosed)?;
            let id = inner.next_id;
            inner.next_id += 1;
            inner.topics.entry(topic.to_string()).or_default().push(Subscriber {
                id,
                member: member.to_string(),
                tx: tx.clone(),
            });
            id
        };

        let _ = tx.send(ChannelEvent::Subscribed);

        Ok((
            MemoryChannel {
                hub: self.clone(),
                topic: topic.to_string(),
                member: member.to_string(),
                id,
                ready: Arc::new(AtomicBool::new(true)),
            },
            rx,
        ))
    }
}

pub struct MemoryChannel {
    hub: MemoryHub,
    topic: String,
    member: String,
    id: u64,
    ready: Arc<AtomicBool>,
}

impl Channel for MemoryChannel {
    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Relaxed)
    }

    fn send(&self, payload: Vec<u8>) -> Result<()> {
        if !self.is_ready() {
            return Err(Error::NotReady);
        }
        self.hub.publish(&self.topic, self.id, &self.member, &payload);
        Ok(())
    }

    fn leave(&self) {
        if self.ready.swap(false, Ordering::Relaxed) {
            self.hub.remove(&self.topic, self.id);
        }
    }
}

impl Drop for MemoryChannel {
    fn drop(&mut self) {
        self.leave();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<ChannelEvent>) -> Vec<ChannelEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_join_signals_subscribed() {
        let hub = MemoryHub::new();
        let (channel, mut rx) = hub.join("room:game", "a").unwrap();
        assert!(channel.is_ready());
        assert_eq!(drain(&mut rx), vec![ChannelEvent::Subscribed]);
    }

    #[test]
    fn test_broadcast_skips_sender_and_other_topics() {
        let hub = MemoryHub::new();
        let (a, mut rx_a) = hub.join("room:game", "a").unwrap();
        let (_b, mut rx_b) = hub.join("room:game", "b").unwrap();
        let (_c, mut rx_c) = hub.join("other:game", "c").unwrap();
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut rx_c);

        tokio_test::assert_ok!(a.send(vec![1, 2, 3]));

        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain(&mut rx_b), vec![ChannelEvent::Message(vec![1, 2, 3])]);
        assert!(drain(&mut rx_c).is_empty());
    }

    #[test]
    fn test_drop_filter_discards_delivery() {
        let hub = MemoryHub::new();
        let (a, _rx_a) = hub.join("t", "a").unwrap();
        let (_b, mut rx_b) = hub.join("t", "b").unwrap();
        let (_c, mut rx_c) = hub.join("t", "c").unwrap();
        drain(&mut rx_b);
        drain(&mut rx_c);

        hub.set_drop_filter(Arc::new(|_from, to, _payload| to == "b"));
        a.send(vec![9]).unwrap();

        assert!(drain(&mut rx_b).is_empty());
        assert_eq!(drain(&mut rx_c), vec![ChannelEvent::Message(vec![9])]);
    }

    #[test]
    fn test_leave_closes_and_blocks_sends() {
        let hub = MemoryHub::new();
        let (a, mut rx_a) = hub.join("t", "a").unwrap();
        drain(&mut rx_a);

        a.leave();
        assert_eq!(drain(&mut rx_a), vec![ChannelEvent::Closed]);
        assert!(matches!(a.send(vec![1]), Err(Error::NotReady)));
        assert_eq!(hub.subscriber_count("t"), 0);
    }
}
