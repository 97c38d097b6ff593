//! Subscriber bookkeeping for the relay
//!
//! This module tracks who listens on which room topic:
//! - Subscription lifecycle (subscribe, unsubscribe, timeout)
//! - Capacity enforcement
//! - Fan-out target lookup per topic
//!
//! Every participant socket holds exactly one subscription, so subscribers
//! are keyed by their network address.

use log::info;
use std::collections::{BTreeSet, HashMap};
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A socket subscribed to one topic
#[derive(Debug, Clone)]
pub struct Subscriber {
    /// Network address deliveries are sent to
    pub addr: SocketAddr,
    /// Room topic, `"{room}:{game}"`
    pub topic: String,
    /// Participant id the socket announced, used for logging only
    pub member: String,
    /// Last time we received any packet from this subscriber
    pub last_seen: Instant,
}

impl Subscriber {
    pub fn new(addr: SocketAddr, topic: &str, member: &str) -> Self {
        Self {
            addr,
            topic: topic.to_string(),
            member: member.to_string(),
            last_seen: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the subscriber has been silent for longer than `timeout`
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Outcome of a subscribe request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subscription {
    New,
    /// Same socket subscribing again, possibly to a different topic
    Renewed,
    /// Relay at capacity
    Full,
}

/// Manages every subscription of the relay
///
/// The table enforces the relay's capacity and answers the one question the
/// forwarding path asks: which other sockets listen on this topic.
pub struct SubscriberTable {
    subscribers: HashMap<SocketAddr, Subscriber>,
    max_subscribers: usize,
}

impl SubscriberTable {
    pub fn new(max_subscribers: usize) -> Self {
        Self {
            subscribers: HashMap::new(),
            max_subscribers,
        }
    }

    /// Subscribes `addr` to `topic`, replacing any earlier subscription of
    /// the same socket
    pub fn subscribe(&mut self, addr: SocketAddr, topic: &str, member: &str) -> Subscription {
        if let Some(existing) = self.subscribers.get_mut(&addr) {
            existing.topic = topic.to_string();
            existing.member = member.to_string();
            existing.touch();
            return Subscription::Renewed;
        }

        if self.subscribers.len() >= self.max_subscribers {
            return Subscription::Full;
        }

        info!("{} subscribed to {} from {}", member, topic, addr);
        self.subscribers
            .insert(addr, Subscriber::new(addr, topic, member));
        Subscription::New
    }

    pub fn unsubscribe(&mut self, addr: &SocketAddr) -> Option<Subscriber> {
        let removed = self.subscribers.remove(addr);
        if let Some(subscriber) = &removed {
            info!(
                "{} left {} ({})",
                subscriber.member, subscriber.topic, subscriber.addr
            );
        }
        removed
    }

    /// Refreshes the activity timestamp; false for unknown sockets
    pub fn touch(&mut self, addr: &SocketAddr) -> bool {
        match self.subscribers.get_mut(addr) {
            Some(subscriber) => {
                subscriber.touch();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&Subscriber> {
        self.subscribers.get(addr)
    }

    /// Addresses subscribed to `topic`, except `exclude`
    pub fn peers(&self, topic: &str, exclude: SocketAddr) -> Vec<SocketAddr> {
        self.subscribers
            .values()
            .filter(|s| s.topic == topic && s.addr != exclude)
            .map(|s| s.addr)
            .collect()
    }

    /// Removes and returns subscribers silent for longer than `timeout`
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<Subscriber> {
        let timed_out: Vec<SocketAddr> = self
            .subscribers
            .values()
            .filter(|s| s.is_timed_out(timeout))
            .map(|s| s.addr)
            .collect();

        timed_out
            .iter()
            .filter_map(|addr| self.subscribers.remove(addr))
            .collect()
    }

    /// Topics with at least one subscriber
    pub fn topics(&self) -> BTreeSet<String> {
        self.subscribers.values().map(|s| s.topic.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr};

    fn addr(port: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), port)
    }

    #[test]
    fn test_subscribe_and_capacity() {
        let mut table = SubscriberTable::new(2);
        assert_eq!(table.subscribe(addr(1), "r:g", "a"), Subscription::New);
        assert_eq!(table.subscribe(addr(2), "r:g", "b"), Subscription::New);
        assert_eq!(table.subscribe(addr(3), "r:g", "c"), Subscription::Full);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_resubscribe_is_renewal_even_when_full() {
        let mut table = SubscriberTable::new(1);
        table.subscribe(addr(1), "r:g", "a");
        assert_eq!(table.subscribe(addr(1), "r:other", "a"), Subscription::Renewed);
        assert_eq!(table.get(&addr(1)).map(|s| s.topic.as_str()), Some("r:other"));
    }

    #[test]
    fn test_peers_exclude_sender_and_other_topics() {
        let mut table = SubscriberTable::new(8);
        table.subscribe(addr(1), "r:g", "a");
        table.subscribe(addr(2), "r:g", "b");
        table.subscribe(addr(3), "x:g", "c");

        let peers = table.peers("r:g", addr(1));
        assert_eq!(peers, vec![addr(2)]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut table = SubscriberTable::new(8);
        table.subscribe(addr(1), "r:g", "a");
        assert!(table.unsubscribe(&addr(1)).is_some());
        assert!(table.unsubscribe(&addr(1)).is_none());
        assert!(table.is_empty());
        assert!(!table.touch(&addr(1)));
    }

    #[test]
    fn test_timeouts() {
        let mut table = SubscriberTable::new(8);
        table.subscribe(addr(1), "r:g", "a");
        table.subscribe(addr(2), "r:g", "b");

        assert!(table.check_timeouts(Duration::from_secs(10)).is_empty());

        std::thread::sleep(Duration::from_millis(20));
        table.touch(&addr(2));
        let removed = table.check_timeouts(Duration::from_millis(10));
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].member, "a");
        assert_eq!(table.topics().len(), 1);
    }
}
