//! Correlation registry pairing process ids with pending relay handoffs.
//!
//! The acceptance loop and `new_worker` callers meet here. Whichever side
//! reaches a pid first creates its entry and the other side reuses it. Every
//! map operation, including the one-shot send of a delivery, runs inside a
//! single lock section so deliveries are linearized against removals. Waiting
//! on a channel happens outside the lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

/// Single-use handoff slot for one pid
#[derive(Debug)]
pub struct RelayChannel<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
    receiver: Mutex<Option<oneshot::Receiver<T>>>,
    created_at: Instant,
}

impl<T> RelayChannel<T> {
    fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            sender: Mutex::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            created_at: Instant::now(),
        }
    }

    /// Claim the receiving half. Only the first caller gets it.
    pub fn take_receiver(&self) -> Option<oneshot::Receiver<T>> {
        self.receiver.lock().take()
    }

    /// Whether a value has already been pushed into this channel
    pub fn is_delivered(&self) -> bool {
        self.sender.lock().is_none()
    }

    /// Whether a waiter has claimed the receiving half
    pub fn is_claimed(&self) -> bool {
        self.receiver.lock().is_none()
    }

    fn send(&self, value: T) -> Result<(), T> {
        match self.sender.lock().take() {
            Some(tx) => tx.send(value),
            None => Err(value),
        }
    }

    /// Claimed receiver was dropped before anything arrived
    fn is_abandoned(&self) -> bool {
        self.sender
            .lock()
            .as_ref()
            .map(|tx| tx.is_closed())
            .unwrap_or(false)
    }
}

/// Concurrency-safe map from pid to [`RelayChannel`]
#[derive(Debug)]
pub struct CorrelationRegistry<T> {
    entries: Mutex<HashMap<u32, Arc<RelayChannel<T>>>>,
    ttl: Option<Duration>,
}

impl<T> Default for CorrelationRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> CorrelationRegistry<T> {
    /// Registry that never expires unclaimed deliveries
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: None,
        }
    }

    /// Registry that drops deliveries nobody claimed within `ttl`
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Some(ttl),
        }
    }

    /// Return the pending channel for `pid`, creating it if absent
    pub fn get_or_create(&self, pid: u32) -> Arc<RelayChannel<T>> {
        let mut entries = self.entries.lock();
        self.sweep(&mut entries);
        Self::entry(&mut entries, pid)
    }

    /// Push `value` into the channel for `pid`, creating it if absent.
    ///
    /// Never blocks. Hands the value back when the channel was already
    /// delivered into, which means a second connection reported the same pid.
    pub fn deliver(&self, pid: u32, value: T) -> Result<(), T> {
        let mut entries = self.entries.lock();
        self.sweep(&mut entries);
        Self::entry(&mut entries, pid).send(value)
    }

    /// Delete the entry for `pid`. Returns whether one existed.
    pub fn remove(&self, pid: u32) -> bool {
        self.entries.lock().remove(&pid).is_some()
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.entries.lock().contains_key(&pid)
    }

    /// Pids with a pending entry, in no particular order
    pub fn pids(&self) -> Vec<u32> {
        self.entries.lock().keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    fn entry(entries: &mut HashMap<u32, Arc<RelayChannel<T>>>, pid: u32) -> Arc<RelayChannel<T>> {
        entries
            .entry(pid)
            .or_insert_with(|| Arc::new(RelayChannel::new()))
            .clone()
    }

    fn sweep(&self, entries: &mut HashMap<u32, Arc<RelayChannel<T>>>) {
        let ttl = self.ttl;
        entries.retain(|pid, channel| {
            let expired = ttl
                .map(|ttl| {
                    channel.is_delivered()
                        && !channel.is_claimed()
                        && channel.created_at.elapsed() > ttl
                })
                .unwrap_or(false);

            if expired || channel.is_abandoned() {
                debug!(pid = *pid, expired, "dropping stale relay entry");
                return false;
            }
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_create_is_idempotent() {
        let registry: CorrelationRegistry<&str> = CorrelationRegistry::new();
        let a = registry.get_or_create(42);
        let b = registry.get_or_create(42);

        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_distinct_pids_get_distinct_channels() {
        let registry: CorrelationRegistry<&str> = CorrelationRegistry::new();
        let a = registry.get_or_create(1);
        let b = registry.get_or_create(2);

        assert!(!Arc::ptr_eq(&a, &b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_remove() {
        let registry: CorrelationRegistry<&str> = CorrelationRegistry::new();
        assert!(!registry.remove(7));

        registry.get_or_create(7);
        assert!(registry.contains(7));
        assert!(registry.remove(7));
        assert!(!registry.contains(7));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_before_waiter() {
        let registry = CorrelationRegistry::new();
        registry.deliver(10, "relay-10").unwrap();

        let channel = registry.get_or_create(10);
        assert!(channel.is_delivered());
        let rx = channel.take_receiver().unwrap();
        assert_eq!(rx.await.unwrap(), "relay-10");
    }

    #[tokio::test]
    async fn test_delivery_after_waiter() {
        let registry = Arc::new(CorrelationRegistry::new());
        let rx = registry.get_or_create(11).take_receiver().unwrap();

        let loop_side = registry.clone();
        tokio::spawn(async move {
            loop_side.deliver(11, "relay-11").unwrap();
        });

        assert_eq!(rx.await.unwrap(), "relay-11");
    }

    #[test]
    fn test_receiver_claimed_once() {
        let registry: CorrelationRegistry<&str> = CorrelationRegistry::new();
        let channel = registry.get_or_create(3);
        assert!(channel.take_receiver().is_some());
        assert!(channel.is_claimed());
        assert!(registry.get_or_create(3).take_receiver().is_none());
    }

    #[test]
    fn test_duplicate_delivery_is_returned() {
        let registry = CorrelationRegistry::new();
        registry.deliver(5, "first").unwrap();
        assert_eq!(registry.deliver(5, "second"), Err("second"));
    }

    #[test]
    fn test_abandoned_waiter_entry_is_swept() {
        let registry = CorrelationRegistry::new();
        let rx = registry.get_or_create(8).take_receiver().unwrap();
        drop(rx);

        // The dead channel is replaced, so this delivery parks in a fresh entry.
        registry.deliver(8, "late").unwrap();
        let channel = registry.get_or_create(8);
        assert!(!channel.is_claimed());
        assert!(channel.is_delivered());
    }

    #[test]
    fn test_unclaimed_delivery_expires() {
        let registry = CorrelationRegistry::with_ttl(Duration::from_millis(10));
        registry.deliver(9, "orphan").unwrap();
        std::thread::sleep(Duration::from_millis(30));

        registry.get_or_create(100);
        assert!(!registry.contains(9));
        assert!(registry.contains(100));
    }

    #[test]
    fn test_claimed_entry_never_expires() {
        let registry = CorrelationRegistry::<&str>::with_ttl(Duration::from_millis(10));
        let _rx = registry.get_or_create(12).take_receiver().unwrap();
        std::thread::sleep(Duration::from_millis(30));

        registry.get_or_create(13);
        assert!(registry.contains(12));
    }

    #[tokio::test]
    async fn test_concurrent_deliveries_reach_their_own_waiters() {
        let registry = Arc::new(CorrelationRegistry::new());
        let pids: Vec<u32> = (1000..1064).collect();

        let mut waiters = Vec::new();
        for &pid in &pids {
            let registry = registry.clone();
            waiters.push(tokio::spawn(async move {
                let rx = registry.get_or_create(pid).take_receiver().unwrap();
                let value = rx.await.unwrap();
                registry.remove(pid);
                (pid, value)
            }));
        }

        for &pid in pids.iter().rev() {
            let registry = registry.clone();
            tokio::spawn(async move {
                registry.deliver(pid, pid * 10).unwrap();
            });
        }

        for waiter in waiters {
            let (pid, value) = waiter.await.unwrap();
            assert_eq!(value, pid * 10);
        }
        assert!(registry.is_empty());
    }
}
