//! Subscriber registry for store value channels.
//!
//! Each subscriber owns the receiving half of an unbounded channel. The
//! registry keeps the sending halves and pushes every published state value
//! to all of them, in publication order.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};

/// A unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Receiving end of a store value channel.
///
/// The first value received is the state at the time of subscribing; every
/// value after that is a state published by a later dispatch.
#[derive(Debug)]
pub struct Subscription<S> {
    id: SubscriptionId,
    receiver: UnboundedReceiver<Arc<S>>,
}

impl<S> Subscription<S> {
    /// The id to pass to `unsubscribe`.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next published value.
    ///
    /// Returns `None` once the subscription was removed or the store dropped.
    pub async fn next(&mut self) -> Option<Arc<S>> {
        self.receiver.recv().await
    }

    /// Take the next value if one is already buffered.
    pub fn try_next(&mut self) -> Option<Arc<S>> {
        match self.receiver.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Take every value that is already buffered, oldest first.
    pub fn drain_ready(&mut self) -> Vec<Arc<S>> {
        let mut values = Vec::new();
        while let Some(value) = self.try_next() {
            values.push(value);
        }
        values
    }
}

/// Registry of live value channels.
///
/// Not internally synchronized: the owning store keeps it behind the same lock
/// that orders publication, so that a new subscriber can never observe a
/// value out of order.
pub(crate) struct SubscriberRegistry<S> {
    senders: BTreeMap<SubscriptionId, UnboundedSender<Arc<S>>>,
    next_id: SubscriptionId,
}

impl<S> SubscriberRegistry<S> {
    pub(crate) fn new() -> Self {
        Self {
            senders: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Register a new channel, seeding it with `current`.
    pub(crate) fn subscribe(&mut self, current: Arc<S>) -> Subscription<S> {
        let id = self.next_id;
        self.next_id += 1;

        let (sender, receiver) = mpsc::unbounded_channel();
        // The receiver is alive right here, so this cannot fail.
        let _ = sender.send(current);
        self.senders.insert(id, sender);

        Subscription { id, receiver }
    }

    /// Returns `true` if the subscription was found and removed.
    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.senders.remove(&id).is_some()
    }

    /// Push a value to every subscriber, pruning channels whose receiver is gone.
    pub(crate) fn emit(&mut self, value: &Arc<S>) {
        self.senders
            .retain(|_, sender| sender.send(Arc::clone(value)).is_ok());
    }

    pub(crate) fn len(&self) -> usize {
        self.senders.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_yields_current_value_first() {
        let mut registry = SubscriberRegistry::new();
        let mut sub = registry.subscribe(Arc::new(1));

        registry.emit(&Arc::new(2));
        registry.emit(&Arc::new(3));

        let seen: Vec<i32> = sub.drain_ready().iter().map(|v| **v).collect();
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_unsubscribe() {
        let mut registry = SubscriberRegistry::new();
        let mut sub = registry.subscribe(Arc::new("a"));
        assert_eq!(registry.len(), 1);

        assert!(registry.unsubscribe(sub.id()));
        assert_eq!(registry.len(), 0);

        registry.emit(&Arc::new("b"));
        assert_eq!(sub.try_next().as_deref(), Some(&"a"));
        assert!(sub.try_next().is_none());
    }

    #[test]
    fn test_unsubscribe_nonexistent() {
        let mut registry: SubscriberRegistry<u8> = SubscriberRegistry::new();
        assert!(!registry.unsubscribe(999));
    }

    #[test]
    fn test_dropped_receivers_are_pruned() {
        let mut registry = SubscriberRegistry::new();
        let kept = registry.subscribe(Arc::new(0u8));
        let dropped = registry.subscribe(Arc::new(0u8));
        drop(dropped);

        registry.emit(&Arc::new(1u8));
        assert_eq!(registry.len(), 1);
        drop(kept);
    }

    #[test]
    fn test_ids_are_unique() {
        let mut registry = SubscriberRegistry::new();
        let a = registry.subscribe(Arc::new(()));
        let b = registry.subscribe(Arc::new(()));
        assert_ne!(a.id(), b.id());
    }
}
