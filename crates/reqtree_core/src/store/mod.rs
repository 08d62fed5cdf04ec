//! Generic single-writer reactive store.
//!
//! A [`DispatchingStore`] holds one state value and changes it only through
//! dispatchers: pure functions from the current state and a payload to a
//! partial state ([`StoreState::Patch`]). The set of dispatchers is a tagged
//! enum implementing [`Dispatcher`], so every payload is checked at compile
//! time while still being addressable by name for callers that only have a
//! string and a JSON payload.
//!
//! # Ordering
//!
//! Dispatches are applied one at a time under a writer lock. Each one reads
//! the state left by the previous one, and the merged result replaces the
//! held value and is published to every subscriber before the lock is
//! released. Subscribers therefore see every value, in production order, and
//! a caller reading [`DispatchingStore::value`] after `dispatch` returns sees
//! its own edit.
//!
//! # Example
//!
//! ```ignore
//! let store = DispatchingStore::new(CounterState::default());
//! let mut updates = store.subscribe();
//!
//! store.dispatch(CounterAction::Add { amount: 2 });
//! store.dispatch_named("add", serde_json::json!({ "amount": 3 }))?;
//!
//! assert_eq!(store.value().count, 5);
//! ```

mod subscribers;

pub use subscribers::{Subscription, SubscriptionId};

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, RwLock};

use serde::de::DeserializeOwned;

use crate::error::{ReqtreeError, Result};
use subscribers::SubscriberRegistry;

/// A state value that can absorb a partial update.
pub trait StoreState: Clone + Send + Sync + 'static {
    /// The partial state a dispatcher returns.
    type Patch;

    /// Shallow-merge `patch` into a fresh copy of `self`.
    fn merge(&self, patch: Self::Patch) -> Self;
}

/// The fixed set of dispatchers a store accepts.
///
/// Implemented by a tagged enum: one variant per dispatcher, the variant's
/// fields being its payload. For `dispatch_named` the enum must deserialize
/// from `{ "dispatcher": <name>, "payload": <payload> }`.
pub trait Dispatcher<S: StoreState>: Send + 'static {
    /// Every registered dispatcher name.
    const DISPATCHERS: &'static [&'static str];

    /// The name this payload is dispatched under.
    fn name(&self) -> &'static str;

    /// Compute the partial state for this payload against `state`.
    fn reduce(self, state: &S) -> S::Patch;
}

/// Reactive store applying [`Dispatcher`]s to a [`StoreState`].
pub struct DispatchingStore<S: StoreState, A: Dispatcher<S>> {
    value: RwLock<Arc<S>>,
    writer: Mutex<()>,
    subscribers: Mutex<SubscriberRegistry<S>>,
    _dispatchers: PhantomData<fn(A)>,
}

impl<S: StoreState, A: Dispatcher<S>> DispatchingStore<S, A> {
    /// Create a store holding `initial`.
    pub fn new(initial: S) -> Self {
        Self {
            value: RwLock::new(Arc::new(initial)),
            writer: Mutex::new(()),
            subscribers: Mutex::new(SubscriberRegistry::new()),
            _dispatchers: PhantomData,
        }
    }

    /// The latest state.
    pub fn value(&self) -> Arc<S> {
        Arc::clone(&self.value.read().unwrap())
    }

    /// Apply a dispatch.
    ///
    /// Blocks while another dispatch is being applied. On return the new
    /// value has been stored and published, so `value()` reflects this edit
    /// (and possibly later ones from other threads).
    pub fn dispatch(&self, action: A) {
        let _writer = self.writer.lock().unwrap();
        self.apply(action);
    }

    /// Dispatch by name with a JSON payload.
    ///
    /// Fails with [`ReqtreeError::UnknownDispatcher`] if `name` is not one of
    /// [`Dispatcher::DISPATCHERS`], and with [`ReqtreeError::InvalidPayload`]
    /// if the payload does not match that dispatcher.
    pub fn dispatch_named(&self, name: &str, payload: serde_json::Value) -> Result<()>
    where
        A: DeserializeOwned,
    {
        if !A::DISPATCHERS.contains(&name) {
            return Err(ReqtreeError::UnknownDispatcher(name.to_string()));
        }

        let tagged = serde_json::json!({ "dispatcher": name, "payload": payload });
        let action: A =
            serde_json::from_value(tagged).map_err(|source| ReqtreeError::InvalidPayload {
                dispatcher: name.to_string(),
                source,
            })?;

        self.dispatch(action);
        Ok(())
    }

    /// Open a value channel. The current value is delivered first.
    pub fn subscribe(&self) -> Subscription<S> {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.subscribe(self.value())
    }

    /// Close a value channel.
    ///
    /// Returns `true` if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.subscribers.lock().unwrap().unsubscribe(id)
    }

    /// Number of open value channels.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().unwrap().len()
    }

    fn apply(&self, action: A) {
        let name = action.name();
        let current = self.value();
        let patch = action.reduce(&current);
        let next = Arc::new(current.merge(patch));

        // Replacing and publishing under the subscriber lock keeps new
        // subscribers from seeing a value twice or out of order.
        let mut subscribers = self.subscribers.lock().unwrap();
        *self.value.write().unwrap() = Arc::clone(&next);
        subscribers.emit(&next);

        log::trace!("[Store] applied {}", name);
    }
}

impl<S: StoreState + std::fmt::Debug, A: Dispatcher<S>> std::fmt::Debug for DispatchingStore<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchingStore")
            .field("value", &self.value())
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}
