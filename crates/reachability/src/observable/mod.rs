// Copyright 2025 Chris Custine
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Multi-subscriber broadcast with replay of the current value.
//!
//! Every subscriber owns an unbounded FIFO queue. [`ConnectivityObservable::publish`]
//! pushes into every queue while holding the observable lock, so each
//! subscriber sees values in publish order and `publish` never waits on a slow
//! reader. Values are queued, never coalesced, and publishing a value equal to
//! the current one delivers it again.
//!
//! Subscribing registers the queue and enqueues the current value under the
//! same lock, so a concurrent publish lands either before the replay (and is
//! superseded by it as the current value) or after it, never in between.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;
use tokio::sync::mpsc;

/// Identifies a subscription for [`ConnectivityObservable::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

struct Inner<T> {
    current: T,
    next_id: u64,
    subscribers: HashMap<SubscriptionId, mpsc::UnboundedSender<T>>,
}

/// Broadcast cell holding the latest value. Cloning yields another handle to
/// the same cell.
pub struct ConnectivityObservable<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Clone for ConnectivityObservable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone + std::fmt::Debug> std::fmt::Debug for ConnectivityObservable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("ConnectivityObservable")
            .field("current", &inner.current)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

impl<T: Clone> ConnectivityObservable<T> {
    /// Create a cell whose first replayed value is `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                current: initial,
                next_id: 0,
                subscribers: HashMap::new(),
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // A panicking subscriber cannot leave the cell half-written, so the
        // data is still valid after poisoning.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a subscriber. The current value is its first delivery.
    #[must_use]
    pub fn subscribe(&self) -> Subscription<T> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.lock();

        let id = SubscriptionId(inner.next_id);
        inner.next_id += 1;

        // Receiver is alive, this cannot fail
        let _ = tx.send(inner.current.clone());
        inner.subscribers.insert(id, tx);

        Subscription { id, rx }
    }

    /// Remove a subscriber. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        if self.lock().subscribers.remove(&id).is_some() {
            debug!("Subscription {:?} removed", id);
        }
    }

    /// Record `value` as current and deliver it to every subscriber.
    pub fn publish(&self, value: T) {
        let mut inner = self.lock();
        inner.current = value.clone();
        inner
            .subscribers
            .retain(|_, tx| tx.send(value.clone()).is_ok());
    }

    /// The most recently published value (or the initial one).
    #[must_use]
    pub fn current(&self) -> T {
        self.lock().current.clone()
    }

    /// Number of registered subscribers, including dropped ones not yet pruned
    /// by a publish.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }
}

/// Receiving side of a subscription.
///
/// Dropping it detaches the subscriber on the next publish; call
/// [`ConnectivityObservable::unsubscribe`] to detach immediately.
#[derive(Debug)]
pub struct Subscription<T> {
    id: SubscriptionId,
    rx: mpsc::UnboundedReceiver<T>,
}

impl<T> Subscription<T> {
    #[must_use]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Wait for the next delivery. Returns `None` once unsubscribed and drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Take the next queued delivery without waiting.
    pub fn try_recv(&mut self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Drain everything queued so far.
    pub fn drain(&mut self) -> Vec<T> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
