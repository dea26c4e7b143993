//! Notification bus between the controller and UI bindings.
//!
//! Architecture:
//! - Subscribers register callbacks (invoked synchronously inside emit())
//! - emit() also queues the event for deferred processing
//! - poll() drains the queue for batch processing in a UI loop
//!
//! Callback order: FIFO (first-subscribed, first-called).
//! The queue is bounded; when full the oldest half is evicted.

use log::warn;
use std::sync::{Arc, Mutex, RwLock};

/// Default queue bound before eviction kicks in
pub const DEFAULT_QUEUE_LIMIT: usize = 1000;

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Shared<E> {
    subscribers: RwLock<Vec<Callback<E>>>,
    queue: Mutex<Vec<E>>,
    limit: usize,
}

impl<E> Shared<E> {
    fn publish(&self, event: E) {
        // Clone callbacks out so a subscriber may subscribe/emit re-entrantly
        let callbacks: Vec<Callback<E>> = self
            .subscribers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        for cb in &callbacks {
            cb(&event);
        }

        let mut queue = self.queue.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() >= self.limit {
            let evict_count = (queue.len() / 2).max(1);
            warn!("EventBus queue full ({} events), evicting oldest {}", queue.len(), evict_count);
            queue.drain(0..evict_count);
        }
        queue.push(event);
    }
}

/// Typed pub/sub bus with deferred queue. Clones share state.
pub struct EventBus<E> {
    shared: Arc<Shared<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<E: Clone + Send + Sync + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Clone + Send + Sync + 'static> EventBus<E> {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_QUEUE_LIMIT)
    }

    /// Bus whose deferred queue holds at most `limit` events (minimum 1)
    pub fn with_limit(limit: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: RwLock::new(Vec::new()),
                queue: Mutex::new(Vec::new()),
                limit: limit.max(1),
            }),
        }
    }

    /// Register a callback, invoked synchronously on every emit().
    ///
    /// Runs on whichever thread emits; keep it short.
    pub fn subscribe<F>(&self, callback: F)
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(Arc::new(callback));
    }

    /// Invoke callbacks, then queue for poll()
    pub fn emit(&self, event: E) {
        self.shared.publish(event);
    }

    /// Drain all queued events
    pub fn poll(&self) -> Vec<E> {
        std::mem::take(&mut *self.shared.queue.lock().unwrap_or_else(|e| e.into_inner()))
    }

    /// Emit-only handle for the producer side
    pub fn emitter(&self) -> EventEmitter<E> {
        EventEmitter {
            shared: Some(Arc::clone(&self.shared)),
        }
    }

    pub fn unsubscribe_all(&self) {
        self.shared
            .subscribers
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    /// Clear subscribers and queue
    pub fn clear(&self) {
        self.unsubscribe_all();
        self.shared.queue.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn queue_len(&self) -> usize {
        self.shared.queue.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Producer handle; a dummy emitter drops everything.
pub struct EventEmitter<E> {
    shared: Option<Arc<Shared<E>>>,
}

impl<E> Clone for EventEmitter<E> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<E> Default for EventEmitter<E> {
    fn default() -> Self {
        Self::dummy()
    }
}

impl<E> std::fmt::Debug for EventEmitter<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.shared {
            Some(shared) => f
                .debug_struct("EventEmitter")
                .field("subscribers", &shared.subscribers.read().map(|s| s.len()).unwrap_or(0))
                .field("queue_len", &shared.queue.lock().map(|q| q.len()).unwrap_or(0))
                .finish(),
            None => f.write_str("EventEmitter(dummy)"),
        }
    }
}

impl<E> EventEmitter<E> {
    /// No-op emitter (tests, or before a UI is attached)
    pub fn dummy() -> Self {
        Self { shared: None }
    }

    pub fn emit(&self, event: E) {
        if let Some(ref shared) = self.shared {
            shared.publish(event);
        }
    }
}
