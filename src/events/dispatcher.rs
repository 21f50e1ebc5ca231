//! Fan-out of decoded notifications to subscribers.
//!
//! # Responsibilities
//! - Keep subscribers in registration order with explicit add/remove
//! - Deliver every event to every current subscriber, in that order
//! - Contain subscriber failures: errors, panics and overruns are logged and
//!   counted, never propagated to the reader loop
//!
//! Handlers run sequentially so that each one observes events in chain order.
//! A handler that exceeds the soft timeout is dropped for that event only.

use async_trait::async_trait;
use futures_util::FutureExt;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;

use crate::events::NotificationEvent;
use crate::observability::metrics;

/// Failure reported by a subscriber.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self(message.to_string())
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

/// A notification subscriber.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, event: &NotificationEvent) -> Result<(), HandlerError>;

    /// Name used in logs.
    fn name(&self) -> &str {
        "handler"
    }
}

/// Adapter turning an async closure into a [`NotificationHandler`].
pub struct FnHandler<F> {
    name: String,
    f: F,
}

impl<F> FnHandler<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<F, Fut> NotificationHandler for FnHandler<F>
where
    F: Fn(NotificationEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
{
    async fn handle(&self, event: &NotificationEvent) -> Result<(), HandlerError> {
        (self.f)(event.clone()).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Handle returned by [`EventDispatcher::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Outcome of delivering one event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub delivered: usize,
    pub failed: usize,
}

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    order: Vec<SubscriptionId>,
    handlers: HashMap<SubscriptionId, Arc<dyn NotificationHandler>>,
}

/// Ordered subscriber registry.
pub struct EventDispatcher {
    subscribers: Mutex<Subscribers>,
    handler_timeout: Duration,
}

impl EventDispatcher {
    pub fn new(handler_timeout: Duration) -> Self {
        Self {
            subscribers: Mutex::new(Subscribers::default()),
            handler_timeout,
        }
    }

    pub fn handler_timeout(&self) -> Duration {
        self.handler_timeout
    }

    /// Register a handler; it receives every event dispatched from now on.
    pub fn subscribe(&self, handler: Arc<dyn NotificationHandler>) -> SubscriptionId {
        let mut subs = self.subscribers.lock().expect("dispatcher mutex poisoned");
        let id = SubscriptionId(subs.next_id);
        subs.next_id += 1;
        subs.order.push(id);
        subs.handlers.insert(id, handler);
        tracing::debug!(subscription = id.0, "Subscriber registered");
        id
    }

    /// Register an async closure.
    pub fn subscribe_fn<F, Fut>(&self, name: impl Into<String>, f: F) -> SubscriptionId
    where
        F: Fn(NotificationEvent) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), HandlerError>> + Send + 'static,
    {
        self.subscribe(Arc::new(FnHandler::new(name, f)))
    }

    /// Remove a handler. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subs = self.subscribers.lock().expect("dispatcher mutex poisoned");
        if subs.handlers.remove(&id).is_none() {
            return false;
        }
        subs.order.retain(|existing| *existing != id);
        tracing::debug!(subscription = id.0, "Subscriber removed");
        true
    }

    pub fn len(&self) -> usize {
        self.subscribers.lock().expect("dispatcher mutex poisoned").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Vec<Arc<dyn NotificationHandler>> {
        let subs = self.subscribers.lock().expect("dispatcher mutex poisoned");
        subs.order
            .iter()
            .filter_map(|id| subs.handlers.get(id).cloned())
            .collect()
    }

    /// Deliver `event` to every current subscriber in registration order.
    ///
    /// Subscribers added or removed while a dispatch is running take effect
    /// from the next event.
    pub async fn dispatch(&self, event: &NotificationEvent) -> DispatchReport {
        let mut report = DispatchReport::default();

        for handler in self.snapshot() {
            let delivery = AssertUnwindSafe(handler.handle(event)).catch_unwind();

            let kind = match tokio::time::timeout(self.handler_timeout, delivery).await {
                Ok(Ok(Ok(()))) => {
                    report.delivered += 1;
                    continue;
                }
                Ok(Ok(Err(err))) => {
                    tracing::warn!(
                        handler = handler.name(),
                        tx = %event.transaction_id,
                        error = %err,
                        "Notification handler failed"
                    );
                    "error"
                }
                Ok(Err(_)) => {
                    tracing::error!(
                        handler = handler.name(),
                        tx = %event.transaction_id,
                        "Notification handler panicked"
                    );
                    "panic"
                }
                Err(_) => {
                    tracing::warn!(
                        handler = handler.name(),
                        tx = %event.transaction_id,
                        timeout_ms = self.handler_timeout.as_millis() as u64,
                        "Notification handler timed out"
                    );
                    "timeout"
                }
            };

            metrics::record_handler_failure(kind);
            report.failed += 1;
        }

        report
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("subscribers", &self.len())
            .field("handler_timeout", &self.handler_timeout)
            .finish()
    }
}
