//! Publish/subscribe event bus with weakly held callbacks.
//!
//! The [`EventBus`] maps event names to subscriptions. A subscription keeps
//! only a [`Weak`] reference to its callback: the subscriber owns the
//! [`Callback`] and the bus stops invoking it as soon as the last strong
//! reference is dropped. Dead subscriptions are pruned lazily whenever the
//! event they belong to is touched.
//!
//! Emission is fault isolated. A callback returning an error or panicking is
//! logged at `warn`, recorded in the [`EmitReport`], and the remaining
//! subscribers still run; [`EventBus::emit`] itself never fails.
//!
//! # Example
//!
//! ```
//! use avalon_pipeline::events::{EventBus, callback};
//!
//! let bus = EventBus::new();
//! let on_init = callback(|_args| Ok(()));
//! bus.on("init", &on_init);
//!
//! assert_eq!(bus.emit("init", &[]).invoked(), 1);
//!
//! drop(on_init);
//! assert_eq!(bus.emit("init", &[]).invoked(), 0);
//! ```

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde_json::Value;
use tracing::{debug, warn};

/// Tracing target for event bus operations.
const EVENTS_TARGET: &str = "avalon_pipeline::events";

/// Error type callbacks may return.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Result returned by every callback.
pub type CallbackResult = Result<(), CallbackError>;

/// Shared callable registered with [`EventBus::on`].
pub type Callback = Arc<dyn Fn(&[Value]) -> CallbackResult + Send + Sync>;

type WeakCallback = Weak<dyn Fn(&[Value]) -> CallbackResult + Send + Sync>;

/// Wraps a closure into a [`Callback`].
pub fn callback<F>(function: F) -> Callback
where
    F: Fn(&[Value]) -> CallbackResult + Send + Sync + 'static,
{
    Arc::new(function)
}

/// Returns the name of the event fired before `event`.
#[must_use]
pub fn before_event(event: &str) -> String {
    format!("before_{event}")
}

/// Returns the name of the event fired after `event`.
#[must_use]
pub fn after_event(event: &str) -> String {
    format!("after_{event}")
}

/// Stable handle identifying one subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Subscription {
    id: SubscriptionId,
    callback: WeakCallback,
}

impl Subscription {
    fn is_live(&self) -> bool {
        self.callback.strong_count() > 0
    }
}

/// A callback that failed during emission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackFailure {
    subscription: SubscriptionId,
    message: String,
}

impl CallbackFailure {
    /// Returns the failing subscription.
    #[must_use]
    pub const fn subscription(&self) -> SubscriptionId {
        self.subscription
    }

    /// Returns the error chain or panic message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Outcome of one [`EventBus::emit`] call.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EmitReport {
    event: String,
    invoked: usize,
    failures: Vec<CallbackFailure>,
}

impl EmitReport {
    fn new(event: &str) -> Self {
        Self {
            event: event.to_owned(),
            invoked: 0,
            failures: Vec::new(),
        }
    }

    /// Returns the emitted event name.
    #[must_use]
    pub fn event(&self) -> &str {
        &self.event
    }

    /// Returns how many live callbacks were invoked.
    #[must_use]
    pub const fn invoked(&self) -> usize {
        self.invoked
    }

    /// Returns the callbacks that failed.
    #[must_use]
    pub fn failures(&self) -> &[CallbackFailure] {
        &self.failures
    }

    /// Returns `true` when every invoked callback succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Event name to weakly held callbacks.
#[derive(Default)]
pub struct EventBus {
    handlers: Mutex<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.lock();
        let mut map = f.debug_map();
        for (event, subscriptions) in handlers.iter() {
            map.entry(event, &subscriptions.len());
        }
        map.finish()
    }
}

impl EventBus {
    /// Creates a bus without subscriptions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes `callback` to `event`.
    ///
    /// The bus holds the callback weakly. Subscribing the same callback to
    /// the same event again returns the existing subscription.
    pub fn on(&self, event: &str, callback: &Callback) -> SubscriptionId {
        let weak = Arc::downgrade(callback);
        let mut handlers = self.lock();
        let subscriptions = handlers.entry(event.to_owned()).or_default();
        subscriptions.retain(Subscription::is_live);

        if let Some(existing) = subscriptions
            .iter()
            .find(|subscription| Weak::ptr_eq(&subscription.callback, &weak))
        {
            return existing.id;
        }

        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        subscriptions.push(Subscription { id, callback: weak });
        debug!(
            target: EVENTS_TARGET,
            event,
            subscription = id.get(),
            "registered event callback"
        );
        id
    }

    /// Subscribes `callback` to `before_<event>`.
    pub fn before(&self, event: &str, callback: &Callback) -> SubscriptionId {
        self.on(&before_event(event), callback)
    }

    /// Subscribes `callback` to `after_<event>`.
    pub fn after(&self, event: &str, callback: &Callback) -> SubscriptionId {
        self.on(&after_event(event), callback)
    }

    /// Removes a subscription. Returns `false` if it was not registered.
    pub fn off(&self, event: &str, id: SubscriptionId) -> bool {
        let mut handlers = self.lock();
        let Some(subscriptions) = handlers.get_mut(event) else {
            return false;
        };
        let before = subscriptions.len();
        subscriptions.retain(|subscription| subscription.id != id);
        let removed = subscriptions.len() != before;
        if subscriptions.is_empty() {
            handlers.remove(event);
        }
        removed
    }

    /// Invokes every live callback subscribed to `event` with `args`.
    ///
    /// Callbacks run sequentially in subscription order, outside the bus
    /// lock, so they may subscribe or emit themselves.
    pub fn emit(&self, event: &str, args: &[Value]) -> EmitReport {
        let callbacks = self.live_callbacks(event);
        let mut report = EmitReport::new(event);

        for (id, callback) in callbacks {
            report.invoked += 1;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| callback(args)));
            let message = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => describe_error(&*error),
                Err(payload) => format!("callback panicked: {}", panic_message(payload.as_ref())),
            };
            warn!(
                target: EVENTS_TARGET,
                event,
                subscription = id.get(),
                error = %message,
                "event callback failed"
            );
            report.failures.push(CallbackFailure {
                subscription: id,
                message,
            });
        }

        report
    }

    /// Emits `before_<event>`.
    pub fn emit_before(&self, event: &str, args: &[Value]) -> EmitReport {
        self.emit(&before_event(event), args)
    }

    /// Emits `after_<event>`.
    pub fn emit_after(&self, event: &str, args: &[Value]) -> EmitReport {
        self.emit(&after_event(event), args)
    }

    /// Returns the number of live subscriptions for `event`.
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.lock().get(event).map_or(0, |subscriptions| {
            subscriptions
                .iter()
                .filter(|subscription| subscription.is_live())
                .count()
        })
    }

    /// Drops every subscription.
    pub fn clear(&self) {
        self.lock().clear();
    }

    fn live_callbacks(&self, event: &str) -> Vec<(SubscriptionId, Callback)> {
        let mut handlers = self.lock();
        let Some(subscriptions) = handlers.get_mut(event) else {
            return Vec::new();
        };
        subscriptions.retain(Subscription::is_live);
        let live: Vec<(SubscriptionId, Callback)> = subscriptions
            .iter()
            .filter_map(|subscription| {
                subscription
                    .callback
                    .upgrade()
                    .map(|callback| (subscription.id, callback))
            })
            .collect();
        if subscriptions.is_empty() {
            handlers.remove(event);
        }
        live
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<Subscription>>> {
        self.handlers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn describe_error(error: &(dyn std::error::Error + 'static)) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        return (*text).to_owned();
    }
    if let Some(text) = payload.downcast_ref::<String>() {
        return text.clone();
    }
    String::from("non-string panic payload")
}
