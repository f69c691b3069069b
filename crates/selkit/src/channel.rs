#![forbid(unsafe_code)]

//! Typed, per-instance event channels.
//!
//! Every item and group owns one [`EventChannel`] for its public events.
//! Subscribers get an RAII [`Subscription`]; dropping it detaches the
//! callback. A [`SubscriptionScope`] collects the subscriptions of one
//! owner so they can all be released together.
//!
//! # Architecture
//!
//! The channel keeps `Weak` callback pointers and the subscription holds
//! the only strong pointer. Dead entries are pruned lazily on the next
//! emit.
//!
//! # Invariants
//!
//! 1. Subscribers are notified in registration order.
//! 2. A callback registered while an emit is running is not called for that
//!    emit.
//! 3. Dropping a [`Subscription`] removes the callback before the next emit.
//! 4. Callbacks may re-enter the channel (subscribe, emit) without
//!    panicking: no borrow is held while user code runs.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::context::EventContext;

type Callback<E> = dyn Fn(&E, &EventContext);

/// A list of subscribers for events of type `E`.
pub struct EventChannel<E> {
    subscribers: RefCell<Vec<Weak<Callback<E>>>>,
}

impl<E: 'static> EventChannel<E> {
    /// Create a channel with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Register `callback`; it stays registered while the returned
    /// [`Subscription`] is alive.
    #[must_use = "dropping the subscription immediately unsubscribes"]
    pub fn subscribe(&self, callback: impl Fn(&E, &EventContext) + 'static) -> Subscription {
        let strong: Rc<Callback<E>> = Rc::new(callback);
        self.subscribers.borrow_mut().push(Rc::downgrade(&strong));
        Subscription {
            _callback: Box::new(strong),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .borrow()
            .iter()
            .filter(|w| w.strong_count() > 0)
            .count()
    }

    pub(crate) fn emit(&self, event: &E, context: &EventContext) {
        let live: Vec<Rc<Callback<E>>> = {
            let mut subs = self.subscribers.borrow_mut();
            subs.retain(|w| w.strong_count() > 0);
            subs.iter().filter_map(Weak::upgrade).collect()
        };
        for callback in live {
            callback(event, context);
        }
    }
}

impl<E: 'static> Default for EventChannel<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> fmt::Debug for EventChannel<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

/// RAII guard for one channel callback.
#[must_use = "dropping the subscription immediately unsubscribes"]
pub struct Subscription {
    _callback: Box<dyn Any>,
}

impl Subscription {
    /// Detach the callback now.
    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").finish_non_exhaustive()
    }
}

/// Collects the subscriptions of one logical owner.
///
/// Clearing or dropping the scope unsubscribes everything it holds.
///
/// ```
/// use selkit::{Item, SubscriptionScope};
///
/// let item = Item::new();
/// let mut scope = SubscriptionScope::new();
/// scope.hold(item.subscribe(|_, _| {}));
/// assert_eq!(item.subscriber_count(), 1);
///
/// scope.clear();
/// assert_eq!(item.subscriber_count(), 0);
/// ```
#[derive(Default)]
pub struct SubscriptionScope {
    subscriptions: Vec<Subscription>,
}

impl SubscriptionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `subscription` alive until the scope is cleared or dropped.
    pub fn hold(&mut self, subscription: Subscription) -> &mut Self {
        self.subscriptions.push(subscription);
        self
    }

    /// Number of held subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Release every held subscription; the scope stays usable.
    pub fn clear(&mut self) {
        self.subscriptions.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("len", &self.subscriptions.len())
            .finish()
    }
}
