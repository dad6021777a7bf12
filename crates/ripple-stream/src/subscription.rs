//! Explicit, transitive cancellation.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A handle to an active subscription.
///
/// Cloning the handle shares the underlying state: unsubscribing through any
/// clone unsubscribes them all. Teardown callbacks registered with [`add`]
/// run exactly once, when [`unsubscribe`] is first called; registering a
/// callback on an already-closed subscription runs it immediately.
///
/// There is no `Drop` impl — cancellation is always explicit.
///
/// [`add`]: Subscription::add
/// [`unsubscribe`]: Subscription::unsubscribe
#[derive(Clone)]
pub struct Subscription {
    inner: Rc<SubscriptionInner>,
}

struct SubscriptionInner {
    closed: Cell<bool>,
    teardowns: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl Subscription {
    /// Create a new, open subscription.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(SubscriptionInner {
                closed: Cell::new(false),
                teardowns: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Whether this subscription has been unsubscribed.
    pub fn closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Register a teardown callback.
    ///
    /// Runs when the subscription is unsubscribed, or immediately if it
    /// already has been.
    pub fn add(&self, teardown: impl FnOnce() + 'static) {
        if self.closed() {
            teardown();
        } else {
            self.inner.teardowns.borrow_mut().push(Box::new(teardown));
        }
    }

    /// Tie a child subscription's lifetime to this one.
    pub fn add_subscription(&self, child: Subscription) {
        self.add(move || child.unsubscribe());
    }

    /// Close the subscription and run all registered teardowns.
    ///
    /// Idempotent: later calls are no-ops.
    pub fn unsubscribe(&self) {
        if self.inner.closed.replace(true) {
            return;
        }
        // Drain first: a teardown may re-enter and register further
        // teardowns (which then run immediately, since we are closed).
        let teardowns = std::mem::take(&mut *self.inner.teardowns.borrow_mut());
        for teardown in teardowns {
            teardown();
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("closed", &self.closed())
            .finish()
    }
}
