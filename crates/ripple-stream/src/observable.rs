//! Cold observables and their combinators.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::{StreamError, Subscription};

/// The receiving end handed to an observable's producer function.
///
/// Delivery stops permanently after the first terminal event (`error` or
/// `complete`) or once the subscription is unsubscribed; stray calls after
/// that are silently dropped.
pub struct Subscriber<T> {
    inner: Rc<SubscriberInner<T>>,
}

struct SubscriberInner<T> {
    stopped: Cell<bool>,
    subscription: Subscription,
    on_next: Box<dyn Fn(T)>,
    on_error: Box<dyn Fn(StreamError)>,
    on_complete: Box<dyn Fn()>,
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Subscriber<T> {
    fn new(
        on_next: Box<dyn Fn(T)>,
        on_error: Box<dyn Fn(StreamError)>,
        on_complete: Box<dyn Fn()>,
    ) -> Self {
        Self {
            inner: Rc::new(SubscriberInner {
                stopped: Cell::new(false),
                subscription: Subscription::new(),
                on_next,
                on_error,
                on_complete,
            }),
        }
    }

    /// Deliver a value.
    pub fn next(&self, value: T) {
        if !self.closed() {
            (self.inner.on_next)(value);
        }
    }

    /// Deliver a failure and close the subscription.
    pub fn error(&self, err: StreamError) {
        if self.closed() {
            return;
        }
        self.inner.stopped.set(true);
        (self.inner.on_error)(err);
        self.inner.subscription.unsubscribe();
    }

    /// Signal completion and close the subscription.
    pub fn complete(&self) {
        if self.closed() {
            return;
        }
        self.inner.stopped.set(true);
        (self.inner.on_complete)();
        self.inner.subscription.unsubscribe();
    }

    /// Whether delivery has stopped (terminal event or unsubscribed).
    pub fn closed(&self) -> bool {
        self.inner.stopped.get() || self.inner.subscription.closed()
    }

    /// The subscription controlling this subscriber.
    pub fn subscription(&self) -> Subscription {
        self.inner.subscription.clone()
    }

    /// Register a teardown to run when this subscriber is closed.
    pub fn add_teardown(&self, teardown: impl FnOnce() + 'static) {
        self.inner.subscription.add(teardown);
    }
}

/// A cold, push-based producer of values.
///
/// Each call to [`subscribe`] runs the producer function afresh; sharing a
/// single underlying execution between subscribers is opt-in via [`share`]
/// or [`share_replay`].
///
/// [`subscribe`]: Observable::subscribe
/// [`share`]: Observable::share
/// [`share_replay`]: Observable::share_replay
pub struct Observable<T> {
    producer: Rc<dyn Fn(&Subscriber<T>)>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            producer: Rc::clone(&self.producer),
        }
    }
}

impl<T: Clone + 'static> Observable<T> {
    /// Create an observable from a producer function.
    ///
    /// The producer is invoked once per subscription with the subscriber to
    /// feed; it should register any resources it owns as teardowns on the
    /// subscriber.
    pub fn new(producer: impl Fn(&Subscriber<T>) + 'static) -> Self {
        Self {
            producer: Rc::new(producer),
        }
    }

    /// An observable that emits one value and completes.
    pub fn of(value: T) -> Self {
        Self::new(move |sub| {
            sub.next(value.clone());
            sub.complete();
        })
    }

    /// An observable that synchronously emits every value, then completes.
    pub fn from_iter(values: Vec<T>) -> Self {
        Self::new(move |sub| {
            for value in &values {
                if sub.closed() {
                    return;
                }
                sub.next(value.clone());
            }
            sub.complete();
        })
    }

    /// An observable that never emits and never terminates.
    pub fn never() -> Self {
        Self::new(|_sub| {})
    }

    /// An observable that immediately fails.
    pub fn throw(err: StreamError) -> Self {
        Self::new(move |sub| sub.error(err.clone()))
    }

    /// Subscribe with a value callback only.
    ///
    /// Errors are traced and otherwise dropped; prefer [`subscribe_all`]
    /// when failure matters.
    ///
    /// [`subscribe_all`]: Observable::subscribe_all
    pub fn subscribe(&self, on_next: impl Fn(T) + 'static) -> Subscription {
        self.subscribe_all(
            on_next,
            |err| tracing::trace!("unobserved stream error: {err}"),
            || {},
        )
    }

    /// Subscribe with value, error and completion callbacks.
    pub fn subscribe_all(
        &self,
        on_next: impl Fn(T) + 'static,
        on_error: impl Fn(StreamError) + 'static,
        on_complete: impl Fn() + 'static,
    ) -> Subscription {
        let subscriber = Subscriber::new(
            Box::new(on_next),
            Box::new(on_error),
            Box::new(on_complete),
        );
        (self.producer)(&subscriber);
        subscriber.subscription()
    }

    /// Attach the whole of `self` to an existing downstream subscriber,
    /// tying the upstream subscription to the downstream one.
    fn feed(&self, dest: &Subscriber<T>) {
        let d_next = dest.clone();
        let d_err = dest.clone();
        let d_done = dest.clone();
        let upstream = self.subscribe_all(
            move |v| d_next.next(v),
            move |e| d_err.error(e),
            move || d_done.complete(),
        );
        dest.add_teardown(move || upstream.unsubscribe());
    }

    /// Transform each value.
    pub fn map<U: Clone + 'static>(&self, f: impl Fn(T) -> U + 'static) -> Observable<U> {
        let source = self.clone();
        let f = Rc::new(f);
        Observable::new(move |dest| {
            let f = Rc::clone(&f);
            let d_next = dest.clone();
            let d_err = dest.clone();
            let d_done = dest.clone();
            let upstream = source.subscribe_all(
                move |v| d_next.next(f(v)),
                move |e| d_err.error(e),
                move || d_done.complete(),
            );
            dest.add_teardown(move || upstream.unsubscribe());
        })
    }

    /// Transform each value through a fallible function; an `Err` becomes
    /// the stream's failure.
    pub fn map_result<U: Clone + 'static>(
        &self,
        f: impl Fn(T) -> Result<U, StreamError> + 'static,
    ) -> Observable<U> {
        let source = self.clone();
        let f = Rc::new(f);
        Observable::new(move |dest| {
            let f = Rc::clone(&f);
            let d_next = dest.clone();
            let d_err = dest.clone();
            let d_done = dest.clone();
            let upstream = source.subscribe_all(
                move |v| match f(v) {
                    Ok(u) => d_next.next(u),
                    Err(e) => d_next.error(e),
                },
                move |e| d_err.error(e),
                move || d_done.complete(),
            );
            dest.add_teardown(move || upstream.unsubscribe());
        })
    }

    /// Map each value to an inner observable and forward the latest inner's
    /// emissions, unsubscribing the previous inner when a new outer value
    /// arrives (switch semantics).
    pub fn switch_map<U: Clone + 'static>(
        &self,
        f: impl Fn(T) -> Observable<U> + 'static,
    ) -> Observable<U> {
        let source = self.clone();
        let f = Rc::new(f);
        Observable::new(move |dest| {
            let f = Rc::clone(&f);
            let inner_sub: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
            let inner_live = Rc::new(Cell::new(false));
            let outer_done = Rc::new(Cell::new(false));

            let d_next = dest.clone();
            let d_err = dest.clone();
            let d_done = dest.clone();
            let sub_slot = Rc::clone(&inner_sub);
            let live = Rc::clone(&inner_live);
            let done = Rc::clone(&outer_done);

            let upstream = source.subscribe_all(
                move |v| {
                    if let Some(prev) = sub_slot.borrow_mut().take() {
                        prev.unsubscribe();
                    }
                    live.set(true);
                    let inner = f(v);
                    let i_next = d_next.clone();
                    let i_err = d_next.clone();
                    let i_done = d_next.clone();
                    let i_live = Rc::clone(&live);
                    let i_outer_done = Rc::clone(&done);
                    let sub = inner.subscribe_all(
                        move |u| i_next.next(u),
                        move |e| i_err.error(e),
                        move || {
                            i_live.set(false);
                            if i_outer_done.get() {
                                i_done.complete();
                            }
                        },
                    );
                    *sub_slot.borrow_mut() = Some(sub);
                },
                move |e| d_err.error(e),
                move || {
                    outer_done.set(true);
                    if !inner_live.get() {
                        d_done.complete();
                    }
                },
            );
            dest.add_teardown(move || upstream.unsubscribe());
            let sub_slot = Rc::clone(&inner_sub);
            dest.add_teardown(move || {
                if let Some(sub) = sub_slot.borrow_mut().take() {
                    sub.unsubscribe();
                }
            });
        })
    }

    /// Pass through the first `count` values, then complete.
    pub fn take(&self, count: usize) -> Observable<T> {
        let source = self.clone();
        Observable::new(move |dest| {
            if count == 0 {
                dest.complete();
                return;
            }
            let seen = Rc::new(Cell::new(0usize));
            let d_next = dest.clone();
            let d_err = dest.clone();
            let d_done = dest.clone();
            let upstream = source.subscribe_all(
                move |v| {
                    let n = seen.get() + 1;
                    seen.set(n);
                    d_next.next(v);
                    if n >= count {
                        d_next.complete();
                    }
                },
                move |e| d_err.error(e),
                move || d_done.complete(),
            );
            dest.add_teardown(move || upstream.unsubscribe());
        })
    }

    /// Multicast a single underlying execution among subscribers.
    ///
    /// The source is subscribed when the subscriber count goes from zero to
    /// one and unsubscribed when it returns to zero.
    pub fn share(&self) -> Observable<T> {
        self.multicast(false)
    }

    /// Like [`share`], additionally replaying the latest value to each new
    /// subscriber. This is the sharing mode the evaluator uses wherever one
    /// expression subtree feeds several consumers: joining late must not
    /// re-trigger the subtree's side effects.
    ///
    /// [`share`]: Observable::share
    pub fn share_replay(&self) -> Observable<T> {
        self.multicast(true)
    }

    fn multicast(&self, replay: bool) -> Observable<T> {
        let source = self.clone();
        let state = Rc::new(RefCell::new(ShareState::<T> {
            observers: Vec::new(),
            next_id: 0,
            source_sub: None,
            latest: None,
            terminal: None,
        }));
        Observable::new(move |dest| {
            // Register first so that a synchronously-emitting source (a
            // behavior subject, say) reaches this subscriber too.
            let id = {
                let mut st = state.borrow_mut();
                let id = st.next_id;
                st.next_id += 1;
                st.observers.push((id, dest.clone()));
                id
            };

            {
                let replayed = if replay {
                    state.borrow().latest.clone()
                } else {
                    None
                };
                if let Some(v) = replayed {
                    dest.next(v);
                }
                let terminal = state.borrow().terminal.clone();
                match terminal {
                    Some(Terminal::Complete) => dest.complete(),
                    Some(Terminal::Error(e)) => dest.error(e),
                    None => {}
                }
            }

            let st = Rc::clone(&state);
            dest.add_teardown(move || {
                let mut s = st.borrow_mut();
                s.observers.retain(|(oid, _)| *oid != id);
                if s.observers.is_empty() {
                    if let Some(sub) = s.source_sub.take() {
                        drop(s);
                        sub.unsubscribe();
                        let mut s = st.borrow_mut();
                        // Reset so a later subscriber restarts the source.
                        s.latest = None;
                        s.terminal = None;
                    }
                }
            });

            let needs_connect =
                { state.borrow().source_sub.is_none() && state.borrow().terminal.is_none() };
            if needs_connect && !dest.closed() {
                let st_next = Rc::clone(&state);
                let st_err = Rc::clone(&state);
                let st_done = Rc::clone(&state);
                let sub = source.subscribe_all(
                    move |v: T| {
                        let targets: Vec<Subscriber<T>> = {
                            let mut s = st_next.borrow_mut();
                            if replay {
                                s.latest = Some(v.clone());
                            }
                            s.observers.iter().map(|(_, o)| o.clone()).collect()
                        };
                        for target in targets {
                            target.next(v.clone());
                        }
                    },
                    move |e: StreamError| {
                        let targets: Vec<Subscriber<T>> = {
                            let mut s = st_err.borrow_mut();
                            s.terminal = Some(Terminal::Error(e.clone()));
                            std::mem::take(&mut s.observers)
                                .into_iter()
                                .map(|(_, o)| o)
                                .collect()
                        };
                        for target in targets {
                            target.error(e.clone());
                        }
                    },
                    move || {
                        let targets: Vec<Subscriber<T>> = {
                            let mut s = st_done.borrow_mut();
                            s.terminal = Some(Terminal::Complete);
                            std::mem::take(&mut s.observers)
                                .into_iter()
                                .map(|(_, o)| o)
                                .collect()
                        };
                        for target in targets {
                            target.complete();
                        }
                    },
                );
                let mut s = state.borrow_mut();
                if s.terminal.is_none() && !s.observers.is_empty() {
                    s.source_sub = Some(sub);
                } else {
                    drop(s);
                    sub.unsubscribe();
                }
            }
        })
    }

    /// Combine the latest values of every source: once all have emitted,
    /// re-emit the full tuple whenever any one of them emits. The first
    /// source failure fails the combination; completion requires all
    /// sources to complete.
    pub fn combine_latest(sources: Vec<Observable<T>>) -> Observable<Vec<T>> {
        Observable::new(move |dest| {
            let n = sources.len();
            if n == 0 {
                dest.complete();
                return;
            }
            let latest: Rc<RefCell<Vec<Option<T>>>> = Rc::new(RefCell::new(vec![None; n]));
            let completed = Rc::new(Cell::new(0usize));

            for (i, source) in sources.iter().enumerate() {
                let latest_in = Rc::clone(&latest);
                let completed_in = Rc::clone(&completed);
                let d_next = dest.clone();
                let d_err = dest.clone();
                let d_done = dest.clone();
                let upstream = source.subscribe_all(
                    move |v| {
                        let snapshot: Option<Vec<T>> = {
                            let mut slots = latest_in.borrow_mut();
                            slots[i] = Some(v);
                            slots.iter().cloned().collect()
                        };
                        if let Some(values) = snapshot {
                            d_next.next(values);
                        }
                    },
                    move |e| d_err.error(e),
                    move || {
                        completed_in.set(completed_in.get() + 1);
                        if completed_in.get() == n {
                            d_done.complete();
                        }
                    },
                );
                dest.add_teardown(move || upstream.unsubscribe());
            }
        })
    }

    /// Interleave every source's emissions into one stream. Errors pass
    /// through; completion requires all sources to complete.
    pub fn merge(sources: Vec<Observable<T>>) -> Observable<T> {
        Observable::new(move |dest| {
            let n = sources.len();
            if n == 0 {
                dest.complete();
                return;
            }
            let completed = Rc::new(Cell::new(0usize));
            for source in &sources {
                let completed_in = Rc::clone(&completed);
                source.feed_partial(dest, move |d| {
                    completed_in.set(completed_in.get() + 1);
                    if completed_in.get() == n {
                        d.complete();
                    }
                });
            }
        })
    }

    /// Subscribe and synchronously capture the first value, if the source
    /// delivers one before `subscribe` returns; then unsubscribe.
    ///
    /// This is the explicit "attempt immediate resolution" operation: it
    /// returns `None` rather than waiting for an asynchronous value.
    pub fn resolve_now(&self) -> Option<T> {
        let slot: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
        let captured = Rc::clone(&slot);
        let sub = self.subscribe(move |v| {
            let mut s = captured.borrow_mut();
            if s.is_none() {
                *s = Some(v);
            }
        });
        sub.unsubscribe();
        slot.take()
    }

    /// Like [`feed`] but with a custom completion handler (used by merge,
    /// where a single source completing must not complete the output).
    ///
    /// [`feed`]: Observable::feed
    fn feed_partial(&self, dest: &Subscriber<T>, on_complete: impl Fn(&Subscriber<T>) + 'static) {
        let d_next = dest.clone();
        let d_err = dest.clone();
        let d_done = dest.clone();
        let upstream = self.subscribe_all(
            move |v| d_next.next(v),
            move |e| d_err.error(e),
            move || on_complete(&d_done),
        );
        dest.add_teardown(move || upstream.unsubscribe());
    }

    /// Identity comparison: whether two handles share one producer.
    pub fn ptr_eq(&self, other: &Observable<T>) -> bool {
        Rc::ptr_eq(&self.producer, &other.producer)
    }

    /// Prefix the stream with a fixed first value.
    pub fn start_with(&self, value: T) -> Observable<T> {
        let source = self.clone();
        Observable::new(move |dest| {
            dest.next(value.clone());
            source.feed(dest);
        })
    }
}

struct ShareState<T> {
    observers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
    source_sub: Option<Subscription>,
    latest: Option<T>,
    terminal: Option<Terminal>,
}

#[derive(Clone)]
enum Terminal {
    Complete,
    Error(StreamError),
}
