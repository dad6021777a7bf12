//! Hot multicast sources.

use std::cell::RefCell;
use std::rc::Rc;

use crate::observable::{Observable, Subscriber};
use crate::StreamError;

/// A hot multicast source: values pushed with [`next`] are delivered to
/// every current subscriber. Late subscribers to a terminated subject get
/// the terminal event immediately and nothing else.
///
/// [`next`]: Subject::next
pub struct Subject<T> {
    inner: Rc<RefCell<SubjectState<T>>>,
}

struct SubjectState<T> {
    observers: Vec<(u64, Subscriber<T>)>,
    next_id: u64,
    terminal: Option<Terminal>,
}

#[derive(Clone)]
enum Terminal {
    Complete,
    Error(StreamError),
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Subject<T> {
    /// Create a new subject with no observers.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(SubjectState {
                observers: Vec::new(),
                next_id: 0,
                terminal: None,
            })),
        }
    }

    /// Whether any observer is currently attached.
    pub fn has_observers(&self) -> bool {
        !self.inner.borrow().observers.is_empty()
    }

    pub(crate) fn is_terminated(&self) -> bool {
        self.inner.borrow().terminal.is_some()
    }
}

impl<T: Clone + 'static> Subject<T> {
    /// Push a value to all current observers.
    ///
    /// Observers are snapshotted before delivery, so a callback may
    /// subscribe or unsubscribe without disturbing the emission in flight.
    pub fn next(&self, value: T) {
        let targets: Vec<Subscriber<T>> = {
            let state = self.inner.borrow();
            if state.terminal.is_some() {
                return;
            }
            state.observers.iter().map(|(_, o)| o.clone()).collect()
        };
        for target in targets {
            target.next(value.clone());
        }
    }

    /// Fail the subject; all current and future observers see the error.
    pub fn error(&self, err: StreamError) {
        let targets = self.terminate(Terminal::Error(err.clone()));
        for target in targets {
            target.error(err.clone());
        }
    }

    /// Complete the subject; all current and future observers see it.
    pub fn complete(&self) {
        let targets = self.terminate(Terminal::Complete);
        for target in targets {
            target.complete();
        }
    }

    fn terminate(&self, terminal: Terminal) -> Vec<Subscriber<T>> {
        let mut state = self.inner.borrow_mut();
        if state.terminal.is_some() {
            return Vec::new();
        }
        state.terminal = Some(terminal);
        std::mem::take(&mut state.observers)
            .into_iter()
            .map(|(_, o)| o)
            .collect()
    }

    /// The subject's observable face.
    pub fn as_observable(&self) -> Observable<T> {
        let inner = Rc::clone(&self.inner);
        Observable::new(move |dest| {
            let terminal = inner.borrow().terminal.clone();
            match terminal {
                Some(Terminal::Complete) => {
                    dest.complete();
                    return;
                }
                Some(Terminal::Error(e)) => {
                    dest.error(e);
                    return;
                }
                None => {}
            }
            let id = {
                let mut state = inner.borrow_mut();
                let id = state.next_id;
                state.next_id += 1;
                state.observers.push((id, dest.clone()));
                id
            };
            let registry = Rc::clone(&inner);
            dest.add_teardown(move || {
                registry
                    .borrow_mut()
                    .observers
                    .retain(|(oid, _)| *oid != id);
            });
        })
    }
}

/// A [`Subject`] that holds a current value, delivering it immediately to
/// each new subscriber (replay-latest).
pub struct BehaviorSubject<T> {
    current: Rc<RefCell<T>>,
    subject: Subject<T>,
}

impl<T> Clone for BehaviorSubject<T> {
    fn clone(&self) -> Self {
        Self {
            current: Rc::clone(&self.current),
            subject: self.subject.clone(),
        }
    }
}

impl<T: Clone + 'static> BehaviorSubject<T> {
    /// Create a behavior subject seeded with `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            current: Rc::new(RefCell::new(initial)),
            subject: Subject::new(),
        }
    }

    /// The current (latest) value.
    pub fn value(&self) -> T {
        self.current.borrow().clone()
    }

    /// Update the current value and push it to all observers.
    pub fn next(&self, value: T) {
        *self.current.borrow_mut() = value.clone();
        self.subject.next(value);
    }

    /// Fail the subject.
    pub fn error(&self, err: StreamError) {
        self.subject.error(err);
    }

    /// Complete the subject.
    pub fn complete(&self) {
        self.subject.complete();
    }

    /// Whether any observer is currently attached.
    pub fn has_observers(&self) -> bool {
        self.subject.has_observers()
    }

    /// The subject's observable face: emits the current value on subscribe,
    /// then every later update.
    pub fn as_observable(&self) -> Observable<T> {
        let current = Rc::clone(&self.current);
        let subject = self.subject.clone();
        Observable::new(move |dest| {
            if !subject.is_terminated() {
                dest.next(current.borrow().clone());
            }
            let tail = subject.as_observable();
            let d_next = dest.clone();
            let d_err = dest.clone();
            let d_done = dest.clone();
            let upstream = tail.subscribe_all(
                move |v| d_next.next(v),
                move |e| d_err.error(e),
                move || d_done.complete(),
            );
            dest.add_teardown(move || upstream.unsubscribe());
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subject_multicasts() {
        let subject = Subject::new();
        let a: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
        let b: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
        let sink_a = Rc::clone(&a);
        let sink_b = Rc::clone(&b);
        let _sa = subject
            .as_observable()
            .subscribe(move |v| sink_a.borrow_mut().push(v));
        let _sb = subject
            .as_observable()
            .subscribe(move |v| sink_b.borrow_mut().push(v));
        subject.next(1);
        subject.next(2);
        assert_eq!(*a.borrow(), vec![1, 2]);
        assert_eq!(*b.borrow(), vec![1, 2]);
    }

    #[test]
    fn subject_late_subscriber_sees_terminal_only() {
        let subject = Subject::<i32>::new();
        subject.next(1);
        subject.complete();

        let completed = Rc::new(std::cell::Cell::new(false));
        let flag = Rc::clone(&completed);
        let values: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&values);
        subject.as_observable().subscribe_all(
            move |v| sink.borrow_mut().push(v),
            |_| {},
            move || flag.set(true),
        );
        assert!(values.borrow().is_empty());
        assert!(completed.get());
    }

    #[test]
    fn behavior_subject_replays_latest() {
        let subject = BehaviorSubject::new(1);
        subject.next(2);

        let values: Rc<RefCell<Vec<i32>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&values);
        let _sub = subject
            .as_observable()
            .subscribe(move |v| sink.borrow_mut().push(v));
        subject.next(3);
        assert_eq!(*values.borrow(), vec![2, 3]);
        assert_eq!(subject.value(), 3);
    }

    #[test]
    fn behavior_subject_error_reaches_subscribers() {
        let subject = BehaviorSubject::new(0);
        let errs: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&errs);
        subject.as_observable().subscribe_all(
            |_| {},
            move |e| sink.borrow_mut().push(e.to_string()),
            || {},
        );
        subject.error(StreamError::new("dead"));
        assert_eq!(*errs.borrow(), vec!["dead".to_string()]);
    }

    #[test]
    fn unsubscribed_observer_is_forgotten() {
        let subject = Subject::<i32>::new();
        let sub = subject.as_observable().subscribe(|_| {});
        assert!(subject.has_observers());
        sub.unsubscribe();
        assert!(!subject.has_observers());
    }
}
