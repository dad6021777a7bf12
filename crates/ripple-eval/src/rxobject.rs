//! Reactive object wrapper.
//!
//! Wraps a plain array or object so that every write is observable, both
//! per property and for the object as a whole. Wrappers are memoized per
//! (target identity, mode) in a thread-local registry, so wrapping the same
//! target twice yields the same wrapper and one shared set of subjects.
//!
//! In deep mode nested plain arrays/objects are wrapped recursively and
//! their mutations bubble to the parent's streams.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use ripple_stream::{BehaviorSubject, Observable, StreamError, Subscription};

use crate::error::EvalError;
use crate::value::{ArrayRef, ObjectRef, Value};

/// Combination callback for [`RxObject::set_observable`]: receives the
/// assignment receiver, the property key and the emitted value, applies the
/// write and returns the written value.
pub type CombineFn = Rc<dyn Fn(Value, &str, Value) -> Result<Value, EvalError>>;

/// A reactive wrapper around a plain array or object.
///
/// Cloning shares the wrapper; equality is wrapper identity.
#[derive(Clone)]
pub struct RxObject {
    inner: Rc<RxInner>,
}

struct RxInner {
    target: Value,
    deep: bool,
    /// Whole-object stream; replays the (mutated in place) target.
    main: BehaviorSubject<Value>,
    /// Per-property streams, created lazily on first request.
    props: RefCell<HashMap<Rc<str>, BehaviorSubject<Value>>>,
    /// Deep-mode child subscriptions, keyed by the property they sit under.
    bubbles: RefCell<HashMap<Rc<str>, Subscription>>,
    /// Per-property binding generation; a write outside the binding bumps
    /// it and freezes any older `set_observable` binding for that key.
    binding_gen: RefCell<HashMap<Rc<str>, u64>>,
    next_gen: Cell<u64>,
    /// Key/generation currently being written by a live binding, so that
    /// the binding's own write does not freeze itself.
    applying: RefCell<Option<(Rc<str>, u64)>>,
}

thread_local! {
    static REGISTRY: RefCell<HashMap<(usize, bool), RxObject>> = RefCell::new(HashMap::new());
}

fn target_addr(target: &Value) -> Option<usize> {
    match target {
        Value::Array(a) => Some(a.addr()),
        Value::Object(o) => Some(o.addr()),
        _ => None,
    }
}

/// Drop the memoized wrappers (both modes) for a target, so a later wrap
/// starts fresh. Accepts the plain target or a wrapper around it.
pub fn release(target: &Value) {
    let addr = match target {
        Value::Reactive(rx) => target_addr(&rx.inner.target),
        other => target_addr(other),
    };
    if let Some(addr) = addr {
        REGISTRY.with(|r| {
            let mut reg = r.borrow_mut();
            reg.remove(&(addr, false));
            reg.remove(&(addr, true));
        });
    }
}

/// Drop every memoized wrapper on this thread.
pub fn clear_registry() {
    REGISTRY.with(|r| r.borrow_mut().clear());
}

impl RxObject {
    /// Wrap a plain array or object. Wrapping an already-reactive value
    /// returns the same wrapper; wrapping the same target in the same mode
    /// twice returns the memoized wrapper.
    pub fn wrap(target: &Value, deep: bool) -> Result<RxObject, EvalError> {
        match target {
            Value::Reactive(rx) => Ok(rx.clone()),
            Value::Array(_) | Value::Object(_) => {
                let addr = target_addr(target).unwrap_or_default();
                let existing =
                    REGISTRY.with(|r| r.borrow().get(&(addr, deep)).cloned());
                if let Some(rx) = existing {
                    return Ok(rx);
                }
                let rx = RxObject {
                    inner: Rc::new(RxInner {
                        target: target.clone(),
                        deep,
                        main: BehaviorSubject::new(target.clone()),
                        props: RefCell::new(HashMap::new()),
                        bubbles: RefCell::new(HashMap::new()),
                        binding_gen: RefCell::new(HashMap::new()),
                        next_gen: Cell::new(1),
                        applying: RefCell::new(None),
                    }),
                };
                // Register before descending so cyclic targets terminate.
                REGISTRY.with(|r| {
                    r.borrow_mut().insert((addr, deep), rx.clone());
                });
                if deep {
                    rx.wrap_children();
                }
                Ok(rx)
            }
            other => Err(EvalError::Type(format!(
                "cannot make a value of type {} reactive",
                other.type_name()
            ))),
        }
    }

    fn wrap_children(&self) {
        for key in self.own_keys() {
            let current = self.raw_get(&key);
            if matches!(current, Value::Array(_) | Value::Object(_)) {
                if let Ok(child) = RxObject::wrap(&current, true) {
                    self.raw_set(&key, Value::Reactive(child.clone()));
                    self.install_bubble(key, &child);
                }
            }
        }
    }

    fn install_bubble(&self, key: Rc<str>, child: &RxObject) {
        if let Some(old) = self.inner.bubbles.borrow_mut().remove(&key) {
            old.unsubscribe();
        }
        let weak = Rc::downgrade(&self.inner);
        let notify_key = key.clone();
        // The child's whole-object stream replays on subscribe; that first
        // emission is current state, not a new mutation.
        let first = Cell::new(true);
        let sub = child.as_observable().subscribe(move |_| {
            if first.get() {
                first.set(false);
                return;
            }
            if let Some(inner) = weak.upgrade() {
                let parent = RxObject { inner };
                parent.notify(&notify_key);
            }
        });
        self.inner.bubbles.borrow_mut().insert(key, sub);
    }

    /// The wrapped target.
    pub fn snapshot(&self) -> Value {
        self.inner.target.clone()
    }

    pub fn as_array(&self) -> Option<ArrayRef> {
        match &self.inner.target {
            Value::Array(a) => Some(a.clone()),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<ObjectRef> {
        match &self.inner.target {
            Value::Object(o) => Some(o.clone()),
            _ => None,
        }
    }

    pub fn is_deep(&self) -> bool {
        self.inner.deep
    }

    pub fn ptr_eq(&self, other: &RxObject) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Current keys of the target (indices, for an array).
    pub fn own_keys(&self) -> Vec<Rc<str>> {
        match &self.inner.target {
            Value::Object(o) => o.keys(),
            Value::Array(a) => (0..a.len()).map(|i| i.to_string().into()).collect(),
            _ => Vec::new(),
        }
    }

    pub fn has(&self, key: &str) -> bool {
        match &self.inner.target {
            Value::Object(o) => o.has(key),
            Value::Array(a) => key
                .parse::<usize>()
                .map(|i| i < a.len())
                .unwrap_or(key == "length"),
            _ => false,
        }
    }

    /// Current value of a property, `undefined` when absent.
    pub fn get(&self, key: &str) -> Value {
        self.raw_get(key)
    }

    /// Write a property and emit on the per-property and whole-object
    /// streams. Returns the stored value (which, in deep mode, is the
    /// reactive wrapper of the written value).
    pub fn set(&self, key: &str, value: Value) -> Value {
        let from_binding = {
            let applying = self.inner.applying.borrow();
            matches!(&*applying, Some((k, gen)) if &**k == key && *gen == self.current_gen(key))
        };
        if !from_binding {
            self.bump_gen(key);
        }
        self.store(key, value)
    }

    fn store(&self, key: &str, value: Value) -> Value {
        let key: Rc<str> = key.into();
        if let Some(old) = self.inner.bubbles.borrow_mut().remove(&key) {
            old.unsubscribe();
        }
        let stored = if self.inner.deep
            && matches!(value, Value::Array(_) | Value::Object(_))
        {
            match RxObject::wrap(&value, true) {
                Ok(child) => Value::Reactive(child),
                Err(_) => value,
            }
        } else {
            value
        };
        self.raw_set(&key, stored.clone());
        if self.inner.deep {
            if let Value::Reactive(child) = &stored {
                self.install_bubble(key.clone(), child);
            }
        }
        self.notify(&key);
        stored
    }

    /// Remove a property. The per-property stream (if any) emits
    /// `undefined` and is dropped; the whole-object stream emits.
    pub fn delete(&self, key: &str) -> bool {
        if let Some(old) = self.inner.bubbles.borrow_mut().remove(key) {
            old.unsubscribe();
        }
        let removed = match &self.inner.target {
            Value::Object(o) => o.delete(key),
            Value::Array(a) => match key.parse::<usize>() {
                Ok(i) if i < a.len() => {
                    a.set(i, Value::Undefined);
                    true
                }
                _ => false,
            },
            _ => false,
        };
        self.bump_gen(key);
        let subject = self.inner.props.borrow_mut().remove(key);
        if let Some(subject) = subject {
            subject.next(Value::Undefined);
        }
        self.inner.main.next(self.snapshot());
        removed
    }

    /// Run an in-place mutation of the array target, then emit on every
    /// live property stream and the whole-object stream. In deep mode any
    /// plain arrays/objects the mutation introduced are wrapped and their
    /// bubbles re-keyed to current indices.
    pub fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, EvalError> {
        let Value::Array(arr) = &self.inner.target else {
            return Err(EvalError::Type(
                "array mutation on a non-array reactive object".to_owned(),
            ));
        };
        let out = f(&mut arr.borrow_mut());
        if self.inner.deep {
            self.rewrap_array_children(&arr.clone());
        }
        self.notify_all();
        Ok(out)
    }

    fn rewrap_array_children(&self, arr: &ArrayRef) {
        let old: Vec<Subscription> = {
            let mut bubbles = self.inner.bubbles.borrow_mut();
            bubbles.drain().map(|(_, sub)| sub).collect()
        };
        for sub in old {
            sub.unsubscribe();
        }
        for i in 0..arr.len() {
            let child = match arr.get(i) {
                Value::Reactive(rx) => Some(rx),
                v @ (Value::Array(_) | Value::Object(_)) => match RxObject::wrap(&v, true) {
                    Ok(rx) => {
                        arr.set(i, Value::Reactive(rx.clone()));
                        Some(rx)
                    }
                    Err(_) => None,
                },
                _ => None,
            };
            if let Some(rx) = child {
                self.install_bubble(i.to_string().into(), &rx);
            }
        }
    }

    /// The whole-object stream: replays the target, then emits it again
    /// after every write, delete or intercepted mutation.
    pub fn as_observable(&self) -> Observable<Value> {
        self.inner.main.as_observable()
    }

    /// Per-property stream: replays the current value (or `undefined` for a
    /// property that does not exist yet), then emits on every write to the
    /// key. The subject persists until the property is deleted.
    pub fn get_observable(&self, key: &str) -> Observable<Value> {
        let mut props = self.inner.props.borrow_mut();
        if let Some(subject) = props.get(key) {
            return subject.as_observable();
        }
        let subject = BehaviorSubject::new(self.raw_get(key));
        let stream = subject.as_observable();
        props.insert(key.into(), subject);
        stream
    }

    /// Bind a source stream to a property.
    ///
    /// Each emission applies `combine` (the assignment semantics) with this
    /// wrapper as receiver. If the property is independently overwritten,
    /// the binding goes stale: later emissions apply to a frozen one-entry
    /// snapshot `{key: current}`, keeping the visible property untouched.
    /// A later `set_observable` on the same key stales this one the same
    /// way. The returned stream carries the per-emission written values and
    /// is shared with latest-value replay; it applies nothing until
    /// subscribed.
    pub fn set_observable(
        &self,
        key: &str,
        source: Observable<Value>,
        combine: CombineFn,
    ) -> Observable<Value> {
        let gen = self.bump_gen(key);
        let weak = Rc::downgrade(&self.inner);
        let key: Rc<str> = key.into();
        source
            .map_result(move |emitted| {
                let Some(inner) = weak.upgrade() else {
                    return Err(StreamError::new("reactive target dropped"));
                };
                let rx = RxObject { inner };
                if rx.current_gen(&key) == gen {
                    *rx.inner.applying.borrow_mut() = Some((key.clone(), gen));
                    let out = combine(Value::Reactive(rx.clone()), &key, emitted);
                    *rx.inner.applying.borrow_mut() = None;
                    out.map_err(StreamError::from)
                } else {
                    let frozen = Value::object(vec![(key.clone(), rx.get(&key))]);
                    combine(frozen, &key, emitted).map_err(StreamError::from)
                }
            })
            .share_replay()
    }

    fn current_gen(&self, key: &str) -> u64 {
        self.inner
            .binding_gen
            .borrow()
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    fn bump_gen(&self, key: &str) -> u64 {
        let gen = self.inner.next_gen.get();
        self.inner.next_gen.set(gen + 1);
        self.inner.binding_gen.borrow_mut().insert(key.into(), gen);
        gen
    }

    fn notify(&self, key: &str) {
        let subject = self.inner.props.borrow().get(key).cloned();
        if let Some(subject) = subject {
            subject.next(self.raw_get(key));
        }
        self.inner.main.next(self.snapshot());
    }

    fn notify_all(&self) {
        let subjects: Vec<(Rc<str>, BehaviorSubject<Value>)> = self
            .inner
            .props
            .borrow()
            .iter()
            .map(|(k, s)| (k.clone(), s.clone()))
            .collect();
        for (key, subject) in subjects {
            subject.next(self.raw_get(&key));
        }
        self.inner.main.next(self.snapshot());
    }

    fn raw_get(&self, key: &str) -> Value {
        match &self.inner.target {
            Value::Object(o) => o.get(key).unwrap_or(Value::Undefined),
            Value::Array(a) => {
                if key == "length" {
                    Value::Number(a.len() as f64)
                } else if let Ok(i) = key.parse::<usize>() {
                    a.get(i)
                } else {
                    Value::Undefined
                }
            }
            _ => Value::Undefined,
        }
    }

    fn raw_set(&self, key: &str, value: Value) {
        match &self.inner.target {
            Value::Object(o) => o.set(key, value),
            Value::Array(a) => {
                if let Ok(i) = key.parse::<usize>() {
                    a.set(i, value);
                } else {
                    tracing::debug!(key, "ignoring non-index write to a reactive array");
                }
            }
            _ => {}
        }
    }
}

impl PartialEq for RxObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn plain_obj(entries: Vec<(&str, Value)>) -> Value {
        Value::object(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    fn collect(stream: &Observable<Value>) -> Rc<RefCell<Vec<Value>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        stream.subscribe(move |v| sink.borrow_mut().push(v));
        seen
    }

    #[test]
    fn wrapping_is_memoized_per_target_and_mode() {
        clear_registry();
        let target = plain_obj(vec![("a", Value::Number(1.0))]);
        let rx1 = RxObject::wrap(&target, false).unwrap();
        let rx2 = RxObject::wrap(&target, false).unwrap();
        let deep = RxObject::wrap(&target, true).unwrap();
        assert!(rx1.ptr_eq(&rx2));
        assert!(!rx1.ptr_eq(&deep));
        release(&target);
        let rx3 = RxObject::wrap(&target, false).unwrap();
        assert!(!rx1.ptr_eq(&rx3));
    }

    #[test]
    fn wrapping_a_wrapper_returns_it() {
        clear_registry();
        let target = plain_obj(vec![]);
        let rx = RxObject::wrap(&target, false).unwrap();
        let again = RxObject::wrap(&Value::Reactive(rx.clone()), true).unwrap();
        assert!(rx.ptr_eq(&again));
    }

    #[test]
    fn property_stream_replays_then_tracks_writes() {
        clear_registry();
        let rx = RxObject::wrap(&plain_obj(vec![("a", Value::Number(1.0))]), false).unwrap();
        let seen = collect(&rx.get_observable("a"));
        rx.set("a", Value::Number(2.0));
        assert_eq!(
            seen.borrow().clone(),
            vec![Value::Number(1.0), Value::Number(2.0)]
        );
    }

    #[test]
    fn missing_property_stream_starts_undefined() {
        clear_registry();
        let rx = RxObject::wrap(&plain_obj(vec![]), false).unwrap();
        let seen = collect(&rx.get_observable("ghost"));
        assert_eq!(seen.borrow().clone(), vec![Value::Undefined]);
        rx.set("ghost", Value::Bool(true));
        assert_eq!(seen.borrow().last(), Some(&Value::Bool(true)));
    }

    #[test]
    fn whole_object_stream_emits_on_any_write() {
        clear_registry();
        let target = plain_obj(vec![("a", Value::Number(1.0))]);
        let rx = RxObject::wrap(&target, false).unwrap();
        let seen = collect(&rx.as_observable());
        rx.set("b", Value::Number(2.0));
        assert_eq!(seen.borrow().len(), 2);
        // The emitted reference is the mutated target itself.
        assert_eq!(rx.get("b"), Value::Number(2.0));
    }

    #[test]
    fn delete_emits_undefined_on_property_stream() {
        clear_registry();
        let rx = RxObject::wrap(&plain_obj(vec![("a", Value::Number(1.0))]), false).unwrap();
        let seen = collect(&rx.get_observable("a"));
        assert!(rx.delete("a"));
        assert_eq!(seen.borrow().last(), Some(&Value::Undefined));
        assert_eq!(rx.get("a"), Value::Undefined);
    }

    #[test]
    fn deep_mode_wraps_nested_and_bubbles() {
        clear_registry();
        let nested = plain_obj(vec![("x", Value::Number(1.0))]);
        let target = plain_obj(vec![("inner", nested)]);
        let rx = RxObject::wrap(&target, true).unwrap();
        let whole = collect(&rx.as_observable());
        let prop = collect(&rx.get_observable("inner"));

        let Value::Reactive(inner) = rx.get("inner") else {
            panic!("nested value should be wrapped in deep mode");
        };
        inner.set("x", Value::Number(2.0));
        // Replay emission plus the bubbled mutation.
        assert_eq!(whole.borrow().len(), 2);
        assert_eq!(prop.borrow().len(), 2);
    }

    #[test]
    fn shallow_mode_leaves_nested_plain() {
        clear_registry();
        let nested = plain_obj(vec![]);
        let rx =
            RxObject::wrap(&plain_obj(vec![("inner", nested)]), false).unwrap();
        assert!(matches!(rx.get("inner"), Value::Object(_)));
    }

    #[test]
    fn mutate_notifies_live_property_streams() {
        clear_registry();
        let target = Value::array(vec![Value::Number(1.0)]);
        let rx = RxObject::wrap(&target, false).unwrap();
        let len_stream = collect(&rx.get_observable("length"));
        let whole = collect(&rx.as_observable());
        let pushed = rx
            .mutate(|items| {
                items.push(Value::Number(2.0));
                items.len()
            })
            .unwrap();
        assert_eq!(pushed, 2);
        assert_eq!(len_stream.borrow().last(), Some(&Value::Number(2.0)));
        assert_eq!(whole.borrow().len(), 2);
    }

    #[test]
    fn mutate_on_object_target_is_an_error() {
        clear_registry();
        let rx = RxObject::wrap(&plain_obj(vec![]), false).unwrap();
        assert!(rx.mutate(|_| ()).is_err());
    }

    fn plain_assign() -> CombineFn {
        Rc::new(|receiver, key, value| match receiver {
            Value::Reactive(rx) => Ok(rx.set(key, value)),
            Value::Object(o) => {
                o.set(key, value.clone());
                Ok(value)
            }
            other => Err(EvalError::Type(format!(
                "cannot assign into {}",
                other.type_name()
            ))),
        })
    }

    #[test]
    fn set_observable_applies_per_emission_once_subscribed() {
        clear_registry();
        let rx = RxObject::wrap(&plain_obj(vec![]), false).unwrap();
        let source = ripple_stream::Subject::new();
        let bound = rx.set_observable("a", source.as_observable(), plain_assign());

        source.next(Value::Number(1.0));
        assert_eq!(rx.get("a"), Value::Undefined, "no application before subscribe");

        let seen = collect(&bound);
        source.next(Value::Number(2.0));
        assert_eq!(rx.get("a"), Value::Number(2.0));
        assert_eq!(seen.borrow().clone(), vec![Value::Number(2.0)]);
    }

    #[test]
    fn independent_write_freezes_the_binding() {
        clear_registry();
        let rx = RxObject::wrap(&plain_obj(vec![]), false).unwrap();
        let source = ripple_stream::Subject::new();
        let bound = rx.set_observable("a", source.as_observable(), plain_assign());
        let seen = collect(&bound);

        source.next(Value::Number(1.0));
        assert_eq!(rx.get("a"), Value::Number(1.0));

        rx.set("a", Value::str("pinned"));
        source.next(Value::Number(2.0));
        // The binding applied to a frozen snapshot, not the live object.
        assert_eq!(rx.get("a"), Value::str("pinned"));
        // The bound stream still carries the emitted application result.
        assert_eq!(seen.borrow().last(), Some(&Value::Number(2.0)));
    }

    #[test]
    fn newer_binding_freezes_older_one() {
        clear_registry();
        let rx = RxObject::wrap(&plain_obj(vec![]), false).unwrap();
        let first = ripple_stream::Subject::new();
        let second = ripple_stream::Subject::new();
        let bound_first = rx.set_observable("a", first.as_observable(), plain_assign());
        let _keep_first = collect(&bound_first);
        let bound_second = rx.set_observable("a", second.as_observable(), plain_assign());
        let _keep_second = collect(&bound_second);

        first.next(Value::Number(1.0));
        assert_eq!(rx.get("a"), Value::Undefined, "older binding is stale");
        second.next(Value::Number(2.0));
        assert_eq!(rx.get("a"), Value::Number(2.0));
    }
}
