//! Variable scopes.
//!
//! A context is a chain of frames. Reads walk outward; assignments land in
//! the innermost frame that already holds the name, falling back to the
//! innermost frame. Arrow-function calls push a child frame so parameters
//! shadow without clobbering the caller's bindings.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::value::Value;

/// A shared handle to a scope frame.
#[derive(Clone)]
pub struct Context {
    frame: Rc<Frame>,
}

struct Frame {
    vars: RefCell<HashMap<String, Value>>,
    parent: Option<Context>,
}

impl Context {
    pub fn new() -> Self {
        Self {
            frame: Rc::new(Frame {
                vars: RefCell::new(HashMap::new()),
                parent: None,
            }),
        }
    }

    /// A child frame whose reads fall through to `self`.
    pub fn child(&self) -> Context {
        Self {
            frame: Rc::new(Frame {
                vars: RefCell::new(HashMap::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let mut current = Some(self);
        while let Some(ctx) = current {
            if let Some(v) = ctx.frame.vars.borrow().get(name) {
                return Some(v.clone());
            }
            current = ctx.frame.parent.as_ref();
        }
        None
    }

    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Bind `name` in this frame, shadowing any outer binding.
    pub fn define(&self, name: &str, value: Value) {
        self.frame.vars.borrow_mut().insert(name.to_owned(), value);
    }

    /// Assign `name`, writing to the frame that holds it, or this frame if
    /// none does.
    pub fn set(&self, name: &str, value: Value) {
        let mut current = self;
        loop {
            if current.frame.vars.borrow().contains_key(name) {
                current.define(name, value);
                return;
            }
            match current.frame.parent.as_ref() {
                Some(parent) => current = parent,
                None => break,
            }
        }
        self.define(name, value);
    }

    pub fn ptr_eq(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_walk_outward() {
        let root = Context::new();
        root.define("a", Value::Number(1.0));
        let inner = root.child();
        assert_eq!(inner.get("a"), Some(Value::Number(1.0)));
        assert_eq!(inner.get("b"), None);
    }

    #[test]
    fn set_writes_to_owning_frame() {
        let root = Context::new();
        root.define("a", Value::Number(1.0));
        let inner = root.child();
        inner.set("a", Value::Number(2.0));
        assert_eq!(root.get("a"), Some(Value::Number(2.0)));
    }

    #[test]
    fn define_shadows_without_clobbering() {
        let root = Context::new();
        root.define("a", Value::Number(1.0));
        let inner = root.child();
        inner.define("a", Value::Number(9.0));
        assert_eq!(inner.get("a"), Some(Value::Number(9.0)));
        assert_eq!(root.get("a"), Some(Value::Number(1.0)));
    }

    #[test]
    fn set_on_unbound_name_lands_in_current_frame() {
        let root = Context::new();
        let inner = root.child();
        inner.set("fresh", Value::Bool(true));
        assert!(inner.has("fresh"));
        assert_eq!(root.get("fresh"), None);
    }
}
