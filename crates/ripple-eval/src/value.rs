//! Runtime values.
//!
//! The value domain deliberately mirrors a dynamic expression language:
//! `undefined`/`null` are distinct, numbers are `f64`, arrays and objects are
//! shared mutable references, and two extra variants make streams and
//! reactive object wrappers first-class operands.

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use ripple_stream::Observable;

use crate::error::EvalError;
use crate::rxobject::RxObject;

/// A runtime value.
#[derive(Clone)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(Rc<str>),
    Array(ArrayRef),
    Object(ObjectRef),
    Function(FunctionValue),
    /// A stream of values; resolves per emission wherever an operand may
    /// be mixed with plain values.
    Stream(Observable<Value>),
    /// A reactive object wrapper around a plain array or object.
    Reactive(RxObject),
}

/// Shared mutable array.
#[derive(Clone)]
pub struct ArrayRef {
    items: Rc<RefCell<Vec<Value>>>,
}

impl ArrayRef {
    pub fn new(items: Vec<Value>) -> Self {
        Self {
            items: Rc::new(RefCell::new(items)),
        }
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Element at `index`, `undefined` out of bounds.
    pub fn get(&self, index: usize) -> Value {
        self.items
            .borrow()
            .get(index)
            .cloned()
            .unwrap_or(Value::Undefined)
    }

    /// Store at `index`, growing with `undefined` holes as needed.
    pub fn set(&self, index: usize, value: Value) {
        let mut items = self.items.borrow_mut();
        if index >= items.len() {
            items.resize(index + 1, Value::Undefined);
        }
        items[index] = value;
    }

    pub fn borrow(&self) -> Ref<'_, Vec<Value>> {
        self.items.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, Vec<Value>> {
        self.items.borrow_mut()
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Rc::ptr_eq(&self.items, &other.items)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.items) as usize
    }
}

/// Shared mutable object with insertion-ordered string keys.
#[derive(Clone)]
pub struct ObjectRef {
    entries: Rc<RefCell<Vec<(Rc<str>, Value)>>>,
}

impl ObjectRef {
    pub fn new(entries: Vec<(Rc<str>, Value)>) -> Self {
        Self {
            entries: Rc::new(RefCell::new(entries)),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn has(&self, key: &str) -> bool {
        self.entries.borrow().iter().any(|(k, _)| &**k == key)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries
            .borrow()
            .iter()
            .find(|(k, _)| &**k == key)
            .map(|(_, v)| v.clone())
    }

    /// Insert or replace, preserving first-insertion order.
    pub fn set(&self, key: &str, value: Value) {
        let mut entries = self.entries.borrow_mut();
        if let Some(slot) = entries.iter_mut().find(|(k, _)| &**k == key) {
            slot.1 = value;
        } else {
            entries.push((key.into(), value));
        }
    }

    pub fn delete(&self, key: &str) -> bool {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|(k, _)| &**k != key);
        entries.len() != before
    }

    pub fn keys(&self) -> Vec<Rc<str>> {
        self.entries.borrow().iter().map(|(k, _)| k.clone()).collect()
    }

    pub fn entries(&self) -> Vec<(Rc<str>, Value)> {
        self.entries.borrow().clone()
    }

    pub fn ptr_eq(&self, other: &ObjectRef) -> bool {
        Rc::ptr_eq(&self.entries, &other.entries)
    }

    pub(crate) fn addr(&self) -> usize {
        Rc::as_ptr(&self.entries) as usize
    }
}

/// A callable value (arrow functions and built-in methods).
#[derive(Clone)]
pub struct FunctionValue {
    body: Rc<dyn Fn(Value, &[Value]) -> Result<Value, EvalError>>,
}

impl FunctionValue {
    pub fn new(body: impl Fn(Value, &[Value]) -> Result<Value, EvalError> + 'static) -> Self {
        Self {
            body: Rc::new(body),
        }
    }

    pub fn call(&self, this: Value, args: &[Value]) -> Result<Value, EvalError> {
        (self.body)(this, args)
    }

    pub fn ptr_eq(&self, other: &FunctionValue) -> bool {
        Rc::ptr_eq(&self.body, &other.body)
    }
}

impl Value {
    pub fn str(s: impl Into<String>) -> Value {
        Value::Str(s.into().into())
    }

    pub fn array(items: Vec<Value>) -> Value {
        Value::Array(ArrayRef::new(items))
    }

    pub fn object(entries: Vec<(Rc<str>, Value)>) -> Value {
        Value::Object(ObjectRef::new(entries))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
            Value::Stream(_) => "stream",
            Value::Reactive(_) => "reactive",
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Value::Stream(_))
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Array(_)
            | Value::Object(_)
            | Value::Function(_)
            | Value::Stream(_)
            | Value::Reactive(_) => true,
        }
    }

    /// Numeric coercion. Non-numeric shapes coerce to NaN rather than
    /// erroring, matching loose expression-language arithmetic.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Array(a) => match a.len() {
                0 => 0.0,
                1 => a.get(0).to_number(),
                _ => f64::NAN,
            },
            Value::Object(_)
            | Value::Function(_)
            | Value::Stream(_)
            | Value::Reactive(_) => f64::NAN,
        }
    }

    /// 32-bit wrapping conversion used by the bitwise operators.
    pub fn to_i32(&self) -> i32 {
        let n = self.to_number();
        if !n.is_finite() {
            return 0;
        }
        n.trunc() as i64 as u32 as i32
    }

    pub fn to_u32(&self) -> u32 {
        self.to_i32() as u32
    }

    /// String coercion.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Undefined => "undefined".to_owned(),
            Value::Null => "null".to_owned(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.to_string(),
            Value::Array(a) => a
                .borrow()
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_owned(),
            Value::Function(_) => "[function]".to_owned(),
            Value::Stream(_) => "[stream]".to_owned(),
            Value::Reactive(rx) => rx.snapshot().to_display_string(),
        }
    }

    /// Property-key coercion.
    pub fn to_key(&self) -> Rc<str> {
        match self {
            Value::Str(s) => s.clone(),
            other => other.to_display_string().into(),
        }
    }

    /// Strict (`===`) equality: no coercion, reference identity for
    /// arrays, objects, functions and streams.
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) | (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => a.ptr_eq(b),
            (Value::Object(a), Value::Object(b)) => a.ptr_eq(b),
            (Value::Function(a), Value::Function(b)) => a.ptr_eq(b),
            (Value::Stream(a), Value::Stream(b)) => a.ptr_eq(b),
            (Value::Reactive(a), Value::Reactive(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Loose (`==`) equality with the usual coercion ladder.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
            (Value::Number(_), Value::Number(_))
            | (Value::Str(_), Value::Str(_))
            | (Value::Bool(_), Value::Bool(_)) => self.strict_eq(other),
            (Value::Number(a), Value::Str(_)) => *a == other.to_number(),
            (Value::Str(_), Value::Number(b)) => self.to_number() == *b,
            (Value::Bool(_), _) => Value::Number(self.to_number()).loose_eq(other),
            (_, Value::Bool(_)) => self.loose_eq(&Value::Number(other.to_number())),
            (Value::Number(a), Value::Array(_) | Value::Object(_)) => {
                *a == other.to_number()
            }
            (Value::Array(_) | Value::Object(_), Value::Number(b)) => {
                self.to_number() == *b
            }
            (Value::Str(a), Value::Array(_)) => &**a == other.to_display_string(),
            (Value::Array(_), Value::Str(b)) => self.to_display_string() == **b,
            _ => self.strict_eq(other),
        }
    }
}

/// Render an `f64` the way a dynamic language prints it: integral values
/// without a fractional part, `NaN` and `Infinity` spelled out.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_owned()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_owned()
        } else {
            "-Infinity".to_owned()
        }
    } else if n == 0.0 {
        "0".to_owned()
    } else if n.fract() == 0.0 && n.abs() < 1e21 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            // Data compares structurally so tests can assert on contents.
            (Value::Array(a), Value::Array(b)) => {
                a.ptr_eq(b) || *a.borrow() == *b.borrow()
            }
            (Value::Object(a), Value::Object(b)) => {
                a.ptr_eq(b) || a.entries() == b.entries()
            }
            _ => self.strict_eq(other),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Array(a) => f.debug_list().entries(a.borrow().iter()).finish(),
            Value::Object(o) => {
                let mut map = f.debug_map();
                for (k, v) in o.entries() {
                    map.entry(&&*k, &v);
                }
                map.finish()
            }
            Value::Function(_) => write!(f, "[function]"),
            Value::Stream(_) => write!(f, "[stream]"),
            Value::Reactive(rx) => write!(f, "reactive({:?})", rx.snapshot()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.into())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::str("").is_truthy());
        assert!(Value::str("0").is_truthy());
        assert!(Value::array(vec![]).is_truthy());
    }

    #[test]
    fn numeric_coercion() {
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
        assert_eq!(Value::str(" 12.5 ").to_number(), 12.5);
        assert!(Value::str("12px").to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::array(vec![Value::Number(7.0)]).to_number(), 7.0);
    }

    #[test]
    fn int32_wrapping() {
        assert_eq!(Value::Number(-1.0).to_i32(), -1);
        assert_eq!(Value::Number(4294967296.0).to_i32(), 0);
        assert_eq!(Value::Number(2147483648.0).to_i32(), -2147483648);
        assert_eq!(Value::Number(f64::NAN).to_i32(), 0);
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.5), "-0.5");
        assert_eq!(format_number(f64::NAN), "NaN");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn loose_equality_ladder() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(Value::Number(1.0).loose_eq(&Value::str("1")));
        assert!(Value::Bool(true).loose_eq(&Value::Number(1.0)));
        assert!(!Value::Null.loose_eq(&Value::Number(0.0)));
        let a = Value::array(vec![]);
        assert!(!a.strict_eq(&Value::array(vec![])));
        assert!(a.strict_eq(&a.clone()));
    }

    #[test]
    fn arrays_grow_on_out_of_bounds_set() {
        let arr = ArrayRef::new(vec![Value::Number(1.0)]);
        arr.set(3, Value::Number(4.0));
        assert_eq!(arr.len(), 4);
        assert_eq!(arr.get(1), Value::Undefined);
        assert_eq!(arr.get(3), Value::Number(4.0));
    }

    #[test]
    fn objects_preserve_insertion_order() {
        let obj = ObjectRef::new(vec![]);
        obj.set("b", Value::Number(1.0));
        obj.set("a", Value::Number(2.0));
        obj.set("b", Value::Number(3.0));
        let keys: Vec<String> = obj.keys().iter().map(|k| k.to_string()).collect();
        assert_eq!(keys, ["b", "a"]);
        assert_eq!(obj.get("b"), Some(Value::Number(3.0)));
    }
}
