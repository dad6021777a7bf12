//! Property reads and built-in array methods.
//!
//! Member access goes through [`get_property`] once the object side is
//! resolved. Reads on a reactive wrapper are transparent (same result as on
//! the plain target), except that array-mutating methods are intercepted so
//! the mutation emits on the wrapper's streams.

use std::rc::Rc;

use crate::error::EvalError;
use crate::rxobject::RxObject;
use crate::value::{ArrayRef, FunctionValue, Value};

/// Resolved property read; absent properties yield `undefined`.
pub fn get_property(obj: &Value, key: &Value) -> Value {
    let name = key.to_key();
    match obj {
        Value::Object(o) => o.get(&name).unwrap_or(Value::Undefined),
        Value::Array(a) => array_member(ArrayReceiver::Plain(a.clone()), &name),
        Value::Str(s) => {
            if &*name == "length" {
                Value::Number(s.chars().count() as f64)
            } else if let Ok(i) = name.parse::<usize>() {
                s.chars()
                    .nth(i)
                    .map(|c| Value::Str(c.to_string().into()))
                    .unwrap_or(Value::Undefined)
            } else {
                Value::Undefined
            }
        }
        Value::Reactive(rx) => {
            if rx.as_array().is_some() {
                array_member(ArrayReceiver::Reactive(rx.clone()), &name)
            } else {
                rx.get(&name)
            }
        }
        _ => Value::Undefined,
    }
}

fn array_member(receiver: ArrayReceiver, name: &str) -> Value {
    if name == "length" {
        return Value::Number(receiver.items().len() as f64);
    }
    if let Ok(i) = name.parse::<usize>() {
        return receiver.items().get(i);
    }
    array_method(receiver, name).unwrap_or(Value::Undefined)
}

/// An array seen either directly or through a reactive wrapper; mutations
/// on the latter go through the wrapper so they emit.
#[derive(Clone)]
enum ArrayReceiver {
    Plain(ArrayRef),
    Reactive(RxObject),
}

impl ArrayReceiver {
    fn items(&self) -> ArrayRef {
        match self {
            ArrayReceiver::Plain(a) => a.clone(),
            ArrayReceiver::Reactive(rx) => rx.as_array().unwrap_or_else(|| ArrayRef::new(vec![])),
        }
    }

    fn mutate<R>(&self, f: impl FnOnce(&mut Vec<Value>) -> R) -> Result<R, EvalError> {
        match self {
            ArrayReceiver::Plain(a) => Ok(f(&mut a.borrow_mut())),
            ArrayReceiver::Reactive(rx) => rx.mutate(f),
        }
    }

    fn as_value(&self) -> Value {
        match self {
            ArrayReceiver::Plain(a) => Value::Array(a.clone()),
            ArrayReceiver::Reactive(rx) => Value::Reactive(rx.clone()),
        }
    }
}

/// Clamp a possibly-negative relative index into `0..=len`.
fn norm_index(v: Option<&Value>, len: usize, default: usize) -> usize {
    let Some(v) = v else { return default };
    let n = v.to_number();
    if n.is_nan() {
        return 0;
    }
    if n < 0.0 {
        let back = (-n) as usize;
        len.saturating_sub(back)
    } else {
        (n as usize).min(len)
    }
}

fn method(
    receiver: &ArrayReceiver,
    f: impl Fn(&ArrayReceiver, &[Value]) -> Result<Value, EvalError> + 'static,
) -> Value {
    let receiver = receiver.clone();
    Value::Function(FunctionValue::new(move |_this, args| f(&receiver, args)))
}

fn array_method(receiver: ArrayReceiver, name: &str) -> Option<Value> {
    let out = match name {
        "push" => method(&receiver, |r, args| {
            let args = args.to_vec();
            r.mutate(move |items| {
                items.extend(args);
                Value::Number(items.len() as f64)
            })
        }),
        "pop" => method(&receiver, |r, _| {
            r.mutate(|items| items.pop().unwrap_or(Value::Undefined))
        }),
        "shift" => method(&receiver, |r, _| {
            r.mutate(|items| {
                if items.is_empty() {
                    Value::Undefined
                } else {
                    items.remove(0)
                }
            })
        }),
        "unshift" => method(&receiver, |r, args| {
            let args = args.to_vec();
            r.mutate(move |items| {
                items.splice(0..0, args);
                Value::Number(items.len() as f64)
            })
        }),
        "splice" => method(&receiver, |r, args| {
            let len = r.items().len();
            let start = norm_index(args.first(), len, 0);
            let delete = match args.get(1) {
                Some(v) => {
                    let n = v.to_number();
                    if n.is_nan() || n < 0.0 {
                        0
                    } else {
                        (n as usize).min(len - start)
                    }
                }
                None if args.is_empty() => 0,
                None => len - start,
            };
            let inserted: Vec<Value> = args.iter().skip(2).cloned().collect();
            r.mutate(move |items| {
                let removed: Vec<Value> = items.splice(start..start + delete, inserted).collect();
                Value::array(removed)
            })
        }),
        "reverse" => method(&receiver, |r, _| {
            r.mutate(|items| items.reverse())?;
            Ok(r.as_value())
        }),
        "sort" => method(&receiver, |r, args| {
            let comparator = match args.first() {
                Some(Value::Function(f)) => Some(f.clone()),
                _ => None,
            };
            let failed = Rc::new(std::cell::RefCell::new(None));
            let seen = failed.clone();
            r.mutate(move |items| match comparator {
                Some(cmp) => items.sort_by(|a, b| {
                    let out = cmp.call(Value::Undefined, &[a.clone(), b.clone()]);
                    match out {
                        Ok(v) => {
                            let n = v.to_number();
                            if n < 0.0 {
                                std::cmp::Ordering::Less
                            } else if n > 0.0 {
                                std::cmp::Ordering::Greater
                            } else {
                                std::cmp::Ordering::Equal
                            }
                        }
                        Err(e) => {
                            *seen.borrow_mut() = Some(e);
                            std::cmp::Ordering::Equal
                        }
                    }
                }),
                // Default order: string comparison, undefined sorted last.
                None => items.sort_by(|a, b| match (a, b) {
                    (Value::Undefined, Value::Undefined) => std::cmp::Ordering::Equal,
                    (Value::Undefined, _) => std::cmp::Ordering::Greater,
                    (_, Value::Undefined) => std::cmp::Ordering::Less,
                    _ => a.to_display_string().cmp(&b.to_display_string()),
                }),
            })?;
            if let Some(e) = failed.borrow_mut().take() {
                return Err(e);
            }
            Ok(r.as_value())
        }),
        "fill" => method(&receiver, |r, args| {
            let fill = args.first().cloned().unwrap_or(Value::Undefined);
            let len = r.items().len();
            let start = norm_index(args.get(1), len, 0);
            let end = norm_index(args.get(2), len, len);
            r.mutate(move |items| {
                for slot in items.iter_mut().take(end).skip(start) {
                    *slot = fill.clone();
                }
            })?;
            Ok(r.as_value())
        }),
        "copyWithin" => method(&receiver, |r, args| {
            let len = r.items().len();
            let target = norm_index(args.first(), len, 0);
            let start = norm_index(args.get(1), len, 0);
            let end = norm_index(args.get(2), len, len);
            r.mutate(move |items| {
                if start < end {
                    let window: Vec<Value> = items[start..end].to_vec();
                    for (offset, v) in window.into_iter().enumerate() {
                        let i = target + offset;
                        if i >= items.len() {
                            break;
                        }
                        items[i] = v;
                    }
                }
            })?;
            Ok(r.as_value())
        }),
        "slice" => method(&receiver, |r, args| {
            let items = r.items();
            let len = items.len();
            let start = norm_index(args.first(), len, 0);
            let end = norm_index(args.get(1), len, len);
            let out: Vec<Value> = if start < end {
                items.borrow()[start..end].to_vec()
            } else {
                vec![]
            };
            Ok(Value::array(out))
        }),
        "indexOf" => method(&receiver, |r, args| {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            let found = r
                .items()
                .borrow()
                .iter()
                .position(|v| v.strict_eq(&needle));
            Ok(Value::Number(found.map(|i| i as f64).unwrap_or(-1.0)))
        }),
        "includes" => method(&receiver, |r, args| {
            let needle = args.first().cloned().unwrap_or(Value::Undefined);
            let found = r.items().borrow().iter().any(|v| v.strict_eq(&needle));
            Ok(Value::Bool(found))
        }),
        "join" => method(&receiver, |r, args| {
            let sep = match args.first() {
                Some(Value::Undefined) | None => ",".to_owned(),
                Some(v) => v.to_display_string(),
            };
            let joined = r
                .items()
                .borrow()
                .iter()
                .map(|v| match v {
                    Value::Undefined | Value::Null => String::new(),
                    other => other.to_display_string(),
                })
                .collect::<Vec<_>>()
                .join(&sep);
            Ok(Value::str(joined))
        }),
        "concat" => method(&receiver, |r, args| {
            let mut out = r.items().to_vec();
            for arg in args {
                match arg {
                    Value::Array(a) => out.extend(a.to_vec()),
                    Value::Reactive(rx) => match rx.as_array() {
                        Some(a) => out.extend(a.to_vec()),
                        None => out.push(arg.clone()),
                    },
                    other => out.push(other.clone()),
                }
            }
            Ok(Value::array(out))
        }),
        _ => return None,
    };
    Some(out)
}
