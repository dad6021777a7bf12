//! Assignment targets and destructuring.
//!
//! A leaf target resolves to an owner/key pair before any write happens;
//! resolving is where stream-valued owners are rejected and computed keys
//! get their one-shot synchronous resolution. Destructuring fans a source
//! out per pattern slot; a stream source is shared first so every slot's
//! projection rides one subscription.

use std::rc::Rc;

use ripple_ast::{
    ArrayPatternElement, AssignOp, Expr, MemberExpr, Pattern, PropertyKey,
};
use ripple_stream::{Observable, StreamError};

use super::rules::{literal_value, Rules};
use crate::context::Context;
use crate::error::EvalError;
use crate::ops;
use crate::property::get_property;
use crate::rxobject::{CombineFn, RxObject};
use crate::value::{ArrayRef, ObjectRef, Value};

/// A resolved assignment slot.
#[derive(Clone)]
pub(super) struct LValue {
    owner: Owner,
    key: Rc<str>,
}

#[derive(Clone)]
enum Owner {
    Context(Context),
    Object(ObjectRef),
    Array(ArrayRef),
    Reactive(RxObject),
}

pub(super) fn resolve<R: Rules>(
    rules: &R,
    pattern: &Pattern,
    ctx: &Context,
) -> Result<LValue, EvalError> {
    match pattern {
        Pattern::Identifier(name) => Ok(LValue {
            owner: Owner::Context(ctx.clone()),
            key: name.as_str().into(),
        }),
        Pattern::Member(member) => resolve_member_target(rules, member, ctx),
        other => Err(EvalError::InvalidTarget(format!(
            "not a leaf assignment target: {other:?}"
        ))),
    }
}

fn resolve_member_target<R: Rules>(
    rules: &R,
    member: &MemberExpr,
    ctx: &Context,
) -> Result<LValue, EvalError> {
    let obj = rules.eval(&member.object, ctx)?;
    let key = if member.computed {
        match rules.eval(&member.property, ctx)? {
            // A stream key gets one synchronous resolution attempt; an
            // assignment cannot wait for its own target.
            Value::Stream(s) => match s.resolve_now() {
                Some(v) => v.to_key(),
                None => {
                    return Err(EvalError::InvalidTarget(
                        "computed assignment key is an unresolved stream".to_owned(),
                    ))
                }
            },
            v => v.to_key(),
        }
    } else {
        match &*member.property {
            Expr::Identifier(name) => name.as_str().into(),
            other => {
                return Err(EvalError::Unsupported(format!(
                    "non-identifier member name: {other:?}"
                )))
            }
        }
    };
    let owner = match obj {
        Value::Object(o) => Owner::Object(o),
        Value::Array(a) => Owner::Array(a),
        Value::Reactive(rx) => Owner::Reactive(rx),
        Value::Stream(_) => return Err(EvalError::StreamOwner),
        other => {
            return Err(EvalError::InvalidTarget(format!(
                "cannot assign to a property of {}",
                other.type_name()
            )))
        }
    };
    Ok(LValue { owner, key })
}

impl LValue {
    pub(super) fn read(&self) -> Value {
        match &self.owner {
            Owner::Context(ctx) => ctx.get(&self.key).unwrap_or(Value::Undefined),
            Owner::Object(o) => o.get(&self.key).unwrap_or(Value::Undefined),
            Owner::Array(a) => get_property(&Value::Array(a.clone()), &Value::Str(self.key.clone())),
            Owner::Reactive(rx) => rx.get(&self.key),
        }
    }

    /// Store a value; `declare` binds a context name in the innermost frame
    /// instead of the owning one. Returns the stored value (a reactive
    /// owner may deep-wrap it).
    pub(super) fn write(&self, value: Value, declare: bool) -> Value {
        match &self.owner {
            Owner::Context(ctx) => {
                if declare {
                    ctx.define(&self.key, value.clone());
                } else {
                    ctx.set(&self.key, value.clone());
                }
                value
            }
            Owner::Object(o) => {
                o.set(&self.key, value.clone());
                value
            }
            Owner::Array(a) => {
                if let Ok(i) = self.key.parse::<usize>() {
                    a.set(i, value.clone());
                } else {
                    tracing::debug!(key = &*self.key, "ignoring non-index array write");
                }
                value
            }
            Owner::Reactive(rx) => rx.set(&self.key, value),
        }
    }

    fn is_reactive(&self) -> bool {
        matches!(self.owner, Owner::Reactive(_))
    }
}

/// Apply an assignment through a pattern.
///
/// Returns the pattern's assigned value (the shared source, for
/// destructuring). Streams whose subscription performs the actual writes
/// are pushed onto `refs` so the caller can tie them to the expression's
/// result.
pub(super) fn assign_pattern<R: Rules>(
    rules: &R,
    pattern: &Pattern,
    op: AssignOp,
    right: Value,
    ctx: &Context,
    declare: bool,
    refs: &mut Vec<Observable<Value>>,
) -> Result<Value, EvalError> {
    match pattern {
        Pattern::Identifier(_) | Pattern::Member(_) => {
            let lv = resolve(rules, pattern, ctx)?;
            assign_leaf(lv, op, right, declare, refs)
        }
        Pattern::Default { target, default } => {
            let resolved = match right {
                Value::Undefined => rules.eval(default, ctx)?,
                Value::Stream(s) => {
                    let rules = rules.clone();
                    let ctx = ctx.clone();
                    let default = (**default).clone();
                    Value::Stream(s.switch_map(move |v| {
                        if !matches!(v, Value::Undefined) {
                            return Observable::of(v);
                        }
                        match rules.eval(&default, &ctx) {
                            Ok(Value::Stream(inner)) => inner,
                            Ok(v) => Observable::of(v),
                            Err(e) => Observable::throw(e.into()),
                        }
                    }))
                }
                v => v,
            };
            assign_pattern(rules, target, op, resolved, ctx, declare, refs)
        }
        Pattern::Array(elements) => {
            require_plain_assign(op)?;
            match right {
                Value::Stream(s) => {
                    let shared = s
                        .map_result(|v| match iterable(&v) {
                            Ok(()) => Ok(v),
                            Err(e) => Err(StreamError::from(e)),
                        })
                        .share_replay();
                    for (i, element) in elements.iter().enumerate() {
                        match element {
                            ArrayPatternElement::Hole => {}
                            ArrayPatternElement::Pattern(p) => {
                                let proj =
                                    Value::Stream(shared.map(move |v| iter_at(&v, i)));
                                assign_pattern(rules, p, op, proj, ctx, declare, refs)?;
                            }
                            ArrayPatternElement::Rest(p) => {
                                let proj =
                                    Value::Stream(shared.map(move |v| iter_slice(&v, i)));
                                assign_pattern(rules, p, op, proj, ctx, declare, refs)?;
                            }
                        }
                    }
                    Ok(Value::Stream(shared))
                }
                plain => {
                    iterable(&plain)?;
                    for (i, element) in elements.iter().enumerate() {
                        match element {
                            ArrayPatternElement::Hole => {}
                            ArrayPatternElement::Pattern(p) => {
                                assign_pattern(
                                    rules,
                                    p,
                                    op,
                                    iter_at(&plain, i),
                                    ctx,
                                    declare,
                                    refs,
                                )?;
                            }
                            ArrayPatternElement::Rest(p) => {
                                assign_pattern(
                                    rules,
                                    p,
                                    op,
                                    iter_slice(&plain, i),
                                    ctx,
                                    declare,
                                    refs,
                                )?;
                            }
                        }
                    }
                    Ok(plain)
                }
            }
        }
        Pattern::Object { props, rest } => {
            require_plain_assign(op)?;
            // Keys resolve once, up front, in source order; the rest slot
            // excludes exactly these.
            let mut keys = Vec::with_capacity(props.len());
            for prop in props {
                keys.push(resolve_key(rules, &prop.key, ctx)?);
            }
            match right {
                Value::Stream(s) => {
                    let shared = s
                        .map_result(|v| {
                            if v.is_nullish() {
                                Err(StreamError::from(EvalError::NotObjectCoercible))
                            } else {
                                Ok(v)
                            }
                        })
                        .share_replay();
                    for (prop, key) in props.iter().zip(&keys) {
                        let key = key.clone();
                        let proj = Value::Stream(shared.map(move |v| {
                            get_property(&v, &Value::Str(key.clone()))
                        }));
                        assign_pattern(rules, &prop.value, op, proj, ctx, declare, refs)?;
                    }
                    if let Some(rest_pattern) = rest {
                        let visited = keys.clone();
                        let proj = Value::Stream(
                            shared.map(move |v| rest_object(&v, &visited)),
                        );
                        assign_pattern(rules, rest_pattern, op, proj, ctx, declare, refs)?;
                    }
                    Ok(Value::Stream(shared))
                }
                plain => {
                    if plain.is_nullish() {
                        return Err(EvalError::NotObjectCoercible);
                    }
                    for (prop, key) in props.iter().zip(&keys) {
                        let projected = get_property(&plain, &Value::Str(key.clone()));
                        assign_pattern(rules, &prop.value, op, projected, ctx, declare, refs)?;
                    }
                    if let Some(rest_pattern) = rest {
                        let projected = rest_object(&plain, &keys);
                        assign_pattern(rules, rest_pattern, op, projected, ctx, declare, refs)?;
                    }
                    Ok(plain)
                }
            }
        }
    }
}

/// Bind an arrow-function parameter: plain assignment semantics, declared
/// in the call frame.
pub(super) fn bind_pattern<R: Rules>(
    rules: &R,
    pattern: &Pattern,
    value: Value,
    frame: &Context,
) -> Result<(), EvalError> {
    let mut refs = Vec::new();
    assign_pattern(rules, pattern, AssignOp::Assign, value, frame, true, &mut refs)?;
    // Parameter aliasing keeps the stream in the slot; nothing applies
    // writes elsewhere, so the reference streams are inert here.
    Ok(())
}

fn require_plain_assign(op: AssignOp) -> Result<(), EvalError> {
    if op.binary_op().is_some() {
        return Err(EvalError::InvalidTarget(format!(
            "destructuring only supports `=`, not `{op}`"
        )));
    }
    Ok(())
}

fn assign_leaf(
    lv: LValue,
    op: AssignOp,
    right: Value,
    declare: bool,
    refs: &mut Vec<Observable<Value>>,
) -> Result<Value, EvalError> {
    match right {
        Value::Stream(source) if lv.is_reactive() => {
            let Owner::Reactive(rx) = &lv.owner else {
                return Err(EvalError::InvalidTarget("not a reactive owner".to_owned()));
            };
            let bound = rx.set_observable(&lv.key, source, combine_for(op));
            refs.push(bound.clone());
            Ok(Value::Stream(bound))
        }
        Value::Stream(source) => match op.binary_op() {
            None => {
                // Plain `=` aliases the stream into the slot, shared so
                // every consumer of the alias rides one subscription.
                let shared = source.share_replay();
                Ok(lv.write(Value::Stream(shared), declare))
            }
            Some(binary) => {
                // Compound against a stream source accumulates into the
                // slot per emission; the slot itself must be plain.
                if lv.read().is_stream() {
                    return Err(EvalError::StreamOperand { op: op.to_string() });
                }
                let slot = lv.clone();
                let applied = source
                    .map_result(move |v| {
                        let current = slot.read();
                        if current.is_stream() {
                            return Err(StreamError::from(EvalError::StreamOperand {
                                op: binary.to_string(),
                            }));
                        }
                        let next = ops::apply_binary(binary, &current, &v)
                            .map_err(StreamError::from)?;
                        Ok(slot.write(next, false))
                    })
                    .share_replay();
                refs.push(applied.clone());
                Ok(Value::Stream(applied))
            }
        },
        plain => match op.binary_op() {
            None => Ok(lv.write(plain, declare)),
            Some(binary) => {
                let current = lv.read();
                if current.is_stream() {
                    return Err(EvalError::StreamOperand { op: op.to_string() });
                }
                let next = ops::apply_binary(binary, &current, &plain)?;
                Ok(lv.write(next, declare))
            }
        },
    }
}

/// Assignment semantics applied per binding emission; the receiver is the
/// live wrapper, or a frozen snapshot once the binding is stale.
fn combine_for(op: AssignOp) -> CombineFn {
    Rc::new(move |receiver, key, value| assign_into(receiver, key, op, value))
}

fn assign_into(receiver: Value, key: &str, op: AssignOp, value: Value) -> Result<Value, EvalError> {
    match op.binary_op() {
        None => store_into(receiver, key, value),
        Some(binary) => {
            let current = get_property(&receiver, &Value::str(key));
            if current.is_stream() {
                return Err(EvalError::StreamOperand { op: op.to_string() });
            }
            let next = ops::apply_binary(binary, &current, &value)?;
            store_into(receiver, key, next)
        }
    }
}

fn store_into(receiver: Value, key: &str, value: Value) -> Result<Value, EvalError> {
    match receiver {
        Value::Reactive(rx) => Ok(rx.set(key, value)),
        Value::Object(o) => {
            o.set(key, value.clone());
            Ok(value)
        }
        Value::Array(a) => {
            if let Ok(i) = key.parse::<usize>() {
                a.set(i, value.clone());
            }
            Ok(value)
        }
        other => Err(EvalError::InvalidTarget(format!(
            "cannot assign into {}",
            other.type_name()
        ))),
    }
}

fn resolve_key<R: Rules>(
    rules: &R,
    key: &PropertyKey,
    ctx: &Context,
) -> Result<Rc<str>, EvalError> {
    match key {
        PropertyKey::Identifier(name) => Ok(name.as_str().into()),
        PropertyKey::Literal(lit) => Ok(literal_value(lit).to_key()),
        PropertyKey::Computed(e) => match rules.eval(e, ctx)? {
            Value::Stream(s) => match s.resolve_now() {
                Some(v) => Ok(v.to_key()),
                None => Err(EvalError::InvalidTarget(
                    "computed pattern key is an unresolved stream".to_owned(),
                )),
            },
            v => Ok(v.to_key()),
        },
    }
}

fn iterable(value: &Value) -> Result<(), EvalError> {
    match value {
        Value::Array(_) | Value::Str(_) => Ok(()),
        Value::Reactive(rx) if rx.as_array().is_some() => Ok(()),
        _ => Err(EvalError::NotIterable),
    }
}

fn iter_at(value: &Value, index: usize) -> Value {
    match value {
        Value::Array(a) => a.get(index),
        Value::Reactive(rx) => rx.get(&index.to_string()),
        Value::Str(s) => s
            .chars()
            .nth(index)
            .map(|c| Value::Str(c.to_string().into()))
            .unwrap_or(Value::Undefined),
        _ => Value::Undefined,
    }
}

fn iter_slice(value: &Value, from: usize) -> Value {
    match value {
        Value::Array(a) => {
            let items = a.to_vec();
            Value::array(items.into_iter().skip(from).collect())
        }
        Value::Reactive(rx) => match rx.as_array() {
            Some(a) => Value::array(a.to_vec().into_iter().skip(from).collect()),
            None => Value::array(vec![]),
        },
        Value::Str(s) => Value::str(s.chars().skip(from).collect::<String>()),
        _ => Value::array(vec![]),
    }
}

/// The object left over for a rest slot: every own entry whose key was not
/// consumed by a named slot.
fn rest_object(value: &Value, visited: &[Rc<str>]) -> Value {
    let out = ObjectRef::new(vec![]);
    let entries: Vec<(Rc<str>, Value)> = match value {
        Value::Object(o) => o.entries(),
        Value::Reactive(rx) => rx
            .own_keys()
            .into_iter()
            .map(|k| {
                let v = rx.get(&k);
                (k, v)
            })
            .collect(),
        Value::Array(a) => a
            .to_vec()
            .into_iter()
            .enumerate()
            .map(|(i, v)| (Rc::from(i.to_string()), v))
            .collect(),
        _ => vec![],
    };
    for (k, v) in entries {
        if !visited.iter().any(|seen| *seen == k) {
            out.set(&k, v);
        }
    }
    Value::Object(out)
}

/// Tie the side-effecting write streams of a destructuring assignment to
/// its result: subscribing the result also drives every leaf binding.
pub(super) fn with_reference_streams(result: Value, refs: Vec<Observable<Value>>) -> Value {
    let Value::Stream(main) = result else {
        return result;
    };
    let refs: Vec<Observable<Value>> = refs.into_iter().filter(|r| !r.ptr_eq(&main)).collect();
    if refs.is_empty() {
        return Value::Stream(main);
    }
    let merged = Observable::merge(refs);
    let out = Observable::new(move |dest| {
        let side = merged.subscribe(|_| {});
        dest.add_teardown(move || side.unsubscribe());
        let d_next = dest.clone();
        let d_err = dest.clone();
        let d_done = dest.clone();
        let upstream = main.subscribe_all(
            move |v| d_next.next(v),
            move |e| d_err.error(e),
            move || d_done.complete(),
        );
        dest.add_teardown(move || upstream.unsubscribe());
    });
    Value::Stream(out)
}
