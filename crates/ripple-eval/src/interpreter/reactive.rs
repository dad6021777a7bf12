//! Reactive evaluation rules.
//!
//! Overrides the static rules wherever a stream or reactive-object operand
//! changes the node's meaning:
//!
//! - operand lists combine latest-wise and re-apply per emission;
//! - member access on a reactive object rides its property streams;
//! - calls re-apply per resolved-argument emission and switch into stream
//!   results;
//! - conditional and logical nodes with a stream test re-evaluate the
//!   taken branch per test emission (switch semantics);
//! - arrow functions resolve a stream body synchronously at call time.

use std::rc::Rc;

use ripple_ast::{Argument, Expr, LogicalOp, MemberExpr, Pattern};
use ripple_stream::{Observable, StreamError};

use super::rules::{expand_args, make_arrow, ApplyFn, EvalResult, Rules};
use crate::combine::{combine_mixed, Combined};
use crate::context::Context;
use crate::error::EvalError;
use crate::property::get_property;
use crate::value::{FunctionValue, Value};

/// What a called arrow function does when its body produces a stream with
/// no synchronously available value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnresolvedBodyPolicy {
    /// Fail the call.
    #[default]
    Error,
    /// Return the stream itself and let the caller's node resolve it.
    PassThrough,
}

/// The full evaluator: static semantics on plain input, reactive semantics
/// as soon as a stream or reactive object enters an expression.
#[derive(Clone, Debug, Default)]
pub struct ReactiveEval {
    policy: UnresolvedBodyPolicy,
}

impl ReactiveEval {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policy(policy: UnresolvedBodyPolicy) -> Self {
        Self { policy }
    }
}

/// A resolved member link: the object (kept as the call receiver) and the
/// property value.
#[derive(Clone)]
struct MemberHit {
    obj: Value,
    value: Value,
}

impl MemberHit {
    fn short_circuit() -> Self {
        Self {
            obj: Value::Undefined,
            value: Value::Undefined,
        }
    }

    fn read(obj: Value, key: &Value) -> Self {
        let value = get_property(&obj, key);
        Self { obj, value }
    }
}

enum MemberRes {
    Static(MemberHit),
    Stream(Observable<MemberHit>),
}

fn hit_stream(result: EvalResult) -> Observable<MemberHit> {
    match result {
        Ok(Value::Stream(s)) => s.map(|v| MemberHit {
            obj: Value::Undefined,
            value: v,
        }),
        Ok(v) => Observable::of(MemberHit {
            obj: Value::Undefined,
            value: v,
        }),
        Err(e) => Observable::throw(e.into()),
    }
}

/// Flatten a property read whose stored value is itself a stream: the
/// member tracks the inner emissions.
fn unwrap_inner(obj: Value, value: Value) -> Observable<MemberHit> {
    match value {
        Value::Stream(inner) => inner.map(move |v| MemberHit {
            obj: obj.clone(),
            value: v,
        }),
        v => Observable::of(MemberHit { obj, value: v }),
    }
}

fn value_stream(result: EvalResult) -> Observable<Value> {
    match result {
        Ok(Value::Stream(s)) => s,
        Ok(v) => Observable::of(v),
        Err(e) => Observable::throw(e.into()),
    }
}

impl ReactiveEval {
    fn resolve_member(&self, member: &MemberExpr, ctx: &Context) -> Result<MemberRes, EvalError> {
        let obj = self.eval(&member.object, ctx)?;

        if member.optional || member.short_circuited {
            match &obj {
                Value::Stream(s) => {
                    // Short-circuit per emission; the key expression only
                    // runs (with its side effects) when the object side is
                    // not nullish.
                    let rules = self.clone();
                    let ctx = ctx.clone();
                    let property = member.property.clone();
                    let computed = member.computed;
                    return Ok(MemberRes::Stream(s.switch_map(move |o| {
                        if o.is_nullish() {
                            return Observable::of(MemberHit::short_circuit());
                        }
                        let key = if computed {
                            match rules.eval(&property, &ctx) {
                                Ok(k) => k,
                                Err(e) => return Observable::throw(e.into()),
                            }
                        } else {
                            match &*property {
                                Expr::Identifier(name) => Value::str(name.clone()),
                                other => {
                                    return Observable::throw(
                                        EvalError::Unsupported(format!(
                                            "non-identifier member name: {other:?}"
                                        ))
                                        .into(),
                                    )
                                }
                            }
                        };
                        match key {
                            Value::Stream(keys) => {
                                let o = o.clone();
                                keys.map(move |k| MemberHit::read(o.clone(), &k))
                            }
                            k => Observable::of(MemberHit::read(o, &k)),
                        }
                    })));
                }
                plain if plain.is_nullish() => {
                    return Ok(MemberRes::Static(MemberHit::short_circuit()))
                }
                _ => {}
            }
        }

        let key = self.member_key(member, ctx)?;
        match obj {
            Value::Reactive(rx) => match key {
                Value::Stream(keys) => {
                    let rx_outer = rx.clone();
                    Ok(MemberRes::Stream(keys.switch_map(move |k| {
                        let owner = Value::Reactive(rx_outer.clone());
                        rx_outer
                            .get_observable(&k.to_key())
                            .switch_map(move |v| unwrap_inner(owner.clone(), v))
                    })))
                }
                k => {
                    let key = k.to_key();
                    let read = get_property(&Value::Reactive(rx.clone()), &k);
                    match read {
                        // A reactive property value passes through as-is so
                        // aliasing it keeps the wrapper, not a projection.
                        Value::Reactive(_) => Ok(MemberRes::Static(MemberHit {
                            obj: Value::Reactive(rx),
                            value: read,
                        })),
                        // Intercepted methods bind statically.
                        Value::Function(_) => Ok(MemberRes::Static(MemberHit {
                            obj: Value::Reactive(rx),
                            value: read,
                        })),
                        _ => {
                            let owner = Value::Reactive(rx.clone());
                            Ok(MemberRes::Stream(
                                rx.get_observable(&key)
                                    .switch_map(move |v| unwrap_inner(owner.clone(), v)),
                            ))
                        }
                    }
                }
            },
            Value::Stream(objects) => match key {
                Value::Stream(keys) => Ok(MemberRes::Stream(
                    Observable::combine_latest(vec![objects, keys])
                        .map(|pair| MemberHit::read(pair[0].clone(), &pair[1])),
                )),
                k => Ok(MemberRes::Stream(
                    objects.map(move |o| MemberHit::read(o, &k)),
                )),
            },
            plain => {
                if plain.is_nullish() {
                    return Err(EvalError::Type(format!(
                        "cannot read properties of {}",
                        plain.type_name()
                    )));
                }
                match key {
                    Value::Stream(keys) => {
                        let o = plain.clone();
                        Ok(MemberRes::Stream(
                            keys.map(move |k| MemberHit::read(o.clone(), &k)),
                        ))
                    }
                    k => Ok(MemberRes::Static(MemberHit::read(plain, &k))),
                }
            }
        }
    }

    /// Apply a resolved callee to already-evaluated argument operands.
    fn apply_call(
        &self,
        this: Value,
        func: Value,
        operands: &[Value],
        spreads: &Rc<Vec<bool>>,
        opt: bool,
    ) -> EvalResult {
        if func.is_nullish() && opt {
            return Ok(Value::Undefined);
        }
        let f = match func {
            Value::Function(f) => f,
            other => return Err(EvalError::NotAFunction(other.to_display_string())),
        };
        let reactive = operands
            .iter()
            .any(|v| matches!(v, Value::Stream(_) | Value::Reactive(_)));
        if !reactive {
            let call_args = expand_args(operands, spreads)?;
            return f.call(this, &call_args);
        }
        let converted: Vec<Value> = operands
            .iter()
            .map(|v| match v {
                Value::Reactive(rx) => Value::Stream(rx.as_observable()),
                other => other.clone(),
            })
            .collect();
        let resolved = match combine_mixed(converted, true) {
            Combined::Stream(s) => s,
            Combined::Plain(vals) => Observable::of(vals),
        };
        let spreads = Rc::clone(spreads);
        Ok(Value::Stream(
            resolved
                .switch_map(move |vals| {
                    let applied = expand_args(&vals, &spreads)
                        .and_then(|args| f.call(this.clone(), &args));
                    // A stream result is switched into, not emitted as a
                    // value.
                    value_stream(applied)
                })
                .share_replay(),
        ))
    }

    /// Per-emission call application for a stream-valued callee.
    fn call_per_hit(
        &self,
        hits: Observable<MemberHit>,
        operands: Vec<Value>,
        spreads: Rc<Vec<bool>>,
        opt: bool,
    ) -> EvalResult {
        let rules = self.clone();
        Ok(Value::Stream(
            hits.switch_map(move |hit| {
                value_stream(rules.apply_call(hit.obj, hit.value, &operands, &spreads, opt))
            })
            .share_replay(),
        ))
    }
}

impl Rules for ReactiveEval {
    fn apply_resolved(&self, operands: Vec<Value>, apply: ApplyFn) -> EvalResult {
        let reactive = operands
            .iter()
            .any(|v| matches!(v, Value::Stream(_) | Value::Reactive(_)));
        if !reactive {
            return apply(&operands);
        }
        let converted: Vec<Value> = operands
            .into_iter()
            .map(|v| match v {
                Value::Reactive(rx) => Value::Stream(rx.as_observable()),
                other => other,
            })
            .collect();
        match combine_mixed(converted, false) {
            Combined::Plain(vals) => apply(&vals),
            Combined::Stream(resolved) => Ok(Value::Stream(
                resolved
                    .map_result(move |vals| apply(&vals).map_err(StreamError::from))
                    .share_replay(),
            )),
        }
    }

    fn eval_member(&self, member: &MemberExpr, ctx: &Context) -> EvalResult {
        match self.resolve_member(member, ctx)? {
            MemberRes::Static(hit) => Ok(hit.value),
            MemberRes::Stream(hits) => {
                Ok(Value::Stream(hits.map(|hit| hit.value).share_replay()))
            }
        }
    }

    fn eval_call(
        &self,
        callee: &Expr,
        args: &[Argument],
        optional: bool,
        short_circuited: bool,
        ctx: &Context,
    ) -> EvalResult {
        let opt = optional || short_circuited;
        // The callee resolves first: a short-circuited call must not run
        // the arguments' side effects, matching the static order.
        match callee {
            Expr::Member(member) => match self.resolve_member(member, ctx)? {
                MemberRes::Static(hit) => {
                    // A nullish obj means the member link short-circuited.
                    if hit.value.is_nullish() && (opt || hit.obj.is_nullish()) {
                        return Ok(Value::Undefined);
                    }
                    let (operands, spreads) = self.call_operands(args, ctx)?;
                    self.apply_call(hit.obj, hit.value, &operands, &Rc::new(spreads), opt)
                }
                MemberRes::Stream(hits) => {
                    let (operands, spreads) = self.call_operands(args, ctx)?;
                    self.call_per_hit(hits, operands, Rc::new(spreads), opt)
                }
            },
            other => match self.eval(other, ctx)? {
                Value::Stream(funcs) => {
                    let (operands, spreads) = self.call_operands(args, ctx)?;
                    self.call_per_hit(
                        hit_stream(Ok(Value::Stream(funcs))),
                        operands,
                        Rc::new(spreads),
                        opt,
                    )
                }
                func => {
                    if func.is_nullish() && opt {
                        return Ok(Value::Undefined);
                    }
                    let (operands, spreads) = self.call_operands(args, ctx)?;
                    self.apply_call(Value::Undefined, func, &operands, &Rc::new(spreads), opt)
                }
            },
        }
    }

    fn eval_conditional(
        &self,
        test: &Expr,
        consequent: &Expr,
        alternate: &Expr,
        ctx: &Context,
    ) -> EvalResult {
        match self.eval(test, ctx)? {
            Value::Stream(tests) => {
                let rules = self.clone();
                let ctx = ctx.clone();
                let consequent = consequent.clone();
                let alternate = alternate.clone();
                Ok(Value::Stream(
                    tests
                        .switch_map(move |t| {
                            let branch = if t.is_truthy() { &consequent } else { &alternate };
                            value_stream(rules.eval(branch, &ctx))
                        })
                        .share_replay(),
                ))
            }
            t if t.is_truthy() => self.eval(consequent, ctx),
            _ => self.eval(alternate, ctx),
        }
    }

    fn eval_logical(&self, op: LogicalOp, left: &Expr, right: &Expr, ctx: &Context) -> EvalResult {
        let left = self.eval(left, ctx)?;
        let take_right = move |v: &Value| match op {
            LogicalOp::And => v.is_truthy(),
            LogicalOp::Or => !v.is_truthy(),
            LogicalOp::Nullish => v.is_nullish(),
        };
        match left {
            Value::Stream(tests) => {
                let rules = self.clone();
                let ctx = ctx.clone();
                let right = right.clone();
                Ok(Value::Stream(
                    tests
                        .switch_map(move |l| {
                            if take_right(&l) {
                                value_stream(rules.eval(&right, &ctx))
                            } else {
                                Observable::of(l)
                            }
                        })
                        .share_replay(),
                ))
            }
            l if take_right(&l) => self.eval(right, ctx),
            l => Ok(l),
        }
    }

    fn eval_arrow(&self, params: &[Pattern], body: &Expr, ctx: &Context) -> EvalResult {
        let inner = make_arrow(self.clone(), params.to_vec(), body.clone(), ctx.clone());
        let policy = self.policy;
        Ok(Value::Function(FunctionValue::new(move |this, args| {
            match inner.call(this, args)? {
                // A stream body resolves synchronously at call time; a
                // body that cannot is handled per policy.
                Value::Stream(s) => match s.resolve_now() {
                    Some(v) => Ok(v),
                    None => match policy {
                        UnresolvedBodyPolicy::Error => Err(EvalError::UnresolvedBody),
                        UnresolvedBodyPolicy::PassThrough => Ok(Value::Stream(s)),
                    },
                },
                v => Ok(v),
            }
        })))
    }
}
