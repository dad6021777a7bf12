//! Evaluation rules.
//!
//! [`Rules`] is the dispatch seam: its default methods implement plain
//! static semantics, and [`ReactiveEval`] overrides the node kinds whose
//! behaviour changes when operands are streams or reactive objects. Keeping
//! one dispatch table for both guarantees the two agree on fully plain
//! input.
//!
//! [`ReactiveEval`]: super::ReactiveEval

use std::rc::Rc;

use ripple_ast::{
    Argument, ArrayElement, AssignOp, BinaryOp, Expr, Literal, LogicalOp, MemberExpr,
    ObjectProperty, Pattern, PropertyKey, UnaryOp, UpdateOp,
};

use super::lvalue;
use crate::context::Context;
use crate::error::EvalError;
use crate::ops;
use crate::property::get_property;
use crate::value::{FunctionValue, ObjectRef, Value};

pub type EvalResult = Result<Value, EvalError>;

/// Node-value production from a resolved operand list.
pub type ApplyFn = Rc<dyn Fn(&[Value]) -> EvalResult>;

/// Expression evaluation rules. Implementors must be cheaply cloneable:
/// arrow function values capture their defining evaluator.
pub trait Rules: Clone + 'static {
    /// Resolve an operand list and produce the node's value from it.
    ///
    /// The static rules apply once, directly; the reactive rules combine
    /// stream operands and re-apply per emission.
    fn apply_resolved(&self, operands: Vec<Value>, apply: ApplyFn) -> EvalResult {
        apply(&operands)
    }

    fn eval(&self, expr: &Expr, ctx: &Context) -> EvalResult {
        match expr {
            Expr::Literal(lit) => Ok(literal_value(lit)),
            Expr::Identifier(name) => Ok(ctx.get(name).unwrap_or(Value::Undefined)),
            Expr::Array(elements) => self.eval_array(elements, ctx),
            Expr::Object(props) => self.eval_object(props, ctx),
            Expr::Unary { op, operand } => self.eval_unary(*op, operand, ctx),
            Expr::Binary { op, left, right } => self.eval_binary(*op, left, right, ctx),
            Expr::Logical { op, left, right } => self.eval_logical(*op, left, right, ctx),
            Expr::Conditional {
                test,
                consequent,
                alternate,
            } => self.eval_conditional(test, consequent, alternate, ctx),
            Expr::Member(member) => self.eval_member(member, ctx),
            Expr::Call {
                callee,
                args,
                optional,
                short_circuited,
            } => self.eval_call(callee, args, *optional, *short_circuited, ctx),
            Expr::Arrow { params, body } => self.eval_arrow(params, body, ctx),
            Expr::Assign { op, target, value } => self.eval_assign(*op, target, value, ctx),
            Expr::Update { op, prefix, target } => {
                self.eval_update(*op, *prefix, target, ctx)
            }
            Expr::Sequence(exprs) => {
                let mut last = Value::Undefined;
                for e in exprs {
                    last = self.eval(e, ctx)?;
                }
                Ok(last)
            }
        }
    }

    fn eval_unary(&self, op: UnaryOp, operand: &Expr, ctx: &Context) -> EvalResult {
        let value = self.eval(operand, ctx)?;
        self.apply_resolved(
            vec![value],
            Rc::new(move |vals| ops::apply_unary(op, &vals[0])),
        )
    }

    fn eval_binary(&self, op: BinaryOp, left: &Expr, right: &Expr, ctx: &Context) -> EvalResult {
        let left = self.eval(left, ctx)?;
        let right = self.eval(right, ctx)?;
        self.apply_resolved(
            vec![left, right],
            Rc::new(move |vals| ops::apply_binary(op, &vals[0], &vals[1])),
        )
    }

    fn eval_logical(&self, op: LogicalOp, left: &Expr, right: &Expr, ctx: &Context) -> EvalResult {
        let left = self.eval(left, ctx)?;
        let take_right = match op {
            LogicalOp::And => left.is_truthy(),
            LogicalOp::Or => !left.is_truthy(),
            LogicalOp::Nullish => left.is_nullish(),
        };
        if take_right {
            self.eval(right, ctx)
        } else {
            Ok(left)
        }
    }

    fn eval_conditional(
        &self,
        test: &Expr,
        consequent: &Expr,
        alternate: &Expr,
        ctx: &Context,
    ) -> EvalResult {
        if self.eval(test, ctx)?.is_truthy() {
            self.eval(consequent, ctx)
        } else {
            self.eval(alternate, ctx)
        }
    }

    fn eval_array(&self, elements: &[ArrayElement], ctx: &Context) -> EvalResult {
        let mut operands = Vec::new();
        let mut slots = Vec::with_capacity(elements.len());
        for element in elements {
            match element {
                ArrayElement::Hole => slots.push(ArraySlot::Hole),
                ArrayElement::Expr(e) => {
                    slots.push(ArraySlot::Item(operands.len()));
                    operands.push(self.eval(e, ctx)?);
                }
                ArrayElement::Spread(e) => {
                    slots.push(ArraySlot::Spread(operands.len()));
                    operands.push(self.eval(e, ctx)?);
                }
            }
        }
        self.apply_resolved(
            operands,
            Rc::new(move |vals| {
                let mut out = Vec::new();
                for slot in &slots {
                    match slot {
                        ArraySlot::Hole => out.push(Value::Undefined),
                        ArraySlot::Item(i) => out.push(vals[*i].clone()),
                        ArraySlot::Spread(i) => spread_into(&mut out, &vals[*i])?,
                    }
                }
                Ok(Value::array(out))
            }),
        )
    }

    fn eval_object(&self, props: &[ObjectProperty], ctx: &Context) -> EvalResult {
        let mut operands = Vec::new();
        let mut slots = Vec::with_capacity(props.len());
        for prop in props {
            match prop {
                ObjectProperty::KeyValue { key, value } => {
                    let key_slot = match key {
                        PropertyKey::Identifier(name) => KeySlot::Fixed(name.as_str().into()),
                        PropertyKey::Literal(lit) => KeySlot::Fixed(literal_value(lit).to_key()),
                        PropertyKey::Computed(e) => {
                            let slot = KeySlot::Operand(operands.len());
                            operands.push(self.eval(e, ctx)?);
                            slot
                        }
                    };
                    let value_slot = operands.len();
                    operands.push(self.eval(value, ctx)?);
                    slots.push(ObjectSlot::Entry {
                        key: key_slot,
                        value: value_slot,
                    });
                }
                ObjectProperty::Shorthand(name) => {
                    slots.push(ObjectSlot::Entry {
                        key: KeySlot::Fixed(name.as_str().into()),
                        value: operands.len(),
                    });
                    operands.push(ctx.get(name).unwrap_or(Value::Undefined));
                }
                ObjectProperty::Spread(e) => {
                    slots.push(ObjectSlot::Spread(operands.len()));
                    operands.push(self.eval(e, ctx)?);
                }
            }
        }
        self.apply_resolved(
            operands,
            Rc::new(move |vals| {
                let out = ObjectRef::new(vec![]);
                for slot in &slots {
                    match slot {
                        ObjectSlot::Entry { key, value } => {
                            let key = match key {
                                KeySlot::Fixed(k) => k.clone(),
                                KeySlot::Operand(i) => vals[*i].to_key(),
                            };
                            out.set(&key, vals[*value].clone());
                        }
                        ObjectSlot::Spread(i) => spread_entries(&out, &vals[*i]),
                    }
                }
                Ok(Value::Object(out))
            }),
        )
    }

    /// Property key of a member link: the fixed name, or the evaluated
    /// computed expression (which may itself be a stream).
    fn member_key(&self, member: &MemberExpr, ctx: &Context) -> EvalResult {
        if member.computed {
            self.eval(&member.property, ctx)
        } else {
            match &*member.property {
                Expr::Identifier(name) => Ok(Value::str(name.clone())),
                other => Err(EvalError::Unsupported(format!(
                    "non-identifier member name: {other:?}"
                ))),
            }
        }
    }

    fn eval_member(&self, member: &MemberExpr, ctx: &Context) -> EvalResult {
        let obj = self.eval(&member.object, ctx)?;
        if obj.is_nullish() {
            if member.optional || member.short_circuited {
                // Short-circuit before the key evaluates: its side effects
                // must not run.
                return Ok(Value::Undefined);
            }
            return Err(EvalError::Type(format!(
                "cannot read properties of {}",
                obj.type_name()
            )));
        }
        let key = self.member_key(member, ctx)?;
        Ok(get_property(&obj, &key))
    }

    /// Evaluate call arguments into operands, remembering spread slots.
    fn call_operands(
        &self,
        args: &[Argument],
        ctx: &Context,
    ) -> Result<(Vec<Value>, Vec<bool>), EvalError> {
        let mut operands = Vec::with_capacity(args.len());
        let mut spreads = Vec::with_capacity(args.len());
        for arg in args {
            match arg {
                Argument::Expr(e) => {
                    operands.push(self.eval(e, ctx)?);
                    spreads.push(false);
                }
                Argument::Spread(e) => {
                    operands.push(self.eval(e, ctx)?);
                    spreads.push(true);
                }
            }
        }
        Ok((operands, spreads))
    }

    fn eval_call(
        &self,
        callee: &Expr,
        args: &[Argument],
        optional: bool,
        short_circuited: bool,
        ctx: &Context,
    ) -> EvalResult {
        let (this, func) = match callee {
            Expr::Member(member) => {
                let obj = self.eval(&member.object, ctx)?;
                if obj.is_nullish() {
                    if member.optional || member.short_circuited {
                        return Ok(Value::Undefined);
                    }
                    return Err(EvalError::Type(format!(
                        "cannot read properties of {}",
                        obj.type_name()
                    )));
                }
                let key = self.member_key(member, ctx)?;
                let func = get_property(&obj, &key);
                (obj, func)
            }
            other => (Value::Undefined, self.eval(other, ctx)?),
        };
        if func.is_nullish() && (optional || short_circuited) {
            return Ok(Value::Undefined);
        }
        let f = match func {
            Value::Function(f) => f,
            other => return Err(EvalError::NotAFunction(other.to_display_string())),
        };
        let (operands, spreads) = self.call_operands(args, ctx)?;
        self.apply_resolved(
            operands,
            Rc::new(move |vals| {
                let call_args = expand_args(vals, &spreads)?;
                f.call(this.clone(), &call_args)
            }),
        )
    }

    fn eval_arrow(&self, params: &[Pattern], body: &Expr, ctx: &Context) -> EvalResult {
        Ok(Value::Function(make_arrow(
            self.clone(),
            params.to_vec(),
            body.clone(),
            ctx.clone(),
        )))
    }

    fn eval_assign(&self, op: AssignOp, target: &Pattern, value: &Expr, ctx: &Context) -> EvalResult {
        let right = self.eval(value, ctx)?;
        let mut refs = Vec::new();
        let result = lvalue::assign_pattern(self, target, op, right, ctx, false, &mut refs)?;
        Ok(lvalue::with_reference_streams(result, refs))
    }

    fn eval_update(&self, op: UpdateOp, prefix: bool, target: &Expr, ctx: &Context) -> EvalResult {
        let pattern = match target {
            Expr::Identifier(name) => Pattern::Identifier(name.clone()),
            Expr::Member(member) => Pattern::Member(member.clone()),
            other => {
                return Err(EvalError::InvalidTarget(format!(
                    "cannot update {other:?}"
                )))
            }
        };
        let lv = lvalue::resolve(self, &pattern, ctx)?;
        let current = lv.read();
        if current.is_stream() {
            return Err(EvalError::StreamOperand { op: op.to_string() });
        }
        let before = current.to_number();
        let after = match op {
            UpdateOp::Incr => before + 1.0,
            UpdateOp::Decr => before - 1.0,
        };
        lv.write(Value::Number(after), false);
        Ok(Value::Number(if prefix { after } else { before }))
    }
}

/// Plain static evaluation: streams and reactive wrappers get no special
/// treatment beyond being ordinary opaque values.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticEval;

impl Rules for StaticEval {}

enum ArraySlot {
    Hole,
    Item(usize),
    Spread(usize),
}

enum ObjectSlot {
    Entry { key: KeySlot, value: usize },
    Spread(usize),
}

enum KeySlot {
    Fixed(Rc<str>),
    Operand(usize),
}

pub(super) fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Undefined => Value::Undefined,
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::Str(s) => Value::str(s.clone()),
    }
}

/// Expand an iterable into array elements; spreading a non-iterable is an
/// error, as in the source dialect.
pub(super) fn spread_into(out: &mut Vec<Value>, value: &Value) -> Result<(), EvalError> {
    match value {
        Value::Array(a) => out.extend(a.to_vec()),
        Value::Str(s) => out.extend(s.chars().map(|c| Value::Str(c.to_string().into()))),
        Value::Reactive(rx) => match rx.as_array() {
            Some(a) => out.extend(a.to_vec()),
            None => return Err(EvalError::NotIterable),
        },
        _ => return Err(EvalError::NotIterable),
    }
    Ok(())
}

/// Merge a spread source's entries into an object under construction.
/// Nullish and primitive sources contribute nothing.
fn spread_entries(out: &ObjectRef, value: &Value) {
    match value {
        Value::Object(o) => {
            for (k, v) in o.entries() {
                out.set(&k, v);
            }
        }
        Value::Reactive(rx) => {
            for key in rx.own_keys() {
                out.set(&key, rx.get(&key));
            }
        }
        Value::Array(a) => {
            for (i, v) in a.to_vec().into_iter().enumerate() {
                out.set(&i.to_string(), v);
            }
        }
        Value::Str(s) => {
            for (i, c) in s.chars().enumerate() {
                out.set(&i.to_string(), Value::Str(c.to_string().into()));
            }
        }
        _ => {}
    }
}

pub(super) fn expand_args(vals: &[Value], spreads: &[bool]) -> Result<Vec<Value>, EvalError> {
    let mut out = Vec::with_capacity(vals.len());
    for (value, spread) in vals.iter().zip(spreads) {
        if *spread {
            spread_into(&mut out, value)?;
        } else {
            out.push(value.clone());
        }
    }
    Ok(out)
}

/// Build the callable for an arrow literal: a child scope per call, each
/// parameter bound (with destructuring, defaults and aliasing) in it, then
/// the body evaluated under the defining rules.
pub(super) fn make_arrow<R: Rules>(
    rules: R,
    params: Vec<Pattern>,
    body: Expr,
    ctx: Context,
) -> FunctionValue {
    FunctionValue::new(move |_this, args| {
        let frame = ctx.child();
        for (i, param) in params.iter().enumerate() {
            let arg = args.get(i).cloned().unwrap_or(Value::Undefined);
            lvalue::bind_pattern(&rules, param, arg, &frame)?;
        }
        rules.eval(&body, &frame)
    })
}
