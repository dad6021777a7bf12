//! Expression interpretation.

mod lvalue;
mod reactive;
mod rules;

pub use reactive::{ReactiveEval, UnresolvedBodyPolicy};
pub use rules::{ApplyFn, EvalResult, Rules, StaticEval};

use ripple_ast::Expr;

use crate::context::Context;
use crate::error::EvalError;
use crate::value::Value;

/// Evaluate an expression with full reactive semantics.
pub fn evaluate(expr: &Expr, ctx: &Context) -> Result<Value, EvalError> {
    ReactiveEval::new().eval(expr, ctx)
}
