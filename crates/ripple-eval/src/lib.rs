//! Reactive expression evaluation.
//!
//! An evaluator for an ES-flavoured expression language in which streams
//! ([`ripple_stream::Observable`]) and reactive object wrappers
//! ([`RxObject`]) are first-class operands. On fully plain input it behaves
//! exactly like a static evaluator; as soon as a stream or wrapper enters
//! an expression, the affected nodes resolve per emission:
//!
//! - operand lists combine latest-wise, with plain positions pinned to
//!   their evaluation-time values ([`combine_mixed`]);
//! - property access on a wrapper follows the property's stream, and calls
//!   switch into stream results;
//! - assignment can bind a stream to a wrapper property
//!   ([`RxObject::set_observable`]), alias a stream into a plain slot, or
//!   accumulate compound operations per emission.
//!
//! Everything derived stays lazy: evaluation wires streams together but
//! applies no side effect until the result is subscribed.
//!
//! ```
//! use ripple_ast::build;
//! use ripple_eval::{evaluate, Context, Value};
//!
//! let ctx = Context::new();
//! ctx.define("a", Value::Number(2.0));
//! let expr = build::binary(
//!     ripple_ast::BinaryOp::Mul,
//!     build::ident("a"),
//!     build::num(21.0),
//! );
//! assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Number(42.0));
//! ```

mod combine;
mod context;
mod error;
mod interpreter;
mod ops;
mod property;
mod rxobject;
mod value;

pub use combine::{combine_mixed, Combined};
pub use context::Context;
pub use error::EvalError;
pub use interpreter::{
    evaluate, ApplyFn, EvalResult, ReactiveEval, Rules, StaticEval, UnresolvedBodyPolicy,
};
pub use property::get_property;
pub use rxobject::{clear_registry, release, CombineFn, RxObject};
pub use value::{format_number, ArrayRef, FunctionValue, ObjectRef, Value};
