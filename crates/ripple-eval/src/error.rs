use ripple_stream::StreamError;
use thiserror::Error;

/// Evaluation failure.
///
/// Errors raised while a stream emission is being processed travel down the
/// stream's error channel as a [`StreamError`]; errors raised before any
/// subscription exists are returned synchronously from the evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// A value of the wrong shape showed up where another was required.
    #[error("type error: {0}")]
    Type(String),

    /// Call target did not evaluate to a function.
    #[error("{0} is not a function")]
    NotAFunction(String),

    /// Assignment target is not something that can hold a value.
    #[error("invalid assignment target: {0}")]
    InvalidTarget(String),

    /// The object side of an assignment target resolved to a stream.
    #[error("cannot assign through a stream-valued object")]
    StreamOwner,

    /// A compound assignment or update found a stream already stored in the
    /// target slot.
    #[error("cannot apply `{op}` to a slot holding an unresolved stream")]
    StreamOperand { op: String },

    /// Destructuring source cannot be iterated.
    #[error("destructuring source is not iterable")]
    NotIterable,

    /// Object destructuring source is null or undefined.
    #[error("cannot destructure null or undefined")]
    NotObjectCoercible,

    /// An arrow function body produced a stream with no value available at
    /// call time.
    #[error("function body produced a stream with no resolved value")]
    UnresolvedBody,

    /// The evaluator cannot handle this expression form.
    #[error("unsupported expression: {0}")]
    Unsupported(String),

    /// Failure carried over from a stream the evaluator subscribed to.
    #[error("{0}")]
    Stream(String),
}

impl From<StreamError> for EvalError {
    fn from(err: StreamError) -> Self {
        EvalError::Stream(err.message().to_owned())
    }
}

impl From<EvalError> for StreamError {
    fn from(err: EvalError) -> Self {
        StreamError::new(err.to_string())
    }
}
