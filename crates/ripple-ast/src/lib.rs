//! Abstract syntax tree types for ripple.
//!
//! These types are the evaluator's input interface. They describe an
//! ES-flavoured expression language: member access with optional chaining,
//! calls, arrow functions, assignment with destructuring patterns, update
//! and sequence expressions. A parser producing them is deliberately out of
//! scope — embedders either bring their own front end or build trees with
//! the [`build`] helpers.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod build;

/// An expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    /// A literal constant: `1`, `"a"`, `true`, `null`, `undefined`.
    Literal(Literal),
    /// A variable reference: `x`.
    Identifier(String),
    /// An array literal: `[a, , ...rest]` (holes and spreads allowed).
    Array(Vec<ArrayElement>),
    /// An object literal: `{a, b: 1, [k]: v, ...rest}`.
    Object(Vec<ObjectProperty>),
    /// A unary operation: `-a`, `!a`, `typeof a`.
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    /// A binary operation: `a + b`, `a === b`.
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A short-circuiting logical operation: `a && b`, `a || b`, `a ?? b`.
    Logical {
        op: LogicalOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// A conditional: `test ? consequent : alternate`.
    Conditional {
        test: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    },
    /// Member access: `obj.prop`, `obj[expr]`, `obj?.prop`.
    Member(MemberExpr),
    /// A call: `f(a, ...rest)`, `obj.m(x)`, `f?.(x)`.
    Call {
        callee: Box<Expr>,
        args: Vec<Argument>,
        /// `?.(` at this call.
        optional: bool,
        /// This call sits in the tail of an optional chain whose head may
        /// have short-circuited.
        short_circuited: bool,
    },
    /// An arrow function literal: `(a, b = 1, ...rest) => body`.
    Arrow {
        params: Vec<Pattern>,
        body: Box<Expr>,
    },
    /// An assignment: `target op value`, where `target` may be a
    /// destructuring pattern (only for plain `=`).
    Assign {
        op: AssignOp,
        target: Pattern,
        value: Box<Expr>,
    },
    /// An update: `x++`, `--x`.
    Update {
        op: UpdateOp,
        prefix: bool,
        target: Box<Expr>,
    },
    /// A comma sequence: `a, b, c` — evaluates left to right, yields last.
    Sequence(Vec<Expr>),
}

/// Member access, shared between expression and pattern positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpr {
    pub object: Box<Expr>,
    /// For non-computed access this is an `Identifier` holding the property
    /// name (not evaluated as a variable); for computed access, any
    /// expression.
    pub property: Box<Expr>,
    pub computed: bool,
    /// `?.` at this link.
    pub optional: bool,
    /// This link sits in the tail of an optional chain.
    pub short_circuited: bool,
}

/// A literal constant value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
}

/// One entry of an array literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayElement {
    /// An elision: `[a, , c]`.
    Hole,
    Expr(Expr),
    Spread(Expr),
}

/// One entry of an object literal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ObjectProperty {
    KeyValue { key: PropertyKey, value: Expr },
    /// `{a}` — key and value are the same identifier.
    Shorthand(String),
    Spread(Expr),
}

/// A property key in object literals and object patterns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyKey {
    /// `{name: ..}` — a fixed name, not evaluated.
    Identifier(String),
    /// `{"s": ..}` or `{1: ..}`.
    Literal(Literal),
    /// `{[expr]: ..}` — evaluated at assignment time.
    Computed(Expr),
}

/// One call argument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Argument {
    Expr(Expr),
    Spread(Expr),
}

/// An assignment target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Pattern {
    /// `x = ..` — a context slot.
    Identifier(String),
    /// `obj.prop = ..` / `obj[k] = ..`.
    Member(MemberExpr),
    /// `[a, , b, ...rest] = ..`.
    Array(Vec<ArrayPatternElement>),
    /// `{a, b: c, [k]: d, ...rest} = ..`.
    Object {
        props: Vec<ObjectPatternProperty>,
        rest: Option<Box<Pattern>>,
    },
    /// `a = default` inside a pattern: applies when the slot resolves to
    /// `undefined`.
    Default {
        target: Box<Pattern>,
        default: Box<Expr>,
    },
}

/// One element of an array pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArrayPatternElement {
    Hole,
    Pattern(Pattern),
    Rest(Pattern),
}

/// One named property of an object pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectPatternProperty {
    pub key: PropertyKey,
    pub value: Pattern,
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
    BitNot,
    TypeOf,
    Void,
}

/// Binary (non-short-circuiting) operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Eq,
    NotEq,
    StrictEq,
    StrictNotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
    BitAnd,
    BitOr,
    BitXor,
    Shl,
    Shr,
    UShr,
    /// `key in obj` — key presence.
    In,
}

/// Short-circuiting logical operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogicalOp {
    And,
    Or,
    Nullish,
}

/// Assignment operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssignOp {
    Assign,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Pow,
    Shl,
    Shr,
    UShr,
    BitAnd,
    BitXor,
    BitOr,
}

/// Update operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UpdateOp {
    Incr,
    Decr,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            UnaryOp::Neg => "-",
            UnaryOp::Plus => "+",
            UnaryOp::Not => "!",
            UnaryOp::BitNot => "~",
            UnaryOp::TypeOf => "typeof",
            UnaryOp::Void => "void",
        };
        f.write_str(s)
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::StrictEq => "===",
            BinaryOp::StrictNotEq => "!==",
            BinaryOp::Lt => "<",
            BinaryOp::Gt => ">",
            BinaryOp::LtEq => "<=",
            BinaryOp::GtEq => ">=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::In => "in",
        };
        f.write_str(s)
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogicalOp::And => "&&",
            LogicalOp::Or => "||",
            LogicalOp::Nullish => "??",
        };
        f.write_str(s)
    }
}

impl fmt::Display for AssignOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AssignOp::Assign => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Rem => "%=",
            AssignOp::Pow => "**=",
            AssignOp::Shl => "<<=",
            AssignOp::Shr => ">>=",
            AssignOp::UShr => ">>>=",
            AssignOp::BitAnd => "&=",
            AssignOp::BitXor => "^=",
            AssignOp::BitOr => "|=",
        };
        f.write_str(s)
    }
}

impl fmt::Display for UpdateOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            UpdateOp::Incr => "++",
            UpdateOp::Decr => "--",
        })
    }
}

impl AssignOp {
    /// The underlying binary operator of a compound assignment, `None` for
    /// plain `=`.
    pub fn binary_op(self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::Add => Some(BinaryOp::Add),
            AssignOp::Sub => Some(BinaryOp::Sub),
            AssignOp::Mul => Some(BinaryOp::Mul),
            AssignOp::Div => Some(BinaryOp::Div),
            AssignOp::Rem => Some(BinaryOp::Rem),
            AssignOp::Pow => Some(BinaryOp::Pow),
            AssignOp::Shl => Some(BinaryOp::Shl),
            AssignOp::Shr => Some(BinaryOp::Shr),
            AssignOp::UShr => Some(BinaryOp::UShr),
            AssignOp::BitAnd => Some(BinaryOp::BitAnd),
            AssignOp::BitXor => Some(BinaryOp::BitXor),
            AssignOp::BitOr => Some(BinaryOp::BitOr),
        }
    }
}
