//! Constructor helpers for assembling expression trees by hand.
//!
//! The parser is external, so embedders (and this workspace's own tests)
//! build trees through these helpers rather than spelling out nested enums.

use crate::{
    Argument, ArrayElement, ArrayPatternElement, AssignOp, BinaryOp, Expr, Literal, LogicalOp,
    MemberExpr, ObjectPatternProperty, ObjectProperty, Pattern, PropertyKey, UnaryOp, UpdateOp,
};

/// `name`
pub fn ident(name: &str) -> Expr {
    Expr::Identifier(name.to_string())
}

/// A numeric literal.
pub fn num(value: f64) -> Expr {
    Expr::Literal(Literal::Number(value))
}

/// A string literal.
pub fn str(value: &str) -> Expr {
    Expr::Literal(Literal::Str(value.to_string()))
}

/// A boolean literal.
pub fn bool(value: bool) -> Expr {
    Expr::Literal(Literal::Bool(value))
}

/// `null`
pub fn null() -> Expr {
    Expr::Literal(Literal::Null)
}

/// `undefined`
pub fn undefined() -> Expr {
    Expr::Literal(Literal::Undefined)
}

/// `[a, b, c]`
pub fn array(elements: Vec<Expr>) -> Expr {
    Expr::Array(elements.into_iter().map(ArrayElement::Expr).collect())
}

/// `{k: v, ...}` with fixed keys.
pub fn object(props: Vec<(&str, Expr)>) -> Expr {
    Expr::Object(
        props
            .into_iter()
            .map(|(k, v)| ObjectProperty::KeyValue {
                key: PropertyKey::Identifier(k.to_string()),
                value: v,
            })
            .collect(),
    )
}

/// `op operand`
pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
    Expr::Unary {
        op,
        operand: Box::new(operand),
    }
}

/// `left op right`
pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
    Expr::Binary {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// `left op right` for `&&` / `||` / `??`.
pub fn logical(op: LogicalOp, left: Expr, right: Expr) -> Expr {
    Expr::Logical {
        op,
        left: Box::new(left),
        right: Box::new(right),
    }
}

/// `test ? consequent : alternate`
pub fn cond(test: Expr, consequent: Expr, alternate: Expr) -> Expr {
    Expr::Conditional {
        test: Box::new(test),
        consequent: Box::new(consequent),
        alternate: Box::new(alternate),
    }
}

/// `object.name`
pub fn member(object: Expr, name: &str) -> Expr {
    Expr::Member(member_expr(object, ident(name), false, false, false))
}

/// `object[property]`
pub fn index(object: Expr, property: Expr) -> Expr {
    Expr::Member(member_expr(object, property, true, false, false))
}

/// `object?.name`
pub fn opt_member(object: Expr, name: &str) -> Expr {
    Expr::Member(member_expr(object, ident(name), false, true, false))
}

/// `object?.[property]`
pub fn opt_index(object: Expr, property: Expr) -> Expr {
    Expr::Member(member_expr(object, property, true, true, false))
}

/// The raw member node, for when the flags matter.
pub fn member_expr(
    object: Expr,
    property: Expr,
    computed: bool,
    optional: bool,
    short_circuited: bool,
) -> MemberExpr {
    MemberExpr {
        object: Box::new(object),
        property: Box::new(property),
        computed,
        optional,
        short_circuited,
    }
}

/// `callee(args...)`
pub fn call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args: args.into_iter().map(Argument::Expr).collect(),
        optional: false,
        short_circuited: false,
    }
}

/// `callee?.(args...)`
pub fn opt_call(callee: Expr, args: Vec<Expr>) -> Expr {
    Expr::Call {
        callee: Box::new(callee),
        args: args.into_iter().map(Argument::Expr).collect(),
        optional: true,
        short_circuited: false,
    }
}

/// `(params...) => body` with simple identifier parameters.
pub fn arrow(params: Vec<&str>, body: Expr) -> Expr {
    Expr::Arrow {
        params: params
            .into_iter()
            .map(|p| Pattern::Identifier(p.to_string()))
            .collect(),
        body: Box::new(body),
    }
}

/// `(patterns...) => body`
pub fn arrow_pat(params: Vec<Pattern>, body: Expr) -> Expr {
    Expr::Arrow {
        params,
        body: Box::new(body),
    }
}

/// `name = value`
pub fn assign(name: &str, value: Expr) -> Expr {
    Expr::Assign {
        op: AssignOp::Assign,
        target: Pattern::Identifier(name.to_string()),
        value: Box::new(value),
    }
}

/// `name op value`
pub fn assign_op(op: AssignOp, name: &str, value: Expr) -> Expr {
    Expr::Assign {
        op,
        target: Pattern::Identifier(name.to_string()),
        value: Box::new(value),
    }
}

/// `target op value` for an arbitrary pattern target.
pub fn assign_pat(op: AssignOp, target: Pattern, value: Expr) -> Expr {
    Expr::Assign {
        op,
        target,
        value: Box::new(value),
    }
}

/// `target++` / `++target` / ...
pub fn update(op: UpdateOp, prefix: bool, target: Expr) -> Expr {
    Expr::Update {
        op,
        prefix,
        target: Box::new(target),
    }
}

/// `a, b, c`
pub fn seq(exprs: Vec<Expr>) -> Expr {
    Expr::Sequence(exprs)
}

/// Pattern: a bare identifier.
pub fn pat(name: &str) -> Pattern {
    Pattern::Identifier(name.to_string())
}

/// Pattern: `target = default`.
pub fn pat_default(target: Pattern, default: Expr) -> Pattern {
    Pattern::Default {
        target: Box::new(target),
        default: Box::new(default),
    }
}

/// Pattern: `[a, b, ...]` from sub-patterns.
pub fn pat_array(elements: Vec<Pattern>) -> Pattern {
    Pattern::Array(elements.into_iter().map(ArrayPatternElement::Pattern).collect())
}

/// Pattern: `[a, b, ...rest]`.
pub fn pat_array_rest(elements: Vec<Pattern>, rest: Pattern) -> Pattern {
    let mut out: Vec<ArrayPatternElement> = elements
        .into_iter()
        .map(ArrayPatternElement::Pattern)
        .collect();
    out.push(ArrayPatternElement::Rest(rest));
    Pattern::Array(out)
}

/// Pattern: `{a: target, ...}` with fixed keys.
pub fn pat_object(props: Vec<(&str, Pattern)>) -> Pattern {
    Pattern::Object {
        props: props
            .into_iter()
            .map(|(k, v)| ObjectPatternProperty {
                key: PropertyKey::Identifier(k.to_string()),
                value: v,
            })
            .collect(),
        rest: None,
    }
}

/// Pattern: `{a: target, ..., ...rest}`.
pub fn pat_object_rest(props: Vec<(&str, Pattern)>, rest: Pattern) -> Pattern {
    match pat_object(props) {
        Pattern::Object { props, .. } => Pattern::Object {
            props,
            rest: Some(Box::new(rest)),
        },
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_builders_set_flags() {
        let plain = member(ident("o"), "x");
        let optional = opt_member(ident("o"), "x");
        match (plain, optional) {
            (Expr::Member(p), Expr::Member(o)) => {
                assert!(!p.optional && !p.computed);
                assert!(o.optional && !o.computed);
            }
            _ => panic!("expected member expressions"),
        }
    }

    #[test]
    fn pat_array_rest_appends_rest() {
        let p = pat_array_rest(vec![pat("a")], pat("rest"));
        match p {
            Pattern::Array(elements) => {
                assert_eq!(elements.len(), 2);
                assert!(matches!(elements[1], ArrayPatternElement::Rest(_)));
            }
            _ => panic!("expected array pattern"),
        }
    }
}
