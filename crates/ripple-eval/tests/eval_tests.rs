//! Static expression semantics: everything here runs on plain input, where
//! the reactive evaluator must behave exactly like the static one.

#![allow(clippy::unwrap_used)]

use ripple_ast::build;
use ripple_ast::{AssignOp, BinaryOp, Expr, LogicalOp, UnaryOp, UpdateOp};
use ripple_eval::{evaluate, Context, EvalError, ReactiveEval, Rules, StaticEval, Value};
use rstest::rstest;

fn ctx_with(entries: Vec<(&str, Value)>) -> Context {
    let ctx = Context::new();
    for (name, value) in entries {
        ctx.define(name, value);
    }
    ctx
}

#[test]
fn literals_and_identifiers() {
    let ctx = ctx_with(vec![("x", Value::Number(7.0))]);
    assert_eq!(evaluate(&build::num(1.5), &ctx).unwrap(), Value::Number(1.5));
    assert_eq!(evaluate(&build::str("hi"), &ctx).unwrap(), Value::str("hi"));
    assert_eq!(evaluate(&build::null(), &ctx).unwrap(), Value::Null);
    assert_eq!(evaluate(&build::ident("x"), &ctx).unwrap(), Value::Number(7.0));
    // Unbound names read as undefined rather than erroring.
    assert_eq!(evaluate(&build::ident("nope"), &ctx).unwrap(), Value::Undefined);
}

#[rstest]
#[case(build::binary(BinaryOp::Add, build::num(2.0), build::num(3.0)), Value::Number(5.0))]
#[case(build::binary(BinaryOp::Add, build::str("n="), build::num(2.0)), Value::str("n=2"))]
#[case(build::binary(BinaryOp::StrictEq, build::num(1.0), build::str("1")), Value::Bool(false))]
#[case(build::binary(BinaryOp::Eq, build::num(1.0), build::str("1")), Value::Bool(true))]
#[case(build::unary(UnaryOp::Not, build::num(0.0)), Value::Bool(true))]
#[case(build::unary(UnaryOp::TypeOf, build::ident("missing")), Value::str("undefined"))]
#[case(build::cond(build::bool(true), build::num(1.0), build::num(2.0)), Value::Number(1.0))]
#[case(build::logical(LogicalOp::Or, build::num(0.0), build::str("fallback")), Value::str("fallback"))]
#[case(build::logical(LogicalOp::Nullish, build::num(0.0), build::str("no")), Value::Number(0.0))]
fn operator_smoke(#[case] expr: Expr, #[case] expected: Value) {
    assert_eq!(evaluate(&expr, &Context::new()).unwrap(), expected);
}

#[test]
fn logical_short_circuit_skips_right_side_effects() {
    let ctx = ctx_with(vec![("a", Value::Number(0.0))]);
    let bump = build::update(UpdateOp::Incr, false, build::ident("a"));
    let expr = build::logical(LogicalOp::And, build::bool(false), bump);
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Bool(false));
    assert_eq!(ctx.get("a"), Some(Value::Number(0.0)));
}

#[test]
fn member_access_and_optional_chaining() {
    let obj = Value::object(vec![("a".into(), Value::Number(1.0))]);
    let ctx = ctx_with(vec![("o", obj), ("missing", Value::Undefined)]);

    assert_eq!(
        evaluate(&build::member(build::ident("o"), "a"), &ctx).unwrap(),
        Value::Number(1.0)
    );
    assert_eq!(
        evaluate(&build::opt_member(build::ident("missing"), "a"), &ctx).unwrap(),
        Value::Undefined
    );
    assert!(matches!(
        evaluate(&build::member(build::ident("missing"), "a"), &ctx),
        Err(EvalError::Type(_))
    ));
}

#[test]
fn optional_chain_short_circuits_key_side_effects() {
    let ctx = ctx_with(vec![("a", Value::Number(0.0)), ("missing", Value::Null)]);
    let bump = build::update(UpdateOp::Incr, false, build::ident("a"));
    let expr = build::opt_index(build::ident("missing"), bump);
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Undefined);
    assert_eq!(ctx.get("a"), Some(Value::Number(0.0)));
}

#[test]
fn optional_call_short_circuits_argument_side_effects() {
    let ctx = ctx_with(vec![("o", Value::object(vec![])), ("a", Value::Number(0.0))]);
    let bump = build::update(UpdateOp::Incr, false, build::ident("a"));
    // o.f?.(a++) with f missing: neither rule set runs the argument.
    let expr = build::opt_call(build::member(build::ident("o"), "f"), vec![bump]);

    assert_eq!(ReactiveEval::new().eval(&expr, &ctx).unwrap(), Value::Undefined);
    assert_eq!(ctx.get("a"), Some(Value::Number(0.0)));

    assert_eq!(StaticEval.eval(&expr, &ctx).unwrap(), Value::Undefined);
    assert_eq!(ctx.get("a"), Some(Value::Number(0.0)));
}

#[test]
fn array_and_object_literals() {
    let ctx = ctx_with(vec![
        ("xs", Value::array(vec![Value::Number(2.0), Value::Number(3.0)])),
        ("k", Value::str("computed")),
    ]);
    let arr = Expr::Array(vec![
        ripple_ast::ArrayElement::Expr(build::num(1.0)),
        ripple_ast::ArrayElement::Spread(build::ident("xs")),
        ripple_ast::ArrayElement::Hole,
    ]);
    assert_eq!(
        evaluate(&arr, &ctx).unwrap(),
        Value::array(vec![
            Value::Number(1.0),
            Value::Number(2.0),
            Value::Number(3.0),
            Value::Undefined,
        ])
    );

    let obj = Expr::Object(vec![
        ripple_ast::ObjectProperty::KeyValue {
            key: ripple_ast::PropertyKey::Identifier("a".into()),
            value: build::num(1.0),
        },
        ripple_ast::ObjectProperty::KeyValue {
            key: ripple_ast::PropertyKey::Computed(build::ident("k")),
            value: build::num(2.0),
        },
        ripple_ast::ObjectProperty::Shorthand("k".into()),
    ]);
    let out = evaluate(&obj, &ctx).unwrap();
    let Value::Object(o) = out else { panic!("expected object") };
    assert_eq!(o.get("a"), Some(Value::Number(1.0)));
    assert_eq!(o.get("computed"), Some(Value::Number(2.0)));
    assert_eq!(o.get("k"), Some(Value::str("computed")));
}

#[test]
fn calls_bind_this_and_spread_args() {
    let ctx = ctx_with(vec![(
        "xs",
        Value::array(vec![Value::Number(1.0), Value::Number(2.0), Value::Number(3.0)]),
    )]);
    // xs.slice(...[1]) -> [2, 3]
    let expr = Expr::Call {
        callee: Box::new(build::member(build::ident("xs"), "slice")),
        args: vec![ripple_ast::Argument::Spread(build::array(vec![build::num(
            1.0,
        )]))],
        optional: false,
        short_circuited: false,
    };
    assert_eq!(
        evaluate(&expr, &ctx).unwrap(),
        Value::array(vec![Value::Number(2.0), Value::Number(3.0)])
    );
}

#[test]
fn optional_call_on_missing_function() {
    let ctx = ctx_with(vec![("o", Value::object(vec![]))]);
    let expr = build::opt_call(build::member(build::ident("o"), "f"), vec![]);
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Undefined);

    let strict = build::call(build::member(build::ident("o"), "f"), vec![]);
    assert!(matches!(
        evaluate(&strict, &ctx),
        Err(EvalError::NotAFunction(_))
    ));
}

#[test]
fn arrow_functions_close_over_scope() {
    let ctx = ctx_with(vec![("base", Value::Number(10.0))]);
    // add = (x, y = 1) => base + x + y
    let f = build::arrow_pat(
        vec![
            build::pat("x"),
            build::pat_default(build::pat("y"), build::num(1.0)),
        ],
        build::binary(
            BinaryOp::Add,
            build::binary(BinaryOp::Add, build::ident("base"), build::ident("x")),
            build::ident("y"),
        ),
    );
    evaluate(&build::assign("add", f), &ctx).unwrap();
    let call = build::call(build::ident("add"), vec![build::num(5.0)]);
    assert_eq!(evaluate(&call, &ctx).unwrap(), Value::Number(16.0));
    let call2 = build::call(build::ident("add"), vec![build::num(5.0), build::num(2.0)]);
    assert_eq!(evaluate(&call2, &ctx).unwrap(), Value::Number(17.0));
}

#[test]
fn arrow_params_shadow_without_leaking() {
    let ctx = ctx_with(vec![("x", Value::Number(1.0))]);
    let f = build::arrow(vec!["x"], build::ident("x"));
    evaluate(&build::assign("f", f), &ctx).unwrap();
    let call = build::call(build::ident("f"), vec![build::num(9.0)]);
    assert_eq!(evaluate(&call, &ctx).unwrap(), Value::Number(9.0));
    assert_eq!(ctx.get("x"), Some(Value::Number(1.0)));
}

#[test]
fn assignment_forms() {
    let ctx = ctx_with(vec![("a", Value::Number(1.0))]);
    assert_eq!(
        evaluate(&build::assign_op(AssignOp::Add, "a", build::num(4.0)), &ctx).unwrap(),
        Value::Number(5.0)
    );
    assert_eq!(ctx.get("a"), Some(Value::Number(5.0)));

    let obj = Value::object(vec![]);
    ctx.define("o", obj);
    let target = ripple_ast::Pattern::Member(ripple_ast::MemberExpr {
        object: Box::new(build::ident("o")),
        property: Box::new(build::ident("k")),
        computed: false,
        optional: false,
        short_circuited: false,
    });
    evaluate(&build::assign_pat(AssignOp::Assign, target, build::num(3.0)), &ctx).unwrap();
    let Some(Value::Object(o)) = ctx.get("o") else { panic!() };
    assert_eq!(o.get("k"), Some(Value::Number(3.0)));
}

#[test]
fn update_expressions() {
    let ctx = ctx_with(vec![("n", Value::Number(1.0))]);
    assert_eq!(
        evaluate(&build::update(UpdateOp::Incr, false, build::ident("n")), &ctx).unwrap(),
        Value::Number(1.0)
    );
    assert_eq!(
        evaluate(&build::update(UpdateOp::Incr, true, build::ident("n")), &ctx).unwrap(),
        Value::Number(3.0)
    );
    assert_eq!(ctx.get("n"), Some(Value::Number(3.0)));
}

#[test]
fn array_destructuring_with_defaults_and_rest() {
    let ctx = Context::new();
    let source = Value::array(vec![
        Value::Number(1.0),
        Value::Undefined,
        Value::Number(3.0),
        Value::Number(4.0),
    ]);
    ctx.define("src", source);
    let target = build::pat_array_rest(
        vec![
            build::pat("a"),
            build::pat_default(build::pat("b"), build::num(10.0)),
        ],
        build::pat("rest"),
    );
    evaluate(
        &build::assign_pat(AssignOp::Assign, target, build::ident("src")),
        &ctx,
    )
    .unwrap();
    assert_eq!(ctx.get("a"), Some(Value::Number(1.0)));
    assert_eq!(ctx.get("b"), Some(Value::Number(10.0)));
    assert_eq!(
        ctx.get("rest"),
        Some(Value::array(vec![Value::Number(3.0), Value::Number(4.0)]))
    );
}

#[test]
fn object_destructuring_with_rename_and_rest() {
    let ctx = Context::new();
    ctx.define(
        "src",
        Value::object(vec![
            ("x".into(), Value::Number(1.0)),
            ("y".into(), Value::Number(2.0)),
            ("z".into(), Value::Number(3.0)),
        ]),
    );
    let target = build::pat_object_rest(
        vec![("x", build::pat("x")), ("y", build::pat("renamed"))],
        build::pat("others"),
    );
    evaluate(
        &build::assign_pat(AssignOp::Assign, target, build::ident("src")),
        &ctx,
    )
    .unwrap();
    assert_eq!(ctx.get("x"), Some(Value::Number(1.0)));
    assert_eq!(ctx.get("renamed"), Some(Value::Number(2.0)));
    assert_eq!(
        ctx.get("others"),
        Some(Value::object(vec![("z".into(), Value::Number(3.0))]))
    );
}

#[test]
fn destructuring_rejects_bad_sources() {
    let ctx = Context::new();
    let arr_target = build::pat_array(vec![build::pat("a")]);
    assert_eq!(
        evaluate(
            &build::assign_pat(AssignOp::Assign, arr_target, build::num(5.0)),
            &ctx
        ),
        Err(EvalError::NotIterable)
    );
    let obj_target = build::pat_object(vec![("a", build::pat("a"))]);
    assert_eq!(
        evaluate(
            &build::assign_pat(AssignOp::Assign, obj_target, build::null()),
            &ctx
        ),
        Err(EvalError::NotObjectCoercible)
    );
}

#[test]
fn string_destructuring() {
    let ctx = Context::new();
    ctx.define("s", Value::str("ab"));
    let target = build::pat_array(vec![build::pat("first"), build::pat("second")]);
    evaluate(
        &build::assign_pat(AssignOp::Assign, target, build::ident("s")),
        &ctx,
    )
    .unwrap();
    assert_eq!(ctx.get("first"), Some(Value::str("a")));
    assert_eq!(ctx.get("second"), Some(Value::str("b")));
}

#[test]
fn sequences_yield_last_value() {
    let ctx = ctx_with(vec![("a", Value::Number(0.0))]);
    let expr = build::seq(vec![
        build::assign("a", build::num(5.0)),
        build::binary(BinaryOp::Mul, build::ident("a"), build::num(2.0)),
    ]);
    assert_eq!(evaluate(&expr, &ctx).unwrap(), Value::Number(10.0));
}

/// On fully plain input the reactive and static rules must agree exactly.
#[rstest]
#[case(build::binary(BinaryOp::Add, build::num(1.0), build::num(2.0)))]
#[case(build::cond(build::str(""), build::num(1.0), build::num(2.0)))]
#[case(build::logical(LogicalOp::And, build::bool(true), build::str("r")))]
#[case(build::index(build::array(vec![build::num(4.0)]), build::num(0.0)))]
#[case(build::call(build::arrow(vec!["x"], build::ident("x")), vec![build::num(3.0)]))]
#[case(build::seq(vec![build::assign("t", build::num(1.0)), build::ident("t")]))]
fn plain_input_regression(#[case] expr: Expr) {
    let reactive = ReactiveEval::new().eval(&expr, &Context::new()).unwrap();
    let static_out = StaticEval.eval(&expr, &Context::new()).unwrap();
    assert_eq!(reactive, static_out);
}
