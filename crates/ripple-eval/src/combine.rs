//! Mixed combinator.
//!
//! Turns a sequence of operands, any of which may be streams, into a single
//! resolved sequence. With no stream operands the resolution is immediate;
//! otherwise every stream position is combined latest-wise while plain
//! positions stay pinned to the value they had at evaluation time.

use std::rc::Rc;

use ripple_stream::Observable;

use crate::value::Value;

/// Result of combining a possibly-mixed operand list.
pub enum Combined {
    /// No operand was a stream; positions resolved synchronously.
    Plain(Vec<Value>),
    /// At least one operand was a stream (or `force_stream` was set);
    /// emits the fully resolved operand list.
    Stream(Observable<Vec<Value>>),
}

/// Resolve a mixed operand list.
///
/// The first emission waits until every stream position has produced at
/// least one value. Any stream error fails the combined stream; it
/// completes once every stream position has completed.
pub fn combine_mixed(operands: Vec<Value>, force_stream: bool) -> Combined {
    let stream_at: Vec<bool> = operands.iter().map(Value::is_stream).collect();
    if !stream_at.iter().any(|s| *s) {
        return if force_stream {
            Combined::Stream(Observable::of(operands))
        } else {
            Combined::Plain(operands)
        };
    }

    let sources: Vec<Observable<Value>> = operands
        .iter()
        .filter_map(|v| match v {
            Value::Stream(s) => Some(s.clone()),
            _ => None,
        })
        .collect();
    let template = Rc::new(operands);
    let combined = Observable::combine_latest(sources).map(move |latest| {
        let mut latest = latest.into_iter();
        template
            .iter()
            .map(|slot| match slot {
                Value::Stream(_) => latest.next().unwrap_or(Value::Undefined),
                plain => plain.clone(),
            })
            .collect()
    });
    Combined::Stream(combined)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use ripple_stream::Subject;

    use super::*;

    fn collect(stream: &Observable<Vec<Value>>) -> Rc<RefCell<Vec<Vec<Value>>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        stream.subscribe(move |vals| sink.borrow_mut().push(vals));
        seen
    }

    #[test]
    fn all_plain_resolves_synchronously() {
        let out = combine_mixed(vec![Value::Number(1.0), Value::str("x")], false);
        match out {
            Combined::Plain(vals) => {
                assert_eq!(vals, vec![Value::Number(1.0), Value::str("x")]);
            }
            Combined::Stream(_) => panic!("expected plain resolution"),
        }
    }

    #[test]
    fn force_stream_wraps_plain_input() {
        let out = combine_mixed(vec![Value::Number(1.0)], true);
        let Combined::Stream(stream) = out else {
            panic!("expected stream resolution");
        };
        let seen = collect(&stream);
        assert_eq!(seen.borrow().clone(), vec![vec![Value::Number(1.0)]]);
    }

    #[test]
    fn waits_for_every_stream_position() {
        let a = Subject::new();
        let b = Subject::new();
        let out = combine_mixed(
            vec![
                Value::Number(0.0),
                Value::Stream(a.as_observable()),
                Value::Stream(b.as_observable()),
            ],
            false,
        );
        let Combined::Stream(stream) = out else {
            panic!("expected stream resolution");
        };
        let seen = collect(&stream);
        a.next(Value::Number(1.0));
        assert!(seen.borrow().is_empty());
        b.next(Value::Number(2.0));
        assert_eq!(
            seen.borrow().clone(),
            vec![vec![
                Value::Number(0.0),
                Value::Number(1.0),
                Value::Number(2.0)
            ]]
        );
        a.next(Value::Number(9.0));
        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(seen.borrow()[1][1], Value::Number(9.0));
        assert_eq!(seen.borrow()[1][0], Value::Number(0.0));
    }

    #[test]
    fn plain_positions_stay_pinned() {
        let a = Subject::new();
        let out = combine_mixed(
            vec![Value::str("fixed"), Value::Stream(a.as_observable())],
            false,
        );
        let Combined::Stream(stream) = out else {
            panic!("expected stream resolution");
        };
        let seen = collect(&stream);
        a.next(Value::Number(1.0));
        a.next(Value::Number(2.0));
        for emission in seen.borrow().iter() {
            assert_eq!(emission[0], Value::str("fixed"));
        }
        assert_eq!(seen.borrow().len(), 2);
    }

}
