//! ripple-stream: a single-threaded, push-based observable runtime.
//!
//! This crate provides the stream primitive the ripple evaluator consumes:
//!
//! - **Observable**: cold push-based producer with the combinators the
//!   evaluator needs (`map`, `switch_map`, `combine_latest`, `take`,
//!   `share_replay`, ...)
//! - **Subject / BehaviorSubject**: hot multicast sources; the behavior
//!   variant replays its latest value to new subscribers
//! - **Subscription**: explicit, transitive cancellation
//!
//! Everything here is `Rc`-based and single-threaded: emission is
//! synchronous with respect to the producer, and "concurrency" is purely
//! cooperative — a value arrives, its callbacks run to completion, control
//! returns. Nothing in this crate is `Send`.
//!
//! Subscriptions do **not** cancel on drop. A producer keeps delivering for
//! as long as it is alive and the subscription has not been explicitly
//! unsubscribed; dropping the handle merely forgets it. This is deliberate:
//! derived streams routinely hand out subscriptions that nobody retains
//! (side-effect-only consumers), and an implicit drop-cancel would silently
//! kill them.

mod error;
mod observable;
mod subject;
mod subscription;

pub use error::StreamError;
pub use observable::{Observable, Subscriber};
pub use subject::{BehaviorSubject, Subject};
pub use subscription::Subscription;
