//! Settle-once deferred values.
//!
//! A [`Deferred`] holds a result that is not known yet. It settles exactly
//! once, to fulfilled or rejected, and notifies every continuation registered
//! with [`Deferred::then`], [`Deferred::then_with`] or [`Deferred::catch`].
//! Continuations always run on a later turn of the injected [`Scheduler`],
//! and a continuation returning another deferred value is flattened.
//!
//! The [`combinators`] build one value out of many: [`all`], [`race`],
//! [`any`] and [`all_settled`].
//!
//! # Examples
//!
//! ```
//! use deferred::{Deferred, Scheduler, TaskQueue};
//!
//! let queue = TaskQueue::new();
//! let scheduler = Scheduler::from(queue.clone());
//! let greeting = Deferred::<String, String>::new(&scheduler, |resolver| {
//!     resolver.fulfill("hello".into());
//!     Ok(())
//! })
//! .then(|s| Ok(s + ", world"));
//! assert_eq!(queue.run_until_settled(&greeting), Ok(Ok("hello, world".to_string())));
//! ```
pub mod combinators;
mod deferred;
mod error;
mod resolution;
mod resolver;
pub mod scheduler;
mod thenable;

pub use combinators::{all, all_settled, any, race};
pub use deferred::{Deferred, State};
pub use error::{AggregateError, Error};
pub use resolution::{Resolution, Settle};
pub use resolver::Resolver;
pub use scheduler::{Schedule, Scheduler, Task, TaskQueue};
pub use thenable::Thenable;
