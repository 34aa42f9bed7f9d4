//! What a handler hands back to the chain.
use crate::{Deferred, Thenable};
use std::fmt;

/// The outcome a continuation produces: a value, a rejection, or a nested
/// thenable whose eventual outcome should be adopted.
pub enum Resolution<T, E> {
    Fulfilled(T),
    Rejected(E),
    Adopt(Box<dyn Thenable<T, E>>),
}

impl<T: fmt::Debug, E: fmt::Debug> fmt::Debug for Resolution<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Fulfilled(value) => f.debug_tuple("Fulfilled").field(value).finish(),
            Resolution::Rejected(reason) => f.debug_tuple("Rejected").field(reason).finish(),
            Resolution::Adopt(_) => f.write_str("Adopt(..)"),
        }
    }
}

impl<T, E> From<Result<T, E>> for Resolution<T, E> {
    fn from(result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Resolution::Fulfilled(value),
            Err(reason) => Resolution::Rejected(reason),
        }
    }
}

/// Anything a handler may return.
///
/// `Ok` fulfils and `Err` rejects the derived value; a [`Deferred`] or other
/// boxed [`Thenable`] is adopted.
pub trait Settle<E> {
    type Value;

    fn into_resolution(self) -> Resolution<Self::Value, E>;
}

impl<T, E> Settle<E> for Resolution<T, E> {
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        self
    }
}

impl<T, E> Settle<E> for Result<T, E> {
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        self.into()
    }
}

impl<T, E> Settle<E> for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        Resolution::Adopt(Box::new(self))
    }
}

impl<T, E> Settle<E> for Box<dyn Thenable<T, E>> {
    type Value = T;

    fn into_resolution(self) -> Resolution<T, E> {
        Resolution::Adopt(self)
    }
}
