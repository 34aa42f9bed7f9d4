use thiserror::Error;

/// Errors raised while driving a [`TaskQueue`](crate::TaskQueue).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("task queue drained while the deferred value was still pending")]
    Stalled,
    #[error("task budget of {limit} exhausted before the queue drained")]
    BudgetExhausted { limit: usize },
}

/// Rejection reason of [`any`](crate::any) when every input rejected.
///
/// Carries every rejection reason, in input order.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("All promises were rejected")]
pub struct AggregateError<E> {
    reasons: Vec<E>,
}

impl<E> AggregateError<E> {
    pub fn new(reasons: Vec<E>) -> Self {
        Self { reasons }
    }

    pub fn reasons(&self) -> &[E] {
        &self.reasons
    }

    pub fn into_reasons(self) -> Vec<E> {
        self.reasons
    }
}
