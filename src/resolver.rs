use crate::{Deferred, Resolution, Settle};
use std::fmt;
use tracing::trace;

/// The settlement capability of one [`Deferred`].
///
/// Handed to the executor by [`Deferred::new`] or returned by
/// [`Deferred::pending`]. Clones settle the same value; only the first
/// settlement has any effect.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Scheduler, TaskQueue};
///
/// let queue = TaskQueue::new();
/// let (resolver, value) = Deferred::<String, String>::pending(&Scheduler::from(queue.clone()));
/// resolver.fulfill("🍓".into());
/// resolver.reject("too late".into());
/// assert_eq!(queue.run_until_settled(&value), Ok(Ok("🍓".to_string())));
/// ```
pub struct Resolver<T: 'static, E: 'static> {
    deferred: Deferred<T, E>,
}

impl<T: 'static, E: 'static> Clone for Resolver<T, E> {
    fn clone(&self) -> Self {
        Self {
            deferred: self.deferred.clone(),
        }
    }
}

impl<T: 'static, E: 'static> fmt::Debug for Resolver<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver").finish_non_exhaustive()
    }
}

impl<T, E> Resolver<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    pub(crate) fn new(deferred: Deferred<T, E>) -> Self {
        Self { deferred }
    }

    /// Fulfils the value, unless it already settled or is adopting another one.
    pub fn fulfill(&self, value: T) {
        if self.deferred.is_locked() {
            trace!("fulfil ignored, value is adopting a thenable");
            return;
        }
        self.deferred.settle(Ok(value));
    }

    /// Rejects the value, unless it already settled or is adopting another one.
    pub fn reject(&self, reason: E) {
        if self.deferred.is_locked() {
            trace!("reject ignored, value is adopting a thenable");
            return;
        }
        self.deferred.settle(Err(reason));
    }

    /// Settles with anything a handler could return. A nested thenable locks
    /// this value: it settles with the nested outcome and ignores any later
    /// `fulfill`/`reject`.
    pub fn resolve<R>(&self, value: R)
    where
        R: Settle<E, Value = T>,
    {
        match value.into_resolution() {
            Resolution::Fulfilled(value) => self.fulfill(value),
            Resolution::Rejected(reason) => self.reject(reason),
            Resolution::Adopt(thenable) => {
                if !self.deferred.lock() {
                    trace!("adoption ignored, value already settled or locked");
                    return;
                }
                trace!("adopting nested thenable");
                let (on_fulfilled, on_rejected) = (self.deferred.clone(), self.deferred.clone());
                thenable.subscribe(
                    Box::new(move |value| {
                        on_fulfilled.settle(Ok(value));
                    }),
                    Box::new(move |reason| {
                        on_rejected.settle(Err(reason));
                    }),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{Deferred, Scheduler, TaskQueue};

    fn setup() -> (TaskQueue, Scheduler) {
        let queue = TaskQueue::new();
        let scheduler = Scheduler::from(queue.clone());
        (queue, scheduler)
    }

    #[test]
    fn test_resolver_reject() {
        let (queue, scheduler) = setup();
        let (resolver, value) = Deferred::<String, String>::pending(&scheduler);
        resolver.reject("reject!!".into());
        assert_eq!(queue.run_until_settled(&value), Ok(Err("reject!!".to_string())));
    }

    #[test]
    fn test_resolver_settles_once_across_clones() {
        let (queue, scheduler) = setup();
        let (resolver, value) = Deferred::<i32, String>::pending(&scheduler);
        let other = resolver.clone();
        other.reject("first".into());
        resolver.fulfill(1);
        resolver.reject("second".into());
        assert_eq!(queue.run_until_settled(&value), Ok(Err("first".to_string())));
    }

    #[test]
    fn test_resolve_adopts_and_locks() {
        let (queue, scheduler) = setup();
        let (inner_resolver, inner) = Deferred::<i32, String>::pending(&scheduler);
        let (resolver, value) = Deferred::<i32, String>::pending(&scheduler);
        resolver.resolve(inner);
        resolver.fulfill(1);
        resolver.reject("ignored".into());
        assert!(value.is_pending());
        inner_resolver.fulfill(7);
        assert_eq!(queue.run_until_settled(&value), Ok(Ok(7)));
    }

    #[test]
    fn test_resolve_adopts_rejection() {
        let (queue, scheduler) = setup();
        let (resolver, value) = Deferred::<i32, String>::pending(&scheduler);
        resolver.resolve(Deferred::reject(&scheduler, "inner".to_string()));
        assert_eq!(queue.run_until_settled(&value), Ok(Err("inner".to_string())));
    }

    #[test]
    fn test_resolve_with_plain_result() {
        let (queue, scheduler) = setup();
        let (resolver, value) = Deferred::<i32, String>::pending(&scheduler);
        resolver.resolve(Ok(5));
        assert_eq!(queue.run_until_settled(&value), Ok(Ok(5)));
    }
}
