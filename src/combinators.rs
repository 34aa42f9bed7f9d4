//! Aggregating several deferred values into one.
//!
//! Everything here drives its result through [`Deferred::then_with`] on the
//! inputs and never touches their internals.
use crate::{AggregateError, Deferred, Resolver, Scheduler, Settle};
use std::{cell::RefCell, rc::Rc};
use tracing::trace;

/// A value settled from `value`: `Ok` fulfils, `Err` rejects and a nested
/// deferred value is adopted.
pub fn resolve<T, E, R>(scheduler: &Scheduler, value: R) -> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    R: Settle<E, Value = T>,
{
    Deferred::new(scheduler, |resolver| {
        resolver.resolve(value);
        Ok(())
    })
}

/// A value already rejected with `reason`.
pub fn reject<T, E>(scheduler: &Scheduler, reason: E) -> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    Deferred::new(scheduler, |resolver| {
        resolver.reject(reason);
        Ok(())
    })
}

/// Fulfils with every input's value, in input order, once all fulfilled.
/// The first rejection rejects the result. An empty list fulfils with an
/// empty `Vec`.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Scheduler, TaskQueue};
///
/// let queue = TaskQueue::new();
/// let scheduler = Scheduler::from(queue.clone());
/// let both = Deferred::all(
///     &scheduler,
///     vec![
///         Deferred::<i32, String>::resolve(&scheduler, Ok(1)),
///         Deferred::resolve(&scheduler, Ok(2)),
///     ],
/// );
/// assert_eq!(queue.run_until_settled(&both), Ok(Ok(vec![1, 2])));
/// ```
pub fn all<T, E, I>(scheduler: &Scheduler, list: I) -> Deferred<Vec<T>, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Deferred<T, E>>,
{
    let inputs: Vec<_> = list.into_iter().collect();
    Deferred::new(scheduler, move |resolver| {
        if inputs.is_empty() {
            resolver.fulfill(vec![]);
            return Ok(());
        }
        let total = inputs.len();
        let gathered = Rc::new(RefCell::new(Gathered {
            settled: 0,
            slots: vec![None; total],
        }));
        for (index, input) in inputs.iter().enumerate() {
            let gathered = gathered.clone();
            let (on_fulfilled, on_rejected) = (resolver.clone(), resolver.clone());
            input.then_with(
                move |value| {
                    trace!(index, total, "all: input fulfilled");
                    gathered.borrow_mut().record(index, value, total, &on_fulfilled);
                    Ok::<(), E>(())
                },
                move |reason| {
                    trace!(index, "all: input rejected");
                    on_rejected.reject(reason);
                    Ok::<(), E>(())
                },
            );
        }
        Ok(())
    })
}

/// Settles like whichever input settles first. An empty list never settles.
pub fn race<T, E, I>(scheduler: &Scheduler, list: I) -> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Deferred<T, E>>,
{
    let inputs: Vec<_> = list.into_iter().collect();
    Deferred::new(scheduler, move |resolver| {
        for input in &inputs {
            let (on_fulfilled, on_rejected) = (resolver.clone(), resolver.clone());
            input.then_with(
                move |value| {
                    on_fulfilled.fulfill(value);
                    Ok::<(), E>(())
                },
                move |reason| {
                    on_rejected.reject(reason);
                    Ok::<(), E>(())
                },
            );
        }
        Ok(())
    })
}

/// Waits for every input to settle, then fulfils with the value of the first
/// input that fulfilled. If none did, rejects with an [`AggregateError`]
/// holding every reason in input order. An empty list rejects at once.
pub fn any<T, E, I>(scheduler: &Scheduler, list: I) -> Deferred<T, AggregateError<E>>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Deferred<T, E>>,
{
    let inputs: Vec<_> = list.into_iter().collect();
    Deferred::new(scheduler, move |resolver| {
        if inputs.is_empty() {
            resolver.reject(AggregateError::new(vec![]));
            return Ok(());
        }
        let total = inputs.len();
        let tally = Rc::new(RefCell::new(Tally {
            settled: 0,
            first: None,
            reasons: vec![None; total],
        }));
        for (index, input) in inputs.iter().enumerate() {
            let (on_fulfilled, on_rejected) = (tally.clone(), tally.clone());
            let (fulfill_resolver, reject_resolver) = (resolver.clone(), resolver.clone());
            input.then_with(
                move |value| {
                    let mut tally = on_fulfilled.borrow_mut();
                    if tally.first.is_none() {
                        tally.first = Some(value);
                    }
                    tally.settle_one(total, &fulfill_resolver);
                    Ok::<(), E>(())
                },
                move |reason| {
                    let mut tally = on_rejected.borrow_mut();
                    tally.reasons[index] = Some(reason);
                    tally.settle_one(total, &reject_resolver);
                    Ok::<(), E>(())
                },
            );
        }
        Ok(())
    })
}

/// Fulfils with every input's outcome, in input order, once all settled.
/// Never rejects.
pub fn all_settled<T, E, I>(scheduler: &Scheduler, list: I) -> Deferred<Vec<Result<T, E>>, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
    I: IntoIterator<Item = Deferred<T, E>>,
{
    let inputs: Vec<_> = list.into_iter().collect();
    Deferred::new(scheduler, move |resolver| {
        if inputs.is_empty() {
            resolver.fulfill(vec![]);
            return Ok(());
        }
        let total = inputs.len();
        let gathered = Rc::new(RefCell::new(Gathered {
            settled: 0,
            slots: vec![None; total],
        }));
        for (index, input) in inputs.iter().enumerate() {
            let (on_fulfilled, on_rejected) = (gathered.clone(), gathered.clone());
            let (fulfill_resolver, reject_resolver) = (resolver.clone(), resolver.clone());
            input.then_with(
                move |value| {
                    on_fulfilled.borrow_mut().record(index, Ok(value), total, &fulfill_resolver);
                    Ok::<(), E>(())
                },
                move |reason| {
                    on_rejected.borrow_mut().record(index, Err(reason), total, &reject_resolver);
                    Ok::<(), E>(())
                },
            );
        }
        Ok(())
    })
}

/// Positional results of `all` and `all_settled`.
struct Gathered<V> {
    settled: usize,
    slots: Vec<Option<V>>,
}

impl<V: Clone + 'static> Gathered<V> {
    fn record<E>(&mut self, index: usize, value: V, total: usize, resolver: &Resolver<Vec<V>, E>)
    where
        E: Clone + 'static,
    {
        self.slots[index] = Some(value);
        self.settled += 1;
        if self.settled == total {
            resolver.fulfill(self.slots.drain(..).flatten().collect());
        }
    }
}

struct Tally<T, E> {
    settled: usize,
    first: Option<T>,
    reasons: Vec<Option<E>>,
}

impl<T, E> Tally<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    fn settle_one(&mut self, total: usize, resolver: &Resolver<T, AggregateError<E>>) {
        self.settled += 1;
        trace!(settled = self.settled, total, "any: input settled");
        if self.settled < total {
            return;
        }
        match self.first.take() {
            Some(value) => resolver.fulfill(value),
            None => resolver.reject(AggregateError::new(self.reasons.drain(..).flatten().collect())),
        }
    }
}
