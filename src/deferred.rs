//! The settle-once state machine.
//!
//! A [`Deferred`] starts pending and settles exactly once, to fulfilled or
//! rejected. Continuations registered with [`Deferred::then_with`] and friends
//! are queued on the value's [`Scheduler`] and never run in the same stack
//! frame as the settlement or the registration.
use crate::{combinators, Resolution, Resolver, Scheduler, Settle};
use std::{
    any::Any,
    cell::{Cell, RefCell},
    fmt,
    future::Future,
    mem,
    pin::Pin,
    rc::Rc,
    task::{Context, Poll, Waker},
};
use tracing::trace;

/// Lifecycle of a deferred value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Pending,
    Fulfilled,
    Rejected,
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            State::Pending => f.write_str("pending"),
            State::Fulfilled => f.write_str("fulfilled"),
            State::Rejected => f.write_str("rejected"),
        }
    }
}

type Observer<T, E> = Box<dyn FnOnce(Result<T, E>)>;

struct Inner<T: 'static, E: 'static> {
    outcome: Option<Result<T, E>>,
    observers: Vec<Observer<T, E>>,
    wakers: Vec<Waker>,
    locked: bool,
}

impl<T: 'static, E: 'static> Drop for Inner<T, E> {
    /// Observers own the resolvers of derived values, whose observers own the
    /// next resolvers. Dropping them through a worklist keeps an unsettled
    /// chain of any length from recursing once per link.
    fn drop(&mut self) {
        if !self.observers.is_empty() {
            release(Box::new(mem::take(&mut self.observers)));
        }
    }
}

thread_local! {
    static RELEASING: Cell<bool> = const { Cell::new(false) };
    static RELEASE_QUEUE: RefCell<Vec<Box<dyn Any>>> = const { RefCell::new(Vec::new()) };
}

fn release(garbage: Box<dyn Any>) {
    let Ok(releasing) = RELEASING.try_with(|flag| flag.replace(true)) else {
        return drop(garbage);
    };
    // During thread teardown the closure, and the garbage in it, drops in place.
    let queued = RELEASE_QUEUE
        .try_with(|queue| queue.borrow_mut().push(garbage))
        .is_ok();
    if releasing {
        return;
    }
    // Only the outermost call drains; nested drops just enqueue.
    if queued {
        while let Some(next) = RELEASE_QUEUE.with(|queue| queue.borrow_mut().pop()) {
            drop(next);
        }
    }
    let _ = RELEASING.try_with(|flag| flag.set(false));
}

/// A result that is not known yet.
///
/// Cloning yields another handle to the same value. Awaiting it yields the
/// outcome as a `Result<T, E>`.
///
/// # Examples
///
/// ```
/// use deferred::{Deferred, Scheduler, TaskQueue};
///
/// let queue = TaskQueue::new();
/// let scheduler = Scheduler::from(queue.clone());
/// let four = Deferred::<i32, String>::resolve(&scheduler, Ok(3)).then(|x| Ok(x + 1));
/// assert!(four.is_pending());
/// assert_eq!(queue.run_until_settled(&four), Ok(Ok(4)));
///
/// let recovered = Deferred::<String, String>::reject(&scheduler, "e".into())
///     .catch(|reason| Ok(reason + "!"));
/// assert_eq!(queue.run_until_settled(&recovered), Ok(Ok("e!".to_string())));
/// ```
pub struct Deferred<T: 'static, E: 'static> {
    inner: Rc<RefCell<Inner<T, E>>>,
    scheduler: Scheduler,
}

impl<T: 'static, E: 'static> Clone for Deferred<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<T, E> Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Runs `executor` synchronously with the resolver of a fresh value.
    /// An `Err` returned by the executor rejects the value unless it already
    /// settled.
    pub fn new<F>(scheduler: &Scheduler, executor: F) -> Self
    where
        F: FnOnce(Resolver<T, E>) -> Result<(), E>,
    {
        let (resolver, deferred) = Self::pending(scheduler);
        if let Err(reason) = executor(resolver.clone()) {
            trace!("executor failed, rejecting");
            resolver.reject(reason);
        }
        deferred
    }

    /// An unsettled value together with its resolver.
    pub fn pending(scheduler: &Scheduler) -> (Resolver<T, E>, Self) {
        let deferred = Self {
            inner: Rc::new(RefCell::new(Inner {
                outcome: None,
                observers: vec![],
                wakers: vec![],
                locked: false,
            })),
            scheduler: scheduler.clone(),
        };
        (Resolver::new(deferred.clone()), deferred)
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    pub fn state(&self) -> State {
        match self.inner.borrow().outcome {
            None => State::Pending,
            Some(Ok(_)) => State::Fulfilled,
            Some(Err(_)) => State::Rejected,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.state() == State::Pending
    }

    /// The settled outcome, if any.
    pub fn outcome(&self) -> Option<Result<T, E>> {
        self.inner.borrow().outcome.clone()
    }

    /// Settles the value and queues dispatch of every registered observer.
    /// Returns `false` if it had already settled.
    pub(crate) fn settle(&self, outcome: Result<T, E>) -> bool {
        let (observers, wakers) = {
            let mut inner = self.inner.borrow_mut();
            if inner.outcome.is_some() {
                trace!("settlement ignored, already settled");
                return false;
            }
            inner.outcome = Some(outcome.clone());
            (mem::take(&mut inner.observers), mem::take(&mut inner.wakers))
        };
        trace!(
            state = %self.state(),
            observers = observers.len(),
            wakers = wakers.len(),
            "settled"
        );
        if !wakers.is_empty() {
            self.scheduler.schedule(move || wakers.into_iter().for_each(Waker::wake));
        }
        if !observers.is_empty() {
            self.scheduler.schedule(move || {
                trace!(observers = observers.len(), "dispatching observers");
                for observer in observers {
                    observer(outcome.clone());
                }
            });
        }
        true
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.inner.borrow().locked
    }

    /// Marks the value as adopting a thenable. Returns `false` if it already
    /// settled or was locked before.
    pub(crate) fn lock(&self) -> bool {
        let mut inner = self.inner.borrow_mut();
        if inner.outcome.is_some() || inner.locked {
            return false;
        }
        inner.locked = true;
        true
    }

    fn subscribe(&self, observer: Observer<T, E>) {
        let mut inner = self.inner.borrow_mut();
        match inner.outcome.clone() {
            Some(outcome) => {
                drop(inner);
                trace!("source already settled, queueing observer");
                self.scheduler.schedule(move || observer(outcome));
            }
            None => {
                inner.observers.push(observer);
                trace!(observers = inner.observers.len(), "observer registered");
            }
        }
    }

    /// Derives a new value from this one's outcome.
    ///
    /// Whichever handler matches the outcome runs on a later turn. What it
    /// returns settles the derived value: `Ok` fulfils, `Err` rejects and a
    /// nested [`Deferred`] (or other thenable) is adopted.
    pub fn then_with<U, F, R, G, S>(&self, on_fulfilled: F, on_rejected: G) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        R: Settle<E, Value = U>,
        G: FnOnce(E) -> S + 'static,
        S: Settle<E, Value = U>,
    {
        let (resolver, derived) = Deferred::pending(&self.scheduler);
        self.subscribe(Box::new(move |outcome| {
            let resolution = match outcome {
                Ok(value) => on_fulfilled(value).into_resolution(),
                Err(reason) => on_rejected(reason).into_resolution(),
            };
            resolver.resolve(resolution);
        }));
        derived
    }

    /// Maps the fulfilment value; rejections pass through unchanged.
    pub fn then<U, F, R>(&self, on_fulfilled: F) -> Deferred<U, E>
    where
        U: Clone + 'static,
        F: FnOnce(T) -> R + 'static,
        R: Settle<E, Value = U>,
    {
        self.then_with(on_fulfilled, |reason: E| Resolution::<U, E>::Rejected(reason))
    }

    /// `then` without handlers: settles exactly like `self`.
    pub fn then_default(&self) -> Deferred<T, E> {
        self.then_with(
            |value: T| Resolution::<T, E>::Fulfilled(value),
            |reason: E| Resolution::<T, E>::Rejected(reason),
        )
    }

    /// Handles a rejection; fulfilment values pass through unchanged.
    pub fn catch<G, S>(&self, on_rejected: G) -> Deferred<T, E>
    where
        G: FnOnce(E) -> S + 'static,
        S: Settle<E, Value = T>,
    {
        self.then_with(|value: T| Resolution::<T, E>::Fulfilled(value), on_rejected)
    }

    /// Runs `on_settled` on either outcome, then passes the outcome through.
    pub fn finally<F>(&self, on_settled: F) -> Deferred<T, E>
    where
        F: FnOnce() + 'static,
    {
        let on_fulfilled = Rc::new(Cell::new(Some(on_settled)));
        let on_rejected = on_fulfilled.clone();
        self.then_with(
            move |value: T| {
                if let Some(f) = on_fulfilled.take() {
                    f()
                }
                Resolution::<T, E>::Fulfilled(value)
            },
            move |reason: E| {
                if let Some(f) = on_rejected.take() {
                    f()
                }
                Resolution::<T, E>::Rejected(reason)
            },
        )
    }

    /// See [`combinators::resolve`].
    pub fn resolve<R>(scheduler: &Scheduler, value: R) -> Self
    where
        R: Settle<E, Value = T>,
    {
        combinators::resolve(scheduler, value)
    }

    /// See [`combinators::reject`].
    pub fn reject(scheduler: &Scheduler, reason: E) -> Self {
        combinators::reject(scheduler, reason)
    }

    /// See [`combinators::all`].
    pub fn all<I>(scheduler: &Scheduler, list: I) -> Deferred<Vec<T>, E>
    where
        I: IntoIterator<Item = Self>,
    {
        combinators::all(scheduler, list)
    }

    /// See [`combinators::race`].
    pub fn race<I>(scheduler: &Scheduler, list: I) -> Self
    where
        I: IntoIterator<Item = Self>,
    {
        combinators::race(scheduler, list)
    }

    /// See [`combinators::any`].
    pub fn any<I>(scheduler: &Scheduler, list: I) -> Deferred<T, crate::AggregateError<E>>
    where
        I: IntoIterator<Item = Self>,
    {
        combinators::any(scheduler, list)
    }

    /// See [`combinators::all_settled`].
    pub fn all_settled<I>(scheduler: &Scheduler, list: I) -> Deferred<Vec<Result<T, E>>, E>
    where
        I: IntoIterator<Item = Self>,
    {
        combinators::all_settled(scheduler, list)
    }
}

impl<T, E> fmt::Debug for Deferred<T, E>
where
    T: fmt::Debug + 'static,
    E: fmt::Debug + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Deferred")
            .field("outcome", &inner.outcome)
            .field("observers", &inner.observers.len())
            .field("locked", &inner.locked)
            .finish()
    }
}

impl<T, E> Future for Deferred<T, E>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    type Output = Result<T, E>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let mut inner = self.inner.borrow_mut();
        match inner.outcome {
            Some(ref outcome) => Poll::Ready(outcome.clone()),
            None => {
                if !inner.wakers.iter().any(|waker| waker.will_wake(cx.waker())) {
                    inner.wakers.push(cx.waker().clone());
                }
                Poll::Pending
            }
        }
    }
}
