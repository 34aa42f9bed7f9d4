//! The scheduling service every deferred value defers its continuations to.
//!
//! A [`Schedule`] implementation must run each task after the caller's
//! synchronous work has finished, in the order the tasks were scheduled. The
//! crate never runs a continuation any other way.
//!
//! [`TaskQueue`] is a manual FIFO implementation: nothing runs until the owner
//! turns the queue, which makes it the natural driver for tests and for
//! embedding in a host event loop.
use crate::{Deferred, Error};
use std::{
    cell::RefCell,
    collections::VecDeque,
    fmt,
    rc::{Rc, Weak},
};
use tracing::{debug, trace};

/// A unit of deferred work.
pub type Task = Box<dyn FnOnce()>;

/// Runs tasks on a later turn, preserving the order they were handed over.
pub trait Schedule {
    fn schedule(&self, task: Task);
}

/// Shared handle to a [`Schedule`] service. Every derived deferred value
/// inherits the scheduler of the value it was derived from.
#[derive(Clone)]
pub struct Scheduler {
    service: Rc<dyn Schedule>,
}

impl Scheduler {
    pub fn new<S: Schedule + 'static>(service: S) -> Self {
        Self {
            service: Rc::new(service),
        }
    }

    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.service.schedule(Box::new(task))
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler").finish_non_exhaustive()
    }
}

/// The scheduler holds the queue weakly: queued tasks own deferred values,
/// which own this scheduler. Tasks scheduled after the last `TaskQueue`
/// handle is dropped are discarded.
impl From<TaskQueue> for Scheduler {
    fn from(queue: TaskQueue) -> Self {
        Scheduler::new(QueueRef(Rc::downgrade(&queue.inner)))
    }
}

struct QueueRef(Weak<Inner>);

impl Schedule for QueueRef {
    fn schedule(&self, task: Task) {
        match self.0.upgrade() {
            Some(inner) => inner.tasks.borrow_mut().push_back(task),
            None => trace!("task queue dropped, discarding task"),
        }
    }
}

/// A manually driven FIFO task queue.
///
/// # Examples
///
/// ```
/// use deferred::{Scheduler, TaskQueue};
/// use std::{cell::Cell, rc::Rc};
///
/// let queue = TaskQueue::new();
/// let scheduler = Scheduler::from(queue.clone());
/// let ran = Rc::new(Cell::new(false));
/// let flag = ran.clone();
/// scheduler.schedule(move || flag.set(true));
/// assert!(!ran.get());
/// assert_eq!(queue.run(), Ok(1));
/// assert!(ran.get());
/// ```
#[derive(Clone)]
pub struct TaskQueue {
    inner: Rc<Inner>,
}

struct Inner {
    tasks: RefCell<VecDeque<Task>>,
    budget: Option<usize>,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                tasks: RefCell::new(VecDeque::new()),
                budget: None,
            }),
        }
    }

    /// A queue whose `run` and `run_until_settled` give up after `max_tasks`
    /// tasks with [`Error::BudgetExhausted`].
    pub fn with_budget(max_tasks: usize) -> Self {
        Self {
            inner: Rc::new(Inner {
                tasks: RefCell::new(VecDeque::new()),
                budget: Some(max_tasks),
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.tasks.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.tasks.borrow().is_empty()
    }

    /// Runs the oldest task. Returns `false` if the queue was empty.
    pub fn run_next(&self) -> bool {
        // The borrow must end before the task runs; tasks schedule more tasks.
        let task = self.inner.tasks.borrow_mut().pop_front();
        match task {
            Some(task) => {
                trace!(remaining = self.len(), "running task");
                task();
                true
            }
            None => false,
        }
    }

    /// Runs tasks, including the ones scheduled along the way, until the queue
    /// is empty. Returns how many ran.
    pub fn run(&self) -> Result<usize, Error> {
        let mut ran = 0;
        loop {
            self.check_budget(ran)?;
            if !self.run_next() {
                return Ok(ran);
            }
            ran += 1;
        }
    }

    /// Turns the queue until `deferred` settles and returns its outcome.
    pub fn run_until_settled<T, E>(&self, deferred: &Deferred<T, E>) -> Result<Result<T, E>, Error>
    where
        T: Clone + 'static,
        E: Clone + 'static,
    {
        let mut ran = 0;
        loop {
            if let Some(outcome) = deferred.outcome() {
                return Ok(outcome);
            }
            self.check_budget(ran)?;
            if !self.run_next() {
                debug!(ran, "task queue drained with the value still pending");
                return Err(Error::Stalled);
            }
            ran += 1;
        }
    }

    fn check_budget(&self, ran: usize) -> Result<(), Error> {
        match self.inner.budget {
            Some(limit) if ran >= limit && !self.is_empty() => {
                debug!(limit, pending = self.len(), "task budget exhausted");
                Err(Error::BudgetExhausted { limit })
            }
            _ => Ok(()),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskQueue")
            .field("len", &self.len())
            .field("budget", &self.inner.budget)
            .finish()
    }
}

impl Schedule for TaskQueue {
    fn schedule(&self, task: Task) {
        self.inner.tasks.borrow_mut().push_back(task);
    }
}
