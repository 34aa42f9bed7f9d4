#[cfg(test)]
mod tests {
    use deferred::{Deferred, Resolution, Schedule, Scheduler, Task, TaskQueue, Thenable};
    use futures::executor::block_on;
    use std::{cell::Cell, rc::Rc};

    fn setup() -> (TaskQueue, Scheduler) {
        let queue = TaskQueue::new();
        let scheduler = Scheduler::from(queue.clone());
        (queue, scheduler)
    }

    #[test]
    fn test_resolve_then_increment() {
        let (queue, scheduler) = setup();
        let value = Deferred::<i32, String>::resolve(&scheduler, Ok(3)).then(|x| Ok(x + 1));
        assert_eq!(queue.run_until_settled(&value), Ok(Ok(4)));
    }

    #[test]
    fn test_reject_then_catch() {
        let (queue, scheduler) = setup();
        let value = Deferred::<String, String>::reject(&scheduler, "e".into()).catch(|r| Ok(r + "!"));
        assert_eq!(queue.run_until_settled(&value), Ok(Ok("e!".to_string())));
    }

    #[test]
    fn test_all_of_resolved() {
        let (queue, scheduler) = setup();
        let value = deferred::all(
            &scheduler,
            vec![
                Deferred::<i32, String>::resolve(&scheduler, Ok(1)),
                Deferred::resolve(&scheduler, Ok(2)),
            ],
        );
        assert_eq!(queue.run_until_settled(&value), Ok(Ok(vec![1, 2])));
    }

    #[test]
    fn test_rejection_skips_until_handled() {
        let (queue, scheduler) = setup();
        let value = Deferred::<i32, String>::reject(&scheduler, "boom".into())
            .then(|x| Ok(x + 1))
            .then(|x| Ok(x * 2))
            .catch(|reason| Ok(reason.len() as i32))
            .then(|x| Ok(x + 100));
        assert_eq!(queue.run_until_settled(&value), Ok(Ok(104)));
    }

    #[test]
    fn test_await_settled_value() {
        let (queue, scheduler) = setup();
        let value = Deferred::<i32, String>::resolve(&scheduler, Ok(20)).then(|x| Ok(x + 22));
        queue.run().unwrap();
        assert_eq!(block_on(value), Ok(42));
    }

    /// A foreign thenable that is already known.
    struct Ready(i32);

    impl Thenable<i32, String> for Ready {
        fn subscribe(self: Box<Self>, on_fulfilled: Box<dyn FnOnce(i32)>, _on_rejected: Box<dyn FnOnce(String)>) {
            on_fulfilled(self.0)
        }
    }

    #[test]
    fn test_foreign_thenable_is_adopted() {
        let (queue, scheduler) = setup();
        let value = Deferred::<i32, String>::resolve(&scheduler, Ok(1))
            .then(|x| Resolution::<i32, String>::Adopt(Box::new(Ready(x + 1))));
        assert_eq!(queue.run_until_settled(&value), Ok(Ok(2)));
    }

    /// Counts the tasks it forwards to an inner queue.
    struct Counting {
        queue: TaskQueue,
        scheduled: Rc<Cell<usize>>,
    }

    impl Schedule for Counting {
        fn schedule(&self, task: Task) {
            self.scheduled.set(self.scheduled.get() + 1);
            self.queue.schedule(task);
        }
    }

    #[test]
    fn test_custom_scheduler_is_inherited_by_derived_values() {
        let queue = TaskQueue::new();
        let scheduled = Rc::new(Cell::new(0));
        let scheduler = Scheduler::new(Counting {
            queue: queue.clone(),
            scheduled: scheduled.clone(),
        });
        let value = Deferred::<i32, String>::resolve(&scheduler, Ok(1))
            .then(|x| Ok(x + 1))
            .then(|x| Ok(x + 1));
        assert_eq!(queue.run_until_settled(&value), Ok(Ok(3)));
        assert!(scheduled.get() >= 2);
    }

    #[test]
    fn test_budget_limits_driver() {
        let queue = TaskQueue::with_budget(1);
        let scheduler = Scheduler::from(queue.clone());
        let value = Deferred::<i32, String>::resolve(&scheduler, Ok(1))
            .then(|x| Ok(x + 1))
            .then(|x| Ok(x + 1));
        assert_eq!(
            queue.run_until_settled(&value),
            Err(deferred::Error::BudgetExhausted { limit: 1 })
        );
    }
}
