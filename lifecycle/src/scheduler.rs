//! Cooperative deferred-work queue
//!
//! A task is a boxed closure with a due instant. Nothing runs until the
//! owner calls [`TaskScheduler::run_due`]; each pass takes a snapshot of the
//! tasks due at that moment, so a task scheduled while a pass is running is
//! left for the next pass. That is what "next tick" means in this runtime.

use crate::cancel::{CancellationReason, CancellationSource, CancellationToken, Deadline};
use crate::guard::run_guarded;
use core_types::{Clock, Duration, Instant};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::warn;

type Task = Box<dyn FnOnce()>;

struct Scheduled {
    deadline: Deadline,
    seq: u64,
    token: CancellationToken,
    label: &'static str,
    task: Task,
}

#[derive(Default)]
struct Queue {
    next_seq: u64,
    tasks: Vec<Scheduled>,
}

/// Handle to a scheduled task
#[derive(Debug, Clone)]
pub struct TaskHandle {
    source: CancellationSource,
}

impl TaskHandle {
    /// Prevents the task from running if it has not run yet
    pub fn cancel(&self) {
        self.source.cancel(CancellationReason::Requested);
    }

    /// Cancels with a specific reason
    pub fn cancel_with(&self, reason: CancellationReason) {
        self.source.cancel(reason);
    }

    /// Checks if the task was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }

    /// A token observing this task's cancellation
    pub fn token(&self) -> CancellationToken {
        self.source.token()
    }
}

/// Shared queue of deferred closures
///
/// Clones share one queue.
#[derive(Clone)]
pub struct TaskScheduler {
    clock: Rc<dyn Clock>,
    queue: Rc<RefCell<Queue>>,
}

impl TaskScheduler {
    /// Creates an empty scheduler reading time from `clock`
    pub fn new(clock: Rc<dyn Clock>) -> Self {
        Self {
            clock,
            queue: Rc::new(RefCell::new(Queue::default())),
        }
    }

    /// Current instant of the scheduler's clock
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    /// Schedules `task` to run on the first pass at or after `deadline`
    pub fn schedule_at(
        &self,
        deadline: Deadline,
        label: &'static str,
        task: impl FnOnce() + 'static,
    ) -> TaskHandle {
        let source = CancellationSource::new();
        let mut queue = self.queue.borrow_mut();
        let seq = queue.next_seq;
        queue.next_seq += 1;
        queue.tasks.push(Scheduled {
            deadline,
            seq,
            token: source.token(),
            label,
            task: Box::new(task),
        });
        TaskHandle { source }
    }

    /// Schedules `task` to run `delay` from now
    pub fn schedule_after(
        &self,
        delay: Duration,
        label: &'static str,
        task: impl FnOnce() + 'static,
    ) -> TaskHandle {
        self.schedule_at(Deadline::after(self.now(), delay), label, task)
    }

    /// Schedules `task` for the next pass
    pub fn next_tick(&self, label: &'static str, task: impl FnOnce() + 'static) -> TaskHandle {
        self.schedule_at(Deadline::at(Instant::ZERO), label, task)
    }

    /// Number of tasks still waiting and not cancelled
    pub fn pending(&self) -> usize {
        self.queue
            .borrow()
            .tasks
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .count()
    }

    /// Earliest deadline among live tasks
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue
            .borrow()
            .tasks
            .iter()
            .filter(|t| !t.token.is_cancelled())
            .map(|t| t.deadline.instant())
            .min()
    }

    /// Runs every task due now, in deadline then scheduling order
    ///
    /// Cancelled tasks are discarded. A panicking task is logged and the
    /// pass continues. Returns the number of tasks that ran.
    pub fn run_due(&self) -> usize {
        let now = self.now();
        let mut due = {
            let mut queue = self.queue.borrow_mut();
            queue.tasks.retain(|t| !t.token.is_cancelled());
            let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut queue.tasks)
                .into_iter()
                .partition(|t| t.deadline.has_passed(now));
            queue.tasks = waiting;
            due
        };
        due.sort_by_key(|t| (t.deadline, t.seq));

        let mut ran = 0;
        for scheduled in due {
            // An earlier task in this pass may have cancelled a later one.
            if scheduled.token.is_cancelled() {
                continue;
            }
            ran += 1;
            if let Err(panic) = run_guarded(scheduled.task) {
                warn!(task = scheduled.label, error = %panic, "deferred task panicked");
            }
        }
        ran
    }

    /// Drops every pending task without running it
    pub fn clear(&self) {
        let tasks = std::mem::take(&mut self.queue.borrow_mut().tasks);
        drop(tasks);
    }
}
