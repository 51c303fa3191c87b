use crate::cancel::CancellationReason;
use crate::scheduler::{TaskHandle, TaskScheduler};
use core_types::Duration;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Collapses a burst of calls into one deferred run of the latest closure
///
/// Each [`call`](Debouncer::call) cancels whatever is still pending and
/// schedules the new closure `delay` from now. Typical use is a search box
/// that should query once the user stops typing.
pub struct Debouncer {
    scheduler: TaskScheduler,
    delay: Duration,
    label: &'static str,
    pending: RefCell<Option<(TaskHandle, Rc<Cell<bool>>)>>,
}

impl Debouncer {
    /// Creates a debouncer on `scheduler`
    pub fn new(scheduler: TaskScheduler, delay: Duration, label: &'static str) -> Self {
        Self {
            scheduler,
            delay,
            label,
            pending: RefCell::new(None),
        }
    }

    /// Replaces the pending closure with `task`
    pub fn call(&self, task: impl FnOnce() + 'static) {
        let fired = Rc::new(Cell::new(false));
        let flag = Rc::clone(&fired);
        let handle = self.scheduler.schedule_after(self.delay, self.label, move || {
            flag.set(true);
            task();
        });
        if let Some((previous, _)) = self.pending.replace(Some((handle, fired))) {
            previous.cancel_with(CancellationReason::Superseded);
        }
    }

    /// Drops the pending closure, if any
    pub fn cancel(&self) {
        if let Some((previous, _)) = self.pending.take() {
            previous.cancel();
        }
    }

    /// True while a closure is waiting to run
    pub fn is_pending(&self) -> bool {
        match self.pending.borrow().as_ref() {
            Some((handle, fired)) => !handle.is_cancelled() && !fired.get(),
            None => false,
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
