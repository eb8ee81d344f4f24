//! Idle batching
//!
//! Bursts of notifications are buffered and handed to a processor in one
//! go, during an idle slot chosen by the [`IdleScheduler`].
//!
//! Scheduling rule: a drain is requested only when the queue goes from
//! empty to non-empty. While a drain is pending the queue is non-empty, so
//! no second drain can be requested; this stands in for a lock on the
//! queue. A drain hands over everything queued and leaves the queue empty,
//! whether or not the processor found anything useful. Nothing is carried
//! over to the next drain.
//!
//! The queue is unbounded between idle slots.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::scheduler::IdleScheduler;

pub struct IdleBatcher<T> {
    queue: RefCell<Vec<T>>,
    scheduler: Rc<dyn IdleScheduler>,
    processor: Box<dyn Fn(&[T])>,
    drains_requested: Cell<usize>,
    drains_run: Cell<usize>,
}

impl<T: 'static> IdleBatcher<T> {
    pub fn new<F>(scheduler: Rc<dyn IdleScheduler>, processor: F) -> Rc<Self>
    where
        F: Fn(&[T]) + 'static,
    {
        Rc::new(Self {
            queue: RefCell::new(Vec::new()),
            scheduler,
            processor: Box::new(processor),
            drains_requested: Cell::new(0),
            drains_run: Cell::new(0),
        })
    }

    pub fn enqueue(self: &Rc<Self>, item: T) {
        let was_empty = {
            let mut queue = self.queue.borrow_mut();
            let was_empty = queue.is_empty();
            queue.push(item);
            was_empty
        };

        // Push before scheduling: an immediate scheduler drains right here
        if was_empty {
            self.schedule_drain();
        }
    }

    pub fn enqueue_all<I>(self: &Rc<Self>, items: I)
    where
        I: IntoIterator<Item = T>,
    {
        for item in items {
            self.enqueue(item);
        }
    }

    fn schedule_drain(self: &Rc<Self>) {
        self.drains_requested.set(self.drains_requested.get() + 1);
        tracing::trace!("Requesting idle drain");

        let batcher: Weak<Self> = Rc::downgrade(self);
        self.scheduler.request_idle(Box::new(move || {
            if let Some(batcher) = batcher.upgrade() {
                batcher.drain();
            }
        }));
    }

    /// Only ever called from the scheduled task
    fn drain(&self) {
        let batch = std::mem::take(&mut *self.queue.borrow_mut());
        tracing::debug!("Draining {} queued records", batch.len());

        (self.processor)(&batch);
        self.drains_run.set(self.drains_run.get() + 1);
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn drains_requested(&self) -> usize {
        self.drains_requested.get()
    }

    pub fn drains_run(&self) -> usize {
        self.drains_run.get()
    }

    /// Requested but not yet run. Never more than one.
    pub fn drain_pending(&self) -> bool {
        self.drains_requested.get() > self.drains_run.get()
    }
}

impl<T> fmt::Debug for IdleBatcher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleBatcher")
            .field("queued", &self.queue.borrow().len())
            .field("drains_requested", &self.drains_requested.get())
            .field("drains_run", &self.drains_run.get())
            .finish()
    }
}
