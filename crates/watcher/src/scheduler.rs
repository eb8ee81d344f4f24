//! Idle scheduling
//!
//! The batcher never runs its drain inline; it asks an [`IdleScheduler`] to
//! run it "when the host is idle". The host decides when that is, and may
//! put it off for as long as it likes. There is no cancellation and no
//! deadline: a task, once handed over, runs to completion.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

/// A no-argument callback for the next idle opportunity
pub type IdleTask = Box<dyn FnOnce()>;

pub trait IdleScheduler {
    fn request_idle(&self, task: IdleTask);
}

/// Runs every task synchronously, inside `request_idle`
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateScheduler;

impl IdleScheduler for ImmediateScheduler {
    fn request_idle(&self, task: IdleTask) {
        task();
    }
}

/// Holds tasks until the caller declares an idle period.
///
/// Clones share the same task queue.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    tasks: Rc<RefCell<VecDeque<IdleTask>>>,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Tasks waiting for an idle period
    pub fn pending(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Run the tasks queued right now. Tasks they schedule wait for the
    /// next call. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let batch = std::mem::take(&mut *self.tasks.borrow_mut());
        let count = batch.len();
        for task in batch {
            task();
        }
        count
    }
}

impl IdleScheduler for ManualScheduler {
    fn request_idle(&self, task: IdleTask) {
        self.tasks.borrow_mut().push_back(task);
    }
}

/// Defers tasks onto the current tokio [`LocalSet`](tokio::task::LocalSet).
///
/// The task yields to the runtime once before running, so whatever the
/// host already had queued goes first. Must be used from inside a
/// `LocalSet`; `spawn_local` panics anywhere else.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioIdleScheduler;

impl IdleScheduler for TokioIdleScheduler {
    fn request_idle(&self, task: IdleTask) {
        tokio::task::spawn_local(async move {
            tokio::task::yield_now().await;
            task();
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn test_immediate_runs_inline() {
        let ran = Rc::new(Cell::new(0));
        let counter = ran.clone();
        ImmediateScheduler.request_idle(Box::new(move || counter.set(counter.get() + 1)));
        assert_eq!(ran.get(), 1);
    }

    #[test]
    fn test_manual_defers_until_run() {
        let scheduler = ManualScheduler::new();
        let ran = Rc::new(Cell::new(false));
        let flag = ran.clone();

        scheduler.request_idle(Box::new(move || flag.set(true)));
        assert_eq!(scheduler.pending(), 1);
        assert!(!ran.get());

        assert_eq!(scheduler.run_pending(), 1);
        assert!(ran.get());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_manual_tasks_scheduled_while_running_wait() {
        let scheduler = ManualScheduler::new();
        let inner = scheduler.clone();
        let ran = Rc::new(Cell::new(0));
        let counter = ran.clone();

        scheduler.request_idle(Box::new(move || {
            let counter = counter.clone();
            inner.request_idle(Box::new(move || counter.set(counter.get() + 1)));
        }));

        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(ran.get(), 0);
        assert_eq!(scheduler.run_pending(), 1);
        assert_eq!(ran.get(), 1);
    }

    #[tokio::test]
    async fn test_tokio_scheduler_defers() {
        let local = tokio::task::LocalSet::new();
        local
            .run_until(async {
                let ran = Rc::new(Cell::new(false));
                let flag = ran.clone();
                TokioIdleScheduler.request_idle(Box::new(move || flag.set(true)));
                assert!(!ran.get());

                for _ in 0..32 {
                    if ran.get() {
                        break;
                    }
                    tokio::task::yield_now().await;
                }
                assert!(ran.get());
            })
            .await;
    }
}
