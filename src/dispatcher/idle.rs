//! Idle task queue
//!
//! Each idle opportunity runs a snapshot of the queue exactly once. Tasks
//! queued while the snapshot runs (including tasks asking to repeat) wait for
//! the next opportunity, so nothing runs twice in one opportunity.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

/// What an idle task wants after it ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleAction {
    /// Remove the task
    Done,
    /// Run again on the next idle opportunity
    Repeat,
}

/// Type alias for an idle task
pub type IdleTask = Box<dyn FnMut() -> IdleAction + Send>;

/// Queue of tasks that run when the event loop has no pending input
#[derive(Default)]
pub struct IdleQueue {
    tasks: Mutex<Vec<IdleTask>>,
    requested: AtomicBool,
}

impl std::fmt::Debug for IdleQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleQueue")
            .field("pending", &self.len())
            .field("requested", &self.is_requested())
            .finish()
    }
}

impl IdleQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a task for the next idle opportunity; callable from any thread
    pub fn add(&self, task: IdleTask) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.push(task);
        }
        self.request();
    }

    /// Ask for an idle opportunity; requests made before it happens coalesce
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().map(|t| t.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run one idle opportunity; returns the number of tasks run
    pub fn run_opportunity(&self) -> usize {
        self.requested.store(false, Ordering::SeqCst);
        let batch: Vec<IdleTask> = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(_) => return 0,
        };

        let count = batch.len();
        let mut repeat = Vec::new();
        for mut task in batch {
            if task() == IdleAction::Repeat {
                repeat.push(task);
            }
        }

        if !repeat.is_empty() {
            if let Ok(mut tasks) = self.tasks.lock() {
                // Repeating tasks keep their place ahead of tasks added during this run.
                repeat.append(&mut tasks);
                *tasks = repeat;
            }
        }
        count
    }

    /// Drop every queued task
    pub fn clear(&self) {
        if let Ok(mut tasks) = self.tasks.lock() {
            tasks.clear();
        }
        self.requested.store(false, Ordering::SeqCst);
    }
}
