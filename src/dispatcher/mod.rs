//! UI-thread dispatcher
//!
//! Every UI thread owns exactly one [`Dispatcher`]. Controls capture the
//! dispatcher of the thread that created them and refuse mutation from any
//! other thread. Work reaches the UI thread through the dispatcher's FIFO
//! operation queue, which any thread may post to.
//!
//! The dispatcher also holds the per-thread UI context: the active
//! [`NativePlatform`], the set of attached controls (used to switch backends at
//! runtime), the idle queue, keyboard focus and the unhandled-error policy.

mod idle;
mod input;


use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, RwLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use futures::channel::oneshot;

use crate::application::UnhandledExceptionMode;
use crate::control::{Control, ControlId, WeakControl};
use crate::events::{LogItemKind, LogSink};
use crate::platform::{self, NativePlatform};
use crate::{Error, Result};

pub use idle::{IdleAction, IdleQueue, IdleTask};
pub use input::{InputManager, NativeInput};

/// Operation queued for the UI thread
type Operation = Box<dyn FnOnce() + Send>;

/// Callback shown errors under [`UnhandledExceptionMode::ShowDiagnostic`]
pub type DiagnosticHook = Arc<dyn Fn(&Error) + Send + Sync>;

#[derive(Default)]
struct OperationQueue {
    operations: VecDeque<Operation>,
    shut_down: bool,
}

/// Error policy applied to failures that escape routed event handlers
struct ExceptionPolicy {
    mode: UnhandledExceptionMode,
    diagnostic_hook: Option<DiagnosticHook>,
    pending: Option<Error>,
}

/// The calling thread's dispatcher; shuts it down when the thread exits
struct ThreadDispatcher(Arc<Dispatcher>);

impl Drop for ThreadDispatcher {
    fn drop(&mut self) {
        if !self.0.has_shut_down() {
            log::debug!(
                "UI thread {:?} exited, shutting its dispatcher down",
                self.0.thread_name.as_deref().unwrap_or("<unnamed>")
            );
            self.0.shutdown();
        }
    }
}

thread_local! {
    static CURRENT: RefCell<Option<ThreadDispatcher>> = const { RefCell::new(None) };
}

/// Per-UI-thread operation queue and UI context
pub struct Dispatcher {
    thread_id: ThreadId,
    thread_name: Option<String>,
    queue: Mutex<OperationQueue>,
    wakeup: Condvar,
    batch_limit: AtomicUsize,
    idle: IdleQueue,
    platform: RwLock<Arc<NativePlatform>>,
    attached: Mutex<Vec<WeakControl>>,
    input: InputManager,
    policy: Mutex<ExceptionPolicy>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("thread", &self.thread_name)
            .field("platform", &self.platform().name())
            .field("shut_down", &self.has_shut_down())
            .finish()
    }
}

impl Dispatcher {
    fn for_current_thread() -> Self {
        let current = thread::current();
        Self {
            thread_id: current.id(),
            thread_name: current.name().map(str::to_string),
            queue: Mutex::new(OperationQueue::default()),
            wakeup: Condvar::new(),
            batch_limit: AtomicUsize::new(0),
            idle: IdleQueue::new(),
            platform: RwLock::new(platform::headless::platform()),
            attached: Mutex::new(Vec::new()),
            input: InputManager::new(),
            policy: Mutex::new(ExceptionPolicy {
                mode: UnhandledExceptionMode::CatchException,
                diagnostic_hook: None,
                pending: None,
            }),
        }
    }

    /// The dispatcher of the calling thread, created on first use
    ///
    /// The first call on a thread makes that thread a UI thread. When the
    /// thread exits the dispatcher is shut down, releasing any caller still
    /// blocked in [`invoke`](Self::invoke).
    pub fn current() -> Arc<Dispatcher> {
        CURRENT.with(|current| {
            current
                .borrow_mut()
                .get_or_insert_with(|| {
                    log::debug!(
                        "Creating dispatcher for thread {:?}",
                        thread::current().name().unwrap_or("<unnamed>")
                    );
                    ThreadDispatcher(Arc::new(Dispatcher::for_current_thread()))
                })
                .0
                .clone()
        })
    }

    /// The dispatcher of the calling thread, if one was created
    pub fn try_current() -> Option<Arc<Dispatcher>> {
        CURRENT.with(|current| current.borrow().as_ref().map(|d| d.0.clone()))
    }

    // ---- thread affinity -------------------------------------------------

    /// Whether the calling thread owns this dispatcher
    pub fn check_access(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Fail with [`Error::WrongThread`] unless called on the owning thread
    pub fn verify_access(&self) -> Result<()> {
        if self.check_access() {
            Ok(())
        } else {
            log::error!(
                "UI access from thread {:?}, owner is {:?}",
                thread::current().id(),
                self.thread_name.as_deref().unwrap_or("<unnamed>")
            );
            Err(Error::WrongThread)
        }
    }

    // ---- operation queue -------------------------------------------------

    fn lock_queue(&self) -> Result<MutexGuard<'_, OperationQueue>> {
        self.queue
            .lock()
            .map_err(|_| Error::LockError("Failed to lock dispatcher queue".to_string()))
    }

    /// Queue `operation` to run on the UI thread; never blocks
    pub fn begin_invoke(&self, operation: impl FnOnce() + Send + 'static) -> Result<()> {
        {
            let mut queue = self.lock_queue()?;
            if queue.shut_down {
                return Err(Error::DispatcherShutdown);
            }
            queue.operations.push_back(Box::new(operation));
        }
        self.wakeup.notify_all();
        Ok(())
    }

    /// Run `operation` on the UI thread and wait for its result
    ///
    /// Runs inline when called on the UI thread. Otherwise the caller blocks
    /// until the UI thread processes the operation; if the dispatcher shuts
    /// down first the result is [`Error::DispatcherShutdown`].
    pub fn invoke<R, F>(&self, operation: F) -> Result<R>
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        if self.check_access() {
            return Ok(operation());
        }
        let (sender, receiver) = oneshot::channel();
        self.begin_invoke(move || {
            let _ = sender.send(operation());
        })?;
        futures::executor::block_on(receiver).map_err(|_| Error::DispatcherShutdown)
    }

    /// Queue `operation` and get a future resolving to its result
    pub fn invoke_async<R, F>(&self, operation: F) -> impl Future<Output = Result<R>> + Send
    where
        R: Send + 'static,
        F: FnOnce() -> R + Send + 'static,
    {
        let (sender, receiver) = oneshot::channel();
        let queued = self.begin_invoke(move || {
            let _ = sender.send(operation());
        });
        async move {
            queued?;
            receiver.await.map_err(|_| Error::DispatcherShutdown)
        }
    }

    /// Limit how many operations one [`process_pending`](Self::process_pending) call runs (0 = all)
    pub fn set_batch_limit(&self, limit: usize) {
        self.batch_limit.store(limit, Ordering::Relaxed);
    }

    /// Number of queued operations
    pub fn pending_operations(&self) -> usize {
        self.lock_queue().map(|q| q.operations.len()).unwrap_or(0)
    }

    /// Run queued operations in FIFO order; returns how many ran
    ///
    /// Only operations queued before the call are run, so an operation that
    /// re-posts itself cannot starve the loop.
    pub fn process_pending(&self) -> Result<usize> {
        self.verify_access()?;
        let available = self.pending_operations();
        let limit = match self.batch_limit.load(Ordering::Relaxed) {
            0 => available,
            limit => limit.min(available),
        };

        let mut ran = 0;
        while ran < limit {
            let operation = self.lock_queue()?.operations.pop_front();
            let Some(operation) = operation else {
                break;
            };
            operation();
            ran += 1;
        }
        Ok(ran)
    }

    /// Block until work is queued or `timeout` elapses; returns whether work is available
    pub fn wait_for_work(&self, timeout: Duration) -> bool {
        let Ok(queue) = self.lock_queue() else {
            return false;
        };
        if !queue.operations.is_empty() || queue.shut_down {
            return !queue.operations.is_empty();
        }
        match self.wakeup.wait_timeout(queue, timeout) {
            Ok((queue, _)) => !queue.operations.is_empty(),
            Err(_) => false,
        }
    }

    /// Wait up to `timeout` for work and process whatever is queued
    pub fn wait_and_process(&self, timeout: Duration) -> Result<usize> {
        self.verify_access()?;
        self.wait_for_work(timeout);
        self.process_pending()
    }

    /// Stop accepting operations and drop the queued ones
    ///
    /// Callers blocked in [`invoke`](Self::invoke) are released with
    /// [`Error::DispatcherShutdown`]. Callable from any thread.
    pub fn shutdown(&self) {
        let dropped = match self.queue.lock() {
            Ok(mut queue) => {
                queue.shut_down = true;
                std::mem::take(&mut queue.operations)
            }
            Err(_) => VecDeque::new(),
        };
        if !dropped.is_empty() {
            log::debug!("Dispatcher shut down with {} queued operations", dropped.len());
        }
        // Dropping the operations drops their result senders.
        drop(dropped);
        self.idle.clear();
        self.wakeup.notify_all();
    }

    pub fn has_shut_down(&self) -> bool {
        self.queue.lock().map(|q| q.shut_down).unwrap_or(true)
    }

    /// Drive the platform pump, the operation queue and idle processing until
    /// `should_exit` returns true or the dispatcher shuts down
    pub fn run_loop(&self, should_exit: impl Fn() -> bool) -> Result<()> {
        self.verify_access()?;
        while !self.has_shut_down() && !should_exit() {
            let pump = self.platform().pump();
            let native = pump.pump_messages();
            let processed = self.process_pending()?;

            if let Some(error) = self.take_pending_error() {
                return Err(error);
            }

            let idle = if self.idle.is_requested() || !self.idle.is_empty() {
                self.on_idle_opportunity()
            } else {
                0
            };

            if native == 0 && processed == 0 && idle == 0 {
                self.wait_for_work(Duration::from_millis(10));
            }
        }
        Ok(())
    }

    // ---- idle ------------------------------------------------------------

    /// Queue a task for the next idle opportunity; callable from any thread
    pub fn add_idle_task(&self, task: impl FnMut() -> IdleAction + Send + 'static) {
        self.idle.add(Box::new(task));
        self.wakeup.notify_all();
    }

    /// Request an idle opportunity; repeated requests coalesce
    pub fn request_idle(&self) {
        self.idle.request();
        self.wakeup.notify_all();
    }

    /// Number of idle tasks waiting
    pub fn pending_idle_tasks(&self) -> usize {
        self.idle.len()
    }

    /// Run one idle opportunity if the platform has no pending input
    ///
    /// Each queued idle task runs at most once, then queued log messages are
    /// flushed. Returns the number of idle tasks that ran.
    pub fn on_idle_opportunity(&self) -> usize {
        if !self.check_access() {
            log::warn!("Idle processing requested off the UI thread");
            return 0;
        }
        if self.platform().pump().has_pending_input() {
            return 0;
        }
        let ran = self.idle.run_opportunity();
        LogSink::global().flush_queued();
        ran
    }

    // ---- platform --------------------------------------------------------

    /// The platform new handlers are created from
    pub fn platform(&self) -> Arc<NativePlatform> {
        match self.platform.read() {
            Ok(platform) => platform.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Install `platform` for handlers created from now on
    ///
    /// Controls that are already attached keep their handlers; use
    /// [`switch_platform`](Self::switch_platform) to rebuild them.
    pub fn set_platform(&self, platform: Arc<NativePlatform>) -> Result<()> {
        self.verify_access()?;
        let mut current = self
            .platform
            .write()
            .map_err(|_| Error::LockError("Failed to lock active platform".to_string()))?;
        log::info!("Active platform: {}", platform.name());
        *current = platform;
        Ok(())
    }

    /// Switch backends at runtime
    ///
    /// Every attached tree is detached, the new platform is installed and the
    /// trees are attached again. Property values live on the controls, so the
    /// new handlers see the same state. The first root that fails to reattach
    /// is reported after all roots were tried.
    pub fn switch_platform(&self, platform: Arc<NativePlatform>) -> Result<()> {
        self.verify_access()?;
        let attached = self.attached_controls();
        let roots: Vec<Control> = attached
            .iter()
            .filter(|c| !c.parent().is_some_and(|p| p.is_attached()))
            .cloned()
            .collect();

        log::debug!(
            "Switching platform {} -> {} ({} attached roots)",
            self.platform().name(),
            platform.name(),
            roots.len()
        );

        for root in &roots {
            if let Err(e) = root.detach_tree() {
                log::warn!("Detaching control {} for platform switch: {}", root.id(), e);
            }
        }

        self.set_platform(platform)?;

        let mut first_error = None;
        for root in &roots {
            if let Err(e) = root.attach_tree() {
                log::error!("Reattaching control {} after platform switch: {}", root.id(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub(crate) fn track_attached(&self, control: &Control) {
        if let Ok(mut attached) = self.attached.lock() {
            attached.retain(|c| c.upgrade().is_some());
            if !attached.iter().any(|c| c.id() == control.id()) {
                attached.push(control.downgrade());
            }
        }
    }

    pub(crate) fn untrack_attached(&self, id: ControlId) {
        if let Ok(mut attached) = self.attached.lock() {
            attached.retain(|c| c.id() != id && c.upgrade().is_some());
        }
    }

    pub(crate) fn forget_control(&self, id: ControlId) {
        self.untrack_attached(id);
        self.input.forget(id);
    }

    /// Attached controls of this thread, in attach order
    pub fn attached_controls(&self) -> Vec<Control> {
        self.attached
            .lock()
            .map(|attached| attached.iter().filter_map(WeakControl::upgrade).collect())
            .unwrap_or_default()
    }

    // ---- input -----------------------------------------------------------

    /// Input routing and focus state of this thread
    pub fn input(&self) -> &InputManager {
        &self.input
    }

    // ---- error policy ----------------------------------------------------

    fn lock_policy(&self) -> Option<MutexGuard<'_, ExceptionPolicy>> {
        self.policy.lock().ok()
    }

    pub fn unhandled_exception_mode(&self) -> UnhandledExceptionMode {
        self.lock_policy()
            .map(|p| p.mode)
            .unwrap_or(UnhandledExceptionMode::CatchException)
    }

    pub fn set_unhandled_exception_mode(&self, mode: UnhandledExceptionMode) {
        if let Some(mut policy) = self.lock_policy() {
            policy.mode = mode;
        }
    }

    /// Callback used by [`UnhandledExceptionMode::ShowDiagnostic`]
    pub fn set_diagnostic_hook(&self, hook: impl Fn(&Error) + Send + Sync + 'static) {
        if let Some(mut policy) = self.lock_policy() {
            policy.diagnostic_hook = Some(Arc::new(hook));
        }
    }

    /// Apply the unhandled-error policy to an error that escaped a handler
    ///
    /// Under `ThrowException` the error is kept and ends the run loop.
    pub fn handle_exception(&self, error: Error) {
        let Some(mut policy) = self.lock_policy() else {
            log::error!("Unhandled error: {}", error);
            return;
        };
        match policy.mode {
            UnhandledExceptionMode::CatchException => {
                log::error!("Unhandled error: {}", error);
                LogSink::global().idle_log(error.to_string(), LogItemKind::Error);
            }
            UnhandledExceptionMode::ThrowException => {
                log::error!("Unhandled error, stopping the event loop: {}", error);
                policy.pending.get_or_insert(error);
            }
            UnhandledExceptionMode::ShowDiagnostic => {
                log::error!("Unhandled error: {}", error);
                match policy.diagnostic_hook.clone() {
                    Some(hook) => {
                        drop(policy);
                        hook(&error);
                    }
                    None => LogSink::global().idle_log(error.to_string(), LogItemKind::Error),
                }
            }
        }
    }

    /// Take the error stored under `ThrowException`, if any
    pub fn take_pending_error(&self) -> Option<Error> {
        self.lock_policy().and_then(|mut p| p.pending.take())
    }
}
