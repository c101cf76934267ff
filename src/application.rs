//! Application entry point
//!
//! [`Application`] binds the calling thread's dispatcher, applies a
//! [`UiConfig`], and runs the event loop for a main window until the last
//! window closes or [`Application::exit`] is called.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::UiConfig;
use crate::control::{Control, ControlKind};
use crate::dispatcher::{Dispatcher, IdleAction};
use crate::events::{LogItemKind, LogMessageArgs, LogSink};
use crate::events::log_message::LogListenerId;
use crate::platform;
use crate::{Error, Result};

/// How errors that escape routed event handlers are treated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnhandledExceptionMode {
    /// Log the error and keep running
    CatchException,
    /// Stop the event loop and return the error from [`Application::run`]
    ThrowException,
    /// Pass the error to the diagnostic hook (logging when none is set)
    ShowDiagnostic,
}

/// Handle that asks a running application to exit; callable from any thread
#[derive(Debug, Clone)]
pub struct ExitHandle {
    requested: Arc<AtomicBool>,
    dispatcher: Arc<Dispatcher>,
}

impl ExitHandle {
    pub fn exit(&self) {
        self.requested.store(true, Ordering::SeqCst);
        // Wake the loop; after shutdown there is nothing left to wake.
        let _ = self.dispatcher.begin_invoke(|| {});
    }
}

/// The UI application of the calling thread
#[derive(Debug)]
pub struct Application {
    dispatcher: Arc<Dispatcher>,
    config: UiConfig,
    exit_requested: Arc<AtomicBool>,
}

impl Application {
    /// Create an application with the default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(UiConfig::default())
    }

    /// Create an application on the calling thread, which becomes the UI thread
    pub fn with_config(config: UiConfig) -> Result<Self> {
        let dispatcher = Dispatcher::current();
        if dispatcher.has_shut_down() {
            return Err(Error::DispatcherShutdown);
        }

        dispatcher.set_platform(platform::create_platform(config.platform))?;
        dispatcher.set_unhandled_exception_mode(config.effective_exception_mode());
        dispatcher.set_batch_limit(config.idle_batch_limit);
        LogSink::global().set_forward_to_facade(config.log_to_facade);

        log::info!(
            "Arbor {} starting on {:?} platform",
            crate::VERSION,
            config.platform
        );

        Ok(Self {
            dispatcher,
            config,
            exit_requested: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    pub fn config(&self) -> &UiConfig {
        &self.config
    }

    /// Show `window` and run the event loop
    ///
    /// Returns when every window has closed or `exit` was requested. The
    /// dispatcher is shut down afterwards. Under
    /// [`UnhandledExceptionMode::ThrowException`] the first unhandled handler
    /// error ends the loop and is returned.
    pub fn run(&self, window: &Control) -> Result<()> {
        self.dispatcher.verify_access()?;
        window.show()?;

        let dispatcher = self.dispatcher.clone();
        let exit_requested = self.exit_requested.clone();
        let result = self.dispatcher.run_loop(move || {
            exit_requested.load(Ordering::SeqCst) || !has_open_windows(&dispatcher)
        });

        log::info!("Event loop finished");
        self.dispatcher.shutdown();
        LogSink::global().flush_queued();
        result
    }

    /// Ask the event loop to exit; takes effect on its next iteration
    pub fn exit(&self) {
        self.exit_handle().exit();
    }

    /// A handle other threads can use to request exit
    pub fn exit_handle(&self) -> ExitHandle {
        ExitHandle {
            requested: self.exit_requested.clone(),
            dispatcher: self.dispatcher.clone(),
        }
    }

    pub fn set_unhandled_exception_mode(&self, mode: UnhandledExceptionMode) {
        self.dispatcher.set_unhandled_exception_mode(mode);
    }

    /// Callback shown errors under [`UnhandledExceptionMode::ShowDiagnostic`]
    pub fn set_diagnostic_hook(&self, hook: impl Fn(&Error) + Send + Sync + 'static) {
        self.dispatcher.set_diagnostic_hook(hook);
    }

    /// Apply the unhandled-error policy to `error`
    pub fn handle_exception(&self, error: Error) {
        self.dispatcher.handle_exception(error);
    }

    /// Queue a task for the next idle opportunity
    pub fn add_idle_task(&self, task: impl FnMut() -> IdleAction + Send + 'static) {
        self.dispatcher.add_idle_task(task);
    }

    // ---- LogMessage --------------------------------------------------------

    pub fn log(&self, message: impl Into<String>) {
        LogSink::global().log(message);
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        LogSink::global().log_warning(message);
    }

    pub fn log_error(&self, message: impl Into<String>) {
        LogSink::global().log_error(message);
    }

    /// Replace the previous item starting with `prefix` (or append)
    pub fn log_replace(&self, message: impl Into<String>, prefix: Option<&str>) {
        LogSink::global().log_replace(message, prefix);
    }

    pub fn log_begin_update(&self) {
        LogSink::global().begin_update();
    }

    pub fn log_end_update(&self) {
        LogSink::global().end_update();
    }

    /// Queue a message from any thread; it is broadcast on the next idle opportunity
    pub fn idle_log(&self, message: impl Into<String>, kind: LogItemKind) {
        LogSink::global().idle_log(message, kind);
        self.dispatcher.request_idle();
    }

    pub fn add_log_listener(
        &self,
        listener: impl Fn(&LogMessageArgs) + Send + Sync + 'static,
    ) -> LogListenerId {
        LogSink::global().add_listener(listener)
    }

    pub fn remove_log_listener(&self, id: LogListenerId) -> bool {
        LogSink::global().remove_listener(id)
    }
}

fn has_open_windows(dispatcher: &Dispatcher) -> bool {
    dispatcher
        .attached_controls()
        .iter()
        .any(|c| c.kind() == ControlKind::Window)
}
