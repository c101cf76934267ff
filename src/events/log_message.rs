//! `LogMessage` broadcast
//!
//! A static (not tree-routed) event that diagnostics tooling subscribes to.
//! Messages raised while an update is in progress are buffered and delivered
//! when the outermost update ends. Messages queued with [`LogSink::idle_log`]
//! may come from any thread and are delivered by [`LogSink::flush_queued`],
//! which the dispatcher calls on idle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, RwLock};

/// Severity of a log item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogItemKind {
    Information,
    Warning,
    Error,
}

impl LogItemKind {
    fn level(self) -> log::Level {
        match self {
            LogItemKind::Information => log::Level::Info,
            LogItemKind::Warning => log::Level::Warn,
            LogItemKind::Error => log::Level::Error,
        }
    }
}

/// Arguments delivered to `LogMessage` listeners
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogMessageArgs {
    pub message: String,
    pub kind: LogItemKind,
    /// When set, listeners replace their last item starting with this prefix
    pub replace_prefix: Option<String>,
}

type LogListener = Arc<dyn Fn(&LogMessageArgs) + Send + Sync>;

/// Identifies a listener for removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LogListenerId(u64);

/// Sink that `LogMessage` is raised into
pub struct LogSink {
    listeners: RwLock<Vec<(LogListenerId, LogListener)>>,
    update_count: AtomicUsize,
    buffered: Mutex<Vec<LogMessageArgs>>,
    queued: Mutex<VecDeque<LogMessageArgs>>,
    forward_to_facade: std::sync::atomic::AtomicBool,
}

impl std::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogSink")
            .field("listeners", &"[LogListeners]")
            .field("update_count", &self.update_count.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink {
    /// Create a sink with no listeners
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            update_count: AtomicUsize::new(0),
            buffered: Mutex::new(Vec::new()),
            queued: Mutex::new(VecDeque::new()),
            forward_to_facade: std::sync::atomic::AtomicBool::new(true),
        }
    }

    /// The process-wide sink used by [`Application::log`](crate::application::Application::log)
    pub fn global() -> &'static LogSink {
        static GLOBAL: OnceLock<LogSink> = OnceLock::new();
        GLOBAL.get_or_init(LogSink::new)
    }

    /// Also write every message to the `log` facade
    pub fn set_forward_to_facade(&self, forward: bool) {
        self.forward_to_facade.store(forward, Ordering::SeqCst);
    }

    /// Subscribe to `LogMessage`
    pub fn add_listener(
        &self,
        listener: impl Fn(&LogMessageArgs) + Send + Sync + 'static,
    ) -> LogListenerId {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        let id = LogListenerId(NEXT_ID.fetch_add(1, Ordering::Relaxed));
        if let Ok(mut listeners) = self.listeners.write() {
            listeners.push((id, Arc::new(listener)));
        }
        id
    }

    /// Unsubscribe a listener
    pub fn remove_listener(&self, id: LogListenerId) -> bool {
        match self.listeners.write() {
            Ok(mut listeners) => {
                let before = listeners.len();
                listeners.retain(|(lid, _)| *lid != id);
                before != listeners.len()
            }
            Err(_) => false,
        }
    }

    /// Raise `LogMessage` with an informational item
    pub fn log(&self, message: impl Into<String>) {
        self.log_kind(message, LogItemKind::Information);
    }

    pub fn log_warning(&self, message: impl Into<String>) {
        self.log_kind(message, LogItemKind::Warning);
    }

    pub fn log_error(&self, message: impl Into<String>) {
        self.log_kind(message, LogItemKind::Error);
    }

    /// Raise `LogMessage` with the given kind; multi-line text becomes one item per line
    pub fn log_kind(&self, message: impl Into<String>, kind: LogItemKind) {
        let message = message.into();
        for line in message.lines().filter(|l| !l.is_empty()) {
            self.raise(LogMessageArgs {
                message: line.to_string(),
                kind,
                replace_prefix: None,
            });
        }
    }

    /// Add a message, or replace the last one that starts with `prefix`
    pub fn log_replace(&self, message: impl Into<String>, prefix: Option<&str>) {
        let message = message.into();
        if message.is_empty() {
            return;
        }
        let prefix = prefix.map(str::to_string).unwrap_or_else(|| message.clone());
        self.raise(LogMessageArgs {
            message,
            kind: LogItemKind::Information,
            replace_prefix: Some(prefix),
        });
    }

    /// Queue a message for delivery on the next idle flush; callable from any thread
    pub fn idle_log(&self, message: impl Into<String>, kind: LogItemKind) {
        let message = message.into();
        if let Ok(mut queued) = self.queued.lock() {
            for line in message.lines().filter(|l| !l.is_empty()) {
                queued.push_back(LogMessageArgs {
                    message: line.to_string(),
                    kind,
                    replace_prefix: None,
                });
            }
        }
    }

    /// Deliver messages queued by [`idle_log`](Self::idle_log); returns how many were delivered
    pub fn flush_queued(&self) -> usize {
        if self.in_update() {
            return 0;
        }
        let pending: Vec<LogMessageArgs> = match self.queued.lock() {
            Ok(mut queued) => queued.drain(..).collect(),
            Err(_) => return 0,
        };
        let count = pending.len();
        self.begin_update();
        for args in pending {
            self.raise(args);
        }
        self.end_update();
        count
    }

    /// Start buffering messages; pairs with [`end_update`](Self::end_update)
    pub fn begin_update(&self) {
        self.update_count.fetch_add(1, Ordering::SeqCst);
    }

    /// Stop buffering; the outermost call delivers everything buffered
    pub fn end_update(&self) {
        let previous = self
            .update_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
            .unwrap_or(0);
        if previous == 1 {
            let buffered: Vec<LogMessageArgs> = match self.buffered.lock() {
                Ok(mut buffered) => buffered.drain(..).collect(),
                Err(_) => return,
            };
            for args in buffered {
                self.deliver(&args);
            }
        }
    }

    /// Whether an update is in progress
    pub fn in_update(&self) -> bool {
        self.update_count.load(Ordering::SeqCst) > 0
    }

    fn raise(&self, args: LogMessageArgs) {
        if self.forward_to_facade.load(Ordering::SeqCst) {
            log::log!(target: "arbor::log_message", args.kind.level(), "{}", args.message);
        }

        if self.in_update() {
            if let Ok(mut buffered) = self.buffered.lock() {
                buffered.push(args);
            }
            return;
        }
        self.deliver(&args);
    }

    fn deliver(&self, args: &LogMessageArgs) {
        let listeners: Vec<LogListener> = match self.listeners.read() {
            Ok(listeners) => listeners.iter().map(|(_, l)| l.clone()).collect(),
            Err(_) => return,
        };
        for listener in listeners {
            listener(args);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collecting_sink() -> (LogSink, Arc<Mutex<Vec<LogMessageArgs>>>) {
        let sink = LogSink::new();
        sink.set_forward_to_facade(false);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        sink.add_listener(move |args| seen_clone.lock().unwrap().push(args.clone()));
        (sink, seen)
    }

    #[test]
    fn test_multiline_message_splits() {
        let (sink, seen) = collecting_sink();
        sink.log("first\nsecond\n\nthird");
        let seen = seen.lock().unwrap();
        let lines: Vec<&str> = seen.iter().map(|a| a.message.as_str()).collect();
        assert_eq!(lines, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_update_buffers_until_outermost_end() {
        let (sink, seen) = collecting_sink();
        sink.begin_update();
        sink.begin_update();
        sink.log_warning("buffered");
        sink.end_update();
        assert!(seen.lock().unwrap().is_empty());
        sink.end_update();
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].kind, LogItemKind::Warning);
    }

    #[test]
    fn test_replace_defaults_prefix_to_message() {
        let (sink, seen) = collecting_sink();
        sink.log_replace("progress 10%", Some("progress"));
        sink.log_replace("done", None);
        let seen = seen.lock().unwrap();
        assert_eq!(seen[0].replace_prefix.as_deref(), Some("progress"));
        assert_eq!(seen[1].replace_prefix.as_deref(), Some("done"));
    }

    #[test]
    fn test_idle_log_from_other_thread() {
        let (sink, seen) = collecting_sink();
        let sink = Arc::new(sink);
        let worker_sink = sink.clone();
        std::thread::spawn(move || worker_sink.idle_log("from worker", LogItemKind::Information))
            .join()
            .unwrap();
        assert!(seen.lock().unwrap().is_empty());
        assert_eq!(sink.flush_queued(), 1);
        assert_eq!(seen.lock().unwrap()[0].message, "from worker");
    }

    #[test]
    fn test_removed_listener_not_called() {
        let sink = LogSink::new();
        sink.set_forward_to_facade(false);
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let id = sink.add_listener(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });
        sink.log("one");
        assert!(sink.remove_listener(id));
        sink.log("two");
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
