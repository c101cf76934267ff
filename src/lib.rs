// Core module of the Arbor widget toolkit
pub mod application;
pub mod config;
pub mod control;
pub mod dispatcher;
pub mod events;
pub mod handler;
pub mod platform;

/// Version of the Arbor toolkit
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Re-export of common types for convenience
pub mod prelude {
    pub use crate::application::{Application, UnhandledExceptionMode};
    pub use crate::config::UiConfig;
    pub use crate::control::{
        Capabilities, Control, ControlId, ControlKind, ControlType, Point, Rect, StyleFlags,
        WeakControl,
    };
    pub use crate::dispatcher::{Dispatcher, IdleAction, InputManager, NativeInput};
    pub use crate::events::{
        standard_events, EventRegistry, HandledBehavior, RoutedEvent, RoutedEventArgs,
        RoutingStrategy,
    };
    pub use crate::handler::{ControlHandler, HandlerState, NativeHandle};
    pub use crate::platform::{NativePlatform, PlatformKind};
    pub use crate::{Error, Result};
}

/// Result type used throughout the toolkit
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the Arbor toolkit
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A routed event with the same name was already registered for the owner type
    #[error("Routed event '{name}' is already registered for type {owner}")]
    DuplicateRegistration { name: String, owner: &'static str },

    /// Routed event lookup by name failed
    #[error("Routed event '{name}' not found on type {owner} or its base types")]
    NotFound { name: String, owner: &'static str },

    /// The backend could not construct a native peer for a control
    #[error("Failed to create handler for {kind} control: {reason}")]
    HandlerCreationFailed { kind: &'static str, reason: String },

    /// A UI operation was attempted off the UI thread
    #[error("The calling thread cannot access this object because a different thread owns it")]
    WrongThread,

    /// Operation on a torn-down control or handler
    #[error("Cannot access a disposed object: {0}")]
    ObjectDisposed(String),

    /// The dispatcher queue has been shut down
    #[error("The dispatcher has shut down; the operation was dropped")]
    DispatcherShutdown,

    /// The attached handler does not offer the requested capability
    #[error("Handler for {kind} control does not support the {capability} capability")]
    CapabilityNotSupported {
        kind: &'static str,
        capability: &'static str,
    },

    /// A handler was subscribed with an argument type other than the event's
    #[error("Handler for event '{event}' expects {expected}, got {got}")]
    HandlerTypeMismatch {
        event: String,
        expected: &'static str,
        got: &'static str,
    },

    /// Invalid parent-child relationship
    #[error("Invalid parent-child relationship: {0}")]
    InvalidRelationship(String),

    /// An event handler failed while the event was being routed
    #[error("Handler for event '{event}' failed: {source}")]
    HandlerFailed {
        event: String,
        #[source]
        source: anyhow::Error,
    },

    /// Error acquiring lock
    #[error("Lock error: {0}")]
    LockError(String),

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error belongs to the structural-misuse family that is never retried
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            Error::DuplicateRegistration { .. }
                | Error::WrongThread
                | Error::InvalidRelationship(_)
                | Error::HandlerTypeMismatch { .. }
        )
    }
}

/// Initialize the toolkit on the calling thread with default settings
///
/// Registers the built-in events and returns the dispatcher that now owns
/// this thread.
pub fn init() -> std::sync::Arc<dispatcher::Dispatcher> {
    events::standard_events();
    dispatcher::Dispatcher::current()
}
