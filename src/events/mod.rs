//! Routed event system for the Arbor toolkit
//!
//! The event system provides:
//! - Routed event descriptors registered per owner type
//! - Tunnel, bubble and direct routing along the control's ancestor path
//! - Instance handlers plus class-level default handlers
//! - The `LogMessage` broadcast used by diagnostics tooling

pub mod args;
pub mod handlers;
pub mod log_message;
pub mod registry;
pub mod route;
pub mod routed_event;
pub mod standard;

#[cfg(test)]
mod tests;

pub use args::{
    CancelData, ChildData, KeyData, Modifiers, MouseButton, MouseData, RoutedEventArgs,
    TextChangedData,
};
pub use handlers::{ClassHandlers, HandlerToken};
pub use log_message::{LogItemKind, LogMessageArgs, LogSink};
pub use registry::EventRegistry;
pub use route::{raise, raise_pair, raise_with, EventRoute};
pub use routed_event::{HandledBehavior, RoutedEvent, RoutedEventId, RoutingStrategy};
pub use standard::{standard_events, StandardEvents};
