//! Routed event arguments and the toolkit's payload types

use crate::control::{Control, ControlId, Point};
use crate::events::RoutedEvent;

/// Arguments for one raise of a routed event
///
/// Created once per raise and threaded through the whole route; handlers mark
/// it handled to cancel or to suppress default actions further along.
#[derive(Debug, Clone)]
pub struct RoutedEventArgs<T> {
    routed_event: RoutedEvent,
    source: Option<ControlId>,
    handled: bool,
    /// Event-specific payload
    pub data: T,
}

impl<T> RoutedEventArgs<T> {
    /// Create arguments for `routed_event` carrying `data`
    pub fn new(routed_event: RoutedEvent, data: T) -> Self {
        Self {
            routed_event,
            source: None,
            handled: false,
            data,
        }
    }

    /// The event being routed
    pub fn routed_event(&self) -> &RoutedEvent {
        &self.routed_event
    }

    /// The control the event was raised on
    pub fn source(&self) -> Option<ControlId> {
        self.source
    }

    pub fn handled(&self) -> bool {
        self.handled
    }

    pub fn set_handled(&mut self, handled: bool) {
        self.handled = handled;
    }

    /// Shorthand for `set_handled(true)`
    pub fn handle(&mut self) {
        self.handled = true;
    }

    pub(crate) fn set_source(&mut self, source: ControlId) {
        self.source = Some(source);
    }

    pub(crate) fn retarget(&mut self, routed_event: RoutedEvent) {
        self.routed_event = routed_event;
    }

    /// Consume the arguments, returning the payload
    pub fn into_data(self) -> T {
        self.data
    }
}

/// Keyboard modifier state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Modifiers {
    pub shift: bool,
    pub control: bool,
    pub alt: bool,
}

/// Key payload for key-down and key-up events
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyData {
    /// Logical key name, e.g. "Enter" or "a"
    pub key: String,
    pub modifiers: Modifiers,
    /// Whether this is an auto-repeat
    pub repeat: bool,
}

impl KeyData {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
            repeat: false,
        }
    }
}

/// Pointer button
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// Pointer payload
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MouseData {
    /// Position relative to the control the input was resolved to
    pub position: Point,
    /// Button involved, `None` for moves
    pub button: Option<MouseButton>,
}

/// Payload for events whose native action can be canceled (e.g. closing a window)
///
/// The triggering native callback checks `cancel` after routing completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CancelData {
    pub cancel: bool,
}

/// Payload for text change notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextChangedData {
    pub old_text: String,
    pub new_text: String,
}

/// Payload for child insertion and removal notifications
#[derive(Debug, Clone)]
pub struct ChildData {
    pub child: Control,
    pub index: usize,
}
