//! Native peer contract
//!
//! A [`ControlHandler`] performs the native work for exactly one control while
//! attached. The base trait carries what every peer must do; optional
//! behavior is split into capability traits that a handler exposes through
//! the accessor methods (`focus()`, `text()`, `scroll()`, `window()`). Consumers
//! ask for a capability instead of downcasting to a concrete backend type.

pub mod registry;

use std::fmt;

use crate::control::{ControlKind, Font, Point, Rect, StyleFlags, WeakControl};
use crate::Result;

pub use registry::HandleRegistry;

/// Opaque identifier of a native resource, exclusively owned by one handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeHandle(pub u64);

impl fmt::Display for NativeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Handler lifecycle state of a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerState {
    /// No handler has been created yet, or creation failed
    Unattached,
    /// The factory produced a handler but it is not attached yet
    HandlerCreated,
    /// The native resource exists and the control's properties were pushed to it
    Attached,
    /// The handler was detached and its native resource released
    Detached,
    /// Terminal state; no further handler operations are allowed
    Disposed,
}

/// Result of pushing new style flags to a handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleChange {
    /// The native peer applied the change in place
    Applied,
    /// The backend cannot mutate the style in place; the handler must be recreated
    RecreateRequired,
}

/// Everything a backend needs to construct and create a native peer
#[derive(Debug, Clone)]
pub struct HandlerContext {
    /// The control the handler will serve (non-owning)
    pub owner: WeakControl,
    /// Native peer kind
    pub kind: ControlKind,
    /// Style at creation time
    pub style: StyleFlags,
    /// Native resource of the closest ancestor that has one
    pub parent_handle: Option<NativeHandle>,
}

/// Base contract every native peer implements
pub trait ControlHandler: Send {
    /// Name of the backend that produced this handler, for diagnostics only
    fn backend_name(&self) -> &'static str;

    /// Kind of control this handler serves
    fn kind(&self) -> ControlKind;

    /// Create the native resource. Must run before any other native operation.
    fn create_native(&mut self, context: &HandlerContext) -> Result<()>;

    /// Whether the native resource currently exists
    fn is_native_created(&self) -> bool;

    /// Handle of the native resource, if this backend has one
    fn native_handle(&self) -> Option<NativeHandle>;

    /// Subscribe to native callbacks; properties have already been pushed
    fn on_attach(&mut self) -> Result<()>;

    /// Unsubscribe from native callbacks; runs before `destroy_native`
    fn on_detach(&mut self);

    /// Release the native resource. Calling it twice is a no-op.
    fn destroy_native(&mut self);

    /// Push style flags
    fn apply_style(&mut self, style: StyleFlags) -> StyleChange;

    /// Push geometry
    fn set_bounds(&mut self, bounds: Rect);

    /// Push visibility
    fn set_visible(&mut self, visible: bool);

    /// Push enabled state
    fn set_enabled(&mut self, enabled: bool);

    /// Push font
    fn set_font(&mut self, font: &Font);

    /// Mark the native surface for repaint
    fn invalidate(&mut self);

    /// Repaint invalidated regions now
    fn update(&mut self);

    fn focus(&mut self) -> Option<&mut dyn FocusHandler> {
        None
    }

    fn text(&mut self) -> Option<&mut dyn TextHandler> {
        None
    }

    fn scroll(&mut self) -> Option<&mut dyn ScrollHandler> {
        None
    }

    fn window(&mut self) -> Option<&mut dyn WindowHandler> {
        None
    }
}

/// Keyboard focus capability
pub trait FocusHandler {
    /// Give the native peer keyboard focus
    fn set_focus(&mut self);

    /// Whether the native peer currently has focus
    fn has_focus(&self) -> bool;

    /// Drop keyboard focus
    fn kill_focus(&mut self);
}

/// Native text capability
pub trait TextHandler {
    fn set_text(&mut self, text: &str);

    fn text(&self) -> String;
}

/// Scrolling capability
pub trait ScrollHandler {
    /// Set the scrollable extent
    fn set_extent(&mut self, width: f32, height: f32);

    fn set_scroll_position(&mut self, position: Point);

    fn scroll_position(&self) -> Point;
}

/// Clamp a scroll position into `0..=extent` on each axis
///
/// Negative or NaN extents count as zero and a NaN coordinate becomes zero.
pub fn clamp_scroll_position(position: Point, extent: (f32, f32)) -> Point {
    fn axis(value: f32, limit: f32) -> f32 {
        // f32::max ignores NaN, so a NaN limit becomes 0.
        let limit = limit.max(0.0);
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, limit)
        }
    }
    Point::new(axis(position.x, extent.0), axis(position.y, extent.1))
}

/// Top-level window capability
pub trait WindowHandler {
    /// Show the window on screen
    fn show(&mut self);

    /// Hide the window without destroying it
    fn hide(&mut self);

    fn is_shown(&self) -> bool;

    /// Bring the window to the foreground
    fn activate(&mut self);
}
