//! Built-in routed events
//!
//! Registered once, in the process-wide registry, the first time either the
//! registry or these descriptors are touched.
//!
//! | Event | Strategy | Handled |
//! |---|---|---|
//! | `PreviewKeyDown`, `PreviewKeyUp`, `PreviewMouseDown`, `PreviewMouseUp` | Tunnel | stops the route |
//! | `KeyDown`, `KeyUp`, `MouseDown`, `MouseUp`, `MouseMove`, `Click`, `TextChanged`, `GotFocus`, `LostFocus` | Bubble | continues; suppresses class defaults |
//! | `HandleCreated`, `HandleDestroyed`, `ChildInserted`, `ChildRemoved`, `Closing`, `Closed` | Direct | advisory |

use std::sync::OnceLock;

use crate::control::{BUTTON, CONTROL, WINDOW};
use crate::events::args::{CancelData, ChildData, KeyData, MouseData, TextChangedData};
use crate::events::{EventRegistry, RoutedEvent, RoutingStrategy};

/// Descriptors of the toolkit's own events
#[derive(Debug)]
pub struct StandardEvents {
    pub preview_key_down: RoutedEvent,
    pub key_down: RoutedEvent,
    pub preview_key_up: RoutedEvent,
    pub key_up: RoutedEvent,
    pub preview_mouse_down: RoutedEvent,
    pub mouse_down: RoutedEvent,
    pub preview_mouse_up: RoutedEvent,
    pub mouse_up: RoutedEvent,
    pub mouse_move: RoutedEvent,
    pub click: RoutedEvent,
    pub text_changed: RoutedEvent,
    pub got_focus: RoutedEvent,
    pub lost_focus: RoutedEvent,
    pub handle_created: RoutedEvent,
    pub handle_destroyed: RoutedEvent,
    pub child_inserted: RoutedEvent,
    pub child_removed: RoutedEvent,
    pub closing: RoutedEvent,
    pub closed: RoutedEvent,
}

impl StandardEvents {
    fn register(registry: &EventRegistry) -> crate::Result<Self> {
        use RoutingStrategy::{Bubble, Direct, Tunnel};

        Ok(Self {
            preview_key_down: registry.register::<KeyData>("PreviewKeyDown", &CONTROL, Tunnel)?,
            key_down: registry.register::<KeyData>("KeyDown", &CONTROL, Bubble)?,
            preview_key_up: registry.register::<KeyData>("PreviewKeyUp", &CONTROL, Tunnel)?,
            key_up: registry.register::<KeyData>("KeyUp", &CONTROL, Bubble)?,
            preview_mouse_down: registry
                .register::<MouseData>("PreviewMouseDown", &CONTROL, Tunnel)?,
            mouse_down: registry.register::<MouseData>("MouseDown", &CONTROL, Bubble)?,
            preview_mouse_up: registry
                .register::<MouseData>("PreviewMouseUp", &CONTROL, Tunnel)?,
            mouse_up: registry.register::<MouseData>("MouseUp", &CONTROL, Bubble)?,
            mouse_move: registry.register::<MouseData>("MouseMove", &CONTROL, Bubble)?,
            click: registry.register::<()>("Click", &BUTTON, Bubble)?,
            text_changed: registry.register::<TextChangedData>("TextChanged", &CONTROL, Bubble)?,
            got_focus: registry.register::<()>("GotFocus", &CONTROL, Bubble)?,
            lost_focus: registry.register::<()>("LostFocus", &CONTROL, Bubble)?,
            handle_created: registry.register::<()>("HandleCreated", &CONTROL, Direct)?,
            handle_destroyed: registry.register::<()>("HandleDestroyed", &CONTROL, Direct)?,
            child_inserted: registry.register::<ChildData>("ChildInserted", &CONTROL, Direct)?,
            child_removed: registry.register::<ChildData>("ChildRemoved", &CONTROL, Direct)?,
            closing: registry.register::<CancelData>("Closing", &WINDOW, Direct)?,
            closed: registry.register::<()>("Closed", &WINDOW, Direct)?,
        })
    }
}

/// The built-in events, registering them on first use
pub fn standard_events() -> &'static StandardEvents {
    static EVENTS: OnceLock<StandardEvents> = OnceLock::new();
    EVENTS.get_or_init(|| match StandardEvents::register(EventRegistry::global_table()) {
        Ok(events) => events,
        // The table is empty here, so only a poisoned registry lock ends up here.
        Err(e) => panic!("failed to register standard events: {e}"),
    })
}
