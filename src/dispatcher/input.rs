//! Native input routing and keyboard focus
//!
//! Native callbacks may fire on any thread. [`InputManager::deliver`] resolves
//! the native handle to its control and marshals the work to that control's
//! dispatcher, where the matching routed events are raised. Errors escaping
//! handlers are passed to the dispatcher's unhandled-error policy.

use std::sync::Mutex;

use crate::control::{Control, ControlId, ControlKind, Point, WeakControl};
use crate::events::{
    raise, raise_pair, standard_events, CancelData, KeyData, MouseButton, MouseData,
    RoutedEventArgs,
};
use crate::handler::{HandleRegistry, NativeHandle};
use crate::{Error, Result};

/// Raw input reported by a native backend
#[derive(Debug, Clone, PartialEq)]
pub enum NativeInput {
    KeyDown(KeyData),
    KeyUp(KeyData),
    MouseDown { position: Point, button: MouseButton },
    MouseUp { position: Point, button: MouseButton },
    MouseMove { position: Point },
    /// Native activation of a button (keyboard or accessibility)
    Click,
    /// The user asked to close a top-level window
    CloseRequest,
}

/// Focus tracking and routing of native input into routed events
#[derive(Debug, Default)]
pub struct InputManager {
    focused: Mutex<Option<WeakControl>>,
}

impl InputManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report input for a native handle; callable from any thread
    ///
    /// Returns `Ok(false)` when the handle no longer belongs to a live control,
    /// which happens when input races with teardown.
    pub fn deliver(handle: NativeHandle, input: NativeInput) -> Result<bool> {
        let Some(control) = HandleRegistry::global().resolve(handle) else {
            log::debug!("Dropping {:?} for unknown native handle {}", input, handle);
            return Ok(false);
        };
        Self::deliver_to(&control, input)?;
        Ok(true)
    }

    /// Report input for a control; callable from any thread
    ///
    /// Used directly by backends without native handles.
    pub fn deliver_to(control: &Control, input: NativeInput) -> Result<()> {
        let target = control.downgrade();
        control.dispatcher().begin_invoke(move || {
            let Some(control) = target.upgrade() else {
                return;
            };
            if control.is_disposed() {
                return;
            }
            let dispatcher = control.dispatcher().clone();
            if let Err(e) = dispatcher.input().route_input(&control, input) {
                dispatcher.handle_exception(e);
            }
        })
    }

    /// Raise the routed events for `input` on the UI thread
    pub fn route_input(&self, target: &Control, input: NativeInput) -> Result<()> {
        target.dispatcher().verify_access()?;
        let events = standard_events();
        log::trace!("Routing {:?} to control {}", input, target.id());

        match input {
            NativeInput::KeyDown(key) => {
                let source = self.key_target(target);
                let mut args = RoutedEventArgs::new(events.preview_key_down.clone(), key);
                raise_pair(&source, &events.preview_key_down, &events.key_down, &mut args)
            }
            NativeInput::KeyUp(key) => {
                let source = self.key_target(target);
                let mut args = RoutedEventArgs::new(events.preview_key_up.clone(), key);
                raise_pair(&source, &events.preview_key_up, &events.key_up, &mut args)
            }
            NativeInput::MouseDown { position, button } => {
                let source = target.hit_test_managed(position);
                let mut args = RoutedEventArgs::new(
                    events.preview_mouse_down.clone(),
                    MouseData {
                        position,
                        button: Some(button),
                    },
                );
                raise_pair(
                    &source,
                    &events.preview_mouse_down,
                    &events.mouse_down,
                    &mut args,
                )
            }
            NativeInput::MouseUp { position, button } => {
                let source = target.hit_test_managed(position);
                let mut args = RoutedEventArgs::new(
                    events.preview_mouse_up.clone(),
                    MouseData {
                        position,
                        button: Some(button),
                    },
                );
                raise_pair(
                    &source,
                    &events.preview_mouse_up,
                    &events.mouse_up,
                    &mut args,
                )?;
                if button == MouseButton::Left && is_clickable(&source) && source.enabled() {
                    raise_click(&source)?;
                }
                Ok(())
            }
            NativeInput::MouseMove { position } => {
                let source = target.hit_test_managed(position);
                let mut args = RoutedEventArgs::new(
                    events.mouse_move.clone(),
                    MouseData {
                        position,
                        button: None,
                    },
                );
                raise(&source, &events.mouse_move, &mut args)
            }
            NativeInput::Click => {
                if is_clickable(target) && target.enabled() {
                    raise_click(target)?;
                }
                Ok(())
            }
            NativeInput::CloseRequest => target.close().map(|_| ()),
        }
    }

    /// Key input goes to the focused control when it lives inside `target`
    fn key_target(&self, target: &Control) -> Control {
        match self.focused() {
            Some(focused) if &focused == target || target.is_ancestor_of(&focused) => focused,
            _ => target.clone(),
        }
    }

    /// The control holding keyboard focus on this thread
    pub fn focused(&self) -> Option<Control> {
        let focused = self.focused.lock().ok()?;
        focused.as_ref().and_then(WeakControl::upgrade)
    }

    /// Move keyboard focus to `control`
    ///
    /// Raises `LostFocus` on the previous holder and `GotFocus` on the new one.
    /// Returns `false` when the control cannot take focus (not focusable,
    /// hidden or disabled).
    pub fn focus(&self, control: &Control) -> Result<bool> {
        control.dispatcher().verify_access()?;
        if control.is_disposed() {
            return Err(Error::ObjectDisposed(format!("control {}", control.id())));
        }
        if !control.kind().capabilities().contains(crate::control::Capabilities::FOCUS)
            || !control.visible()
            || !control.enabled()
        {
            return Ok(false);
        }

        let previous = self.focused();
        if previous.as_ref() == Some(control) {
            return Ok(true);
        }

        let events = standard_events();
        if let Some(previous) = &previous {
            if previous.is_attached() {
                if let Err(e) = previous.with_focus_handler(|f| f.kill_focus()) {
                    log::warn!("Failed to kill native focus on control {}: {}", previous.id(), e);
                }
            }
            let mut args = RoutedEventArgs::new(events.lost_focus.clone(), ());
            raise(previous, &events.lost_focus, &mut args)?;
        }

        if let Ok(mut focused) = self.focused.lock() {
            *focused = Some(control.downgrade());
        }
        if control.is_attached() {
            if let Err(e) = control.with_focus_handler(|f| f.set_focus()) {
                log::warn!("Failed to set native focus on control {}: {}", control.id(), e);
            }
        }
        let mut args = RoutedEventArgs::new(events.got_focus.clone(), ());
        raise(control, &events.got_focus, &mut args)?;
        Ok(true)
    }

    /// Clear focus when the focused control goes away
    pub(crate) fn forget(&self, id: ControlId) {
        if let Ok(mut focused) = self.focused.lock() {
            if focused.as_ref().is_some_and(|f| f.id() == id) {
                *focused = None;
            }
        }
    }
}

fn is_clickable(control: &Control) -> bool {
    matches!(control.kind(), ControlKind::Button | ControlKind::CheckBox)
}

fn raise_click(control: &Control) -> Result<()> {
    let events = standard_events();
    let mut args = RoutedEventArgs::new(events.click.clone(), ());
    raise(control, &events.click, &mut args)
}

impl Control {
    /// Give this control keyboard focus; see [`InputManager::focus`]
    pub fn focus(&self) -> Result<bool> {
        self.dispatcher().input().focus(self)
    }

    /// Whether this control holds keyboard focus
    pub fn has_focus(&self) -> bool {
        self.dispatcher().input().focused().as_ref() == Some(self)
    }

    /// Ask this window to close
    ///
    /// Raises `Closing`; when no handler sets `cancel`, the window is
    /// disposed (which destroys its native resources) and `Closed` is raised.
    /// Returns whether the window closed.
    pub fn close(&self) -> Result<bool> {
        self.dispatcher().verify_access()?;
        if self.is_disposed() {
            return Ok(false);
        }
        let events = standard_events();
        let mut closing = RoutedEventArgs::new(events.closing.clone(), CancelData::default());
        raise(self, &events.closing, &mut closing)?;
        if closing.data.cancel {
            log::debug!("Close of control {} was canceled", self.id());
            return Ok(false);
        }

        let mut closed = RoutedEventArgs::new(events.closed.clone(), ());
        let closed_result = raise(self, &events.closed, &mut closed);
        self.dispose()?;
        closed_result.map(|_| true)
    }
}
