//! Handler lifecycle management
//!
//! Per-control state machine:
//! `Unattached → HandlerCreated → Attached → Detached → Disposed`.
//!
//! Attach creates the native resource, registers its handle, pushes the
//! control's properties (style before geometry) and finally lets the handler
//! subscribe to native callbacks. Detach runs in the opposite order and always
//! unsubscribes before the native resource is destroyed. Attach and detach are
//! idempotent, because several ancestor-chain triggers can reach one node.

use std::sync::Arc;

use crate::control::{Capabilities, Control, PropertyBag};
use crate::events::{raise, standard_events, RoutedEventArgs};
use crate::handler::{
    ControlHandler, FocusHandler, HandleRegistry, HandlerContext, HandlerState, NativeHandle,
    ScrollHandler, StyleChange, TextHandler, WindowHandler,
};
use crate::{Error, Result};

/// Push the control's properties in the order backends expect
fn push_properties(handler: &mut dyn ControlHandler, properties: &PropertyBag) {
    // Style first: some backends need the final style before sizing.
    let _ = handler.apply_style(properties.style());
    if let Some(native) = handler.text() {
        native.set_text(&properties.text());
    }
    handler.set_font(&properties.font());
    handler.set_bounds(properties.bounds());
    handler.set_visible(properties.visible());
    handler.set_enabled(properties.enabled());
}

impl Control {
    /// Current handler lifecycle state
    pub fn handler_state(&self) -> HandlerState {
        self.inner
            .slot
            .lock()
            .map(|slot| slot.state)
            .unwrap_or(HandlerState::Disposed)
    }

    /// Whether a handler is attached and its native resource exists
    pub fn is_attached(&self) -> bool {
        self.handler_state() == HandlerState::Attached
    }

    /// Native handle of the attached handler, if the backend has one
    pub fn native_handle(&self) -> Option<NativeHandle> {
        let slot = self.inner.slot.lock().ok()?;
        slot.handler.as_ref().and_then(|h| h.native_handle())
    }

    /// Name of the backend that created the current handler
    pub fn backend_name(&self) -> Option<&'static str> {
        let slot = self.inner.slot.lock().ok()?;
        slot.handler.as_ref().map(|h| h.backend_name())
    }

    fn check_handler_access(&self) -> Result<()> {
        self.inner.dispatcher.verify_access()?;
        if self.handler_state() == HandlerState::Disposed || self.is_disposed() {
            return Err(Error::ObjectDisposed(format!(
                "handler of control {}",
                self.id()
            )));
        }
        Ok(())
    }

    fn handler_context(&self) -> HandlerContext {
        HandlerContext {
            owner: self.downgrade(),
            kind: self.kind(),
            style: self.style(),
            parent_handle: self.ancestors().iter().find_map(Control::native_handle),
        }
    }

    /// Ask the active platform for a handler (`Unattached → HandlerCreated`)
    ///
    /// On failure the control stays `Unattached` and remains usable.
    pub fn create_handler(&self) -> Result<()> {
        self.check_handler_access()?;
        let context = self.handler_context();
        let platform = self.inner.dispatcher.platform();

        let mut slot = self.lock_slot()?;
        match slot.state {
            HandlerState::HandlerCreated | HandlerState::Attached => return Ok(()),
            HandlerState::Disposed => {
                return Err(Error::ObjectDisposed(format!("control {}", self.id())))
            }
            HandlerState::Unattached | HandlerState::Detached => {}
        }

        match platform.create_handler(&context) {
            Ok(handler) => {
                log::debug!(
                    "Created {} handler for control {} on {}",
                    handler.kind(),
                    self.id(),
                    handler.backend_name()
                );
                slot.handler = Some(handler);
                slot.platform = Some(platform);
                slot.state = HandlerState::HandlerCreated;
                Ok(())
            }
            Err(e) => {
                log::warn!("Handler creation failed for control {}: {}", self.id(), e);
                slot.state = HandlerState::Unattached;
                Err(e)
            }
        }
    }

    /// Drop a created-but-unattached handler built by a platform that is no
    /// longer active; returns whether it was dropped
    fn discard_stale_handler(&self) -> Result<bool> {
        let active = self.inner.dispatcher.platform();
        let mut slot = self.lock_slot()?;
        let current = slot
            .platform
            .as_ref()
            .is_some_and(|built_by| Arc::ptr_eq(built_by, &active));
        if slot.state != HandlerState::HandlerCreated || current {
            return Ok(false);
        }
        log::debug!(
            "Dropping handler of control {} built by an inactive platform",
            self.id()
        );
        slot.handler = None;
        slot.platform = None;
        slot.state = HandlerState::Unattached;
        Ok(true)
    }

    /// Create the native resource and push properties (`HandlerCreated → Attached`)
    ///
    /// Creates the handler first when there is none. A no-op when already attached.
    pub fn attach(&self) -> Result<()> {
        self.check_handler_access()?;
        match self.handler_state() {
            HandlerState::Attached => return Ok(()),
            HandlerState::Unattached | HandlerState::Detached => self.create_handler()?,
            HandlerState::HandlerCreated => {
                if self.discard_stale_handler()? {
                    self.create_handler()?;
                }
            }
            HandlerState::Disposed => {}
        }

        let context = self.handler_context();
        let properties = self.properties();
        let kind = self.kind().name();

        {
            let mut slot = self.lock_slot()?;
            if slot.state == HandlerState::Attached {
                return Ok(());
            }
            let Some(mut handler) = slot.handler.take() else {
                slot.platform = None;
                slot.state = HandlerState::Unattached;
                return Err(Error::HandlerCreationFailed {
                    kind,
                    reason: "no handler to attach".to_string(),
                });
            };

            if let Err(e) = handler.create_native(&context) {
                slot.state = HandlerState::Unattached;
                log::warn!("Native creation failed for control {}: {}", self.id(), e);
                return Err(match e {
                    Error::HandlerCreationFailed { .. } => e,
                    other => Error::HandlerCreationFailed {
                        kind,
                        reason: other.to_string(),
                    },
                });
            }

            let handle = handler.native_handle();
            if let Some(handle) = handle {
                if let Err(e) = HandleRegistry::global().register(handle, self) {
                    handler.destroy_native();
                    slot.state = HandlerState::Unattached;
                    return Err(e);
                }
            }

            push_properties(handler.as_mut(), &properties);

            if let Err(e) = handler.on_attach() {
                if let Some(handle) = handle {
                    let _ = HandleRegistry::global().unregister(handle);
                }
                handler.destroy_native();
                slot.state = HandlerState::Unattached;
                return Err(Error::HandlerCreationFailed {
                    kind,
                    reason: e.to_string(),
                });
            }

            slot.handler = Some(handler);
            slot.state = HandlerState::Attached;
        }

        self.inner.dispatcher.track_attached(self);
        log::debug!("Attached control {} ({})", self.id(), self.control_type());

        let events = standard_events();
        let mut args = RoutedEventArgs::new(events.handle_created.clone(), ());
        raise(self, &events.handle_created, &mut args)
    }

    /// Release the native resource (`Attached → Detached`); a no-op otherwise
    pub fn detach(&self) -> Result<()> {
        self.inner.dispatcher.verify_access()?;
        match self.handler_state() {
            HandlerState::Attached => {}
            HandlerState::HandlerCreated => {
                let mut slot = self.lock_slot()?;
                slot.handler = None;
                slot.platform = None;
                slot.state = HandlerState::Unattached;
                return Ok(());
            }
            _ => return Ok(()),
        }

        // Raised while the native resource is still alive.
        let events = standard_events();
        let mut args = RoutedEventArgs::new(events.handle_destroyed.clone(), ());
        let event_result = raise(self, &events.handle_destroyed, &mut args);

        {
            let mut slot = self.lock_slot()?;
            if slot.state != HandlerState::Attached {
                return event_result;
            }
            if let Some(mut handler) = slot.handler.take() {
                handler.on_detach();
                if let Some(handle) = handler.native_handle() {
                    if let Err(e) = HandleRegistry::global().unregister(handle) {
                        log::error!("Failed to unregister native handle {}: {}", handle, e);
                    }
                }
                handler.destroy_native();
            }
            slot.platform = None;
            slot.state = HandlerState::Detached;
        }

        self.inner.dispatcher.untrack_attached(self.id());
        log::debug!("Detached control {}", self.id());
        event_result
    }

    /// Attach this control and then every descendant
    ///
    /// A failure on this control is returned; failures below it are logged and
    /// isolated to the failing node's subtree so siblings still attach.
    pub fn attach_tree(&self) -> Result<()> {
        self.attach()?;
        for child in self.children() {
            if let Err(e) = child.attach_tree() {
                log::warn!(
                    "Control {} could not be attached and will not render: {}",
                    child.id(),
                    e
                );
            }
        }
        Ok(())
    }

    /// Detach every descendant, then this control
    pub fn detach_tree(&self) -> Result<()> {
        let mut first_error = None;
        for child in self.children() {
            if let Err(e) = child.detach_tree() {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.detach() {
            first_error.get_or_insert(e);
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Tear the native peers of this subtree down and build them again
    ///
    /// Property values live on the controls and are pushed to the new handlers.
    pub fn recreate_handler(&self) -> Result<()> {
        self.check_handler_access()?;
        if !self.is_attached() {
            return Ok(());
        }
        log::debug!("Recreating handler of control {}", self.id());
        self.detach_tree()?;
        self.attach_tree()
    }

    /// Attach lazily when the handler is first needed
    pub fn ensure_handler(&self) -> Result<()> {
        if self.is_attached() {
            self.check_handler_access()
        } else {
            self.attach()
        }
    }

    /// Run `f` against the attached handler, attaching lazily
    pub fn with_handler<R>(&self, f: impl FnOnce(&mut dyn ControlHandler) -> R) -> Result<R> {
        self.ensure_handler()?;
        let mut slot = self.lock_slot()?;
        match slot.handler.as_mut() {
            Some(handler) => Ok(f(handler.as_mut())),
            None => Err(Error::ObjectDisposed(format!("handler of control {}", self.id()))),
        }
    }

    fn capability_error(&self, capability: &'static str) -> Error {
        Error::CapabilityNotSupported {
            kind: self.kind().name(),
            capability,
        }
    }

    /// Run `f` against the handler's text capability
    pub fn with_text_handler<R>(&self, f: impl FnOnce(&mut dyn TextHandler) -> R) -> Result<R> {
        self.with_handler(|h| h.text().map(f))?
            .ok_or_else(|| self.capability_error("text"))
    }

    /// Run `f` against the handler's scroll capability
    pub fn with_scroll_handler<R>(
        &self,
        f: impl FnOnce(&mut dyn ScrollHandler) -> R,
    ) -> Result<R> {
        self.with_handler(|h| h.scroll().map(f))?
            .ok_or_else(|| self.capability_error("scroll"))
    }

    /// Run `f` against the handler's focus capability
    pub fn with_focus_handler<R>(&self, f: impl FnOnce(&mut dyn FocusHandler) -> R) -> Result<R> {
        self.with_handler(|h| h.focus().map(f))?
            .ok_or_else(|| self.capability_error("focus"))
    }

    /// Run `f` against the handler's window capability
    pub fn with_window_handler<R>(
        &self,
        f: impl FnOnce(&mut dyn WindowHandler) -> R,
    ) -> Result<R> {
        self.with_handler(|h| h.window().map(f))?
            .ok_or_else(|| self.capability_error("window"))
    }

    /// Attach the subtree and show it; windows are also shown natively
    pub fn show(&self) -> Result<()> {
        self.check_mutable()?;
        self.set_visible(true)?;
        self.attach_tree()?;
        if self.kind().capabilities().contains(Capabilities::WINDOW) {
            self.with_window_handler(|w| w.show())?;
        }
        Ok(())
    }

    /// Hide the control without releasing its native resources
    pub fn hide(&self) -> Result<()> {
        self.check_mutable()?;
        self.set_visible(false)?;
        if self.is_attached() && self.kind().capabilities().contains(Capabilities::WINDOW) {
            self.with_window_handler(|w| w.hide())?;
        }
        Ok(())
    }

    /// Push a change to the handler if one is attached; never attaches
    pub(super) fn push_to_handler(&self, f: impl FnOnce(&mut dyn ControlHandler)) -> Result<()> {
        let mut slot = self.lock_slot()?;
        if slot.state == HandlerState::Attached {
            if let Some(handler) = slot.handler.as_mut() {
                f(handler.as_mut());
            }
        }
        Ok(())
    }

    pub(super) fn apply_style_to_handler(&self, style: crate::control::StyleFlags) -> Result<()> {
        let change = {
            let mut slot = self.lock_slot()?;
            match (slot.state, slot.handler.as_mut()) {
                (HandlerState::Attached, Some(handler)) => handler.apply_style(style),
                _ => return Ok(()),
            }
        };
        if change == StyleChange::RecreateRequired {
            self.recreate_handler()?;
        }
        Ok(())
    }

    /// Mark the control for repaint, via the closest ancestor with a native resource
    pub fn invalidate(&self) -> Result<()> {
        self.check_mutable()?;
        self.repaint_target(|h| h.invalidate())
    }

    /// Repaint invalidated regions now
    pub fn update(&self) -> Result<()> {
        self.check_mutable()?;
        self.repaint_target(|h| h.update())
    }

    fn repaint_target(&self, f: impl Fn(&mut dyn ControlHandler)) -> Result<()> {
        if self.native_handle().is_some() {
            return self.push_to_handler(f);
        }
        match self.ancestors().into_iter().find(|a| a.native_handle().is_some()) {
            Some(ancestor) => ancestor.push_to_handler(f),
            None => self.push_to_handler(f),
        }
    }

    /// Dispose this control and its subtree (`→ Disposed`, terminal)
    pub fn dispose(&self) -> Result<()> {
        self.inner.dispatcher.verify_access()?;
        if self.is_disposed() {
            return Ok(());
        }

        let mut first_error = None;
        for child in self.children() {
            if let Err(e) = child.dispose() {
                first_error.get_or_insert(e);
            }
        }
        if let Err(e) = self.detach() {
            first_error.get_or_insert(e);
        }

        if let Some(parent) = self.parent() {
            parent.unlink_child(self)?;
        }

        {
            let mut state = self.write_state()?;
            state.disposed = true;
            state.parent = None;
            state.children.clear();
        }
        {
            let mut slot = self.lock_slot()?;
            slot.handler = None;
            slot.platform = None;
            slot.state = HandlerState::Disposed;
        }
        if let Ok(mut handlers) = self.inner.handlers.write() {
            handlers.clear();
        }
        self.inner.dispatcher.forget_control(self.id());

        log::debug!("Disposed control {}", self.id());
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
