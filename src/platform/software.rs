//! Software window system backend
//!
//! [`SoftwareWindowSystem`] is an in-process window system: it hands out
//! native handles, stores a widget record per handle and queues native input
//! that any thread may post. It enforces the native-resource protocol that real
//! toolkits rely on (create before use, destroy exactly once, style bits that
//! can only be set at creation) and records violations instead of crashing,
//! so tests can assert on them.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::control::{Capabilities, ControlKind, Font, Point, Rect, StyleFlags};
use crate::dispatcher::{InputManager, NativeInput};
use crate::handler::{
    clamp_scroll_position, ControlHandler, FocusHandler, HandlerContext, NativeHandle,
    ScrollHandler, StyleChange, TextHandler, WindowHandler,
};
use crate::platform::{MessagePump, NativePlatform, PlatformKind};
use crate::{Error, Result};

/// Backend name reported by software handlers
pub const BACKEND_NAME: &str = "software";

/// Native widget record
#[derive(Debug, Clone, PartialEq)]
pub struct NativeWidget {
    pub kind: ControlKind,
    pub style: StyleFlags,
    pub parent: Option<NativeHandle>,
    pub text: String,
    pub bounds: Rect,
    pub visible: bool,
    pub enabled: bool,
    pub font: Font,
    /// Whether a handler listens to this widget's callbacks
    pub subscribed: bool,
    pub shown: bool,
    pub focused: bool,
    pub invalidated: bool,
    /// Number of completed repaints
    pub repaints: u32,
    pub extent: (f32, f32),
    pub scroll_position: Point,
}

impl NativeWidget {
    fn new(kind: ControlKind, style: StyleFlags, parent: Option<NativeHandle>) -> Self {
        Self {
            kind,
            style,
            parent,
            text: String::new(),
            bounds: Rect::default(),
            visible: true,
            enabled: true,
            font: Font::default(),
            subscribed: false,
            shown: false,
            focused: false,
            invalidated: false,
            repaints: 0,
            extent: (0.0, 0.0),
            scroll_position: Point::default(),
        }
    }
}

#[derive(Debug, Default)]
struct SystemState {
    widgets: HashMap<NativeHandle, NativeWidget>,
    destroyed: HashSet<NativeHandle>,
    unsupported: HashSet<ControlKind>,
    failing: HashSet<ControlKind>,
    violations: Vec<String>,
}

impl SystemState {
    fn violation(&mut self, message: String) {
        log::error!("Native protocol violation: {}", message);
        self.violations.push(message);
    }
}

/// In-process window system
#[derive(Debug)]
pub struct SoftwareWindowSystem {
    state: Mutex<SystemState>,
    input: Mutex<VecDeque<(NativeHandle, NativeInput)>>,
    next_handle: AtomicU64,
}

impl SoftwareWindowSystem {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(SystemState::default()),
            input: Mutex::new(VecDeque::new()),
            next_handle: AtomicU64::new(0x1000),
        })
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SystemState>> {
        self.state
            .lock()
            .map_err(|_| Error::LockError("Failed to lock software window system".to_string()))
    }

    /// Build a platform creating handlers on this window system
    ///
    /// Kinds marked unsupported before this call get no constructor and fall
    /// back to headless handlers.
    pub fn platform(self: &Arc<Self>) -> Arc<NativePlatform> {
        let unsupported = self
            .lock_state()
            .map(|s| s.unsupported.clone())
            .unwrap_or_default();

        let mut builder = NativePlatform::builder(BACKEND_NAME, PlatformKind::Software)
            .pump(self.clone() as Arc<dyn MessagePump>);
        for kind in ControlKind::ALL {
            if unsupported.contains(&kind) {
                continue;
            }
            let system = self.clone();
            builder = builder.handler(kind, move |ctx| {
                let handler: Box<dyn ControlHandler> =
                    Box::new(SoftwareHandler::new(system.clone(), ctx.kind));
                Ok(handler)
            });
        }
        builder.build()
    }

    /// Mark `kind` as having no native widget on this system
    pub fn mark_unsupported(&self, kind: ControlKind) {
        if let Ok(mut state) = self.lock_state() {
            state.unsupported.insert(kind);
        }
    }

    /// Make widget creation for `kind` fail (or succeed again)
    pub fn set_creation_fails(&self, kind: ControlKind, fails: bool) {
        if let Ok(mut state) = self.lock_state() {
            if fails {
                state.failing.insert(kind);
            } else {
                state.failing.remove(&kind);
            }
        }
    }

    /// Create a native widget
    pub fn create_widget(
        &self,
        kind: ControlKind,
        style: StyleFlags,
        parent: Option<NativeHandle>,
    ) -> Result<NativeHandle> {
        let mut state = self.lock_state()?;
        if state.failing.contains(&kind) {
            return Err(Error::HandlerCreationFailed {
                kind: kind.name(),
                reason: "the window system refused to create the widget".to_string(),
            });
        }
        if let Some(parent) = parent {
            if !state.widgets.contains_key(&parent) {
                return Err(Error::HandlerCreationFailed {
                    kind: kind.name(),
                    reason: format!("parent widget {} does not exist", parent),
                });
            }
        }

        let handle = NativeHandle(self.next_handle.fetch_add(1, Ordering::Relaxed));
        state.widgets.insert(handle, NativeWidget::new(kind, style, parent));
        log::trace!("Created native {} widget {}", kind, handle);
        Ok(handle)
    }

    /// Destroy a native widget; returns false (and records a violation) if it
    /// was already destroyed or never existed
    pub fn destroy_widget(&self, handle: NativeHandle) -> bool {
        let Ok(mut state) = self.lock_state() else {
            return false;
        };
        if state.widgets.remove(&handle).is_none() {
            let message = if state.destroyed.contains(&handle) {
                format!("widget {} destroyed twice", handle)
            } else {
                format!("destroy of unknown widget {}", handle)
            };
            state.violation(message);
            return false;
        }
        state.destroyed.insert(handle);
        drop(state);

        if let Ok(mut input) = self.input.lock() {
            input.retain(|(h, _)| *h != handle);
        }
        log::trace!("Destroyed native widget {}", handle);
        true
    }

    /// Mutate a live widget; records a violation when it does not exist
    pub fn modify(&self, handle: NativeHandle, f: impl FnOnce(&mut NativeWidget)) -> bool {
        let Ok(mut state) = self.lock_state() else {
            return false;
        };
        match state.widgets.get_mut(&handle) {
            Some(widget) => {
                f(widget);
                true
            }
            None => {
                state.violation(format!("use of widget {} that does not exist", handle));
                false
            }
        }
    }

    fn read<R>(&self, handle: NativeHandle, f: impl FnOnce(&NativeWidget) -> R) -> Option<R> {
        let state = self.lock_state().ok()?;
        state.widgets.get(&handle).map(f)
    }

    /// Snapshot of a live widget
    pub fn widget(&self, handle: NativeHandle) -> Option<NativeWidget> {
        self.read(handle, NativeWidget::clone)
    }

    pub fn is_alive(&self, handle: NativeHandle) -> bool {
        self.read(handle, |_| ()).is_some()
    }

    /// Number of live widgets
    pub fn live_widgets(&self) -> usize {
        self.lock_state().map(|s| s.widgets.len()).unwrap_or(0)
    }

    /// Protocol violations recorded so far
    pub fn violations(&self) -> Vec<String> {
        self.lock_state()
            .map(|s| s.violations.clone())
            .unwrap_or_default()
    }

    fn set_focus(&self, handle: NativeHandle) {
        if let Ok(mut state) = self.lock_state() {
            if !state.widgets.contains_key(&handle) {
                state.violation(format!("focus of widget {} that does not exist", handle));
                return;
            }
            for (h, widget) in state.widgets.iter_mut() {
                widget.focused = *h == handle;
            }
        }
    }

    /// Queue native input for `handle`; callable from any thread
    ///
    /// Queued input is delivered by the message pump on the UI thread.
    pub fn post_input(&self, handle: NativeHandle, input: NativeInput) {
        if let Ok(mut queue) = self.input.lock() {
            queue.push_back((handle, input));
        }
    }

    /// Fire the native callback for `handle` on the calling thread
    ///
    /// Returns false when nobody listens to the widget.
    pub fn send_input(&self, handle: NativeHandle, input: NativeInput) -> Result<bool> {
        if !self.read(handle, |w| w.subscribed).unwrap_or(false) {
            log::trace!("Dropping {:?} for unsubscribed widget {}", input, handle);
            return Ok(false);
        }
        InputManager::deliver(handle, input)
    }
}

impl MessagePump for SoftwareWindowSystem {
    fn pump_messages(&self) -> usize {
        let pending: Vec<(NativeHandle, NativeInput)> = match self.input.lock() {
            Ok(mut queue) => queue.drain(..).collect(),
            Err(_) => return 0,
        };
        let count = pending.len();
        for (handle, input) in pending {
            if let Err(e) = self.send_input(handle, input) {
                log::warn!("Native input for widget {} was dropped: {}", handle, e);
            }
        }
        count
    }

    fn has_pending_input(&self) -> bool {
        self.input.lock().map(|q| !q.is_empty()).unwrap_or(false)
    }
}

/// Handler backed by a [`SoftwareWindowSystem`] widget
#[derive(Debug)]
pub struct SoftwareHandler {
    system: Arc<SoftwareWindowSystem>,
    kind: ControlKind,
    capabilities: Capabilities,
    handle: Option<NativeHandle>,
}

impl SoftwareHandler {
    pub fn new(system: Arc<SoftwareWindowSystem>, kind: ControlKind) -> Self {
        Self {
            system,
            kind,
            capabilities: kind.capabilities(),
            handle: None,
        }
    }

    fn modify(&self, f: impl FnOnce(&mut NativeWidget)) {
        match self.handle {
            Some(handle) => {
                self.system.modify(handle, f);
            }
            None => log::error!("{} handler used before its widget was created", self.kind),
        }
    }

    fn read<R: Default>(&self, f: impl FnOnce(&NativeWidget) -> R) -> R {
        self.handle
            .and_then(|handle| self.system.read(handle, f))
            .unwrap_or_default()
    }

    fn has(&self, capability: Capabilities) -> bool {
        self.capabilities.contains(capability)
    }
}

impl ControlHandler for SoftwareHandler {
    fn backend_name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn kind(&self) -> ControlKind {
        self.kind
    }

    fn create_native(&mut self, context: &HandlerContext) -> Result<()> {
        if self.handle.is_some() {
            return Ok(());
        }
        self.handle = Some(
            self.system
                .create_widget(self.kind, context.style, context.parent_handle)?,
        );
        Ok(())
    }

    fn is_native_created(&self) -> bool {
        self.handle.is_some_and(|h| self.system.is_alive(h))
    }

    fn native_handle(&self) -> Option<NativeHandle> {
        self.handle
    }

    fn on_attach(&mut self) -> Result<()> {
        let handle = self.handle.ok_or_else(|| Error::HandlerCreationFailed {
            kind: self.kind.name(),
            reason: "attach before the widget was created".to_string(),
        })?;
        if !self.system.modify(handle, |w| w.subscribed = true) {
            return Err(Error::ObjectDisposed(format!("native widget {}", handle)));
        }
        Ok(())
    }

    fn on_detach(&mut self) {
        self.modify(|w| w.subscribed = false);
    }

    fn destroy_native(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.system.destroy_widget(handle);
        }
    }

    fn apply_style(&mut self, style: StyleFlags) -> StyleChange {
        let Some(current) = self.handle.and_then(|h| self.system.read(h, |w| w.style)) else {
            return StyleChange::Applied;
        };
        let changed = current.symmetric_difference(style);
        if changed.intersects(StyleFlags::RECREATE_MASK) {
            log::debug!("Style change {:?} on {} needs a new widget", changed, self.kind);
            return StyleChange::RecreateRequired;
        }
        self.modify(|w| w.style = style);
        StyleChange::Applied
    }

    fn set_bounds(&mut self, bounds: Rect) {
        self.modify(|w| w.bounds = bounds);
    }

    fn set_visible(&mut self, visible: bool) {
        self.modify(|w| w.visible = visible);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.modify(|w| w.enabled = enabled);
    }

    fn set_font(&mut self, font: &Font) {
        self.modify(|w| w.font = font.clone());
    }

    fn invalidate(&mut self) {
        self.modify(|w| w.invalidated = true);
    }

    fn update(&mut self) {
        self.modify(|w| {
            if w.invalidated {
                w.invalidated = false;
                w.repaints += 1;
            }
        });
    }

    fn focus(&mut self) -> Option<&mut dyn FocusHandler> {
        if self.has(Capabilities::FOCUS) {
            Some(self)
        } else {
            None
        }
    }

    fn text(&mut self) -> Option<&mut dyn TextHandler> {
        if self.has(Capabilities::TEXT) {
            Some(self)
        } else {
            None
        }
    }

    fn scroll(&mut self) -> Option<&mut dyn ScrollHandler> {
        if self.has(Capabilities::SCROLL) {
            Some(self)
        } else {
            None
        }
    }

    fn window(&mut self) -> Option<&mut dyn WindowHandler> {
        if self.has(Capabilities::WINDOW) {
            Some(self)
        } else {
            None
        }
    }
}

impl FocusHandler for SoftwareHandler {
    fn set_focus(&mut self) {
        match self.handle {
            Some(handle) => self.system.set_focus(handle),
            None => log::error!("{} handler focused before its widget was created", self.kind),
        }
    }

    fn has_focus(&self) -> bool {
        self.read(|w| w.focused)
    }

    fn kill_focus(&mut self) {
        self.modify(|w| w.focused = false);
    }
}

impl TextHandler for SoftwareHandler {
    fn set_text(&mut self, text: &str) {
        self.modify(|w| w.text = text.to_string());
    }

    fn text(&self) -> String {
        self.read(|w| w.text.clone())
    }
}

impl ScrollHandler for SoftwareHandler {
    fn set_extent(&mut self, width: f32, height: f32) {
        self.modify(|w| w.extent = (width, height));
    }

    fn set_scroll_position(&mut self, position: Point) {
        self.modify(|w| w.scroll_position = clamp_scroll_position(position, w.extent));
    }

    fn scroll_position(&self) -> Point {
        self.read(|w| w.scroll_position)
    }
}

impl WindowHandler for SoftwareHandler {
    fn show(&mut self) {
        self.modify(|w| w.shown = true);
    }

    fn hide(&mut self) {
        self.modify(|w| w.shown = false);
    }

    fn is_shown(&self) -> bool {
        self.read(|w| w.shown)
    }

    fn activate(&mut self) {
        match self.handle {
            Some(handle) => {
                self.system.modify(handle, |w| w.shown = true);
                self.system.set_focus(handle);
            }
            None => log::error!("{} handler activated before its widget was created", self.kind),
        }
    }
}
