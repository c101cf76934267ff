//! Platform-independent control tree
//!
//! A [`Control`] is a shared handle to one node of the widget tree. The parent
//! owns its children through its child list; a child only holds a weak
//! back-reference to its parent. Properties live on the control, and all
//! native work is delegated to at most one attached
//! [`ControlHandler`](crate::handler::ControlHandler).
//!
//! Every mutation must happen on the thread of the control's dispatcher and
//! fails with [`Error::WrongThread`] elsewhere. Reads are allowed anywhere.

mod control_type;
mod lifecycle;
mod properties;
mod tree;

#[cfg(test)]
mod tests;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use crate::dispatcher::Dispatcher;
use crate::events::handlers::{InstanceHandlers, Subscription};
use crate::events::{
    raise, standard_events, HandlerToken, RoutedEvent, RoutedEventArgs, RoutedEventId,
    TextChangedData,
};
use crate::handler::{ControlHandler, HandlerState};
use crate::platform::NativePlatform;
use crate::{Error, Result};

pub use control_type::{
    Capabilities, ControlKind, ControlType, BUTTON, CHECK_BOX, CONTROL, LABEL, LIST_VIEW, PANEL,
    SCROLL_VIEWER, TEXT_BOX, WINDOW,
};
pub(crate) use control_type::TypeKey;
pub use properties::{names, Font, Point, PropertyBag, PropertyValue, Rect, StyleFlags};

/// Unique identifier for a control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlId(u64);

impl ControlId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Tree links and property values
struct ControlState {
    parent: Option<WeakControl>,
    children: Vec<Control>,
    properties: PropertyBag,
    disposed: bool,
}

/// The handler slot, guarded separately from the tree state
struct HandlerSlot {
    state: HandlerState,
    handler: Option<Box<dyn ControlHandler>>,
    /// Platform that built `handler`
    platform: Option<Arc<NativePlatform>>,
}

struct ControlInner {
    id: ControlId,
    control_type: &'static ControlType,
    dispatcher: Arc<Dispatcher>,
    state: RwLock<ControlState>,
    slot: Mutex<HandlerSlot>,
    handlers: RwLock<InstanceHandlers>,
}

/// Shared handle to a node in the control tree
#[derive(Clone)]
pub struct Control {
    inner: Arc<ControlInner>,
}

/// Non-owning reference to a control
#[derive(Clone)]
pub struct WeakControl {
    id: ControlId,
    inner: Weak<ControlInner>,
}

impl WeakControl {
    /// Get the control if it is still alive
    pub fn upgrade(&self) -> Option<Control> {
        self.inner.upgrade().map(|inner| Control { inner })
    }

    /// Id of the referenced control, valid even after it was dropped
    pub fn id(&self) -> ControlId {
        self.id
    }
}

impl fmt::Debug for WeakControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakControl").field("id", &self.id).finish()
    }
}

impl Control {
    /// Create a control of the given type on the calling thread's dispatcher
    pub fn new(control_type: &'static ControlType) -> Self {
        Self::with_dispatcher(control_type, Dispatcher::current())
    }

    /// Create a control bound to an explicit dispatcher
    pub fn with_dispatcher(control_type: &'static ControlType, dispatcher: Arc<Dispatcher>) -> Self {
        let control = Self {
            inner: Arc::new(ControlInner {
                id: ControlId::next(),
                control_type,
                dispatcher,
                state: RwLock::new(ControlState {
                    parent: None,
                    children: Vec::new(),
                    properties: PropertyBag::with_defaults(),
                    disposed: false,
                }),
                slot: Mutex::new(HandlerSlot {
                    state: HandlerState::Unattached,
                    handler: None,
                    platform: None,
                }),
                handlers: RwLock::new(InstanceHandlers::default()),
            }),
        };
        log::trace!("Created {} control {}", control_type, control.id());
        control
    }

    /// Create a top-level window
    pub fn window(title: &str) -> Self {
        let window = Self::new(&WINDOW);
        window.init_text(title);
        window
    }

    /// Create a panel
    pub fn panel() -> Self {
        Self::new(&PANEL)
    }

    /// Create a push button
    pub fn button(text: &str) -> Self {
        let button = Self::new(&BUTTON);
        button.init_text(text);
        button
    }

    /// Create a label
    pub fn label(text: &str) -> Self {
        let label = Self::new(&LABEL);
        label.init_text(text);
        label
    }

    /// Create a text box
    pub fn text_box() -> Self {
        Self::new(&TEXT_BOX)
    }

    fn init_text(&self, text: &str) {
        if let Ok(mut state) = self.inner.state.write() {
            state
                .properties
                .set(names::TEXT, PropertyValue::Text(text.to_string()));
        }
    }

    pub fn id(&self) -> ControlId {
        self.inner.id
    }

    /// Owner type of the control
    pub fn control_type(&self) -> &'static ControlType {
        self.inner.control_type
    }

    /// Native peer kind
    pub fn kind(&self) -> ControlKind {
        self.inner.control_type.kind()
    }

    /// Dispatcher owning this control's thread
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.inner.dispatcher
    }

    /// Create a non-owning reference
    pub fn downgrade(&self) -> WeakControl {
        WeakControl {
            id: self.inner.id,
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether `dispose` was called
    pub fn is_disposed(&self) -> bool {
        self.read_state().map(|s| s.disposed).unwrap_or(true)
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, ControlState>> {
        self.inner
            .state
            .read()
            .map_err(|_| Error::LockError(format!("Failed to read state of control {}", self.id())))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, ControlState>> {
        self.inner
            .state
            .write()
            .map_err(|_| Error::LockError(format!("Failed to lock state of control {}", self.id())))
    }

    fn lock_slot(&self) -> Result<MutexGuard<'_, HandlerSlot>> {
        self.inner
            .slot
            .lock()
            .map_err(|_| Error::LockError(format!("Failed to lock handler of control {}", self.id())))
    }

    /// Verify thread access and that the control is still alive
    fn check_mutable(&self) -> Result<()> {
        self.inner.dispatcher.verify_access()?;
        if self.is_disposed() {
            return Err(Error::ObjectDisposed(format!("control {}", self.id())));
        }
        Ok(())
    }

    // ---- properties -------------------------------------------------------

    /// Snapshot of all property values
    pub fn properties(&self) -> PropertyBag {
        self.read_state()
            .map(|s| s.properties.clone())
            .unwrap_or_default()
    }

    /// Get a property by name
    pub fn property(&self, name: &str) -> Option<PropertyValue> {
        self.read_state().ok()?.properties.get(name).cloned()
    }

    /// Set a property by name, pushing well-known properties to the handler
    pub fn set_property(&self, name: &str, value: PropertyValue) -> Result<()> {
        match (name, value) {
            (names::TEXT, PropertyValue::Text(text)) => self.set_text(&text),
            (names::BOUNDS, PropertyValue::Rect(rect)) => self.set_bounds(rect),
            (names::VISIBLE, PropertyValue::Bool(visible)) => self.set_visible(visible),
            (names::ENABLED, PropertyValue::Bool(enabled)) => self.set_enabled(enabled),
            (names::STYLE, PropertyValue::Style(style)) => self.set_style(style),
            (names::FONT, PropertyValue::Font(font)) => self.set_font(font),
            (name, value) => {
                self.check_mutable()?;
                self.write_state()?.properties.set(name, value);
                Ok(())
            }
        }
    }

    pub fn text(&self) -> String {
        self.read_state().map(|s| s.properties.text()).unwrap_or_default()
    }

    /// Set the text; raises `TextChanged` when the value changes
    pub fn set_text(&self, text: &str) -> Result<()> {
        self.check_mutable()?;
        let old_text = {
            let mut state = self.write_state()?;
            let old = state.properties.text();
            if old == text {
                return Ok(());
            }
            state
                .properties
                .set(names::TEXT, PropertyValue::Text(text.to_string()));
            old
        };

        self.push_to_handler(|handler| {
            if let Some(native) = handler.text() {
                native.set_text(text);
            }
        })?;

        let events = standard_events();
        let mut args = RoutedEventArgs::new(
            events.text_changed.clone(),
            TextChangedData {
                old_text,
                new_text: text.to_string(),
            },
        );
        raise(self, &events.text_changed, &mut args)
    }

    pub fn bounds(&self) -> Rect {
        self.read_state().map(|s| s.properties.bounds()).unwrap_or_default()
    }

    pub fn set_bounds(&self, bounds: Rect) -> Result<()> {
        self.check_mutable()?;
        self.write_state()?
            .properties
            .set(names::BOUNDS, PropertyValue::Rect(bounds));
        self.push_to_handler(|handler| handler.set_bounds(bounds))
    }

    pub fn visible(&self) -> bool {
        self.read_state().map(|s| s.properties.visible()).unwrap_or(false)
    }

    pub fn set_visible(&self, visible: bool) -> Result<()> {
        self.check_mutable()?;
        self.write_state()?
            .properties
            .set(names::VISIBLE, PropertyValue::Bool(visible));
        self.push_to_handler(|handler| handler.set_visible(visible))
    }

    pub fn enabled(&self) -> bool {
        self.read_state().map(|s| s.properties.enabled()).unwrap_or(false)
    }

    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.check_mutable()?;
        self.write_state()?
            .properties
            .set(names::ENABLED, PropertyValue::Bool(enabled));
        self.push_to_handler(|handler| handler.set_enabled(enabled))
    }

    pub fn font(&self) -> Font {
        self.read_state().map(|s| s.properties.font()).unwrap_or_default()
    }

    pub fn set_font(&self, font: Font) -> Result<()> {
        self.check_mutable()?;
        self.write_state()?
            .properties
            .set(names::FONT, PropertyValue::Font(font.clone()));
        self.push_to_handler(|handler| handler.set_font(&font))
    }

    pub fn style(&self) -> StyleFlags {
        self.read_state().map(|s| s.properties.style()).unwrap_or_default()
    }

    /// Set style flags; recreates the handler if the backend cannot apply them in place
    pub fn set_style(&self, style: StyleFlags) -> Result<()> {
        self.check_mutable()?;
        {
            let mut state = self.write_state()?;
            if state.properties.style() == style {
                return Ok(());
            }
            state
                .properties
                .set(names::STYLE, PropertyValue::Style(style));
        }
        self.apply_style_to_handler(style)
    }

    // ---- events -----------------------------------------------------------

    /// Subscribe `handler` to `event` on this control
    pub fn add_handler<T, F>(&self, event: &RoutedEvent, handler: F) -> Result<HandlerToken>
    where
        T: Send + 'static,
        F: Fn(&Control, &mut RoutedEventArgs<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.check_mutable()?;
        event.check_args::<T>()?;
        let mut handlers = self.inner.handlers.write().map_err(|_| {
            Error::LockError(format!("Failed to lock handlers of control {}", self.id()))
        })?;
        Ok(handlers.add(Subscription::new(event, false, handler)))
    }

    /// Remove a subscription; returns whether it existed
    pub fn remove_handler(&self, token: HandlerToken) -> Result<bool> {
        self.inner.dispatcher.verify_access()?;
        let mut handlers = self.inner.handlers.write().map_err(|_| {
            Error::LockError(format!("Failed to lock handlers of control {}", self.id()))
        })?;
        Ok(handlers.remove(token))
    }

    /// Number of instance handlers subscribed to `event`
    pub fn handler_count(&self, event: &RoutedEvent) -> usize {
        self.inner
            .handlers
            .read()
            .map(|h| h.count(event.id()))
            .unwrap_or(0)
    }

    pub(crate) fn instance_handlers(&self, event: RoutedEventId) -> Vec<Arc<Subscription>> {
        self.inner
            .handlers
            .read()
            .map(|h| h.snapshot(event))
            .unwrap_or_default()
    }

    /// Raise `event` on this control with `data`, returning the routed arguments
    pub fn raise_event<T: Send + 'static>(
        &self,
        event: &RoutedEvent,
        data: T,
    ) -> Result<RoutedEventArgs<T>> {
        let mut args = RoutedEventArgs::new(event.clone(), data);
        raise(self, event, &mut args)?;
        Ok(args)
    }
}

impl PartialEq for Control {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Control {}

impl std::hash::Hash for Control {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Control")
            .field("id", &self.inner.id)
            .field("type", &self.inner.control_type.name())
            .field(
                "handler_state",
                &self.inner.slot.try_lock().ok().map(|slot| slot.state),
            )
            .finish()
    }
}
