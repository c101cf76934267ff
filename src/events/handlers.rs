//! Instance and class handler storage
//!
//! Handlers are stored type-erased and downcast back to `RoutedEventArgs<T>`
//! on invocation. The payload type is checked against the descriptor when
//! subscribing, so the downcast cannot fail at raise time.

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, RwLock};

use crate::control::{Control, ControlType, TypeKey};
use crate::events::{RoutedEvent, RoutedEventArgs, RoutedEventId};
use crate::{Error, Result};

/// Type alias for an erased handler function
type ErasedHandler = Box<dyn Fn(&Control, &mut dyn Any) -> anyhow::Result<()> + Send + Sync>;

/// Identifies one subscription so it can be removed later
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerToken {
    event: RoutedEventId,
    id: u64,
}

impl HandlerToken {
    fn next(event: RoutedEventId) -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self {
            event,
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Event this token subscribes to
    pub fn event(&self) -> RoutedEventId {
        self.event
    }
}

/// One registered delegate
pub(crate) struct Subscription {
    token: HandlerToken,
    handled_events_too: bool,
    handler: ErasedHandler,
}

impl Subscription {
    pub(crate) fn new<T, F>(event: &RoutedEvent, handled_events_too: bool, handler: F) -> Self
    where
        T: Send + 'static,
        F: Fn(&Control, &mut RoutedEventArgs<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let name = event.qualified_name();
        let erased: ErasedHandler = Box::new(move |sender, args| {
            match args.downcast_mut::<RoutedEventArgs<T>>() {
                Some(args) => handler(sender, args),
                None => Err(anyhow::anyhow!("argument type mismatch while routing {}", name)),
            }
        });

        Self {
            token: HandlerToken::next(event.id()),
            handled_events_too,
            handler: erased,
        }
    }

    pub(crate) fn token(&self) -> HandlerToken {
        self.token
    }

    pub(crate) fn handled_events_too(&self) -> bool {
        self.handled_events_too
    }

    pub(crate) fn invoke(&self, sender: &Control, args: &mut dyn Any) -> anyhow::Result<()> {
        (self.handler)(sender, args)
    }
}

/// Per-control handler lists, in subscription order
#[derive(Default)]
pub(crate) struct InstanceHandlers {
    handlers: HashMap<RoutedEventId, Vec<Arc<Subscription>>>,
}

impl InstanceHandlers {
    pub(crate) fn add(&mut self, subscription: Subscription) -> HandlerToken {
        let token = subscription.token();
        self.handlers
            .entry(token.event)
            .or_default()
            .push(Arc::new(subscription));
        token
    }

    pub(crate) fn remove(&mut self, token: HandlerToken) -> bool {
        let Some(list) = self.handlers.get_mut(&token.event) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.token() != token);
        let removed = list.len() != before;
        if list.is_empty() {
            self.handlers.remove(&token.event);
        }
        removed
    }

    /// Copy of the handler list, so handlers may (un)subscribe while routing
    pub(crate) fn snapshot(&self, event: RoutedEventId) -> Vec<Arc<Subscription>> {
        self.handlers.get(&event).cloned().unwrap_or_default()
    }

    pub(crate) fn count(&self, event: RoutedEventId) -> usize {
        self.handlers.get(&event).map(Vec::len).unwrap_or(0)
    }

    pub(crate) fn clear(&mut self) {
        self.handlers.clear();
    }
}

/// Class-level default handlers keyed by (control type, event)
///
/// At each node of a route, class handlers for the node's type chain run
/// after that node's instance handlers, most derived type first.
#[derive(Default)]
pub struct ClassHandlers {
    handlers: RwLock<HashMap<(TypeKey, RoutedEventId), Vec<Arc<Subscription>>>>,
}

impl ClassHandlers {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide table consulted by [`Control::raise_event`]
    pub fn global() -> &'static ClassHandlers {
        static GLOBAL: OnceLock<ClassHandlers> = OnceLock::new();
        GLOBAL.get_or_init(ClassHandlers::new)
    }

    /// Register a default action for `event` on controls of `class` (and derived types)
    pub fn register<T, F>(
        &self,
        class: &'static ControlType,
        event: &RoutedEvent,
        handled_events_too: bool,
        handler: F,
    ) -> Result<HandlerToken>
    where
        T: Send + 'static,
        F: Fn(&Control, &mut RoutedEventArgs<T>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        event.check_args::<T>()?;
        let subscription = Subscription::new(event, handled_events_too, handler);
        let token = subscription.token();

        let mut handlers = self
            .handlers
            .write()
            .map_err(|_| Error::LockError("Failed to lock class handlers".to_string()))?;
        handlers
            .entry((class.key(), event.id()))
            .or_default()
            .push(Arc::new(subscription));

        log::debug!("Registered class handler for {} on {}", event, class);
        Ok(token)
    }

    /// Remove a class handler
    pub fn unregister(&self, class: &'static ControlType, token: HandlerToken) -> bool {
        let Ok(mut handlers) = self.handlers.write() else {
            return false;
        };
        let Some(list) = handlers.get_mut(&(class.key(), token.event)) else {
            return false;
        };
        let before = list.len();
        list.retain(|s| s.token() != token);
        before != list.len()
    }

    pub(crate) fn snapshot_for(
        &self,
        class: &'static ControlType,
        event: RoutedEventId,
    ) -> Vec<Arc<Subscription>> {
        let Ok(handlers) = self.handlers.read() else {
            return Vec::new();
        };
        class
            .chain()
            .filter_map(|ty| handlers.get(&(ty.key(), event)))
            .flat_map(|list| list.iter().cloned())
            .collect()
    }
}
