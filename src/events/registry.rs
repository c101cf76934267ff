//! Routed event registry
//!
//! Registration is guarded by a single lock because several static
//! initializers may register events concurrently at startup. Raising an event
//! never touches the registry; descriptors are passed around directly.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::control::{ControlType, TypeKey};
use crate::events::{standard_events, HandledBehavior, RoutedEvent, RoutingStrategy};
use crate::{Error, Result};

/// Table of routed event descriptors keyed by (owner type, name)
#[derive(Debug, Default)]
pub struct EventRegistry {
    events: RwLock<HashMap<(TypeKey, String), RoutedEvent>>,
}

impl EventRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry
    ///
    /// The built-in events are registered before this returns, so a user
    /// registration that collides with one fails with
    /// [`Error::DuplicateRegistration`] instead of shadowing it.
    pub fn global() -> &'static EventRegistry {
        standard_events();
        Self::global_table()
    }

    /// The process-wide table without forcing the built-in events
    pub(crate) fn global_table() -> &'static EventRegistry {
        static GLOBAL: OnceLock<EventRegistry> = OnceLock::new();
        GLOBAL.get_or_init(EventRegistry::new)
    }

    /// Register an event whose handlers receive `RoutedEventArgs<T>`
    ///
    /// `handled` behavior defaults per strategy, see [`HandledBehavior::default_for`].
    pub fn register<T: Send + 'static>(
        &self,
        name: &str,
        owner: &'static ControlType,
        strategy: RoutingStrategy,
    ) -> Result<RoutedEvent> {
        self.register_with::<T>(name, owner, strategy, HandledBehavior::default_for(strategy))
    }

    /// Register an event with an explicit handled behavior
    pub fn register_with<T: Send + 'static>(
        &self,
        name: &str,
        owner: &'static ControlType,
        strategy: RoutingStrategy,
        handled_behavior: HandledBehavior,
    ) -> Result<RoutedEvent> {
        let mut events = self
            .events
            .write()
            .map_err(|_| Error::LockError("Failed to lock event registry".to_string()))?;

        let key = (owner.key(), name.to_string());
        if events.contains_key(&key) {
            return Err(Error::DuplicateRegistration {
                name: name.to_string(),
                owner: owner.name(),
            });
        }

        let event = RoutedEvent::new::<T>(name, owner, strategy, handled_behavior);
        log::debug!("Registered routed event {}", event);
        events.insert(key, event.clone());
        Ok(event)
    }

    /// Look `name` up on `owner`, then on each of its base types
    pub fn find_by_name(&self, name: &str, owner: &'static ControlType) -> Result<RoutedEvent> {
        let events = self
            .events
            .read()
            .map_err(|_| Error::LockError("Failed to read event registry".to_string()))?;

        owner
            .chain()
            .find_map(|ty| events.get(&(ty.key(), name.to_string())).cloned())
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
                owner: owner.name(),
            })
    }

    /// All events owned directly by `owner`
    pub fn events_of(&self, owner: &ControlType) -> Vec<RoutedEvent> {
        match self.events.read() {
            Ok(events) => {
                let mut found: Vec<RoutedEvent> = events
                    .iter()
                    .filter(|((ty, _), _)| *ty == owner.key())
                    .map(|(_, e)| e.clone())
                    .collect();
                found.sort_by_key(|e| e.id());
                found
            }
            Err(_) => Vec::new(),
        }
    }

    /// Number of registered events
    pub fn len(&self) -> usize {
        self.events.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
