//! Routed event descriptors

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::control::ControlType;

/// How a routed event travels through the control tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RoutingStrategy {
    /// Root to source
    Tunnel,
    /// Source to root
    Bubble,
    /// Source only
    Direct,
}

/// What setting `handled` does to the rest of the route
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandledBehavior {
    /// Remaining handlers and nodes are skipped
    StopRoute,
    /// Remaining instance handlers still run; class handlers are skipped
    /// unless registered with `handled_events_too`
    ContinueRoute,
}

impl HandledBehavior {
    /// Behavior used when an event is registered without an explicit choice
    pub fn default_for(strategy: RoutingStrategy) -> Self {
        match strategy {
            RoutingStrategy::Tunnel => HandledBehavior::StopRoute,
            RoutingStrategy::Bubble | RoutingStrategy::Direct => HandledBehavior::ContinueRoute,
        }
    }
}

/// Unique id of a registered routed event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutedEventId(u64);

impl RoutedEventId {
    fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value
    pub fn value(&self) -> u64 {
        self.0
    }
}

#[derive(Debug)]
struct RoutedEventInner {
    id: RoutedEventId,
    name: String,
    owner: &'static ControlType,
    strategy: RoutingStrategy,
    handled_behavior: HandledBehavior,
    args_type: TypeId,
    args_type_name: &'static str,
}

/// Immutable, shareable routed event descriptor
///
/// Created only through [`EventRegistry`](super::EventRegistry). Equality is
/// identity: two registrations never compare equal.
#[derive(Debug, Clone)]
pub struct RoutedEvent {
    inner: Arc<RoutedEventInner>,
}

impl RoutedEvent {
    pub(crate) fn new<T: 'static>(
        name: &str,
        owner: &'static ControlType,
        strategy: RoutingStrategy,
        handled_behavior: HandledBehavior,
    ) -> Self {
        Self {
            inner: Arc::new(RoutedEventInner {
                id: RoutedEventId::next(),
                name: name.to_string(),
                owner,
                strategy,
                handled_behavior,
                args_type: TypeId::of::<T>(),
                args_type_name: std::any::type_name::<T>(),
            }),
        }
    }

    pub fn id(&self) -> RoutedEventId {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Type that registered the event
    pub fn owner(&self) -> &'static ControlType {
        self.inner.owner
    }

    pub fn strategy(&self) -> RoutingStrategy {
        self.inner.strategy
    }

    pub fn handled_behavior(&self) -> HandledBehavior {
        self.inner.handled_behavior
    }

    /// Name of the payload type handlers receive
    pub fn args_type_name(&self) -> &'static str {
        self.inner.args_type_name
    }

    /// Whether `T` is the payload type handlers of this event receive
    pub fn accepts<T: 'static>(&self) -> bool {
        self.inner.args_type == TypeId::of::<T>()
    }

    /// Fail with `HandlerTypeMismatch` unless `T` is the payload type
    pub(crate) fn check_args<T: 'static>(&self) -> crate::Result<()> {
        if self.accepts::<T>() {
            Ok(())
        } else {
            Err(crate::Error::HandlerTypeMismatch {
                event: self.qualified_name(),
                expected: self.inner.args_type_name,
                got: std::any::type_name::<T>(),
            })
        }
    }

    /// `Owner.Name`, for diagnostics
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.inner.owner.name(), self.inner.name)
    }
}

impl PartialEq for RoutedEvent {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for RoutedEvent {}

impl Hash for RoutedEvent {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Display for RoutedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?})", self.qualified_name(), self.inner.strategy)
    }
}
