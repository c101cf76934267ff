//! Event routing through the control tree
//!
//! A raise takes a snapshot of the ancestor path before any handler runs, so
//! handlers that restructure the tree (or fail) cannot corrupt the walk of
//! this raise or of any other raise in flight.

use std::any::Any;

use crate::control::Control;
use crate::events::handlers::{ClassHandlers, Subscription};
use crate::events::{HandledBehavior, RoutedEvent, RoutedEventArgs, RoutingStrategy};
use crate::{Error, Result};

/// Snapshot of the path from a source control up to its root
#[derive(Debug, Clone)]
pub struct EventRoute {
    /// Source first, root last
    nodes: Vec<Control>,
}

impl EventRoute {
    /// Build the path by following `parent` from `source`
    pub fn build(source: &Control) -> Self {
        let mut nodes = vec![source.clone()];
        let mut current = source.parent();
        while let Some(parent) = current {
            current = parent.parent();
            nodes.push(parent);
        }
        Self { nodes }
    }

    /// The control the route starts at
    pub fn source(&self) -> &Control {
        &self.nodes[0]
    }

    /// The topmost ancestor
    pub fn root(&self) -> &Control {
        &self.nodes[self.nodes.len() - 1]
    }

    /// Nodes in source → root order
    pub fn nodes(&self) -> &[Control] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in the order `strategy` visits them
    fn visit_order(&self, strategy: RoutingStrategy) -> Vec<&Control> {
        match strategy {
            RoutingStrategy::Direct => vec![self.source()],
            RoutingStrategy::Bubble => self.nodes.iter().collect(),
            RoutingStrategy::Tunnel => self.nodes.iter().rev().collect(),
        }
    }

    /// Walk the route, invoking instance then class handlers at each node
    pub fn invoke<T: Send + 'static>(
        &self,
        event: &RoutedEvent,
        args: &mut RoutedEventArgs<T>,
        class_handlers: &ClassHandlers,
    ) -> Result<()> {
        let stop_on_handled = event.handled_behavior() == HandledBehavior::StopRoute;

        for node in self.visit_order(event.strategy()) {
            if stop_on_handled && args.handled() {
                log::trace!("{} handled; skipping control {}", event, node.id());
                break;
            }

            let instance = node.instance_handlers(event.id());
            if invoke_list(node, event, args, &instance, stop_on_handled, false)? {
                break;
            }

            let class = class_handlers.snapshot_for(node.control_type(), event.id());
            if invoke_list(node, event, args, &class, stop_on_handled, true)? {
                break;
            }
        }

        Ok(())
    }
}

/// Invoke `list` at `node`; returns `true` when the route must stop
fn invoke_list<T: Send + 'static>(
    node: &Control,
    event: &RoutedEvent,
    args: &mut RoutedEventArgs<T>,
    list: &[std::sync::Arc<Subscription>],
    stop_on_handled: bool,
    class_level: bool,
) -> Result<bool> {
    for subscription in list {
        if args.handled() {
            if stop_on_handled {
                return Ok(true);
            }
            if class_level && !subscription.handled_events_too() {
                continue;
            }
        }

        let erased: &mut dyn Any = &mut *args;
        subscription
            .invoke(node, erased)
            .map_err(|source| {
                log::debug!("Handler for {} on control {} failed: {}", event, node.id(), source);
                Error::HandlerFailed {
                    event: event.qualified_name(),
                    source,
                }
            })?;
    }
    Ok(false)
}

/// Raise `event` on `source` using the process-wide class handler table
pub fn raise<T: Send + 'static>(
    source: &Control,
    event: &RoutedEvent,
    args: &mut RoutedEventArgs<T>,
) -> Result<()> {
    raise_with(source, event, args, ClassHandlers::global())
}

/// Raise `event` on `source` against an explicit class handler table
pub fn raise_with<T: Send + 'static>(
    source: &Control,
    event: &RoutedEvent,
    args: &mut RoutedEventArgs<T>,
    class_handlers: &ClassHandlers,
) -> Result<()> {
    source.dispatcher().verify_access()?;
    event.check_args::<T>()?;

    if args.routed_event() != event {
        args.retarget(event.clone());
    }
    args.set_source(source.id());

    let route = EventRoute::build(source);
    log::trace!("Raising {} on control {} ({} nodes)", event, source.id(), route.len());
    route.invoke(event, args, class_handlers)
}

/// Raise a tunnel `preview` event followed by its bubbling `main` counterpart
///
/// The handled flag carries over from the preview pass, so main-pass handlers
/// observe it; whether they still run is decided by `main`'s handled behavior.
pub fn raise_pair<T: Send + 'static>(
    source: &Control,
    preview: &RoutedEvent,
    main: &RoutedEvent,
    args: &mut RoutedEventArgs<T>,
) -> Result<()> {
    raise(source, preview, args)?;
    raise(source, main, args)
}
