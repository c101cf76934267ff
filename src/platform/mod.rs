//! Native platform factories
//!
//! A [`NativePlatform`] maps each [`ControlKind`] to a constructor for the
//! backend's handler. Kinds the backend has no constructor for fall back to
//! the headless handler, so every control can be attached on every platform.
//! The platform also exposes the backend's [`MessagePump`], which the
//! dispatcher drives from its run loop.

pub mod headless;
pub mod software;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::control::ControlKind;
use crate::handler::{ControlHandler, HandlerContext};
use crate::Result;

pub use headless::PlessHandler;
pub use software::{NativeWidget, SoftwareHandler, SoftwareWindowSystem};

/// Backends that can be selected by configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformKind {
    /// No native resources; properties are mirrored in memory
    Headless,
    /// In-process window system with native handles and injectable input
    Software,
}

/// Constructor producing a handler for one control
pub type HandlerConstructor =
    Arc<dyn Fn(&HandlerContext) -> Result<Box<dyn ControlHandler>> + Send + Sync>;

/// The backend's native event source
pub trait MessagePump: Send + Sync {
    /// Dispatch pending native messages; returns how many were handled
    fn pump_messages(&self) -> usize;

    /// Whether native input is waiting to be pumped
    fn has_pending_input(&self) -> bool;
}

/// Pump of backends without a native event source
#[derive(Debug, Default)]
pub struct NullPump;

impl MessagePump for NullPump {
    fn pump_messages(&self) -> usize {
        0
    }

    fn has_pending_input(&self) -> bool {
        false
    }
}

/// Handler factory for one backend
pub struct NativePlatform {
    name: String,
    kind: PlatformKind,
    constructors: HashMap<ControlKind, HandlerConstructor>,
    pump: Arc<dyn MessagePump>,
}

impl fmt::Debug for NativePlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut kinds: Vec<&str> = self.constructors.keys().map(|k| k.name()).collect();
        kinds.sort_unstable();
        f.debug_struct("NativePlatform")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("supported", &kinds)
            .finish()
    }
}

impl NativePlatform {
    /// Start building a platform
    pub fn builder(name: impl Into<String>, kind: PlatformKind) -> PlatformBuilder {
        PlatformBuilder {
            name: name.into(),
            kind,
            constructors: HashMap::new(),
            pump: Arc::new(NullPump),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PlatformKind {
        self.kind
    }

    /// The backend's message pump
    pub fn pump(&self) -> Arc<dyn MessagePump> {
        self.pump.clone()
    }

    /// Whether the backend has its own handler for `kind`
    pub fn supports(&self, kind: ControlKind) -> bool {
        self.constructors.contains_key(&kind)
    }

    /// Create the handler for a control
    ///
    /// Unsupported kinds get a headless handler. A constructor error is
    /// returned as is (normally [`Error::HandlerCreationFailed`](crate::Error::HandlerCreationFailed)).
    pub fn create_handler(&self, context: &HandlerContext) -> Result<Box<dyn ControlHandler>> {
        match self.constructors.get(&context.kind) {
            Some(constructor) => constructor(context),
            None => {
                log::debug!(
                    "{} has no {} handler, using headless fallback",
                    self.name,
                    context.kind
                );
                Ok(headless::create_handler(context))
            }
        }
    }
}

/// Builder for [`NativePlatform`]
pub struct PlatformBuilder {
    name: String,
    kind: PlatformKind,
    constructors: HashMap<ControlKind, HandlerConstructor>,
    pump: Arc<dyn MessagePump>,
}

impl PlatformBuilder {
    /// Register the constructor for `kind`, replacing any previous one
    pub fn handler<F>(mut self, kind: ControlKind, constructor: F) -> Self
    where
        F: Fn(&HandlerContext) -> Result<Box<dyn ControlHandler>> + Send + Sync + 'static,
    {
        self.constructors.insert(kind, Arc::new(constructor));
        self
    }

    /// Use `pump` as the native event source
    pub fn pump(mut self, pump: Arc<dyn MessagePump>) -> Self {
        self.pump = pump;
        self
    }

    pub fn build(self) -> Arc<NativePlatform> {
        Arc::new(NativePlatform {
            name: self.name,
            kind: self.kind,
            constructors: self.constructors,
            pump: self.pump,
        })
    }
}

/// Create a platform of the given kind with default settings
pub fn create_platform(kind: PlatformKind) -> Arc<NativePlatform> {
    match kind {
        PlatformKind::Headless => headless::platform(),
        PlatformKind::Software => SoftwareWindowSystem::new().platform(),
    }
}
