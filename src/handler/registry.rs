//! Native handle to control registry
//!
//! Handlers register their native handle here during attach and remove it
//! during detach. Native callback contexts (which may run on any thread) use
//! it to map a handle back to the managed control.

use std::collections::HashMap;
use std::sync::{OnceLock, RwLock};

use crate::control::{Control, ControlId, WeakControl};
use crate::handler::NativeHandle;
use crate::{Error, Result};

/// Thread-safe handle → control mapping
#[derive(Debug, Default)]
pub struct HandleRegistry {
    entries: RwLock<HashMap<NativeHandle, WeakControl>>,
}

impl HandleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide registry used by the input manager
    pub fn global() -> &'static HandleRegistry {
        static GLOBAL: OnceLock<HandleRegistry> = OnceLock::new();
        GLOBAL.get_or_init(HandleRegistry::new)
    }

    /// Map `handle` to `control`
    ///
    /// Fails if the handle is already owned by another live control, since two
    /// handlers must never share a native resource.
    pub fn register(&self, handle: NativeHandle, control: &Control) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::LockError("Failed to lock handle registry".to_string()))?;

        if let Some(existing) = entries.get(&handle).and_then(WeakControl::upgrade) {
            if existing.id() != control.id() {
                return Err(Error::InvalidRelationship(format!(
                    "native handle {} is already owned by control {}",
                    handle,
                    existing.id()
                )));
            }
        }

        entries.insert(handle, control.downgrade());
        log::trace!("Registered native handle {} for control {}", handle, control.id());
        Ok(())
    }

    /// Remove the mapping for `handle`, returning the id it pointed to
    pub fn unregister(&self, handle: NativeHandle) -> Result<Option<ControlId>> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| Error::LockError("Failed to lock handle registry".to_string()))?;

        Ok(entries.remove(&handle).map(|weak| weak.id()))
    }

    /// Resolve a native handle to its live control
    pub fn resolve(&self, handle: NativeHandle) -> Option<Control> {
        let entries = self.entries.read().ok()?;
        entries.get(&handle).and_then(WeakControl::upgrade)
    }

    /// Number of registered handles
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
