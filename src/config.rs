//! Toolkit configuration
//!
//! Settings that the application entry point applies to the UI thread's
//! dispatcher. Every field has a default so partial JSON documents load.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::application::UnhandledExceptionMode;
use crate::platform::PlatformKind;
use crate::Error;

/// Configuration for an Arbor application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UiConfig {
    /// Backend used to create handlers when the application starts
    pub platform: PlatformKind,

    /// How errors escaping event handlers are treated
    pub unhandled_exception_mode: UnhandledExceptionMode,

    /// Mode used instead of `unhandled_exception_mode` in debug builds
    pub unhandled_exception_mode_if_debug: Option<UnhandledExceptionMode>,

    /// Forward `LogMessage` broadcasts to the `log` facade
    pub log_to_facade: bool,

    /// Maximum number of queued operations drained per pump iteration (0 = all)
    pub idle_batch_limit: usize,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            platform: PlatformKind::Headless,
            unhandled_exception_mode: UnhandledExceptionMode::CatchException,
            unhandled_exception_mode_if_debug: None,
            log_to_facade: true,
            idle_batch_limit: 0,
        }
    }
}

impl UiConfig {
    /// Parse a configuration from a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load a configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&text)
    }

    /// Serialize the configuration to pretty JSON
    pub fn to_json_string(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// The exception mode that applies to the current build
    pub fn effective_exception_mode(&self) -> UnhandledExceptionMode {
        if cfg!(debug_assertions) {
            self.unhandled_exception_mode_if_debug
                .unwrap_or(self.unhandled_exception_mode)
        } else {
            self.unhandled_exception_mode
        }
    }
}
