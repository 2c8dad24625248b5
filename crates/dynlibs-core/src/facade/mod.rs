//! # dynlibs Facade
//!
//! [`LibLoader`] is the object a host manages through the C ABI in [`ffi`].
//! It wraps one [`LoaderHelper`] and never registers process handlers.
//! Its registry can be snapshotted into a [`StateBlob`] and injected into
//! another `LibLoader`; what happens to the registry being replaced is set by
//! [`InjectPolicy`].
pub mod ffi;
pub mod state;

pub use ffi::{DynHandle, DynStatus};
pub use state::StateBlob;

use crate::config::{InjectPolicy, LoaderConfig};
use crate::loader::error::Result;
use crate::loader::helper::{HandlerRegistration, LoaderHelper};
use crate::loader::registry::BindingsMap;

#[derive(Debug)]
pub struct LibLoader {
    helper: LoaderHelper,
    on_inject: InjectPolicy,
}

impl LibLoader {
    pub fn new() -> Self {
        Self::with_config(&LoaderConfig::default())
    }

    pub fn with_config(config: &LoaderConfig) -> Self {
        Self {
            helper: LoaderHelper::new(config),
            on_inject: config.on_inject,
        }
    }

    /// Config from the environment, falling back to defaults if it cannot be read.
    pub fn from_env() -> Self {
        match LoaderConfig::from_env() {
            Ok(config) => Self::with_config(&config),
            Err(e) => {
                log::warn!("Using default loader config: {}", e);
                Self::new()
            }
        }
    }

    /// Runs the helper's setup pass without process handler registration.
    pub fn setup(&mut self) -> Result<()> {
        self.helper.setup(HandlerRegistration::Disabled)
    }

    pub fn helper(&self) -> &LoaderHelper {
        &self.helper
    }

    pub fn bindings(&self) -> &BindingsMap {
        self.helper.bindings()
    }

    /// Shallow copy of the registry; this loader keeps its own entries.
    pub fn extract_state(&self) -> StateBlob {
        StateBlob::new(self.helper.bindings().clone())
    }

    /// Replaces the registry with the blob's content and consumes the blob.
    pub fn inject_state(&mut self, blob: StateBlob) {
        let previous = self.helper.replace_bindings(blob.into_bindings());
        match self.on_inject {
            InjectPolicy::ReleasePrevious => drop(previous),
            InjectPolicy::Orphan => {
                if !previous.is_empty() {
                    log::warn!("Orphaning {} library bindings on state injection", previous.len());
                }
                std::mem::forget(previous);
            }
        }
    }
}

impl Default for LibLoader {
    fn default() -> Self {
        Self::new()
    }
}

// Test module declaration
#[cfg(test)]
mod tests;
