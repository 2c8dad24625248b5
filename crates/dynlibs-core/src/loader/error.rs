//! # Loader Errors
//!
//! [`LoaderError`] covers every failure of the loading and state-transfer
//! boundary: missing or unopenable files ([`LoaderError::LoadError`]),
//! missing entry points ([`LoaderError::SymbolError`]), capability mismatches
//! ([`LoaderError::BindingError`]), failed plugin setup and operations on
//! handles that are not live ([`LoaderError::StateError`]).
use std::error::Error as StdError;
use std::path::PathBuf;

use dynlibs_api::SetupStatus;

#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    #[error("Library loading failed for '{name}': {source}")]
    LoadError {
        name: String,
        path: Option<PathBuf>,
        #[source]
        source: Box<LoadErrorSource>,
    },

    #[error("Library '{name}' does not export symbol '{symbol}': {source}")]
    SymbolError {
        name: String,
        symbol: String,
        #[source]
        source: libloading::Error,
    },

    #[error("FFI error in library '{name}' during operation '{operation}': {message}")]
    FfiError {
        name: String,
        operation: String,
        message: String,
    },

    #[error("Library '{name}' does not satisfy interface '{expected}': {message}")]
    BindingError {
        name: String,
        expected: String,
        message: String,
    },

    #[error("Setup of library '{name}' failed: {status}")]
    SetupError {
        name: String,
        status: SetupStatus,
    },

    #[error("Invalid loader state: {0}")]
    StateError(StateFault),

    #[error("Library '{name}' is already loaded")]
    AlreadyLoaded { name: String },

    #[error("Library '{name}' is not loaded")]
    NotLoaded { name: String },

    #[error("Loader configuration error for '{}': {message}", .path.display())]
    ConfigError {
        path: PathBuf,
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum LoadErrorSource {
    #[error("no file named '{file_name}' in search path {searched:?}")]
    NotFound {
        file_name: String,
        searched: Vec<PathBuf>,
    },
    #[error(transparent)]
    Open(#[from] libloading::Error),
}

/// Why a handle or blob was rejected at the state-transfer boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StateFault {
    #[error("null loader handle")]
    NullHandle,
    #[error("loader handle is not live (never constructed or already destroyed)")]
    DeadHandle,
    #[error("null state blob")]
    NullBlob,
    #[error("state blob carries an invalid type token")]
    InvalidBlob,
}

impl From<StateFault> for LoaderError {
    fn from(fault: StateFault) -> Self {
        LoaderError::StateError(fault)
    }
}

/// Shorthand for Result with [`LoaderError`]
pub type Result<T> = std::result::Result<T, LoaderError>;
