//! # dynlibs core
//!
//! Loads shared libraries by logical name, binds the instances they construct
//! to statically known interfaces, and exposes a C ABI through which a host
//! manages a [`LibLoader`] and moves its registry between instances.
pub mod config;
pub mod constants;
pub mod facade;
pub mod loader;

pub use config::{DuplicatePolicy, InjectPolicy, LibrarySpec, LoaderConfig};
pub use facade::{DynHandle, DynStatus, LibLoader, StateBlob};
pub use loader::{
    BindingsMap, DefaultInterface, DynamicLoader, HandlerRegistrar, HandlerRegistration,
    InterfaceInstance, LoaderError, LoaderHelper,
};

#[cfg(test)]
pub(crate) mod test_support;
