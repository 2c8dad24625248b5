//! # dynlibs Loader
//!
//! Turns symbolic library names into instances implementing a known
//! interface.
//!
//! - **[`dynamic`]**: [`DynamicLoader`] resolves a name to a platform file,
//!   opens it, resolves the `create`/`destroy` symbols and registers the
//!   constructed instance.
//! - **[`registry`]**: [`BindingsMap`], the name -> {library, instance} map.
//! - **[`instance`]**: [`InterfaceInstance`], the shared, library-allocated
//!   object, and the crate-private OS handle that keeps its library open.
//! - **[`binding`]**: capability-checked typed bindings ([`Bound`]).
//! - **[`helper`]**: [`LoaderHelper`], which loads and binds the statically
//!   known libraries during setup.
//! - **[`error`]**: [`LoaderError`](error::LoaderError).
pub mod binding;
pub mod dynamic;
pub mod error;
pub mod helper;
pub mod instance;
pub mod registry;

pub use binding::{Bound, DefaultInterface, InterfaceKind};
pub use dynamic::DynamicLoader;
pub use error::{LoaderError, Result};
pub use helper::{HandlerRegistrar, HandlerRegistration, LoaderHelper};
pub use instance::InterfaceInstance;
pub use registry::{Binding, BindingsMap};
