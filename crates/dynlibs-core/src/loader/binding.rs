use std::ffi::CStr;
use std::fmt;
use std::marker::PhantomData;

use dynlibs_api::DEFAULT_INTERFACE;

use crate::loader::error::Result;
use crate::loader::instance::InterfaceInstance;

/// A statically known interface the host can bind a loaded instance to.
pub trait InterfaceKind {
    /// Id the library must report in its record.
    const ID: &'static CStr;
}

/// The contract of the "Default" library.
#[derive(Debug, Clone, Copy)]
pub struct DefaultInterface;

impl InterfaceKind for DefaultInterface {
    const ID: &'static CStr = DEFAULT_INTERFACE;
}

/// An instance that passed the capability check for `K`.
pub struct Bound<K: InterfaceKind> {
    name: String,
    instance: InterfaceInstance,
    _kind: PhantomData<K>,
}

impl<K: InterfaceKind> Bound<K> {
    /// Fails with `BindingError` if `instance` does not implement `K`.
    pub fn bind(name: &str, instance: InterfaceInstance) -> Result<Self> {
        instance.check_interface(name, K::ID)?;
        Ok(Self {
            name: name.to_string(),
            instance,
            _kind: PhantomData,
        })
    }

    pub fn setup(&self) -> Result<()> {
        self.instance.run_setup(&self.name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn instance(&self) -> &InterfaceInstance {
        &self.instance
    }
}

impl<K: InterfaceKind> fmt::Debug for Bound<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bound")
            .field("name", &self.name)
            .field("interface", &K::ID)
            .field("instance", &self.instance)
            .finish()
    }
}
