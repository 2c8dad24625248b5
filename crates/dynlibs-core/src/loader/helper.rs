use std::ffi::CString;
use std::fmt;

use crate::config::{LibrarySpec, LoaderConfig};
use crate::constants::DEFAULT_LIBRARY;
use crate::loader::binding::{Bound, DefaultInterface, InterfaceKind};
use crate::loader::dynamic::DynamicLoader;
use crate::loader::error::{LoaderError, Result};
use crate::loader::registry::BindingsMap;

/// Whether a setup pass also runs the process-wide handler registration step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HandlerRegistration {
    #[default]
    Disabled,
    Enabled,
}

/// Hook for the process-wide signal/event handler registration step.
pub trait HandlerRegistrar {
    fn register(&mut self, bindings: &BindingsMap) -> Result<()>;
}

/// Loads the statically known libraries and binds them to their interfaces.
pub struct LoaderHelper {
    loader: DynamicLoader,
    libraries: Vec<LibrarySpec>,
    registrar: Option<Box<dyn HandlerRegistrar>>,
    default_lib: Option<Bound<DefaultInterface>>,
}

impl LoaderHelper {
    pub fn new(config: &LoaderConfig) -> Self {
        Self {
            loader: DynamicLoader::from_config(config),
            libraries: config.libraries.clone(),
            registrar: None,
            default_lib: None,
        }
    }

    pub fn with_registrar(mut self, registrar: Box<dyn HandlerRegistrar>) -> Self {
        self.registrar = Some(registrar);
        self
    }

    /// Loads "Default" and every configured library, binding each and running
    /// its `setup()`.
    ///
    /// Stops at the first failure. Libraries loaded earlier in the pass stay
    /// registered; a library that fails its capability check is removed.
    pub fn setup(&mut self, handlers: HandlerRegistration) -> Result<()> {
        self.init_libs()?;
        match handlers {
            HandlerRegistration::Enabled => self.register_handlers(),
            HandlerRegistration::Disabled => {
                log::debug!("Handler registration disabled for this setup pass");
                Ok(())
            }
        }
    }

    fn init_libs(&mut self) -> Result<()> {
        let default_lib = self.init_lib::<DefaultInterface>(DEFAULT_LIBRARY)?;
        default_lib.setup()?;
        self.default_lib = Some(default_lib);

        for spec in self.libraries.clone() {
            self.init_configured(&spec)?;
        }
        Ok(())
    }

    fn init_lib<K: InterfaceKind>(&mut self, name: &str) -> Result<Bound<K>> {
        let instance = self.loader.load_library(name)?;
        Bound::<K>::bind(name, instance).inspect_err(|_| self.loader.discard(name))
    }

    fn init_configured(&mut self, spec: &LibrarySpec) -> Result<()> {
        let expected = CString::new(spec.interface.as_str()).map_err(|_| LoaderError::BindingError {
            name: spec.name.clone(),
            expected: spec.interface.clone(),
            message: "interface id contains a nul byte".to_string(),
        })?;
        let instance = self.loader.load_library(&spec.name)?;
        if let Err(e) = instance.check_interface(&spec.name, &expected) {
            drop(instance);
            self.loader.discard(&spec.name);
            return Err(e);
        }
        instance.run_setup(&spec.name)
    }

    fn register_handlers(&mut self) -> Result<()> {
        match self.registrar.as_mut() {
            Some(registrar) => {
                log::info!("Registering process handlers for {} libraries", self.loader.bindings().len());
                registrar.register(self.loader.bindings())
            }
            None => {
                log::warn!("Handler registration requested but no registrar is installed");
                Ok(())
            }
        }
    }

    /// Typed binding of the "Default" library, once a setup pass or an
    /// injection provided one.
    pub fn default_lib(&self) -> Option<&Bound<DefaultInterface>> {
        self.default_lib.as_ref()
    }

    pub fn loader(&self) -> &DynamicLoader {
        &self.loader
    }

    pub(crate) fn loader_mut(&mut self) -> &mut DynamicLoader {
        &mut self.loader
    }

    /// Unloads `name` and drops any typed binding that still refers to it,
    /// so the instance is destroyed and its library closed.
    pub fn unload_library(&mut self, name: &str) -> Result<bool> {
        let removed = self.loader.unload_library(name)?;
        if removed {
            self.rebind();
        }
        Ok(removed)
    }

    pub fn bindings(&self) -> &BindingsMap {
        self.loader.bindings()
    }

    /// Swaps in `bindings` and re-derives the typed bindings from them.
    ///
    /// Returns the previous registry; the caller decides whether it is
    /// released or kept alive.
    pub fn replace_bindings(&mut self, bindings: BindingsMap) -> BindingsMap {
        let previous = self.loader.replace_bindings(bindings);
        self.rebind();
        previous
    }

    fn rebind(&mut self) {
        self.default_lib = self
            .loader
            .bindings()
            .instance(DEFAULT_LIBRARY)
            .cloned()
            .and_then(|instance| match Bound::bind(DEFAULT_LIBRARY, instance) {
                Ok(bound) => Some(bound),
                Err(e) => {
                    log::warn!("Injected '{}' could not be rebound: {}", DEFAULT_LIBRARY, e);
                    None
                }
            });
    }
}

impl fmt::Debug for LoaderHelper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoaderHelper")
            .field("loader", &self.loader)
            .field("libraries", &self.libraries)
            .field("has_registrar", &self.registrar.is_some())
            .field("default_lib", &self.default_lib)
            .finish()
    }
}
