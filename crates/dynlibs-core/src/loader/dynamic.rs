use std::ffi::OsString;
use std::path::PathBuf;
use std::rc::Rc;

use dynlibs_api::{CONSTRUCTOR_SYMBOL, ConstructorFn, DESTRUCTOR_SYMBOL, DestructorFn};

use crate::config::{DuplicatePolicy, LoaderConfig};
use crate::loader::error::{LoadErrorSource, LoaderError, Result};
use crate::loader::instance::{InterfaceInstance, LibraryHandle};
use crate::loader::registry::{Binding, BindingsMap};

/// Turns library names into constructed instances and keeps them registered.
#[derive(Debug)]
pub struct DynamicLoader {
    search_dirs: Vec<PathBuf>,
    on_duplicate: DuplicatePolicy,
    strict_unload: bool,
    libs: BindingsMap,
}

impl DynamicLoader {
    pub fn new() -> Self {
        Self::from_config(&LoaderConfig::default())
    }

    pub fn from_config(config: &LoaderConfig) -> Self {
        Self {
            search_dirs: config.search_dirs.clone(),
            on_duplicate: config.on_duplicate,
            strict_unload: config.strict_unload,
            libs: BindingsMap::new(),
        }
    }

    /// Platform file name for `name`: `libName.so`, `libName.dylib` or `Name.dll`.
    pub fn file_name(name: &str) -> OsString {
        libloading::library_filename(name)
    }

    /// First search directory containing the library file.
    ///
    /// With no search directories the bare file name is returned and the
    /// OS search path applies when it is opened.
    pub fn resolve_path(&self, name: &str) -> Result<PathBuf> {
        let file_name = Self::file_name(name);
        if self.search_dirs.is_empty() {
            return Ok(PathBuf::from(file_name));
        }
        self.search_dirs
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| candidate.is_file())
            .ok_or_else(|| LoaderError::LoadError {
                name: name.to_string(),
                path: None,
                source: Box::new(LoadErrorSource::NotFound {
                    file_name: file_name.to_string_lossy().into_owned(),
                    searched: self.search_dirs.clone(),
                }),
            })
    }

    /// Opens `name`, constructs its instance and registers it under `name`.
    ///
    /// The registry is only touched once every step succeeded.
    pub fn load_library(&mut self, name: &str) -> Result<InterfaceInstance> {
        if self.on_duplicate == DuplicatePolicy::Reject && self.libs.contains(name) {
            return Err(LoaderError::AlreadyLoaded {
                name: name.to_string(),
            });
        }

        let path = self.resolve_path(name)?;
        let handle = Rc::new(LibraryHandle::open(name, &path)?);
        let constructor: ConstructorFn = unsafe { handle.symbol(CONSTRUCTOR_SYMBOL)? };
        let destructor: DestructorFn = unsafe { handle.symbol(DESTRUCTOR_SYMBOL)? };

        let raw = unsafe { constructor() };
        let instance = unsafe { InterfaceInstance::from_raw(raw, destructor, Rc::clone(&handle)) }
            .ok_or_else(|| LoaderError::FfiError {
                name: name.to_string(),
                operation: "create".to_string(),
                message: "constructor returned a null instance".to_string(),
            })?;

        if self
            .libs
            .insert(name, Binding::new(handle, instance.clone()))
            .is_some()
        {
            log::info!("Replaced previously loaded library '{}'", name);
        }
        log::info!("Loaded library '{}' from {}", name, path.display());
        Ok(instance)
    }

    /// Removes `name` from the registry.
    ///
    /// Returns whether an entry was removed. An unknown name is a no-op
    /// unless `strict_unload` is set, in which case it fails with `NotLoaded`.
    /// The library is closed once no other registry or blob still shares it.
    pub fn unload_library(&mut self, name: &str) -> Result<bool> {
        match self.libs.remove(name) {
            Some(_) => {
                log::info!("Unloaded library '{}'", name);
                Ok(true)
            }
            None if self.strict_unload => Err(LoaderError::NotLoaded {
                name: name.to_string(),
            }),
            None => {
                log::debug!("Unload of '{}' ignored: not loaded", name);
                Ok(false)
            }
        }
    }

    /// Drops `name` regardless of `strict_unload`.
    pub(crate) fn discard(&mut self, name: &str) {
        if self.libs.remove(name).is_some() {
            log::debug!("Discarded library '{}'", name);
        }
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.libs.contains(name)
    }

    pub fn bindings(&self) -> &BindingsMap {
        &self.libs
    }

    /// Swaps in `bindings`, returning the previous registry.
    pub fn replace_bindings(&mut self, bindings: BindingsMap) -> BindingsMap {
        std::mem::replace(&mut self.libs, bindings)
    }

    #[cfg(test)]
    pub(crate) fn insert_binding(&mut self, name: &str, binding: Binding) -> Option<Binding> {
        self.libs.insert(name, binding)
    }
}

impl Default for DynamicLoader {
    fn default() -> Self {
        Self::new()
    }
}
