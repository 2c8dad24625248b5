use std::ffi::CStr;
use std::fmt;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::rc::Rc;

use libloading::{Library, Symbol};

use dynlibs_api::{DestructorFn, RawInterface};

use crate::loader::error::{LoadErrorSource, LoaderError, Result};

/// An opened shared library.
///
/// Never handed out of the crate; it is closed when the last registry entry
/// or instance referring to it is dropped.
pub(crate) struct LibraryHandle {
    name: String,
    path: PathBuf,
    library: Library,
}

impl LibraryHandle {
    pub(crate) fn open(name: &str, path: &Path) -> Result<Self> {
        log::debug!("Opening library '{}' at {}", name, path.display());
        let library = unsafe { Library::new(path) }.map_err(|e| LoaderError::LoadError {
            name: name.to_string(),
            path: Some(path.to_path_buf()),
            source: Box::new(LoadErrorSource::Open(e)),
        })?;
        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            library,
        })
    }

    /// Looks up `symbol` (nul-terminated) and copies out the function pointer.
    ///
    /// # Safety
    /// `T` must match the actual type of the exported symbol.
    pub(crate) unsafe fn symbol<T: Copy>(&self, symbol: &[u8]) -> Result<T> {
        let found: Symbol<T> = unsafe { self.library.get(symbol) }.map_err(|e| {
            LoaderError::SymbolError {
                name: self.name.clone(),
                symbol: symbol_name(symbol),
                source: e,
            }
        })?;
        log::debug!("Resolved symbol '{}' in '{}'", symbol_name(symbol), self.name);
        Ok(*found)
    }

    /// Handle onto the running process image, for tests that fake libraries in-process.
    #[cfg(test)]
    pub(crate) fn current_process(name: &str) -> Self {
        #[cfg(unix)]
        let library: Library = libloading::os::unix::Library::this().into();
        #[cfg(windows)]
        let library: Library = libloading::os::windows::Library::this()
            .expect("handle to current process")
            .into();
        Self {
            name: name.to_string(),
            path: PathBuf::from("<process>"),
            library,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl fmt::Debug for LibraryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LibraryHandle")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl Drop for LibraryHandle {
    fn drop(&mut self) {
        log::debug!("Closing library '{}' ({})", self.name, self.path.display());
    }
}

fn symbol_name(symbol: &[u8]) -> String {
    String::from_utf8_lossy(symbol).trim_end_matches('\0').to_string()
}

/// A library-allocated object reached only through its [`RawInterface`].
///
/// Clones are shallow: every clone refers to the same object, which is handed
/// back to the library's destructor when the last clone drops. The instance
/// keeps its library open until then.
#[derive(Clone)]
pub struct InterfaceInstance {
    inner: Rc<InstanceInner>,
}

struct InstanceInner {
    raw: NonNull<RawInterface>,
    destroy: DestructorFn,
    // Dropped after `destroy` ran, so the destructor's code is still mapped.
    library: Rc<LibraryHandle>,
}

impl Drop for InstanceInner {
    fn drop(&mut self) {
        log::debug!("Destroying instance from library '{}'", self.library.name());
        unsafe { (self.destroy)(self.raw.as_ptr()) };
    }
}

impl InterfaceInstance {
    /// Wraps a constructor result. Returns `None` for a null pointer.
    ///
    /// # Safety
    /// `raw` must be null or a live record produced by the library behind
    /// `library`, and `destroy` must be that library's destructor.
    pub(crate) unsafe fn from_raw(
        raw: *mut RawInterface,
        destroy: DestructorFn,
        library: Rc<LibraryHandle>,
    ) -> Option<Self> {
        NonNull::new(raw).map(|raw| Self {
            inner: Rc::new(InstanceInner { raw, destroy, library }),
        })
    }

    fn raw(&self) -> &RawInterface {
        unsafe { self.inner.raw.as_ref() }
    }

    /// Address of the underlying record; identical for all clones.
    pub fn as_ptr(&self) -> *const RawInterface {
        self.inner.raw.as_ptr()
    }

    pub fn same_instance(&self, other: &InterfaceInstance) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Interface id the library reports, if the record is well formed.
    pub fn interface_id(&self) -> Option<&CStr> {
        let raw = self.raw();
        if raw.struct_size != RawInterface::SIZE || raw.interface_id.is_null() {
            return None;
        }
        Some(unsafe { CStr::from_ptr(raw.interface_id) })
    }

    pub fn library_name(&self) -> &str {
        self.inner.library.name()
    }

    /// Capability check run before an instance is treated as `expected`.
    pub(crate) fn check_interface(&self, name: &str, expected: &CStr) -> Result<()> {
        let mismatch = |message: String| LoaderError::BindingError {
            name: name.to_string(),
            expected: expected.to_string_lossy().into_owned(),
            message,
        };
        let raw = self.raw();
        if raw.struct_size != RawInterface::SIZE {
            return Err(mismatch(format!(
                "record size {} does not match host size {}",
                raw.struct_size,
                RawInterface::SIZE
            )));
        }
        if raw.setup.is_none() {
            return Err(mismatch("record has no setup entry point".to_string()));
        }
        match self.interface_id() {
            Some(found) if found == expected => Ok(()),
            Some(found) => Err(mismatch(format!(
                "library implements '{}'",
                found.to_string_lossy()
            ))),
            None => Err(mismatch("record has no interface id".to_string())),
        }
    }

    /// Calls the library's `setup` entry point.
    pub(crate) fn run_setup(&self, name: &str) -> Result<()> {
        let raw = self.raw();
        let setup = raw.setup.ok_or_else(|| LoaderError::FfiError {
            name: name.to_string(),
            operation: "setup".to_string(),
            message: "record has no setup entry point".to_string(),
        })?;
        let status = unsafe { setup(raw.object) };
        if status.is_ok() {
            log::info!("Library '{}' set up", name);
            Ok(())
        } else {
            Err(LoaderError::SetupError {
                name: name.to_string(),
                status,
            })
        }
    }

    #[cfg(test)]
    pub(crate) fn downgrade(&self) -> WeakInstance {
        WeakInstance(Rc::downgrade(&self.inner))
    }
}

impl fmt::Debug for InterfaceInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterfaceInstance")
            .field("ptr", &self.as_ptr())
            .field("library", &self.library_name())
            .field("interface_id", &self.interface_id())
            .finish()
    }
}

/// Non-owning reference used by tests to observe when an instance is destroyed.
#[cfg(test)]
pub(crate) struct WeakInstance(std::rc::Weak<InstanceInner>);

#[cfg(test)]
impl WeakInstance {
    pub(crate) fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}
