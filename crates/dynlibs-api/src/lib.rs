//! # dynlibs ABI contract
//!
//! Types shared by a dynlibs host and every library it loads. A loadable
//! library exports two C-linkage symbols:
//!
//! - [`CONSTRUCTOR_SYMBOL`] (`create`): returns a heap-allocated [`RawInterface`].
//! - [`DESTRUCTOR_SYMBOL`] (`destroy`): frees an instance previously returned by `create`.
//!
//! The host never frees a [`RawInterface`] itself; it always hands it back to
//! the library's destructor. Library authors normally implement
//! [`LibraryInterface`] and let [`export_library!`] generate both symbols.
use std::any::Any;
use std::ffi::{CStr, c_void};
use std::fmt;
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;

/// Name of the constructor every loadable library exports (nul-terminated).
pub const CONSTRUCTOR_SYMBOL: &[u8] = b"create\0";
/// Name of the destructor every loadable library exports (nul-terminated).
pub const DESTRUCTOR_SYMBOL: &[u8] = b"destroy\0";

/// Interface id of the "Default" library contract.
pub const DEFAULT_INTERFACE: &CStr = c"dynlibs.DefaultInterface";

/// Signature of the exported `create` symbol.
pub type ConstructorFn = unsafe extern "C" fn() -> *mut RawInterface;
/// Signature of the exported `destroy` symbol.
pub type DestructorFn = unsafe extern "C" fn(*mut RawInterface);
/// Signature of [`RawInterface::setup`].
pub type SetupFn = unsafe extern "C" fn(object: *mut c_void) -> SetupStatus;

/// Result code returned by a library's `setup` entry point.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SetupStatus(pub i32);

impl SetupStatus {
    pub const OK: SetupStatus = SetupStatus(0);
    pub const FAILED: SetupStatus = SetupStatus(1);
    pub const PANICKED: SetupStatus = SetupStatus(2);

    pub fn is_ok(self) -> bool {
        self == SetupStatus::OK
    }
}

impl fmt::Display for SetupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            SetupStatus::OK => write!(f, "ok"),
            SetupStatus::FAILED => write!(f, "failed"),
            SetupStatus::PANICKED => write!(f, "panicked"),
            SetupStatus(code) => write!(f, "unknown status {}", code),
        }
    }
}

/// The capability record a library's constructor returns.
///
/// `struct_size` must equal `size_of::<RawInterface>()` of the host, and
/// `interface_id` names the contract the object implements. Hosts compare
/// both before treating the record as a specific interface.
#[repr(C)]
#[derive(Debug)]
pub struct RawInterface {
    pub struct_size: usize,
    pub interface_id: *const c_char,
    pub object: *mut c_void,
    pub setup: Option<SetupFn>,
}

impl RawInterface {
    /// Size every well-formed record reports in `struct_size`.
    pub const SIZE: usize = std::mem::size_of::<RawInterface>();
}

/// Implemented by the object a library hands out through `create`.
pub trait LibraryInterface: 'static {
    /// Contract id written into [`RawInterface::interface_id`].
    const INTERFACE_ID: &'static CStr;

    /// Library-local initialization, run by the host after binding.
    fn setup(&mut self) -> Result<(), String>;
}

/// Builds a [`RawInterface`] for `T`, catching a panicking constructor.
///
/// Returns null if `ctor` panics. Used by [`export_library!`].
pub fn construct<T: LibraryInterface>(ctor: fn() -> T) -> *mut RawInterface {
    match panic::catch_unwind(ctor) {
        Ok(value) => into_raw(value),
        Err(payload) => {
            log::error!(
                "constructor for {:?} panicked: {}",
                T::INTERFACE_ID,
                panic_message(payload.as_ref())
            );
            ptr::null_mut()
        }
    }
}

/// Frees a record produced by [`construct`] for the same `T`.
///
/// # Safety
/// `raw` must be null or a pointer returned by `construct::<T>` that has not
/// been released yet.
pub unsafe fn release<T: LibraryInterface>(raw: *mut RawInterface) {
    if raw.is_null() {
        return;
    }
    let record = unsafe { Box::from_raw(raw) };
    if record.object.is_null() {
        return;
    }
    let object = unsafe { Box::from_raw(record.object.cast::<T>()) };
    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(move || drop(object))) {
        log::error!(
            "destructor for {:?} panicked: {}",
            T::INTERFACE_ID,
            panic_message(payload.as_ref())
        );
    }
}

fn into_raw<T: LibraryInterface>(value: T) -> *mut RawInterface {
    let object = Box::into_raw(Box::new(value)).cast::<c_void>();
    Box::into_raw(Box::new(RawInterface {
        struct_size: RawInterface::SIZE,
        interface_id: T::INTERFACE_ID.as_ptr(),
        object,
        setup: Some(setup_trampoline::<T>),
    }))
}

unsafe extern "C" fn setup_trampoline<T: LibraryInterface>(object: *mut c_void) -> SetupStatus {
    if object.is_null() {
        return SetupStatus::FAILED;
    }
    let target = unsafe { &mut *object.cast::<T>() };
    match panic::catch_unwind(AssertUnwindSafe(|| target.setup())) {
        Ok(Ok(())) => SetupStatus::OK,
        Ok(Err(message)) => {
            log::error!("setup of {:?} failed: {}", T::INTERFACE_ID, message);
            SetupStatus::FAILED
        }
        Err(payload) => {
            log::error!(
                "setup of {:?} panicked: {}",
                T::INTERFACE_ID,
                panic_message(payload.as_ref())
            );
            SetupStatus::PANICKED
        }
    }
}

/// Extracts a printable message from a panic payload.
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic reason".to_string()
    }
}

/// Exports the `create`/`destroy` pair for a [`LibraryInterface`] type.
///
/// ```ignore
/// #[derive(Default)]
/// struct DefaultLibrary;
///
/// impl dynlibs_api::LibraryInterface for DefaultLibrary {
///     const INTERFACE_ID: &'static std::ffi::CStr = dynlibs_api::DEFAULT_INTERFACE;
///     fn setup(&mut self) -> Result<(), String> { Ok(()) }
/// }
///
/// dynlibs_api::export_library!(DefaultLibrary);
/// ```
#[macro_export]
macro_rules! export_library {
    ($ty:ty) => {
        $crate::export_library!($ty, <$ty as ::core::default::Default>::default);
    };
    ($ty:ty, $ctor:expr) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn create() -> *mut $crate::RawInterface {
            $crate::construct::<$ty>($ctor)
        }

        /// # Safety
        /// `raw` must come from this library's `create` and be released once.
        #[unsafe(no_mangle)]
        pub unsafe extern "C" fn destroy(raw: *mut $crate::RawInterface) {
            unsafe { $crate::release::<$ty>(raw) }
        }
    };
}
