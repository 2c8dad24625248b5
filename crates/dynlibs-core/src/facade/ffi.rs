//! C ABI of the facade.
//!
//! A host sees a `LibLoader` only as an opaque [`DynHandle`] pointer and drives
//! it through `create`, `setup`, `get_data`, `set_data`, `free_data` and
//! `destroy`. A handle is an id from a process-wide counter, never an address,
//! and ids are not reused. Every id returned by `create` is kept in a live
//! table, so a null, foreign or already destroyed handle is rejected with a
//! status instead of reaching another loader. Panics never cross the boundary.
use std::collections::BTreeMap;
use std::ffi::c_void;
use std::panic::{self, AssertUnwindSafe};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use dynlibs_api::panic_message;

use crate::facade::LibLoader;
use crate::facade::state::StateBlob;
use crate::loader::error::{LoaderError, Result, StateFault};

/// Status code returned across the C ABI.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DynStatus {
    Ok = 0,
    NullHandle = 1,
    InvalidHandle = 2,
    NullBlob = 3,
    InvalidBlob = 4,
    LoadFailed = 5,
    SymbolMissing = 6,
    BindingFailed = 7,
    SetupFailed = 8,
    Failed = 9,
    Panicked = 10,
}

impl From<&LoaderError> for DynStatus {
    fn from(err: &LoaderError) -> Self {
        match err {
            LoaderError::LoadError { .. } => DynStatus::LoadFailed,
            LoaderError::SymbolError { .. } => DynStatus::SymbolMissing,
            LoaderError::BindingError { .. } => DynStatus::BindingFailed,
            LoaderError::SetupError { .. } => DynStatus::SetupFailed,
            LoaderError::StateError(StateFault::NullHandle) => DynStatus::NullHandle,
            LoaderError::StateError(StateFault::DeadHandle) => DynStatus::InvalidHandle,
            LoaderError::StateError(StateFault::NullBlob) => DynStatus::NullBlob,
            LoaderError::StateError(StateFault::InvalidBlob) => DynStatus::InvalidBlob,
            LoaderError::FfiError { .. }
            | LoaderError::AlreadyLoaded { .. }
            | LoaderError::NotLoaded { .. }
            | LoaderError::ConfigError { .. } => DynStatus::Failed,
        }
    }
}

/// Opaque loader handle seen by the host. Never dereferenced.
#[repr(C)]
pub struct DynHandle {
    _private: [u8; 0],
}

struct LoaderPtr(NonNull<LibLoader>);

// Only dereferenced inside the exported functions, whose callers guarantee a
// handle is not used by two calls at once.
unsafe impl Send for LoaderPtr {}

static NEXT_HANDLE: AtomicUsize = AtomicUsize::new(1);
static LIVE_HANDLES: Mutex<BTreeMap<usize, LoaderPtr>> = Mutex::new(BTreeMap::new());

fn live_handles() -> MutexGuard<'static, BTreeMap<usize, LoaderPtr>> {
    LIVE_HANDLES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Boxes `loader` under a fresh handle id.
pub fn into_handle(loader: LibLoader) -> *mut DynHandle {
    let id = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
    let loader = NonNull::from(Box::leak(Box::new(loader)));
    live_handles().insert(id, LoaderPtr(loader));
    ptr::without_provenance_mut(id)
}

/// Whether `handle` came from `create`/[`into_handle`] and was not destroyed.
pub fn is_live(handle: *const DynHandle) -> bool {
    !handle.is_null() && live_handles().contains_key(&handle.addr())
}

/// # Safety
/// A live handle must not be used by another call for the returned lifetime.
unsafe fn live_loader<'a>(handle: *mut DynHandle) -> Result<&'a mut LibLoader> {
    if handle.is_null() {
        return Err(StateFault::NullHandle.into());
    }
    let loader = live_handles()
        .get(&handle.addr())
        .map(|loader| loader.0)
        .ok_or(StateFault::DeadHandle)?;
    Ok(unsafe { &mut *loader.as_ptr() })
}

/// Runs `f` on the loader behind a live handle.
///
/// # Safety
/// `handle` must not be in use by another call.
pub unsafe fn with_loader<R>(handle: *mut DynHandle, f: impl FnOnce(&LibLoader) -> R) -> Result<R> {
    let loader = unsafe { live_loader(handle) }?;
    Ok(f(loader))
}

fn boundary<R>(operation: &str, f: impl FnOnce() -> Result<R>) -> std::result::Result<R, DynStatus> {
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            log::error!("{} failed: {}", operation, e);
            Err(DynStatus::from(&e))
        }
        Err(payload) => {
            log::error!("{} panicked: {}", operation, panic_message(payload.as_ref()));
            Err(DynStatus::Panicked)
        }
    }
}

fn status(result: std::result::Result<(), DynStatus>) -> DynStatus {
    match result {
        Ok(()) => DynStatus::Ok,
        Err(status) => status,
    }
}

/// Allocates a loader configured from the environment. Does not run setup.
#[unsafe(no_mangle)]
pub extern "C" fn create() -> *mut DynHandle {
    into_handle(LibLoader::from_env())
}

/// Destroys a loader together with its registry. The handle id is retired.
///
/// # Safety
/// `handle` must not be in use by another call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn destroy(handle: *mut DynHandle) -> DynStatus {
    status(boundary("destroy", || {
        if handle.is_null() {
            return Err(StateFault::NullHandle.into());
        }
        let loader = live_handles()
            .remove(&handle.addr())
            .ok_or(StateFault::DeadHandle)?;
        drop(unsafe { Box::from_raw(loader.0.as_ptr()) });
        Ok(())
    }))
}

/// Runs the loader's setup pass.
///
/// # Safety
/// `handle` must not be in use by another call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn setup(handle: *mut DynHandle) -> DynStatus {
    status(boundary("setup", || unsafe { live_loader(handle) }?.setup()))
}

/// Snapshots the registry into a new blob. Null if the handle is rejected.
///
/// # Safety
/// `handle` must not be in use by another call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn get_data(handle: *mut DynHandle) -> *mut c_void {
    boundary("get_data", || {
        let loader = unsafe { live_loader(handle) }?;
        Ok(loader.extract_state().into_raw())
    })
    .unwrap_or(ptr::null_mut())
}

/// Replaces the registry with the blob's content.
///
/// A blob that passes the token check is always consumed, even when the
/// handle is rejected.
///
/// # Safety
/// `data` must be null or a pointer from `get_data` not yet consumed, and
/// `handle` must not be in use by another call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn set_data(handle: *mut DynHandle, data: *mut c_void) -> DynStatus {
    status(boundary("set_data", || {
        let blob = unsafe { StateBlob::from_raw(data) }?;
        let loader = unsafe { live_loader(handle) }?;
        loader.inject_state(*blob);
        Ok(())
    }))
}

/// Releases a blob that will never be injected.
///
/// # Safety
/// `data` must be null or a pointer from `get_data` not yet consumed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free_data(data: *mut c_void) -> DynStatus {
    status(boundary("free_data", || {
        drop(unsafe { StateBlob::from_raw(data) }?);
        Ok(())
    }))
}
