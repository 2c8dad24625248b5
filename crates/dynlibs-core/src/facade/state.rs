use std::ffi::c_void;

use crate::loader::error::{Result, StateFault};
use crate::loader::registry::BindingsMap;

/// "DYNLIBS1", checked before a raw pointer is treated as a blob.
pub(crate) const STATE_BLOB_TOKEN: u64 = u64::from_be_bytes(*b"DYNLIBS1");

/// A shallow snapshot of a loader's registry, moved across the C ABI.
///
/// Consumed by `set_data` or released by `free_data`; a blob that reaches
/// neither leaks, together with every library it still references.
///
/// The token is the first field so a host pointer can be checked before the
/// rest is read. It is cleared when the blob is consumed, which catches most
/// reuse of a consumed pointer; reuse after the memory was handed out again
/// cannot be detected.
#[repr(C)]
#[derive(Debug)]
pub struct StateBlob {
    token: u64,
    bindings: BindingsMap,
}

impl StateBlob {
    pub(crate) fn new(bindings: BindingsMap) -> Self {
        Self {
            token: STATE_BLOB_TOKEN,
            bindings,
        }
    }

    pub fn bindings(&self) -> &BindingsMap {
        &self.bindings
    }

    pub(crate) fn into_bindings(self) -> BindingsMap {
        self.bindings
    }

    pub(crate) fn into_raw(self) -> *mut c_void {
        Box::into_raw(Box::new(self)).cast::<c_void>()
    }

    /// Takes ownership of a pointer produced by [`StateBlob::into_raw`].
    ///
    /// # Safety
    /// `data` must be null or point to at least eight readable bytes; a
    /// pointer that passes the token check must not be used again.
    pub(crate) unsafe fn from_raw(data: *mut c_void) -> Result<Box<StateBlob>> {
        if data.is_null() {
            return Err(StateFault::NullBlob.into());
        }
        let blob = data.cast::<StateBlob>();
        if unsafe { (*blob).token } != STATE_BLOB_TOKEN {
            return Err(StateFault::InvalidBlob.into());
        }
        unsafe { (*blob).token = 0 };
        Ok(unsafe { Box::from_raw(blob) })
    }
}
