#![allow(non_snake_case)]

use std::ffi::c_void;

#[unsafe(no_mangle)]
pub extern "C" fn create() -> *mut c_void {
    // Intentionally return a null pointer, simulating a failed construction.
    std::ptr::null_mut()
}

#[unsafe(no_mangle)]
pub extern "C" fn destroy(_raw: *mut c_void) {}
