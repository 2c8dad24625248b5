#![allow(non_snake_case)] // Library name follows the loader's "MissingDestructor" convention

use std::ffi::c_void;

// Exports the constructor but no `destroy`, so the loader must refuse it
// before anything is constructed.
#[unsafe(no_mangle)]
pub extern "C" fn create() -> *mut c_void {
    std::ptr::null_mut()
}
