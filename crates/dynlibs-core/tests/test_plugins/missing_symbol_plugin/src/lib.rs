#![allow(non_snake_case)] // Library name follows the loader's "MissingSymbol" convention

use std::ffi::c_void;

// The loader looks for `create`; this library exports a differently named
// constructor, so loading must fail on the symbol lookup.
#[unsafe(no_mangle)]
pub extern "C" fn create_instance() -> *mut c_void {
    std::ptr::null_mut()
}

#[unsafe(no_mangle)]
pub extern "C" fn destroy(_raw: *mut c_void) {}
