#![allow(non_snake_case)]

use std::ffi::CStr;

use dynlibs_api::{LibraryInterface, export_library};

/// Well-formed library that implements some other contract than the host expects.
#[derive(Default)]
pub struct MismatchedLibrary;

impl LibraryInterface for MismatchedLibrary {
    const INTERFACE_ID: &'static CStr = c"dynlibs.test.SomethingElse";

    fn setup(&mut self) -> Result<(), String> {
        Ok(())
    }
}

export_library!(MismatchedLibrary);
