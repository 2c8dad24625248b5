#![allow(non_snake_case)]

use std::ffi::CStr;

use dynlibs_api::{DEFAULT_INTERFACE, LibraryInterface, export_library};

#[derive(Default)]
pub struct FailingSetupLibrary;

impl LibraryInterface for FailingSetupLibrary {
    const INTERFACE_ID: &'static CStr = DEFAULT_INTERFACE;

    fn setup(&mut self) -> Result<(), String> {
        Err("Library setup deliberately failed!".to_string())
    }
}

export_library!(FailingSetupLibrary);
