//! The "Default" library every dynlibs setup pass loads first.
//!
//! It implements the `dynlibs.DefaultInterface` contract with a setup step
//! that only records that it ran.
#![allow(non_snake_case)] // Library name follows the loader's "Default" convention

use std::ffi::CStr;

use dynlibs_api::{DEFAULT_INTERFACE, LibraryInterface, export_library};
use log::info;

#[derive(Debug, Default)]
pub struct DefaultLibrary {
    setup_runs: u32,
}

impl DefaultLibrary {
    /// How many times the host ran `setup` on this instance.
    pub fn setup_runs(&self) -> u32 {
        self.setup_runs
    }
}

impl LibraryInterface for DefaultLibrary {
    const INTERFACE_ID: &'static CStr = DEFAULT_INTERFACE;

    fn setup(&mut self) -> Result<(), String> {
        self.setup_runs += 1;
        info!("Default library set up (run {})", self.setup_runs);
        Ok(())
    }
}

export_library!(DefaultLibrary);

#[cfg(test)]
mod tests {
    use super::*;
    use dynlibs_api::{RawInterface, SetupStatus};

    #[test]
    fn test_exported_constructor_produces_default_interface() {
        let raw = create();
        assert!(!raw.is_null());
        let record: &RawInterface = unsafe { &*raw };
        assert_eq!(record.struct_size, RawInterface::SIZE);
        assert_eq!(unsafe { CStr::from_ptr(record.interface_id) }, DEFAULT_INTERFACE);

        let setup = record.setup.expect("setup entry point");
        assert_eq!(unsafe { setup(record.object) }, SetupStatus::OK);
        assert_eq!(unsafe { setup(record.object) }, SetupStatus::OK);
        let library = unsafe { &*record.object.cast::<DefaultLibrary>() };
        assert_eq!(library.setup_runs(), 2);

        unsafe { destroy(raw) };
    }
}
