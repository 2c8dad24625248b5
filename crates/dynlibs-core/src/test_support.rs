//! In-process stand-ins for loaded libraries.
//!
//! Records are built with the same `dynlibs_api` helpers a real library uses,
//! and attached to a handle onto the test process itself.
use std::ffi::{CStr, c_void};
use std::ptr;
use std::rc::Rc;

use dynlibs_api::{
    DEFAULT_INTERFACE, LibraryInterface, RawInterface, SetupFn, SetupStatus, construct, release,
};

use crate::loader::instance::{InterfaceInstance, LibraryHandle};
use crate::loader::registry::{Binding, BindingsMap};

pub(crate) const OTHER_INTERFACE: &CStr = c"dynlibs.test.Other";

#[derive(Default)]
pub(crate) struct FakeDefault;

impl LibraryInterface for FakeDefault {
    const INTERFACE_ID: &'static CStr = DEFAULT_INTERFACE;

    fn setup(&mut self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeOther;

impl LibraryInterface for FakeOther {
    const INTERFACE_ID: &'static CStr = OTHER_INTERFACE;

    fn setup(&mut self) -> Result<(), String> {
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakeFailing;

impl LibraryInterface for FakeFailing {
    const INTERFACE_ID: &'static CStr = DEFAULT_INTERFACE;

    fn setup(&mut self) -> Result<(), String> {
        Err("fake setup failure".to_string())
    }
}

unsafe extern "C" fn destroy_fake<T: LibraryInterface>(raw: *mut RawInterface) {
    unsafe { release::<T>(raw) }
}

pub(crate) fn fake_binding<T: LibraryInterface + Default>(name: &str) -> Binding {
    let handle = Rc::new(LibraryHandle::current_process(name));
    let raw = construct(T::default);
    let instance = unsafe { InterfaceInstance::from_raw(raw, destroy_fake::<T>, Rc::clone(&handle)) }
        .expect("fake constructor returned an instance");
    Binding::new(handle, instance)
}

pub(crate) fn fake_instance<T: LibraryInterface + Default>(name: &str) -> InterfaceInstance {
    fake_binding::<T>(name).instance().clone()
}

unsafe extern "C" fn destroy_record(raw: *mut RawInterface) {
    drop(unsafe { Box::from_raw(raw) });
}

unsafe extern "C" fn noop_setup(_object: *mut c_void) -> SetupStatus {
    SetupStatus::OK
}

/// A hand-built record claiming the Default interface.
pub(crate) fn malformed_instance(name: &str, struct_size: usize, with_setup: bool) -> InterfaceInstance {
    let handle = Rc::new(LibraryHandle::current_process(name));
    let raw = Box::into_raw(Box::new(RawInterface {
        struct_size,
        interface_id: DEFAULT_INTERFACE.as_ptr(),
        object: ptr::null_mut(),
        setup: with_setup.then_some(noop_setup as SetupFn),
    }));
    unsafe { InterfaceInstance::from_raw(raw, destroy_record, handle) }.expect("record is non-null")
}

/// A registry holding one fake Default-compatible binding per name.
pub(crate) fn fake_bindings(names: &[&str]) -> BindingsMap {
    let mut map = BindingsMap::new();
    for name in names {
        map.insert(*name, fake_binding::<FakeDefault>(name));
    }
    map
}
