#![cfg(test)]

use std::ffi::c_void;
use std::ptr;

use tempfile::tempdir;

use crate::config::LoaderConfig;
use crate::facade::LibLoader;
use crate::facade::ffi::{self, DynHandle, DynStatus};
use crate::facade::state::StateBlob;
use crate::loader::error::{LoaderError, StateFault};
use crate::loader::instance::WeakInstance;
use crate::test_support::fake_bindings;

fn handle_with(names: &[&str]) -> *mut DynHandle {
    let mut loader = LibLoader::new();
    loader.inject_state(StateBlob::new(fake_bindings(names)));
    ffi::into_handle(loader)
}

fn names(handle: *mut DynHandle) -> Vec<String> {
    unsafe {
        ffi::with_loader(handle, |loader| {
            loader.bindings().names().into_iter().map(String::from).collect()
        })
    }
    .expect("live handle")
}

fn weak(handle: *mut DynHandle, name: &str) -> WeakInstance {
    unsafe { ffi::with_loader(handle, |loader| loader.bindings().instance(name).map(|i| i.downgrade())) }
        .expect("live handle")
        .expect("registered instance")
}

fn instance_ptr(handle: *mut DynHandle, name: &str) -> usize {
    unsafe {
        ffi::with_loader(handle, |loader| {
            loader.bindings().instance(name).map(|i| i.as_ptr().addr())
        })
    }
    .expect("live handle")
    .expect("registered instance")
}

#[test]
fn test_status_codes_are_stable() {
    assert_eq!(DynStatus::Ok as i32, 0);
    assert_eq!(DynStatus::NullHandle as i32, 1);
    assert_eq!(DynStatus::InvalidHandle as i32, 2);
    assert_eq!(DynStatus::NullBlob as i32, 3);
    assert_eq!(DynStatus::InvalidBlob as i32, 4);
    assert_eq!(DynStatus::Panicked as i32, 10);
}

#[test]
fn test_create_and_destroy() {
    let h = ffi::create();
    assert!(!h.is_null());
    assert!(ffi::is_live(h));
    assert!(names(h).is_empty());
    unsafe {
        assert_eq!(ffi::destroy(h), DynStatus::Ok);
    }
    assert!(!ffi::is_live(h));
}

#[test]
fn test_null_handle_is_rejected() {
    unsafe {
        assert_eq!(ffi::destroy(ptr::null_mut()), DynStatus::NullHandle);
        assert_eq!(ffi::setup(ptr::null_mut()), DynStatus::NullHandle);
        assert!(ffi::get_data(ptr::null_mut()).is_null());
        assert!(matches!(
            ffi::with_loader(ptr::null_mut(), |_| ()),
            Err(LoaderError::StateError(StateFault::NullHandle))
        ));
    }
}

#[test]
fn test_destroy_twice_is_rejected() {
    let h = handle_with(&[]);
    unsafe {
        assert_eq!(ffi::destroy(h), DynStatus::Ok);
        assert_eq!(ffi::destroy(h), DynStatus::InvalidHandle);
    }
}

#[test]
fn test_operations_on_destroyed_handle_are_rejected() {
    let h = handle_with(&["A"]);
    unsafe {
        assert_eq!(ffi::destroy(h), DynStatus::Ok);
        assert!(ffi::get_data(h).is_null());
        assert_eq!(ffi::setup(h), DynStatus::InvalidHandle);
        assert!(matches!(
            ffi::with_loader(h, |_| ()),
            Err(LoaderError::StateError(StateFault::DeadHandle))
        ));
    }
}

#[test]
fn test_destroyed_handle_is_not_reused_by_next_create() {
    let stale = handle_with(&["A"]);
    unsafe {
        assert_eq!(ffi::destroy(stale), DynStatus::Ok);
    }
    let fresh = ffi::create();
    assert_ne!(stale, fresh);
    assert!(!ffi::is_live(stale));
    assert!(ffi::is_live(fresh));

    unsafe {
        assert_eq!(ffi::setup(stale), DynStatus::InvalidHandle);
        assert!(ffi::get_data(stale).is_null());
        assert_eq!(ffi::destroy(stale), DynStatus::InvalidHandle);
        // The fresh loader was not touched by any of the calls above.
        assert!(ffi::is_live(fresh));
        assert_eq!(ffi::destroy(fresh), DynStatus::Ok);
    }
}

#[test]
fn test_foreign_pointer_is_not_a_handle() {
    let mut loader = LibLoader::new();
    let foreign = ptr::from_mut(&mut loader).cast::<DynHandle>();
    assert!(!ffi::is_live(foreign));
    unsafe {
        assert_eq!(ffi::setup(foreign), DynStatus::InvalidHandle);
        assert_eq!(ffi::destroy(foreign), DynStatus::InvalidHandle);
    }
}

#[test]
fn test_get_and_set_data_roundtrip_between_handles() {
    let source = handle_with(&["A", "B"]);
    let target = handle_with(&["C"]);
    let a = instance_ptr(source, "A");
    unsafe {
        let blob = ffi::get_data(source);
        assert!(!blob.is_null());
        assert_eq!(ffi::set_data(target, blob), DynStatus::Ok);
    }

    assert_eq!(names(target), vec!["A", "B"]);
    assert_eq!(instance_ptr(target, "A"), a);
    // The source is untouched by get_data.
    assert_eq!(names(source), vec!["A", "B"]);

    unsafe {
        assert_eq!(ffi::destroy(source), DynStatus::Ok);
        assert_eq!(ffi::destroy(target), DynStatus::Ok);
    }
}

#[test]
fn test_set_data_with_null_blob() {
    let h = handle_with(&["A"]);
    unsafe {
        assert_eq!(ffi::set_data(h, ptr::null_mut()), DynStatus::NullBlob);
    }
    assert_eq!(names(h), vec!["A"]);
    unsafe {
        assert_eq!(ffi::destroy(h), DynStatus::Ok);
    }
}

#[test]
fn test_set_data_with_foreign_pointer() {
    let h = handle_with(&["A"]);
    let mut bogus = [0u64; 8];
    unsafe {
        let status = ffi::set_data(h, bogus.as_mut_ptr().cast::<c_void>());
        assert_eq!(status, DynStatus::InvalidBlob);
    }
    assert_eq!(names(h), vec!["A"]);
    unsafe {
        assert_eq!(ffi::destroy(h), DynStatus::Ok);
    }
}

#[test]
fn test_set_data_on_dead_handle_still_consumes_blob() {
    let source = handle_with(&["A"]);
    let dead = handle_with(&[]);
    let a = weak(source, "A");
    unsafe {
        let blob = ffi::get_data(source);
        assert_eq!(ffi::destroy(source), DynStatus::Ok);
        assert!(a.is_alive());

        assert_eq!(ffi::destroy(dead), DynStatus::Ok);
        assert_eq!(ffi::set_data(dead, blob), DynStatus::InvalidHandle);
        assert!(!a.is_alive());
    }
}

#[test]
fn test_free_data() {
    let h = handle_with(&["A"]);
    let a = weak(h, "A");
    unsafe {
        let blob = ffi::get_data(h);
        assert_eq!(ffi::destroy(h), DynStatus::Ok);
        assert!(a.is_alive());

        assert_eq!(ffi::free_data(blob), DynStatus::Ok);
        assert!(!a.is_alive());
        assert_eq!(ffi::free_data(ptr::null_mut()), DynStatus::NullBlob);
    }
}

#[test]
fn test_consumed_blob_is_rejected() {
    let source = handle_with(&["A"]);
    let target = handle_with(&[]);
    unsafe {
        let blob = ffi::get_data(source);
        assert_eq!(ffi::set_data(target, blob), DynStatus::Ok);
        assert_eq!(ffi::free_data(blob), DynStatus::InvalidBlob);
        assert_eq!(ffi::set_data(target, blob), DynStatus::InvalidBlob);

        assert_eq!(ffi::destroy(source), DynStatus::Ok);
        assert_eq!(ffi::destroy(target), DynStatus::Ok);
    }
}

#[test]
fn test_freed_blob_is_rejected() {
    let h = handle_with(&["A"]);
    unsafe {
        let blob = ffi::get_data(h);
        assert_eq!(ffi::free_data(blob), DynStatus::Ok);
        assert_eq!(ffi::free_data(blob), DynStatus::InvalidBlob);
        assert_eq!(ffi::destroy(h), DynStatus::Ok);
    }
}

#[test]
fn test_setup_failure_maps_to_load_failed() {
    let dir = tempdir().expect("temp dir");
    let config = LoaderConfig {
        search_dirs: vec![dir.path().to_path_buf()],
        ..LoaderConfig::default()
    };
    let h = ffi::into_handle(LibLoader::with_config(&config));
    unsafe {
        assert_eq!(ffi::setup(h), DynStatus::LoadFailed);
    }
    assert!(names(h).is_empty());
    unsafe {
        assert_eq!(ffi::destroy(h), DynStatus::Ok);
    }
}
