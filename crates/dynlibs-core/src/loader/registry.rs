use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use crate::loader::instance::{InterfaceInstance, LibraryHandle};

/// A registry entry: the opened library and the instance it constructed.
///
/// Only the library's path is visible; the OS handle stays in the crate.
///
/// ```compile_fail
/// use dynlibs_core::loader::instance::LibraryHandle;
/// ```
#[derive(Debug, Clone)]
pub struct Binding {
    handle: Rc<LibraryHandle>,
    instance: InterfaceInstance,
}

impl Binding {
    pub(crate) fn new(handle: Rc<LibraryHandle>, instance: InterfaceInstance) -> Self {
        Self { handle, instance }
    }

    pub fn instance(&self) -> &InterfaceInstance {
        &self.instance
    }

    pub fn library_path(&self) -> &Path {
        self.handle.path()
    }
}

/// Library name -> loaded binding. Cloning is shallow.
#[derive(Debug, Clone, Default)]
pub struct BindingsMap {
    entries: HashMap<String, Binding>,
}

impl BindingsMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `binding` under `name`, returning the entry it replaced.
    pub fn insert(&mut self, name: impl Into<String>, binding: Binding) -> Option<Binding> {
        self.entries.insert(name.into(), binding)
    }

    pub fn remove(&mut self, name: &str) -> Option<Binding> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.entries.get(name)
    }

    pub fn instance(&self, name: &str) -> Option<&InterfaceInstance> {
        self.entries.get(name).map(Binding::instance)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Library names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Binding)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
