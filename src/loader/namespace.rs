//! Weak registry of named, live units.

use super::{LoadError, LoadedUnit};
use hashbrown::HashMap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};

/// Names of loaded units, held weakly.
///
/// An entry never keeps its unit alive; once the last strong reference to a
/// unit drops, its name becomes free again.
#[derive(Debug, Default)]
pub struct Namespace {
    entries: Mutex<HashMap<String, Weak<LoadedUnit>>>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live unit is registered under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.entries
            .lock()
            .get(name)
            .is_some_and(|entry| entry.strong_count() > 0)
    }

    /// The live unit registered under `name`, if any.
    pub fn lookup(&self, name: &str) -> Option<Arc<LoadedUnit>> {
        self.entries.lock().get(name).and_then(Weak::upgrade)
    }

    /// Number of live registered units.
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .values()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    /// Register every named unit in `units`, or none of them.
    pub(crate) fn register_all(&self, units: &[Arc<LoadedUnit>]) -> Result<(), LoadError> {
        let mut entries = self.entries.lock();
        entries.retain(|_, entry| entry.strong_count() > 0);

        let mut seen = hashbrown::HashSet::with_capacity(units.len());
        for name in units.iter().filter_map(|unit| unit.name()) {
            if entries.contains_key(name) || !seen.insert(name) {
                return Err(LoadError::Duplicate(name.to_string()));
            }
        }
        for unit in units {
            if let Some(name) = unit.name() {
                entries.insert(name.to_string(), Arc::downgrade(unit));
            }
        }
        Ok(())
    }

    /// Drop the entry for `name` if its unit is gone.
    pub(crate) fn release(&self, name: &str) {
        let mut entries = self.entries.lock();
        if entries
            .get(name)
            .is_some_and(|entry| entry.strong_count() == 0)
        {
            entries.remove(name);
        }
    }
}
