//! Names of filters touched since the last drain
//!
//! Guarded by its own lock so marking a filter hot never contends with the
//! registry.

use std::collections::HashSet;

use parking_lot::Mutex;

#[derive(Default)]
pub struct HotSet {
    names: Mutex<HashSet<String>>,
}

impl HotSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark `name` hot; idempotent
    pub fn mark(&self, name: &str) {
        let mut names = self.names.lock();
        if !names.contains(name) {
            names.insert(name.to_string());
        }
    }

    #[cfg(test)]
    pub fn contains(&self, name: &str) -> bool {
        self.names.lock().contains(name)
    }

    /// Sorted copy of the current set
    pub fn snapshot(&self) -> Vec<String> {
        let mut names: Vec<String> = self.names.lock().iter().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Take the current set, leaving it empty
    pub fn drain(&self) -> Vec<String> {
        let mut names: Vec<String> = std::mem::take(&mut *self.names.lock())
            .into_iter()
            .collect();
        names.sort_unstable();
        names
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.names.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.names.lock().is_empty()
    }
}
