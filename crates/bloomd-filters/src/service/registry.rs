//! Name -> handle registry and its take/return protocol
//!
//! INVARIANTS:
//! - At most one slot per name
//! - `refcount` and `active` change only under the registry lock
//! - `take` succeeds only while the slot is active
//! - A slot retires exactly once: in the same critical section that sees
//!   `refcount == 0 && !active`. The handle is handed back to the caller,
//!   which tears it down after the lock is released and then calls
//!   [`Registry::finish`]. Until then the slot keeps its name reserved.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::handle::FilterHandle;
use crate::error::FilterError;

/// Registry entry for one filter
struct Slot {
    handle: Arc<FilterHandle>,
    /// Cleared by drop; no new takers afterwards
    active: bool,
    /// Outstanding takers. The registry itself holds no reference.
    refcount: usize,
    /// Teardown handed out; the slot goes once it completes
    retiring: bool,
}

impl Slot {
    /// Mark the slot retiring if nothing can reach it any more
    fn try_retire(&mut self) -> Option<Retired> {
        if self.refcount == 0 && !self.active && !self.retiring {
            self.retiring = true;
            Some(Retired(Arc::clone(&self.handle)))
        } else {
            None
        }
    }
}

/// A handle whose last reference is gone and that must now be torn down
#[must_use = "a retired handle must be torn down"]
pub struct Retired(pub Arc<FilterHandle>);

impl fmt::Debug for Retired {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Retired").field(&self.0.name()).finish()
    }
}

/// Lock-protected map of live filters
#[derive(Default)]
pub struct Registry {
    slots: Mutex<HashMap<String, Slot>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take a reference to an active filter
    pub fn take(&self, name: &str) -> Option<Arc<FilterHandle>> {
        let mut slots = self.slots.lock();
        let slot = slots.get_mut(name).filter(|slot| slot.active)?;
        slot.refcount += 1;
        Some(Arc::clone(&slot.handle))
    }

    /// Return a reference obtained from [`take`](Self::take)
    ///
    /// Yields the handle when this was the last reference to a dropped
    /// filter.
    pub fn release(&self, handle: &Arc<FilterHandle>) -> Option<Retired> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(handle.name())
            .filter(|slot| Arc::ptr_eq(&slot.handle, handle))?;

        debug_assert!(slot.refcount > 0, "release without matching take");
        slot.refcount = slot.refcount.saturating_sub(1);
        slot.try_retire()
    }

    /// Mark a filter dropped
    ///
    /// Yields the handle immediately when nobody holds a reference;
    /// otherwise the last [`release`](Self::release) will.
    pub fn deactivate(&self, name: &str) -> Result<Option<Retired>, FilterError> {
        let mut slots = self.slots.lock();
        let slot = slots
            .get_mut(name)
            .filter(|slot| slot.active)
            .ok_or_else(|| FilterError::NotFound(name.to_string()))?;

        slot.active = false;
        Ok(slot.try_retire())
    }

    /// Release the name of a retired filter once its teardown is done
    pub fn finish(&self, retired: Retired) {
        let Retired(handle) = retired;
        let mut slots = self.slots.lock();
        let done = slots
            .get(handle.name())
            .is_some_and(|slot| slot.retiring && Arc::ptr_eq(&slot.handle, &handle));
        if done {
            slots.remove(handle.name());
        }
    }

    /// Whether any slot exists for `name`, active, dropped or retiring
    pub fn contains(&self, name: &str) -> bool {
        self.slots.lock().contains_key(name)
    }

    /// Register a new, active handle with no outstanding references
    ///
    /// Callers check [`contains`](Self::contains) first under the creation
    /// lock; an existing slot is never replaced.
    pub fn insert(&self, handle: Arc<FilterHandle>) -> bool {
        let mut slots = self.slots.lock();
        if slots.contains_key(handle.name()) {
            return false;
        }
        slots.insert(
            handle.name().to_string(),
            Slot {
                handle,
                active: true,
                refcount: 0,
                retiring: false,
            },
        );
        true
    }

    /// Number of active filters
    pub fn active_len(&self) -> usize {
        self.slots.lock().values().filter(|slot| slot.active).count()
    }

    /// Sorted names of active filters starting with `prefix`
    pub fn active_names(&self, prefix: Option<&str>) -> Vec<String> {
        let mut names: Vec<String> = {
            let slots = self.slots.lock();
            slots
                .iter()
                .filter(|(name, slot)| {
                    slot.active && prefix.map_or(true, |prefix| name.starts_with(prefix))
                })
                .map(|(name, _)| name.clone())
                .collect()
        };
        names.sort_unstable();
        names
    }

    /// Remove every slot regardless of refcount
    pub fn drain(&self) -> Vec<Arc<FilterHandle>> {
        self.slots
            .lock()
            .drain()
            .map(|(_, slot)| slot.handle)
            .collect()
    }

    #[cfg(test)]
    pub fn refcount(&self, name: &str) -> Option<usize> {
        self.slots.lock().get(name).map(|slot| slot.refcount)
    }
}
