//! Filter Manager
//!
//! Owns the registry of named filters and mediates every access to them.
//!
//! ## Locks
//!
//! | Lock | Guards | Held across I/O |
//! |------|--------|-----------------|
//! | creation lock | create check-then-insert | yes |
//! | registry lock | name -> slot map, `active`, `refcount`, `retiring` | never |
//! | hot set lock | names touched since the last drain | never |
//! | handle lock (rw) | one filter store | yes |
//!
//! Locks are never nested except creation -> registry (create). The
//! registry lock is never held while a handle lock is taken, so one slow
//! filter never stalls lookups.
//!
//! ## Operation shape
//!
//! take(name) -> lock handle -> delegate to the store -> unlock ->
//! mark hot -> return(name). Returning the last reference of a dropped
//! filter marks its slot retiring, tears the store down with no manager
//! lock held, then removes the slot. The name stays taken until then.

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};

use super::bootstrap::discover_filters;
use super::handle::FilterHandle;
use super::hot_set::HotSet;
use super::registry::{Registry, Retired};
use crate::adapters::DiskFilterFactory;
use crate::domain::{FilterConfig, ManagerConfig};
use crate::error::FilterError;
use crate::ports::{FilterFactory, FilterInfo, FilterManagerApi};

/// Longest accepted filter name, in bytes
pub const MAX_NAME_LEN: usize = 200;

/// Registry of named filters and their lifecycle
///
/// Dropping the manager closes every remaining filter without deleting its
/// storage; outstanding borrows make that impossible while calls are in
/// flight.
pub struct FilterManager<F: FilterFactory = DiskFilterFactory> {
    config: ManagerConfig,
    factory: F,
    registry: Registry,
    hot: HotSet,
    /// Serializes creation
    create_lock: Mutex<()>,
}

/// A counted reference to a live filter, returned on drop
struct Lease<'a, F: FilterFactory> {
    manager: &'a FilterManager<F>,
    handle: Arc<FilterHandle>,
}

impl<F: FilterFactory> Deref for Lease<'_, F> {
    type Target = FilterHandle;

    fn deref(&self) -> &FilterHandle {
        &self.handle
    }
}

impl<F: FilterFactory> Drop for Lease<'_, F> {
    fn drop(&mut self) {
        if let Some(retired) = self.manager.registry.release(&self.handle) {
            self.manager.retire(retired);
        }
    }
}

impl FilterManager<DiskFilterFactory> {
    /// Create a manager persisting filters under `config.data_dir`
    ///
    /// Filters found there from a previous run are registered before this
    /// returns.
    pub fn new(config: ManagerConfig) -> Self {
        let factory = DiskFilterFactory::new(&config.data_dir);
        Self::with_factory(config, factory)
    }
}

impl<F: FilterFactory> FilterManager<F> {
    /// Create a manager backed by a custom store factory
    pub fn with_factory(config: ManagerConfig, factory: F) -> Self {
        let manager = Self {
            config,
            factory,
            registry: Registry::new(),
            hot: HotSet::new(),
            create_lock: Mutex::new(()),
        };
        manager.load_existing();
        manager
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Names touched since the last drain, sorted
    pub fn hot_filters(&self) -> Vec<String> {
        self.hot.snapshot()
    }

    /// Take the hot set, leaving it empty
    pub fn drain_hot_filters(&self) -> Vec<String> {
        self.hot.drain()
    }

    /// Register every filter persisted under the data directory
    fn load_existing(&self) {
        let default = self.config.default_filter.clone();
        for name in discover_filters(&self.config.data_dir) {
            match self.add_filter(&name, &default, true) {
                Ok(()) => debug!(filter = %name, "Reopened filter"),
                Err(e) => warn!(filter = %name, error = %e, "Failed to reopen filter"),
            }
        }
    }

    /// Check-then-insert under the creation lock
    fn add_filter(
        &self,
        name: &str,
        config: &FilterConfig,
        reopen_existing: bool,
    ) -> Result<(), FilterError> {
        let _creating = self.create_lock.lock();

        // Inactive slots count too: a dropped filter keeps its name until
        // its storage is gone.
        if self.registry.contains(name) {
            return Err(FilterError::AlreadyExists(name.to_string()));
        }

        let store = self
            .factory
            .create(config, name, reopen_existing)
            .map_err(|source| FilterError::CreateFailed {
                name: name.to_string(),
                source,
            })?;

        if !self.registry.insert(Arc::new(FilterHandle::new(name, store))) {
            return Err(FilterError::AlreadyExists(name.to_string()));
        }
        Ok(())
    }

    fn take(&self, name: &str) -> Result<Lease<'_, F>, FilterError> {
        self.registry
            .take(name)
            .map(|handle| Lease {
                manager: self,
                handle,
            })
            .ok_or_else(|| FilterError::NotFound(name.to_string()))
    }

    /// Tear down a dropped filter whose last reference is gone
    ///
    /// The retiring slot keeps the name reserved while the store is purged,
    /// so a create of the same name cannot race the directory removal.
    fn retire(&self, retired: Retired) {
        retired.0.purge();
        debug!(filter = %retired.0.name(), "Filter torn down");
        self.registry.finish(retired);
    }

    pub(crate) fn flush_unmarked(&self, name: &str) -> Result<(), FilterError> {
        let filter = self.take(name)?;
        filter.read().flush()?;
        filter.metrics().record_flush();
        Ok(())
    }
}

impl<F: FilterFactory> FilterManagerApi for FilterManager<F> {
    #[instrument(skip(self, config))]
    fn create_filter(&self, name: &str, config: Option<&FilterConfig>) -> Result<(), FilterError> {
        validate_name(name)?;
        let config = match config {
            Some(custom) => {
                custom.validate()?;
                custom
            }
            None => &self.config.default_filter,
        };

        self.add_filter(name, config, false)?;
        info!(filter = %name, capacity = config.initial_capacity, "Created filter");
        Ok(())
    }

    #[instrument(skip(self))]
    fn drop_filter(&self, name: &str) -> Result<(), FilterError> {
        match self.registry.deactivate(name)? {
            Some(retired) => self.retire(retired),
            None => debug!(filter = %name, "Teardown deferred to last holder"),
        }
        info!(filter = %name, "Dropped filter");
        Ok(())
    }

    fn unmap_filter(&self, name: &str) -> Result<(), FilterError> {
        let filter = self.take(name)?;
        filter.write().close()?;
        filter.metrics().record_unmap();
        debug!(filter = %name, "Unmapped filter");
        Ok(())
    }

    fn flush_filter(&self, name: &str) -> Result<(), FilterError> {
        let filter = self.take(name)?;
        filter.read().flush()?;
        filter.metrics().record_flush();
        self.hot.mark(name);
        Ok(())
    }

    fn check_keys<K: AsRef<[u8]>>(&self, name: &str, keys: &[K]) -> Result<Vec<bool>, FilterError> {
        let filter = self.take(name)?;
        let results = {
            let store = filter.read();
            keys.iter()
                .map(|key| store.contains(key.as_ref()))
                .collect::<Result<Vec<_>, _>>()?
        };
        filter.metrics().record_checks(&results);
        self.hot.mark(name);
        Ok(results)
    }

    fn set_keys<K: AsRef<[u8]>>(&self, name: &str, keys: &[K]) -> Result<Vec<bool>, FilterError> {
        let filter = self.take(name)?;
        let results = {
            let mut store = filter.write();
            let mut results = Vec::with_capacity(keys.len());
            for key in keys {
                results.push(store.add(key.as_ref())?);
            }
            results
        };
        filter.metrics().record_sets(&results);
        self.hot.mark(name);
        Ok(results)
    }

    fn num_filters(&self) -> usize {
        self.registry.active_len()
    }

    fn list_filters(&self, prefix: Option<&str>) -> Vec<String> {
        self.registry.active_names(prefix)
    }

    fn filter_info(&self, name: &str) -> Result<FilterInfo, FilterError> {
        let filter = self.take(name)?;
        let store = filter.read().info();
        Ok(FilterInfo {
            name: name.to_string(),
            store,
            metrics: filter.metrics().snapshot(),
        })
    }
}

impl<F: FilterFactory> Drop for FilterManager<F> {
    fn drop(&mut self) {
        // No lease outlives `&self`, so every remaining slot is active.
        let handles = self.registry.drain();
        let count = handles.len();
        for handle in handles {
            handle.close();
        }
        info!(filters = count, "Filter manager shut down");
    }
}

/// Filter names become directory names; keep them to one path component
fn validate_name(name: &str) -> Result<(), FilterError> {
    let valid = !name.is_empty()
        && name.len() <= MAX_NAME_LEN
        && !name.chars().any(|c| matches!(c, '/' | '\\' | '\0'));
    if valid {
        Ok(())
    } else {
        Err(FilterError::InvalidName(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::ports::{FilterStore, StoreInfo};
    use std::collections::HashSet;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    /// One-shot pause point: signals entry, then waits for release
    #[derive(Default)]
    struct Gate(Mutex<Option<(mpsc::Sender<()>, mpsc::Receiver<()>)>>);

    impl Gate {
        /// Returns (entered, release)
        fn arm(&self) -> (mpsc::Receiver<()>, mpsc::Sender<()>) {
            let (entered_tx, entered_rx) = mpsc::channel();
            let (release_tx, release_rx) = mpsc::channel();
            *self.0.lock() = Some((entered_tx, release_rx));
            (entered_rx, release_tx)
        }

        fn pass(&self) {
            let armed = self.0.lock().take();
            if let Some((entered, release)) = armed {
                entered.send(()).unwrap();
                release.recv().unwrap();
            }
        }
    }

    /// Shared observation points for scripted stores
    #[derive(Default)]
    struct Script {
        closes: AtomicUsize,
        deletes: AtomicUsize,
        fail_create: AtomicBool,
        on_create: Gate,
        on_contains: Gate,
        on_delete: Gate,
    }

    struct ScriptedStore {
        keys: HashSet<Vec<u8>>,
        script: Arc<Script>,
    }

    impl FilterStore for ScriptedStore {
        fn add(&mut self, key: &[u8]) -> Result<bool, StorageError> {
            Ok(self.keys.insert(key.to_vec()))
        }

        fn contains(&self, key: &[u8]) -> Result<bool, StorageError> {
            self.script.on_contains.pass();
            Ok(self.keys.contains(key))
        }

        fn flush(&self) -> Result<(), StorageError> {
            Ok(())
        }

        fn close(&mut self) -> Result<(), StorageError> {
            self.script.closes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn delete(&mut self) -> Result<(), StorageError> {
            self.script.on_delete.pass();
            self.script.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn info(&self) -> StoreInfo {
            StoreInfo {
                config: FilterConfig::default(),
                size_bits: 0,
                hash_count: 0,
                len: Some(self.keys.len()),
                mapped: true,
            }
        }
    }

    struct ScriptedFactory {
        script: Arc<Script>,
    }

    impl FilterFactory for ScriptedFactory {
        fn create(
            &self,
            _config: &FilterConfig,
            _name: &str,
            _reopen_existing: bool,
        ) -> Result<Box<dyn FilterStore>, StorageError> {
            self.script.on_create.pass();
            if self.script.fail_create.load(Ordering::SeqCst) {
                return Err(StorageError::io(
                    "/nonexistent",
                    std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                ));
            }
            Ok(Box::new(ScriptedStore {
                keys: HashSet::new(),
                script: Arc::clone(&self.script),
            }))
        }
    }

    fn scripted_manager() -> (FilterManager<ScriptedFactory>, Arc<Script>) {
        let script = Arc::new(Script::default());
        let config = ManagerConfig::with_data_dir(PathBuf::from("/nonexistent/bloomd-test"));
        let manager = FilterManager::with_factory(
            config,
            ScriptedFactory {
                script: Arc::clone(&script),
            },
        );
        (manager, script)
    }

    #[test]
    fn test_create_then_duplicate_reports_already_exists() {
        let (manager, _) = scripted_manager();

        manager.create_filter("users", None).unwrap();
        manager.set_keys("users", &["a"]).unwrap();

        assert!(matches!(
            manager.create_filter("users", None),
            Err(FilterError::AlreadyExists(_))
        ));
        assert_eq!(manager.check_keys("users", &["a"]).unwrap(), vec![true]);
    }

    #[test]
    fn test_create_failure_leaves_name_unregistered() {
        let (manager, script) = scripted_manager();
        script.fail_create.store(true, Ordering::SeqCst);

        assert!(matches!(
            manager.create_filter("users", None),
            Err(FilterError::CreateFailed { .. })
        ));
        assert_eq!(manager.num_filters(), 0);

        script.fail_create.store(false, Ordering::SeqCst);
        manager.create_filter("users", None).unwrap();
    }

    #[test]
    fn test_invalid_names_rejected() {
        let (manager, _) = scripted_manager();
        let too_long = "x".repeat(MAX_NAME_LEN + 1);

        for name in ["", "a/b", "a\\b", "a\0b", too_long.as_str()] {
            assert!(matches!(
                manager.create_filter(name, None),
                Err(FilterError::InvalidName(_))
            ));
        }
    }

    #[test]
    fn test_invalid_custom_config_rejected() {
        let (manager, _) = scripted_manager();
        let config = FilterConfig {
            false_positive_rate: 0.0,
            ..Default::default()
        };

        assert!(matches!(
            manager.create_filter("users", Some(&config)),
            Err(FilterError::InvalidParameters(_))
        ));
    }

    #[test]
    fn test_operations_on_unknown_filter_report_not_found() {
        let (manager, _) = scripted_manager();

        assert!(manager.check_keys("nope", &["a"]).unwrap_err().is_not_found());
        assert!(manager.set_keys("nope", &["a"]).unwrap_err().is_not_found());
        assert!(manager.flush_filter("nope").unwrap_err().is_not_found());
        assert!(manager.unmap_filter("nope").unwrap_err().is_not_found());
        assert!(manager.drop_filter("nope").unwrap_err().is_not_found());
        assert!(manager.filter_info("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_drop_idle_filter_tears_down_once() {
        let (manager, script) = scripted_manager();
        manager.create_filter("users", None).unwrap();

        manager.drop_filter("users").unwrap();

        assert_eq!(script.closes.load(Ordering::SeqCst), 1);
        assert_eq!(script.deletes.load(Ordering::SeqCst), 1);
        assert!(manager.check_keys("users", &["a"]).unwrap_err().is_not_found());
        assert!(manager.drop_filter("users").unwrap_err().is_not_found());
        assert_eq!(manager.num_filters(), 0);

        // The name can be reused once teardown is done
        manager.create_filter("users", None).unwrap();
        assert_eq!(manager.check_keys("users", &["a"]).unwrap(), vec![false]);
    }

    #[test]
    fn test_drop_while_check_in_flight_defers_teardown() {
        let (manager, script) = scripted_manager();
        let manager = Arc::new(manager);
        manager.create_filter("users", None).unwrap();
        manager.set_keys("users", &["a"]).unwrap();

        let (entered_rx, release_tx) = script.on_contains.arm();

        let reader = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.check_keys("users", &["a"]))
        };
        entered_rx.recv().unwrap();

        manager.drop_filter("users").unwrap();
        assert_eq!(script.deletes.load(Ordering::SeqCst), 0, "Holder still active");
        assert!(manager.check_keys("users", &["a"]).unwrap_err().is_not_found());
        assert!(matches!(
            manager.create_filter("users", None),
            Err(FilterError::AlreadyExists(_))
        ));

        release_tx.send(()).unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), vec![true]);

        assert_eq!(script.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(manager.num_filters(), 0);
        assert_eq!(manager.registry.refcount("users"), None);
    }

    #[test]
    fn test_concurrent_checks_and_drop_tear_down_once() {
        let (manager, script) = scripted_manager();
        let manager = Arc::new(manager);
        manager.create_filter("users", None).unwrap();

        let workers: Vec<_> = (0..8)
            .map(|_| {
                let manager = Arc::clone(&manager);
                thread::spawn(move || {
                    for _ in 0..500 {
                        match manager.check_keys("users", &["a", "b"]) {
                            Ok(results) => assert_eq!(results.len(), 2),
                            Err(e) => {
                                assert!(e.is_not_found());
                                break;
                            }
                        }
                    }
                })
            })
            .collect();

        thread::sleep(Duration::from_millis(5));
        manager.drop_filter("users").unwrap();

        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(script.deletes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_operations_mark_hot() {
        let (manager, _) = scripted_manager();
        manager.create_filter("a", None).unwrap();
        manager.create_filter("b", None).unwrap();
        manager.create_filter("c", None).unwrap();
        assert!(manager.hot_filters().is_empty(), "Create does not mark hot");

        manager.set_keys("a", &["x"]).unwrap();
        manager.check_keys("b", &["x"]).unwrap();
        manager.flush_filter("c").unwrap();
        assert_eq!(manager.hot_filters(), vec!["a", "b", "c"]);

        assert_eq!(manager.drain_hot_filters(), vec!["a", "b", "c"]);
        assert!(manager.hot_filters().is_empty());

        manager.unmap_filter("a").unwrap();
        assert!(manager.hot_filters().is_empty(), "Unmap does not mark hot");

        manager.flush_unmarked("a").unwrap();
        assert!(manager.hot_filters().is_empty());
    }

    #[test]
    fn test_filter_info_reports_metrics() {
        let (manager, _) = scripted_manager();
        manager.create_filter("users", None).unwrap();
        manager.set_keys("users", &["a", "a", "b"]).unwrap();
        manager.check_keys("users", &["a", "z"]).unwrap();
        manager.flush_filter("users").unwrap();
        manager.unmap_filter("users").unwrap();

        let info = manager.filter_info("users").unwrap();
        assert_eq!(info.name, "users");
        assert_eq!(info.store.len, Some(2));
        assert_eq!(info.metrics.set_hits, 2);
        assert_eq!(info.metrics.set_misses, 1);
        assert_eq!(info.metrics.check_hits, 1);
        assert_eq!(info.metrics.check_misses, 1);
        assert_eq!(info.metrics.flushes, 1);
        assert_eq!(info.metrics.unmaps, 1);
    }

    #[test]
    fn test_drop_completes_while_create_is_slow() {
        let (manager, script) = scripted_manager();
        let manager = Arc::new(manager);
        manager.create_filter("a", None).unwrap();

        let (entered_rx, release_tx) = script.on_create.arm();
        let creator = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.create_filter("slow", None))
        };
        entered_rx.recv().unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let dropper = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let result = manager.drop_filter("a");
                done_tx.send(()).unwrap();
                result
            })
        };
        let finished = done_rx.recv_timeout(Duration::from_secs(5));

        release_tx.send(()).unwrap();
        creator.join().unwrap().unwrap();
        dropper.join().unwrap().unwrap();

        assert!(finished.is_ok(), "Drop waited on an unrelated create");
        assert_eq!(script.deletes.load(Ordering::SeqCst), 1);
        assert_eq!(manager.list_filters(None), vec!["slow"]);
    }

    #[test]
    fn test_name_stays_reserved_until_teardown_finishes() {
        let (manager, script) = scripted_manager();
        let manager = Arc::new(manager);
        manager.create_filter("users", None).unwrap();

        let (entered_rx, release_tx) = script.on_delete.arm();
        let dropper = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.drop_filter("users"))
        };
        entered_rx.recv().unwrap();

        assert!(matches!(
            manager.create_filter("users", None),
            Err(FilterError::AlreadyExists(_))
        ));
        assert!(manager.check_keys("users", &["a"]).unwrap_err().is_not_found());
        assert!(manager.drop_filter("users").unwrap_err().is_not_found());
        assert_eq!(manager.num_filters(), 0);
        assert!(manager.list_filters(None).is_empty());

        release_tx.send(()).unwrap();
        dropper.join().unwrap().unwrap();

        assert_eq!(script.deletes.load(Ordering::SeqCst), 1);
        manager.create_filter("users", None).unwrap();
        assert_eq!(manager.num_filters(), 1);
    }

    #[test]
    fn test_manager_drop_closes_without_deleting() {
        let (manager, script) = scripted_manager();
        manager.create_filter("kept", None).unwrap();
        manager.create_filter("other", None).unwrap();
        manager.create_filter("gone", None).unwrap();
        manager.drop_filter("gone").unwrap();
        assert_eq!(script.closes.load(Ordering::SeqCst), 1);

        drop(manager);

        assert_eq!(script.closes.load(Ordering::SeqCst), 3);
        assert_eq!(script.deletes.load(Ordering::SeqCst), 1, "Only the dropped filter");
    }
}
