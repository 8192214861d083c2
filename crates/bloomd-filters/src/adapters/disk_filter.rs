//! Disk-backed filter store
//!
//! Each filter lives in `<data_dir>/bloomd.<name>/`:
//!
//! - `config.json` - the [`FilterConfig`] it was created with
//! - `data.bin`    - the bincode-encoded bitmap
//!
//! The bitmap is resident until `close()` and faults back in on the next
//! `add` or `contains`. Writes go through a temp file and `rename`, so a
//! crash mid-flush leaves the previous bitmap intact.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Mutex, RwLock, RwLockWriteGuard};
use tracing::debug;

use crate::domain::{BloomFilter, FilterConfig, FilterParams};
use crate::error::StorageError;
use crate::ports::{FilterFactory, FilterStore, StoreInfo};

/// Prefix of every filter directory under the data directory
pub const FOLDER_PREFIX: &str = "bloomd.";

const CONFIG_FILE: &str = "config.json";
const DATA_FILE: &str = "data.bin";

/// Opens [`DiskFilter`]s under one data directory
#[derive(Clone, Debug)]
pub struct DiskFilterFactory {
    data_dir: PathBuf,
}

impl DiskFilterFactory {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding the filter called `name`
    pub fn filter_dir(&self, name: &str) -> PathBuf {
        self.data_dir.join(format!("{}{}", FOLDER_PREFIX, name))
    }
}

impl FilterFactory for DiskFilterFactory {
    fn create(
        &self,
        config: &FilterConfig,
        name: &str,
        reopen_existing: bool,
    ) -> Result<Box<dyn FilterStore>, StorageError> {
        let filter = DiskFilter::open(self.filter_dir(name), config, reopen_existing)?;
        Ok(Box::new(filter))
    }
}

/// One filter persisted in its own directory
pub struct DiskFilter {
    dir: PathBuf,
    config: FilterConfig,
    params: FilterParams,
    /// `None` while unmapped
    bitmap: RwLock<Option<BloomFilter>>,
    dirty: AtomicBool,
    /// Serializes writers of `data.bin`
    flush_lock: Mutex<()>,
}

impl DiskFilter {
    /// Open the filter stored in `dir`
    ///
    /// With `reopen_existing`, whatever is already on disk is kept: a
    /// persisted `config.json` wins over `config`, and a persisted `data.bin`
    /// is loaded as is. Only missing files are written. Without it, any
    /// stale contents are replaced by an empty filter built from `config`.
    pub fn open(
        dir: PathBuf,
        config: &FilterConfig,
        reopen_existing: bool,
    ) -> Result<Self, StorageError> {
        if reopen_existing && !config.in_memory && dir.is_dir() {
            return Self::reopen(dir, config);
        }

        let mut filter = Self::unmapped(dir, config.clone());
        *filter.bitmap.get_mut() = Some(BloomFilter::from_params(filter.params));

        if config.in_memory {
            return Ok(filter);
        }

        if filter.dir.exists() {
            debug!(dir = %filter.dir.display(), "Replacing stale filter directory");
            fs::remove_dir_all(&filter.dir).map_err(|e| StorageError::io(&filter.dir, e))?;
        }
        fs::create_dir_all(&filter.dir).map_err(|e| StorageError::io(&filter.dir, e))?;
        let config_path = filter.dir.join(CONFIG_FILE);
        write_atomic(&config_path, &serde_json::to_vec_pretty(&filter.config)?)?;

        filter.dirty.store(true, Ordering::Release);
        filter.flush()?;
        Ok(filter)
    }

    fn reopen(dir: PathBuf, fallback: &FilterConfig) -> Result<Self, StorageError> {
        let config_path = dir.join(CONFIG_FILE);
        let persisted = read_config(&config_path)?;
        let config_missing = persisted.is_none();

        let mut filter = Self::unmapped(dir, persisted.unwrap_or_else(|| fallback.clone()));
        let data_missing = !filter.data_path().is_file();

        let bitmap = filter.load_bitmap()?;
        *filter.bitmap.get_mut() = Some(bitmap);

        if config_missing {
            debug!(dir = %filter.dir.display(), "Writing missing filter config");
            write_atomic(&config_path, &serde_json::to_vec_pretty(&filter.config)?)?;
        }
        if data_missing {
            filter.dirty.store(true, Ordering::Release);
            filter.flush()?;
        }

        debug!(dir = %filter.dir.display(), "Reopened existing filter");
        Ok(filter)
    }

    fn unmapped(dir: PathBuf, config: FilterConfig) -> Self {
        let params = config.params();
        Self {
            dir,
            config,
            params,
            bitmap: RwLock::new(None),
            dirty: AtomicBool::new(false),
            flush_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self) -> PathBuf {
        self.dir.join(DATA_FILE)
    }

    /// Read the bitmap from disk, or start empty if none was written yet
    fn load_bitmap(&self) -> Result<BloomFilter, StorageError> {
        let path = self.data_path();
        match fs::read(&path) {
            Ok(bytes) => BloomFilter::from_bytes(&bytes).map_err(|e| StorageError::Corrupt {
                path,
                reason: e.to_string(),
            }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Ok(BloomFilter::from_params(self.params))
            }
            Err(e) => Err(StorageError::io(path, e)),
        }
    }

    fn ensure_mapped(&mut self) -> Result<&mut BloomFilter, StorageError> {
        if self.bitmap.get_mut().is_none() {
            let bitmap = self.load_bitmap()?;
            debug!(dir = %self.dir.display(), "Faulted filter into memory");
            *self.bitmap.get_mut() = Some(bitmap);
        }
        let params = self.params;
        Ok(self
            .bitmap
            .get_mut()
            .get_or_insert_with(|| BloomFilter::from_params(params)))
    }
}

impl FilterStore for DiskFilter {
    fn add(&mut self, key: &[u8]) -> Result<bool, StorageError> {
        let added = self.ensure_mapped()?.insert(key);
        if added {
            self.dirty.store(true, Ordering::Release);
        }
        Ok(added)
    }

    fn contains(&self, key: &[u8]) -> Result<bool, StorageError> {
        {
            let guard = self.bitmap.read();
            if let Some(bitmap) = guard.as_ref() {
                return Ok(bitmap.contains(key));
            }
        }

        let mut guard = self.bitmap.write();
        if guard.is_none() {
            *guard = Some(self.load_bitmap()?);
            debug!(dir = %self.dir.display(), "Faulted filter into memory");
        }
        let guard = RwLockWriteGuard::downgrade(guard);
        Ok(guard.as_ref().is_some_and(|bitmap| bitmap.contains(key)))
    }

    fn flush(&self) -> Result<(), StorageError> {
        if self.config.in_memory {
            return Ok(());
        }

        let _flush = self.flush_lock.lock();
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(());
        }

        let guard = self.bitmap.read();
        let Some(bitmap) = guard.as_ref() else {
            return Ok(());
        };

        let result = bitmap
            .to_bytes()
            .map_err(StorageError::from)
            .and_then(|bytes| write_atomic(&self.data_path(), &bytes));
        if result.is_err() {
            self.dirty.store(true, Ordering::Release);
        }
        result
    }

    fn close(&mut self) -> Result<(), StorageError> {
        if self.config.in_memory {
            return Ok(());
        }

        self.flush()?;
        if self.bitmap.get_mut().take().is_some() {
            debug!(dir = %self.dir.display(), "Unmapped filter");
        }
        Ok(())
    }

    fn delete(&mut self) -> Result<(), StorageError> {
        *self.bitmap.get_mut() = None;
        self.dirty.store(false, Ordering::Release);

        if self.config.in_memory {
            return Ok(());
        }

        match fs::remove_dir_all(&self.dir) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::io(&self.dir, e)),
        }
    }

    fn info(&self) -> StoreInfo {
        let guard = self.bitmap.read();
        let (size_bits, hash_count) = match guard.as_ref() {
            Some(bitmap) => (bitmap.size_bits(), bitmap.hash_count()),
            None => (self.params.size_bits, self.params.hash_count),
        };

        StoreInfo {
            config: self.config.clone(),
            size_bits,
            hash_count,
            len: guard.as_ref().map(BloomFilter::len),
            mapped: guard.is_some(),
        }
    }
}

/// Read and validate a persisted `config.json`; `None` when absent
fn read_config(path: &Path) -> Result<Option<FilterConfig>, StorageError> {
    let raw = match fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    let corrupt = |reason: String| StorageError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };
    let config: FilterConfig =
        serde_json::from_slice(&raw).map_err(|e| corrupt(e.to_string()))?;
    config.validate().map_err(|e| corrupt(e.to_string()))?;
    Ok(Some(config))
}

/// Write `bytes` to `path` via a synced temp file and rename
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let temp_path = path.with_extension("tmp");

    let mut file = fs::File::create(&temp_path).map_err(|e| StorageError::io(&temp_path, e))?;
    file.write_all(bytes)
        .map_err(|e| StorageError::io(&temp_path, e))?;
    file.sync_all().map_err(|e| StorageError::io(&temp_path, e))?;

    fs::rename(&temp_path, path).map_err(|e| StorageError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn small_config() -> FilterConfig {
        FilterConfig {
            initial_capacity: 1000,
            false_positive_rate: 0.001,
            in_memory: false,
        }
    }

    #[test]
    fn test_create_writes_directory_layout() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());

        factory.create(&small_config(), "users", false).unwrap();

        let dir = temp_dir.path().join("bloomd.users");
        assert!(dir.join(CONFIG_FILE).is_file());
        assert!(dir.join(DATA_FILE).is_file());
        assert_eq!(factory.filter_dir("users"), dir);
    }

    #[test]
    fn test_add_and_contains() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let mut store = factory.create(&small_config(), "users", false).unwrap();

        assert!(store.add(b"alice").unwrap());
        assert!(!store.add(b"alice").unwrap());
        assert!(store.contains(b"alice").unwrap());
        assert!(!store.contains(b"bob").unwrap());
    }

    #[test]
    fn test_close_then_contains_faults_back_in() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let mut store = factory.create(&small_config(), "users", false).unwrap();

        store.add(b"alice").unwrap();
        store.close().unwrap();
        assert!(!store.info().mapped);

        assert!(store.contains(b"alice").unwrap());
        assert!(store.info().mapped);
    }

    #[test]
    fn test_reopen_uses_persisted_config_and_bits() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());

        let mut store = factory.create(&small_config(), "users", false).unwrap();
        store.add(b"alice").unwrap();
        store.close().unwrap();
        drop(store);

        let reopened = factory
            .create(&FilterConfig::default(), "users", true)
            .unwrap();
        assert_eq!(reopened.info().config, small_config());
        assert!(reopened.contains(b"alice").unwrap());
    }

    #[test]
    fn test_reopen_rejects_invalid_persisted_config() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let dir = factory.filter_dir("bad");
        fs::create_dir(&dir).unwrap();
        fs::write(
            dir.join(CONFIG_FILE),
            br#"{"initial_capacity":1000,"false_positive_rate":0.0}"#,
        )
        .unwrap();

        assert!(matches!(
            factory.create(&small_config(), "bad", true),
            Err(StorageError::Corrupt { .. })
        ));
        assert!(dir.join(CONFIG_FILE).is_file(), "Nothing on disk is removed");
    }

    #[test]
    fn test_reopen_keeps_bitmap_without_config() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let dir = factory.filter_dir("keep");
        fs::create_dir(&dir).unwrap();

        let mut bitmap = BloomFilter::from_params(small_config().params());
        bitmap.insert(b"alice");
        fs::write(dir.join(DATA_FILE), bitmap.to_bytes().unwrap()).unwrap();

        let store = factory.create(&small_config(), "keep", true).unwrap();

        assert!(store.contains(b"alice").unwrap());
        assert!(dir.join(CONFIG_FILE).is_file(), "Missing config is written");
        assert_eq!(
            fs::read(dir.join(DATA_FILE)).unwrap(),
            bitmap.to_bytes().unwrap()
        );
    }

    #[test]
    fn test_reopen_never_overwrites_unreadable_bitmap() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let dir = factory.filter_dir("keep");
        fs::create_dir(&dir).unwrap();
        fs::write(dir.join(DATA_FILE), b"precious").unwrap();

        assert!(matches!(
            factory.create(&small_config(), "keep", true),
            Err(StorageError::Corrupt { .. })
        ));
        assert_eq!(fs::read(dir.join(DATA_FILE)).unwrap(), b"precious");
    }

    #[test]
    fn test_reopen_of_empty_directory_starts_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let dir = factory.filter_dir("users");
        fs::create_dir(&dir).unwrap();

        let store = factory.create(&small_config(), "users", true).unwrap();

        assert!(!store.contains(b"alice").unwrap());
        assert!(dir.join(CONFIG_FILE).is_file());
        assert!(dir.join(DATA_FILE).is_file());
    }

    #[test]
    fn test_create_without_reopen_replaces_stale_data() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());

        let mut store = factory.create(&small_config(), "users", false).unwrap();
        store.add(b"alice").unwrap();
        store.flush().unwrap();
        drop(store);

        let fresh = factory.create(&small_config(), "users", false).unwrap();
        assert!(!fresh.contains(b"alice").unwrap());
    }

    #[test]
    fn test_delete_removes_directory() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let mut store = factory.create(&small_config(), "users", false).unwrap();

        store.delete().unwrap();
        assert!(!factory.filter_dir("users").exists());

        // Deleting twice is harmless
        store.delete().unwrap();
    }

    #[test]
    fn test_in_memory_filter_never_touches_disk() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let config = FilterConfig {
            in_memory: true,
            ..small_config()
        };

        let mut store = factory.create(&config, "scratch", false).unwrap();
        store.add(b"alice").unwrap();
        store.flush().unwrap();
        store.close().unwrap();

        assert!(store.contains(b"alice").unwrap());
        assert!(!factory.filter_dir("scratch").exists());
    }

    #[test]
    fn test_corrupt_bitmap_is_reported() {
        let temp_dir = TempDir::new().unwrap();
        let factory = DiskFilterFactory::new(temp_dir.path());
        let mut store = factory.create(&small_config(), "users", false).unwrap();
        store.close().unwrap();

        fs::write(factory.filter_dir("users").join(DATA_FILE), b"garbage").unwrap();

        assert!(matches!(
            store.contains(b"alice"),
            Err(StorageError::Corrupt { .. })
        ));
    }
}
