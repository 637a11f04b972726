use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;

use anyhow::{Context, Result};

use super::loader::LoadSpec;

struct Entry<T> {
    modified: SystemTime,
    value: Arc<T>,
}

/// In-memory store of loaded sources, keyed by their [`LoadSpec`].
///
/// An entry is reused until the source file's modification time changes,
/// or until it is dropped with [`DataStore::invalidate`] / [`DataStore::clear`].
/// Stored values are shared read-only.
pub struct DataStore<T> {
    entries: HashMap<LoadSpec, Entry<T>>,
}

impl<T> Default for DataStore<T> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<T> DataStore<T> {
    /// Return the stored value for `spec`, loading it with `load` on first
    /// use or when the file changed on disk.
    pub fn get_or_load<F>(&mut self, spec: &LoadSpec, load: F) -> Result<Arc<T>>
    where
        F: FnOnce(&LoadSpec) -> Result<T>,
    {
        let modified = modified_time(&spec.path)?;
        if let Some(entry) = self.entries.get(spec) {
            if entry.modified == modified {
                return Ok(Arc::clone(&entry.value));
            }
            log::info!("{} changed on disk, reloading", spec.path.display());
        }

        let value = Arc::new(load(spec)?);
        self.entries.insert(
            spec.clone(),
            Entry {
                modified,
                value: Arc::clone(&value),
            },
        );
        Ok(value)
    }

    /// Drop every entry loaded from `path`.
    pub fn invalidate(&mut self, path: &Path) {
        self.entries.retain(|spec, _| spec.path != path);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn modified_time(path: &Path) -> Result<SystemTime> {
    std::fs::metadata(path)
        .and_then(|m| m.modified())
        .with_context(|| format!("reading metadata of {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::time::Duration;

    fn spec_for(dir: &tempfile::TempDir, name: &str) -> LoadSpec {
        let path = dir.path().join(name);
        std::fs::write(&path, "a\n1\n").unwrap();
        LoadSpec::new(path)
    }

    #[test]
    fn test_loads_once_and_shares() {
        let dir = tempfile::tempdir().unwrap();
        let spec = spec_for(&dir, "a.csv");
        let calls = Cell::new(0);
        let mut store: DataStore<u32> = DataStore::default();

        let load = |_: &LoadSpec| {
            calls.set(calls.get() + 1);
            Ok(7)
        };
        let first = store.get_or_load(&spec, load).unwrap();
        let second = store.get_or_load(&spec, load).unwrap();

        assert_eq!(calls.get(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_reloads_after_invalidate_and_mtime_change() {
        let dir = tempfile::tempdir().unwrap();
        let spec = spec_for(&dir, "a.csv");
        let calls = Cell::new(0);
        let mut store: DataStore<u32> = DataStore::default();
        let load = |_: &LoadSpec| {
            calls.set(calls.get() + 1);
            Ok(calls.get())
        };

        store.get_or_load(&spec, load).unwrap();
        store.invalidate(&spec.path);
        assert!(store.is_empty());
        assert_eq!(*store.get_or_load(&spec, load).unwrap(), 2);

        let file = std::fs::File::options().write(true).open(&spec.path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
        assert_eq!(*store.get_or_load(&spec, load).unwrap(), 3);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_missing_file_and_failed_load_are_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut store: DataStore<u32> = DataStore::default();
        let missing = LoadSpec::new(dir.path().join("missing.csv"));
        assert!(store.get_or_load(&missing, |_| Ok(1)).is_err());

        let spec = spec_for(&dir, "a.csv");
        assert!(store
            .get_or_load(&spec, |_| anyhow::bail!("bad schema"))
            .is_err());
        assert!(store.is_empty());
    }
}
