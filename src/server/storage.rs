//! # Storage Engine
//!
//! Thread-safe keyed records held in memory and mirrored to a JSON file.
//!
//! - Concurrent access through `Arc<RwLock<HashMap>>`
//! - Reads the file back with `memmap2` on startup
//! - Writes with `BufWriter` after every mutation, outside the lock
//!
//! Employee accounts and candidate profiles live here. OTPs do not: they are
//! process-local by design and sit in [`crate::server::otp::OtpStore`].

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::hash::Hash;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Clone)]
pub struct DataStore<K, V>
where
    K: Eq + Hash + Clone + Serialize + for<'de> Deserialize<'de>,
    V: Clone + Serialize + for<'de> Deserialize<'de>,
{
    data: Arc<RwLock<HashMap<K, V>>>,
    path: PathBuf,
}

impl<K, V> DataStore<K, V>
where
    K: Eq + Hash + Clone + Serialize + for<'de> Deserialize<'de>,
    V: Clone + Serialize + for<'de> Deserialize<'de>,
{
    /// Opens the store at `path`, loading whatever is already on disk.
    pub fn open(path: PathBuf) -> Result<Self> {
        let store = DataStore {
            data: Arc::new(RwLock::new(HashMap::new())),
            path,
        };

        if store.path.exists() {
            store.load_from_disk()?;
        }

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<K, V>>> {
        self.data
            .read()
            .map_err(|e| anyhow::anyhow!("Failed to acquire read lock: {}", e))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<K, V>>> {
        self.data
            .write()
            .map_err(|e| anyhow::anyhow!("Failed to acquire write lock: {}", e))
    }

    /// Insert or replace, returning the previous value.
    pub fn upsert(&self, key: K, value: V) -> Result<Option<V>> {
        let previous = self.write()?.insert(key, value);
        self.save_to_disk()?;
        Ok(previous)
    }

    /// Inserts only when `key` is vacant. Returns false if it was taken.
    pub fn insert_new(&self, key: K, value: V) -> Result<bool> {
        {
            let mut data = self.write()?;
            if data.contains_key(&key) {
                return Ok(false);
            }
            data.insert(key, value);
        }
        self.save_to_disk()?;
        Ok(true)
    }

    /// Applies `apply` to the value under `key` while holding the write lock.
    /// Returns the updated value, or `None` when the key is absent.
    pub fn update<F>(&self, key: &K, apply: F) -> Result<Option<V>>
    where
        F: FnOnce(&mut V),
    {
        let updated = {
            let mut data = self.write()?;
            match data.get_mut(key) {
                Some(value) => {
                    apply(value);
                    Some(value.clone())
                }
                None => None,
            }
        };

        if updated.is_some() {
            self.save_to_disk()?;
        }
        Ok(updated)
    }

    pub fn get(&self, key: &K) -> Result<Option<V>> {
        Ok(self.read()?.get(key).cloned())
    }

    pub fn contains_key(&self, key: &K) -> Result<bool> {
        Ok(self.read()?.contains_key(key))
    }

    pub fn entries(&self) -> Result<Vec<(K, V)>> {
        Ok(self
            .read()?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.is_empty())
    }

    /// Writes the full map as pretty JSON.
    pub fn save_to_disk(&self) -> Result<()> {
        let data = self.read()?;

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create parent directory")?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;

        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &*data)
            .context("Failed to serialize data to JSON")?;
        writer.flush().context("Failed to flush writer")?;

        Ok(())
    }

    fn load_from_disk(&self) -> Result<()> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {} for reading", self.path.display()))?;

        if file.metadata()?.len() == 0 {
            return Ok(());
        }

        // SAFETY: the file is owned by this process and only rewritten by
        // `save_to_disk`, which is not running while we are still opening.
        let mmap = unsafe { memmap2::Mmap::map(&file).context("Failed to create memory map")? };

        let loaded: HashMap<K, V> =
            serde_json::from_slice(&mmap).context("Failed to deserialize JSON data")?;

        *self.write()? = loaded;
        Ok(())
    }
}

#[cfg(test)]
fn temp_store_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("jobportal_{}_{}.json", name, std::process::id()))
}

#[test]
fn test_insert_new_rejects_duplicates() -> Result<()> {
    let path = temp_store_path("insert_new");
    let _ = std::fs::remove_file(&path);

    let store: DataStore<String, String> = DataStore::open(path.clone())?;

    assert!(store.insert_new("ann@x.com".to_string(), "Ann".to_string())?);
    assert!(!store.insert_new("ann@x.com".to_string(), "Impostor".to_string())?);
    assert_eq!(store.get(&"ann@x.com".to_string())?, Some("Ann".to_string()));
    assert_eq!(store.len()?, 1);

    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[test]
fn test_update_and_upsert() -> Result<()> {
    let path = temp_store_path("update");
    let _ = std::fs::remove_file(&path);

    let store: DataStore<String, u32> = DataStore::open(path.clone())?;

    assert_eq!(store.update(&"missing".to_string(), |v| *v += 1)?, None);

    assert_eq!(store.upsert("visits".to_string(), 1)?, None);
    assert_eq!(store.update(&"visits".to_string(), |v| *v += 1)?, Some(2));
    assert_eq!(store.upsert("visits".to_string(), 10)?, Some(2));
    assert!(store.contains_key(&"visits".to_string())?);

    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[test]
fn test_persistence_across_reopen() -> Result<()> {
    let path = temp_store_path("reopen");
    let _ = std::fs::remove_file(&path);

    {
        let store: DataStore<String, Vec<String>> = DataStore::open(path.clone())?;
        store.upsert(
            "skills".to_string(),
            vec!["rust".to_string(), "sql".to_string()],
        )?;
    }

    {
        let store: DataStore<String, Vec<String>> = DataStore::open(path.clone())?;
        assert_eq!(
            store.get(&"skills".to_string())?,
            Some(vec!["rust".to_string(), "sql".to_string()])
        );
        assert_eq!(store.entries()?.len(), 1);
    }

    let _ = std::fs::remove_file(&path);
    Ok(())
}

#[test]
fn test_concurrent_insert_new() -> Result<()> {
    use std::thread;

    let path = temp_store_path("concurrent");
    let _ = std::fs::remove_file(&path);

    let store: Arc<DataStore<u64, u64>> = Arc::new(DataStore::open(path.clone())?);
    let mut handles = vec![];

    // Every thread races for the same ten keys
    for t in 0..8u64 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            let mut won = 0;
            for key in 0..10u64 {
                if store.insert_new(key, t).unwrap_or(false) {
                    won += 1;
                }
            }
            won
        }));
    }

    let total: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
    assert_eq!(total, 10);
    assert_eq!(store.len()?, 10);

    let _ = std::fs::remove_file(&path);
    Ok(())
}
