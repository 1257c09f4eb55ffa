//! Cache generation storage.
//!
//! Entries are keyed by request identity and every write replaces the whole
//! entry, so racing writers can only ever leave one complete copy behind.

use super::Response;
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Storage for named cache generations
pub trait CacheStore: Send + Sync {
    /// Create the generation if it does not exist yet
    fn open(&self, name: &str) -> Result<()>;

    /// Names of every existing generation, sorted
    fn keys(&self) -> Result<Vec<String>>;

    /// Delete a generation; `false` if it did not exist
    fn delete(&self, name: &str) -> Result<bool>;

    /// Request keys stored in a generation, sorted
    fn entries(&self, name: &str) -> Result<Vec<String>>;

    fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>>;

    /// Store (or replace) an entry, creating the generation if needed
    fn put(&self, name: &str, key: &str, response: &Response) -> Result<()>;
}

impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    fn open(&self, name: &str) -> Result<()> {
        (**self).open(name)
    }

    fn keys(&self) -> Result<Vec<String>> {
        (**self).keys()
    }

    fn delete(&self, name: &str) -> Result<bool> {
        (**self).delete(name)
    }

    fn entries(&self, name: &str) -> Result<Vec<String>> {
        (**self).entries(name)
    }

    fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>> {
        (**self).match_in(name, key)
    }

    fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
        (**self).put(name, key, response)
    }
}

/// One stored response
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: String,
    pub stored_at: DateTime<Utc>,
    pub response: Response,
}

// ============================================================================
// In-memory store
// ============================================================================

type Generations = BTreeMap<String, BTreeMap<String, CachedEntry>>;

/// Mutex-guarded in-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    generations: Mutex<Generations>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Generations>> {
        self.generations
            .lock()
            .map_err(|_| Error::Cache("memory store lock poisoned".into()))
    }
}

impl CacheStore for MemoryStore {
    fn open(&self, name: &str) -> Result<()> {
        self.lock()?.entry(name.to_string()).or_default();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    fn delete(&self, name: &str) -> Result<bool> {
        Ok(self.lock()?.remove(name).is_some())
    }

    fn entries(&self, name: &str) -> Result<Vec<String>> {
        Ok(self
            .lock()?
            .get(name)
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default())
    }

    fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>> {
        Ok(self
            .lock()?
            .get(name)
            .and_then(|g| g.get(key))
            .map(|e| e.response.clone()))
    }

    fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
        let entry = CachedEntry {
            key: key.to_string(),
            stored_at: Utc::now(),
            response: response.clone(),
        };
        self.lock()?
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), entry);
        Ok(())
    }
}

// ============================================================================
// Directory store
// ============================================================================

const ENTRY_EXTENSION: &str = "json";

/// One directory per generation under `<root>/generations`, one JSON file
/// per entry
#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generations_dir(&self) -> PathBuf {
        self.root.join("generations")
    }

    fn generation_dir(&self, name: &str) -> Result<PathBuf> {
        check_generation_name(name)?;
        Ok(self.generations_dir().join(name))
    }

    fn entry_path(&self, name: &str, key: &str) -> Result<PathBuf> {
        Ok(self
            .generation_dir(name)?
            .join(format!("{}.{}", hex_encode(key), ENTRY_EXTENSION)))
    }
}

impl CacheStore for DirStore {
    fn open(&self, name: &str) -> Result<()> {
        std::fs::create_dir_all(self.generation_dir(name)?)?;
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let dir = self.generations_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn delete(&self, name: &str) -> Result<bool> {
        match std::fs::remove_dir_all(self.generation_dir(name)?) {
            Ok(()) => {
                tracing::debug!("Deleted cache generation {}", name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn entries(&self, name: &str) -> Result<Vec<String>> {
        let dir = self.generation_dir(name)?;
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != ENTRY_EXTENSION) {
                continue;
            }
            if let Some(key) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(hex_decode)
            {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }

    fn match_in(&self, name: &str, key: &str) -> Result<Option<Response>> {
        let path = self.entry_path(name, key)?;
        match read_json_locked::<CachedEntry>(&path)? {
            Some(entry) if entry.key == key => Ok(Some(entry.response)),
            Some(entry) => {
                tracing::warn!(
                    "Cache entry {:?} holds key {:?}, expected {:?}. Treating as miss.",
                    path,
                    entry.key,
                    key
                );
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn put(&self, name: &str, key: &str, response: &Response) -> Result<()> {
        let entry = CachedEntry {
            key: key.to_string(),
            stored_at: Utc::now(),
            response: response.clone(),
        };
        write_json_atomic(&self.entry_path(name, key)?, &entry)?;
        tracing::debug!("Stored {} in cache generation {}", key, name);
        Ok(())
    }
}

/// Generation names become file names; refuse anything that could escape
pub(crate) fn check_generation_name(name: &str) -> Result<()> {
    if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
        return Err(Error::Cache(format!("invalid generation name: {:?}", name)));
    }
    Ok(())
}

/// Read a JSON file under a shared lock
///
/// Returns `None` if the file is missing. A file that cannot be parsed is
/// logged and also reported as `None`.
pub(crate) fn read_json_locked<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    // Acquire shared lock for reading
    file.lock_shared()?;
    let mut contents = String::new();
    let read = std::io::BufReader::new(&file).read_to_string(&mut contents);
    file.unlock()?;
    read?;

    match serde_json::from_str::<T>(&contents) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            tracing::warn!("Failed to parse {:?}: {}. Ignoring it.", path, e);
            Ok(None)
        }
    }
}

/// Atomically replace `path` with the JSON form of `value`
///
/// 1. Write to a temp file in the same directory
/// 2. Sync to disk
/// 3. Rename over the original
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| Error::Cache(format!("{:?} has no parent directory", path)))?;
    std::fs::create_dir_all(parent)?;

    let temp = NamedTempFile::new_in(parent)?;

    // Acquire exclusive lock on the temp file to serialize concurrent writers
    temp.as_file().lock_exclusive()?;

    {
        let mut writer = std::io::BufWriter::new(temp.as_file());
        let contents = serde_json::to_string(value)?;
        writer.write_all(contents.as_bytes())?;
        writer.flush()?;
    }

    temp.as_file().sync_all()?;
    temp.as_file().unlock()?;

    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

fn hex_encode(s: &str) -> String {
    s.bytes().map(|b| format!("{:02x}", b)).collect()
}

fn hex_decode(s: &str) -> Option<String> {
    if s.len() % 2 != 0 || !s.is_ascii() {
        return None;
    }
    let bytes = (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}
