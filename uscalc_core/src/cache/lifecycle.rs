//! Lifecycle state of the offline cache.
//!
//! Hosts that outlive a single process (the on-disk cache driven by the
//! CLI) persist one [`LifecycleRecord`] per version under
//! `<root>/lifecycle/`. A new version can sit installed and waiting while
//! the previous one stays active; each invocation resumes from its own
//! version's record.

use super::store::{check_generation_name, read_json_locked, write_json_atomic};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

const RECORDS_DIR: &str = "lifecycle";
const RECORD_EXTENSION: &str = "json";

/// Installing → Active → Superseded
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lifecycle {
    Installing,
    Active,
    Superseded,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Lifecycle::Installing => "installing",
            Lifecycle::Active => "active",
            Lifecycle::Superseded => "superseded",
        };
        f.write_str(s)
    }
}

/// Persisted lifecycle of one cache version
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleRecord {
    /// Rendered generation name, e.g. `us-calc-pwa-v2`
    pub cache_name: String,
    pub state: Lifecycle,
    /// Whether the install step pre-populated the generation
    pub installed: bool,
    pub updated_at: DateTime<Utc>,
}

impl LifecycleRecord {
    pub fn new(cache_name: impl Into<String>, state: Lifecycle, installed: bool) -> Self {
        Self {
            cache_name: cache_name.into(),
            state,
            installed,
            updated_at: Utc::now(),
        }
    }

    /// Location of `cache_name`'s record under a cache root
    pub fn path_in(root: &Path, cache_name: &str) -> Result<PathBuf> {
        check_generation_name(cache_name)?;
        Ok(root
            .join(RECORDS_DIR)
            .join(format!("{}.{}", cache_name, RECORD_EXTENSION)))
    }

    /// Load the record; `None` if it is missing or unreadable
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let record = read_json_locked::<Self>(path)?;
        match &record {
            Some(r) => tracing::debug!("Loaded lifecycle {} ({})", r.cache_name, r.state),
            None => tracing::info!("No usable lifecycle record at {:?}", path),
        }
        Ok(record)
    }

    /// Every readable record under a cache root, sorted by name
    pub fn load_all(root: &Path) -> Result<Vec<Self>> {
        let dir = root.join(RECORDS_DIR);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().map_or(true, |ext| ext != RECORD_EXTENSION) {
                continue;
            }
            if let Some(record) = read_json_locked::<Self>(&path)? {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.cache_name.cmp(&b.cache_name));
        Ok(records)
    }

    /// Atomically write the record
    pub fn save(&self, path: &Path) -> Result<()> {
        write_json_atomic(path, self)?;
        tracing::debug!("Saved lifecycle {} ({}) to {:?}", self.cache_name, self.state, path);
        Ok(())
    }

    /// Forget `cache_name`'s record; `false` if there was none
    pub fn remove(root: &Path, cache_name: &str) -> Result<bool> {
        match std::fs::remove_file(Self::path_in(root, cache_name)?) {
            Ok(()) => {
                tracing::debug!("Removed lifecycle record for {}", cache_name);
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_and_load_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = LifecycleRecord::path_in(temp_dir.path(), "us-calc-pwa-v2").unwrap();

        let record = LifecycleRecord::new("us-calc-pwa-v2", Lifecycle::Active, true);
        record.save(&path).unwrap();

        let loaded = LifecycleRecord::load(&path).unwrap().unwrap();
        assert_eq!(loaded, record);
    }

    #[test]
    fn test_load_nonexistent_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = LifecycleRecord::path_in(temp_dir.path(), "us-calc-pwa-v2").unwrap();
        assert!(LifecycleRecord::load(&path).unwrap().is_none());
    }

    #[test]
    fn test_corrupted_record_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = LifecycleRecord::path_in(temp_dir.path(), "us-calc-pwa-v2").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ invalid json }").unwrap();

        assert!(LifecycleRecord::load(&path).unwrap().is_none());
        assert!(LifecycleRecord::load_all(temp_dir.path()).unwrap().is_empty());
    }

    #[test]
    fn test_waiting_version_keeps_active_record() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path();

        let active = LifecycleRecord::new("us-calc-pwa-v2", Lifecycle::Active, true);
        active
            .save(&LifecycleRecord::path_in(root, "us-calc-pwa-v2").unwrap())
            .unwrap();
        let waiting = LifecycleRecord::new("us-calc-pwa-v3", Lifecycle::Installing, true);
        waiting
            .save(&LifecycleRecord::path_in(root, "us-calc-pwa-v3").unwrap())
            .unwrap();

        let v2 = LifecycleRecord::load(&LifecycleRecord::path_in(root, "us-calc-pwa-v2").unwrap())
            .unwrap()
            .unwrap();
        assert_eq!(v2.state, Lifecycle::Active);
        assert_eq!(LifecycleRecord::load_all(root).unwrap(), vec![active, waiting]);

        assert!(LifecycleRecord::remove(root, "us-calc-pwa-v2").unwrap());
        assert!(!LifecycleRecord::remove(root, "us-calc-pwa-v2").unwrap());
        assert_eq!(LifecycleRecord::load_all(root).unwrap().len(), 1);
    }

    #[test]
    fn test_rejects_unsafe_names() {
        let temp_dir = tempfile::tempdir().unwrap();
        assert!(LifecycleRecord::path_in(temp_dir.path(), "../escape").is_err());
    }
}
