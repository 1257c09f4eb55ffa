//! Install / activate / fetch protocol of the offline cache.
//!
//! ## Fetch rules (while controlling the page)
//!
//! 1. **Hit** in the current generation → cached copy, no network
//! 2. **Miss** → network; a GET answered with 200 is stored before returning
//! 3. **Network failure** → stale copy from any surviving older generation,
//!    otherwise the network error unchanged
//!
//! Before activation the cache does not control the page and every request
//! goes straight to the network.

use super::lifecycle::{Lifecycle, LifecycleRecord};
use super::{CacheName, CacheStore, Fetcher, Manifest, Request, Response};
use crate::{Error, Result};
use serde::Serialize;

/// What activation cleaned up
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActivationReport {
    pub current: String,
    /// Generations deleted because their name differs from `current`
    pub deleted: Vec<String>,
    /// Open pages were taken over without waiting for a reload
    pub claimed: bool,
}

/// One version of the offline cache
pub struct OfflineCache<S, F> {
    name: CacheName,
    manifest: Manifest,
    store: S,
    fetcher: F,
    state: Lifecycle,
    installed: bool,
    clients_claimed: bool,
}

impl<S: CacheStore, F: Fetcher> OfflineCache<S, F> {
    /// A fresh version, not yet installed
    pub fn new(name: CacheName, manifest: Manifest, store: S, fetcher: F) -> Self {
        Self {
            name,
            manifest,
            store,
            fetcher,
            state: Lifecycle::Installing,
            installed: false,
            clients_claimed: false,
        }
    }

    /// Pick up where a previous process left off
    ///
    /// A record for a different version means this version has not been
    /// installed yet.
    pub fn resume(
        name: CacheName,
        manifest: Manifest,
        store: S,
        fetcher: F,
        record: Option<&LifecycleRecord>,
    ) -> Self {
        let mut cache = Self::new(name, manifest, store, fetcher);
        if let Some(record) = record.filter(|r| r.cache_name == cache.name.to_string()) {
            cache.state = record.state;
            cache.installed = record.installed;
            cache.clients_claimed = record.state == Lifecycle::Active;
        }
        cache
    }

    pub fn name(&self) -> &CacheName {
        &self.name
    }

    pub fn state(&self) -> Lifecycle {
        self.state
    }

    pub fn is_installed(&self) -> bool {
        self.installed
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Snapshot suitable for persisting
    pub fn record(&self) -> LifecycleRecord {
        LifecycleRecord::new(self.name.to_string(), self.state, self.installed)
    }

    /// Pre-populate the current generation with every manifest asset
    ///
    /// All-or-nothing: every asset is fetched first, and if any fetch fails
    /// or is not a 200 nothing is stored.
    pub fn install(&mut self) -> Result<usize> {
        self.state = Lifecycle::Installing;
        let current = self.name.to_string();
        tracing::info!("Installing cache {}", current);

        let mut fetched = Vec::with_capacity(self.manifest.paths().len());
        for request in self.manifest.requests() {
            let response = self.fetcher.fetch(&request)?;
            if !response.is_ok() {
                return Err(Error::Cache(format!(
                    "install of {} failed: {} answered {}",
                    current, request.url, response.status
                )));
            }
            fetched.push((request.key(), response));
        }

        self.store.open(&current)?;
        for (key, response) in &fetched {
            self.store.put(&current, key, response)?;
        }

        self.installed = true;
        tracing::info!("Installed {} assets into {}", fetched.len(), current);
        Ok(fetched.len())
    }

    /// Delete every other generation and take control of open pages
    pub fn activate(&mut self) -> Result<ActivationReport> {
        if !self.installed {
            return Err(Error::Cache(format!(
                "cannot activate {} before it is installed",
                self.name
            )));
        }

        let current = self.name.to_string();
        let mut deleted = Vec::new();
        for key in self.store.keys()? {
            if key != current && self.store.delete(&key)? {
                tracing::info!("Deleted stale cache generation {}", key);
                deleted.push(key);
            }
        }

        self.state = Lifecycle::Active;
        self.clients_claimed = true;
        tracing::info!("Activated {}", current);

        Ok(ActivationReport {
            current,
            deleted,
            claimed: self.clients_claimed,
        })
    }

    /// A newer version took over; keep answering until released
    pub fn supersede(&mut self) {
        tracing::info!("Cache {} superseded", self.name);
        self.state = Lifecycle::Superseded;
    }

    /// Whether this version currently intercepts page requests
    pub fn controls_pages(&self) -> bool {
        self.clients_claimed && self.state != Lifecycle::Installing
    }

    /// Answer a request from the page
    pub fn fetch(&self, request: &Request) -> Result<Response> {
        if !self.controls_pages() {
            return self.fetcher.fetch(request);
        }

        let current = self.name.to_string();
        let key = request.key();

        if request.method.is_get() {
            if let Some(hit) = self.store.match_in(&current, &key)? {
                tracing::debug!("Cache hit for {} in {}", key, current);
                return Ok(hit);
            }
        }

        match self.fetcher.fetch(request) {
            Ok(response) => {
                if request.method.is_get() && response.is_ok() {
                    if let Err(e) = self.store.put(&current, &key, &response) {
                        tracing::warn!("Failed to cache {}: {}", key, e);
                    }
                }
                Ok(response)
            }
            Err(network_error) => {
                if request.method.is_get() {
                    match self.stale_copy(&current, &key) {
                        Ok(Some(stale)) => return Ok(stale),
                        Ok(None) => {}
                        // The caller sees the fetch failure, not the lookup one.
                        Err(e) => tracing::warn!("Stale lookup for {} failed: {}", key, e),
                    }
                }
                tracing::warn!("Fetch of {} failed with no cached copy", key);
                Err(network_error)
            }
        }
    }

    fn stale_copy(&self, current: &str, key: &str) -> Result<Option<Response>> {
        for generation in self.store.keys()? {
            if generation == current {
                continue;
            }
            if let Some(stale) = self.store.match_in(&generation, key)? {
                tracing::info!("Network failed, serving {} from {}", key, generation);
                return Ok(Some(stale));
            }
        }
        Ok(None)
    }
}
