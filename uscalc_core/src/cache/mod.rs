//! Offline asset cache.
//!
//! Keeps a versioned copy of the page's static assets so it can be reloaded
//! without network access. One generation (named `"{prefix}-{version}"`) is
//! current at a time; activation deletes every other generation.
//!
//! - [`store`]: where generations and their entries live
//! - [`origin`]: the network side, i.e. where assets are fetched from
//! - [`lifecycle`]: persisted lifecycle record for on-disk hosts
//! - [`worker`]: the install / activate / fetch protocol

pub mod lifecycle;
pub mod origin;
pub mod store;
pub mod worker;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use lifecycle::{Lifecycle, LifecycleRecord};
pub use origin::{Fetcher, OriginDir};
pub use store::{CacheStore, DirStore, MemoryStore};
pub use worker::{ActivationReport, OfflineCache};

pub const DEFAULT_PREFIX: &str = "us-calc-pwa";
pub const DEFAULT_VERSION: &str = "v2";

/// Core assets pre-populated on install: the page shell, its web manifest
/// and its script bundle
pub static DEFAULT_MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    Manifest::new(vec![
        "./".into(),
        "./index.html".into(),
        "./manifest.webmanifest".into(),
        "./app.min.js".into(),
    ])
});

/// Name of one cache generation
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheName {
    pub prefix: String,
    pub version: String,
}

impl CacheName {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            version: version.into(),
        }
    }
}

impl Default for CacheName {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_VERSION)
    }
}

impl fmt::Display for CacheName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.prefix, self.version)
    }
}

/// Ordered list of relative asset paths
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest(Vec<String>);

impl Manifest {
    pub fn new(paths: Vec<String>) -> Self {
        Self(paths)
    }

    pub fn paths(&self) -> &[String] {
        &self.0
    }

    pub fn requests(&self) -> impl Iterator<Item = Request> + '_ {
        self.0.iter().map(|p| Request::get(p.as_str()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Read-only retrievals are the only requests worth caching
    pub fn is_get(self) -> bool {
        self == Method::Get
    }
}

impl std::str::FromStr for Method {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "HEAD" => Ok(Method::Head),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "DELETE" => Ok(Method::Delete),
            other => Err(crate::Error::Other(format!("unsupported method: {}", other))),
        }
    }
}

/// A resource request from the page
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub method: Method,
    pub url: String,
}

impl Request {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Cache identity of this request
    pub fn key(&self) -> String {
        normalize_path(&self.url)
    }
}

/// Reduce a URL to an absolute path: `./x` and `x` become `/x`, and any
/// scheme and host are dropped
pub fn normalize_path(url: &str) -> String {
    let url = url.trim();
    let without_origin = match url.find("://") {
        Some(i) => {
            let rest = &url[i + 3..];
            rest.find('/').map(|j| &rest[j..]).unwrap_or("/")
        }
        None => url,
    };
    let path = without_origin
        .strip_prefix("./")
        .or_else(|| without_origin.strip_prefix('.').filter(|r| r.is_empty()))
        .unwrap_or(without_origin);
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}

/// A response, either from the network or from a cache generation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }

    pub fn ok(content_type: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
        Self::new(200, Some(content_type.into()), body.into())
    }

    pub fn not_found() -> Self {
        Self::new(404, None, Vec::new())
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}
