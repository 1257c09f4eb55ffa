//! The network side of the offline cache.

use super::{Method, Request, Response};
use crate::{Error, Result};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Performs a network fetch for a request
///
/// `Err` means the network could not be reached at all. A reachable origin
/// that has no such resource answers with a non-200 response instead.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: &Request) -> Result<Response>;
}

impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    fn fetch(&self, request: &Request) -> Result<Response> {
        (**self).fetch(request)
    }
}

/// Serves a deployed page from a directory
///
/// `/` maps to `index.html`. If the directory itself is gone the origin is
/// considered unreachable.
#[derive(Debug, Clone)]
pub struct OriginDir {
    root: PathBuf,
}

impl OriginDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, key: &str) -> Option<PathBuf> {
        let path = key.split(['?', '#']).next().unwrap_or("");
        let mut relative = PathBuf::from(path.trim_start_matches('/'));
        if path.ends_with('/') || relative.as_os_str().is_empty() {
            relative.push("index.html");
        }
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") | Some("htm") => "text/html; charset=utf-8",
        Some("js") => "text/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("json") => "application/json",
        Some("webmanifest") => "application/manifest+json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}

impl Fetcher for OriginDir {
    fn fetch(&self, request: &Request) -> Result<Response> {
        if !self.root.is_dir() {
            return Err(Error::Network(format!(
                "origin {:?} is unreachable",
                self.root
            )));
        }

        if !matches!(request.method, Method::Get | Method::Head) {
            return Ok(Response::new(405, None, Vec::new()));
        }

        let path = match self.resolve(&request.key()) {
            Some(path) => path,
            None => {
                tracing::debug!("Refusing to serve {:?}", request.url);
                return Ok(Response::not_found());
            }
        };

        if path.is_dir() {
            return Ok(Response::not_found());
        }

        match std::fs::read(&path) {
            Ok(body) => {
                let body = if request.method == Method::Head {
                    Vec::new()
                } else {
                    body
                };
                tracing::debug!("Fetched {} from origin", request.url);
                Ok(Response::ok(content_type_for(&path), body))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Response::not_found()),
            Err(e) => Err(Error::Network(format!("{}: {}", path.display(), e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<html>calc</html>").unwrap();
        std::fs::write(dir.path().join("app.min.js"), "updateAll();").unwrap();
        dir
    }

    #[test]
    fn test_root_serves_index() {
        let dir = site();
        let origin = OriginDir::new(dir.path());
        let resp = origin.fetch(&Request::get("./")).unwrap();
        assert!(resp.is_ok());
        assert_eq!(resp.body, b"<html>calc</html>");
        assert_eq!(resp.content_type.as_deref(), Some("text/html; charset=utf-8"));
    }

    #[test]
    fn test_missing_file_is_404() {
        let dir = site();
        let origin = OriginDir::new(dir.path());
        let resp = origin.fetch(&Request::get("./icon-192.png")).unwrap();
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_traversal_is_refused() {
        let dir = site();
        let origin = OriginDir::new(dir.path().join("."));
        let resp = origin.fetch(&Request::get("/../secret")).unwrap();
        assert_eq!(resp.status, 404);
    }

    #[test]
    fn test_unreachable_origin_is_network_error() {
        let dir = site();
        let origin = OriginDir::new(dir.path().join("missing"));
        assert!(matches!(
            origin.fetch(&Request::get("/")),
            Err(Error::Network(_))
        ));
    }

    #[test]
    fn test_non_read_methods_are_rejected() {
        let dir = site();
        let origin = OriginDir::new(dir.path());
        let resp = origin
            .fetch(&Request::new(Method::Post, "/index.html"))
            .unwrap();
        assert_eq!(resp.status, 405);
    }
}
