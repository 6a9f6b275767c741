//! Logo cache: package-name-keyed PNG files on disk.
//!
//! Logos are fetched at most once and kept in a flat directory. Every
//! failure mode (network, disk, missing file) degrades to the placeholder;
//! a logo is never worth interrupting the caller for.

use std::fs;
use std::io;
use std::path::PathBuf;

use tracing::{debug, warn};

/// A resolved logo. The placeholder stands in for anything that could not
/// be loaded; rendering of either is the presentation layer's business.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Logo {
    Image(Vec<u8>),
    Placeholder,
}

pub struct LogoCache {
    dir: PathBuf,
}

impl LogoCache {
    pub fn new(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, pkg: &str) -> PathBuf {
        self.dir.join(format!("{pkg}.png"))
    }

    pub fn has(&self, pkg: &str) -> bool {
        self.path_for(pkg).exists()
    }

    /// Download and persist a logo, skipping packages already cached.
    /// Fails silently.
    pub fn fetch_and_store(&self, pkg: &str, url: &str) {
        if self.has(pkg) {
            return;
        }

        let body = reqwest::blocking::get(url)
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::bytes);
        match body {
            Ok(bytes) => {
                if let Err(e) = fs::write(self.path_for(pkg), &bytes) {
                    warn!(package = %pkg, error = %e, "failed to store logo");
                }
            }
            Err(e) => debug!(package = %pkg, error = %e, "logo download failed"),
        }
    }

    /// Load a cached logo, falling back to the placeholder on any failure.
    pub fn load(&self, pkg: &str) -> Logo {
        match fs::read(self.path_for(pkg)) {
            Ok(bytes) if !bytes.is_empty() => Logo::Image(bytes),
            _ => Logo::Placeholder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_logo_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LogoCache::new(dir.path().join("logos")).unwrap();

        assert!(!cache.has("gimp"));
        fs::write(cache.path_for("gimp"), b"png-bytes").unwrap();
        assert!(cache.has("gimp"));
        assert_eq!(cache.load("gimp"), Logo::Image(b"png-bytes".to_vec()));
    }

    #[test]
    fn missing_logo_loads_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LogoCache::new(dir.path()).unwrap();
        assert_eq!(cache.load("nothing-here"), Logo::Placeholder);
    }

    #[test]
    fn empty_file_loads_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let cache = LogoCache::new(dir.path()).unwrap();
        fs::write(cache.path_for("broken"), b"").unwrap();
        assert_eq!(cache.load("broken"), Logo::Placeholder);
    }
}
