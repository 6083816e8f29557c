// src/cache.rs

//! Fingerprint marker cache
//!
//! The caching layer that sits above the executor: it remembers the
//! fingerprint of the last successful build per software unit, so a
//! frontend can skip calling `build()` entirely when nothing in the
//! recipe changed. The engine itself never reads this; it only supplies
//! the digest.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::Result;

/// Stores one `<name>.fpr` marker file per software unit
#[derive(Debug, Clone)]
pub struct FingerprintCache {
    dir: PathBuf,
}

impl FingerprintCache {
    /// Open (and create) a cache rooted at `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn marker_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.fpr", name))
    }

    /// The stored fingerprint for `name`, if any
    pub fn stored(&self, name: &str) -> Option<String> {
        let path = self.marker_path(name);
        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents.trim().to_string()),
            Err(_) => None,
        }
    }

    /// True if the stored fingerprint for `name` matches `digest`
    pub fn is_fresh(&self, name: &str, digest: &str) -> bool {
        match self.stored(name) {
            Some(stored) if stored == digest => {
                info!("{}: fingerprint match ({:.16}), build can be skipped", name, digest);
                true
            }
            Some(stored) => {
                debug!("{}: fingerprint changed ({:.16} -> {:.16})", name, stored, digest);
                false
            }
            None => {
                debug!("{}: no stored fingerprint", name);
                false
            }
        }
    }

    /// Record `digest` as the fingerprint of the last successful build
    pub fn record(&self, name: &str, digest: &str) -> Result<()> {
        fs::write(self.marker_path(name), format!("{}\n", digest))?;
        Ok(())
    }

    /// Forget the stored fingerprint for `name`
    pub fn invalidate(&self, name: &str) -> Result<()> {
        let path = self.marker_path(name);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Root directory of this cache
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
