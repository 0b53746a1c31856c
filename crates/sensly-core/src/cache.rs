// ── Auth cache ──
//
// Durable image of the last successful authentication, so a restart
// within the freshness window skips the credential exchange. Every
// failure here is logged and swallowed: a missing or broken cache only
// costs one extra login.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::model::Monitor;

/// File name of the cache record inside the storage directory.
pub const CACHE_FILE: &str = "sense_auth.json";

/// The persisted record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAuth {
    pub access_token: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub monitor_id: Option<String>,
    /// Epoch milliseconds on disk.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_auth_time: DateTime<Utc>,
    #[serde(default)]
    pub monitors: Vec<Monitor>,
}

/// Reads and writes the cache record under one directory.
#[derive(Debug, Clone)]
pub struct AuthCache {
    path: PathBuf,
}

impl AuthCache {
    /// A cache in `dir`, or `None` when caching is disabled.
    pub fn new(dir: Option<&Path>) -> Option<Self> {
        dir.map(|d| Self {
            path: d.join(CACHE_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the record. Absent, unreadable, and malformed all yield `None`.
    pub fn load(&self) -> Option<CachedAuth> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no cached auth");
                return None;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "failed to read auth cache");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(record) => {
                debug!(path = %self.path.display(), "loaded cached auth");
                Some(record)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring malformed auth cache");
                None
            }
        }
    }

    /// Persist the record, replacing the previous one atomically.
    pub fn save(&self, record: &CachedAuth) {
        match self.write(record) {
            Ok(()) => debug!(path = %self.path.display(), "saved auth cache"),
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to save auth cache"),
        }
    }

    /// Write to a sibling temp file, sync, then rename over the target so
    /// a crash mid-write leaves the old record intact.
    fn write(&self, record: &CachedAuth) -> io::Result<()> {
        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let json = serde_json::to_vec_pretty(record)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&json)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}
