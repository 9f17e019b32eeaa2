//! Credential Source - read-only adapters over externally managed records
//!
//! A source only reads. Each addressable unit under it is one tenant's
//! record, named by the tenant identifier. Malformed units are skipped and
//! reported in the snapshot; only an untraversable source fails the load.

use crate::{AuthzError, Result, SourceConfig};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Raw contents of a credential source
#[derive(Debug, Default)]
pub struct SourceSnapshot {
    /// Entry name to raw record bytes
    pub entries: HashMap<String, Vec<u8>>,
    /// Entries that were skipped while loading
    pub skipped: Vec<AuthzError>,
}

impl SourceSnapshot {
    /// Number of usable entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entry could be loaded
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn skip(&mut self, err: AuthzError) {
        warn!("Skipping credential entry: {}", err);
        self.skipped.push(err);
    }
}

/// Read-only credential source
pub trait CredentialSource: Send + Sync {
    /// Enumerate every entry exactly once
    fn load(&self) -> Result<SourceSnapshot>;
}

/// One file per tenant under a directory
///
/// Hidden names (Kubernetes `..data` projections and friends) and
/// sub-directories are ignored. Symlinks are followed.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
    strip_trailing_newline: bool,
}

impl DirectorySource {
    /// Create a source over `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            strip_trailing_newline: true,
        }
    }

    /// Create from configuration
    pub fn from_config(config: &SourceConfig) -> Self {
        Self::new(&config.directory).with_strip_trailing_newline(config.strip_trailing_newline)
    }

    /// Drop a single trailing `\n` or `\r\n` from records
    pub fn with_strip_trailing_newline(mut self, strip: bool) -> Self {
        self.strip_trailing_newline = strip;
        self
    }

    /// Root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn unreadable(&self, source: std::io::Error) -> AuthzError {
        AuthzError::SourceUnreadable {
            path: self.root.clone(),
            source,
        }
    }
}

impl CredentialSource for DirectorySource {
    fn load(&self) -> Result<SourceSnapshot> {
        let dir = fs::read_dir(&self.root).map_err(|e| self.unreadable(e))?;
        let mut snapshot = SourceSnapshot::default();

        for entry in dir {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    snapshot.skip(AuthzError::malformed(
                        self.root.display().to_string(),
                        format!("unreadable directory entry: {e}"),
                    ));
                    continue;
                }
            };

            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    snapshot.skip(AuthzError::malformed(
                        raw.to_string_lossy(),
                        "name is not UTF-8",
                    ));
                    continue;
                }
            };

            if name.starts_with('.') {
                debug!("Ignoring hidden entry {}", name);
                continue;
            }

            let path = entry.path();
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(e) => {
                    snapshot.skip(AuthzError::malformed(name, format!("stat failed: {e}")));
                    continue;
                }
            };
            if metadata.is_dir() {
                debug!("Ignoring sub-directory {}", name);
                continue;
            }

            match fs::read(&path) {
                Ok(mut raw) => {
                    if self.strip_trailing_newline {
                        strip_newline(&mut raw);
                    }
                    if raw.is_empty() {
                        snapshot.skip(AuthzError::malformed(name, "empty record"));
                        continue;
                    }
                    snapshot.entries.insert(name, raw);
                }
                Err(e) => {
                    snapshot.skip(AuthzError::malformed(name, format!("read failed: {e}")));
                }
            }
        }

        debug!(
            "Loaded {} credential entries from {} ({} skipped)",
            snapshot.len(),
            self.root.display(),
            snapshot.skipped.len()
        );
        Ok(snapshot)
    }
}

fn strip_newline(raw: &mut Vec<u8>) {
    if raw.last() == Some(&b'\n') {
        raw.pop();
        if raw.last() == Some(&b'\r') {
            raw.pop();
        }
    }
}

/// Fixed in-memory entries
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    entries: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    /// Create empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entry
    pub fn with_entry(mut self, name: impl Into<String>, record: impl Into<Vec<u8>>) -> Self {
        self.entries.insert(name.into(), record.into());
        self
    }
}

impl CredentialSource for MemorySource {
    fn load(&self) -> Result<SourceSnapshot> {
        Ok(SourceSnapshot {
            entries: self.entries.clone(),
            skipped: Vec::new(),
        })
    }
}
