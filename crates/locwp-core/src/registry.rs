//! Durable site registry: one `config.json` per site directory.
//!
//! The registry has no index file; the set of site directories under
//! `<base>/sites` *is* the registry. Enumeration is lazy and per-entry
//! fallible so one corrupt record never hides the others.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::layout::{Layout, RECORD_FILE};
use crate::model::{Identity, SiteName, SiteRecord};

// ── Single-record IO ────────────────────────────────────────────────

/// Write `record` to `<dir>/config.json`.
///
/// The document is written to a sibling temp file and renamed into
/// place, so readers never observe a half-written record.
pub fn save(dir: &Path, record: &SiteRecord) -> Result<(), CoreError> {
    let path = dir.join(RECORD_FILE);
    let tmp = dir.join(format!("{RECORD_FILE}.tmp"));
    let data = serde_json::to_vec_pretty(record).map_err(|source| CoreError::Encode {
        what: format!("site record '{}'", record.name),
        source,
    })?;
    fs::write(&tmp, data).map_err(|e| CoreError::io("write", &tmp, e))?;
    fs::rename(&tmp, &path).map_err(|e| CoreError::io("rename", &path, e))
}

/// Read the record in `dir`.
pub fn load(dir: &Path) -> Result<SiteRecord, CoreError> {
    let path = dir.join(RECORD_FILE);
    let data = fs::read(&path).map_err(|e| CoreError::io("read", &path, e))?;
    serde_json::from_slice(&data).map_err(|e| CoreError::PartialRead {
        path,
        reason: e.to_string(),
    })
}

// ── Registry ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Registry {
    layout: Layout,
}

impl Registry {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Persist a new record, creating the site's directory tree first.
    ///
    /// Directories are created before the record is written: a crash in
    /// between leaves an empty site directory, which `create` rejects and
    /// `remove` cleans up, never a record pointing at missing directories.
    pub fn create(&self, record: &SiteRecord) -> Result<(), CoreError> {
        let site_dir = self.layout.site_dir(&record.name);
        if record.site_dir != site_dir || !record.wp_root.starts_with(&site_dir) {
            return Err(CoreError::Validation {
                field: "site_dir".into(),
                reason: format!(
                    "site files must live under {}",
                    self.layout.sites_dir().display()
                ),
            });
        }
        if site_dir.exists() {
            return Err(CoreError::AlreadyExists {
                name: record.name.to_string(),
            });
        }

        for dir in [record.wp_root.clone(), self.layout.logs_dir(&record.name)] {
            fs::create_dir_all(&dir).map_err(|e| CoreError::io("create directory", &dir, e))?;
        }
        save(&site_dir, record)?;
        debug!(site = %record.name, path = %site_dir.display(), "site record created");
        Ok(())
    }

    pub fn load_by_name(&self, name: &SiteName) -> Result<SiteRecord, CoreError> {
        let dir = self.layout.site_dir(name);
        if !dir.join(RECORD_FILE).is_file() {
            return Err(CoreError::NotFound {
                name: name.to_string(),
            });
        }
        load(&dir)
    }

    /// Enumerate every site directory, sorted by name.
    ///
    /// Only listing `<base>/sites` itself can fail; each entry carries
    /// its own load result.
    pub fn load_all(&self) -> Result<Entries, CoreError> {
        let sites_dir = self.layout.sites_dir();
        let read = match fs::read_dir(&sites_dir) {
            Ok(read) => read,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::default()),
            Err(e) => return Err(CoreError::io("read directory", &sites_dir, e)),
        };

        let mut dirs: Vec<(String, PathBuf)> = read
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir()))
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                (!name.starts_with('.')).then(|| (name, entry.path()))
            })
            .collect();
        dirs.sort_by(|a, b| a.0.cmp(&b.0));

        Ok(Entries {
            dirs: dirs.into_iter(),
        })
    }

    /// Every record that loads cleanly. Unreadable entries are logged and skipped.
    pub fn records(&self) -> Result<Vec<SiteRecord>, CoreError> {
        Ok(self
            .load_all()?
            .filter_map(|entry| match entry.record {
                Ok(record) => Some(record),
                Err(err) => {
                    warn!(site = %entry.dir_name, error = %err, "skipping unreadable site record");
                    None
                }
            })
            .collect())
    }

    pub fn exists(&self, name: &SiteName) -> bool {
        self.layout.site_dir(name).exists()
    }

    pub fn identity_in_use(&self, identity: &Identity) -> Result<bool, CoreError> {
        Ok(self.records()?.iter().any(|r| &r.identity == identity))
    }

    pub fn domain_in_use(&self, domain: &str) -> Result<bool, CoreError> {
        Ok(self
            .records()?
            .iter()
            .any(|r| r.identity.domain() == Some(domain)))
    }

    /// Delete the site directory and everything in it. Absent is fine.
    pub fn remove(&self, name: &SiteName) -> Result<(), CoreError> {
        let dir = self.layout.site_dir(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                debug!(site = %name, "site directory removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CoreError::io("remove", &dir, e)),
        }
    }
}

// ── Enumeration ─────────────────────────────────────────────────────

/// One row of a registry listing.
#[derive(Debug)]
pub struct Entry {
    /// Directory name under `<base>/sites`.
    pub dir_name: String,
    pub record: Result<SiteRecord, CoreError>,
}

/// Lazy iterator over site directories; records are read on `next`.
#[derive(Debug, Default)]
pub struct Entries {
    dirs: std::vec::IntoIter<(String, PathBuf)>,
}

impl Iterator for Entries {
    type Item = Entry;

    fn next(&mut self) -> Option<Entry> {
        let (dir_name, path) = self.dirs.next()?;
        let record = load(&path).and_then(|record| {
            if record.name.as_str() == dir_name {
                Ok(record)
            } else {
                Err(CoreError::PartialRead {
                    path: path.join(RECORD_FILE),
                    reason: format!(
                        "record is named '{}' but lives in '{dir_name}'",
                        record.name
                    ),
                })
            }
        });
        Some(Entry { dir_name, record })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.dirs.size_hint()
    }
}

// ── Advisory lock ───────────────────────────────────────────────────

/// Exclusive advisory lock on the registry, held for the duration of
/// read-then-write sequences (allocate + persist, remove).
///
/// Acquired by exclusively creating `<base>/sites/.lock`; released when
/// dropped. A lock left behind by a crashed process must be removed by
/// hand, and the error names the file.
#[derive(Debug)]
pub struct RegistryLock {
    path: PathBuf,
}

impl RegistryLock {
    pub fn acquire(layout: &Layout) -> Result<Self, CoreError> {
        let sites_dir = layout.sites_dir();
        fs::create_dir_all(&sites_dir)
            .map_err(|e| CoreError::io("create directory", &sites_dir, e))?;

        let path = layout.lock_path();
        match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                use std::io::Write;
                // Best effort: the PID only helps a human clear a stale lock.
                let _ = writeln!(file, "{}", std::process::id());
                debug!(path = %path.display(), "registry lock acquired");
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(CoreError::Locked { path }),
            Err(e) => Err(CoreError::io("create lock", &path, e)),
        }
    }
}

impl Drop for RegistryLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release registry lock");
        }
    }
}
