// ── Core error types ──
//
// Everything the lifecycle layer can report. Consumers never see raw
// `std::io::Error`s without the path that produced them; the CLI maps
// each variant to a diagnostic and an exit code.

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Validation ───────────────────────────────────────────────────
    #[error("invalid site name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    // ── Collisions ───────────────────────────────────────────────────
    #[error("site '{name}' already exists")]
    AlreadyExists { name: String },

    #[error("domain '{domain}' is already in use")]
    DomainInUse { domain: String },

    #[error("no available port in range {start}-{end}")]
    NoIdentityAvailable { start: u16, end: u16 },

    #[error("registry is locked by another locwp process ({})", path.display())]
    Locked { path: PathBuf },

    // ── Lookup ───────────────────────────────────────────────────────
    #[error("site '{name}' not found")]
    NotFound { name: String },

    #[error("vhost config not found for site '{name}'")]
    VhostNotFound { name: String },

    // ── Registry reads ───────────────────────────────────────────────
    #[error("unreadable site record at {}: {reason}", path.display())]
    PartialRead { path: PathBuf, reason: String },

    // ── External processes ───────────────────────────────────────────
    #[error("`{program}` failed: {detail}")]
    ExternalTool { program: String, detail: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode {what}: {source}")]
    Encode {
        what: String,
        #[source]
        source: serde_json::Error,
    },
}

impl CoreError {
    /// Wrap an IO error with the operation and path that produced it.
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
