//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text and a process exit code.

use miette::Diagnostic;
use thiserror::Error;

use locwp_config::ConfigError;
use locwp_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const EXTERNAL: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid site name '{name}': {reason}")]
    #[diagnostic(
        code(locwp::invalid_name),
        help("Use lowercase letters, digits and hyphens, e.g. `my-blog`.")
    )]
    InvalidName { name: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(locwp::validation))]
    Validation { field: String, reason: String },

    // ── Lookup ───────────────────────────────────────────────────────
    #[error("Site '{name}' not found")]
    #[diagnostic(code(locwp::not_found), help("Run: locwp list"))]
    NotFound { name: String },

    #[error("Site '{name}' has no vhost config")]
    #[diagnostic(
        code(locwp::vhost_missing),
        help("The site was never fully created. Recreate it: locwp delete {name} && locwp add {name}")
    )]
    VhostMissing { name: String },

    // ── Conflicts ────────────────────────────────────────────────────
    #[error("Site '{name}' already exists")]
    #[diagnostic(code(locwp::conflict), help("Pick another name or run: locwp delete {name}"))]
    AlreadyExists { name: String },

    #[error("Domain '{domain}' is already used by another site")]
    #[diagnostic(code(locwp::conflict))]
    DomainInUse { domain: String },

    #[error("No free port between {start} and {end}")]
    #[diagnostic(
        code(locwp::ports_exhausted),
        help("Delete unused sites or widen port_start / port_end in config.toml.")
    )]
    PortsExhausted { start: u16, end: u16 },

    #[error("Another locwp command is modifying sites")]
    #[diagnostic(
        code(locwp::locked),
        help("If no other locwp is running, remove the stale lock: {path}")
    )]
    Locked { path: String },

    #[error("Config file already exists at {path}")]
    #[diagnostic(code(locwp::conflict), help("Use --force to overwrite it."))]
    ConfigExists { path: String },

    // ── External tools ───────────────────────────────────────────────
    #[error("`{program}` failed: {detail}")]
    #[diagnostic(
        code(locwp::external_tool),
        help("Check that `{program}` is installed and on PATH; re-run with -v for details.")
    )]
    ExternalTool { program: String, detail: String },

    // ── Records ──────────────────────────────────────────────────────
    #[error("Unreadable site record at {path}")]
    #[diagnostic(code(locwp::corrupt_record), help("{reason}"))]
    CorruptRecord { path: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Cannot locate a home directory")]
    #[diagnostic(code(locwp::no_home), help("Set LOCWP_HOME to the directory locwp should use."))]
    NoHome,

    #[error(transparent)]
    #[diagnostic(code(locwp::config))]
    Config(ConfigError),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(locwp::io))]
    Core(CoreError),

    #[error("Failed to render output: {reason}")]
    #[diagnostic(code(locwp::render))]
    Render { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InvalidName { .. } | Self::Validation { .. } => exit_code::USAGE,
            Self::NotFound { .. } | Self::VhostMissing { .. } => exit_code::NOT_FOUND,
            Self::AlreadyExists { .. }
            | Self::DomainInUse { .. }
            | Self::PortsExhausted { .. }
            | Self::Locked { .. }
            | Self::ConfigExists { .. } => exit_code::CONFLICT,
            Self::ExternalTool { .. } => exit_code::EXTERNAL,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidName { name, reason } => Self::InvalidName { name, reason },
            CoreError::Validation { field, reason } => Self::Validation { field, reason },
            CoreError::AlreadyExists { name } => Self::AlreadyExists { name },
            CoreError::DomainInUse { domain } => Self::DomainInUse { domain },
            CoreError::NoIdentityAvailable { start, end } => Self::PortsExhausted { start, end },
            CoreError::Locked { path } => Self::Locked {
                path: path.display().to_string(),
            },
            CoreError::NotFound { name } => Self::NotFound { name },
            CoreError::VhostNotFound { name } => Self::VhostMissing { name },
            CoreError::PartialRead { path, reason } => Self::CorruptRecord {
                path: path.display().to_string(),
                reason,
            },
            CoreError::ExternalTool { program, detail } => Self::ExternalTool { program, detail },
            other @ (CoreError::Io { .. } | CoreError::Encode { .. }) => Self::Core(other),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            ConfigError::NoHome => Self::NoHome,
            other => Self::Config(other),
        }
    }
}
