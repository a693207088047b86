//! Settings for locwp.
//!
//! Resolves the base directory, layers defaults → `<base>/config.toml`
//! → `LOCWP_*` environment variables, and translates the result into
//! `locwp_core` types. The binary never reads settings any other way.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};
use thiserror::Error;

use locwp_core::Layout;
use locwp_core::allocator::{DEFAULT_DOMAIN_SUFFIX, DEFAULT_PORT_RANGE, IdentityStrategy};
use locwp_core::executor::DEFAULT_EXECUTOR;
use locwp_core::layout::default_brew_prefix;

/// Overrides the base directory when set and non-empty.
pub const HOME_ENV: &str = "LOCWP_HOME";

/// Prefix for per-setting environment overrides (`LOCWP_PHP=8.2`).
pub const ENV_PREFIX: &str = "LOCWP_";

const BASE_DIR_NAME: &str = ".locwp";
const CONFIG_FILE: &str = "config.toml";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("cannot locate a home directory; set {HOME_ENV}")]
    NoHome,

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Which kind of network identity new sites receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IdentityKind {
    #[default]
    Port,
    Domain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// PHP version for new sites.
    #[serde(deserialize_with = "lenient_string")]
    pub php: String,
    pub identity: IdentityKind,
    pub port_start: u16,
    pub port_end: u16,
    pub domain_suffix: String,
    /// Package-manager prefix owning the system nginx and PHP installs.
    pub brew_prefix: PathBuf,
    /// Workflow runner binary.
    #[serde(deserialize_with = "lenient_string")]
    pub executor: String,
    pub probe_timeout_ms: u64,
    pub db_host: String,
    #[serde(deserialize_with = "lenient_string")]
    pub wp_version: String,
}

/// Environment values such as `LOCWP_PHP=8.2` reach serde as numbers.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Lenient {
        Str(String),
        Int(i64),
        Float(f64),
        Bool(bool),
    }

    Ok(match Lenient::deserialize(deserializer)? {
        Lenient::Str(s) => s,
        Lenient::Int(n) => n.to_string(),
        Lenient::Float(n) => n.to_string(),
        Lenient::Bool(b) => b.to_string(),
    })
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            php: "8.3".into(),
            identity: IdentityKind::Port,
            port_start: *DEFAULT_PORT_RANGE.start(),
            port_end: *DEFAULT_PORT_RANGE.end(),
            domain_suffix: DEFAULT_DOMAIN_SUFFIX.into(),
            brew_prefix: default_brew_prefix(),
            executor: DEFAULT_EXECUTOR.into(),
            probe_timeout_ms: 500,
            db_host: "localhost".into(),
            wp_version: "latest".into(),
        }
    }
}

impl Settings {
    /// Parse settings from TOML text over the defaults. No environment.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let settings: Self = Figment::new()
            .merge(Serialized::defaults(Self::default()))
            .merge(Toml::string(content))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port_start == 0 {
            return Err(invalid("port_start", "must be greater than 0"));
        }
        if self.port_start > self.port_end {
            return Err(invalid(
                "port_start",
                format!(
                    "{} is greater than port_end {}",
                    self.port_start, self.port_end
                ),
            ));
        }
        if self.executor.trim().is_empty() {
            return Err(invalid("executor", "must not be empty"));
        }
        if !self.domain_suffix.starts_with('.') || self.domain_suffix.len() < 2 {
            return Err(invalid(
                "domain_suffix",
                format!("'{}' must start with '.'", self.domain_suffix),
            ));
        }
        if self.php.trim().is_empty() {
            return Err(invalid("php", "must not be empty"));
        }
        Ok(())
    }

    // ── Boundary into core types ─────────────────────────────────────

    pub fn layout(&self, base: &Path) -> Layout {
        Layout::new(base, &self.brew_prefix)
    }

    pub fn identity_strategy(&self) -> IdentityStrategy {
        match self.identity {
            IdentityKind::Port => IdentityStrategy::Port {
                range: self.port_start..=self.port_end,
            },
            IdentityKind::Domain => IdentityStrategy::Domain {
                suffix: self.domain_suffix.clone(),
            },
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Paths ───────────────────────────────────────────────────────────

/// `env_home` if non-empty, else `<home>/.locwp`.
pub fn resolve_base_dir(env_home: Option<&str>, home: Option<&Path>) -> Result<PathBuf, ConfigError> {
    match env_home.map(str::trim) {
        Some(dir) if !dir.is_empty() => Ok(PathBuf::from(dir)),
        _ => home
            .map(|h| h.join(BASE_DIR_NAME))
            .ok_or(ConfigError::NoHome),
    }
}

/// Base directory for the current process environment.
pub fn base_dir() -> Result<PathBuf, ConfigError> {
    let env_home = std::env::var(HOME_ENV).ok();
    let home = BaseDirs::new().map(|dirs| dirs.home_dir().to_path_buf());
    resolve_base_dir(env_home.as_deref(), home.as_deref())
}

pub fn config_path(base: &Path) -> PathBuf {
    base.join(CONFIG_FILE)
}

// ── Loading / saving ────────────────────────────────────────────────

/// Load settings for `base`: defaults, then `config.toml`, then `LOCWP_*`.
pub fn load_settings(base: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(config_path(base)))
        .merge(Env::prefixed(ENV_PREFIX).ignore(&["home"]))
        .extract()?;
    settings.validate()?;
    Ok(settings)
}

/// Create the base directory if needed.
pub fn ensure_base_dir(base: &Path) -> Result<(), ConfigError> {
    std::fs::create_dir_all(base)?;
    Ok(())
}

/// Write `settings` to `<base>/config.toml`.
pub fn save_settings(base: &Path, settings: &Settings) -> Result<PathBuf, ConfigError> {
    settings.validate()?;
    ensure_base_dir(base)?;
    let path = config_path(base);
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(&path, toml_str)?;
    Ok(path)
}

/// Login name used for the database user and PHP-FPM pools.
pub fn current_user() -> String {
    pick_user(
        std::env::var("USER").ok().as_deref(),
        std::env::var("USERNAME").ok().as_deref(),
    )
}

fn pick_user(user: Option<&str>, username: Option<&str>) -> String {
    [user, username]
        .into_iter()
        .flatten()
        .find(|u| !u.is_empty())
        .unwrap_or("root")
        .to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn env_home_wins_over_home_dir() {
        let base = resolve_base_dir(Some("/srv/locwp"), Some(Path::new("/home/u"))).unwrap();
        assert_eq!(base, PathBuf::from("/srv/locwp"));
    }

    #[test]
    fn empty_env_home_falls_back_to_dot_dir() {
        let base = resolve_base_dir(Some(""), Some(Path::new("/home/u"))).unwrap();
        assert_eq!(base, PathBuf::from("/home/u/.locwp"));
        let base = resolve_base_dir(None, Some(Path::new("/home/u"))).unwrap();
        assert_eq!(base, PathBuf::from("/home/u/.locwp"));
    }

    #[test]
    fn no_home_at_all_is_an_error() {
        assert!(matches!(resolve_base_dir(None, None), Err(ConfigError::NoHome)));
    }

    #[test]
    fn empty_file_yields_defaults() {
        let settings = Settings::parse("").unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.php, "8.3");
        assert_eq!(
            settings.identity_strategy(),
            IdentityStrategy::Port { range: 8081..=8180 }
        );
        assert_eq!(settings.probe_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = Settings::parse(
            r#"
            php = "8.1"
            identity = "domain"
            domain_suffix = ".test"
            brew_prefix = "/usr/local"
            "#,
        )
        .unwrap();
        assert_eq!(settings.php, "8.1");
        assert_eq!(
            settings.identity_strategy(),
            IdentityStrategy::Domain {
                suffix: ".test".into()
            }
        );
        assert_eq!(settings.port_start, 8081);
        let layout = settings.layout(Path::new("/b"));
        assert_eq!(layout.brew_prefix(), Path::new("/usr/local"));
        assert_eq!(layout.base(), Path::new("/b"));
    }

    #[test]
    fn numeric_versions_are_read_as_strings() {
        let settings = Settings::parse("php = 8.2\nwp_version = 6.4\nexecutor = true").unwrap();
        assert_eq!(settings.php, "8.2");
        assert_eq!(settings.wp_version, "6.4");
        assert_eq!(settings.executor, "true");
    }

    #[test]
    fn inverted_port_range_is_rejected() {
        let err = Settings::parse("port_start = 9000\nport_end = 8000").unwrap_err();
        assert!(matches!(err, ConfigError::Validation { field, .. } if field == "port_start"));
    }

    #[test]
    fn bad_values_are_rejected() {
        for toml in [
            "port_start = 0",
            r#"executor = "  ""#,
            r#"domain_suffix = "loc.wp""#,
            r#"domain_suffix = ".""#,
        ] {
            assert!(
                matches!(Settings::parse(toml), Err(ConfigError::Validation { .. })),
                "{toml} should be rejected"
            );
        }
        assert!(matches!(
            Settings::parse(r#"identity = "carrier-pigeon""#),
            Err(ConfigError::Figment(_))
        ));
    }

    #[test]
    fn saved_settings_load_back() {
        let tmp = TempDir::new().unwrap();
        let base = tmp.path().join("nested");
        let settings = Settings {
            php: "8.2".into(),
            port_start: 9100,
            port_end: 9200,
            ..Settings::default()
        };
        let path = save_settings(&base, &settings).unwrap();
        assert_eq!(path, base.join("config.toml"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(Settings::parse(&raw).unwrap(), settings);
    }

    #[test]
    fn user_falls_back_to_root() {
        assert_eq!(pick_user(Some("alice"), Some("bob")), "alice");
        assert_eq!(pick_user(Some(""), Some("bob")), "bob");
        assert_eq!(pick_user(None, None), "root");
    }
}
