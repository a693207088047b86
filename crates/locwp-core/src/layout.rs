// ── Filesystem layout ──
//
// Every path locwp reads or writes, derived from two roots: the locwp
// base directory and the package-manager prefix that owns the system
// nginx and PHP-FPM installs. Pure path arithmetic, never touches disk.
// The config crate builds a `Layout` and hands it in.

use std::path::{Path, PathBuf};

use crate::model::SiteName;

/// Name of the per-site record document.
pub const RECORD_FILE: &str = "config.json";

/// Directory the external workflow executor reads from.
pub const EXECUTOR_DIR: &str = ".pawl";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    base: PathBuf,
    brew_prefix: PathBuf,
}

impl Layout {
    pub fn new(base: impl Into<PathBuf>, brew_prefix: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            brew_prefix: brew_prefix.into(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    pub fn brew_prefix(&self) -> &Path {
        &self.brew_prefix
    }

    // ── Registry ─────────────────────────────────────────────────────

    pub fn sites_dir(&self) -> PathBuf {
        self.base.join("sites")
    }

    pub fn site_dir(&self, name: &SiteName) -> PathBuf {
        self.sites_dir().join(name.as_str())
    }

    pub fn record_path(&self, name: &SiteName) -> PathBuf {
        self.site_dir(name).join(RECORD_FILE)
    }

    pub fn document_root(&self, name: &SiteName) -> PathBuf {
        self.site_dir(name).join("wordpress")
    }

    pub fn logs_dir(&self, name: &SiteName) -> PathBuf {
        self.site_dir(name).join("logs")
    }

    /// Advisory lock guarding allocate + persist.
    pub fn lock_path(&self) -> PathBuf {
        self.sites_dir().join(".lock")
    }

    // ── Workflows ────────────────────────────────────────────────────

    pub fn workflow_dir(&self, name: &SiteName) -> PathBuf {
        self.site_dir(name).join(EXECUTOR_DIR).join("workflows")
    }

    /// The single document the executor loads for the workflow being run.
    pub fn executor_config(&self, name: &SiteName) -> PathBuf {
        self.site_dir(name).join(EXECUTOR_DIR).join("config.json")
    }

    // ── nginx ────────────────────────────────────────────────────────

    pub fn vhost_dir(&self) -> PathBuf {
        self.base.join("nginx").join("sites")
    }

    pub fn vhost_path(&self, name: &SiteName) -> PathBuf {
        self.vhost_dir().join(format!("{name}.conf"))
    }

    pub fn vhost_disabled_path(&self, name: &SiteName) -> PathBuf {
        self.vhost_dir().join(format!("{name}.conf.disabled"))
    }

    pub fn nginx_servers_dir(&self) -> PathBuf {
        self.brew_prefix.join("etc").join("nginx").join("servers")
    }

    /// Symlink in the system nginx include dir pointing at the vhost.
    pub fn nginx_link(&self, name: &SiteName) -> PathBuf {
        self.nginx_servers_dir().join(format!("locwp-{name}.conf"))
    }

    pub fn ssl_dir(&self) -> PathBuf {
        self.base.join("ssl")
    }

    // ── PHP-FPM ──────────────────────────────────────────────────────

    pub fn php_dir(&self) -> PathBuf {
        self.base.join("php")
    }

    pub fn fpm_local(&self, name: &SiteName) -> PathBuf {
        self.php_dir().join(format!("{name}.conf"))
    }

    pub fn fpm_pool_dir(&self, php: &str) -> PathBuf {
        self.brew_prefix
            .join("etc")
            .join("php")
            .join(php)
            .join("php-fpm.d")
    }

    pub fn fpm_pool(&self, name: &SiteName, php: &str) -> PathBuf {
        self.fpm_pool_dir(php).join(format!("locwp-{name}.conf"))
    }

    /// Socket nginx forwards PHP requests to.
    pub fn fpm_socket(name: &SiteName) -> String {
        format!("/tmp/locwp-{name}.sock")
    }
}

/// Package-manager formula for a PHP version (`8.3` → `php@8.3`).
pub fn php_formula(version: &str) -> String {
    format!("php@{version}")
}

/// Default package-manager prefix for the running architecture.
pub fn default_brew_prefix() -> PathBuf {
    if cfg!(target_arch = "aarch64") {
        PathBuf::from("/opt/homebrew")
    } else {
        PathBuf::from("/usr/local")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn layout() -> Layout {
        Layout::new("/home/u/.locwp", "/opt/homebrew")
    }

    #[test]
    fn site_paths_live_under_sites_dir() {
        let name = SiteName::new("blog").unwrap();
        let l = layout();
        assert_eq!(
            l.record_path(&name),
            PathBuf::from("/home/u/.locwp/sites/blog/config.json")
        );
        assert!(l.document_root(&name).starts_with(l.site_dir(&name)));
        assert_eq!(
            l.workflow_dir(&name),
            PathBuf::from("/home/u/.locwp/sites/blog/.pawl/workflows")
        );
    }

    #[test]
    fn vhost_paths_differ_only_by_suffix() {
        let name = SiteName::new("blog").unwrap();
        let l = layout();
        assert_eq!(
            l.vhost_path(&name),
            PathBuf::from("/home/u/.locwp/nginx/sites/blog.conf")
        );
        assert_eq!(
            l.vhost_disabled_path(&name),
            PathBuf::from("/home/u/.locwp/nginx/sites/blog.conf.disabled")
        );
    }

    #[test]
    fn system_paths_follow_brew_prefix() {
        let name = SiteName::new("blog").unwrap();
        let l = layout();
        assert_eq!(
            l.nginx_link(&name),
            PathBuf::from("/opt/homebrew/etc/nginx/servers/locwp-blog.conf")
        );
        assert_eq!(
            l.fpm_pool(&name, "8.2"),
            PathBuf::from("/opt/homebrew/etc/php/8.2/php-fpm.d/locwp-blog.conf")
        );
    }

    #[test]
    fn php_formula_is_versioned() {
        assert_eq!(php_formula("8.3"), "php@8.3");
        assert_eq!(php_formula("8.1"), "php@8.1");
    }
}
