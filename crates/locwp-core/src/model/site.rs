// ── Site record ──

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::identity::{Identity, SiteName};
use crate::layout::Layout;

/// Everything locwp knows about one site, persisted as
/// `<base>/sites/<name>/config.json`.
///
/// Written once at `add` time and read whole by every other command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteRecord {
    pub name: SiteName,
    #[serde(flatten)]
    pub identity: Identity,
    /// PHP version, e.g. "8.3".
    pub php: String,
    #[serde(default = "default_wp_version")]
    pub wp_version: String,
    pub db_name: String,
    pub db_user: String,
    pub db_host: String,
    /// Root of every site-owned file.
    pub site_dir: PathBuf,
    /// WordPress document root, inside `site_dir`.
    pub wp_root: PathBuf,
    #[serde(default)]
    pub admin_user: String,
    #[serde(default)]
    pub admin_pass: String,
    #[serde(default)]
    pub admin_email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_wp_version() -> String {
    "latest".into()
}

/// WordPress admin account installed at provision time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminAccount {
    pub user: String,
    pub password: String,
    pub email: String,
}

impl Default for AdminAccount {
    fn default() -> Self {
        Self {
            user: "admin".into(),
            password: "admin".into(),
            email: "admin@loc.wp".into(),
        }
    }
}

/// Inputs to `SiteRecord::new` that are not derived from the name.
#[derive(Debug, Clone)]
pub struct SiteSpec {
    pub php: String,
    pub wp_version: String,
    pub db_user: String,
    pub db_host: String,
    pub admin: AdminAccount,
}

impl SiteRecord {
    /// Build a record whose paths and database name are derived from
    /// `name` and the layout.
    pub fn new(name: SiteName, identity: Identity, spec: SiteSpec, layout: &Layout) -> Self {
        Self {
            db_name: name.database_name(),
            site_dir: layout.site_dir(&name),
            wp_root: layout.document_root(&name),
            identity,
            php: spec.php,
            wp_version: spec.wp_version,
            db_user: spec.db_user,
            db_host: spec.db_host,
            admin_user: spec.admin.user,
            admin_pass: spec.admin.password,
            admin_email: spec.admin.email,
            created_at: Some(Utc::now()),
            name,
        }
    }
}
