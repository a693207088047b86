//! Shared helpers for command handlers.

use chrono::Local;

use locwp_core::{SiteName, SiteRecord};

use crate::error::CliError;

/// Validate a site name from the command line.
pub fn parse_name(raw: &str) -> Result<SiteName, CliError> {
    Ok(SiteName::new(raw)?)
}

/// Browser URL, falling back to the bare host if it does not parse.
pub fn site_url(record: &SiteRecord) -> String {
    record
        .identity
        .url()
        .map_or_else(|_| record.identity.host(), |url| url.to_string())
}

/// Multi-line detail view of one site.
pub fn detail(record: &SiteRecord) -> String {
    let created = record.created_at.map_or_else(
        || "-".to_owned(),
        |t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
    );
    [
        format!("Name:      {}", record.name),
        format!("URL:       {}", site_url(record)),
        format!("PHP:       {}", record.php),
        format!("WordPress: {}", record.wp_version),
        format!("Database:  {} ({}@{})", record.db_name, record.db_user, record.db_host),
        format!("Admin:     {} / {}", record.admin_user, record.admin_pass),
        format!("Directory: {}", record.site_dir.display()),
        format!("Created:   {created}"),
    ]
    .join("\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use locwp_core::{AdminAccount, Identity, Layout, SiteSpec};

    fn record(identity: Identity) -> SiteRecord {
        let spec = SiteSpec {
            php: "8.3".into(),
            wp_version: "latest".into(),
            db_user: "root".into(),
            db_host: "localhost".into(),
            admin: AdminAccount::default(),
        };
        SiteRecord::new(
            SiteName::new("blog").unwrap(),
            identity,
            spec,
            &Layout::new("/b", "/usr/local"),
        )
    }

    #[test]
    fn bad_names_are_usage_errors() {
        let err = parse_name("Not_Valid").unwrap_err();
        assert!(matches!(err, CliError::InvalidName { .. }));
        assert_eq!(parse_name("my-blog").unwrap().as_str(), "my-blog");
    }

    #[test]
    fn urls_follow_the_identity() {
        assert_eq!(site_url(&record(Identity::Port(8081))), "http://localhost:8081/");
        assert_eq!(
            site_url(&record(Identity::Domain("blog.loc.wp".into()))),
            "https://blog.loc.wp/"
        );
    }

    #[test]
    fn detail_lists_database_and_directory() {
        let text = detail(&record(Identity::Port(8081)));
        assert!(text.contains("Database:  wp_blog (root@localhost)"));
        assert!(text.contains("Directory: /b/sites/blog"));
    }
}
