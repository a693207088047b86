//! Site command handlers.

use serde::Serialize;
use tabled::Tabled;

use locwp_config::Settings;
use locwp_core::{AddSite, AdminAccount, SiteRecord, SiteRow, SiteSpec, SiteStatus};

use crate::cli::{AddArgs, GlobalOpts, OutputFormat, WpArgs};
use crate::error::CliError;
use crate::output;

use super::{Manager, util};

// ── Table rows ──────────────────────────────────────────────────────

#[derive(Tabled)]
struct SiteTableRow {
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "URL")]
    url: String,
    #[tabled(rename = "PHP")]
    php: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Serialized form of one `list` row.
#[derive(Serialize)]
struct ListItem {
    name: String,
    status: Option<SiteStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    record: Option<SiteRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl From<SiteRow> for ListItem {
    fn from(row: SiteRow) -> Self {
        let (url, record, error) = match row.record {
            Ok(record) => (Some(util::site_url(&record)), Some(record), None),
            Err(err) => (None, None, Some(err.to_string())),
        };
        Self {
            name: row.name,
            status: row.status,
            url,
            record,
            error,
        }
    }
}

#[derive(Serialize)]
struct StatusView {
    name: String,
    url: String,
    status: SiteStatus,
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn add(
    manager: &Manager,
    settings: &Settings,
    args: AddArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let name = util::parse_name(&args.name)?;
    let req = AddSite {
        name,
        spec: SiteSpec {
            php: args.php.unwrap_or_else(|| settings.php.clone()),
            wp_version: settings.wp_version.clone(),
            db_user: locwp_config::current_user(),
            db_host: settings.db_host.clone(),
            admin: AdminAccount {
                user: args.user,
                password: args.pass,
                email: args.email,
            },
        },
        no_start: args.no_start,
    };

    let record = manager.add(req).await?;
    output::note(
        &format!("Site '{}' created: {}", record.name, util::site_url(&record)),
        global.quiet,
    );
    if args.no_start {
        output::note("Provisioning skipped (--no-start).", global.quiet);
    }

    let out = output::render_single(global.output, &record, util::detail, |r| {
        r.name.to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn start(manager: &Manager, name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let name = util::parse_name(name)?;
    let record = manager.start(&name).await?;
    output::note(
        &format!("Site '{name}' started: {}", util::site_url(&record)),
        global.quiet,
    );
    Ok(())
}

pub async fn stop(manager: &Manager, name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let name = util::parse_name(name)?;
    manager.stop(&name).await?;
    output::note(&format!("Site '{name}' stopped"), global.quiet);
    Ok(())
}

pub async fn delete(manager: &Manager, name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let name = util::parse_name(name)?;
    manager.delete(&name).await?;
    output::note(&format!("Site '{name}' deleted"), global.quiet);
    Ok(())
}

pub async fn list(manager: &Manager, global: &GlobalOpts) -> Result<(), CliError> {
    let items: Vec<ListItem> = manager
        .list()
        .await?
        .into_iter()
        .map(ListItem::from)
        .collect();

    if items.is_empty() && matches!(global.output, OutputFormat::Table) {
        output::note("No sites yet. Create one with: locwp add <name>", global.quiet);
        return Ok(());
    }

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.output,
        &items,
        |item| SiteTableRow {
            name: item.name.clone(),
            url: item.url.clone().unwrap_or_else(|| "-".into()),
            php: item
                .record
                .as_ref()
                .map_or_else(|| "-".into(), |r| r.php.clone()),
            status: output::paint_status(item.status, color),
        },
        |item| item.name.clone(),
    )?;
    output::print_output(&out, global.quiet);

    for item in &items {
        if let Some(err) = &item.error {
            tracing::warn!(site = %item.name, error = %err, "unreadable site record");
        }
    }
    Ok(())
}

pub async fn status(manager: &Manager, name: &str, global: &GlobalOpts) -> Result<(), CliError> {
    let name = util::parse_name(name)?;
    let (record, status) = manager.status(&name).await?;
    let view = StatusView {
        name: record.name.to_string(),
        url: util::site_url(&record),
        status,
    };

    let color = output::should_color(global.color);
    let out = output::render_single(
        global.output,
        &view,
        |v| {
            format!(
                "Name:   {}\nURL:    {}\nStatus: {}",
                v.name,
                v.url,
                output::paint_status(Some(v.status), color)
            )
        },
        |v| v.status.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn wp(manager: &Manager, args: WpArgs) -> Result<(), CliError> {
    let name = util::parse_name(&args.name)?;
    manager.wp(&name, &args.args).await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use locwp_core::{CoreError, Identity, Layout, SiteName};
    use std::path::PathBuf;

    #[test]
    fn errored_rows_serialize_with_their_reason() {
        let item = ListItem::from(SiteRow {
            name: "broken".into(),
            record: Err(CoreError::PartialRead {
                path: PathBuf::from("/b/sites/broken/config.json"),
                reason: "expected value".into(),
            }),
            status: None,
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["name"], "broken");
        assert!(json["status"].is_null());
        assert!(json["error"].as_str().unwrap().contains("expected value"));
        assert!(json.get("record").is_none());
    }

    #[test]
    fn readable_rows_carry_url_and_record() {
        let layout = Layout::new("/b", "/usr/local");
        let name = SiteName::new("blog").unwrap();
        let spec = SiteSpec {
            php: "8.3".into(),
            wp_version: "latest".into(),
            db_user: "root".into(),
            db_host: "localhost".into(),
            admin: AdminAccount::default(),
        };
        let record = SiteRecord::new(name, Identity::Port(8085), spec, &layout);
        let item = ListItem::from(SiteRow {
            name: "blog".into(),
            record: Ok(record),
            status: Some(SiteStatus::Stopped),
        });
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["status"], "stopped");
        assert_eq!(json["url"], "http://localhost:8085/");
        assert_eq!(json["record"]["port"], 8085);
    }
}
