//! Declarative lifecycle workflows for the external executor.
//!
//! `generate` compiles a site record into four named workflows
//! (provision / start / stop / destroy). Each is a variables map plus an
//! ordered list of shell steps; a step either aborts the workflow on
//! failure or asks the executor to retry it. Nothing here runs a
//! command: the output is data, written to `<site>/.pawl/workflows/`.
//!
//! Generation is a pure function of the record and the layout, so the
//! documents are deterministic (variables are kept in a `BTreeMap`).

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString, IntoEnumIterator};
use tracing::debug;

use crate::error::CoreError;
use crate::layout::{Layout, php_formula};
use crate::model::{Identity, SiteRecord};

/// WP-CLI invocation with enough memory for core downloads.
const WP_CLI: &str = "php -d memory_limit=512M $(which wp)";

// ── Document schema ─────────────────────────────────────────────────

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum Workflow {
    Provision,
    Start,
    Stop,
    Destroy,
}

impl Workflow {
    pub fn description(self) -> &'static str {
        match self {
            Self::Provision => "Provision WordPress site",
            Self::Start => "Start WordPress site",
            Self::Stop => "Stop WordPress site",
            Self::Destroy => "Destroy WordPress site",
        }
    }

    /// File name of this workflow's document.
    pub fn file_name(self) -> String {
        format!("{self}.json")
    }
}

/// What the executor should do when a step exits non-zero.
/// An absent policy aborts the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    /// Shell command; `${var}` references resolve against the workflow's variables.
    #[serde(rename = "run")]
    pub shell: String,
    #[serde(rename = "on_fail", default, skip_serializing_if = "Option::is_none")]
    pub on_failure: Option<FailurePolicy>,
}

impl Step {
    fn new(name: &str, shell: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shell: shell.into(),
            on_failure: None,
        }
    }

    fn retry(mut self) -> Self {
        self.on_failure = Some(FailurePolicy::Retry);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDecl {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// One workflow document, in the executor's on-disk format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    #[serde(rename = "vars")]
    pub variables: BTreeMap<String, String>,
    pub tasks: BTreeMap<String, TaskDecl>,
    #[serde(rename = "workflow")]
    pub steps: Vec<Step>,
}

impl WorkflowDefinition {
    pub fn step(&self, name: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.name == name)
    }

    /// A step's command with every known `${var}` substituted.
    /// Unknown references are left as written.
    pub fn expand(&self, step: &Step) -> String {
        self.variables
            .iter()
            .fold(step.shell.clone(), |cmd, (key, value)| {
                cmd.replace(&format!("${{{key}}}"), value)
            })
    }
}

// ── Generation ──────────────────────────────────────────────────────

/// Escape a value for use between single quotes in a step command.
/// Admin credentials come straight from the command line.
fn quote_inner(value: &str) -> String {
    value.replace('\'', r"'\''")
}

/// Variables shared by every workflow of a site.
pub fn variables(record: &SiteRecord, layout: &Layout) -> BTreeMap<String, String> {
    let name = &record.name;
    let path = |p: &Path| p.display().to_string();

    let mut vars = BTreeMap::from([
        ("site".to_owned(), name.to_string()),
        ("url".to_owned(), site_url(&record.identity)),
        ("db_name".to_owned(), record.db_name.clone()),
        ("db_user".to_owned(), record.db_user.clone()),
        ("db_host".to_owned(), record.db_host.clone()),
        ("wp_root".to_owned(), path(&record.wp_root)),
        ("wp_ver".to_owned(), record.wp_version.clone()),
        ("php_ver".to_owned(), record.php.clone()),
        ("php_formula".to_owned(), php_formula(&record.php)),
        ("site_dir".to_owned(), path(&record.site_dir)),
        ("admin_user".to_owned(), quote_inner(&record.admin_user)),
        ("admin_pass".to_owned(), quote_inner(&record.admin_pass)),
        ("admin_email".to_owned(), quote_inner(&record.admin_email)),
        ("vhost".to_owned(), path(&layout.vhost_path(name))),
        ("nginx_link".to_owned(), path(&layout.nginx_link(name))),
        ("fpm_local".to_owned(), path(&layout.fpm_local(name))),
        ("fpm_pool".to_owned(), path(&layout.fpm_pool(name, &record.php))),
    ]);
    match &record.identity {
        Identity::Port(port) => vars.insert("port".into(), port.to_string()),
        Identity::Domain(domain) => vars.insert("domain".into(), domain.clone()),
    };
    vars
}

fn site_url(identity: &Identity) -> String {
    match identity {
        Identity::Port(port) => format!("http://localhost:{port}"),
        Identity::Domain(domain) => format!("https://{domain}"),
    }
}

fn steps(workflow: Workflow) -> Vec<Step> {
    match workflow {
        Workflow::Provision => vec![
            Step::new("check-deps", "which php nginx mariadb wp"),
            Step::new(
                "create-db",
                "mariadb -u ${db_user} -e 'CREATE DATABASE IF NOT EXISTS `${db_name}`'",
            )
            .retry(),
            Step::new(
                "download-wp",
                format!("{WP_CLI} core download --path=${{wp_root}} --version=${{wp_ver}}"),
            )
            .retry(),
            Step::new(
                "gen-wp-config",
                format!(
                    "{WP_CLI} config create --path=${{wp_root}} --dbname=${{db_name}} \
                     --dbuser=${{db_user}} --dbhost=${{db_host}} --skip-check"
                ),
            ),
            Step::new(
                "provision-services",
                "brew services restart ${php_formula} 2>/dev/null; \
                 brew services start nginx 2>/dev/null; nginx -s reload",
            )
            .retry(),
            Step::new(
                "install-wp",
                format!(
                    "{WP_CLI} core install --path=${{wp_root}} --url=${{url}} --title='${{site}}' \
                     --admin_user='${{admin_user}}' --admin_password='${{admin_pass}}' \
                     --admin_email='${{admin_email}}'"
                ),
            )
            .retry(),
            Step::new(
                "set-permalinks",
                format!(
                    "{WP_CLI} rewrite structure '/%postname%/' --path=${{wp_root}} && \
                     {WP_CLI} rewrite flush --path=${{wp_root}}"
                ),
            ),
        ],
        Workflow::Start => vec![
            Step::new("enable-vhost", "mv ${vhost}.disabled ${vhost} 2>/dev/null || true"),
            Step::new("start-php", "brew services start ${php_formula}"),
            Step::new("start-nginx", "nginx -s reload"),
        ],
        Workflow::Stop => vec![
            Step::new("disable-vhost", "mv ${vhost} ${vhost}.disabled 2>/dev/null || true"),
            Step::new("stop-nginx", "nginx -s reload"),
        ],
        Workflow::Destroy => vec![
            Step::new(
                "drop-db",
                "mariadb -u ${db_user} -e 'DROP DATABASE IF EXISTS `${db_name}`'",
            ),
            Step::new(
                "destroy-vhost",
                "rm -f ${vhost} ${vhost}.disabled ${nginx_link}",
            ),
            Step::new("destroy-fpm", "rm -f ${fpm_local} ${fpm_pool}"),
            Step::new(
                "destroy-reload",
                "brew services restart ${php_formula} 2>/dev/null; nginx -s reload || true",
            ),
        ],
    }
}

/// Compile `record` into its four workflow documents.
pub fn generate(record: &SiteRecord, layout: &Layout) -> BTreeMap<Workflow, WorkflowDefinition> {
    let vars = variables(record, layout);
    Workflow::iter()
        .map(|workflow| {
            let def = WorkflowDefinition {
                variables: vars.clone(),
                tasks: BTreeMap::from([(
                    workflow.to_string(),
                    TaskDecl {
                        description: workflow.description().into(),
                    },
                )]),
                steps: steps(workflow),
            };
            (workflow, def)
        })
        .collect()
}

/// Write one `<workflow>.json` per definition into `dir`.
pub fn write_all(
    dir: &Path,
    definitions: &BTreeMap<Workflow, WorkflowDefinition>,
) -> Result<(), CoreError> {
    fs::create_dir_all(dir).map_err(|e| CoreError::io("create directory", dir, e))?;
    for (workflow, def) in definitions {
        let path = dir.join(workflow.file_name());
        let data = serde_json::to_vec_pretty(def).map_err(|source| CoreError::Encode {
            what: format!("{workflow} workflow"),
            source,
        })?;
        fs::write(&path, data).map_err(|e| CoreError::io("write", &path, e))?;
    }
    debug!(dir = %dir.display(), count = definitions.len(), "workflows written");
    Ok(())
}
