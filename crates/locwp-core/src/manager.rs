//! Site lifecycle orchestration.
//!
//! `SiteManager` owns one of each component (registry, vhosts,
//! allocator) over a shared `Layout` and drives external work through an
//! `Executor`. Every CLI lifecycle command is one method here.

use std::fs;
use std::path::Path;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use crate::allocator::Allocator;
use crate::error::CoreError;
use crate::executor::Executor;
use crate::layout::Layout;
use crate::model::{SiteName, SiteRecord, SiteSpec};
use crate::registry::{Registry, RegistryLock};
use crate::status::{self, DEFAULT_PROBE_TIMEOUT, SiteStatus};
use crate::template;
use crate::vhost::{Vhosts, remove_if_present};
use crate::workflow::{self, Workflow};

/// Request to create a site.
#[derive(Debug, Clone)]
pub struct AddSite {
    pub name: SiteName,
    pub spec: SiteSpec,
    /// Create the site's files but do not run `provision`.
    pub no_start: bool,
}

/// One row of `list`: a registry entry and, if its record loaded, its status.
#[derive(Debug)]
pub struct SiteRow {
    pub name: String,
    pub record: Result<SiteRecord, CoreError>,
    pub status: Option<SiteStatus>,
}

pub struct SiteManager<E> {
    layout: Layout,
    registry: Registry,
    vhosts: Vhosts,
    allocator: Allocator,
    executor: E,
    probe_timeout: Duration,
    fpm_user: String,
}

impl<E: Executor> SiteManager<E> {
    pub fn new(layout: Layout, allocator: Allocator, executor: E) -> Self {
        Self {
            registry: Registry::new(layout.clone()),
            vhosts: Vhosts::new(layout.clone()),
            layout,
            allocator,
            executor,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            fpm_user: "nobody".into(),
        }
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Unix user the PHP-FPM pools run as.
    pub fn with_fpm_user(mut self, user: impl Into<String>) -> Self {
        self.fpm_user = user.into();
        self
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn vhosts(&self) -> &Vhosts {
        &self.vhosts
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    // ── add ──────────────────────────────────────────────────────────

    /// Allocate, persist and configure a new site, then provision it
    /// unless `no_start` is set.
    ///
    /// The registry lock is held from the existence check until the
    /// record and its config files are on disk, so two concurrent adds
    /// can never be handed the same identity.
    pub async fn add(&self, req: AddSite) -> Result<SiteRecord, CoreError> {
        let record = {
            let _lock = RegistryLock::acquire(&self.layout)?;

            if self.registry.exists(&req.name) {
                return Err(CoreError::AlreadyExists {
                    name: req.name.to_string(),
                });
            }
            let existing = self.registry.records()?;
            let identity = self.allocator.allocate(&req.name, &existing)?;
            let record = SiteRecord::new(req.name, identity, req.spec, &self.layout);

            self.registry.create(&record)?;
            if let Err(err) = self.install(&record) {
                self.rollback(&record.name);
                return Err(err);
            }
            record
        };
        info!(site = %record.name, identity = %record.identity, "site created");

        if !req.no_start {
            self.executor
                .run_workflow(&self.layout, &record.name, Workflow::Provision)
                .await?;
        }
        Ok(record)
    }

    /// Write every generated file for a freshly created record.
    fn install(&self, record: &SiteRecord) -> Result<(), CoreError> {
        let name = &record.name;
        self.vhosts
            .write(name, &template::nginx_vhost(record, &self.layout))?;
        self.link_vhost(name);

        let pool = template::fpm_pool(record, &self.layout, &self.fpm_user);
        let local = self.layout.fpm_local(name);
        write_file(&local, &pool)?;
        let system_dir = self.layout.fpm_pool_dir(&record.php);
        if system_dir.is_dir() {
            if let Err(err) = write_file(&self.layout.fpm_pool(name, &record.php), &pool) {
                warn!(site = %name, error = %err, "could not install system php-fpm pool");
            }
        } else {
            debug!(dir = %system_dir.display(), "no system php-fpm pool dir, skipping");
        }

        self.write_workflows(record)
    }

    #[cfg(unix)]
    fn link_vhost(&self, name: &SiteName) {
        if let Err(err) = self.vhosts.link(name) {
            warn!(site = %name, error = %err, "could not link vhost into nginx servers dir");
        }
    }

    #[cfg(not(unix))]
    fn link_vhost(&self, _name: &SiteName) {}

    fn rollback(&self, name: &SiteName) {
        if let Err(err) = self.remove_generated(name) {
            warn!(site = %name, error = %err, "rollback left generated files behind");
        }
        if let Err(err) = self.registry.remove(name) {
            warn!(site = %name, error = %err, "rollback left site directory behind");
        }
    }

    fn write_workflows(&self, record: &SiteRecord) -> Result<(), CoreError> {
        let defs = workflow::generate(record, &self.layout);
        workflow::write_all(&self.layout.workflow_dir(&record.name), &defs)
    }

    // ── start / stop ─────────────────────────────────────────────────

    pub async fn start(&self, name: &SiteName) -> Result<SiteRecord, CoreError> {
        let record = self.registry.load_by_name(name)?;
        self.vhosts.enable(name)?;
        self.write_workflows(&record)?;
        self.executor
            .run_workflow(&self.layout, &record.name, Workflow::Start)
            .await?;
        info!(site = %name, "site started");
        Ok(record)
    }

    pub async fn stop(&self, name: &SiteName) -> Result<SiteRecord, CoreError> {
        let record = self.registry.load_by_name(name)?;
        self.vhosts.disable(name)?;
        self.write_workflows(&record)?;
        self.executor
            .run_workflow(&self.layout, &record.name, Workflow::Stop)
            .await?;
        info!(site = %name, "site stopped");
        Ok(record)
    }

    // ── delete ───────────────────────────────────────────────────────

    /// Tear a site down and forget it.
    ///
    /// The registry lock is taken before anything is torn down, so
    /// contention fails with `Locked` while the site is still intact.
    /// Teardown is then best-effort: a failed `destroy` workflow or a file
    /// that is already gone is logged and skipped. The record itself is
    /// always removed, so a half-destroyed site never lingers in `list`.
    pub async fn delete(&self, name: &SiteName) -> Result<SiteRecord, CoreError> {
        let lock = RegistryLock::acquire(&self.layout)?;
        let record = self.registry.load_by_name(name)?;

        match self.write_workflows(&record) {
            Ok(()) => {
                if let Err(err) = self
                    .executor
                    .run_workflow(&self.layout, &record.name, Workflow::Destroy)
                    .await
                {
                    warn!(site = %name, error = %err, "destroy workflow failed, continuing");
                }
            }
            Err(err) => warn!(site = %name, error = %err, "could not write destroy workflow"),
        }

        if let Err(err) = self.remove_generated(name) {
            warn!(site = %name, error = %err, "could not remove generated config");
        }
        if let Err(err) = remove_if_present(&self.layout.fpm_pool(name, &record.php)) {
            warn!(site = %name, error = %err, "could not remove system php-fpm pool");
        }

        self.registry.remove(name)?;
        drop(lock);
        info!(site = %name, "site deleted");

        if let Err(err) = self
            .executor
            .run_tool("nginx", &["-s".into(), "reload".into()])
            .await
        {
            warn!(error = %err, "nginx reload failed");
        }
        Ok(record)
    }

    /// Vhost files, nginx link and local FPM pool.
    fn remove_generated(&self, name: &SiteName) -> Result<(), CoreError> {
        self.vhosts.remove(name)?;
        remove_if_present(&self.layout.fpm_local(name))
    }

    // ── queries ──────────────────────────────────────────────────────

    /// Every registry entry with its status. Probes run concurrently.
    pub async fn list(&self) -> Result<Vec<SiteRow>, CoreError> {
        let entries: Vec<_> = self.registry.load_all()?.collect();

        let statuses = join_all(entries.iter().map(|entry| async move {
            match &entry.record {
                Ok(record) => Some(status::status(record, &self.vhosts, self.probe_timeout).await),
                Err(_) => None,
            }
        }))
        .await;

        Ok(entries
            .into_iter()
            .zip(statuses)
            .map(|(entry, status)| SiteRow {
                name: entry.dir_name,
                record: entry.record,
                status,
            })
            .collect())
    }

    pub async fn status(&self, name: &SiteName) -> Result<(SiteRecord, SiteStatus), CoreError> {
        let record = self.registry.load_by_name(name)?;
        let status = status::status(&record, &self.vhosts, self.probe_timeout).await;
        Ok((record, status))
    }

    /// Run WP-CLI against the site's document root.
    pub async fn wp(&self, name: &SiteName, args: &[String]) -> Result<(), CoreError> {
        let record = self.registry.load_by_name(name)?;
        let mut argv = vec![format!("--path={}", record.wp_root.display())];
        argv.extend_from_slice(args);
        self.executor.run_tool("wp", &argv).await
    }
}

fn write_file(path: &Path, contents: &str) -> Result<(), CoreError> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| CoreError::io("create directory", dir, e))?;
    }
    fs::write(path, contents).map_err(|e| CoreError::io("write", path, e))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::allocator::IdentityStrategy;
    use crate::model::Identity;
    use crate::model::site::tests::sample_spec;
    use crate::vhost::VhostState;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Records every call; fails the named workflow if asked to.
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
        fail: Option<Workflow>,
    }

    impl Recorder {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Executor for Recorder {
        async fn run_workflow(
            &self,
            layout: &Layout,
            site: &SiteName,
            workflow: Workflow,
        ) -> Result<(), CoreError> {
            assert!(layout.workflow_dir(site).join(workflow.file_name()).is_file());
            self.calls.lock().unwrap().push(workflow.to_string());
            if self.fail == Some(workflow) {
                return Err(CoreError::ExternalTool {
                    program: "pawl".into(),
                    detail: "exited with status 1".into(),
                });
            }
            Ok(())
        }

        async fn run_tool(&self, program: &str, args: &[String]) -> Result<(), CoreError> {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{program} {}", args.join(" ")));
            Ok(())
        }
    }

    fn manager_with(recorder: Recorder) -> (TempDir, SiteManager<Recorder>) {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("locwp"), tmp.path().join("brew"));
        let mgr = SiteManager::new(layout, Allocator::default(), recorder)
            .with_probe_timeout(Duration::from_millis(100))
            .with_fpm_user("alice");
        (tmp, mgr)
    }

    fn manager() -> (TempDir, SiteManager<Recorder>) {
        manager_with(Recorder::default())
    }

    fn name(n: &str) -> SiteName {
        SiteName::new(n).unwrap()
    }

    fn add_req(n: &str, no_start: bool) -> AddSite {
        AddSite {
            name: name(n),
            spec: sample_spec(),
            no_start,
        }
    }

    #[tokio::test]
    async fn add_writes_record_vhost_pool_and_workflows() {
        let (_tmp, mgr) = manager();
        let rec = mgr.add(add_req("blog", true)).await.unwrap();
        let layout = mgr.layout();

        assert_eq!(mgr.registry().load_by_name(&rec.name).unwrap(), rec);
        assert_eq!(mgr.vhosts().state(&rec.name).unwrap(), VhostState::Enabled);
        let pool = fs::read_to_string(layout.fpm_local(&rec.name)).unwrap();
        assert!(pool.contains("user = alice"));
        for wf in ["provision", "start", "stop", "destroy"] {
            assert!(layout.workflow_dir(&rec.name).join(format!("{wf}.json")).is_file());
        }
        assert!(mgr.executor().calls().is_empty());
        assert!(!layout.lock_path().exists());
    }

    #[tokio::test]
    async fn add_installs_system_pool_only_when_its_dir_exists() {
        let (_tmp, mgr) = manager();
        let rec = mgr.add(add_req("one", true)).await.unwrap();
        assert!(!mgr.layout().fpm_pool(&rec.name, &rec.php).exists());

        fs::create_dir_all(mgr.layout().fpm_pool_dir(&rec.php)).unwrap();
        let rec = mgr.add(add_req("two", true)).await.unwrap();
        assert!(mgr.layout().fpm_pool(&rec.name, &rec.php).is_file());
    }

    #[tokio::test]
    async fn add_runs_provision_unless_told_not_to() {
        let (_tmp, mgr) = manager();
        mgr.add(add_req("blog", false)).await.unwrap();
        assert_eq!(mgr.executor().calls(), ["provision"]);
    }

    #[tokio::test]
    async fn added_sites_never_share_an_identity() {
        let (_tmp, mgr) = manager();
        let mut seen = HashSet::new();
        for n in ["a", "b", "c", "d"] {
            let rec = mgr.add(add_req(n, true)).await.unwrap();
            assert!(seen.insert(rec.identity.clone()), "duplicate {}", rec.identity);
        }
    }

    #[tokio::test]
    async fn add_duplicate_name_is_rejected() {
        let (_tmp, mgr) = manager();
        mgr.add(add_req("blog", true)).await.unwrap();
        let err = mgr.add(add_req("blog", true)).await.unwrap_err();
        assert!(matches!(err, CoreError::AlreadyExists { .. }));
    }

    #[tokio::test]
    async fn add_fails_fast_while_registry_is_locked() {
        let (_tmp, mgr) = manager();
        let _held = RegistryLock::acquire(mgr.layout()).unwrap();
        let err = mgr.add(add_req("blog", true)).await.unwrap_err();
        assert!(matches!(err, CoreError::Locked { .. }));
        assert!(!mgr.registry().exists(&name("blog")));
    }

    #[tokio::test]
    async fn domain_strategy_sites_get_tls_vhosts() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path().join("locwp"), tmp.path().join("brew"));
        let alloc = Allocator::new(IdentityStrategy::Domain {
            suffix: ".loc.wp".into(),
        });
        let mgr = SiteManager::new(layout, alloc, Recorder::default());

        let rec = mgr.add(add_req("shop", true)).await.unwrap();
        assert_eq!(rec.identity, Identity::Domain("shop.loc.wp".into()));
        let vhost = fs::read_to_string(mgr.layout().vhost_path(&rec.name)).unwrap();
        assert!(vhost.contains("listen 443 ssl;"));
    }

    #[tokio::test]
    async fn stop_then_start_toggles_the_vhost() {
        let (_tmp, mgr) = manager();
        let rec = mgr.add(add_req("blog", true)).await.unwrap();

        mgr.stop(&rec.name).await.unwrap();
        assert_eq!(mgr.vhosts().state(&rec.name).unwrap(), VhostState::Disabled);
        mgr.stop(&rec.name).await.unwrap();

        mgr.start(&rec.name).await.unwrap();
        assert_eq!(mgr.vhosts().state(&rec.name).unwrap(), VhostState::Enabled);
        assert_eq!(mgr.executor().calls(), ["stop", "stop", "start"]);
    }

    #[tokio::test]
    async fn lifecycle_commands_on_unknown_site_are_not_found() {
        let (_tmp, mgr) = manager();
        let ghost = name("ghost");
        assert!(matches!(mgr.start(&ghost).await, Err(CoreError::NotFound { .. })));
        assert!(matches!(mgr.stop(&ghost).await, Err(CoreError::NotFound { .. })));
        assert!(matches!(mgr.delete(&ghost).await, Err(CoreError::NotFound { .. })));
        assert!(matches!(mgr.status(&ghost).await, Err(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn start_without_vhost_is_vhost_not_found() {
        let (_tmp, mgr) = manager();
        let rec = mgr.add(add_req("blog", true)).await.unwrap();
        mgr.vhosts().remove(&rec.name).unwrap();
        assert!(matches!(
            mgr.start(&rec.name).await,
            Err(CoreError::VhostNotFound { .. })
        ));
        assert!(mgr.executor().calls().is_empty());
    }

    #[tokio::test]
    async fn delete_removes_everything_and_reloads_nginx() {
        let (_tmp, mgr) = manager();
        let rec = mgr.add(add_req("blog", true)).await.unwrap();
        mgr.delete(&rec.name).await.unwrap();

        let layout = mgr.layout();
        assert!(!mgr.registry().exists(&rec.name));
        assert!(!layout.vhost_path(&rec.name).exists());
        assert!(!layout.fpm_local(&rec.name).exists());
        assert_eq!(mgr.executor().calls(), ["destroy", "nginx -s reload"]);
    }

    #[tokio::test]
    async fn delete_survives_a_failed_destroy_workflow() {
        let (_tmp, mgr) = manager_with(Recorder {
            fail: Some(Workflow::Destroy),
            ..Recorder::default()
        });
        let rec = mgr.add(add_req("blog", true)).await.unwrap();
        mgr.delete(&rec.name).await.unwrap();
        assert!(!mgr.registry().exists(&rec.name));
    }

    #[tokio::test]
    async fn delete_while_locked_leaves_the_site_intact() {
        let (_tmp, mgr) = manager();
        let rec = mgr.add(add_req("blog", true)).await.unwrap();
        let held = RegistryLock::acquire(mgr.layout()).unwrap();

        let err = mgr.delete(&rec.name).await.unwrap_err();
        assert!(matches!(err, CoreError::Locked { .. }));
        assert!(mgr.executor().calls().is_empty());
        assert!(mgr.registry().exists(&rec.name));
        assert_eq!(mgr.vhosts().state(&rec.name).unwrap(), VhostState::Enabled);
        assert!(mgr.layout().fpm_local(&rec.name).is_file());

        drop(held);
        mgr.delete(&rec.name).await.unwrap();
        assert!(!mgr.registry().exists(&rec.name));
    }

    #[tokio::test]
    async fn list_reports_corrupt_rows_alongside_good_ones() {
        let (_tmp, mgr) = manager();
        for n in ["alpha", "bravo", "delta"] {
            mgr.add(add_req(n, true)).await.unwrap();
        }
        mgr.stop(&name("bravo")).await.unwrap();
        let broken = mgr.layout().sites_dir().join("charlie");
        fs::create_dir_all(&broken).unwrap();
        fs::write(broken.join("config.json"), "[]").unwrap();

        let rows = mgr.list().await.unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["alpha", "bravo", "charlie", "delta"]);
        assert_eq!(rows.iter().filter(|r| r.record.is_ok()).count(), 3);
        assert!(rows[2].status.is_none());
        assert_eq!(rows[1].status, Some(SiteStatus::Stopped));
    }

    #[tokio::test]
    async fn wp_runs_against_the_document_root() {
        let (_tmp, mgr) = manager();
        let rec = mgr.add(add_req("blog", true)).await.unwrap();
        mgr.wp(&rec.name, &["plugin".into(), "list".into()])
            .await
            .unwrap();
        assert_eq!(
            mgr.executor().calls(),
            [format!("wp --path={} plugin list", rec.wp_root.display())]
        );
    }
}
