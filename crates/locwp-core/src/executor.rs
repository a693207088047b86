//! The seam between locwp and the programs it drives.
//!
//! Lifecycle logic talks to an `Executor`; `ProcessExecutor` is the real
//! one, spawning the workflow runner and ad-hoc tools (`nginx`, `wp`)
//! as child processes with inherited stdio. Tests substitute a recorder.

use std::fs;
use std::future::Future;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::ExitStatus;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::CoreError;
use crate::layout::Layout;
use crate::model::SiteName;
use crate::workflow::Workflow;

/// Default workflow runner binary.
pub const DEFAULT_EXECUTOR: &str = "pawl";

pub trait Executor: Send + Sync {
    /// Run one of the site's generated workflows, with the site directory
    /// as the working directory.
    fn run_workflow(
        &self,
        layout: &Layout,
        site: &SiteName,
        workflow: Workflow,
    ) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Run an arbitrary program to completion.
    fn run_tool(
        &self,
        program: &str,
        args: &[String],
    ) -> impl Future<Output = Result<(), CoreError>> + Send;
}

#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_EXECUTOR)
    }
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Stage the workflow's document as the runner's `config.json`,
    /// which is the only document it reads.
    fn stage(
        layout: &Layout,
        site: &SiteName,
        workflow: Workflow,
    ) -> Result<PathBuf, CoreError> {
        let source = layout.workflow_dir(site).join(workflow.file_name());
        let target = layout.executor_config(site);
        fs::copy(&source, &target).map_err(|e| CoreError::io("copy", &source, e))?;
        Ok(target)
    }
}

impl Executor for ProcessExecutor {
    async fn run_workflow(
        &self,
        layout: &Layout,
        site: &SiteName,
        workflow: Workflow,
    ) -> Result<(), CoreError> {
        let staged = Self::stage(layout, site, workflow)?;
        let site_dir = layout.site_dir(site);
        debug!(config = %staged.display(), %workflow, "workflow staged");
        info!(program = %self.program, %workflow, site_dir = %site_dir.display(), "running workflow");

        let status = Command::new(&self.program)
            .arg("start")
            .arg(workflow.to_string())
            .current_dir(&site_dir)
            .status()
            .await;
        check(&self.program, status)
    }

    async fn run_tool(&self, program: &str, args: &[String]) -> Result<(), CoreError> {
        debug!(program, ?args, "running tool");
        let status = Command::new(program).args(args).status().await;
        check(program, status)
    }
}

fn check(program: &str, status: std::io::Result<ExitStatus>) -> Result<(), CoreError> {
    let detail = match status {
        Ok(status) if status.success() => return Ok(()),
        Ok(status) => match status.code() {
            Some(code) => format!("exited with status {code}"),
            None => "terminated by signal".to_owned(),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => "not found on PATH".to_owned(),
        Err(e) => format!("could not be started: {e}"),
    };
    Err(CoreError::ExternalTool {
        program: program.to_owned(),
        detail,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::Identity;
    use crate::model::site::tests::sample_record;
    use crate::workflow;
    use tempfile::TempDir;

    fn staged_site() -> (TempDir, Layout, SiteName) {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path(), tmp.path().join("brew"));
        let rec = sample_record(&layout, "demo", Identity::Port(8081));
        fs::create_dir_all(&rec.site_dir).unwrap();
        workflow::write_all(
            &layout.workflow_dir(&rec.name),
            &workflow::generate(&rec, &layout),
        )
        .unwrap();
        (tmp, layout, rec.name)
    }

    #[test]
    fn stage_copies_the_requested_workflow() {
        let (_tmp, layout, site) = staged_site();
        let staged = ProcessExecutor::stage(&layout, &site, Workflow::Stop).unwrap();
        let site_dir = layout.site_dir(&site);
        assert_eq!(staged, site_dir.join(".pawl/config.json"));
        let expected = fs::read(site_dir.join(".pawl/workflows/stop.json")).unwrap();
        assert_eq!(fs::read(staged).unwrap(), expected);
    }

    #[test]
    fn stage_without_workflows_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::new(tmp.path(), tmp.path().join("brew"));
        let site = SiteName::new("ghost").unwrap();
        assert!(matches!(
            ProcessExecutor::stage(&layout, &site, Workflow::Start),
            Err(CoreError::Io { .. })
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn successful_runner_is_ok() {
        let (_tmp, layout, site) = staged_site();
        let exec = ProcessExecutor::new("true");
        exec.run_workflow(&layout, &site, Workflow::Start).await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failing_runner_is_an_external_tool_error() {
        let (_tmp, layout, site) = staged_site();
        let exec = ProcessExecutor::new("false");
        let err = exec
            .run_workflow(&layout, &site, Workflow::Provision)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ExternalTool { program, detail }
                if program == "false" && detail == "exited with status 1"
        ));
    }

    #[tokio::test]
    async fn missing_program_is_reported_by_name() {
        let exec = ProcessExecutor::default();
        let err = exec
            .run_tool("locwp-no-such-tool", &["--version".into()])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::ExternalTool { program, detail }
                if program == "locwp-no-such-tool" && detail == "not found on PATH"
        ));
    }
}
