//! nginx vhost enable/disable state.
//!
//! A site's vhost lives at exactly one of two paths: `<name>.conf`
//! (enabled, picked up by nginx) or `<name>.conf.disabled` (ignored).
//! Transitions are a single `rename(2)`, so a concurrent nginx reload
//! sees either the old state or the new one, never both files or neither.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::CoreError;
use crate::layout::Layout;
use crate::model::SiteName;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum VhostState {
    Enabled,
    Disabled,
}

#[derive(Debug, Clone)]
pub struct Vhosts {
    layout: Layout,
}

impl Vhosts {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    /// Current state, or `VhostNotFound` if neither file exists.
    pub fn state(&self, name: &SiteName) -> Result<VhostState, CoreError> {
        if self.layout.vhost_path(name).is_file() {
            Ok(VhostState::Enabled)
        } else if self.layout.vhost_disabled_path(name).is_file() {
            Ok(VhostState::Disabled)
        } else {
            Err(CoreError::VhostNotFound {
                name: name.to_string(),
            })
        }
    }

    /// Enable the vhost. Idempotent.
    pub fn enable(&self, name: &SiteName) -> Result<(), CoreError> {
        self.transition(name, VhostState::Enabled)
    }

    /// Disable the vhost. Idempotent.
    pub fn disable(&self, name: &SiteName) -> Result<(), CoreError> {
        self.transition(name, VhostState::Disabled)
    }

    fn transition(&self, name: &SiteName, target: VhostState) -> Result<(), CoreError> {
        let enabled = self.layout.vhost_path(name);
        let disabled = self.layout.vhost_disabled_path(name);
        let (from, to) = match target {
            VhostState::Enabled => (&disabled, &enabled),
            VhostState::Disabled => (&enabled, &disabled),
        };

        if to.is_file() {
            debug!(site = %name, state = %target, "vhost already in target state");
            return Ok(());
        }
        if !from.is_file() {
            return Err(CoreError::VhostNotFound {
                name: name.to_string(),
            });
        }
        fs::rename(from, to).map_err(|e| CoreError::io("rename", from.as_path(), e))?;
        debug!(site = %name, state = %target, "vhost transitioned");
        Ok(())
    }

    /// Write the vhost config in the enabled position.
    pub fn write(&self, name: &SiteName, contents: &str) -> Result<(), CoreError> {
        let dir = self.layout.vhost_dir();
        fs::create_dir_all(&dir).map_err(|e| CoreError::io("create directory", &dir, e))?;
        let path = self.layout.vhost_path(name);
        fs::write(&path, contents).map_err(|e| CoreError::io("write", &path, e))
    }

    /// Remove the vhost in whichever position it is in, plus the system
    /// nginx symlink. Missing files are not an error.
    pub fn remove(&self, name: &SiteName) -> Result<(), CoreError> {
        for path in [
            self.layout.vhost_path(name),
            self.layout.vhost_disabled_path(name),
            self.layout.nginx_link(name),
        ] {
            remove_if_present(&path)?;
        }
        Ok(())
    }

    /// Point the system nginx include dir at the enabled vhost path.
    /// Replaces any existing link.
    #[cfg(unix)]
    pub fn link(&self, name: &SiteName) -> Result<(), CoreError> {
        let dir = self.layout.nginx_servers_dir();
        fs::create_dir_all(&dir).map_err(|e| CoreError::io("create directory", &dir, e))?;
        let link = self.layout.nginx_link(name);
        remove_if_present(&link)?;
        std::os::unix::fs::symlink(self.layout.vhost_path(name), &link)
            .map_err(|e| CoreError::io("symlink", &link, e))
    }
}

pub(crate) fn remove_if_present(path: &Path) -> Result<(), CoreError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CoreError::io("remove", path, e)),
    }
}
