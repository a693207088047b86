//! Point-in-time site status: vhost state plus one reachability probe.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use strum::{Display, EnumString};
use tokio::net::TcpStream;
use tracing::debug;

use crate::model::SiteRecord;
use crate::vhost::{VhostState, Vhosts};

/// Default bound on the reachability probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SiteStatus {
    Running,
    Stopped,
}

/// `Stopped` if the vhost is disabled or missing, without probing.
/// Otherwise `Running` iff a single loopback connect succeeds within
/// `timeout`.
pub async fn status(record: &SiteRecord, vhosts: &Vhosts, timeout: Duration) -> SiteStatus {
    match vhosts.state(&record.name) {
        Ok(VhostState::Enabled) => {}
        Ok(VhostState::Disabled) => return SiteStatus::Stopped,
        Err(err) => {
            debug!(site = %record.name, error = %err, "no vhost, reporting stopped");
            return SiteStatus::Stopped;
        }
    }

    if probe(record.identity.probe_addr(), timeout).await {
        SiteStatus::Running
    } else {
        SiteStatus::Stopped
    }
}

/// Connect once, then drop the stream.
pub async fn probe(addr: SocketAddr, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(_stream)) => true,
        Ok(Err(err)) => {
            debug!(%addr, error = %err, "probe refused");
            false
        }
        Err(_) => {
            debug!(%addr, ?timeout, "probe timed out");
            false
        }
    }
}
