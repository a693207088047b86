//! Identity allocation for new sites.
//!
//! A candidate identity must be free in two places: the registry (no
//! existing record claims it) and the OS (no other process is bound to
//! it). Checking only one of the two hands out ports that are either
//! already ours or already someone else's.

use std::collections::HashSet;
use std::net::{Ipv4Addr, TcpListener};
use std::ops::RangeInclusive;

use tracing::debug;

use crate::error::CoreError;
use crate::model::{Identity, SiteName, SiteRecord};

/// Default scan range for port identities.
pub const DEFAULT_PORT_RANGE: RangeInclusive<u16> = 8081..=8180;

/// Default suffix for domain identities.
pub const DEFAULT_DOMAIN_SUFFIX: &str = ".loc.wp";

/// How new sites get their network identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// First port in the range that is unclaimed and bindable on loopback.
    Port { range: RangeInclusive<u16> },
    /// `<name><suffix>`, unique unless a record already uses it.
    Domain { suffix: String },
}

impl Default for IdentityStrategy {
    fn default() -> Self {
        Self::Port {
            range: DEFAULT_PORT_RANGE,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Allocator {
    strategy: IdentityStrategy,
}

impl Allocator {
    pub fn new(strategy: IdentityStrategy) -> Self {
        Self { strategy }
    }

    /// Allocate an identity for `name`, probing the OS for port candidates.
    pub fn allocate(&self, name: &SiteName, existing: &[SiteRecord]) -> Result<Identity, CoreError> {
        self.allocate_with(name, existing, port_is_free)
    }

    /// Allocate with a caller-supplied liveness probe. `probe(port)` must
    /// return `true` only if nothing else holds the port.
    pub fn allocate_with(
        &self,
        name: &SiteName,
        existing: &[SiteRecord],
        probe: impl Fn(u16) -> bool,
    ) -> Result<Identity, CoreError> {
        match &self.strategy {
            IdentityStrategy::Port { range } => {
                let claimed: HashSet<u16> =
                    existing.iter().filter_map(|r| r.identity.port()).collect();

                for port in range.clone() {
                    if claimed.contains(&port) {
                        debug!(port, "skipping port claimed by another site");
                        continue;
                    }
                    if probe(port) {
                        debug!(port, site = %name, "allocated port");
                        return Ok(Identity::Port(port));
                    }
                    debug!(port, "skipping port bound by another process");
                }

                Err(CoreError::NoIdentityAvailable {
                    start: *range.start(),
                    end: *range.end(),
                })
            }
            IdentityStrategy::Domain { suffix } => {
                let domain = format!("{name}{suffix}");
                if existing
                    .iter()
                    .any(|r| r.identity.domain() == Some(domain.as_str()))
                {
                    return Err(CoreError::DomainInUse { domain });
                }
                debug!(%domain, "allocated domain");
                Ok(Identity::Domain(domain))
            }
        }
    }
}

/// Bind-probe a loopback port. The listener is dropped before returning,
/// so the port is released before the caller ever sees it.
pub fn port_is_free(port: u16) -> bool {
    TcpListener::bind((Ipv4Addr::LOCALHOST, port)).is_ok()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::layout::Layout;
    use crate::model::site::tests::sample_record;

    const P: u16 = 8081;

    fn name(n: &str) -> SiteName {
        SiteName::new(n).unwrap()
    }

    fn port_records(ports: &[u16]) -> Vec<SiteRecord> {
        let layout = Layout::new("/base", "/usr/local");
        ports
            .iter()
            .enumerate()
            .map(|(i, p)| sample_record(&layout, &format!("site-{i}"), Identity::Port(*p)))
            .collect()
    }

    fn always_free(_: u16) -> bool {
        true
    }

    #[test]
    fn empty_registry_gets_range_start() {
        let alloc = Allocator::default();
        let id = alloc.allocate_with(&name("a"), &[], always_free).unwrap();
        assert_eq!(id, Identity::Port(P));
    }

    #[test]
    fn skips_ports_claimed_by_registered_sites() {
        let alloc = Allocator::default();
        let existing = port_records(&[P, P + 1, P + 2]);
        let id = alloc.allocate_with(&name("new"), &existing, always_free).unwrap();
        assert_eq!(id, Identity::Port(P + 3));
    }

    #[test]
    fn duplicate_claims_are_skipped_once() {
        let alloc = Allocator::default();
        let existing = port_records(&[P, P, P]);
        let id = alloc.allocate_with(&name("new"), &existing, always_free).unwrap();
        assert_eq!(id, Identity::Port(P + 1));
    }

    #[test]
    fn skips_ports_bound_by_other_processes() {
        let alloc = Allocator::default();
        let id = alloc
            .allocate_with(&name("new"), &[], |port| port != P)
            .unwrap();
        assert_eq!(id, Identity::Port(P + 1));
    }

    #[test]
    fn exhausted_range_is_an_error() {
        let alloc = Allocator::new(IdentityStrategy::Port { range: 9000..=9002 });
        let existing = port_records(&[9000, 9002]);
        let err = alloc
            .allocate_with(&name("new"), &existing, |port| port != 9001)
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::NoIdentityAvailable {
                start: 9000,
                end: 9002
            }
        ));
    }

    #[test]
    fn real_probe_skips_a_bound_port() {
        let held = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let start = held.local_addr().unwrap().port();
        let end = start.saturating_add(32);
        assert!(!port_is_free(start));

        let alloc = Allocator::new(IdentityStrategy::Port { range: start..=end });
        let id = alloc.allocate(&name("new"), &[]).unwrap();
        let port = id.port().unwrap();
        assert_ne!(port, start);
        assert!((start..=end).contains(&port));
        // The probe released the port it returned.
        assert!(port_is_free(port));
    }

    #[test]
    fn domain_is_name_plus_suffix() {
        let alloc = Allocator::new(IdentityStrategy::Domain {
            suffix: DEFAULT_DOMAIN_SUFFIX.into(),
        });
        let id = alloc.allocate_with(&name("blog"), &[], always_free).unwrap();
        assert_eq!(id, Identity::Domain("blog.loc.wp".into()));
    }

    #[test]
    fn domain_collision_is_rejected() {
        let layout = Layout::new("/base", "/usr/local");
        let existing = vec![sample_record(
            &layout,
            "blog",
            Identity::Domain("blog.loc.wp".into()),
        )];
        let alloc = Allocator::new(IdentityStrategy::Domain {
            suffix: DEFAULT_DOMAIN_SUFFIX.into(),
        });
        let err = alloc
            .allocate_with(&name("blog"), &existing, always_free)
            .unwrap_err();
        assert!(matches!(err, CoreError::DomainInUse { domain } if domain == "blog.loc.wp"));
    }
}
