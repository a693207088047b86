// ── Site identity types ──
//
// SiteName is the registry key; Identity is the network handle a site
// is reachable at. Both are validated on construction and on load, so
// every other module can take them at face value.

use std::fmt;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::CoreError;

/// Longest name whose database name (`wp_<name>`) still fits MariaDB's
/// 64-character identifier limit.
pub const MAX_NAME_LEN: usize = 61;

/// Port nginx serves TLS domains on.
const HTTPS_PORT: u16 = 443;

// ── SiteName ────────────────────────────────────────────────────────

/// Validated site name: lowercase ASCII letters, digits and hyphens,
/// never starting or ending with a hyphen.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SiteName(String);

impl SiteName {
    pub fn new(raw: impl Into<String>) -> Result<Self, CoreError> {
        let raw = raw.into();
        let invalid = |reason: &str| CoreError::InvalidName {
            name: raw.clone(),
            reason: reason.into(),
        };

        if raw.is_empty() {
            return Err(invalid("name cannot be empty"));
        }
        if raw.len() > MAX_NAME_LEN {
            return Err(invalid(&format!(
                "name is longer than {MAX_NAME_LEN} characters"
            )));
        }
        if !raw
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-')
        {
            return Err(invalid(
                "only lowercase letters, digits, and hyphens allowed",
            ));
        }
        if raw.starts_with('-') || raw.ends_with('-') {
            return Err(invalid("cannot start or end with a hyphen"));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Database name derived from the site name: `wp_` + name, with
    /// hyphens (not valid in unquoted identifiers) mapped to underscores.
    pub fn database_name(&self) -> String {
        format!("wp_{}", self.0.replace('-', "_"))
    }
}

impl fmt::Display for SiteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SiteName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for SiteName {
    type Error = CoreError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<SiteName> for String {
    fn from(name: SiteName) -> Self {
        name.0
    }
}

impl AsRef<str> for SiteName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ── Identity ────────────────────────────────────────────────────────

/// The unique network-reachable handle for a site.
///
/// Flattened into the site record, so a port site persists as
/// `"port": 8081` and a domain site as `"domain": "blog.loc.wp"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Identity {
    Port(u16),
    Domain(String),
}

impl Identity {
    pub fn port(&self) -> Option<u16> {
        match self {
            Self::Port(p) => Some(*p),
            Self::Domain(_) => None,
        }
    }

    pub fn domain(&self) -> Option<&str> {
        match self {
            Self::Domain(d) => Some(d),
            Self::Port(_) => None,
        }
    }

    /// Browser URL for the site.
    pub fn url(&self) -> Result<Url, url::ParseError> {
        match self {
            Self::Port(p) => Url::parse(&format!("http://localhost:{p}/")),
            Self::Domain(d) => Url::parse(&format!("https://{d}/")),
        }
    }

    /// Host part used by WordPress as its site URL (`localhost:8081` or the domain).
    pub fn host(&self) -> String {
        match self {
            Self::Port(p) => format!("localhost:{p}"),
            Self::Domain(d) => d.clone(),
        }
    }

    /// Loopback address a reachability probe connects to.
    pub fn probe_addr(&self) -> SocketAddr {
        let port = match self {
            Self::Port(p) => *p,
            Self::Domain(_) => HTTPS_PORT,
        };
        SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Port(p) => write!(f, "port {p}"),
            Self::Domain(d) => f.write_str(d),
        }
    }
}
