// ── Domain model ──
//
// The persisted site record and the validated identifiers it is keyed
// by. Everything else in the crate is derived from these.

pub mod identity;
pub mod site;

// ── Re-exports ──────────────────────────────────────────────────────

pub use identity::{Identity, MAX_NAME_LEN, SiteName};
pub use site::{AdminAccount, SiteRecord, SiteSpec};
