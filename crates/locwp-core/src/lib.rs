// locwp-core: site registry, identity allocation, vhost state and
// workflow generation for local WordPress sites.

pub mod allocator;
pub mod error;
pub mod executor;
pub mod layout;
pub mod manager;
pub mod model;
pub mod registry;
pub mod status;
pub mod template;
pub mod vhost;
pub mod workflow;

// ── Primary re-exports ──────────────────────────────────────────────
pub use allocator::{Allocator, IdentityStrategy};
pub use error::CoreError;
pub use executor::{Executor, ProcessExecutor};
pub use layout::Layout;
pub use manager::{AddSite, SiteManager, SiteRow};
pub use registry::{Registry, RegistryLock};
pub use status::SiteStatus;
pub use vhost::{VhostState, Vhosts};
pub use workflow::{Workflow, WorkflowDefinition};

pub use model::{AdminAccount, Identity, SiteName, SiteRecord, SiteSpec};
