//! Clap derive structures for the `locwp` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.
//! Also compiled by `build.rs` for man pages, so it depends on clap only.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// locwp -- local WordPress sites on nginx + PHP-FPM + MariaDB
#[derive(Debug, Parser)]
#[command(
    name = "locwp",
    version,
    about = "Manage local WordPress development sites",
    long_about = "Create, start, stop and delete local WordPress sites.\n\n\
        Each site gets its own port (or .loc.wp domain), nginx vhost, PHP-FPM\n\
        pool and database. Provisioning steps run through the pawl workflow\n\
        runner from the site directory.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'o', default_value = "table", global = true)]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new site and provision it
    Add(AddArgs),

    /// Enable a site's vhost and start its services
    Start(SiteArgs),

    /// Disable a site's vhost
    Stop(SiteArgs),

    /// Tear down a site and remove all of its files
    #[command(alias = "rm")]
    Delete(SiteArgs),

    /// List all sites with their status
    #[command(alias = "ls")]
    List,

    /// Show whether a site is running
    Status(SiteArgs),

    /// Run WP-CLI inside a site
    Wp(WpArgs),

    /// Inspect and initialize locwp settings
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Site commands ────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SiteArgs {
    /// Site name
    pub name: String,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Site name (lowercase letters, digits and hyphens)
    pub name: String,

    /// PHP version (defaults to the `php` setting)
    #[arg(long)]
    pub php: Option<String>,

    /// Create the site without running the provision workflow
    #[arg(long)]
    pub no_start: bool,

    /// WordPress admin username
    #[arg(long, default_value = "admin")]
    pub user: String,

    /// WordPress admin password
    #[arg(long, default_value = "admin")]
    pub pass: String,

    /// WordPress admin email
    #[arg(long, default_value = "admin@loc.wp")]
    pub email: String,
}

#[derive(Debug, Args)]
pub struct WpArgs {
    /// Site name
    pub name: String,

    /// Arguments passed through to `wp`
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub args: Vec<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show effective settings (defaults, config file and environment)
    Show,

    /// Print the config file path
    Path,

    /// Write the effective settings to the config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
