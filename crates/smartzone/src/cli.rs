//! Clap derive structures for the `smartzone` CLI.
//!
//! Defines the command tree, global flags, and shared value types.

use std::path::PathBuf;

use clap::builder::{PossibleValue, PossibleValuesParser, TypedValueParser};
use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use smartzone_core::ResourceKind;
use strum::IntoEnumIterator;

// ── Top-Level CLI ────────────────────────────────────────────────────

/// smartzone -- declarative configuration for Ruckus SmartZone controllers
#[derive(Debug, Parser)]
#[command(
    name = "smartzone",
    version,
    about = "Reconcile SmartZone controller objects from desired-state files",
    long_about = "Drives a SmartZone (vSZ) controller toward a declared state.\n\n\
        Each run observes the live object, computes the minimal change, and\n\
        issues at most one create, update or delete for it. --check reports\n\
        what would change without writing.",
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
    /// Controller profile to use
    #[arg(long, short = 'p', env = "SMARTZONE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Controller URL (overrides profile)
    #[arg(long, short = 'c', env = "SMARTZONE_CONTROLLER", global = true)]
    pub controller: Option<String>,

    /// Admin username (overrides profile)
    #[arg(long, short = 'u', env = "SMARTZONE_USERNAME", global = true)]
    pub username: Option<String>,

    /// Admin password (prefer SMARTZONE_PASSWORD or the keyring)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Output format [default: config `defaults.output`, else json]
    #[arg(long, short = 'o', env = "SMARTZONE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "SMARTZONE_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "SMARTZONE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

impl GlobalOpts {
    /// The output format in effect.
    pub fn format(&self) -> OutputFormat {
        self.output.unwrap_or_default()
    }
}

// ── Output Enum ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Json,
    /// YAML
    Yaml,
    /// Pretty table
    Table,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconcile one desired-state document against the controller
    Apply(ApplyArgs),

    /// Show one object (or a settings object) as the controller holds it
    Get(GetArgs),

    /// List every object of a kind
    #[command(alias = "ls")]
    List(ListArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Subcommand Args ──────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ApplyArgs {
    /// Desired-state document (YAML or JSON)
    #[arg(long, short = 'f')]
    pub file: PathBuf,

    /// Report what would change without writing
    #[arg(long)]
    pub check: bool,

    /// Include before/after states when something changed
    #[arg(long)]
    pub diff: bool,
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Object kind
    #[arg(value_parser = kind_parser())]
    pub kind: ResourceKind,

    /// Object name (omit for settings objects)
    pub name: Option<String>,

    /// Zone holding the object (zone-scoped kinds)
    #[arg(long, short = 'z')]
    pub zone: Option<String>,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Object kind
    #[arg(value_parser = kind_parser())]
    pub kind: ResourceKind,

    /// Zone holding the objects (zone-scoped kinds)
    #[arg(long, short = 'z')]
    pub zone: Option<String>,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Target shell
    pub shell: Shell,
}

/// Accepts the kebab-case kind names and lists them in `--help`.
fn kind_parser() -> impl TypedValueParser<Value = ResourceKind> {
    PossibleValuesParser::new(ResourceKind::iter().map(|kind| PossibleValue::new(kind.to_string())))
        .try_map(|name| name.parse::<ResourceKind>())
}
