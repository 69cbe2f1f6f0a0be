//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Download every archive of a paginated listing, one file per listing row.
///
/// Archive links served from any known mirror are rewritten to one canonical
/// host, transient failures are retried, and failed downloads can be retried
/// on their own without walking the listing again.
#[derive(Parser, Debug)]
#[command(name = "archive-fetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Walk a listing and download every archive on it
    Run(RunArgs),

    /// Inspect or reset stored settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
}

/// Arguments of `archive-fetch run`.
///
/// Unset tuning flags fall back to the stored settings.
#[derive(Args, Debug, Clone)]
#[command(group(
    clap::ArgGroup::new("source")
        .required(true)
        .args(["listing_url", "manifest"])
))]
pub struct RunArgs {
    /// First page of the archive listing
    #[arg(long, value_name = "URL")]
    pub listing_url: Option<String>,

    /// JSON manifest of pre-extracted pages instead of a live listing
    #[arg(long, value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Directory downloaded archives are written to
    #[arg(short = 'o', long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Delay between downloads on a page in milliseconds (max 60000)
    #[arg(short = 'd', long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub delay: Option<u64>,

    /// Delay between listing pages in milliseconds (max 60000)
    #[arg(long, value_parser = clap::value_parser!(u64).range(0..=60000))]
    pub page_delay: Option<u64>,

    /// Network attempts per archive, including the first (1-10)
    #[arg(short = 'r', long, value_parser = clap::value_parser!(u32).range(1..=10))]
    pub max_retries: Option<u32>,

    /// Prefix of saved file names
    #[arg(long)]
    pub prefix: Option<String>,

    /// Host every mirror link is rewritten to (defaults to the listing's host)
    #[arg(long, value_name = "HOST")]
    pub canonical_host: Option<String>,

    /// Retry passes over failed downloads after the run ends (0-10)
    #[arg(long, default_value_t = 0, value_parser = clap::value_parser!(u8).range(0..=10))]
    pub retry_failed: u8,

    /// Do not announce run milestones
    #[arg(long)]
    pub no_notify: bool,

    /// Ignore control commands on stdin
    #[arg(long)]
    pub no_input: bool,

    /// Store the effective tuning flags as the new settings
    #[arg(long)]
    pub save: bool,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsAction {
    /// Print the effective settings as JSON
    Show,
    /// Print the settings file path
    Path,
    /// Delete the settings file so defaults apply
    Reset,
}
