use anyhow::Result;
use clap::Parser;
use tracing::debug;

use crate::ProcessExit;
use crate::app::terminal;
use crate::cli::{Cli, Command};
use crate::commands;

pub(crate) async fn run_archive_fetch() -> Result<ProcessExit> {
    let cli = Cli::parse();

    let no_color = terminal::should_disable_color(
        cli.no_color,
        terminal::no_color_env_requested(),
        terminal::is_dumb_terminal(),
    );
    terminal::init_tracing(terminal::default_log_level(cli.quiet, cli.verbose), no_color);
    debug!(?cli, "CLI arguments parsed");

    match cli.command {
        Command::Run(args) => commands::run_archive_command(args, cli.quiet).await,
        Command::Settings { action } => {
            commands::run_settings_command(action)?;
            Ok(ProcessExit::Success)
        }
    }
}
