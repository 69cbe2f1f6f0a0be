//! CLI command handlers.

mod run;
mod settings;

pub use run::run_archive_command;
pub use settings::run_settings_command;
