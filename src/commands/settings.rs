//! Settings command handlers: show, locate or reset stored settings.

use anyhow::{Context, Result};
use archive_fetch::{JsonSettingsStore, SettingsStore};

use crate::cli::SettingsAction;

pub fn run_settings_command(action: SettingsAction) -> Result<()> {
    let store = JsonSettingsStore::default_location()?;
    match action {
        SettingsAction::Show => {
            let settings = store.load();
            println!("settings_path = {}", store.path().display());
            println!(
                "settings_file = {}",
                if store.exists() {
                    "loaded"
                } else {
                    "not found (using defaults)"
                }
            );
            println!(
                "{}",
                serde_json::to_string_pretty(&settings).context("cannot render settings")?
            );
        }
        SettingsAction::Path => println!("{}", store.path().display()),
        SettingsAction::Reset => {
            store.reset()?;
            println!("Settings reset to defaults ({})", store.path().display());
        }
    }
    Ok(())
}
