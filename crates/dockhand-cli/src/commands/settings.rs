//! Backend settings and local configuration commands

use anyhow::{bail, Result};
use dockhand_api::{
    parse_interval, AppSettings, AppSettingsPatch, AutoUpdaterPatch, ServerSettingsPatch,
};
use dockhand_config::GlobalConfig;
use dockhand_core::StackManager;

/// Print the backend's settings document.
pub async fn settings_show(manager: &StackManager) -> Result<()> {
    let settings = manager.backend().get_settings().await?;
    print_settings(&settings);
    Ok(())
}

/// Field-by-field changes for `settings set`. `None` leaves the backend
/// value untouched.
#[derive(Debug, Default)]
pub struct SettingsUpdate {
    pub auto_update: Option<bool>,
    pub auto_update_interval: Option<String>,
    pub max_concurrent: Option<u32>,
    pub dryrun: Option<bool>,
    pub cache_max_age: Option<String>,
    pub mature_after: Option<String>,
}

/// Patch the backend settings with the given fields.
pub async fn settings_set(manager: &StackManager, update: SettingsUpdate) -> Result<()> {
    for interval in [
        &update.auto_update_interval,
        &update.cache_max_age,
        &update.mature_after,
    ]
    .into_iter()
    .flatten()
    {
        if parse_interval(interval).is_none() {
            bail!(
                "Invalid interval '{}': use forms like 45s, 30m, 12h, 1d or 1w",
                interval
            );
        }
    }

    let mut patch = AppSettingsPatch::default();
    if update.auto_update.is_some()
        || update.auto_update_interval.is_some()
        || update.max_concurrent.is_some()
    {
        patch.auto_updater = Some(AutoUpdaterPatch {
            enabled: update.auto_update,
            interval: update.auto_update_interval,
            max_concurrent: update.max_concurrent,
        });
    }
    if update.dryrun.is_some() || update.cache_max_age.is_some() || update.mature_after.is_some() {
        patch.server = Some(ServerSettingsPatch {
            cache_control_max_age: update.cache_max_age,
            dryrun: update.dryrun,
            ignore_compose_stack_name_keywords: None,
            time_until_update_is_mature: update.mature_after,
        });
    }
    if patch.auto_updater.is_none() && patch.server.is_none() {
        bail!("Nothing to change. See 'dockhand settings set --help' for the available options.");
    }

    let settings = manager.backend().patch_settings(&patch).await?;
    println!("Settings updated");
    println!();
    print_settings(&settings);
    Ok(())
}

fn print_settings(settings: &AppSettings) {
    println!("Auto updater (runs on the backend)");
    println!("  enabled:         {}", settings.auto_updater.enabled);
    println!("  interval:        {}", settings.auto_updater.interval);
    println!("  max concurrent:  {}", settings.auto_updater.max_concurrent);
    println!();
    println!("Server");
    println!(
        "  cache max age:   {}",
        settings.server.cache_control_max_age
    );
    println!("  dryrun:          {}", settings.server.dryrun);
    println!(
        "  update maturity: {}",
        settings.server.time_until_update_is_mature
    );
    println!(
        "  ignored stacks:  {}",
        settings.server.ignore_compose_stack_name_keywords.join(", ")
    );
    println!(
        "  homepage labels: {}",
        settings.server.possible_homepage_labels.join(", ")
    );
    println!(
        "  version labels:  {}",
        settings.server.possible_image_version_labels.join(", ")
    );
}

/// Show the local configuration, or open it in `$EDITOR`.
pub async fn config(edit: bool) -> Result<()> {
    let path = GlobalConfig::config_path()?;

    if edit {
        // Seed the file so the editor has something to start from
        if !path.exists() {
            GlobalConfig::default().save_to(&path)?;
            println!("Created {}", path.display());
        }

        let editor = std::env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());
        let status = std::process::Command::new(&editor).arg(&path).status()?;
        if !status.success() {
            bail!("Editor exited with an error, config not validated");
        }

        // Reject unparseable edits right away instead of at next startup
        GlobalConfig::load_from(&path)?;
        println!("Configuration updated");
        return Ok(());
    }

    let config = GlobalConfig::load()?;
    println!("# {}", path.display());
    println!();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}
