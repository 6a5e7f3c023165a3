//! Config show/validate command.

use std::path::Path;

use anyhow::Result;
use eventhub_core::Config;
use serde_json::Value;

use crate::ui;

const REDACTED: &str = "[REDACTED]";

/// Config actions.
#[derive(Debug, Clone, Copy)]
pub enum ConfigAction {
    /// Print the effective configuration with secrets redacted.
    Show,
    /// Load and validate the config file.
    Validate,
    /// Print the config file path.
    Path,
}

/// Run the config command.
pub fn run_config(action: ConfigAction) -> Result<()> {
    let path = Config::default_path();

    match action {
        ConfigAction::Show => show_config(&path),
        ConfigAction::Validate => validate_config(&path),
        ConfigAction::Path => {
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn show_config(path: &Path) -> Result<()> {
    let config = if path.exists() {
        Config::load(path)?
    } else {
        ui::warning(&format!("Config file not found: {}", path.display()));
        ui::info("Showing defaults");
        Config::default()
    };

    let mut value = serde_json::to_value(&config)?;
    redact_secrets(&mut value);
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}

/// Blank out signing secrets, active and retired.
fn redact_secrets(value: &mut Value) {
    let Some(auth) = value.get_mut("auth").and_then(Value::as_object_mut) else {
        return;
    };

    if let Some(secret) = auth.get_mut("jwtSecret") {
        *secret = Value::String(REDACTED.to_string());
    }

    if let Some(Value::Array(retired)) = auth.get_mut("retiredKeys") {
        for key in retired {
            if let Some(secret) = key.get_mut("secret") {
                *secret = Value::String(REDACTED.to_string());
            }
        }
    }
}

fn validate_config(path: &Path) -> Result<()> {
    ui::header("Validating Configuration");

    if !path.exists() {
        ui::error(&format!("Config file not found: {}", path.display()));
        return Ok(());
    }

    match Config::load(path).and_then(|config| config.validate().map(|()| config)) {
        Ok(config) => {
            ui::success("Configuration is valid");
            if config.auth.jwt_secret.is_none() {
                ui::warning("No signing secret set, tokens will not survive a restart");
                ui::info("Run 'eventhub keygen --save' to create one");
            }
        }
        Err(e) => {
            ui::error(&format!("{e}"));
            anyhow::bail!("invalid configuration");
        }
    }

    Ok(())
}
