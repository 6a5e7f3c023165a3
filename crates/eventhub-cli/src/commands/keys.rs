//! Signing key generation and rotation.

use anyhow::{Result, anyhow};
use chrono::{DateTime, TimeDelta, Utc};
use eventhub_core::config::RetiredKey;
use eventhub_core::{AuthConfig, Config, SigningSecret};
use eventhub_gateway::auth::{JwtManager, TOKEN_VALIDITY};

use crate::ui;

/// Generate a signing secret, optionally installing it in the config file.
pub fn run_keygen(save: bool) -> Result<()> {
    let secret = JwtManager::generate_hex_secret();

    if !save {
        println!("{secret}");
        return Ok(());
    }

    let path = Config::default_path();
    let mut config = if path.exists() {
        Config::load(&path)?
    } else {
        Config::default()
    };

    let pruned = rotate(&mut config.auth, SigningSecret::new(secret), Utc::now())?;
    config.validate()?;
    config.save(&path)?;

    ui::success(&format!("Signing key saved to {}", path.display()));
    ui::kv("Key version", &config.auth.key_version.to_string());
    if pruned > 0 {
        ui::info(&format!("Dropped {pruned} retired key(s) whose tokens have all expired"));
    }
    if !config.auth.retired_keys.is_empty() {
        ui::info("Tokens signed with the previous key remain valid until they expire");
        ui::info("Remove it from retiredKeys to revoke them immediately");
    }
    Ok(())
}

/// Install `secret` as the active key. A previous secret is retired under
/// its old version and the version is bumped. Retired keys whose last token
/// expired before `now` are dropped; returns how many.
fn rotate(auth: &mut AuthConfig, secret: SigningSecret, now: DateTime<Utc>) -> Result<usize> {
    let validity = TimeDelta::from_std(TOKEN_VALIDITY)?;
    let next_version = if auth.jwt_secret.is_some() {
        Some(auth.key_version.checked_add(1).ok_or_else(|| {
            anyhow!(
                "Key version {} cannot be incremented; reset keyVersion and retiredKeys",
                auth.key_version
            )
        })?)
    } else {
        None
    };

    let before = auth.retired_keys.len();
    auth.retired_keys
        .retain(|key| key.retired_at.is_none_or(|at| at + validity >= now));
    let pruned = before - auth.retired_keys.len();

    if let Some(previous) = auth.jwt_secret.replace(secret) {
        auth.retired_keys.push(RetiredKey {
            version: auth.key_version,
            secret: previous,
            retired_at: Some(now),
        });
    }
    if let Some(version) = next_version {
        auth.key_version = version;
    }
    Ok(pruned)
}
