//! Serve and status commands.

use std::path::PathBuf;

use anyhow::Result;
use eventhub_core::Config;
use eventhub_core::config::BindMode;
use eventhub_gateway::GatewayConfig;

use crate::ui;

/// Serve command arguments.
#[derive(Debug, Clone, Default)]
pub struct ServeArgs {
    /// Port override.
    pub port: Option<u16>,
    /// Bind address override.
    pub bind: Option<String>,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// Start the server and block until Ctrl-C.
pub async fn run_serve(args: ServeArgs) -> Result<()> {
    let path = Config::default_path();
    let config = if path.exists() {
        Config::load(&path)?
    } else {
        ui::warning("No configuration found, using defaults");
        ui::info("Run 'eventhub keygen --save' to create one with a persistent signing secret");
        Config::default()
    };

    let mut gateway_config = GatewayConfig::from(&config);
    if let Some(port) = args.port {
        gateway_config.port = port;
    }
    if let Some(bind) = args.bind {
        gateway_config.bind_address = bind;
    }
    if let Some(data_dir) = args.data_dir {
        gateway_config.data_dir = data_dir;
    }

    ui::header("Starting Eventhub");
    ui::kv(
        "Address",
        &format!("{}:{}", gateway_config.bind_address, gateway_config.port),
    );
    let mode = match &config.server.mode {
        BindMode::Local => "local",
        BindMode::Public => "public",
        BindMode::Custom(_) => "custom",
    };
    ui::kv("Mode", mode);
    ui::kv("Data", &gateway_config.data_dir.display().to_string());
    println!();
    ui::info("Press Ctrl+C to stop");
    println!();

    eventhub_gateway::start(gateway_config).await?;

    Ok(())
}

/// Probe the server's health endpoint.
pub async fn run_status(port: Option<u16>) -> Result<()> {
    ui::header("Server Status");

    let port = match port {
        Some(port) => port,
        None => Config::load_default().map_or(8080, |c| c.server.port),
    };

    let client = reqwest::Client::new();
    match client
        .get(format!("http://127.0.0.1:{port}/health"))
        .timeout(std::time::Duration::from_secs(2))
        .send()
        .await
    {
        Ok(resp) if resp.status().is_success() => {
            ui::success(&format!("Server is running on port {port}"));
            if let Ok(body) = resp.json::<serde_json::Value>().await {
                if let Some(version) = body.get("version").and_then(|v| v.as_str()) {
                    ui::kv("Version", version);
                }
                if let Some(status) = body.get("status").and_then(|v| v.as_str()) {
                    ui::kv("Status", status);
                }
            }
        }
        Ok(resp) => {
            ui::warning(&format!("Health check returned {}", resp.status()));
        }
        Err(e) => {
            tracing::debug!(error = %e, "Health check failed");
            ui::warning(&format!("Server is not running on port {port}"));
            ui::info("Start with: eventhub serve");
        }
    }

    Ok(())
}
