//! Eventhub CLI - run and administer the Eventhub server.

mod commands;
mod ui;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "eventhub")]
#[command(about = "Eventhub - events and registrations service")]
#[command(version)]
#[command(propagate_version = true)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Bind address (IP or hostname)
        #[arg(long)]
        bind: Option<String>,

        /// Data directory override
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Check whether the server is running
    Status {
        /// Port to probe (defaults to the configured port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Generate a token signing secret
    Keygen {
        /// Write the secret to the config file, retiring the current one
        #[arg(long)]
        save: bool,
    },

    /// User management
    User {
        #[command(subcommand)]
        action: UserCommands,

        /// Data directory override
        #[arg(long, global = true)]
        data_dir: Option<PathBuf>,
    },

    /// Configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum UserCommands {
    /// Create a user
    Create {
        /// Email address
        #[arg(long)]
        email: String,

        /// Password (prompted for if omitted)
        #[arg(long, env = "EVENTHUB_USER_PASSWORD", hide_env_values = true)]
        password: Option<String>,
    },

    /// List all users
    List,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the configuration with secrets redacted
    Show,

    /// Validate the configuration file
    Validate,

    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over --verbose
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        }
    });

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false))
        .with(filter)
        .init();

    match cli.command {
        Commands::Serve {
            port,
            bind,
            data_dir,
        } => {
            commands::run_serve(commands::serve::ServeArgs {
                port,
                bind,
                data_dir,
            })
            .await?;
        }

        Commands::Status { port } => {
            commands::run_status(port).await?;
        }

        Commands::Keygen { save } => {
            commands::run_keygen(save)?;
        }

        Commands::User { action, data_dir } => {
            let action = match action {
                UserCommands::Create { email, password } => {
                    commands::users::UserAction::Create { email, password }
                }
                UserCommands::List => commands::users::UserAction::List,
            };
            commands::run_user(commands::users::UserArgs { action, data_dir })?;
        }

        Commands::Config { action } => {
            let action = match action {
                None | Some(ConfigCommands::Show) => commands::config::ConfigAction::Show,
                Some(ConfigCommands::Validate) => commands::config::ConfigAction::Validate,
                Some(ConfigCommands::Path) => commands::config::ConfigAction::Path,
            };
            commands::run_config(action)?;
        }
    }

    Ok(())
}
