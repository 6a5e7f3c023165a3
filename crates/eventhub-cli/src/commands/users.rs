//! User management commands.
//!
//! These open the database directly, so the server must not be running.

use std::path::PathBuf;

use anyhow::Context;
use eventhub_core::validation::{validate_email, validate_password};
use eventhub_core::{Config, CredentialStore, Database, UserStore};
use eventhub_gateway::auth::{Argon2Hasher, CredentialHasher};

use crate::ui;

/// Arguments for user commands.
pub struct UserArgs {
    /// The action to perform.
    pub action: UserAction,
    /// Data directory override.
    pub data_dir: Option<PathBuf>,
}

/// User actions.
pub enum UserAction {
    /// Create a new user.
    Create {
        email: String,
        password: Option<String>,
    },
    /// List all users.
    List,
}

/// Run a user command.
///
/// # Errors
///
/// Returns error if the database is locked or the operation fails.
pub fn run_user(args: UserArgs) -> anyhow::Result<()> {
    let config = Config::load_default()?;
    let data_dir = args.data_dir.unwrap_or_else(|| config.data_dir());
    std::fs::create_dir_all(&data_dir)?;

    let db = Database::open(&data_dir)
        .with_context(|| format!("Failed to open database in {} (is the server running?)", data_dir.display()))?;
    let store = db.users()?;

    match args.action {
        UserAction::Create { email, password } => {
            let hasher = Argon2Hasher::new(&config.auth.password_hashing)?;
            create_user(&store, &hasher, &email, password)?;
        }
        UserAction::List => list_users(&store)?,
    }

    db.flush()?;
    Ok(())
}

fn create_user(
    store: &UserStore,
    hasher: &dyn CredentialHasher,
    email: &str,
    password: Option<String>,
) -> anyhow::Result<()> {
    let email = validate_email(email)?;
    let password = match password {
        Some(password) => password,
        None => ui::prompts::new_password("Password")?,
    };
    validate_password(&password)?;

    let hash = hasher.hash(&password)?;
    let id = store
        .create_credential(&email, &hash)
        .map_err(|e| anyhow::anyhow!("Failed to create user: {}", e))?;

    ui::success(&format!("Created user '{email}' with id {id}"));
    Ok(())
}

fn list_users(store: &UserStore) -> anyhow::Result<()> {
    let users = store
        .list()
        .map_err(|e| anyhow::anyhow!("Failed to list users: {}", e))?;

    if users.is_empty() {
        ui::info("No users yet.");
        ui::info("Run 'eventhub user create --email <email>' to add one.");
        return Ok(());
    }

    ui::info(&format!("Users ({}):", users.len()));
    println!();
    println!("{:<8} {:<40} {:<24}", "ID", "EMAIL", "CREATED");
    println!("{}", "-".repeat(72));

    for user in users {
        let created = user.created_at.format("%Y-%m-%d %H:%M:%S");
        println!("{:<8} {:<40} {:<24}", user.id.to_string(), user.email, created);
    }

    Ok(())
}
