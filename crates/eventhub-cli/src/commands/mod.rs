//! CLI command implementations.

pub mod config;
pub mod keys;
pub mod serve;
pub mod users;

pub use config::run_config;
pub use keys::run_keygen;
pub use serve::{run_serve, run_status};
pub use users::run_user;
