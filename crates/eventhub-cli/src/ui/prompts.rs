//! Interactive prompt utilities.

use dialoguer::{Password, theme::ColorfulTheme};

/// Prompt for a new password, hidden and entered twice.
pub fn new_password(prompt: &str) -> Result<String, dialoguer::Error> {
    Password::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
}
