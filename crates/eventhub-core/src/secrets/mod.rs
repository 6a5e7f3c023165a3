//! Secret values that must never reach logs.
//!
//! `SigningSecret` wraps token signing key material (hex-encoded).

use secrecy::{ExposeSecret, SecretBox};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hex-encoded signing key that prevents accidental logging.
///
/// The inner value is wrapped with `secrecy::SecretBox` so `Debug` and
/// `Display` never print it.
#[derive(Clone)]
pub struct SigningSecret(SecretBox<str>);

impl SigningSecret {
    /// Create a new signing secret from its hex form.
    #[must_use]
    pub fn new(hex_key: String) -> Self {
        Self(SecretBox::new(hex_key.into_boxed_str()))
    }

    /// Expose the hex string.
    ///
    /// Use sparingly - only when building signing keys or persisting config.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    /// Decode the key bytes.
    ///
    /// # Errors
    ///
    /// Returns error if the secret is not valid hex.
    pub fn decode(&self) -> Result<Vec<u8>, hex::FromHexError> {
        hex::decode(self.expose())
    }
}

impl std::fmt::Debug for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SigningSecret([REDACTED])")
    }
}

impl std::fmt::Display for SigningSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl Serialize for SigningSecret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for SigningSecret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}
