//! Session configuration
//!
//! The TOML-parsable shape a consumer (CLI, service) loads its
//! connection settings from. File discovery and merging stay with the
//! caller; this module only defines the structure and its conversion
//! into [`SessionOptions`].

use serde::{Deserialize, Serialize};

use crate::auth::SessionOptions;
use crate::error::{RedquillError, Result};

/// Connection settings for one platform instance.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ClientConfig {
    /// Host of the platform instance.
    pub instance_url: String,
    /// Login username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Login password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Explicit MFA code, overriding seed derivation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_code: Option<String>,
    /// Shared TOTP seed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfa_seed: Option<String>,
    /// Previously issued bearer token to reuse if still valid.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl ClientConfig {
    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    /// Returns a configuration error describing the parse failure.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| RedquillError::Config(format!("unable to parse configuration: {e}")))
    }

    /// Convert into the inputs for [`crate::Session::open`].
    #[must_use]
    pub fn into_options(self) -> SessionOptions {
        SessionOptions {
            instance_url: self.instance_url,
            username: self.username,
            password: self.password,
            mfa_code: self.mfa_code,
            mfa_seed: self.mfa_seed,
            auth_token: self.auth_token,
            on_renew: None,
        }
    }
}
