//! Bearer credential with expiry derived from the token itself

use base64::engine::general_purpose::{STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::error::{RedquillError, Result};

/// The claims the platform embeds in the payload segment of its tokens.
#[derive(Debug, Deserialize)]
struct TokenClaims {
    #[serde(rename = "tenantId", default)]
    tenant_id: i64,
    exp: i64,
}

/// An issued bearer token, its decoded expiry, and the tenant it grants.
///
/// The expiry is always extracted from the token's embedded claims, never
/// supplied independently, so the two can never disagree. A credential is
/// created by a successful login or MFA completion and replaced wholesale
/// by a successful renewal; it is never partially mutated.
#[derive(Debug, Clone)]
pub struct Credential {
    /// Opaque bearer string sent on every authenticated request.
    pub token: String,
    /// Absolute expiry extracted from the token's `exp` claim.
    pub expires_at: DateTime<Utc>,
    /// Integer tenant identity scoping all subsequent requests.
    pub tenant_id: i64,
}

impl Credential {
    /// Decode the token's claims and build a credential from them.
    ///
    /// # Errors
    /// Returns a decode error if the token is not a JWT, its payload
    /// segment is not valid base64, or the claims are not the expected
    /// shape.
    pub fn from_token(token: &str) -> Result<Self> {
        let payload = token
            .split('.')
            .nth(1)
            .ok_or_else(|| RedquillError::Decode("auth token is not a JWT".to_string()))?;

        let raw = decode_segment(payload)?;

        let claims: TokenClaims = serde_json::from_slice(&raw).map_err(|e| {
            RedquillError::Decode(format!("auth token claims aren't the expected format: {e}"))
        })?;

        let expires_at = DateTime::from_timestamp(claims.exp, 0).ok_or_else(|| {
            RedquillError::Decode(format!("auth token expiry {} is out of range", claims.exp))
        })?;

        debug!(exp = claims.exp, %expires_at, tenant_id = claims.tenant_id, "decoded auth token");

        Ok(Self { token: token.to_string(), expires_at, tenant_id: claims.tenant_id })
    }

    /// Whether the current time is at or past the token expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Decode one JWT segment, tolerating both base64 alphabets.
///
/// Tokens from the platform have been observed with both url-safe and
/// standard alphabets; padding is stripped before decoding.
fn decode_segment(segment: &str) -> Result<Vec<u8>> {
    let trimmed = segment.trim_end_matches('=');
    URL_SAFE_NO_PAD
        .decode(trimmed)
        .or_else(|_| STANDARD_NO_PAD.decode(trimmed))
        .map_err(|e| RedquillError::Decode(format!("unable to decode token payload: {e}")))
}
