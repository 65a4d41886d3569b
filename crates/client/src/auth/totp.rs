//! Time-based one-time code generation for the second login factor

use chrono::{DateTime, Utc};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::error::{RedquillError, Result};

const DIGITS: usize = 6;
const STEP_SECONDS: u64 = 30;

/// Generate the 6-digit code for `seed` at `now`.
///
/// Matches the standard authenticator-app algorithm (SHA-1, 30-second
/// step) so a seed shared with the platform produces the same codes an
/// enrolled device would. Pure function of its inputs: no state, no side
/// effects, safe to call concurrently and to unit test with fixed times.
///
/// # Errors
/// Returns [`RedquillError::Seed`] if the seed cannot be decoded as a
/// base32 shared secret.
pub fn generate(seed: &str, now: DateTime<Utc>) -> Result<String> {
    let secret = Secret::Encoded(seed.trim().to_ascii_uppercase())
        .to_bytes()
        .map_err(|e| RedquillError::Seed(format!("{e:?}")))?;

    let totp = TOTP::new(Algorithm::SHA1, DIGITS, 1, STEP_SECONDS, secret)
        .map_err(|e| RedquillError::Seed(format!("{e:?}")))?;

    // Times before the epoch can't occur from a live clock; clamp rather
    // than fail so a skewed test clock still produces a code.
    let timestamp = now.timestamp().max(0) as u64;

    Ok(totp.generate(timestamp))
}
