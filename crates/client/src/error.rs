//! Error types used throughout the client
//!
//! Every fallible operation in this crate returns [`Result`], and every
//! operation that can partially succeed returns a [`Warned`] value inside
//! it: hard errors abort the calling operation, soft [`Warning`]s are
//! accumulated alongside the successful result so the caller can decide
//! how to surface them (log, ignore, or escalate).

use std::fmt;

use thiserror::Error;

/// Main error type for the client
#[derive(Error, Debug)]
pub enum RedquillError {
    /// Insufficient credentials or instance URL supplied; never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// The service rejected the supplied credentials or MFA code.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The TOTP seed could not be decoded as a shared secret.
    #[error("invalid TOTP seed: {0}")]
    Seed(String),

    /// Network or HTTP-layer failure; surfaced as-is, never retried here.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response envelope was unparsable or a required field was missing.
    #[error("decode error: {0}")]
    Decode(String),

    /// The service reported an error envelope outside the login flow.
    #[error("service error: {0}")]
    Api(String),

    /// A partial-name lookup matched nothing.
    #[error("{0} not found")]
    NotFound(String),

    /// A partial-name lookup matched more than one candidate.
    #[error("multiple {0} match")]
    Ambiguous(String),
}

impl From<reqwest::Error> for RedquillError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Result type alias for client operations
pub type Result<T, E = RedquillError> = std::result::Result<T, E>;

/// A non-fatal problem encountered while an operation otherwise succeeded.
///
/// Warnings never abort the operation that produced them; they accumulate
/// through every layer (decoder, entity, session) and reach the caller
/// attached to the successful value via [`Warned`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning(String);

impl Warning {
    /// Create a new warning from any displayable message.
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    /// The warning message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A successful value together with the warnings collected on the way.
///
/// Models the "soft warnings accumulate, hard errors abort" duality as one
/// carrier instead of two independently-threaded return channels.
#[derive(Debug)]
pub struct Warned<T> {
    /// The successful result.
    pub value: T,
    /// Warnings collected while producing it, in encounter order.
    pub warnings: Vec<Warning>,
}

impl<T> Warned<T> {
    /// Wrap a value produced without warnings.
    pub fn clean(value: T) -> Self {
        Self { value, warnings: Vec::new() }
    }

    /// Wrap a value together with the warnings it was produced with.
    pub fn new(value: T, warnings: Vec<Warning>) -> Self {
        Self { value, warnings }
    }

    /// Map the value, keeping the warnings.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Warned<U> {
        Warned { value: f(self.value), warnings: self.warnings }
    }

    /// Split into the value and its warnings.
    pub fn split(self) -> (T, Vec<Warning>) {
        (self.value, self.warnings)
    }

    /// Take the value, appending its warnings onto an existing collection.
    pub fn drain_into(self, warnings: &mut Vec<Warning>) -> T {
        warnings.extend(self.warnings);
        self.value
    }
}
