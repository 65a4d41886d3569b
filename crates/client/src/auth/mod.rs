//! Authenticated session management
//!
//! Owns the platform credential lifecycle:
//!
//! - **Login**: password authentication plus the optional TOTP second
//!   factor, with the code derived from a shared seed when the caller
//!   does not supply one.
//! - **Proactive renewal**: the bearer token is refreshed shortly before
//!   expiry, serialized against concurrent callers, and swapped in
//!   atomically so in-flight requests are never interrupted.
//! - **Renewal hook**: an optional callback receives every renewed token
//!   (e.g. to persist it for the next invocation); hook failures are
//!   warnings, never errors.
//!
//! ```text
//! ┌──────────────┐
//! │   Session    │  login / check_expired / request
//! └──────┬───────┘
//!        ├──► Credential   (token + expiry + tenant, derived from claims)
//!        ├──► totp         (time-based second-factor codes)
//!        └──► RenewalHook  (external persistence, warning-only failures)
//! ```

pub mod credential;
pub mod session;
pub mod totp;

pub use credential::Credential;
pub use session::{RenewalHook, Session, SessionOptions, RENEWAL_LEAD_SECONDS};
