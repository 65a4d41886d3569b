//! # Redquill Client
//!
//! Client library for a multi-tenant report-management platform:
//! authenticated sessions with proactive token renewal, a TOTP second
//! factor, and resilient decoding of the platform's loosely-typed API
//! payloads into typed domain entities.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │   Session    │  credential lifecycle, serialized renewal, requests
//! └──────┬───────┘
//!        │
//!        ├──► auth::Credential   (token + expiry derived from claims)
//!        ├──► auth::totp         (second-factor code derivation)
//!        │
//!        ├──► decode             (field-table driven record decoding)
//!        │
//!        └──► entities           (Client / Report / Finding / User,
//!                                 lazy detail materialization)
//! ```
//!
//! Every fallible operation returns `Result<Warned<T>>`: hard errors
//! abort the calling operation, soft warnings (unreadable fields, hook
//! failures) ride along with the successful value so the caller decides
//! how to surface them.
//!
//! ## Usage
//!
//! ```no_run
//! use redquill_client::{Session, SessionOptions};
//!
//! # async fn example() -> redquill_client::Result<()> {
//! let opened = Session::open(SessionOptions {
//!     instance_url: "reports.example.com".to_string(),
//!     username: Some("auditor".to_string()),
//!     password: Some("hunter2".to_string()),
//!     mfa_seed: Some("JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP".to_string()),
//!     ..SessionOptions::default()
//! })
//! .await?;
//!
//! for warning in &opened.warnings {
//!     eprintln!("warning: {warning}");
//! }
//!
//! let session = opened.value;
//! let clients = session.clients().await?.value;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod decode;
pub mod entities;
pub mod error;

pub use auth::{Credential, RenewalHook, Session, SessionOptions, RENEWAL_LEAD_SECONDS};
pub use config::ClientConfig;
pub use entities::{Asset, Client, Finding, Report, Section, User};
pub use error::{RedquillError, Result, Warned, Warning};
