//! Tenant users

use std::fmt;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};

use crate::auth::Session;
use crate::decode::{decode, FieldKind, FieldSource, FieldSpec};
use crate::error::{RedquillError, Result, Warned, Warning};

const USER_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "name",
        source: FieldSource::Key("fullName"),
        kind: FieldKind::Text,
        fatal: false,
    },
    FieldSpec {
        name: "email",
        source: FieldSource::Key("email"),
        kind: FieldKind::Text,
        fatal: false,
    },
    FieldSpec {
        name: "last_login",
        source: FieldSource::Key("lastLogin"),
        kind: FieldKind::Timestamp,
        fatal: false,
    },
    FieldSpec {
        name: "created_at",
        source: FieldSource::Key("createdAt"),
        kind: FieldKind::Timestamp,
        fatal: false,
    },
    FieldSpec {
        name: "disabled",
        source: FieldSource::Key("disabled"),
        kind: FieldKind::Flag,
        fatal: false,
    },
];

/// A user account in the session's tenant.
pub struct User {
    session: Session,

    /// User identity.
    pub id: i64,
    /// Full display name.
    pub name: String,
    /// Login email.
    pub email: String,
    /// Last successful login.
    pub last_login: Option<DateTime<Utc>>,
    /// Account creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Whether the account is active.
    pub enabled: bool,
}

impl Session {
    /// List the user accounts in this session's tenant.
    ///
    /// # Errors
    /// Returns transport/decode errors from the listing call.
    pub async fn users(&self) -> Result<Warned<Vec<User>>> {
        let path = format!("v1/tenant/{}/user/list", self.tenant_id().await);
        let (envelope, mut warnings) = self.get_json(&path).await?.split();

        let rows = envelope
            .as_array()
            .ok_or_else(|| RedquillError::Decode("user listing is not an array".to_string()))?;

        let mut users = Vec::with_capacity(rows.len());
        for row in rows {
            let id = match row.get("id").and_then(Value::as_str).and_then(|s| s.parse::<i64>().ok())
            {
                Some(id) => id,
                None => {
                    warnings.push(Warning::new(format!(
                        "couldn't parse user id {:?}",
                        row.get("id")
                    )));
                    0
                }
            };

            let Some(data) = row.get("data").filter(|d| !d.is_null()) else {
                warnings.push(Warning::new(format!("user row {id} has no data object")));
                continue;
            };

            let record = decode(data, USER_FIELDS)?.drain_into(&mut warnings);

            users.push(User {
                session: self.clone(),
                id,
                name: record.text("name"),
                email: record.text("email"),
                last_login: record.timestamp("last_login"),
                created_at: record.timestamp("created_at"),
                enabled: !record.flag("disabled"),
            });
        }

        Ok(Warned::new(users, warnings))
    }
}

impl User {
    /// Trigger a password reset for this user.
    ///
    /// # Errors
    /// Returns a service error when the platform does not acknowledge the
    /// reset with a `success` status.
    pub async fn reset_password(&self) -> Result<Warned<()>> {
        let path = format!("v1/tenant/{}/user/resetpass", self.session.tenant_id().await);
        let body = json!({ "username": self.email });

        let (envelope, warnings) = self.session.call_json(Method::PUT, &path, &body).await?.split();

        if envelope.get("status").and_then(Value::as_str) != Some("success") {
            return Err(RedquillError::Api(format!(
                "error resetting password for {}: {envelope}",
                self.email
            )));
        }

        Ok(Warned::new((), warnings))
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}
