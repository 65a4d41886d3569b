//! Client organizations and their report inventory

use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::Session;
use crate::entities::report::Report;
use crate::error::{RedquillError, Result, Warned, Warning};

/// Keys the platform manages server-side, stripped from the cached detail
/// payload so a later write-back doesn't echo them.
const SERVER_MANAGED_KEYS: &[&str] =
    &["client_id", "cuid", "doc_type", "licenseKeys", "logo", "tenant_id", "users"];

#[derive(Debug, Deserialize)]
struct ClientRow {
    client_id: i64,
    name: String,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    poc: Option<String>,
    #[serde(default)]
    poc_email: Option<String>,
}

/// A client organization owning reports on the platform.
pub struct Client {
    session: Session,
    full: bool,
    raw: Value,
    tags: Vec<String>,

    /// Stable identity addressing the detail endpoint.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Point of contact.
    pub poc: String,
    /// Point-of-contact email.
    pub poc_email: String,
}

impl Session {
    /// List the client organizations visible to this session.
    ///
    /// Rows that cannot be read produce a warning and are skipped rather
    /// than failing the listing.
    ///
    /// # Errors
    /// Returns transport/decode errors from the listing call.
    pub async fn clients(&self) -> Result<Warned<Vec<Client>>> {
        let body = json!({
            "pagination": { "offset": 0, "limit": 1000 },
            "sort": [ { "by": "name", "order": "ASC" } ],
            "filters": [],
        });

        let (envelope, mut warnings) =
            self.call_json(Method::POST, "v2/clients", &body).await?.split();
        let rows = envelope.get("data").and_then(Value::as_array).ok_or_else(|| {
            RedquillError::Decode("client listing has no data rows".to_string())
        })?;

        let mut clients = Vec::with_capacity(rows.len());
        for row in rows {
            match serde_json::from_value::<ClientRow>(row.clone()) {
                Ok(parsed) => clients.push(Client::from_row(self.clone(), parsed)),
                Err(e) => {
                    warnings.push(Warning::new(format!("skipping unreadable client row: {e}")));
                }
            }
        }

        Ok(Warned::new(clients, warnings))
    }

    /// Find the single client whose name contains `partial`
    /// (case-insensitive).
    ///
    /// # Errors
    /// Not-found when nothing matches, ambiguity when more than one does.
    pub async fn client_by_partial(&self, partial: &str) -> Result<Warned<Client>> {
        let (clients, warnings) = self.clients().await?.split();
        let needle = partial.to_lowercase();

        let mut matched: Vec<Client> =
            clients.into_iter().filter(|c| c.name.to_lowercase().contains(&needle)).collect();

        match matched.len() {
            0 => Err(RedquillError::NotFound("client".to_string())),
            1 => Ok(Warned::new(matched.swap_remove(0), warnings)),
            _ => Err(RedquillError::Ambiguous("clients".to_string())),
        }
    }
}

impl Client {
    fn from_row(session: Session, row: ClientRow) -> Self {
        Self {
            session,
            full: false,
            raw: Value::Null,
            tags: row.tags,
            id: row.client_id,
            name: row.name,
            poc: row.poc.unwrap_or_default(),
            poc_email: row.poc_email.unwrap_or_default(),
        }
    }

    /// Fetch and cache the full detail payload, at most once.
    ///
    /// A no-op once loaded; a failed fetch leaves the client retryable on
    /// the next call.
    ///
    /// # Errors
    /// Returns transport/decode errors from the detail fetch.
    pub async fn ensure_full(&mut self) -> Result<Warned<()>> {
        if self.full {
            return Ok(Warned::clean(()));
        }

        let (mut raw, warnings) =
            self.session.get_json(&format!("v1/client/{}", self.id)).await?.split();

        let Some(object) = raw.as_object_mut() else {
            return Err(RedquillError::Decode(format!(
                "client {} detail is not an object",
                self.id
            )));
        };
        for key in SERVER_MANAGED_KEYS {
            object.remove(*key);
        }

        self.raw = raw;
        self.full = true;

        Ok(Warned::new((), warnings))
    }

    /// List this client's reports.
    ///
    /// # Errors
    /// Returns transport/decode errors from the listing call, including a
    /// decode error when a row is missing its identity field.
    pub async fn reports(&self) -> Result<Warned<Vec<Report>>> {
        let path = format!("v1/client/{}/reports", self.id);
        let (envelope, mut warnings) = self.session.get_json(&path).await?.split();

        let rows = envelope.as_array().ok_or_else(|| {
            RedquillError::Decode(format!("report listing for client {} is not an array", self.id))
        })?;

        let mut reports = Vec::with_capacity(rows.len());
        for row in rows {
            let data = row.get("data").filter(|d| !d.is_null()).ok_or_else(|| {
                RedquillError::Decode("report row has no data array".to_string())
            })?;
            reports
                .push(Report::from_row(self.session.clone(), self.id, data)?
                    .drain_into(&mut warnings));
        }

        Ok(Warned::new(reports, warnings))
    }

    /// Find the single report whose name contains `partial`
    /// (case-insensitive).
    ///
    /// # Errors
    /// Not-found when nothing matches, ambiguity when more than one does.
    pub async fn report_by_partial(&self, partial: &str) -> Result<Warned<Report>> {
        let (reports, warnings) = self.reports().await?.split();
        let needle = partial.to_lowercase();

        let mut matched: Vec<Report> =
            reports.into_iter().filter(|r| r.name.to_lowercase().contains(&needle)).collect();

        match matched.len() {
            0 => Err(RedquillError::NotFound("report".to_string())),
            1 => Ok(Warned::new(matched.swap_remove(0), warnings)),
            _ => Err(RedquillError::Ambiguous("reports".to_string())),
        }
    }

    /// Tags currently on this client.
    #[must_use]
    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Append tags and write them back.
    ///
    /// # Errors
    /// Surfaces detail-fetch and write-back failures.
    pub async fn add_tags(&mut self, tags: &[String]) -> Result<Warned<()>> {
        let mut warnings = Vec::new();
        self.ensure_full().await?.drain_into(&mut warnings);
        self.tags.extend(tags.iter().cloned());
        self.write_tags(&mut warnings).await?;
        Ok(Warned::new((), warnings))
    }

    /// Remove the named tags and write the remainder back.
    ///
    /// # Errors
    /// Surfaces detail-fetch and write-back failures.
    pub async fn remove_tags(&mut self, tags: &[String]) -> Result<Warned<()>> {
        let mut warnings = Vec::new();
        self.ensure_full().await?.drain_into(&mut warnings);
        self.tags.retain(|existing| !tags.contains(existing));
        self.write_tags(&mut warnings).await?;
        Ok(Warned::new((), warnings))
    }

    /// Replace all tags and write them back.
    ///
    /// # Errors
    /// Surfaces detail-fetch and write-back failures.
    pub async fn set_tags(&mut self, tags: Vec<String>) -> Result<Warned<()>> {
        let mut warnings = Vec::new();
        self.ensure_full().await?.drain_into(&mut warnings);
        self.tags = tags;
        self.write_tags(&mut warnings).await?;
        Ok(Warned::new((), warnings))
    }

    async fn write_tags(&mut self, warnings: &mut Vec<Warning>) -> Result<()> {
        if let Some(object) = self.raw.as_object_mut() {
            object.insert("tags".to_string(), json!(self.tags));
        }

        let path = format!("v1/client/{}", self.id);
        self.session
            .call_json(Method::PUT, &path, &self.raw)
            .await?
            .map(|_| ())
            .drain_into(warnings);
        Ok(())
    }
}
