//! Findings, their affected assets, evidence, and tags

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::{json, Value};

use crate::auth::Session;
use crate::decode::{decode, FieldKind, FieldSource, FieldSpec};
use crate::error::{RedquillError, Result, Warned, Warning};

const FINDING_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "id", source: FieldSource::Index(0), kind: FieldKind::Integer, fatal: true },
    FieldSpec {
        name: "severity",
        source: FieldSource::Index(1),
        kind: FieldKind::Text,
        fatal: false,
    },
    FieldSpec { name: "name", source: FieldSource::Index(2), kind: FieldKind::Text, fatal: false },
    FieldSpec {
        name: "status",
        source: FieldSource::Index(3),
        kind: FieldKind::Text,
        fatal: false,
    },
    FieldSpec {
        name: "updated_at",
        source: FieldSource::Index(4),
        kind: FieldKind::Timestamp,
        fatal: false,
    },
    FieldSpec {
        name: "created_at",
        source: FieldSource::Index(6),
        kind: FieldKind::Timestamp,
        fatal: false,
    },
    FieldSpec {
        name: "published",
        source: FieldSource::Index(10),
        kind: FieldKind::Text,
        fatal: false,
    },
];

const FINDING_DETAIL_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "tags",
    source: FieldSource::Key("tags"),
    kind: FieldKind::TextList,
    fatal: false,
}];

/// An asset affected by a finding.
#[derive(Debug, Clone)]
pub struct Asset {
    /// Asset identity within the finding detail.
    pub id: String,
    /// Asset name or address.
    pub value: String,
}

/// A finding attached to one report.
pub struct Finding {
    session: Session,
    client_id: i64,
    report_id: i64,
    full: bool,
    raw: Value,
    tags: Vec<String>,
    assets: Vec<Asset>,
    evidence: String,

    /// Stable identity addressing the detail endpoint.
    pub id: i64,
    /// Severity label.
    pub severity: String,
    /// Finding title.
    pub name: String,
    /// Workflow status.
    pub status: String,
    /// Publication state.
    pub published: String,
    /// Last-update time.
    pub updated_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
}

impl Finding {
    pub(crate) fn from_row(
        session: Session,
        client_id: i64,
        report_id: i64,
        data: &Value,
    ) -> Result<Warned<Self>> {
        let (record, warnings) = decode(data, FINDING_FIELDS)?.split();

        let finding = Self {
            session,
            client_id,
            report_id,
            full: false,
            raw: Value::Null,
            tags: Vec::new(),
            assets: Vec::new(),
            evidence: String::new(),
            id: record.integer("id"),
            severity: record.text("severity"),
            name: record.text("name"),
            status: record.text("status"),
            published: record.text("published"),
            updated_at: record.timestamp("updated_at"),
            created_at: record.timestamp("created_at"),
        };

        Ok(Warned::new(finding, warnings))
    }

    fn detail_path(&self) -> String {
        format!("v1/client/{}/report/{}/finding/{}", self.client_id, self.report_id, self.id)
    }

    /// Fetch and cache the detail payload (assets, evidence, tags), at
    /// most once.
    ///
    /// # Errors
    /// Returns transport errors from the fetch and decode errors when the
    /// detail payload is not the expected shape.
    pub async fn ensure_full(&mut self) -> Result<Warned<()>> {
        if self.full {
            return Ok(Warned::clean(()));
        }

        let (raw, mut warnings) = self.session.get_json(&self.detail_path()).await?.split();
        if !raw.is_object() {
            return Err(RedquillError::Decode(format!(
                "finding {} detail is not an object",
                self.id
            )));
        }

        self.raw = raw;
        self.full = true;

        self.assets = parse_assets(&self.raw)?.drain_into(&mut warnings);
        self.evidence = parse_evidence(&self.raw)?.drain_into(&mut warnings);

        let record = decode(&self.raw, FINDING_DETAIL_FIELDS)?.drain_into(&mut warnings);
        self.tags = record.text_list("tags");

        Ok(Warned::new((), warnings))
    }

    /// Affected assets, fetching detail on first use.
    ///
    /// # Errors
    /// Surfaces detail-fetch failures.
    pub async fn assets(&mut self) -> Result<Warned<Vec<Asset>>> {
        let ((), warnings) = self.ensure_full().await?.split();
        Ok(Warned::new(self.assets.clone(), warnings))
    }

    /// Evidence text, fetching detail on first use.
    ///
    /// # Errors
    /// Surfaces detail-fetch failures.
    pub async fn evidence(&mut self) -> Result<Warned<String>> {
        let ((), warnings) = self.ensure_full().await?.split();
        Ok(Warned::new(self.evidence.clone(), warnings))
    }

    /// Tags on this finding, fetching detail on first use.
    ///
    /// # Errors
    /// Surfaces detail-fetch failures.
    pub async fn tags(&mut self) -> Result<Warned<Vec<String>>> {
        let ((), warnings) = self.ensure_full().await?.split();
        Ok(Warned::new(self.tags.clone(), warnings))
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

        let path = self.detail_path();
        self.session
            .call_json(Method::PUT, &path, &self.raw)
            .await?
            .map(|_| ())
            .drain_into(warnings);
        Ok(())
    }
}

fn parse_assets(raw: &Value) -> Result<Warned<Vec<Asset>>> {
    let affected = raw.get("affected_assets").and_then(Value::as_object).ok_or_else(|| {
        RedquillError::Decode("unable to coerce affected_assets into an object".to_string())
    })?;

    let mut warnings = Vec::new();
    let mut assets = Vec::with_capacity(affected.len());

    for (key, entry) in affected {
        let entry = entry.as_object().ok_or_else(|| {
            RedquillError::Decode(format!("unable to coerce asset {key} into an object"))
        })?;

        let mut asset = Asset { id: key.clone(), value: String::new() };
        match entry.get("asset").and_then(Value::as_str) {
            Some(value) => asset.value = value.to_string(),
            None => warnings
                .push(Warning::new(format!("unable to coerce asset {key} value into text"))),
        }
        assets.push(asset);
    }

    Ok(Warned::new(assets, warnings))
}

fn parse_evidence(raw: &Value) -> Result<Warned<String>> {
    let fields = raw.get("fields").and_then(Value::as_object).ok_or_else(|| {
        RedquillError::Decode("unable to coerce fields into an object".to_string())
    })?;

    let Some(evidence) = fields.get("evidence") else {
        return Ok(Warned::new(String::new(), vec![Warning::new("evidence is missing")]));
    };

    let value = evidence.get("value").and_then(Value::as_str).ok_or_else(|| {
        RedquillError::Decode("unable to coerce evidence value into text".to_string())
    })?;

    Ok(Warned::clean(value.to_string()))
}

#[cfg(test)]
mod tests {
    //! Unit tests for entities::finding.
    use serde_json::json;

    use super::*;

    /// Validates `parse_assets` behavior for mixed asset entries.
    ///
    /// Assertions:
    /// - Confirms readable entries are kept with their values.
    /// - Confirms an unreadable value warns but keeps the asset id.
    #[test]
    fn test_parse_assets_tolerates_bad_values() {
        let raw = json!({
            "affected_assets": {
                "a1": { "asset": "10.0.0.5" },
                "a2": { "asset": 17 },
            }
        });

        let (assets, warnings) = parse_assets(&raw).unwrap().split();

        assert_eq!(assets.len(), 2);
        assert_eq!(warnings.len(), 1);
        let good = assets.iter().find(|a| a.id == "a1").unwrap();
        assert_eq!(good.value, "10.0.0.5");
        let bad = assets.iter().find(|a| a.id == "a2").unwrap();
        assert!(bad.value.is_empty());
    }

    /// Validates `parse_assets` behavior for a wrong-shaped container.
    ///
    /// Assertions:
    /// - Ensures a non-object container is a decode error.
    #[test]
    fn test_parse_assets_requires_object() {
        let raw = json!({ "affected_assets": [1, 2, 3] });
        assert!(matches!(parse_assets(&raw), Err(RedquillError::Decode(_))));
    }

    /// Validates `parse_evidence` behavior.
    ///
    /// Assertions:
    /// - Confirms present evidence is extracted.
    /// - Confirms missing evidence warns instead of failing.
    #[test]
    fn test_parse_evidence() {
        let raw = json!({ "fields": { "evidence": { "value": "see appendix" } } });
        let (evidence, warnings) = parse_evidence(&raw).unwrap().split();
        assert_eq!(evidence, "see appendix");
        assert!(warnings.is_empty());

        let absent = json!({ "fields": {} });
        let (evidence, warnings) = parse_evidence(&absent).unwrap().split();
        assert!(evidence.is_empty());
        assert_eq!(warnings.len(), 1);
    }
}
