//! Reports and their exec-summary detail
//!
//! Report listing rows arrive as fixed-position arrays (an upstream
//! contract quirk); the field table below is the single place that
//! records which position means what.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::auth::Session;
use crate::decode::{decode, FieldKind, FieldSource, FieldSpec};
use crate::entities::finding::Finding;
use crate::error::{RedquillError, Result, Warned};

const REPORT_FIELDS: &[FieldSpec] = &[
    FieldSpec { name: "id", source: FieldSource::Index(0), kind: FieldKind::Integer, fatal: true },
    FieldSpec { name: "name", source: FieldSource::Index(1), kind: FieldKind::Text, fatal: false },
    FieldSpec {
        name: "status",
        source: FieldSource::Index(3),
        kind: FieldKind::Text,
        fatal: false,
    },
    FieldSpec {
        name: "findings_count",
        source: FieldSource::Index(4),
        kind: FieldKind::Integer,
        fatal: false,
    },
    FieldSpec {
        name: "operators",
        source: FieldSource::Index(5),
        kind: FieldKind::TextList,
        fatal: false,
    },
    FieldSpec {
        name: "reviewers",
        source: FieldSource::Index(6),
        kind: FieldKind::TextList,
        fatal: false,
    },
    FieldSpec {
        name: "created_at",
        source: FieldSource::Index(7),
        kind: FieldKind::Timestamp,
        fatal: false,
    },
    FieldSpec {
        name: "start_date",
        source: FieldSource::Index(8),
        kind: FieldKind::Timestamp,
        fatal: false,
    },
    FieldSpec {
        name: "stop_date",
        source: FieldSource::Index(9),
        kind: FieldKind::Timestamp,
        fatal: false,
    },
    FieldSpec {
        name: "tags",
        source: FieldSource::Index(10),
        kind: FieldKind::TextList,
        fatal: false,
    },
    FieldSpec {
        name: "report_template",
        source: FieldSource::Index(11),
        kind: FieldKind::Text,
        fatal: false,
    },
    FieldSpec {
        name: "findings_template",
        source: FieldSource::Index(12),
        kind: FieldKind::Text,
        fatal: false,
    },
];

#[derive(Debug, Deserialize)]
struct ReportDetail {
    #[serde(default)]
    exec_summary: ExecSummary,
    #[serde(default)]
    template: String,
}

#[derive(Debug, Default, Deserialize)]
struct ExecSummary {
    #[serde(default)]
    custom_fields: Vec<CustomField>,
}

#[derive(Debug, Deserialize)]
struct CustomField {
    #[serde(default)]
    id: String,
    #[serde(default)]
    label: String,
    #[serde(default)]
    text: String,
}

/// One exec-summary section of a report.
#[derive(Debug, Clone)]
pub struct Section {
    /// Section identity.
    pub id: String,
    /// Section heading.
    pub title: String,
    /// Section body.
    pub content: String,
}

/// A report belonging to one client organization.
pub struct Report {
    session: Session,
    client_id: i64,
    full: bool,
    sections: Vec<Section>,
    template_id: String,

    /// Stable identity addressing the detail endpoint.
    pub id: i64,
    /// Report name.
    pub name: String,
    /// Workflow status.
    pub status: String,
    /// Number of findings attached.
    pub findings_count: i64,
    /// Creation time.
    pub created_at: Option<DateTime<Utc>>,
    /// Engagement start.
    pub start_date: Option<DateTime<Utc>>,
    /// Engagement stop.
    pub stop_date: Option<DateTime<Utc>>,
    /// Assigned operators.
    pub operators: Vec<String>,
    /// Assigned reviewers.
    pub reviewers: Vec<String>,
    /// Tags on the report.
    pub tags: Vec<String>,
    /// Report template name.
    pub report_template: String,
    /// Findings template name.
    pub findings_template: String,
}

impl Report {
    pub(crate) fn from_row(
        session: Session,
        client_id: i64,
        data: &Value,
    ) -> Result<Warned<Self>> {
        let (record, warnings) = decode(data, REPORT_FIELDS)?.split();

        let report = Self {
            session,
            client_id,
            full: false,
            sections: Vec::new(),
            template_id: String::new(),
            id: record.integer("id"),
            name: record.text("name"),
            status: record.text("status"),
            findings_count: record.integer("findings_count"),
            created_at: record.timestamp("created_at"),
            start_date: record.timestamp("start_date"),
            stop_date: record.timestamp("stop_date"),
            operators: record.text_list("operators"),
            reviewers: record.text_list("reviewers"),
            tags: record.text_list("tags"),
            report_template: record.text("report_template"),
            findings_template: record.text("findings_template"),
        };

        Ok(Warned::new(report, warnings))
    }

    /// Fetch and cache the detail payload (sections, template), at most
    /// once.
    ///
    /// # Errors
    /// Returns transport/decode errors from the detail fetch.
    pub async fn ensure_full(&mut self) -> Result<Warned<()>> {
        if self.full {
            return Ok(Warned::clean(()));
        }

        let path = format!("v1/client/{}/report/{}", self.client_id, self.id);
        let (envelope, warnings) = self.session.get_json(&path).await?.split();

        let detail: ReportDetail = serde_json::from_value(envelope).map_err(|e| {
            RedquillError::Decode(format!("report {} detail isn't the expected shape: {e}", self.id))
        })?;

        self.sections = detail
            .exec_summary
            .custom_fields
            .into_iter()
            .map(|field| Section { id: field.id, title: field.label, content: field.text })
            .collect();
        self.template_id = detail.template;
        self.full = true;

        Ok(Warned::new((), warnings))
    }

    /// Exec-summary sections, fetching detail on first use.
    ///
    /// # Errors
    /// Surfaces detail-fetch failures.
    pub async fn sections(&mut self) -> Result<Warned<Vec<Section>>> {
        let ((), warnings) = self.ensure_full().await?.split();
        Ok(Warned::new(self.sections.clone(), warnings))
    }

    /// Template identity, fetching detail on first use.
    ///
    /// # Errors
    /// Surfaces detail-fetch failures.
    pub async fn template_id(&mut self) -> Result<Warned<String>> {
        let ((), warnings) = self.ensure_full().await?.split();
        Ok(Warned::new(self.template_id.clone(), warnings))
    }

    /// List this report's findings.
    ///
    /// # Errors
    /// Returns transport/decode errors from the listing call, including a
    /// decode error when a row is missing its identity field.
    pub async fn findings(&self) -> Result<Warned<Vec<Finding>>> {
        let path = format!("v1/client/{}/report/{}/findings", self.client_id, self.id);
        let (envelope, mut warnings) = self.session.get_json(&path).await?.split();

        let rows = envelope.as_array().ok_or_else(|| {
            RedquillError::Decode(format!("finding listing for report {} is not an array", self.id))
        })?;

        let mut findings = Vec::with_capacity(rows.len());
        for row in rows {
            let data = row.get("data").filter(|d| !d.is_null()).ok_or_else(|| {
                RedquillError::Decode("finding row has no data array".to_string())
            })?;
            findings.push(
                Finding::from_row(self.session.clone(), self.client_id, self.id, data)?
                    .drain_into(&mut warnings),
            );
        }

        Ok(Warned::new(findings, warnings))
    }

    /// Find the single finding whose name contains `partial`
    /// (case-insensitive).
    ///
    /// # Errors
    /// Not-found when nothing matches, ambiguity when more than one does.
    pub async fn finding_by_partial(&self, partial: &str) -> Result<Warned<Finding>> {
        let (findings, warnings) = self.findings().await?.split();
        let needle = partial.to_lowercase();

        let mut matched: Vec<Finding> =
            findings.into_iter().filter(|f| f.name.to_lowercase().contains(&needle)).collect();

        match matched.len() {
            0 => Err(RedquillError::NotFound("finding".to_string())),
            1 => Ok(Warned::new(matched.swap_remove(0), warnings)),
            _ => Err(RedquillError::Ambiguous("findings".to_string())),
        }
    }
}
