//! Integration tests for entity listing, positional decoding, lazy
//! detail materialization, and tag editing.

mod common;

use redquill_client::RedquillError;
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{make_token, open_with_token};

/// Client listing decodes the object-shaped rows, and partial lookup
/// distinguishes the no-match, one-match, and many-match cases.
#[tokio::test]
async fn clients_listing_and_partial_lookup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [
                { "client_id": 1, "name": "Acme Corp", "tags": ["retail"], "poc": "Pat" },
                { "client_id": 2, "name": "Globex", "poc_email": "sec@globex.example" },
            ],
            "meta": { "pagination": { "offset": 0, "limit": 1000, "total": 2 } },
        })))
        .mount(&server)
        .await;

    let session = open_with_token(&server, make_token(3600, 1)).await;

    let clients = session.clients().await.unwrap();
    assert!(clients.warnings.is_empty());
    assert_eq!(clients.value.len(), 2);
    assert_eq!(clients.value[0].name, "Acme Corp");
    assert_eq!(clients.value[0].tags(), ["retail".to_string()]);
    assert_eq!(clients.value[1].poc_email, "sec@globex.example");

    let acme = session.client_by_partial("acme").await.unwrap().value;
    assert_eq!(acme.id, 1);

    assert!(matches!(
        session.client_by_partial("initech").await,
        Err(RedquillError::NotFound(_))
    ));
    // "o" appears in both "Corp" and "Globex"
    assert!(matches!(
        session.client_by_partial("o").await,
        Err(RedquillError::Ambiguous(_))
    ));
}

/// Mount a one-client listing so tests can reach entity endpoints the
/// way callers do, through the listing.
async fn mount_single_client(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v2/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [ { "client_id": 1, "name": "Acme Corp", "tags": [] } ],
        })))
        .mount(server)
        .await;
}

fn report_row() -> Value {
    json!({
        "id": 10,
        "doc_id": [10],
        "data": [
            10,
            "Q3 Pentest",
            null,
            "Published",
            5,
            ["alice"],
            ["bob"],
            1_700_000_000_000_i64,
            "2023-11-01T00:00:00.000Z",
            true,
            ["web", "external"],
            "standard",
            "findings-v2",
        ],
    })
}

/// Positional report rows decode through the field table; a wrong-typed
/// position warns and leaves its field at the zero value without
/// aborting the record.
#[tokio::test]
async fn reports_decode_positionally_with_warnings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/client/1/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([report_row()])))
        .mount(&server)
        .await;

    let session = open_with_token(&server, make_token(3600, 1)).await;
    mount_single_client(&server).await;
    let client = session.client_by_partial("acme").await.unwrap().value;

    let (reports, warnings) = client.reports().await.unwrap().split();

    assert_eq!(reports.len(), 1);
    let report = &reports[0];
    assert_eq!(report.id, 10);
    assert_eq!(report.name, "Q3 Pentest");
    assert_eq!(report.status, "Published");
    assert_eq!(report.findings_count, 5);
    assert_eq!(report.operators, ["alice".to_string()]);
    assert_eq!(report.tags, ["web".to_string(), "external".to_string()]);
    assert_eq!(
        report.created_at.map(|t| t.timestamp_millis()),
        Some(1_700_000_000_000)
    );
    assert!(report.start_date.is_some());

    // position 9 (stop date) was a boolean: zero value plus one warning
    assert!(report.stop_date.is_none());
    assert_eq!(warnings.len(), 1);
}

/// A report row whose identity position is null aborts the fetch with a
/// decode error.
#[tokio::test]
async fn report_row_without_identity_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/client/1/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": 11, "data": [null, "Mystery Report"] },
        ])))
        .mount(&server)
        .await;

    let session = open_with_token(&server, make_token(3600, 1)).await;
    mount_single_client(&server).await;
    let client = session.client_by_partial("acme").await.unwrap().value;

    assert!(matches!(client.reports().await, Err(RedquillError::Decode(_))));
}

/// Report detail is fetched at most once: repeated `ensure_full` and the
/// accessors that depend on it reuse the cached payload.
#[tokio::test]
async fn report_detail_fetched_at_most_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/client/1/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([report_row()])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/client/1/report/10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "exec_summary": {
                "custom_fields": [
                    { "id": "s1", "label": "Summary", "text": "All clear." },
                ],
            },
            "template": "tmpl-1",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = open_with_token(&server, make_token(3600, 1)).await;
    mount_single_client(&server).await;
    let client = session.client_by_partial("acme").await.unwrap().value;
    let mut report = client.reports().await.unwrap().value.remove(0);

    report.ensure_full().await.unwrap();
    report.ensure_full().await.unwrap();

    let sections = report.sections().await.unwrap().value;
    assert_eq!(sections.len(), 1);
    assert_eq!(sections[0].title, "Summary");
    assert_eq!(report.template_id().await.unwrap().value, "tmpl-1");
}

/// Finding detail materializes assets, evidence, and tags lazily, and
/// tag edits write the cached payload back.
#[tokio::test]
async fn finding_detail_and_tag_editing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/client/1/reports"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([report_row()])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/client/1/report/10/findings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "f-99",
                "doc_id": ["f-99"],
                "data": [
                    99,
                    "High",
                    "SQL Injection",
                    "Open",
                    1_700_000_000_000_i64,
                    null,
                    1_690_000_000_000_i64,
                    null,
                    null,
                    null,
                    "Published",
                    "",
                ],
            },
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/client/1/report/10/finding/99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "affected_assets": { "a1": { "asset": "10.0.0.5" } },
            "fields": { "evidence": { "value": "see request log" } },
            "tags": ["sqli"],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/client/1/report/10/finding/99"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = open_with_token(&server, make_token(3600, 1)).await;
    mount_single_client(&server).await;
    let client = session.client_by_partial("acme").await.unwrap().value;
    let report = client.reports().await.unwrap().value.remove(0);

    let (findings, warnings) = report.findings().await.unwrap().split();
    assert!(warnings.is_empty());
    assert_eq!(findings.len(), 1);

    let mut finding = findings.into_iter().next().unwrap();
    assert_eq!(finding.id, 99);
    assert_eq!(finding.severity, "High");
    assert_eq!(finding.name, "SQL Injection");

    // first accessor triggers the single detail fetch
    assert_eq!(finding.tags().await.unwrap().value, ["sqli".to_string()]);
    assert_eq!(finding.evidence().await.unwrap().value, "see request log");
    let assets = finding.assets().await.unwrap().value;
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].value, "10.0.0.5");

    finding.add_tags(&["verified".to_string()]).await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let update = requests
        .iter()
        .find(|request| {
            request.method.as_str() == "PUT"
                && request.url.path() == "/api/v1/client/1/report/10/finding/99"
        })
        .unwrap();
    let body: Value = serde_json::from_slice(&update.body).unwrap();
    assert_eq!(body["tags"], json!(["sqli", "verified"]));
}

/// Client detail strips server-managed keys before any write-back.
#[tokio::test]
async fn client_tag_update_writes_pruned_payload() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v2/clients"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "data": [ { "client_id": 1, "name": "Acme Corp", "tags": ["retail"] } ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/client/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "client_id": 1,
            "name": "Acme Corp",
            "tags": ["retail"],
            "users": { "pat@acme.example": { "role": "ADMIN" } },
            "logo": "data:...",
            "description": "retail conglomerate",
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/client/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "success" })))
        .expect(1)
        .mount(&server)
        .await;

    let session = open_with_token(&server, make_token(3600, 1)).await;
    let mut client = session.client_by_partial("acme").await.unwrap().value;

    client.add_tags(&["prod".to_string()]).await.unwrap();
    assert_eq!(client.tags(), ["retail".to_string(), "prod".to_string()]);

    let requests = server.received_requests().await.unwrap();
    let update = requests
        .iter()
        .find(|request| {
            request.method.as_str() == "PUT" && request.url.path() == "/api/v1/client/1"
        })
        .unwrap();
    let body: Value = serde_json::from_slice(&update.body).unwrap();

    assert_eq!(body["tags"], json!(["retail", "prod"]));
    assert_eq!(body["description"], "retail conglomerate");
    assert!(body.get("users").is_none());
    assert!(body.get("logo").is_none());
}

/// User rows decode their keyed data objects, tolerating an unreadable
/// row id.
#[tokio::test]
async fn users_listing_decodes_keyed_rows() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tenant/7/user/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "31",
                "data": {
                    "fullName": "Ada Lovelace",
                    "email": "ada@example.com",
                    "lastLogin": 1_700_000_000_000_i64,
                    "createdAt": 1_690_000_000_000_i64,
                    "disabled": false,
                },
            },
            {
                "id": "not-a-number",
                "data": {
                    "fullName": "Ghost",
                    "email": "ghost@example.com",
                    "lastLogin": 0,
                    "createdAt": 0,
                    "disabled": true,
                },
            },
        ])))
        .mount(&server)
        .await;

    let session = open_with_token(&server, make_token(3600, 7)).await;
    let (users, warnings) = session.users().await.unwrap().split();

    assert_eq!(users.len(), 2);
    assert_eq!(users[0].id, 31);
    assert!(users[0].enabled);
    assert_eq!(users[0].to_string(), "Ada Lovelace <ada@example.com>");
    assert_eq!(
        users[0].last_login.map(|t| t.timestamp_millis()),
        Some(1_700_000_000_000)
    );

    assert_eq!(users[1].id, 0);
    assert!(!users[1].enabled);
    assert_eq!(warnings.len(), 1);
}

/// Tenant tag removal resolves names to ids through a fresh listing and
/// verifies the platform acknowledged the deletion.
#[tokio::test]
async fn tenant_tags_list_and_remove() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/tenant/7/tag"))
        .and(query_param("limit", "10000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "count": { "totalDocs": 2 },
            "tags": [
                { "id": "t1", "name": "web" },
                { "id": "t2", "name": "mobile" },
            ],
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/tenant/7/tag/t1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "deleted": true })))
        .expect(1)
        .mount(&server)
        .await;

    let session = open_with_token(&server, make_token(3600, 7)).await;

    let tags = session.tags().await.unwrap().value;
    assert_eq!(tags, ["web".to_string(), "mobile".to_string()]);

    session.remove_tags(&["web".to_string()]).await.unwrap();

    assert!(matches!(
        session.remove_tags(&["desktop".to_string()]).await,
        Err(RedquillError::NotFound(_))
    ));
}
