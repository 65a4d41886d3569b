//! Shared helpers for integration tests.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{Duration, Utc};
use redquill_client::{Session, SessionOptions};
use wiremock::MockServer;

/// Build a syntactically valid platform token expiring `expires_in_secs`
/// from now (negative for already expired), scoped to `tenant_id`.
pub fn make_token(expires_in_secs: i64, tenant_id: i64) -> String {
    let exp = (Utc::now() + Duration::seconds(expires_in_secs)).timestamp();
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD
        .encode(format!(r#"{{"username":"auditor","tenantId":{tenant_id},"exp":{exp}}}"#));
    format!("{header}.{payload}.sig")
}

/// Open a session against the mock server by reusing a pre-made token,
/// so no login endpoint needs to be mounted.
pub async fn open_with_token(server: &MockServer, token: String) -> Session {
    Session::open(SessionOptions {
        instance_url: server.uri(),
        auth_token: Some(token),
        ..SessionOptions::default()
    })
    .await
    .unwrap()
    .value
}
