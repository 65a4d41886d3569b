//! Authenticated session with proactive token renewal
//!
//! A [`Session`] owns one [`Credential`] and guarantees that no two
//! concurrent callers interleave a renewal with each other or with a
//! request that is mid-flight using a stale token. Renewal is proactive:
//! the token is refreshed shortly before expiry rather than after the
//! first rejected call, so a business request never fails due to expiry
//! under normal operation.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client as ReqwestClient, Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::credential::Credential;
use super::totp;
use crate::decode::envelope_error;
use crate::error::{RedquillError, Result, Warned, Warning};

/// Seconds before expiry at which renewal begins.
///
/// Short enough to avoid needless refresh traffic, long enough to leave
/// margin for the latency of the refresh call itself. Not configurable.
pub const RENEWAL_LEAD_SECONDS: i64 = 120;

const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Callback invoked with the new token and its expiry after every
/// successful renewal (login or refresh), typically to persist the token
/// for the next invocation. A hook failure is downgraded to a warning and
/// never fails the renewal itself.
pub trait RenewalHook: Send + Sync {
    /// Receive the renewed bearer token and its expiry.
    ///
    /// # Errors
    /// Any error message returned here is surfaced to the caller as a
    /// warning, not an error.
    fn on_renew(&self, token: &str, expires_at: DateTime<Utc>) -> std::result::Result<(), String>;
}

/// Inputs for [`Session::open`].
///
/// Either a username/password pair or a pre-existing bearer token must be
/// supplied, along with the instance URL.
#[derive(Clone, Default)]
pub struct SessionOptions {
    /// Host of the platform instance, e.g. `reports.example.com`. A
    /// scheme may be included; `https` is assumed otherwise.
    pub instance_url: String,
    /// Login username.
    pub username: Option<String>,
    /// Login password.
    pub password: Option<String>,
    /// Explicit MFA code to submit verbatim, overriding seed derivation.
    pub mfa_code: Option<String>,
    /// Shared TOTP seed used to derive a code when none is supplied.
    pub mfa_seed: Option<String>,
    /// Previously issued bearer token to reuse if still valid.
    pub auth_token: Option<String>,
    /// Hook notified after every successful renewal.
    pub on_renew: Option<Arc<dyn RenewalHook>>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    tenant_id: Option<i64>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    mfa_enabled: bool,
    /// Server-issued challenge code echoed back during MFA completion.
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// An authenticated connection to one platform instance.
///
/// Cheap to clone: clones share the same credential, so a renewal
/// performed through one handle is observed by all of them.
#[derive(Clone)]
pub struct Session {
    http: ReqwestClient,
    base_url: String,
    on_renew: Option<Arc<dyn RenewalHook>>,
    credential: Arc<Mutex<Option<Credential>>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session").field("base_url", &self.base_url).finish_non_exhaustive()
    }
}

impl Session {
    /// Open a session against `options.instance_url`.
    ///
    /// A supplied bearer token that still decodes to a future expiry is
    /// reused without contacting the login endpoint; otherwise a full
    /// login (including the MFA exchange when the platform requires it)
    /// is performed.
    ///
    /// # Errors
    /// Returns a configuration error if no instance URL is given or
    /// neither a username/password pair nor a bearer token is supplied;
    /// otherwise whatever [`Session::login`] surfaces.
    pub async fn open(options: SessionOptions) -> Result<Warned<Self>> {
        if options.instance_url.trim().is_empty() {
            return Err(RedquillError::Config("must have an instance URL".to_string()));
        }

        let has_pair = matches!(
            (&options.username, &options.password),
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty()
        );
        let has_token = options.auth_token.as_deref().is_some_and(|t| !t.is_empty());
        if !has_pair && !has_token {
            return Err(RedquillError::Config(
                "must have a username/password pair or an auth token".to_string(),
            ));
        }

        let http = ReqwestClient::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let session = Self {
            http,
            base_url: normalize_instance_url(&options.instance_url),
            on_renew: options.on_renew.clone(),
            credential: Arc::new(Mutex::new(None)),
        };

        let mut warnings = Vec::new();
        let mut authenticated = false;

        if has_token {
            let token = options.auth_token.as_deref().unwrap_or_default();
            match Credential::from_token(token) {
                Ok(credential) if !credential.is_expired() => {
                    debug!(expires_at = %credential.expires_at, "reusing supplied auth token");
                    *session.credential.lock().await = Some(credential);
                    authenticated = true;
                }
                Ok(_) => debug!("supplied auth token has expired, performing a full login"),
                Err(e) => {
                    warnings.push(Warning::new(format!("ignoring supplied auth token: {e}")));
                }
            }
        }

        if !authenticated {
            session
                .login(
                    options.username.as_deref().unwrap_or_default(),
                    options.password.as_deref().unwrap_or_default(),
                    options.mfa_code.as_deref(),
                    options.mfa_seed.as_deref(),
                )
                .await?
                .drain_into(&mut warnings);
        }

        Ok(Warned::new(session, warnings))
    }

    /// Authenticate with the platform and install the issued credential.
    ///
    /// If the first response indicates multi-factor is required, an
    /// explicitly supplied `mfa_code` is used verbatim; otherwise one is
    /// derived from `mfa_seed` at the current time and submitted to the
    /// MFA-completion endpoint together with the server-issued challenge.
    ///
    /// # Errors
    /// Returns an authentication error carrying the service-reported
    /// message on any error-status response at either step, a seed error
    /// if a code must be derived and the seed is unusable, and a decode
    /// error if the issued token is missing or malformed.
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        mfa_code: Option<&str>,
        mfa_seed: Option<&str>,
    ) -> Result<Warned<()>> {
        let mut warnings = Vec::new();

        info!(username, "authenticating");

        let response = self
            .http
            .post(self.api_url("v1/authenticate"))
            .json(&json!({ "username": username, "password": password }))
            .send()
            .await?;
        let mut auth = parse_auth_response(response.status(), &response.text().await?)?;
        let tenant_hint = auth.tenant_id.unwrap_or(0);

        if auth.mfa_enabled {
            let code = match mfa_code {
                Some(code) if !code.is_empty() => code.to_string(),
                _ => totp::generate(mfa_seed.unwrap_or_default(), Utc::now())?,
            };

            debug!("completing multi-factor challenge");

            let challenge = auth.code.clone().unwrap_or_default();
            let response = self
                .http
                .post(self.api_url("v1/authenticate/mfa"))
                .json(&json!({ "code": challenge, "token": code }))
                .send()
                .await?;
            auth = parse_auth_response(response.status(), &response.text().await?)?;
        }

        let token = auth.token.ok_or_else(|| {
            RedquillError::Decode("authentication response is missing a token".to_string())
        })?;

        let mut credential = Credential::from_token(&token).map_err(|e| {
            RedquillError::Decode(format!("unable to extract expiration from issued token: {e}"))
        })?;
        if credential.tenant_id == 0 {
            credential.tenant_id = auth.tenant_id.unwrap_or(tenant_hint);
        }

        self.notify_renewed(&credential, &mut warnings);
        *self.credential.lock().await = Some(credential);

        info!("authentication succeeded");

        Ok(Warned::new((), warnings))
    }

    /// Renew the credential if it is inside the renewal window.
    ///
    /// No-op when no credential is installed yet (mid-login), when expiry
    /// is further away than [`RENEWAL_LEAD_SECONDS`], or when the token
    /// has already expired — a renewal after expiry is not attempted, the
    /// next authenticated call fails naturally instead.
    ///
    /// Called automatically at the start of every [`Session::request`].
    ///
    /// # Errors
    /// Returns transport, authentication, or decode errors from the
    /// refresh exchange.
    pub async fn check_expired(&self) -> Result<Warned<()>> {
        let mut slot = self.credential.lock().await;
        let warnings = self.renew_if_due(&mut slot).await?;
        Ok(Warned::new((), warnings))
    }

    /// Perform an authenticated call against `https://{instance}/api/{path}`
    /// and return the raw response body.
    ///
    /// The renewal check, the bearer-token read, and the HTTP call all
    /// happen inside the same exclusive section, so no caller ever
    /// observes a half-updated credential and two callers never race a
    /// renewal.
    ///
    /// # Errors
    /// Returns an authentication error when the platform rejects the
    /// token (HTTP 401/403) and a transport error for other non-success
    /// statuses or network failures.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Warned<String>> {
        let mut slot = self.credential.lock().await;
        let warnings = self.renew_if_due(&mut slot).await?;

        let token = slot
            .as_ref()
            .map(|credential| credential.token.clone())
            .ok_or_else(|| RedquillError::Auth("session holds no credential".to_string()))?;

        let url = self.api_url(path);
        debug!(%method, %url, "calling API");

        let mut builder =
            self.http.request(method, &url).header(AUTHORIZATION, format!("Bearer {token}"));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("request was rejected with HTTP {status}"));
            return Err(RedquillError::Auth(message));
        }
        if !status.is_success() {
            return Err(RedquillError::Transport(format!("{url} returned HTTP {status}")));
        }

        Ok(Warned::new(text, warnings))
    }

    /// `GET` a path and parse the body as JSON.
    ///
    /// # Errors
    /// As [`Session::request`], plus a decode error for non-JSON bodies
    /// and a service error for `status: "error"` envelopes.
    pub async fn get_json(&self, path: &str) -> Result<Warned<Value>> {
        let (body, warnings) = self.request(Method::GET, path, None).await?.split();
        Ok(Warned::new(parse_json_body(path, &body)?, warnings))
    }

    /// Call a path with a JSON body and parse the response as JSON.
    ///
    /// # Errors
    /// As [`Session::get_json`].
    pub async fn call_json(
        &self,
        method: Method,
        path: &str,
        body: &Value,
    ) -> Result<Warned<Value>> {
        let (text, warnings) = self.request(method, path, Some(body)).await?.split();
        Ok(Warned::new(parse_json_body(path, &text)?, warnings))
    }

    /// `DELETE` a path and parse the body as JSON.
    ///
    /// # Errors
    /// As [`Session::get_json`].
    pub async fn delete_json(&self, path: &str) -> Result<Warned<Value>> {
        let (body, warnings) = self.request(Method::DELETE, path, None).await?.split();
        Ok(Warned::new(parse_json_body(path, &body)?, warnings))
    }

    /// The tenant identity granted by the current credential, or zero
    /// when no credential is installed.
    pub async fn tenant_id(&self) -> i64 {
        self.credential.lock().await.as_ref().map_or(0, |credential| credential.tenant_id)
    }

    /// A copy of the current credential, for callers that persist it.
    pub async fn credential(&self) -> Option<Credential> {
        self.credential.lock().await.clone()
    }

    /// Refresh the credential while the caller already holds the slot.
    ///
    /// The caller keeps the lock across the subsequent token read, so a
    /// second caller that also observed "renewal due" finds the renewed,
    /// non-expiring-soon credential here and skips its own refresh.
    async fn renew_if_due(&self, slot: &mut Option<Credential>) -> Result<Vec<Warning>> {
        let Some(current) = slot.as_ref() else {
            // mid-login; nothing to renew yet
            return Ok(Vec::new());
        };

        let now = Utc::now();
        if now < current.expires_at - Duration::seconds(RENEWAL_LEAD_SECONDS) {
            return Ok(Vec::new());
        }
        if now >= current.expires_at {
            // too late to renew; the next authenticated call will fail
            return Ok(Vec::new());
        }

        debug!(expires_at = %current.expires_at, "renewing auth token");

        let response = self
            .http
            .put(self.api_url("v1/token/refresh"))
            .header(AUTHORIZATION, format!("Bearer {}", current.token))
            .send()
            .await?;
        let status = response.status();
        let body = response.text().await?;

        let refresh: RefreshResponse = serde_json::from_str(&body)
            .map_err(|e| RedquillError::Decode(format!("unable to refresh token: {e}")))?;
        if refresh.status.as_deref() == Some("error") {
            return Err(RedquillError::Auth(refresh.message.unwrap_or_else(|| {
                format!("token refresh was rejected with HTTP {status}")
            })));
        }

        let token = refresh.token.ok_or_else(|| {
            RedquillError::Decode("token refresh response is missing a token".to_string())
        })?;
        let mut renewed = Credential::from_token(&token)?;
        if renewed.tenant_id == 0 {
            renewed.tenant_id = current.tenant_id;
        }

        let mut warnings = Vec::new();
        self.notify_renewed(&renewed, &mut warnings);

        // Replaced wholesale; callers queued on the lock observe only the
        // complete new value.
        *slot = Some(renewed);

        Ok(warnings)
    }

    fn notify_renewed(&self, credential: &Credential, warnings: &mut Vec<Warning>) {
        if let Some(hook) = &self.on_renew {
            if let Err(message) = hook.on_renew(&credential.token, credential.expires_at) {
                warn!(message = %message, "renewal hook failed");
                warnings.push(Warning::new(format!("error calling renewal hook: {message}")));
            }
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }
}

fn parse_auth_response(status: StatusCode, body: &str) -> Result<AuthResponse> {
    match serde_json::from_str::<AuthResponse>(body) {
        Ok(parsed) => {
            if parsed.status.as_deref() == Some("error") {
                return Err(RedquillError::Auth(parsed.message.unwrap_or_else(|| {
                    format!("authentication was rejected with HTTP {status}")
                })));
            }
            Ok(parsed)
        }
        Err(_) if !status.is_success() => Err(RedquillError::Auth(format!(
            "authentication endpoint returned HTTP {status}"
        ))),
        Err(e) => {
            Err(RedquillError::Decode(format!("authentication response isn't JSON: {e}")))
        }
    }
}

fn parse_json_body(path: &str, body: &str) -> Result<Value> {
    let value: Value = serde_json::from_str(body)
        .map_err(|e| RedquillError::Decode(format!("{path}: response body isn't JSON: {e}")))?;
    if let Some(message) = envelope_error(&value) {
        return Err(RedquillError::Api(message));
    }
    Ok(value)
}

/// Default bare hosts to `https`; honor a scheme when one is present.
fn normalize_instance_url(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{trimmed}")
    }
}
