//! HTTP client implementations for the parq SDK
//!
//! `BaseClient` owns the transport and the retry policy for requests that
//! never received an HTTP response. `ApiClient` layers the credential
//! lifecycle on top: bearer attachment, the single-flight 401/refresh
//! protocol, pre-emptive refresh scheduling and the login-redirect
//! dispatch. Views never handle authentication themselves.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parq_protocol::{RefreshRequest, RefreshResponse, User};

use crate::config::ClientConfig;
use crate::error::{ParqError, Result};
use crate::jwt;
use crate::session::{AuthState, Session};
use crate::store::{RedirectStore, TokenStore};

const REFRESH_ENDPOINT: &str = "/auth/refresh/";
const ME_ENDPOINT: &str = "/auth/me/";

/// Request body shapes the transport understands
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Multipart(MultipartBody),
}

/// A multipart form: text fields plus an optional file part
#[derive(Debug, Clone)]
pub struct MultipartBody {
    pub fields: Vec<(String, String)>,
    pub file: Option<FilePart>,
}

#[derive(Debug, Clone)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

/// One outgoing API call, transport-agnostic
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

/// The undecoded response: status plus body text
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

/// Transport seam between the client logic and the HTTP stack
///
/// Production uses `HttpTransport` over reqwest; tests script a mock so the
/// refresh/retry ordering contracts can be exercised deterministically.
#[async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse>;
}

/// reqwest-backed transport
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.effective_timeout())
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: ApiRequest) -> Result<RawResponse> {
        let mut builder = self.client.request(request.method, &request.url);

        if let Some(token) = &request.bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        builder = match request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder
                .header("Content-Type", "application/json")
                .json(&value),
            RequestBody::Multipart(body) => {
                let mut form = reqwest::multipart::Form::new();
                for (name, value) in body.fields {
                    form = form.text(name, value);
                }
                if let Some(file) = body.file {
                    let part = reqwest::multipart::Part::bytes(file.bytes)
                        .file_name(file.filename)
                        .mime_str(&file.mime)
                        .map_err(|e| {
                            ParqError::invalid_input(format!("Invalid MIME type: {}", e))
                        })?;
                    form = form.part(file.name, part);
                }
                builder.multipart(form)
            }
        };

        let response = builder.send().await.map_err(ParqError::network_from_reqwest)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(ParqError::network_from_reqwest)?;

        Ok(RawResponse { status, body })
    }
}

fn is_transient_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

fn jitter_ms(cap_ms: u64) -> u64 {
    if cap_ms == 0 {
        return 0;
    }
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64)
        .unwrap_or(0);
    nanos % cap_ms
}

/// Exponential backoff with jitter bounded to a quarter of the step, which
/// keeps the sequence strictly increasing across attempts
fn backoff_delay(base_ms: u64, attempt: u32) -> Duration {
    let step = base_ms.saturating_mul(1u64 << (attempt.saturating_sub(1)).min(16));
    Duration::from_millis(step + jitter_ms(step / 4 + 1))
}

/// Pull the human-readable detail out of an error body
fn error_detail(status: u16, body: &str) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            let detail = v.get("detail").or_else(|| v.get("error"))?;
            detail.as_str().map(str::to_string)
        });

    match from_json {
        Some(detail) => detail,
        None if body.trim().is_empty() => format!("HTTP {}", status),
        None => {
            let trimmed = body.trim();
            let mut snippet: String = trimmed.chars().take(200).collect();
            if snippet.len() < trimmed.len() {
                snippet.push('…');
            }
            snippet
        }
    }
}

/// Base HTTP client: transport + config + network retry policy
#[derive(Debug, Clone)]
pub struct BaseClient {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl BaseClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        config.validate()?;
        let transport = Arc::new(HttpTransport::new(&config)?);
        Ok(Self { transport, config })
    }

    pub fn with_transport(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self { transport, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send, retrying bounded times when no HTTP response was received
    ///
    /// `retry_transient_status` additionally retries 429/5xx responses; only
    /// the token-refresh call opts in (business callers interpret those
    /// statuses themselves).
    pub async fn send_with_retry(
        &self,
        request: ApiRequest,
        retry_transient_status: bool,
    ) -> Result<RawResponse> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let failure = match self.transport.execute(request.clone()).await {
                Ok(response) => {
                    if retry_transient_status && is_transient_status(response.status) {
                        ParqError::api(response.status, error_detail(response.status, &response.body))
                    } else {
                        return Ok(response);
                    }
                }
                Err(e) if e.is_network_error() => e,
                Err(e) => return Err(e),
            };

            if attempt >= self.config.max_attempts {
                return Err(failure);
            }

            let delay = backoff_delay(self.config.backoff_base_ms, attempt);
            tracing::debug!(
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retrying request"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Unauthenticated typed request (login, registration, refresh)
    pub async fn request<T, R>(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&T>,
    ) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let body = match payload {
            Some(data) => RequestBody::Json(serde_json::to_value(data)?),
            None => RequestBody::Empty,
        };
        let request = ApiRequest {
            method,
            url: self.config.endpoint_url(endpoint),
            bearer: None,
            body,
        };
        let response = self.send_with_retry(request, false).await?;
        let response = check_status(response)?;
        decode(&response)
    }
}

fn check_status(response: RawResponse) -> Result<RawResponse> {
    if response.status < 400 {
        Ok(response)
    } else {
        Err(ParqError::api(
            response.status,
            error_detail(response.status, &response.body),
        ))
    }
}

fn decode<R: DeserializeOwned>(response: &RawResponse) -> Result<R> {
    let body = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };
    serde_json::from_str(body)
        .map_err(|e| ParqError::invalid_response(format!("Invalid API response: {}", e)))
}

/// Authenticated API client
///
/// The single request surface every service goes through. Owns the session
/// (tokens, cached user, readiness) and recovers from token expiry without
/// callers ever seeing a 401.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: BaseClient,
    session: Arc<Session>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let store = if config.token_storage.enabled {
            match &config.token_storage.storage_path {
                Some(path) => Some(TokenStore::new(path.as_str())?),
                None => None,
            }
        } else {
            None
        };
        let redirects = config
            .token_storage
            .storage_path
            .as_ref()
            .filter(|_| config.token_storage.enabled)
            .map(|path| {
                let mut sidecar = std::path::PathBuf::from(path);
                sidecar.set_file_name("redirects.json");
                RedirectStore::new(sidecar)
            });

        let base = BaseClient::new(config)?;
        let session = Arc::new(Session::new(store, redirects));
        Ok(Self { base, session })
    }

    /// Test constructor with a scripted transport and explicit session
    pub fn with_transport(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        session: Arc<Session>,
    ) -> Self {
        Self {
            base: BaseClient::with_transport(config, transport),
            session,
        }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn config(&self) -> &ClientConfig {
        self.base.config()
    }

    pub(crate) fn base(&self) -> &BaseClient {
        &self.base
    }

    // --- Public request surface ---

    /// Issue an authenticated JSON request and decode the response
    pub async fn request<T, R>(
        &self,
        method: Method,
        endpoint: &str,
        payload: Option<&T>,
    ) -> Result<R>
    where
        T: Serialize,
        R: DeserializeOwned,
    {
        let body = match payload {
            Some(data) => RequestBody::Json(serde_json::to_value(data)?),
            None => RequestBody::Empty,
        };
        let response = self.send_authenticated(method, endpoint, body).await?;
        decode(&response)
    }

    /// Issue an authenticated multipart request (profile update with avatar)
    pub async fn request_multipart<R>(
        &self,
        method: Method,
        endpoint: &str,
        body: MultipartBody,
    ) -> Result<R>
    where
        R: DeserializeOwned,
    {
        let response = self
            .send_authenticated(method, endpoint, RequestBody::Multipart(body))
            .await?;
        decode(&response)
    }

    // --- Core 401 protocol ---

    async fn send_authenticated(
        &self,
        method: Method,
        endpoint: &str,
        body: RequestBody,
    ) -> Result<RawResponse> {
        let url = self.base.config().endpoint_url(endpoint);

        let bearer = self.session.access_token();
        if bearer.is_none() && self.session.refresh_token().is_none() {
            // No credentials at all: fail before touching the network.
            return Err(ParqError::session_not_found(
                "No credentials; sign in first",
            ));
        }

        let first = ApiRequest {
            method: method.clone(),
            url: url.clone(),
            bearer,
            body: body.clone(),
        };
        let response = self.base.send_with_retry(first, false).await?;
        if response.status != 401 {
            return check_status(response);
        }

        // Expired or rejected credential: recover through the single-flight
        // refresh, then retry the original request exactly once.
        let fresh = self.refresh_after_unauthorized().await?;

        let retry = ApiRequest {
            method,
            url,
            bearer: Some(fresh),
            body,
        };
        let response = self.base.send_with_retry(retry, false).await?;
        if response.status == 401 {
            self.expel("access token rejected immediately after refresh");
            return Err(ParqError::authentication(
                "Access token rejected immediately after refresh",
            ));
        }
        check_status(response)
    }

    async fn refresh_after_unauthorized(&self) -> Result<String> {
        if self.session.refresh_token().is_none() {
            self.expel("received 401 with no refresh token");
            return Err(ParqError::session_not_found(
                "Session expired and no refresh token is available",
            ));
        }
        self.single_flight_refresh().await
    }

    /// The single-flight refresh: exactly one refresh call reaches the
    /// server for any set of concurrent observers of a 401; everyone else
    /// queues on the gate and adopts the recorded outcome.
    async fn single_flight_refresh(&self) -> Result<String> {
        let entry_epoch = self.session.refresh_epoch();
        let _gate = self.session.refresh_gate.lock().await;

        if let Some(outcome) = self.session.adopted_outcome(entry_epoch) {
            return outcome;
        }

        let outcome = self.run_refresh_cycle().await;
        self.session.complete_refresh(outcome.clone());
        outcome
    }

    async fn run_refresh_cycle(&self) -> Result<String> {
        let result = self.call_refresh_endpoint().await;
        match &result {
            Err(e) if e.is_auth_error() => {
                // The refresh token itself was rejected: the session is over.
                self.expel("refresh token rejected");
            }
            Err(e) => {
                // Transient failure: keep the credentials so a later request
                // can retry the refresh.
                tracing::debug!(error = %e, "token refresh failed transiently");
            }
            Ok(_) => {}
        }
        result
    }

    async fn call_refresh_endpoint(&self) -> Result<String> {
        let refresh = self.session.refresh_token().ok_or_else(|| {
            ParqError::session_not_found("No refresh token available")
        })?;

        let request = ApiRequest {
            method: Method::POST,
            url: self.base.config().endpoint_url(REFRESH_ENDPOINT),
            bearer: None,
            body: RequestBody::Json(serde_json::to_value(RefreshRequest { refresh })?),
        };

        // Transient statuses from the refresh endpoint retry like network
        // failures; credentials stay intact either way.
        let response = self.base.send_with_retry(request, true).await?;

        if response.status == 401 || response.status == 403 {
            return Err(ParqError::refresh_rejected(
                "Refresh token rejected by the server",
            ));
        }
        let response = check_status(response)?;
        let renewed: RefreshResponse = decode(&response)?;

        self.session
            .renew(renewed.access.clone(), renewed.refresh.clone())?;
        self.schedule_refresh(&renewed.access);
        tracing::debug!("access token renewed");
        Ok(renewed.access)
    }

    /// Refresh immediately through the single-flight gate
    ///
    /// Used by the scheduled pre-emptive refresh and by bootstrap when the
    /// stored access token has already expired.
    pub async fn refresh_now(&self) -> Result<String> {
        if self.session.refresh_token().is_none() {
            return Err(ParqError::session_not_found(
                "No refresh token available",
            ));
        }
        self.single_flight_refresh().await
    }

    // --- Pre-emptive refresh scheduling ---

    /// Arm the background refresh to fire shortly before the access token
    /// expires, so ordinary traffic rarely hits the reactive 401 path
    pub fn schedule_refresh(&self, access_token: &str) {
        let expires_at = match jwt::expires_at(access_token) {
            Ok(exp) => exp,
            Err(e) => {
                tracing::debug!(error = %e, "cannot schedule refresh for undecodable token");
                return;
            }
        };

        let lead = chrono::Duration::seconds(self.base.config().refresh_lead_secs as i64);
        let Ok(delay) = (expires_at - Utc::now() - lead).to_std() else {
            // Already inside the lead window; the next request refreshes
            // reactively.
            return;
        };

        let client = self.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // Failures stay silent here; the reactive path covers them.
            match client.refresh_now().await {
                Ok(_) => tracing::debug!("scheduled refresh completed"),
                Err(e) => tracing::debug!(error = %e, "scheduled refresh failed"),
            }
        });
        self.session.set_refresh_task(handle);
    }

    // --- Bootstrap ---

    /// Establish the session from storage at startup
    ///
    /// Validates expiries locally (no network), refreshes first if the
    /// access token is already stale, then loads the user projection. Any
    /// failure clears credentials instead of leaving a half-authenticated
    /// state. Always resolves the readiness flag.
    pub async fn initialize(&self) -> AuthState {
        let Some(stored) = self.session.load_stored() else {
            self.session.set_state(AuthState::Anonymous);
            return AuthState::Anonymous;
        };

        let now = Utc::now();
        if jwt::is_expired(&stored.refresh_token, now) {
            tracing::debug!("stored refresh token expired; starting anonymous");
            self.session.clear();
            return AuthState::Anonymous;
        }

        self.session.adopt_stored(&stored);

        if jwt::is_expired(&stored.access_token, now) {
            if let Err(e) = self.refresh_now().await {
                tracing::warn!(error = %e, "bootstrap refresh failed");
                self.session.clear();
                return AuthState::Anonymous;
            }
        }

        match self
            .request::<(), User>(Method::GET, ME_ENDPOINT, None)
            .await
        {
            Ok(user) => {
                self.session.set_user(Some(user));
                if let Some(set) = self.session.token_set() {
                    self.schedule_refresh(&set.access);
                }
                self.session.set_state(AuthState::Authenticated);
                AuthState::Authenticated
            }
            Err(e) => {
                tracing::warn!(error = %e, "bootstrap user lookup failed");
                self.session.clear();
                AuthState::Anonymous
            }
        }
    }

    // --- Irrecoverable failure handling ---

    /// Clear credentials and dispatch the (single) login redirect
    fn expel(&self, reason: &str) {
        tracing::debug!(reason, "clearing credentials");
        self.session.clear();

        if self.session.begin_redirect() {
            if self.session.should_redirect_to_login() {
                tracing::warn!("session expired; run `parq login` to sign in again");
            } else {
                tracing::warn!(
                    "repeated authentication failures; suppressing further login redirects"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_delays_strictly_increase() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=5 {
            let delay = backoff_delay(500, attempt);
            assert!(delay > previous, "attempt {} did not increase", attempt);
            previous = delay;
        }
    }

    #[test]
    fn backoff_jitter_stays_below_step() {
        for attempt in 1..=5u32 {
            let step = 500u64 * (1 << (attempt - 1));
            let delay = backoff_delay(500, attempt);
            assert!(delay >= Duration::from_millis(step));
            assert!(delay <= Duration::from_millis(step + step / 4));
        }
    }

    #[test]
    fn transient_statuses() {
        for status in [429, 500, 502, 503, 504] {
            assert!(is_transient_status(status), "{} should be transient", status);
        }
        for status in [400, 401, 403, 404, 422] {
            assert!(!is_transient_status(status), "{} should not be transient", status);
        }
    }

    #[test]
    fn error_detail_prefers_detail_field() {
        assert_eq!(
            error_detail(400, r#"{"detail":"Invalid reservation times"}"#),
            "Invalid reservation times"
        );
        assert_eq!(error_detail(500, r#"{"error":"boom"}"#), "boom");
        assert_eq!(error_detail(502, ""), "HTTP 502");
        assert_eq!(error_detail(500, "plain text"), "plain text");
    }
}
