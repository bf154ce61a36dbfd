//! Session lifecycle and authenticated HTTP plumbing

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::config::Settings;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::utils::sleep_secs_between;

#[derive(Debug, Deserialize)]
struct ClerkClientEnvelope {
    #[serde(default)]
    response: Option<ClerkClientResponse>,
}

#[derive(Debug, Default, Deserialize)]
struct ClerkClientResponse {
    #[serde(default)]
    last_active_session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    jwt: String,
}

/// Owns one identity-provider session and the credential set behind it.
///
/// All upstream calls flow through [`request_json`](Self::request_json) so
/// the bearer token, the full cookie set, and `Set-Cookie` merging stay in
/// one place.
pub struct SessionManager {
    settings: Arc<Settings>,
    http: reqwest::Client,
    credentials: RwLock<CredentialStore>,
    session_id: RwLock<Option<String>>,
    bearer_token: RwLock<Option<String>>,
    device_id: String,
}

impl SessionManager {
    /// Build a manager for one raw cookie string. No network traffic until
    /// [`init`](Self::init).
    pub fn new(settings: Arc<Settings>, raw_cookie: &str) -> Result<Self> {
        let credentials = CredentialStore::parse(raw_cookie);
        if credentials.is_empty() {
            return Err(Error::authentication("cookie string contains no cookies"));
        }
        let device_id = credentials.device_id();

        let mut headers = HeaderMap::new();
        headers.insert("Affiliate-Id", HeaderValue::from_static("undefined"));
        headers.insert(
            "Device-Id",
            HeaderValue::from_str(&format!("\"{}\"", device_id))
                .map_err(|e| Error::config(format!("Invalid device id header: {}", e)))?,
        );
        headers.insert(
            "x-suno-client",
            HeaderValue::from_static("Android prerelease-4nt180t 1.0.42"),
        );
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("com.suno.android"),
        );
        headers.insert(
            "sec-ch-ua",
            HeaderValue::from_static(
                "\"Chromium\";v=\"130\", \"Android WebView\";v=\"130\", \"Not?A_Brand\";v=\"99\"",
            ),
        );
        headers.insert("sec-ch-ua-mobile", HeaderValue::from_static("?1"));
        headers.insert("sec-ch-ua-platform", HeaderValue::from_static("\"Android\""));

        let http = reqwest::Client::builder()
            .user_agent(settings.api.user_agent.clone())
            .default_headers(headers)
            .build()?;

        Ok(Self {
            settings,
            http,
            credentials: RwLock::new(credentials),
            session_id: RwLock::new(None),
            bearer_token: RwLock::new(None),
            device_id,
        })
    }

    /// Resolve the provider session id from the current cookie set.
    ///
    /// A response without an active session id means the cookie is stale or
    /// invalid and the whole instance is unusable.
    pub async fn init(&self) -> Result<()> {
        info!("Resolving identity-provider session");
        let url = format!(
            "{}/v1/client?_is_native=true&_clerk_js_version={}&__clerk_api_version={}",
            self.settings.api.clerk_base_url,
            self.settings.api.clerk_version,
            self.settings.api.clerk_api_version,
        );
        let envelope: ClerkClientEnvelope = self.clerk_request(Method::GET, &url).await?;

        let session_id = envelope
            .response
            .unwrap_or_default()
            .last_active_session_id
            .ok_or_else(|| {
                Error::authentication(
                    "no active session for this cookie; refresh the account cookie",
                )
            })?;
        debug!(session_id = %session_id, "Session resolved");
        *self.session_id.write().await = Some(session_id);
        Ok(())
    }

    /// Exchange the session id for a fresh bearer token (keep-alive).
    ///
    /// `wait` adds a short randomized pause afterwards; polling loops use it
    /// to avoid renewing too aggressively.
    pub async fn renew(&self, wait: bool) -> Result<()> {
        let session_id = self
            .session_id
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::authentication("session id is not set; call init first"))?;

        debug!("Renewing bearer token");
        let url = format!(
            "{}/v1/client/sessions/{}/tokens?_is_native=true&_clerk_js_version={}&__clerk_api_version={}",
            self.settings.api.clerk_base_url,
            session_id,
            self.settings.api.clerk_version,
            self.settings.api.clerk_api_version,
        );
        let token: TokenResponse = self.clerk_request(Method::POST, &url).await?;
        *self.bearer_token.write().await = Some(token.jwt);

        if wait {
            sleep_secs_between(
                self.settings.timeouts.keep_alive_sleep_min,
                self.settings.timeouts.keep_alive_sleep_max,
            )
            .await;
        }
        Ok(())
    }

    /// Replace the bearer token with one captured outside the renew flow
    /// (the browser interceptor sees a fresher one than we hold)
    pub async fn adopt_bearer(&self, token: impl Into<String>) {
        *self.bearer_token.write().await = Some(token.into());
    }

    /// Current bearer token, if any
    pub async fn bearer_token(&self) -> Option<String> {
        self.bearer_token.read().await.clone()
    }

    /// Snapshot of the current credential set
    pub async fn credentials_snapshot(&self) -> CredentialStore {
        self.credentials.read().await.clone()
    }

    /// Current serialized cookie header
    pub async fn cookie_header(&self) -> String {
        self.credentials.read().await.header_value()
    }

    /// Stable device id derived from the cookie set
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Identity-provider call: authorized with the raw `__client` cookie
    /// value instead of a bearer token.
    async fn clerk_request<T: DeserializeOwned>(&self, method: Method, url: &str) -> Result<T> {
        let (cookie_header, client_token) = {
            let store = self.credentials.read().await;
            (store.header_value(), store.client_token().map(str::to_string))
        };
        let client_token = client_token
            .ok_or_else(|| Error::authentication("cookie is missing the __client token"))?;

        let request = self
            .http
            .request(method, url)
            .timeout(self.settings.timeouts.api_request)
            .header(AUTHORIZATION, client_token)
            .header(COOKIE, cookie_header);

        let response = request.send().await?;
        self.absorb_cookies(response.headers()).await;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status, body));
        }
        Ok(response.json().await?)
    }

    /// Upstream API call with bearer auth, cookie refresh, and error
    /// mapping. `body` of `None` sends no payload; `extra_headers` extends
    /// the per-instance defaults.
    pub async fn request_json<T, B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        timeout: Duration,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let cookie_header = self.cookie_header().await;
        let mut request = self
            .http
            .request(method, url)
            .timeout(timeout)
            .header(COOKIE, cookie_header);

        if let Some(token) = self.bearer_token.read().await.as_deref() {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        if let Some(headers) = extra_headers {
            request = request.headers(headers);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        self.absorb_cookies(response.headers()).await;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(upstream_error(status, body));
        }
        Ok(response.json().await?)
    }

    /// Merge authoritative `Set-Cookie` values back into the store
    async fn absorb_cookies(&self, headers: &HeaderMap) {
        let values: Vec<&str> = headers
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .collect();
        if !values.is_empty() {
            self.credentials.write().await.merge_set_cookie(values);
        }
    }
}

/// Map a non-2xx upstream status; 403 means a paid-tier gate
fn upstream_error(status: StatusCode, body: String) -> Error {
    if status == StatusCode::FORBIDDEN {
        Error::pro_feature(body)
    } else {
        Error::upstream(status.as_u16(), body)
    }
}
