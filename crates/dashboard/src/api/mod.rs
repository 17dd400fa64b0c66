//! HTTP access to the panel backend. Every call is marked as an XHR so the
//! backend answers with JSON instead of redirects.
use reqwest::header::{HeaderValue, CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::ApiError;

pub mod panel;
pub mod session;

pub use panel::StatusSource;
pub use session::PanelSession;

pub const REQUESTED_WITH_HEADER: &str = "X-Requested-With";
pub const REQUESTED_WITH_VALUE: &str = "XMLHttpRequest";

/// Method and optional JSON body of a request. Defaults to a bodyless GET.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<serde_json::Value>,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            method: Method::GET,
            body: None,
        }
    }
}

impl RequestOptions {
    pub fn method(method: Method) -> Self {
        Self { method, body: None }
    }

    pub fn post() -> Self {
        Self::method(Method::POST)
    }

    /// Attaches a JSON body. Picking a method that carries a body is up to the caller.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::Decode(format!("Failed to encode request body: {e}")))?;
        self.body = Some(value);
        Ok(self)
    }
}

#[derive(Debug, Clone)]
pub struct PanelClient {
    http: Client,
    base_url: Url,
}

impl PanelClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = Client::builder()
            .user_agent(crate::version::user_agent())
            .cookie_store(true)
            .redirect(Policy::none())
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: Url::parse(base_url)?,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base_url.join(path)?)
    }

    /// Builds `/{segments..}` with every segment percent-encoded, for paths
    /// carrying names such as `ops@example.com` or `tenant one`.
    pub(crate) fn segments(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.set_query(None);
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .clear()
            .extend(segments);
        Ok(url)
    }

    fn prepare(&self, method: Method, url: Url) -> RequestBuilder {
        self.http
            .request(method, url)
            .header(REQUESTED_WITH_HEADER, HeaderValue::from_static(REQUESTED_WITH_VALUE))
    }

    /// Sends a request to `path` (relative to the panel URL) and parses the
    /// answer as JSON.
    ///
    /// Non-2xx answers become [`ApiError::Status`] (or [`ApiError::Unauthorized`]
    /// for 401), carrying the backend's `error`/`detail` message when it sent one.
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        self.send_json(self.endpoint(path)?, options).await
    }

    pub(crate) async fn send_json<T: DeserializeOwned>(
        &self,
        url: Url,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        debug!(method = %options.method, url = %url, "Sending panel request.");

        let mut request = self.prepare(options.method, url);
        if let Some(body) = &options.body {
            request = request
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(body.to_string());
        }

        let response = request.send().await?;
        read_json(response).await
    }

    /// Sends a url-encoded form, the way the panel's HTML forms do.
    pub async fn submit_form<T, F>(&self, path: &str, form: &F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Serialize + ?Sized,
    {
        self.send_form(self.endpoint(path)?, form).await
    }

    pub(crate) async fn send_form<T, F>(&self, url: Url, form: &F) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        F: Serialize + ?Sized,
    {
        debug!(url = %url, "Submitting panel form.");
        let response = self.prepare(Method::POST, url).form(form).send().await?;
        read_json(response).await
    }

    /// Logs in with the panel's admin credentials; the session cookie is kept
    /// for subsequent requests.
    pub async fn login(&self, username: &str, password: &str) -> Result<(), ApiError> {
        let url = self.endpoint("/login")?;
        let response = self
            .http
            .post(url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_redirection() {
            return Err(ApiError::Status {
                status,
                message: "Unexpected login response".to_string(),
            });
        }

        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if location.starts_with("/login") {
            warn!(user = %username, "Panel rejected login.");
            return Err(ApiError::InvalidCredentials);
        }

        debug!(user = %username, "Logged in to panel.");
        Ok(())
    }

    /// Ends the session. The backend answers with a redirect to `/login`.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let response = self.http.get(self.endpoint("/logout")?).send().await?;
        let status = response.status();
        if !status.is_redirection() && !status.is_success() {
            return Err(ApiError::Status {
                status,
                message: "Unexpected logout response".to_string(),
            });
        }
        debug!("Logged out of panel.");
        Ok(())
    }
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, ApiError> {
    let status = response.status();
    let bytes = response.bytes().await?;

    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    if !status.is_success() {
        return Err(ApiError::Status {
            status,
            message: error_message(&bytes),
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Pulls a human-readable message out of an error body. The panel uses
/// `{"error": ..}` for its own answers and `{"detail": ..}` for framework errors.
fn error_message(body: &[u8]) -> String {
    if let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["error", "detail", "message"] {
            if let Some(message) = value.get(key).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        "empty response".to_string()
    } else {
        text.chars().take(200).collect()
    }
}
