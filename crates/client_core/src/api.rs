//! HTTP client for the workflow service.
//!
//! Credentials travel out-of-band as a `Cookie` header. Every response goes
//! through [`read_json`], which applies the shared error-mapping rules.

use std::time::Duration;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, COOKIE, LOCATION},
    multipart::{Form, Part},
    redirect::Policy,
    Client, Response, StatusCode,
};
use serde::de::DeserializeOwned;
use shared::{
    error::ApiError,
    protocol::{
        CallbackQuery, CallbackResponse, LogoutResponse, SessionResponse, UploadResponse,
        WorkflowStatusResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{error::RequestError, submission::WorkflowUploader};

#[derive(Debug, Clone, Default)]
pub struct ApiClientOptions {
    pub session_cookie: Option<String>,
    pub timeout: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> anyhow::Result<Self> {
        Self::with_options(base_url, ApiClientOptions::default())
    }

    pub fn with_options(base_url: &str, options: ApiClientOptions) -> anyhow::Result<Self> {
        let base_url = Url::parse(base_url.trim_end_matches('/'))
            .with_context(|| format!("invalid api base url: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("api base url must be hierarchical: {base_url}"));
        }

        let mut headers = HeaderMap::new();
        if let Some(cookie) = options.session_cookie.as_deref() {
            let value = HeaderValue::from_str(cookie)
                .context("session cookie is not a valid header value")?;
            headers.insert(COOKIE, value);
        }

        // The install endpoint answers with a redirect the caller must see.
        let mut builder = Client::builder()
            .redirect(Policy::none())
            .default_headers(headers);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to create HTTP client")?;

        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// `GET /auth/install`: the URL the user must visit to install the app.
    pub async fn install_url(&self) -> Result<String, RequestError> {
        let url = self.endpoint(&["auth", "install"]);
        debug!(%url, "requesting install redirect");
        let response = self.http.get(url).send().await.map_err(RequestError::network)?;
        let status = response.status();

        if status == StatusCode::FOUND {
            return response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string)
                .ok_or(RequestError::Redirect {
                    status: status.as_u16(),
                });
        }
        if status.is_client_error() || status.is_server_error() {
            let body = response.bytes().await.map_err(RequestError::network)?;
            return Err(ApiError::from_body(status.as_u16(), &body).into());
        }
        warn!(status = status.as_u16(), "install endpoint did not redirect");
        Err(RequestError::Redirect {
            status: status.as_u16(),
        })
    }

    /// `GET /auth/callback`: exchanges an installation for a user session.
    pub async fn complete_installation(
        &self,
        installation_id: &str,
        setup_action: &str,
    ) -> Result<CallbackResponse, RequestError> {
        let response = self
            .http
            .get(self.endpoint(&["auth", "callback"]))
            .query(&CallbackQuery {
                installation_id: installation_id.to_string(),
                setup_action: setup_action.to_string(),
            })
            .send()
            .await
            .map_err(RequestError::network)?;
        read_json(response).await
    }

    pub async fn get_session(&self) -> Result<SessionResponse, RequestError> {
        let response = self
            .http
            .get(self.endpoint(&["auth", "session"]))
            .send()
            .await
            .map_err(RequestError::network)?;
        read_json(response).await
    }

    pub async fn logout(&self) -> Result<LogoutResponse, RequestError> {
        let response = self
            .http
            .post(self.endpoint(&["auth", "logout"]))
            .send()
            .await
            .map_err(RequestError::network)?;
        read_json(response).await
    }

    /// `POST /workflows/upload` with the file in multipart field `file`.
    pub async fn upload_workflow(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, RequestError> {
        debug!(file_name, size_bytes = bytes.len(), "uploading workflow");
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name.to_string()));
        let response = self
            .http
            .post(self.endpoint(&["workflows", "upload"]))
            .multipart(form)
            .send()
            .await
            .map_err(RequestError::network)?;
        read_json(response).await
    }

    /// `GET /workflows/status/{fileName}`; the name is encoded as one path segment.
    pub async fn workflow_status(
        &self,
        file_name: &str,
    ) -> Result<WorkflowStatusResponse, RequestError> {
        let response = self
            .http
            .get(self.endpoint(&["workflows", "status", file_name]))
            .send()
            .await
            .map_err(RequestError::network)?;
        read_json(response).await
    }
}

#[async_trait]
impl WorkflowUploader for ApiClient {
    async fn upload_workflow(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadResponse, RequestError> {
        ApiClient::upload_workflow(self, file_name, bytes).await
    }
}

/// Applies the response contract: non-2xx bodies resolve to an [`ApiError`],
/// 2xx bodies must decode as `T`.
pub async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RequestError> {
    let status = response.status();
    let body = response.bytes().await.map_err(RequestError::network)?;

    if !status.is_success() {
        let api_error = ApiError::from_body(status.as_u16(), &body);
        debug!(
            status = status.as_u16(),
            message = %api_error.user_message,
            "request failed"
        );
        return Err(api_error.into());
    }

    serde_json::from_slice(&body).map_err(|err| RequestError::Decode {
        status: status.as_u16(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
