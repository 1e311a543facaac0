//! Identity backend seam: session load/refresh, sign-out, and the pushed
//! change stream.

use async_trait::async_trait;
use serde_json::Value;
use shared::{domain::Session, protocol::CallbackResponse};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::info;

use crate::{api::ApiClient, error::RequestError};

/// A pushed session update; `None` means signed out.
pub type SessionChange = Option<Session>;

/// Error values as the identity backend reports them. Some backends hand
/// back structured objects instead of text; those are kept but never shown.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IdentityError {
    #[error("{0}")]
    Message(String),
    #[error("identity backend returned a non-text error")]
    Opaque(Value),
}

impl IdentityError {
    /// A descriptive string suitable for display, or `fallback` when the
    /// backend gave nothing usable.
    pub fn describe(&self, fallback: &str) -> String {
        match self {
            Self::Message(message) if !message.trim().is_empty() => message.clone(),
            _ => fallback.to_string(),
        }
    }
}

impl From<Value> for IdentityError {
    fn from(value: Value) -> Self {
        match value {
            Value::String(message) => Self::Message(message),
            other => Self::Opaque(other),
        }
    }
}

impl From<RequestError> for IdentityError {
    fn from(err: RequestError) -> Self {
        Self::Message(err.user_message())
    }
}

#[async_trait]
pub trait IdentityBackend: Send + Sync {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError>;
    async fn refresh_session(&self) -> Result<Option<Session>, IdentityError>;
    async fn sign_out(&self) -> Result<(), IdentityError>;
    /// Each receiver sees every change pushed after it was created.
    fn subscribe(&self) -> broadcast::Receiver<SessionChange>;
}

/// Identity backend backed by the workflow service's auth endpoints.
pub struct ApiIdentityBackend {
    api: ApiClient,
    changes: broadcast::Sender<SessionChange>,
}

impl ApiIdentityBackend {
    pub fn new(api: ApiClient) -> Self {
        let (changes, _) = broadcast::channel(16);
        Self { api, changes }
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Completes the installation callback and pushes the new session, if any.
    pub async fn complete_installation(
        &self,
        installation_id: &str,
        setup_action: &str,
    ) -> Result<CallbackResponse, RequestError> {
        let response = self
            .api
            .complete_installation(installation_id, setup_action)
            .await?;
        if let Some(session) = response.session.clone() {
            info!(user = %session.user_login, "installation callback produced a session");
            let _ = self.changes.send(Some(session));
        }
        Ok(response)
    }
}

#[async_trait]
impl IdentityBackend for ApiIdentityBackend {
    async fn current_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(self.api.get_session().await?.into_session())
    }

    async fn refresh_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(self.api.get_session().await?.into_session())
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let response = self.api.logout().await?;
        if !response.success {
            return Err(IdentityError::Message(response.message));
        }
        let _ = self.changes.send(None);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/identity_tests.rs"]
mod tests;
