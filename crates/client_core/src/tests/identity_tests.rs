use std::sync::Arc;

use anyhow::Result;
use axum::{
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio::{
    net::TcpListener,
    sync::{broadcast::error::TryRecvError, Mutex},
};

use super::*;
use crate::session::{SessionController, SessionStatus};

fn session_json(login: &str) -> serde_json::Value {
    json!({
        "installationId": 4242,
        "userLogin": login,
        "userId": 7,
        "token": "ghs_secret",
        "createdAt": "2026-03-01T12:00:00Z",
        "expiresAt": "2026-03-01T20:00:00Z"
    })
}

async fn spawn_identity_server(logout_succeeds: bool) -> Result<(String, Arc<Mutex<u32>>)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let logouts = Arc::new(Mutex::new(0u32));
    let logout_counter = logouts.clone();
    let app = Router::new()
        .route(
            "/api/auth/session",
            get(|| async { Json(json!({"authenticated": false})) }),
        )
        .route(
            "/api/auth/callback",
            get(|| async {
                Json(json!({
                    "success": true,
                    "message": "Installation complete",
                    "user": {"login": "octo", "id": 7},
                    "fork": {
                        "owner": "octo",
                        "repoName": "workflows",
                        "url": "https://github.com/octo/workflows",
                        "status": "exists"
                    },
                    "session": session_json("octo")
                }))
            }),
        )
        .route(
            "/api/auth/logout",
            post(move || {
                let logout_counter = logout_counter.clone();
                async move {
                    *logout_counter.lock().await += 1;
                    if logout_succeeds {
                        Json(json!({"success": true, "message": "Logged out"}))
                    } else {
                        Json(json!({"success": false, "message": "Session store unavailable"}))
                    }
                }
            }),
        );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api"), logouts))
}

#[test]
fn describe_prefers_text_and_hides_structured_values() {
    assert_eq!(
        IdentityError::Message("token expired".into()).describe("fallback"),
        "token expired"
    );
    assert_eq!(
        IdentityError::Message("   ".into()).describe("fallback"),
        "fallback"
    );
    assert_eq!(
        IdentityError::from(json!({"code": 500})).describe("fallback"),
        "fallback"
    );
    assert_eq!(
        IdentityError::from(json!("plain text")),
        IdentityError::Message("plain text".into())
    );
}

#[tokio::test]
async fn unauthenticated_session_response_means_no_session() -> Result<()> {
    let (base_url, _) = spawn_identity_server(true).await?;
    let backend = ApiIdentityBackend::new(ApiClient::new(&base_url)?);

    assert_eq!(backend.current_session().await?, None);
    Ok(())
}

#[tokio::test]
async fn completed_installation_is_pushed_to_controller() -> Result<()> {
    let (base_url, _) = spawn_identity_server(true).await?;
    let backend = Arc::new(ApiIdentityBackend::new(ApiClient::new(&base_url)?));
    let controller = SessionController::new(backend.clone());
    assert_eq!(
        controller.initialize().await.status,
        SessionStatus::Unauthenticated
    );
    let mut events = controller.subscribe();

    let response = backend.complete_installation("4242", "install").await?;

    assert_eq!(response.user.login, "octo");
    let snapshot = tokio::time::timeout(std::time::Duration::from_secs(2), events.recv())
        .await?
        .expect("snapshot");
    assert_eq!(snapshot.status, SessionStatus::Authenticated);
    assert_eq!(
        snapshot.session.map(|session| session.user_login),
        Some("octo".to_string())
    );
    Ok(())
}

#[tokio::test]
async fn successful_sign_out_pushes_absent_session() -> Result<()> {
    let (base_url, logouts) = spawn_identity_server(true).await?;
    let backend = ApiIdentityBackend::new(ApiClient::new(&base_url)?);
    let mut changes = backend.subscribe();

    backend.sign_out().await?;

    assert_eq!(changes.try_recv(), Ok(None));
    assert_eq!(*logouts.lock().await, 1);
    Ok(())
}

#[tokio::test]
async fn unsuccessful_sign_out_reports_server_message() -> Result<()> {
    let (base_url, _) = spawn_identity_server(false).await?;
    let backend = ApiIdentityBackend::new(ApiClient::new(&base_url)?);
    let mut changes = backend.subscribe();

    let err = backend.sign_out().await.expect_err("sign out rejected");

    assert_eq!(
        err,
        IdentityError::Message("Session store unavailable".into())
    );
    assert_eq!(changes.try_recv(), Err(TryRecvError::Empty));
    Ok(())
}
