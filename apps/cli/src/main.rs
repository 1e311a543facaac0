mod config;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    submission::UPLOADED_MESSAGE, ApiClient, ApiClientOptions, ApiIdentityBackend,
    NotificationKind, Notifier, NotifierEvent, SelectOutcome, SessionController, SessionSnapshot,
    SessionStatus, SubmissionController, SubmissionObserver, SubmitBlocked, SubmitOutcome,
    UploadCandidate,
};
use shared::domain::WorkflowStatus;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{load_settings, Settings};

#[derive(Parser, Debug)]
#[command(name = "workflow-cli", about = "Sign in and upload workflow files")]
struct Cli {
    /// Path to a client.toml; defaults to ./client.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(long, short)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the URL that installs the app on your account.
    Install,
    /// Complete an installation using the values from the callback URL.
    Callback {
        #[arg(long)]
        installation_id: String,
        #[arg(long, default_value = "install")]
        setup_action: String,
    },
    Session,
    Refresh,
    Logout,
    /// Run the local checks on a workflow file without uploading it.
    Validate { path: PathBuf },
    Upload { path: PathBuf },
    Status {
        file_name: String,
        #[arg(long)]
        watch: bool,
        #[arg(long, default_value_t = 5)]
        interval_secs: u64,
    },
}

/// Prints selection events as they happen.
struct ConsoleObserver;

impl SubmissionObserver for ConsoleObserver {
    fn file_selected(&self, candidate: &UploadCandidate) {
        println!(
            "selected {} ({} bytes)",
            candidate.file_name, candidate.size_bytes
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let settings = load_settings(cli.config.as_deref())?;
    debug!(api_base_url = %settings.api_base_url, "settings loaded");
    let api = build_api(&settings)?;

    let notifier = Notifier::new(settings.notification_ttl());
    let mut notifications = notifier.subscribe();
    let result = run(cli.command, api, &notifier, &mut notifications).await;
    print_notifications(&mut notifications);
    notifier.shutdown().await;
    result
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_api(settings: &Settings) -> Result<ApiClient> {
    ApiClient::with_options(
        &settings.api_base_url,
        ApiClientOptions {
            session_cookie: settings.session_cookie.clone(),
            timeout: Some(settings.request_timeout()),
        },
    )
    .context("failed to configure api client")
}

async fn run(
    command: Command,
    api: ApiClient,
    notifier: &Arc<Notifier>,
    notifications: &mut broadcast::Receiver<NotifierEvent>,
) -> Result<()> {
    match command {
        Command::Install => {
            let location = api.install_url().await.map_err(user_error)?;
            println!("open this URL to install the app:\n{location}");
        }
        Command::Callback {
            installation_id,
            setup_action,
        } => {
            let backend = Arc::new(ApiIdentityBackend::new(api));
            let controller = SessionController::new(backend.clone());
            controller.initialize().await;
            let mut changes = controller.subscribe();

            let response = match backend
                .complete_installation(&installation_id, &setup_action)
                .await
            {
                Ok(response) => response,
                Err(err) => {
                    notifier
                        .push(NotificationKind::Error, err.user_message())
                        .await;
                    return Err(user_error(err));
                }
            };
            notifier
                .push(NotificationKind::Success, response.message.clone())
                .await;
            println!(
                "user {} (id {}), fork {}/{} [{:?}] {}",
                response.user.login,
                response.user.id.0,
                response.fork.owner,
                response.fork.repo_name,
                response.fork.status,
                response.fork.url
            );
            if response.session.is_some() {
                let _ = tokio::time::timeout(Duration::from_secs(1), changes.recv()).await;
            }
            print_session(&controller.snapshot().await);
            controller.shutdown().await;
        }
        Command::Session => {
            let controller = SessionController::new(Arc::new(ApiIdentityBackend::new(api)));
            let snapshot = controller.initialize().await;
            print_session(&snapshot);
            controller.shutdown().await;
        }
        Command::Refresh => {
            let controller = SessionController::new(Arc::new(ApiIdentityBackend::new(api)));
            controller.initialize().await;
            let snapshot = controller.refresh().await;
            controller.shutdown().await;
            print_session(&snapshot);
            if let Some(error) = snapshot.error {
                notifier.push(NotificationKind::Error, error.clone()).await;
                bail!(error);
            }
        }
        Command::Logout => {
            let controller = SessionController::new(Arc::new(ApiIdentityBackend::new(api)));
            controller.initialize().await;
            let snapshot = controller.logout().await;
            controller.shutdown().await;
            match snapshot.error.clone() {
                Some(error) => {
                    notifier.push(NotificationKind::Error, error.clone()).await;
                    print_session(&snapshot);
                    bail!(error);
                }
                None => {
                    notifier
                        .push(NotificationKind::Success, "Signed out")
                        .await;
                }
            }
        }
        Command::Validate { path } => {
            let controller = SubmissionController::with_observer(
                Arc::new(api),
                Arc::new(ConsoleObserver),
            );
            let outcome = controller.select_path(&path).await;
            controller.shutdown().await;
            match outcome {
                SelectOutcome::Accepted(summary) => {
                    println!("{} is ready to upload", summary.file_name);
                }
                SelectOutcome::Rejected(err) => bail!(err.reason().to_string()),
                SelectOutcome::Ignored => bail!("selection was not processed"),
            }
        }
        Command::Upload { path } => {
            upload(api, &path, notifier).await?;
        }
        Command::Status {
            file_name,
            watch,
            interval_secs,
        } => {
            let interval = Duration::from_secs(interval_secs.max(1));
            loop {
                let status = api
                    .workflow_status(&file_name)
                    .await
                    .map_err(user_error)?;
                println!(
                    "{}: {:?}{}",
                    status.file_name,
                    status.status,
                    status
                        .workflow_run_url
                        .as_deref()
                        .map(|url| format!(" ({url})"))
                        .unwrap_or_default()
                );
                if let Some(message) = status.error_message.as_deref() {
                    println!("  error: {message}");
                }
                if !watch || status.status.is_terminal() {
                    if status.status == WorkflowStatus::Failed {
                        notifier
                            .push(NotificationKind::Error, "Workflow run failed")
                            .await;
                    }
                    break;
                }
                print_notifications(notifications);
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = tokio::signal::ctrl_c() => {
                        info!("status watch interrupted");
                        break;
                    }
                }
            }
        }
    }
    Ok(())
}

async fn upload(api: ApiClient, path: &std::path::Path, notifier: &Arc<Notifier>) -> Result<()> {
    let session = SessionController::new(Arc::new(ApiIdentityBackend::new(api.clone())));
    let session_snapshot = session.initialize().await;
    session.shutdown().await;

    let controller =
        SubmissionController::with_observer(Arc::new(api), Arc::new(ConsoleObserver));
    controller
        .set_disabled(!session_snapshot.is_authenticated())
        .await;

    let outcome = match controller.select_path(path).await {
        SelectOutcome::Accepted(_) => controller.submit().await,
        SelectOutcome::Rejected(err) => {
            notifier.push(NotificationKind::Error, err.reason()).await;
            controller.shutdown().await;
            bail!(err.reason().to_string());
        }
        SelectOutcome::Ignored => {
            controller.shutdown().await;
            bail!("selection was not processed");
        }
    };
    controller.shutdown().await;

    match outcome {
        SubmitOutcome::Succeeded(response) => {
            notifier
                .push(NotificationKind::Success, UPLOADED_MESSAGE)
                .await;
            println!("{}: {}", response.file_name, response.message);
            println!("commit {}", response.commit_sha);
            if let Some(url) = response.workflow_run_url.as_deref() {
                println!("workflow run {url}");
            }
            Ok(())
        }
        SubmitOutcome::Failed(err) => {
            warn!(status = ?err.status(), "upload failed");
            notifier
                .push(NotificationKind::Error, err.user_message())
                .await;
            Err(user_error(err))
        }
        SubmitOutcome::Ignored(SubmitBlocked::Disabled) => {
            bail!("not signed in; run `workflow-cli install` first")
        }
        SubmitOutcome::Ignored(reason) => bail!("upload not started: {reason:?}"),
    }
}

fn print_session(snapshot: &SessionSnapshot) {
    match (&snapshot.status, &snapshot.session) {
        (SessionStatus::Authenticated, Some(session)) => {
            println!(
                "signed in as {} (user {}, installation {}), expires {}",
                session.user_login,
                session.user_id.0,
                session.installation_id.0,
                session.expires_at.to_rfc3339()
            );
        }
        _ => println!("not signed in"),
    }
    if let Some(error) = snapshot.error.as_deref() {
        println!("error: {error}");
    }
}

fn print_notifications(notifications: &mut broadcast::Receiver<NotifierEvent>) {
    while let Ok(event) = notifications.try_recv() {
        if let NotifierEvent::Shown(notification) = event {
            let label = match notification.kind {
                NotificationKind::Info => "info",
                NotificationKind::Success => "ok",
                NotificationKind::Error => "error",
            };
            eprintln!("[{label}] {}", notification.message);
        }
    }
}

fn user_error(err: client_core::RequestError) -> anyhow::Error {
    anyhow::anyhow!(err.user_message())
}
