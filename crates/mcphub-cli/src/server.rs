use anyhow::Context;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use mcphub_core::wizard::{
    BackupsResponse, ConfigResponse, DetectResponse, HealthResponse, ImportRequest,
    ImportResponse, ReplaceRequest, ReplaceResponse, RestoreRequest, RestoreResponse,
    SaveRequest, SaveResponse, VerifyRequest, VerifyResponse,
};
use mcphub_core::WizardService;
use std::sync::Arc;
use tracing::info;

/// HTTP adapter around `WizardService` for the setup UI. Every endpoint
/// answers 200 with a `{success, ...}` payload; failures are carried in the
/// body, not the status code.
pub async fn serve(service: WizardService, host: &str, port: u16) -> anyhow::Result<()> {
    let app = router(Arc::new(service));
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .with_context(|| format!("failed to bind {host}:{port}"))?;
    info!(host, port, "wizard service listening");
    axum::serve(listener, app).await?;
    Ok(())
}

fn router(service: Arc<WizardService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/clients", get(clients))
        .route("/import", post(import))
        .route("/verify", post(verify))
        .route("/save", post(save))
        .route("/replace", post(replace))
        .route("/backups", get(backups))
        .route("/restore", post(restore))
        .route("/config", get(config))
        .with_state(service)
}

async fn health(State(service): State<Arc<WizardService>>) -> Json<HealthResponse> {
    Json(service.health())
}

async fn clients(State(service): State<Arc<WizardService>>) -> Json<DetectResponse> {
    Json(service.detect_clients())
}

async fn import(
    State(service): State<Arc<WizardService>>,
    Json(request): Json<ImportRequest>,
) -> Json<ImportResponse> {
    Json(service.import(&request))
}

async fn verify(
    State(service): State<Arc<WizardService>>,
    Json(request): Json<VerifyRequest>,
) -> Json<VerifyResponse> {
    Json(service.verify(&request).await)
}

async fn save(
    State(service): State<Arc<WizardService>>,
    Json(request): Json<SaveRequest>,
) -> Json<SaveResponse> {
    Json(service.save(&request))
}

async fn replace(
    State(service): State<Arc<WizardService>>,
    Json(request): Json<ReplaceRequest>,
) -> Json<ReplaceResponse> {
    Json(service.replace(&request))
}

async fn backups(State(service): State<Arc<WizardService>>) -> Json<BackupsResponse> {
    Json(service.backups())
}

async fn restore(
    State(service): State<Arc<WizardService>>,
    Json(request): Json<RestoreRequest>,
) -> Json<RestoreResponse> {
    Json(service.restore(&request))
}

async fn config(State(service): State<Arc<WizardService>>) -> Json<ConfigResponse> {
    Json(service.config())
}
