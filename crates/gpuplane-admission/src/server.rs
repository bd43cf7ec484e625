//! The admission webhook server.
//!
//! Handlers are pure functions of `(request, cached cluster state, module
//! config snapshot)`; the snapshot is re-read per request and never retained.

use crate::mutate::mutate_pod;
use crate::review::{AdmissionRequest, AdmissionResponse};
use crate::validate::validate_pod;
use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use gpuplane_config::{ConfigSnapshotStore, HttpsMode};
use gpuplane_pool::ClusterCache;
use std::sync::Arc;
use tracing::info;

/// Shared state of the webhook handlers.
pub struct WebhookState {
    pub cache: Arc<ClusterCache>,
    pub config: Arc<ConfigSnapshotStore>,
}

/// Build the webhook router with `/mutate` and `/validate` endpoints.
pub fn router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate", post(handle_mutate))
        .route("/validate", post(handle_validate))
        .with_state(state)
}

async fn handle_mutate(
    State(state): State<Arc<WebhookState>>,
    Json(request): Json<AdmissionRequest>,
) -> Json<AdmissionResponse> {
    let config = state.config.load();
    Json(mutate_pod(&request, &state.cache, &config))
}

async fn handle_validate(
    State(state): State<Arc<WebhookState>>,
    Json(request): Json<AdmissionRequest>,
) -> Json<AdmissionResponse> {
    let config = state.config.load();
    Json(validate_pod(&request, &state.cache, &config))
}

/// Serve the webhook. TLS for `CertManager`/`CustomCertificate` modes is
/// terminated by the ingress in front of this listener; the mode only
/// decides what we log and that config validation already passed.
pub async fn serve(state: Arc<WebhookState>, addr: std::net::SocketAddr) -> std::io::Result<()> {
    let mode = state.config.load().https.mode;
    match mode {
        HttpsMode::Disabled | HttpsMode::OnlyInURI => {
            info!(%addr, ?mode, "webhook listening over plain HTTP")
        }
        HttpsMode::CertManager | HttpsMode::CustomCertificate => {
            info!(%addr, ?mode, "webhook listening behind TLS termination")
        }
    }
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await
}
