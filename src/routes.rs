use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::debug;

use crate::error::PredictError;
use crate::service::PredictionService;
use crate::types::{ActuatorDecision, HealthResponse, Telemetry};

pub type AppState = Arc<PredictionService>;

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health))
        .route("/health", get(health))
        .route("/predict", post(predict))
        .with_state(state)
        .layer(cors)
}

async fn health(State(svc): State<AppState>) -> Json<HealthResponse> {
    Json(svc.health())
}

async fn predict(
    State(svc): State<AppState>,
    payload: Result<Json<Telemetry>, JsonRejection>,
) -> Result<Json<ActuatorDecision>, PredictError> {
    let Json(telemetry) = payload.map_err(|rejection| {
        debug!(error = %rejection.body_text(), "rejected telemetry body");
        PredictError::Validation(rejection.body_text())
    })?;

    // Inference runs inline on the request task. Concurrent requests wait on
    // the module lock while holding their worker thread, so a burst of slow
    // predictions can delay other routes until the lock frees up.
    svc.predict(&telemetry).map(Json)
}
