//! Liveness probe.

use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde::Serialize;
use utoipa::ToSchema;

use crate::http::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/healthz", get(liveness))
}

#[derive(Serialize, ToSchema)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[utoipa::path(get, path = "/healthz", responses((status = 200, description = "Service is up", body = HealthResponse)))]
pub(crate) async fn liveness() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}
