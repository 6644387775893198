pub mod error;
pub mod extract;
pub mod files;
pub mod handlers;
pub mod openapi;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{HeaderValue, Method};
use axum::Router;
use lessonvault_core::{AuthorizationGate, Config, CredentialService, StorageLayout, TranscodeOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use error::{AppError, AppResult};

/// Shared state handed to every handler. Construction happens once at
/// startup in `main`; everything here is cheaply `Clone`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub storage: Arc<StorageLayout>,
    pub credentials: CredentialService,
    pub gate: AuthorizationGate,
    pub orchestrator: TranscodeOrchestrator,
}

/// Assemble the full router from a constructed `AppState`, the same
/// two-step split (`register_all_routes` + `apply_global_layers`) the
/// teacher uses in `synctv-api/src/http/mod.rs`.
pub fn build_router(state: AppState) -> axum::Router {
    let router = register_all_routes();
    apply_global_layers(router, &state)
}

fn register_all_routes() -> Router<AppState> {
    Router::new()
        .merge(handlers::health::router())
        .merge(handlers::tokens::router())
        .merge(handlers::streaming::router())
        .merge(handlers::download::router())
        .merge(handlers::upload::router())
}

fn apply_global_layers(router: Router<AppState>, state: &AppState) -> axum::Router {
    let cors = build_cors_layer(&state.config);

    let router = router
        .layer(cors)
        .layer(DefaultBodyLimit::max(110 * 1024 * 1024))
        .layer(TimeoutLayer::new(std::time::Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    // Only expose Swagger UI in development mode.
    if state.config.server.development_mode {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi::ApiDoc::openapi()))
    } else {
        router
    }
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if config.server.development_mode {
        return CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);
    }

    if config.server.allowed_origins.is_empty() {
        tracing::warn!("CORS: no allowed_origins configured in production; all cross-origin requests will be denied");
        return CorsLayer::new();
    }

    let origins: Vec<HeaderValue> = config
        .server
        .allowed_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}
