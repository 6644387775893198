use std::sync::Arc;

use anyhow::{Context, Result};
use lessonvault_api::http::{build_router, AppState};
use lessonvault_core::service::{AuthorizationGate, TranscodeOrchestrator};
use lessonvault_core::{logging, Config, CredentialService, StorageLayout};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config_path = std::env::var("LESSONVAULT_CONFIG").ok();
    let config = Config::load(config_path.as_deref()).unwrap_or_else(|e| {
        eprintln!("failed to load configuration: {e}");
        eprintln!("falling back to defaults");
        Config::default()
    });

    logging::init_logging(&config.logging).context("failed to initialize logging")?;

    if let Err(errors) = config.validate() {
        for err in &errors {
            error!("configuration error: {err}");
        }
        anyhow::bail!("configuration failed validation ({} error(s))", errors.len());
    }

    info!(address = %config.server.address(), "lessonvault-api starting");

    let storage = StorageLayout::new(&config.storage);
    let credentials = CredentialService::new(&config.credential.secret);
    let gate = AuthorizationGate::new(
        credentials.clone(),
        config.credential.require_filename_for_download,
        config.server.allowed_origins.clone(),
    );
    let orchestrator = TranscodeOrchestrator::spawn(storage.clone(), config.transcode.clone(), config.callback.clone());

    let state = AppState {
        config: Arc::new(config.clone()),
        storage: Arc::new(storage),
        credentials,
        gate,
        orchestrator,
    };

    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(config.server.address())
        .await
        .with_context(|| format!("failed to bind {}", config.server.address()))?;

    info!(address = %config.server.address(), "lessonvault-api listening");

    axum::serve(listener, router)
        .await
        .context("http server error")?;

    Ok(())
}
