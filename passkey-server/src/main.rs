//! Passkey Server - REST API for passwordless WebAuthn authentication
//!
//! Exposes passkey-core ceremonies via HTTP endpoints:
//! - POST /register/begin, /register/finish
//! - POST /authenticate/begin, /authenticate/finish
//! - GET /users/{userId}, credential management under /users/{userId}/credentials

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use passkey_core::{CeremonyOrchestrator, MemoryRepository, WebAuthnConfig};
use passkey_server::{create_router_with_config, AppState, Config, HttpVerifier};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,passkey_core=debug")),
        )
        .with_target(true)
        .init();

    let config = Config::from_env();
    let webauthn = WebAuthnConfig::from_env().context("Invalid WebAuthn configuration")?;
    tracing::info!(
        rp_id = %webauthn.relying_party.id,
        origin = %webauthn.relying_party.origin,
        verifier = %config.verifier_url,
        "Configuration loaded"
    );

    let verifier = HttpVerifier::new(
        &config.verifier_url,
        Duration::from_secs(config.verifier_timeout_secs),
    )
    .context("Failed to create verifier client")?;

    let orchestrator = CeremonyOrchestrator::new(
        webauthn,
        Arc::new(MemoryRepository::new()),
        Arc::new(verifier),
    );

    let sweeper = (config.ledger_sweep_secs > 0).then(|| {
        orchestrator
            .ledger()
            .spawn_sweeper(Duration::from_secs(config.ledger_sweep_secs))
    });

    let app = create_router_with_config(AppState::new(orchestrator), &config);

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    if let Some(sweeper) = sweeper {
        sweeper.shutdown().await;
    }
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
