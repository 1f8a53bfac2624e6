//! `api-gateway run`: start the gateway.
//!
//! Loads configuration from a file or the built-in defaults, applies
//! environment overrides, builds the backend registry, starts the Axum
//! HTTP server with graceful shutdown, and optionally spawns a
//! background probe loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::{self, env};
use crate::error::GatewayError;
use crate::health;
use crate::logging;
use crate::proxy::retry::RetryPolicy;
use crate::registry::BackendRegistry;
use crate::server::{self, AppState};

pub async fn execute(args: RunArgs) -> Result<(), GatewayError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let source = config::resolve_source(args.config.as_deref()).await?;
    let mut config = source.load().await?;
    env::apply_overrides(&mut config, |key| std::env::var(key).ok());

    let registry = BackendRegistry::from_config(&config)?;
    let policy = RetryPolicy::new(Duration::from_millis(config.defaults.backoff));

    for backend in registry.iter() {
        tracing::info!(
            service = %backend.id,
            prefix = %backend.prefix,
            url = %backend.url,
            timeout_ms = u64::try_from(backend.timeout.as_millis()).unwrap_or(u64::MAX),
            max_retries = backend.max_retries,
            worst_case_backoff_ms =
                u64::try_from(policy.worst_case(backend.max_retries).as_millis()).unwrap_or(u64::MAX),
            "forwarding to backend"
        );
    }

    let backend_count = registry.len();
    let state = Arc::new(AppState::new(registry, server::build_http_client(), policy));

    // Shutdown signal: flipping shutdown_tx stops the probe loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let probe_handle = (args.probe_interval > 0).then(|| {
        let probe_state = Arc::clone(&state);
        let period = Duration::from_secs(args.probe_interval);
        tokio::spawn(health::probe_loop(probe_state, period, shutdown_rx))
    });

    let router = server::build_router(state, args.max_body);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        backends = backend_count,
        config_source = source.name(),
        "api gateway started"
    );

    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(graceful_shutdown)
        .await?;

    if let Some(handle) = probe_handle {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "probe task failed");
        }
    }

    tracing::info!("api gateway stopped");
    Ok(())
}
