use anyhow::Context;
use tokio::net::TcpListener;
use tracing::info;

use crate::config::AppConfig;
use crate::routes;
use crate::state::AppState;
use crate::supervisor::Supervisor;

pub async fn handle(
    mut config: AppConfig,
    host: Option<String>,
    port: Option<u16>,
    supervisor: &Supervisor,
) -> anyhow::Result<()> {
    if let Some(host) = host {
        config.api.host = host;
    }
    if let Some(port) = port {
        config.api.port = port;
    }

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set in {:?} mode", config.environment);
    }

    let bind_addr = format!("{}:{}", config.api.host, config.api.port);
    let state = AppState::from_config(config)
        .await
        .context("failed to initialise storage")?;
    state
        .uploads
        .ensure_dir()
        .await
        .with_context(|| format!("failed to create {}", state.uploads.dir().display()))?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    info!(
        "eshop-api listening on http://{} (prefix {:?}, {:?} policy)",
        listener.local_addr()?,
        state.config.api.prefix,
        state.gate.policy()
    );

    let stop = supervisor.clone();
    let app = routes::app(state.clone());
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { stop.wait().await })
            .await
    });
    if let Some(result) = supervisor.watch_task(server).await {
        result.context("server error")?;
    }

    if let Some(database) = &state.database {
        database.close().await;
    }
    info!("Server stopped");
    Ok(())
}
