pub(crate) mod api;
pub(crate) mod core;
pub(crate) mod db;
pub(crate) mod repositories;
pub(crate) mod schemas;
pub(crate) mod services;

pub mod session;

#[cfg(test)]
mod test_support;

use crate::core::{config::Settings, redis::RedisHandle, state::AppState, telemetry};

/// Boots the API: settings, tracing, metrics, database pool plus
/// migrations, Redis, superuser seed, then serves until a shutdown
/// signal arrives.
pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::load()?;
    telemetry::init_tracing(&settings)?;
    core::metrics::init(&settings)?;

    let state = build_state(settings).await?;

    if let Err(err) = core::bootstrap::ensure_superuser(&state).await {
        tracing::error!(error = %err, "Failed to ensure default superuser");
    }

    serve(state).await
}

async fn build_state(settings: Settings) -> anyhow::Result<AppState> {
    let pool = db::init_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    let redis = RedisHandle::new(settings.redis().redis_url());
    match redis.connect().await {
        Ok(()) => tracing::info!("Redis connected successfully"),
        Err(err) => {
            tracing::error!(error = %err, "Failed to connect to Redis; continuing without rate limiting");
        }
    }

    Ok(AppState::new(settings, pool, redis))
}

async fn serve(state: AppState) -> anyhow::Result<()> {
    let redis = state.redis().clone();
    let listener = tokio::net::TcpListener::bind(state.settings().server_addr()).await?;

    tracing::info!(
        host = %state.settings().server_host(),
        port = state.settings().server_port(),
        environment = %state.settings().runtime().environment.as_str(),
        "Invigil API listening"
    );

    let app = api::router::router(state);
    let served =
        axum::serve(listener, app).with_graceful_shutdown(core::shutdown::shutdown_signal()).await;

    redis.disconnect().await;
    tracing::info!("Redis disconnected");

    served?;
    Ok(())
}
