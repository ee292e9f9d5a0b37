use std::sync::Arc;

use filmmatch_api::{
    build_state,
    config::Config,
    db::{create_redis_client, Cache, KeyValueStore, ReadPolicy, RedisStore},
    routes::create_router,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_FILTER: &str = "filmmatch_api=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    init_tracing(config.json_logs());

    let (cache, cache_writer) = if config.redis_enabled() {
        let client = create_redis_client(&config.redis_url)?;
        let primary: Arc<dyn KeyValueStore> = Arc::new(RedisStore::new(client));
        Cache::new(Some(primary), ReadPolicy::PrimaryFirst).await
    } else {
        tracing::warn!("REDIS_URL is empty, sessions and cache are process-local");
        Cache::in_memory().await
    };

    let state = build_state(&config, cache)?;
    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(
        addr = %addr,
        redis = config.redis_enabled(),
        model_simple = %config.model_simple,
        model_moderate = %config.model_moderate,
        model_complex = %config.model_complex,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    cache_writer.shutdown().await;
    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = sigterm.recv() => {}
                    _ = tokio::signal::ctrl_c() => {}
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM handler unavailable, waiting for Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    tracing::info!("Shutdown signal received");
}
