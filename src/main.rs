use std::sync::Arc;

use bookmatch_api::{
    config::Config,
    db::{create_pool, create_redis_client, Cache, CacheWriterHandle, PgStore},
    routes::{create_router, AppState},
    services::{
        stores::{CachedCatalog, CatalogStore, InMemoryStore},
        RecommendationSettings,
    },
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bookmatch_api=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let settings = RecommendationSettings::from(&config);

    let (state, cache_writer) = if config.demo {
        tracing::info!("Demo mode: serving from the seeded in-memory catalog");
        let store = Arc::new(InMemoryStore::demo().await?);
        (AppState::from_store(store, settings), None)
    } else {
        let pool = create_pool(&config.database_url).await?;
        tracing::info!("Connected to PostgreSQL");
        let store = Arc::new(PgStore::new(pool));

        let (catalog, cache_writer) = match &config.redis_url {
            Some(redis_url) => {
                let (cache, handle) = Cache::new(create_redis_client(redis_url)?);
                tracing::info!(ttl = config.catalog_cache_ttl_secs, "Catalog cache enabled");
                let catalog: Arc<dyn CatalogStore> = Arc::new(CachedCatalog::new(
                    store.clone(),
                    cache,
                    config.catalog_cache_ttl_secs,
                ));
                (catalog, Some(handle))
            }
            None => (store.clone() as Arc<dyn CatalogStore>, None),
        };

        let state = AppState::new(catalog, store.clone(), store.clone(), store, settings);
        (state, cache_writer)
    };

    let app = create_router(Arc::new(state));

    let address = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&address).await?;
    tracing::info!(address = %address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(handle) = cache_writer {
        shutdown_cache(handle).await;
    }

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

async fn shutdown_cache(handle: CacheWriterHandle) {
    handle.shutdown().await;
    // Give the writer a moment to drain queued writes
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
}
