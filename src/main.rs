use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use nest_match::config::{Settings, StoreBackend};
use nest_match::core::{FilterRelaxationMatcher, NeighborhoodSimilarityTable};
use nest_match::routes::{self, handle_json_payload_error, handle_path_error, AppState};
use nest_match::services::{
    CacheManager, CachedListingStore, InMemoryListingStore, ListingStore, PostgresListingStore,
    PostgrestListingStore,
};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn startup_error(context: &str, err: impl std::fmt::Display) -> io::Error {
    error!("{}: {}", context, err);
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, err))
}

fn init_tracing(level: &str, format: &str) {
    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.json().init();
    }
}

async fn build_store(settings: &Settings) -> io::Result<Arc<dyn ListingStore>> {
    let store = &settings.store;
    let collections = settings.collection_names();

    let backend: Arc<dyn ListingStore> = match store.backend {
        StoreBackend::Postgrest => {
            let url = store
                .url
                .clone()
                .ok_or_else(|| startup_error("Missing store.url", "set SUPABASE_URL"))?;
            let api_key = store
                .api_key
                .clone()
                .ok_or_else(|| startup_error("Missing store.api_key", "set SUPABASE_SERVICE_KEY"))?;
            let timeout = Duration::from_secs(store.timeout_secs.unwrap_or(10));

            let client = PostgrestListingStore::new(url, api_key, collections, timeout)
                .map_err(|e| startup_error("Failed to build PostgREST client", e))?;
            info!("PostgREST listing store initialized");
            Arc::new(client)
        }
        StoreBackend::Postgres => {
            let url = store
                .database_url
                .as_deref()
                .ok_or_else(|| startup_error("Missing store.database_url", "set DATABASE_URL"))?;

            let pool = PostgresListingStore::from_settings(
                url,
                store.max_connections,
                store.min_connections,
                store.acquire_timeout_secs,
                store.idle_timeout_secs,
                collections,
            )
            .await
            .map_err(|e| startup_error("Failed to connect to PostgreSQL", e))?;
            info!(
                "PostgreSQL listing store initialized (max: {} connections)",
                store.max_connections.unwrap_or(10)
            );
            Arc::new(pool)
        }
        StoreBackend::Memory => {
            let memory = match &store.fixtures_file {
                Some(path) => InMemoryListingStore::load_fixtures(path)
                    .map_err(|e| startup_error("Failed to load listing fixtures", e))?,
                None => {
                    warn!("Memory backend without fixtures; every count will be zero");
                    InMemoryListingStore::new()
                }
            };
            info!("In-memory listing store initialized");
            Arc::new(memory)
        }
    };

    if !settings.cache.enabled {
        return Ok(backend);
    }

    // Count cache is optional - fall back to L1-only if Redis is unreachable
    let ttl = settings.cache.ttl_secs.unwrap_or(60);
    let l1_size = settings.cache.l1_cache_size.unwrap_or(10_000);

    let cache = match CacheManager::new(settings.cache.redis_url.as_deref(), l1_size, ttl).await {
        Ok(cache) => cache,
        Err(e) => {
            warn!("Failed to connect to Redis ({}), using in-process cache only", e);
            CacheManager::in_memory(l1_size, ttl)
        }
    };
    info!(
        "Count cache initialized (L1: {} entries, L2: {}, TTL: {}s)",
        l1_size,
        cache.has_l2(),
        ttl
    );

    Ok(Arc::new(CachedListingStore::new(backend, Arc::new(cache))))
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        io::Error::new(io::ErrorKind::InvalidInput, e.to_string())
    })?;

    init_tracing(&settings.logging.level, &settings.logging.format);

    info!("Starting nest-match service...");

    let store = build_store(&settings).await?;

    let neighborhoods = match &settings.neighborhoods.similarity_file {
        Some(path) => NeighborhoodSimilarityTable::load(path)
            .map_err(|e| startup_error("Failed to load neighborhood similarity table", e))?,
        None => NeighborhoodSimilarityTable::builtin(),
    };
    info!("Neighborhood similarity table loaded ({} entries)", neighborhoods.len());

    let matcher = FilterRelaxationMatcher::new(store, Arc::new(neighborhoods));
    let app_state = AppState::new(matcher);

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .app_data(web::JsonConfig::default().error_handler(handle_json_payload_error))
            .app_data(web::PathConfig::default().error_handler(handle_path_error))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_routes)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
