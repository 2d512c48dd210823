use forum_votes::config::Config;
use forum_votes::database::{create_pool, run_migrations};
use forum_votes::redis::RedisClient;
use forum_votes::services::invalidation::{NoopNotifier, RedisTallyNotifier, TallyNotifier};
use forum_votes::services::pg_vote_store::PgVoteStore;
use forum_votes::services::vote_engine::VoteEngine;
use forum_votes::{AppState, create_app};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "forum_votes=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Create database connection pool
    let db = create_pool(&config.database_url).await?;
    tracing::info!("Database connection pool created");

    // Run migrations
    run_migrations(&db).await?;
    tracing::info!("Database migrations completed");

    // Redis is optional: without it votes are not rate limited and caches are not invalidated
    let redis = match &config.redis_url {
        Some(url) => {
            let client = Arc::new(RedisClient::new(url).await?);
            tracing::info!("Redis client created");
            Some(client)
        }
        None => {
            tracing::warn!("REDIS_URL not set, running without rate limits or cache invalidation");
            None
        }
    };

    let notifier: Arc<dyn TallyNotifier> = match &redis {
        Some(client) => Arc::new(RedisTallyNotifier::new(client.clone())),
        None => Arc::new(NoopNotifier),
    };

    let engine = Arc::new(VoteEngine::new(
        Arc::new(PgVoteStore::new(db.clone())),
        notifier,
        config.retry_policy(),
    ));

    // Create application state
    let state = AppState {
        db,
        redis,
        engine,
        config: Arc::new(config.clone()),
    };

    // Create application
    let app = create_app(state);

    // Create listener
    let listener = TcpListener::bind(format!("{}:{}", config.host, config.port)).await?;
    tracing::info!("Server listening on {}:{}", config.host, config.port);

    // Start server
    axum::serve(listener, app).await?;

    Ok(())
}
