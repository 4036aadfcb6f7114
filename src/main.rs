use anyhow::Context;
use entity_api::{
    AppState, MemoryRepository, PostgresRepository, RepositoryState, S3StorageClient,
    StorageState,
    config::{AppConfig, Env},
    create_router, repository,
    storage::StorageService,
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, initializes logging, picks a repository backend and
/// object storage, then serves the API until the process is stopped.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Configuration (fail fast on missing production settings)
    dotenv::dotenv().ok();
    let config = AppConfig::load().context("invalid configuration")?;

    // 2. Logging: RUST_LOG wins, otherwise verbose for this crate only.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "entity_api=debug,tower_http=info".into());

    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            // JSON lines for the log aggregator.
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 3. Repository: Postgres when DATABASE_URL is set, otherwise in-memory.
    let repo: RepositoryState = match &config.db_url {
        Some(db_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(db_url)
                .await
                .context("failed to connect to Postgres, check DATABASE_URL")?;
            let repo = PostgresRepository::new(pool);
            repo.migrate().await.context("failed to run migrations")?;
            tracing::info!("using Postgres repository");
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, data will not survive a restart");
            Arc::new(MemoryRepository::new())
        }
    };

    repository::spawn_expiry_sweep(repo.clone(), config.expiry_sweep_interval);

    // 4. Object storage (S3/MinIO)
    let s3_client = S3StorageClient::new(
        &config.s3_endpoint,
        &config.s3_region,
        &config.s3_key,
        &config.s3_secret,
        &config.s3_bucket,
    );

    // The dockerized MinIO starts without a bucket.
    if config.env == Env::Local {
        s3_client.ensure_bucket_exists().await;
    }
    let storage: StorageState = Arc::new(s3_client);

    // 5. Router and server
    let port = config.port;
    let app = create_router(AppState::new(repo, storage, config));

    let address = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

    tracing::info!("Listening on {address}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
