use std::sync::Arc;

use anyhow::Result;
use tokio::{net::TcpListener, signal};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use account::{
    AppState,
    config::ServerConfig,
    create_router,
    repositories::PgUserRepository,
    revocation::RedisRevocationStore,
    token::{TokenConfig, TokenService},
    users::UserService,
};
use common::{
    cache::{RedisConfig, RedisPool},
    database::{self, DatabaseConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting account service");

    let server_config = ServerConfig::from_env()?;
    let token_config = TokenConfig::from_env()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize Redis connection pool
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;

    if redis_pool.health_check().await? {
        info!("Redis connection successful");
    } else {
        anyhow::bail!("Failed to connect to Redis");
    }

    let store = RedisRevocationStore::new(redis_pool, server_config.revocation_scan_batch);
    let tokens = TokenService::new(token_config, Arc::new(store))?;
    let users = UserService::new(Arc::new(PgUserRepository::new(pool)));

    let app_state = AppState {
        users,
        tokens: Arc::new(tokens),
    };

    let app = create_router(app_state, &server_config);

    let listener = TcpListener::bind(&server_config.bind_addr).await?;
    info!(
        "Account service listening on {} under {}",
        server_config.bind_addr, server_config.base_url
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Account service stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
