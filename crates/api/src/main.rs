use std::net::SocketAddr;
use std::sync::Arc;

use steadydancer_queue::RedisTaskQueue;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use steadydancer_api::config::ServerConfig;
use steadydancer_api::router::build_app_router;
use steadydancer_api::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "steadydancer_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();

    let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

    let pool = steadydancer_db::create_pool(&database_url)
        .await
        .expect("Failed to connect to database");
    tracing::info!("Database connection pool created");

    steadydancer_db::health_check(&pool)
        .await
        .expect("Database health check failed");
    tracing::info!("Database health check passed");

    steadydancer_db::run_migrations(&pool)
        .await
        .expect("Failed to run database migrations");
    tracing::info!("Database migrations applied");

    let queue = RedisTaskQueue::connect(&config.queue_url, &config.queue_name)
        .await
        .expect("Failed to connect to task queue");
    tracing::info!(queue = %config.queue_name, "Task queue client connected");

    tracing::info!(
        data_root = %config.data_root.display(),
        models_dir = %config.models_dir.display(),
        "Filesystem roots configured",
    );

    let host = config.host.clone();
    let port = config.port;
    let state = AppState::new(pool, config.clone(), Arc::new(queue));
    let app = build_app_router(state, &config);

    let addr = SocketAddr::new(host.parse().expect("Invalid HOST"), port);
    tracing::info!("Starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
