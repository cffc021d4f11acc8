use std::net::SocketAddr;
use std::sync::Arc;

use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use eventscale_server::build_state;
use eventscale_server::config::Config;
use eventscale_server::notify::{AmqpConfig, AmqpPublisher};
use eventscale_server::routes::create_routes;
use eventscale_server::store::PgStore;

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = Config::from_env();

    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    tracing::info!("Successfully connected to database");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    tracing::info!("Migrations run successfully");

    match config.lock_timeout {
        Some(wait) => tracing::info!(wait_ms = wait.as_millis() as u64, "Ticket lock wait is bounded"),
        None => tracing::warn!("LOCK_TIMEOUT_MS=0: ticket lock waits are unbounded"),
    }

    let store = PgStore::new(pool, config.lock_timeout);
    let publisher = Arc::new(AmqpPublisher::new(AmqpConfig {
        uri: config.rabbitmq_url.clone(),
        queue_name: config.notification_queue.clone(),
        timeout: config.notification_timeout,
    }));
    let state = build_state(&config, store, publisher);

    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        match state.sessions.ensure_admin(email, password).await {
            Ok(Some(id)) => tracing::info!(admin_id = %id, "Bootstrap administrator created"),
            Ok(None) => tracing::info!("Bootstrap administrator already present"),
            Err(e) => tracing::error!(error = %e, "Could not create bootstrap administrator"),
        }
    }

    let app = create_routes(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("🚀 Server running at http://{}", addr);

    let listener = TcpListener::bind(addr)
        .await
        .expect("Failed to bind address");

    axum::serve(listener, app).await.expect("Server failed");
}
