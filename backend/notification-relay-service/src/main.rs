use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use notification_pubsub::{NotificationPublisher, NotificationSubscriber};
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use notification_relay_service::handlers::{register_notifications, register_websocket};
use notification_relay_service::{metrics, relay, AppError, AppResult, AppState, Config, SessionRegistry};

const SERVICE_NAME: &str = "notification-relay-service";

#[actix_web::main]
async fn main() -> AppResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Arc::new(Config::from_env()?);
    tracing::info!(env = %config.app_env, "Starting notification relay service");

    let publisher = NotificationPublisher::new(&config.redis_url, SERVICE_NAME.to_string()).await?;
    let subscriber = NotificationSubscriber::new(&config.redis_url).await?;
    tracing::info!("Connected to Redis");

    let registry = SessionRegistry::new();
    let state = AppState::new(registry.clone(), publisher, config.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let relay_handle = tokio::spawn(relay::run(subscriber, registry, shutdown_rx));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting HTTP server on {}", addr);

    let cors_origin = config.cors_origin.clone();
    HttpServer::new(move || {
        let cors = if cors_origin == "*" {
            Cors::permissive()
        } else {
            Cors::default()
                .allowed_origin(&cors_origin)
                .allowed_methods(vec!["GET", "POST"])
                .allow_any_header()
                .supports_credentials()
        };

        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(metrics::MetricsMiddleware)
            .wrap(cors)
            .route("/health", web::get().to(|| async { "OK" }))
            .route("/metrics", web::get().to(metrics::serve_metrics))
            .configure(register_websocket)
            .configure(register_notifications)
    })
    .bind(&addr)
    .map_err(|e| AppError::StartServer(e.to_string()))?
    .run()
    .await
    .map_err(|e| AppError::StartServer(e.to_string()))?;

    tracing::info!("HTTP server stopped, stopping relay");
    let _ = shutdown_tx.send(true);
    let _ = relay_handle.await;

    Ok(())
}
