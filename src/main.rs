use actix::prelude::*;
use actix_web::{web, App, HttpServer};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod actors;
mod config;
mod domain;
mod http;
mod metrics;
mod notifications;
mod persistence;
mod utils;

use actors::{DlqActor, NotificationDispatcher, QueuedNotificationGateway};
use config::AppConfig;
use domain::order::OrderLifecycleService;
use notifications::{LoggingNotifier, NotificationGateway, WebhookNotifier};
use persistence::{InMemoryOrderRepository, OrderRepository, PgOrderRepository};
use utils::RetryConfig;

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    // Default to INFO, override with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,laundry_orders=debug")),
        )
        .init();

    let config = AppConfig::from_env()?;
    tracing::info!(bind = %config.http_bind, "Starting laundry order service");

    // === 1. Order storage ===
    let repository: Arc<dyn OrderRepository> = match &config.database {
        Some(db) => {
            tracing::info!(max_connections = db.max_connections, "Connecting to PostgreSQL");
            let repo =
                PgOrderRepository::connect(&db.url, db.max_connections, db.acquire_timeout).await?;
            persistence::ensure_schema(repo.pool()).await?;
            Arc::new(repo)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, orders are kept in memory only");
            Arc::new(InMemoryOrderRepository::new())
        }
    };

    // === 2. Metrics ===
    let metrics = Arc::new(metrics::Metrics::new()?);

    // === 3. Notification pipeline: relay -> dispatcher (retry) -> DLQ ===
    let relay: Arc<dyn NotificationGateway> = match &config.notifications.webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Notifications go to webhook relay");
            Arc::new(WebhookNotifier::new(
                url.clone(),
                config.notifications.timeout,
                metrics.clone(),
            )?)
        }
        None => {
            tracing::info!("NOTIFICATION_WEBHOOK_URL not set, notifications are logged");
            Arc::new(LoggingNotifier)
        }
    };

    let dlq = DlqActor::default().start();
    let dispatcher = NotificationDispatcher::new(
        relay,
        RetryConfig::with_max_attempts(config.notifications.max_attempts),
        dlq.clone(),
        metrics.clone(),
    )
    .start_with_capacity(config.notifications.queue_capacity);
    let gateway = Arc::new(QueuedNotificationGateway::new(dispatcher));

    // === 4. Lifecycle service and HTTP API ===
    let service = Arc::new(
        OrderLifecycleService::new(repository, gateway, metrics.clone())
            .with_notify_timeout(config.notifications.timeout),
    );
    let state = web::Data::new(http::AppState {
        service,
        metrics,
        dlq,
    });

    tracing::info!(bind = %config.http_bind, "HTTP API listening");
    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(http::configure)
    })
    .bind(&config.http_bind)?
    .run()
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}
