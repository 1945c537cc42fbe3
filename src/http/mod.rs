// ============================================================================
// HTTP API
// ============================================================================
//
// Thin actix-web layer over OrderLifecycleService. Handlers translate JSON
// into commands, call the service and shape the response envelope; every
// failure goes through ApiError so status codes stay consistent.
//
// ============================================================================

use std::sync::Arc;

use actix::Addr;
use actix_web::web;

use crate::actors::DlqActor;
use crate::domain::order::OrderLifecycleService;
use crate::metrics::Metrics;

mod dto;
mod errors;
mod ops;
mod orders;

pub use errors::ApiError;

/// Shared handler state, registered once as `web::Data`.
pub struct AppState {
    pub service: Arc<OrderLifecycleService>,
    pub metrics: Arc<Metrics>,
    pub dlq: Addr<DlqActor>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::resource("/orders")
            .route(web::post().to(orders::create_order))
            .route(web::get().to(orders::list_orders)),
    )
    .service(
        web::resource("/orders/{id}")
            .route(web::get().to(orders::get_order))
            .route(web::patch().to(orders::update_order))
            .route(web::put().to(orders::update_order)),
    )
    .route("/orders/{id}/track", web::get().to(orders::track_order))
    .route("/health", web::get().to(ops::health))
    .route("/metrics", web::get().to(ops::metrics))
    .route(
        "/admin/notifications/dead-letters",
        web::get().to(ops::dead_letters),
    );
}
