use actix_web::{web, HttpResponse};
use serde::Deserialize;

use super::dto::ApiResponse;
use super::errors::ApiError;
use super::AppState;
use crate::actors::{ComponentHealth, GetDlqMessages, GetDlqStats, HealthStatus, SystemHealth};

const DEFAULT_DEAD_LETTER_LIMIT: usize = 50;

pub async fn health(state: web::Data<AppState>) -> HttpResponse {
    let database = match state.service.ping_storage().await {
        Ok(()) => ComponentHealth::new("database", HealthStatus::Healthy),
        Err(e) => {
            tracing::warn!(error = %e, "Health check: storage ping failed");
            ComponentHealth::new("database", HealthStatus::Unhealthy("ping failed".to_string()))
        }
    };

    let notifications = match state.dlq.send(GetDlqStats).await {
        Ok(stats) if stats.total_messages == 0 => {
            ComponentHealth::new("notifications", HealthStatus::Healthy)
        }
        Ok(stats) => ComponentHealth::new(
            "notifications",
            HealthStatus::Degraded("dead letter backlog".to_string()),
        )
        .with_details(format!("{} undelivered notification(s)", stats.total_messages)),
        Err(e) => ComponentHealth::new(
            "notifications",
            HealthStatus::Unhealthy("dead letter queue unreachable".to_string()),
        )
        .with_details(e.to_string()),
    };

    let report = SystemHealth::from_components(vec![database, notifications]);
    if report.overall_status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(report)
    } else {
        HttpResponse::Ok().json(report)
    }
}

pub async fn metrics(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let body = state
        .metrics
        .render()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

#[derive(Debug, Deserialize)]
pub struct DeadLetterQuery {
    pub limit: Option<usize>,
}

pub async fn dead_letters(
    state: web::Data<AppState>,
    query: web::Query<DeadLetterQuery>,
) -> Result<HttpResponse, ApiError> {
    let limit = query.limit.unwrap_or(DEFAULT_DEAD_LETTER_LIMIT);
    let messages = state
        .dlq
        .send(GetDlqMessages { limit })
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let total = messages.len();
    Ok(HttpResponse::Ok().json(ApiResponse::ok(messages).with_total(total)))
}
