use actix_web::http::{header, StatusCode};
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::order::{LifecycleError, OrderError};

// ============================================================================
// HTTP Error Mapping
// ============================================================================
//
// Validation → 400, not found → 404, invalid transition → 409,
// persistence → 500 with Retry-After. Every body carries a hint the client
// can act on.
//
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn from_order_error(error: OrderError) -> Self {
        ApiError::Lifecycle(error.into())
    }

    fn hint(&self) -> &'static str {
        match self {
            ApiError::Lifecycle(LifecycleError::Validation(OrderError::PickupNotScheduled)) => {
                "Schedule a pickup date before confirming the order."
            }
            ApiError::Lifecycle(LifecycleError::Validation(OrderError::UnknownStatus(_))) => {
                "Use one of: pending, confirmed, processing, ready_for_pickup, out_for_delivery, completed, cancelled."
            }
            ApiError::Lifecycle(LifecycleError::Validation(_)) | ApiError::BadRequest(_) => {
                "Check the request fields and try again."
            }
            ApiError::Lifecycle(LifecycleError::NotFound(_)) => "Check your order id.",
            ApiError::Lifecycle(LifecycleError::InvalidTransition(_)) => {
                "Reload the order to see its current status before retrying."
            }
            ApiError::Lifecycle(LifecycleError::Persistence(_)) => {
                "The order store is temporarily unavailable, retry shortly."
            }
            ApiError::Internal(_) => "Retry later or contact support.",
        }
    }

    /// Client-facing message; storage details stay in the logs.
    fn public_message(&self) -> String {
        match self {
            ApiError::Lifecycle(LifecycleError::Persistence(_)) => {
                "Failed to process order".to_string()
            }
            ApiError::Internal(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
    hint: &'static str,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Lifecycle(LifecycleError::Validation(_)) | ApiError::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Lifecycle(LifecycleError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Lifecycle(LifecycleError::InvalidTransition(_)) => StatusCode::CONFLICT,
            ApiError::Lifecycle(LifecycleError::Persistence(_)) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut response = HttpResponse::build(self.status_code());
        if matches!(self, ApiError::Lifecycle(LifecycleError::Persistence(_))) {
            response.insert_header((header::RETRY_AFTER, "3"));
        }
        response.json(ErrorBody {
            success: false,
            error: self.public_message(),
            hint: self.hint(),
        })
    }
}
