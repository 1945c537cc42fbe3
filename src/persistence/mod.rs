// ============================================================================
// Persistence - Order Repository
// ============================================================================
//
// The lifecycle service only talks to `OrderRepository`. Each write is atomic
// on its own: an order is stored together with all of its line items, and a
// status change is stored together with its history row and any schedule
// change that came with it.
//
// ============================================================================

mod memory;
mod postgres;
mod schema;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::order::{Order, OrderId, OrderStatus, Schedule, StatusChange};

pub use memory::InMemoryOrderRepository;
pub use postgres::PgOrderRepository;
pub use schema::ensure_schema;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("order not found: {0}")]
    NotFound(OrderId),

    #[error("order {id} is no longer {expected}")]
    Conflict { id: OrderId, expected: OrderStatus },

    #[error("database error: {0}")]
    Database(#[source] sqlx::Error),

    #[error("corrupt row for order {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                RepositoryError::Unavailable(error.to_string())
            }
            other => RepositoryError::Database(other),
        }
    }
}

/// Listing filter. Results are always most recent first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub status: Option<OrderStatus>,
    pub customer_email: Option<String>,
    pub limit: Option<usize>,
}

impl OrderFilter {
    pub const DEFAULT_LIMIT: usize = 50;
    pub const MAX_LIMIT: usize = 200;

    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }

    pub fn matches(&self, order: &Order) -> bool {
        let status_ok = self.status.map_or(true, |status| order.status == status);
        let email_ok = self.customer_email.as_deref().map_or(true, |email| {
            order.customer.email.as_str().eq_ignore_ascii_case(email.trim())
        });
        status_ok && email_ok
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrderRepository: Send + Sync {
    /// Store a new order and all its line items, or nothing.
    async fn create_order_atomic(&self, order: Order) -> Result<Order, RepositoryError>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError>;

    /// Apply `change`, and `schedule` when given, if the order is still in
    /// `change.from`. Both land together or not at all.
    ///
    /// Fails with `NotFound` for an unknown id and `Conflict` when another
    /// writer moved the order first.
    async fn update_status(
        &self,
        id: OrderId,
        change: StatusChange,
        schedule: Option<Schedule>,
    ) -> Result<Order, RepositoryError>;

    /// Replace the schedule if the order is still in `expected`.
    async fn update_schedule(
        &self,
        id: OrderId,
        expected: OrderStatus,
        schedule: Schedule,
        updated_at: DateTime<Utc>,
    ) -> Result<Order, RepositoryError>;

    async fn list_by_filter(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError>;

    /// Cheap reachability check for health reporting.
    async fn ping(&self) -> Result<(), RepositoryError>;
}
