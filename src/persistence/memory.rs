use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{OrderFilter, OrderRepository, RepositoryError};
use crate::domain::order::{Order, OrderId, OrderStatus, Schedule, StatusChange};

/// Process-local repository for tests and database-less local runs.
///
/// Orders are kept in insertion order, so ties on `created_at` still list
/// the later insert first.
#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: RwLock<Vec<Order>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create_order_atomic(&self, order: Order) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        orders.push(order.clone());

        tracing::debug!(
            order_id = %order.id,
            item_count = order.items.len(),
            "Stored order in memory"
        );
        Ok(order)
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        Ok(orders.iter().find(|order| order.id == id).cloned())
    }

    async fn update_status(
        &self,
        id: OrderId,
        change: StatusChange,
        schedule: Option<Schedule>,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or(RepositoryError::NotFound(id))?;

        if order.status != change.from {
            return Err(RepositoryError::Conflict {
                id,
                expected: change.from,
            });
        }

        if let Some(schedule) = schedule {
            order.schedule = schedule;
        }
        order.apply_status_change(&change);
        Ok(order.clone())
    }

    async fn update_schedule(
        &self,
        id: OrderId,
        expected: OrderStatus,
        schedule: Schedule,
        updated_at: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let mut orders = self.orders.write().await;
        let order = orders
            .iter_mut()
            .find(|order| order.id == id)
            .ok_or(RepositoryError::NotFound(id))?;

        if order.status != expected {
            return Err(RepositoryError::Conflict { id, expected });
        }

        order.schedule = schedule;
        order.updated_at = updated_at;
        Ok(order.clone())
    }

    async fn list_by_filter(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let orders = self.orders.read().await;
        let mut matching: Vec<Order> = orders
            .iter()
            .rev()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect();

        // Stable sort keeps later inserts first among equal timestamps.
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(filter.effective_limit());
        Ok(matching)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}
