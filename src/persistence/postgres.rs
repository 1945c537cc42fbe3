use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::TryStreamExt;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use uuid::Uuid;

use super::{OrderFilter, OrderRepository, RepositoryError};
use crate::domain::order::{
    Address, CustomerInfo, Email, LineItem, Money, Order, OrderId, OrderStatus, PhoneNumber,
    Schedule, StatusChange,
};

const ORDER_COLUMNS: &str = "id, customer_name, customer_email, customer_phone, \
     customer_address, customer_city, customer_zip, pickup_at, delivery_at, \
     special_instructions, total_amount, status, created_at, updated_at";

/// PostgreSQL-backed order repository.
///
/// Multi-row writes run in a single transaction. Status updates are a
/// compare-and-set on the current status column.
#[derive(Clone)]
pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await?;

        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn load_items(&self, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<LineItem>>, RepositoryError> {
        let mut items: HashMap<Uuid, Vec<LineItem>> = HashMap::new();
        let mut rows = sqlx::query(
            "SELECT order_id, catalog_id, name, category, service_type, unit_price, quantity, total_price
             FROM order_items
             WHERE order_id = ANY($1)
             ORDER BY order_id, position",
        )
        .bind(ids.to_vec())
        .fetch(&self.pool);

        while let Some(row) = rows.try_next().await? {
            let order_id: Uuid = row.try_get("order_id")?;
            items.entry(order_id).or_default().push(line_item_from_row(&row)?);
        }
        Ok(items)
    }

    async fn load_history(
        &self,
        ids: &[Uuid],
    ) -> Result<HashMap<Uuid, Vec<StatusChange>>, RepositoryError> {
        let mut history: HashMap<Uuid, Vec<StatusChange>> = HashMap::new();
        let mut rows = sqlx::query(
            "SELECT order_id, from_status, to_status, changed_at
             FROM order_status_history
             WHERE order_id = ANY($1)
             ORDER BY order_id, changed_at, id",
        )
        .bind(ids.to_vec())
        .fetch(&self.pool);

        while let Some(row) = rows.try_next().await? {
            let order_id: Uuid = row.try_get("order_id")?;
            let change = StatusChange {
                from: status_column(&row, "from_status", order_id)?,
                to: status_column(&row, "to_status", order_id)?,
                changed_at: row.try_get("changed_at")?,
            };
            history.entry(order_id).or_default().push(change);
        }
        Ok(history)
    }

    /// Attach items and history to a batch of order rows, preserving row order.
    async fn hydrate(&self, rows: Vec<PgRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids = rows
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id"))
            .collect::<Result<Vec<_>, _>>()?;
        let mut items = self.load_items(&ids).await?;
        let mut history = self.load_history(&ids).await?;

        rows.iter()
            .zip(ids)
            .map(|(row, id)| {
                order_from_row(
                    row,
                    items.remove(&id).unwrap_or_default(),
                    history.remove(&id).unwrap_or_default(),
                )
            })
            .collect()
    }

    async fn fetch_existing(&self, id: OrderId) -> Result<Order, RepositoryError> {
        self.find_by_id(id).await?.ok_or(RepositoryError::NotFound(id))
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create_order_atomic(&self, order: Order) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let address = &order.customer.address;

        sqlx::query(
            "INSERT INTO orders (
                id, customer_name, customer_email, customer_phone,
                customer_address, customer_city, customer_zip,
                pickup_at, delivery_at, special_instructions,
                total_amount, status, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
        )
        .bind(order.id.as_uuid())
        .bind(&order.customer.name)
        .bind(order.customer.email.as_str())
        .bind(order.customer.phone.as_str())
        .bind(&address.street)
        .bind(&address.city)
        .bind(&address.zip)
        .bind(order.schedule.pickup_at)
        .bind(order.schedule.delivery_at)
        .bind(&order.special_instructions)
        .bind(order.total_amount.units())
        .bind(order.status.as_db_str())
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO order_items (
                    order_id, position, catalog_id, name, category, service_type,
                    unit_price, quantity, total_price
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(order.id.as_uuid())
            .bind(position as i32)
            .bind(&item.catalog_id)
            .bind(&item.name)
            .bind(&item.category)
            .bind(&item.service_type)
            .bind(item.unit_price.units())
            .bind(item.quantity as i32)
            .bind(item.line_total.units())
            .execute(&mut *tx)
            .await?;
        }

        // Dropping the transaction on an early return rolls everything back.
        tx.commit().await?;

        tracing::debug!(
            order_id = %order.id,
            item_count = order.items.len(),
            "Order persisted"
        );
        // Re-read so callers see timestamps at the precision PostgreSQL kept.
        self.fetch_existing(order.id).await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn update_status(
        &self,
        id: OrderId,
        change: StatusChange,
        schedule: Option<Schedule>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = match schedule {
            Some(schedule) => {
                sqlx::query(
                    "UPDATE orders SET status = $1, updated_at = $2, pickup_at = $5, delivery_at = $6
                     WHERE id = $3 AND status = $4",
                )
                .bind(change.to.as_db_str())
                .bind(change.changed_at)
                .bind(id.as_uuid())
                .bind(change.from.as_db_str())
                .bind(schedule.pickup_at)
                .bind(schedule.delivery_at)
                .execute(&mut *tx)
                .await?
            }
            None => {
                sqlx::query(
                    "UPDATE orders SET status = $1, updated_at = $2 WHERE id = $3 AND status = $4",
                )
                .bind(change.to.as_db_str())
                .bind(change.changed_at)
                .bind(id.as_uuid())
                .bind(change.from.as_db_str())
                .execute(&mut *tx)
                .await?
            }
        };

        if updated.rows_affected() == 0 {
            let exists = order_exists(&mut tx, id).await?;
            tx.rollback().await?;
            return Err(lost_compare_and_set(id, change.from, exists));
        }

        sqlx::query(
            "INSERT INTO order_status_history (order_id, from_status, to_status, changed_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(id.as_uuid())
        .bind(change.from.as_db_str())
        .bind(change.to.as_db_str())
        .bind(change.changed_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.fetch_existing(id).await
    }

    async fn update_schedule(
        &self,
        id: OrderId,
        expected: OrderStatus,
        schedule: Schedule,
        updated_at: DateTime<Utc>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET pickup_at = $1, delivery_at = $2, updated_at = $3
             WHERE id = $4 AND status = $5",
        )
        .bind(schedule.pickup_at)
        .bind(schedule.delivery_at)
        .bind(updated_at)
        .bind(id.as_uuid())
        .bind(expected.as_db_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let exists = order_exists(&mut tx, id).await?;
            tx.rollback().await?;
            return Err(lost_compare_and_set(id, expected, exists));
        }

        tx.commit().await?;
        self.fetch_existing(id).await
    }

    async fn list_by_filter(&self, filter: &OrderFilter) -> Result<Vec<Order>, RepositoryError> {
        let mut query: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {ORDER_COLUMNS} FROM orders WHERE TRUE"));

        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_db_str());
        }
        if let Some(email) = &filter.customer_email {
            query
                .push(" AND lower(customer_email) = lower(")
                .push_bind(email.trim().to_string())
                .push(")");
        }
        query
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(filter.effective_limit() as i64);

        let rows = query.build().fetch_all(&self.pool).await?;
        self.hydrate(rows).await
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

async fn order_exists(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    id: OrderId,
) -> Result<bool, RepositoryError> {
    let row = sqlx::query("SELECT 1 FROM orders WHERE id = $1")
        .bind(id.as_uuid())
        .fetch_optional(&mut **tx)
        .await?;
    Ok(row.is_some())
}

fn lost_compare_and_set(id: OrderId, expected: OrderStatus, exists: bool) -> RepositoryError {
    if exists {
        RepositoryError::Conflict { id, expected }
    } else {
        RepositoryError::NotFound(id)
    }
}

// ============================================================================
// Row Mapping
// ============================================================================

fn corrupt(id: impl ToString, reason: impl ToString) -> RepositoryError {
    RepositoryError::CorruptRow {
        id: id.to_string(),
        reason: reason.to_string(),
    }
}

fn status_column(row: &PgRow, column: &str, id: Uuid) -> Result<OrderStatus, RepositoryError> {
    let raw: String = row.try_get(column)?;
    raw.parse().map_err(|e| corrupt(id, e))
}

fn line_item_from_row(row: &PgRow) -> Result<LineItem, RepositoryError> {
    let order_id: Uuid = row.try_get("order_id")?;
    let quantity: i32 = row.try_get("quantity")?;

    Ok(LineItem {
        catalog_id: row.try_get("catalog_id")?,
        name: row.try_get("name")?,
        category: row.try_get("category")?,
        service_type: row.try_get("service_type")?,
        unit_price: Money::from_units(row.try_get("unit_price")?),
        quantity: u32::try_from(quantity).map_err(|e| corrupt(order_id, e))?,
        line_total: Money::from_units(row.try_get("total_price")?),
    })
}

fn order_from_row(
    row: &PgRow,
    items: Vec<LineItem>,
    history: Vec<StatusChange>,
) -> Result<Order, RepositoryError> {
    let id: Uuid = row.try_get("id")?;
    let email: String = row.try_get("customer_email")?;
    let phone: String = row.try_get("customer_phone")?;

    Ok(Order {
        id: OrderId::from_uuid(id),
        customer: CustomerInfo {
            name: row.try_get("customer_name")?,
            email: Email::parse(&email).map_err(|e| corrupt(id, e))?,
            phone: PhoneNumber::parse(&phone).map_err(|e| corrupt(id, e))?,
            address: Address {
                street: row.try_get("customer_address")?,
                city: row.try_get("customer_city")?,
                zip: row.try_get("customer_zip")?,
            },
        },
        items,
        schedule: Schedule {
            pickup_at: row.try_get("pickup_at")?,
            delivery_at: row.try_get("delivery_at")?,
        },
        special_instructions: row.try_get("special_instructions")?,
        total_amount: Money::from_units(row.try_get("total_amount")?),
        status: status_column(row, "status", id)?,
        history,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}
