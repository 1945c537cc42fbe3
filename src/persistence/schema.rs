use sqlx::PgPool;

use crate::domain::order::OrderStatus;

// ============================================================================
// Relational Schema
// ============================================================================
//
// orders 1 ── * order_items
//        1 ── * order_status_history
//
// `orders.status` is restricted to the seven lifecycle values.
//
// ============================================================================

fn status_values() -> String {
    OrderStatus::ALL
        .iter()
        .map(|status| format!("'{}'", status.as_db_str()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub(crate) fn schema_statements() -> Vec<String> {
    let statuses = status_values();

    vec![
        format!(
            "CREATE TABLE IF NOT EXISTS orders (
                id UUID PRIMARY KEY,
                customer_name TEXT NOT NULL,
                customer_email TEXT NOT NULL,
                customer_phone TEXT NOT NULL,
                customer_address TEXT,
                customer_city TEXT,
                customer_zip TEXT,
                pickup_at TIMESTAMPTZ,
                delivery_at TIMESTAMPTZ,
                special_instructions TEXT,
                total_amount BIGINT NOT NULL CHECK (total_amount >= 0),
                status TEXT NOT NULL CHECK (status IN ({statuses})),
                created_at TIMESTAMPTZ NOT NULL,
                updated_at TIMESTAMPTZ NOT NULL
            )"
        ),
        "CREATE INDEX IF NOT EXISTS orders_status_created_idx
            ON orders (status, created_at DESC)"
            .to_string(),
        "CREATE INDEX IF NOT EXISTS orders_customer_email_created_idx
            ON orders (lower(customer_email), created_at DESC)"
            .to_string(),
        "CREATE TABLE IF NOT EXISTS order_items (
            order_id UUID NOT NULL REFERENCES orders (id),
            position INTEGER NOT NULL,
            catalog_id TEXT NOT NULL,
            name TEXT NOT NULL,
            category TEXT,
            service_type TEXT,
            unit_price BIGINT NOT NULL CHECK (unit_price >= 0),
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            total_price BIGINT NOT NULL,
            PRIMARY KEY (order_id, position)
        )"
        .to_string(),
        format!(
            "CREATE TABLE IF NOT EXISTS order_status_history (
                id BIGSERIAL PRIMARY KEY,
                order_id UUID NOT NULL REFERENCES orders (id),
                from_status TEXT NOT NULL CHECK (from_status IN ({statuses})),
                to_status TEXT NOT NULL CHECK (to_status IN ({statuses})),
                changed_at TIMESTAMPTZ NOT NULL
            )"
        ),
        "CREATE INDEX IF NOT EXISTS order_status_history_order_idx
            ON order_status_history (order_id, changed_at)"
            .to_string(),
    ]
}

/// Create tables and indexes if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in schema_statements() {
        sqlx::query(&statement).execute(pool).await?;
    }
    tracing::info!("Order schema is in place");
    Ok(())
}
