// ============================================================================
// Notifications - customer messages about order progress
// ============================================================================
//
// The lifecycle service only sees `NotificationGateway`. Delivery is best
// effort: a failed notification is logged and reported, it never undoes the
// order change that triggered it.
//
// Implementations:
// - LoggingNotifier  - no relay configured, messages go to the log
// - WebhookNotifier  - JSON POST to an email/SMS relay
// - QueuedNotificationGateway (actors) - hands off to the dispatcher actor
//
// ============================================================================

mod logging;
mod webhook;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::{Money, Order, OrderId, OrderStatus};
use crate::utils::IsTransient;

pub use logging::LoggingNotifier;
pub use webhook::WebhookNotifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    OrderConfirmation,
    StatusUpdate,
}

impl NotificationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NotificationKind::OrderConfirmation => "order_confirmation",
            NotificationKind::StatusUpdate => "status_update",
        }
    }
}

/// The part of an order a notification needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderSnapshot {
    pub order_id: OrderId,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub item_count: usize,
    pub pickup_at: Option<DateTime<Utc>>,
    pub delivery_at: Option<DateTime<Utc>>,
}

impl From<&Order> for OrderSnapshot {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id,
            customer_name: order.customer.name.clone(),
            customer_email: order.customer.email.as_str().to_string(),
            customer_phone: order.customer.phone.as_str().to_string(),
            status: order.status,
            total_amount: order.total_amount,
            item_count: order.items.len(),
            pickup_at: order.schedule.pickup_at,
            delivery_at: order.schedule.delivery_at,
        }
    }
}

/// A notification waiting to be delivered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    OrderConfirmation {
        order: OrderSnapshot,
    },
    StatusUpdate {
        order: OrderSnapshot,
        from: OrderStatus,
        to: OrderStatus,
    },
}

impl Notification {
    pub fn kind(&self) -> NotificationKind {
        match self {
            Notification::OrderConfirmation { .. } => NotificationKind::OrderConfirmation,
            Notification::StatusUpdate { .. } => NotificationKind::StatusUpdate,
        }
    }

    pub fn order(&self) -> &OrderSnapshot {
        match self {
            Notification::OrderConfirmation { order } | Notification::StatusUpdate { order, .. } => {
                order
            }
        }
    }

    /// Hand this notification to `gateway` once.
    pub async fn deliver(&self, gateway: &dyn NotificationGateway) -> Result<(), NotificationError> {
        match self {
            Notification::OrderConfirmation { order } => {
                gateway.send_order_confirmation(order).await
            }
            Notification::StatusUpdate { order, from, to } => {
                gateway.send_status_update(order, *from, *to).await
            }
        }
    }
}

/// Rendered customer message, the payload a relay receives.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationMessage {
    pub kind: NotificationKind,
    pub order_id: OrderId,
    pub to_email: String,
    pub to_phone: String,
    pub subject: String,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_status: Option<OrderStatus>,
    pub status: OrderStatus,
}

impl NotificationMessage {
    pub fn order_confirmation(order: &OrderSnapshot) -> Self {
        let pickup = order
            .pickup_at
            .map(|at| format!(" Pickup is scheduled for {}.", at.format("%Y-%m-%d %H:%M UTC")))
            .unwrap_or_default();

        Self {
            kind: NotificationKind::OrderConfirmation,
            order_id: order.order_id,
            to_email: order.customer_email.clone(),
            to_phone: order.customer_phone.clone(),
            subject: format!("Order {} received", order.order_id),
            body: format!(
                "Hi {}, we have received your order of {} item(s) totalling {}.{}",
                order.customer_name, order.item_count, order.total_amount, pickup
            ),
            previous_status: None,
            status: order.status,
        }
    }

    pub fn status_update(order: &OrderSnapshot, from: OrderStatus, to: OrderStatus) -> Self {
        Self {
            kind: NotificationKind::StatusUpdate,
            order_id: order.order_id,
            to_email: order.customer_email.clone(),
            to_phone: order.customer_phone.clone(),
            subject: format!("Order {}: {}", order.order_id, to.label()),
            body: format!("Hi {}, {}", order.customer_name, to.description()),
            previous_status: Some(from),
            status: to,
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("relay rejected the notification with HTTP {0}")]
    Rejected(u16),

    #[error("relay transport error: {0}")]
    Transport(String),

    #[error("notification timed out")]
    Timeout,

    #[error("notification relay circuit breaker is open")]
    CircuitOpen,

    #[error("notification queue is full")]
    QueueFull,

    #[error("notification dispatcher is not running")]
    DispatcherGone,
}

impl IsTransient for NotificationError {
    fn is_transient(&self) -> bool {
        match self {
            NotificationError::Rejected(status) => *status == 429 || *status >= 500,
            NotificationError::Transport(_)
            | NotificationError::Timeout
            | NotificationError::CircuitOpen => true,
            NotificationError::QueueFull | NotificationError::DispatcherGone => false,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send_order_confirmation(&self, order: &OrderSnapshot) -> Result<(), NotificationError>;

    async fn send_status_update(
        &self,
        order: &OrderSnapshot,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), NotificationError>;
}

#[cfg(test)]
pub(crate) fn test_snapshot() -> OrderSnapshot {
    OrderSnapshot {
        order_id: OrderId::new(),
        customer_name: "Asha Roy".to_string(),
        customer_email: "asha@example.com".to_string(),
        customer_phone: "9876543210".to_string(),
        status: OrderStatus::Pending,
        total_amount: Money::from_units(29),
        item_count: 2,
        pickup_at: None,
        delivery_at: None,
    }
}
