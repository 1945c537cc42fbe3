use async_trait::async_trait;

use super::{NotificationError, NotificationGateway, NotificationMessage, OrderSnapshot};
use crate::domain::order::OrderStatus;

/// Fallback gateway used when no relay is configured.
///
/// Writes the rendered message to the log and always succeeds.
#[derive(Debug, Default, Clone)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    fn emit(message: &NotificationMessage) {
        tracing::info!(
            order_id = %message.order_id,
            kind = message.kind.as_str(),
            to_email = %message.to_email,
            to_phone = %message.to_phone,
            subject = %message.subject,
            body = %message.body,
            "Notification (no relay configured)"
        );
    }
}

#[async_trait]
impl NotificationGateway for LoggingNotifier {
    async fn send_order_confirmation(&self, order: &OrderSnapshot) -> Result<(), NotificationError> {
        Self::emit(&NotificationMessage::order_confirmation(order));
        Ok(())
    }

    async fn send_status_update(
        &self,
        order: &OrderSnapshot,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), NotificationError> {
        Self::emit(&NotificationMessage::status_update(order, from, to));
        Ok(())
    }
}
