use std::sync::Arc;

use actix::prelude::*;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Semaphore;

use super::dlq::{AddToDlq, DlqActor};
use crate::domain::order::OrderStatus;
use crate::metrics::Metrics;
use crate::notifications::{Notification, NotificationError, NotificationGateway, OrderSnapshot};
use crate::utils::{retry_on_transient, RetryConfig, RetryResult};

// ============================================================================
// Notification Dispatcher Actor
// ============================================================================
//
// Takes notifications off the request path. Each accepted notification holds
// one permit from `in_flight` until its delivery finishes, so at most
// `capacity` deliveries (including their retry backoff) are pending at once.
// When no permit is left the dispatch is refused with `QueueFull`. Transient
// failures are retried with exponential backoff, and anything still failing
// afterwards goes to the DlqActor.
//
// ============================================================================

pub struct NotificationDispatcher {
    gateway: Arc<dyn NotificationGateway>,
    retry: RetryConfig,
    dlq: Addr<DlqActor>,
    metrics: Arc<Metrics>,
    in_flight: Arc<Semaphore>,
}

impl NotificationDispatcher {
    pub fn new(
        gateway: Arc<dyn NotificationGateway>,
        retry: RetryConfig,
        dlq: Addr<DlqActor>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            gateway,
            retry,
            dlq,
            metrics,
            in_flight: Arc::new(Semaphore::new(0)),
        }
    }

    /// Start the actor accepting at most `capacity` undelivered notifications.
    pub fn start_with_capacity(mut self, capacity: usize) -> Addr<Self> {
        self.in_flight = Arc::new(Semaphore::new(capacity));
        Self::create(move |ctx| {
            ctx.set_mailbox_capacity(capacity);
            self
        })
    }
}

impl Actor for NotificationDispatcher {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            max_attempts = self.retry.max_attempts,
            capacity = self.in_flight.available_permits(),
            "NotificationDispatcher started"
        );
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "Result<(), NotificationError>")]
pub struct Dispatch(pub Notification);

impl Handler<Dispatch> for NotificationDispatcher {
    type Result = Result<(), NotificationError>;

    fn handle(&mut self, msg: Dispatch, ctx: &mut Self::Context) -> Self::Result {
        let permit = self
            .in_flight
            .clone()
            .try_acquire_owned()
            .map_err(|_| NotificationError::QueueFull)?;

        let gateway = self.gateway.clone();
        let retry = self.retry.clone();
        let dlq = self.dlq.clone();
        let metrics = self.metrics.clone();

        let delivery = async move {
            let _permit = permit;
            let notification = msg.0;
            let kind = notification.kind().as_str();
            let order_id = notification.order().order_id;

            let result = retry_on_transient(&retry, |attempt| {
                metrics.record_retry_attempt(kind, attempt);
                let gateway = &gateway;
                let notification = &notification;
                async move { notification.deliver(gateway.as_ref()).await }
            })
            .await;

            match result {
                RetryResult::Success { value: (), attempts } => {
                    metrics.record_notification(kind, "delivered");
                    tracing::debug!(%order_id, kind, attempts, "Notification delivered");
                }
                RetryResult::Exhausted { error, attempts }
                | RetryResult::PermanentFailure { error, attempts } => {
                    metrics.record_notification(kind, "dead_lettered");
                    metrics.record_dlq_message(kind);
                    tracing::error!(
                        %order_id,
                        kind,
                        attempts,
                        error = %error,
                        "Notification undeliverable, dead-lettering"
                    );
                    dlq.do_send(AddToDlq {
                        notification,
                        error_message: error.to_string(),
                        attempts,
                        failed_at: Utc::now(),
                    });
                }
            }
        };

        ctx.spawn(delivery.into_actor(self));
        Ok(())
    }
}

// ============================================================================
// Queued Gateway - NotificationGateway facade over the dispatcher
// ============================================================================

/// Hands notifications to the dispatcher and returns once it accepted them.
///
/// `Ok` means the notification was accepted for delivery. A dispatcher that
/// already has its full share of deliveries pending reports `QueueFull`
/// instead of waiting.
#[derive(Clone)]
pub struct QueuedNotificationGateway {
    dispatcher: Addr<NotificationDispatcher>,
}

impl QueuedNotificationGateway {
    pub fn new(dispatcher: Addr<NotificationDispatcher>) -> Self {
        Self { dispatcher }
    }

    async fn enqueue(&self, notification: Notification) -> Result<(), NotificationError> {
        self.dispatcher
            .send(Dispatch(notification))
            .await
            .map_err(map_mailbox_error)?
    }
}

fn map_mailbox_error(error: MailboxError) -> NotificationError {
    match error {
        MailboxError::Timeout => NotificationError::QueueFull,
        MailboxError::Closed => NotificationError::DispatcherGone,
    }
}

#[async_trait]
impl NotificationGateway for QueuedNotificationGateway {
    async fn send_order_confirmation(&self, order: &OrderSnapshot) -> Result<(), NotificationError> {
        self.enqueue(Notification::OrderConfirmation {
            order: order.clone(),
        })
        .await
    }

    async fn send_status_update(
        &self,
        order: &OrderSnapshot,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), NotificationError> {
        self.enqueue(Notification::StatusUpdate {
            order: order.clone(),
            from,
            to,
        })
        .await
    }
}
