use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use async_trait::async_trait;

use super::{NotificationError, NotificationGateway, NotificationMessage, OrderSnapshot};
use crate::domain::order::OrderStatus;
use crate::metrics::Metrics;
use crate::utils::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError};

/// Posts rendered messages as JSON to an email/SMS relay.
///
/// Calls go through a circuit breaker so a dead relay fails fast instead of
/// holding every dispatcher attempt for the full request timeout. A 4xx reply
/// is the message's fault, not the relay's, and leaves the breaker alone.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: String,
    circuit_breaker: CircuitBreaker,
    metrics: Arc<Metrics>,
}

impl WebhookNotifier {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build notification relay HTTP client")?;

        Ok(Self {
            client,
            url: url.into(),
            circuit_breaker: CircuitBreaker::new(
                "notification_relay",
                CircuitBreakerConfig {
                    failure_threshold: 5,
                    open_timeout: Duration::from_secs(30),
                    success_threshold: 2,
                },
            ),
            metrics,
        })
    }

    async fn post(&self, message: &NotificationMessage) -> Result<(), NotificationError> {
        let started = Instant::now();
        let result = self
            .circuit_breaker
            .call(async {
                let response = self
                    .client
                    .post(&self.url)
                    .json(message)
                    .send()
                    .await
                    .map_err(|e| {
                        if e.is_timeout() {
                            NotificationError::Timeout
                        } else {
                            NotificationError::Transport(e.to_string())
                        }
                    })?;

                let status = response.status();
                if status.is_success() {
                    Ok(())
                } else {
                    Err(NotificationError::Rejected(status.as_u16()))
                }
            })
            .await;

        self.metrics
            .update_circuit_breaker_state(self.circuit_breaker.state().await.as_gauge());
        self.metrics.observe_notification_duration(
            message.kind.as_str(),
            started.elapsed().as_secs_f64(),
        );

        match result {
            Ok(()) => {
                tracing::debug!(
                    order_id = %message.order_id,
                    kind = message.kind.as_str(),
                    "Notification accepted by relay"
                );
                Ok(())
            }
            Err(CircuitBreakerError::CircuitOpen(_)) => Err(NotificationError::CircuitOpen),
            Err(CircuitBreakerError::OperationFailed(error)) => Err(error),
        }
    }
}

#[async_trait]
impl NotificationGateway for WebhookNotifier {
    async fn send_order_confirmation(&self, order: &OrderSnapshot) -> Result<(), NotificationError> {
        self.post(&NotificationMessage::order_confirmation(order)).await
    }

    async fn send_status_update(
        &self,
        order: &OrderSnapshot,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<(), NotificationError> {
        self.post(&NotificationMessage::status_update(order, from, to))
            .await
    }
}
