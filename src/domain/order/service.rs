use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use super::aggregate::Order;
use super::commands::{CreateOrder, UpdateOrder};
use super::errors::{LifecycleError, OrderError};
use super::tracking::TrackingView;
use super::value_objects::{OrderId, OrderStatus, Schedule};
use crate::metrics::Metrics;
use crate::notifications::{Notification, NotificationGateway};
use crate::persistence::{OrderFilter, OrderRepository, RepositoryError};

// ============================================================================
// Order Lifecycle Service
// ============================================================================
//
// Orchestrates: Request → Aggregate rules → Repository → Notification
//
// Holds no mutable state between calls. Validation and lookups happen before
// anything is written; notifications happen after the write and can only
// flip `notification_sent` to false.
//
// ============================================================================

pub const DEFAULT_NOTIFY_TIMEOUT: Duration = Duration::from_secs(3);

/// Result of a write that notifies the customer.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderOutcome {
    pub order: Order,
    pub notification_sent: bool,
}

/// Result of an operator update. `notification_sent` is `None` when only the
/// schedule changed, since schedule edits do not notify.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub order: Order,
    pub notification_sent: Option<bool>,
}

impl From<OrderOutcome> for UpdateOutcome {
    fn from(outcome: OrderOutcome) -> Self {
        Self {
            order: outcome.order,
            notification_sent: Some(outcome.notification_sent),
        }
    }
}

pub struct OrderLifecycleService {
    repository: Arc<dyn OrderRepository>,
    notifier: Arc<dyn NotificationGateway>,
    metrics: Arc<Metrics>,
    notify_timeout: Duration,
}

impl OrderLifecycleService {
    pub fn new(
        repository: Arc<dyn OrderRepository>,
        notifier: Arc<dyn NotificationGateway>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            repository,
            notifier,
            metrics,
            notify_timeout: DEFAULT_NOTIFY_TIMEOUT,
        }
    }

    pub fn with_notify_timeout(mut self, timeout: Duration) -> Self {
        self.notify_timeout = timeout;
        self
    }

    pub async fn create_order(&self, command: CreateOrder) -> Result<OrderOutcome, LifecycleError> {
        let order = Order::create(command, Utc::now())?;

        let order = self
            .repository
            .create_order_atomic(order)
            .await
            .map_err(|e| self.storage_failure("create_order", e))?;

        self.metrics.record_order_created();
        tracing::info!(
            order_id = %order.id,
            item_count = order.items.len(),
            total = %order.total_amount,
            "Order created"
        );

        let notification_sent = self
            .notify(Notification::OrderConfirmation {
                order: (&order).into(),
            })
            .await;

        Ok(OrderOutcome {
            order,
            notification_sent,
        })
    }

    pub async fn transition_status(
        &self,
        order_id: &str,
        requested: OrderStatus,
    ) -> Result<OrderOutcome, LifecycleError> {
        let order = self.load(order_id).await?;
        self.commit_transition(&order, requested, None).await
    }

    /// Change pickup and/or delivery times on a non-terminal order.
    pub async fn reschedule(
        &self,
        order_id: &str,
        pickup_at: Option<DateTime<Utc>>,
        delivery_at: Option<DateTime<Utc>>,
    ) -> Result<Order, LifecycleError> {
        let order = self.load(order_id).await?;
        let schedule = order.reschedule(pickup_at, delivery_at)?;

        let updated = self
            .repository
            .update_schedule(order.id, order.status, schedule, Utc::now())
            .await
            .map_err(|e| self.storage_failure("reschedule", e))?;

        tracing::info!(
            order_id = %updated.id,
            pickup_at = ?updated.schedule.pickup_at,
            delivery_at = ?updated.schedule.delivery_at,
            "Order rescheduled"
        );
        Ok(updated)
    }

    /// Apply an operator update carrying a new status, new schedule times, or both.
    ///
    /// When both are present the status check sees the new schedule, so one
    /// request can set a pickup date and confirm the order. The two are then
    /// written together.
    pub async fn update_order(
        &self,
        order_id: &str,
        update: UpdateOrder,
    ) -> Result<UpdateOutcome, LifecycleError> {
        if update.is_empty() {
            return Err(OrderError::EmptyUpdate.into());
        }

        match (update.status, update.reschedules()) {
            (None, _) => {
                let order = self
                    .reschedule(order_id, update.pickup_at, update.delivery_at)
                    .await?;
                Ok(UpdateOutcome {
                    order,
                    notification_sent: None,
                })
            }
            (Some(requested), false) => {
                let outcome = self.transition_status(order_id, requested).await?;
                Ok(outcome.into())
            }
            (Some(requested), true) => {
                let order = self.load(order_id).await?;
                let schedule = order.reschedule(update.pickup_at, update.delivery_at)?;

                let mut candidate = order;
                candidate.schedule = schedule;
                let outcome = self
                    .commit_transition(&candidate, requested, Some(schedule))
                    .await?;
                Ok(outcome.into())
            }
        }
    }

    pub async fn get_order(&self, order_id: &str) -> Result<Order, LifecycleError> {
        self.load(order_id).await
    }

    pub async fn get_tracking_view(&self, order_id: &str) -> Result<TrackingView, LifecycleError> {
        let order = self.load(order_id).await?;
        Ok(TrackingView::from_order(&order))
    }

    pub async fn list_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>, LifecycleError> {
        self.repository
            .list_by_filter(filter)
            .await
            .map_err(|e| self.storage_failure("list_orders", e))
    }

    pub async fn ping_storage(&self) -> Result<(), RepositoryError> {
        self.repository.ping().await
    }

    // ------------------------------------------------------------------------

    async fn load(&self, order_id: &str) -> Result<Order, LifecycleError> {
        // A malformed id cannot name an order, so it is simply not found.
        let id: OrderId = order_id
            .parse()
            .map_err(|_| LifecycleError::not_found(order_id))?;

        self.repository
            .find_by_id(id)
            .await
            .map_err(|e| self.storage_failure("find_by_id", e))?
            .ok_or_else(|| LifecycleError::not_found(id))
    }

    /// Validate and store a status change. `schedule` is written in the same
    /// repository call, and `order` must already carry it.
    async fn commit_transition(
        &self,
        order: &Order,
        requested: OrderStatus,
        schedule: Option<Schedule>,
    ) -> Result<OrderOutcome, LifecycleError> {
        let change = order
            .transition(requested, Utc::now())
            .map_err(|error| self.rejected(order, requested, error))?;

        let updated = match self.repository.update_status(order.id, change, schedule).await {
            Ok(updated) => updated,
            Err(RepositoryError::Conflict { id, expected }) => {
                self.metrics.record_rejected_transition("conflict");
                tracing::warn!(
                    order_id = %id,
                    expected = %expected,
                    to = %requested,
                    "Concurrent status change, transition rejected"
                );
                return Err(RepositoryError::Conflict { id, expected }.into());
            }
            Err(e) => return Err(self.storage_failure("update_status", e)),
        };

        self.metrics
            .record_transition(change.from.as_str(), change.to.as_str());
        tracing::info!(
            order_id = %updated.id,
            from = %change.from,
            to = %change.to,
            "Order status changed"
        );

        let notification_sent = self
            .notify(Notification::StatusUpdate {
                order: (&updated).into(),
                from: change.from,
                to: change.to,
            })
            .await;

        Ok(OrderOutcome {
            order: updated,
            notification_sent,
        })
    }

    fn rejected(&self, order: &Order, requested: OrderStatus, error: OrderError) -> LifecycleError {
        self.metrics.record_rejected_transition(error.reason());
        tracing::warn!(
            order_id = %order.id,
            from = %order.status,
            to = %requested,
            reason = error.reason(),
            "Transition rejected"
        );
        error.into()
    }

    fn storage_failure(&self, operation: &'static str, error: RepositoryError) -> LifecycleError {
        if matches!(
            error,
            RepositoryError::Database(_)
                | RepositoryError::CorruptRow { .. }
                | RepositoryError::Unavailable(_)
        ) {
            tracing::error!(operation, error = %error, "Order storage failure");
        }
        error.into()
    }

    /// Best-effort delivery bounded by `notify_timeout`. Returns whether the
    /// gateway accepted the notification.
    async fn notify(&self, notification: Notification) -> bool {
        let kind = notification.kind().as_str();
        let order_id = notification.order().order_id;

        match tokio::time::timeout(
            self.notify_timeout,
            notification.deliver(self.notifier.as_ref()),
        )
        .await
        {
            Ok(Ok(())) => {
                self.metrics.record_notification(kind, "accepted");
                true
            }
            Ok(Err(error)) => {
                self.metrics.record_notification(kind, "failed");
                tracing::warn!(%order_id, kind, error = %error, "Notification failed");
                false
            }
            Err(_) => {
                self.metrics.record_notification(kind, "timeout");
                tracing::warn!(
                    %order_id,
                    kind,
                    timeout_ms = self.notify_timeout.as_millis() as u64,
                    "Notification timed out"
                );
                false
            }
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{Money, NewCustomer, NewLineItem};
    use crate::notifications::{
        MockNotificationGateway, NotificationError, OrderSnapshot,
    };
    use crate::persistence::{InMemoryOrderRepository, MockOrderRepository};
    use async_trait::async_trait;
    use chrono::Duration as ChronoDuration;

    fn create_test_command() -> CreateOrder {
        CreateOrder {
            customer: NewCustomer {
                name: "Asha Roy".to_string(),
                email: "asha@example.com".to_string(),
                phone: "9876543210".to_string(),
                address: Some("12 Lake Rd".to_string()),
                city: Some("Kolkata".to_string()),
                zip: Some("700029".to_string()),
            },
            items: vec![
                NewLineItem {
                    catalog_id: "shirt".to_string(),
                    unit_price: 5,
                    quantity: 3,
                    ..Default::default()
                },
                NewLineItem {
                    catalog_id: "pants".to_string(),
                    unit_price: 7,
                    quantity: 2,
                    ..Default::default()
                },
            ],
            pickup_at: Some(Utc::now() + ChronoDuration::days(1)),
            delivery_at: None,
            special_instructions: None,
        }
    }

    fn accepting_gateway() -> MockNotificationGateway {
        let mut gateway = MockNotificationGateway::new();
        gateway
            .expect_send_order_confirmation()
            .returning(|_| Ok(()));
        gateway
            .expect_send_status_update()
            .returning(|_, _, _| Ok(()));
        gateway
    }

    fn create_service(gateway: MockNotificationGateway) -> OrderLifecycleService {
        OrderLifecycleService::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(gateway),
            Arc::new(Metrics::new().unwrap()),
        )
    }

    async fn create_order(service: &OrderLifecycleService) -> Order {
        service
            .create_order(create_test_command())
            .await
            .unwrap()
            .order
    }

    #[tokio::test]
    async fn test_create_then_track_shows_pending() {
        let service = create_service(accepting_gateway());
        let outcome = service.create_order(create_test_command()).await.unwrap();

        assert!(outcome.notification_sent);
        assert_eq!(outcome.order.total_amount, Money::from_units(29));
        assert_eq!(outcome.order.status, OrderStatus::Pending);

        let found = service
            .get_order(&outcome.order.id.to_string())
            .await
            .unwrap();
        assert_eq!(found, outcome.order);

        let view = service
            .get_tracking_view(&outcome.order.id.to_string())
            .await
            .unwrap();
        assert_eq!(view.current_status, OrderStatus::Pending);
        let completed: Vec<bool> = view.tracking_steps.iter().map(|s| s.completed).collect();
        assert_eq!(completed, vec![true, false, false, false, false, false]);
    }

    #[tokio::test]
    async fn test_full_lifecycle_with_skip_completes_every_step() {
        let service = create_service(accepting_gateway());
        let id = create_order(&service).await.id.to_string();

        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Completed,
        ] {
            let outcome = service.transition_status(&id, status).await.unwrap();
            assert_eq!(outcome.order.status, status);
            assert!(outcome.notification_sent);
        }

        let view = service.get_tracking_view(&id).await.unwrap();
        assert_eq!(view.tracking_steps.len(), 6);
        assert!(view.tracking_steps.iter().all(|s| s.completed));

        let result = service.transition_status(&id, OrderStatus::Processing).await;
        assert!(matches!(result, Err(LifecycleError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_cancel_from_every_non_terminal_status() {
        let service = create_service(accepting_gateway());
        let path = [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::ReadyForPickup,
            OrderStatus::OutForDelivery,
        ];

        for depth in 0..=path.len() {
            let id = create_order(&service).await.id.to_string();
            for status in &path[..depth] {
                service.transition_status(&id, *status).await.unwrap();
            }

            let outcome = service
                .transition_status(&id, OrderStatus::Cancelled)
                .await
                .unwrap();
            assert_eq!(outcome.order.status, OrderStatus::Cancelled);

            let again = service.transition_status(&id, OrderStatus::Confirmed).await;
            assert!(matches!(again, Err(LifecycleError::InvalidTransition(_))));
        }
    }

    #[tokio::test]
    async fn test_same_status_is_rejected_and_counted() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = OrderLifecycleService::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(accepting_gateway()),
            metrics.clone(),
        );
        let id = create_order(&service).await.id.to_string();

        let result = service.transition_status(&id, OrderStatus::Pending).await;
        assert!(matches!(result, Err(LifecycleError::InvalidTransition(_))));
        assert_eq!(
            metrics
                .transitions_rejected
                .with_label_values(&["same_status"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_unknown_and_malformed_ids_are_not_found() {
        let service = create_service(MockNotificationGateway::new());

        let unknown = OrderId::new().to_string();
        assert!(matches!(
            service.get_tracking_view(&unknown).await,
            Err(LifecycleError::NotFound(_))
        ));
        assert!(matches!(
            service.transition_status("not-an-id", OrderStatus::Confirmed).await,
            Err(LifecycleError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_validation_failure_has_no_side_effects() {
        // No expectations: any notification call would panic.
        let service = create_service(MockNotificationGateway::new());
        let mut command = create_test_command();
        command.items.clear();

        let result = service.create_order(command).await;
        assert!(matches!(
            result,
            Err(LifecycleError::Validation(OrderError::EmptyItems))
        ));
        assert!(service
            .list_orders(&OrderFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_confirming_without_pickup_is_a_validation_error() {
        let service = create_service(accepting_gateway());
        let mut command = create_test_command();
        command.pickup_at = None;
        let id = service.create_order(command).await.unwrap().order.id.to_string();

        let result = service.transition_status(&id, OrderStatus::Confirmed).await;
        assert!(matches!(
            result,
            Err(LifecycleError::Validation(OrderError::PickupNotScheduled))
        ));
    }

    #[tokio::test]
    async fn test_notification_failure_keeps_order() {
        let mut gateway = MockNotificationGateway::new();
        gateway
            .expect_send_order_confirmation()
            .times(1)
            .returning(|_| Err(NotificationError::Transport("relay down".to_string())));
        let service = create_service(gateway);

        let outcome = service.create_order(create_test_command()).await.unwrap();
        assert!(!outcome.notification_sent);

        let stored = service.get_order(&outcome.order.id.to_string()).await;
        assert!(stored.is_ok());
    }

    struct SlowGateway;

    #[async_trait]
    impl NotificationGateway for SlowGateway {
        async fn send_order_confirmation(&self, _: &OrderSnapshot) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }

        async fn send_status_update(
            &self,
            _: &OrderSnapshot,
            _: OrderStatus,
            _: OrderStatus,
        ) -> Result<(), NotificationError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_slow_notifier_times_out_without_failing_the_write() {
        let service = OrderLifecycleService::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(SlowGateway),
            Arc::new(Metrics::new().unwrap()),
        )
        .with_notify_timeout(Duration::from_millis(20));

        let outcome = service.create_order(create_test_command()).await.unwrap();
        assert!(!outcome.notification_sent);
        assert_eq!(outcome.order.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn test_persistence_failure_skips_notification() {
        let mut repository = MockOrderRepository::new();
        repository
            .expect_create_order_atomic()
            .times(1)
            .returning(|_| Err(RepositoryError::Unavailable("pool timed out".to_string())));

        let service = OrderLifecycleService::new(
            Arc::new(repository),
            Arc::new(MockNotificationGateway::new()),
            Arc::new(Metrics::new().unwrap()),
        );

        let result = service.create_order(create_test_command()).await;
        assert!(matches!(result, Err(LifecycleError::Persistence(_))));
    }

    #[tokio::test]
    async fn test_lost_race_is_invalid_transition() {
        let order = Order::create(create_test_command(), Utc::now()).unwrap();
        let stored = order.clone();

        let mut repository = MockOrderRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        repository
            .expect_update_status()
            .times(1)
            .returning(|id, change, _| {
                Err(RepositoryError::Conflict {
                    id,
                    expected: change.from,
                })
            });

        let service = OrderLifecycleService::new(
            Arc::new(repository),
            Arc::new(MockNotificationGateway::new()),
            Arc::new(Metrics::new().unwrap()),
        );

        let result = service
            .transition_status(&order.id.to_string(), OrderStatus::Confirmed)
            .await;
        assert!(matches!(result, Err(LifecycleError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_update_sets_pickup_and_confirms_in_one_request() {
        let service = create_service(accepting_gateway());
        let mut command = create_test_command();
        command.pickup_at = None;
        let id = service.create_order(command).await.unwrap().order.id.to_string();

        let pickup = Utc::now() + ChronoDuration::days(2);
        let outcome = service
            .update_order(
                &id,
                UpdateOrder {
                    status: Some(OrderStatus::Confirmed),
                    pickup_at: Some(pickup),
                    delivery_at: None,
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.order.status, OrderStatus::Confirmed);
        assert_eq!(outcome.order.schedule.pickup_at, Some(pickup));
        assert_eq!(outcome.notification_sent, Some(true));
    }

    #[tokio::test]
    async fn test_update_rejected_transition_leaves_schedule_untouched() {
        let service = create_service(accepting_gateway());
        let order = create_order(&service).await;
        let id = order.id.to_string();

        let result = service
            .update_order(
                &id,
                UpdateOrder {
                    status: Some(OrderStatus::Pending),
                    pickup_at: Some(Utc::now() + ChronoDuration::days(7)),
                    delivery_at: None,
                },
            )
            .await;
        assert!(matches!(result, Err(LifecycleError::InvalidTransition(_))));

        let stored = service.get_order(&id).await.unwrap();
        assert_eq!(stored.schedule, order.schedule);
    }

    #[tokio::test]
    async fn test_schedule_only_update_does_not_notify() {
        // Only the creation confirmation is expected.
        let mut gateway = MockNotificationGateway::new();
        gateway
            .expect_send_order_confirmation()
            .times(1)
            .returning(|_| Ok(()));
        let service = create_service(gateway);
        let order = create_order(&service).await;

        let delivery = order.schedule.pickup_at.unwrap() + ChronoDuration::days(3);
        let outcome = service
            .update_order(
                &order.id.to_string(),
                UpdateOrder {
                    delivery_at: Some(delivery),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.notification_sent, None);
        assert_eq!(outcome.order.schedule.delivery_at, Some(delivery));

        let empty = service
            .update_order(&order.id.to_string(), UpdateOrder::default())
            .await;
        assert!(matches!(
            empty,
            Err(LifecycleError::Validation(OrderError::EmptyUpdate))
        ));
    }

    #[tokio::test]
    async fn test_reschedule_terminal_order_is_invalid_transition() {
        let service = create_service(accepting_gateway());
        let id = create_order(&service).await.id.to_string();
        service
            .transition_status(&id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let result = service
            .reschedule(&id, Some(Utc::now() + ChronoDuration::days(1)), None)
            .await;
        assert!(matches!(result, Err(LifecycleError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_combined_update_writes_status_and_schedule_together() {
        let order = Order::create(create_test_command(), Utc::now()).unwrap();
        let stored = order.clone();
        let pickup = Utc::now() + ChronoDuration::days(4);

        let mut repository = MockOrderRepository::new();
        repository
            .expect_find_by_id()
            .returning(move |_| Ok(Some(stored.clone())));
        // No update_schedule expectation: a separate schedule write would panic.
        repository
            .expect_update_status()
            .times(1)
            .withf(move |_, change, schedule| {
                change.to == OrderStatus::Confirmed
                    && schedule.as_ref().map(|s| s.pickup_at) == Some(Some(pickup))
            })
            .returning(|id, change, _| {
                Err(RepositoryError::Conflict {
                    id,
                    expected: change.from,
                })
            });

        let service = OrderLifecycleService::new(
            Arc::new(repository),
            Arc::new(MockNotificationGateway::new()),
            Arc::new(Metrics::new().unwrap()),
        );

        let result = service
            .update_order(
                &order.id.to_string(),
                UpdateOrder {
                    status: Some(OrderStatus::Confirmed),
                    pickup_at: Some(pickup),
                    delivery_at: None,
                },
            )
            .await;
        assert!(matches!(result, Err(LifecycleError::InvalidTransition(_))));
    }

    #[tokio::test]
    async fn test_status_only_update_goes_through_transition() {
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = OrderLifecycleService::new(
            Arc::new(InMemoryOrderRepository::new()),
            Arc::new(accepting_gateway()),
            metrics.clone(),
        );
        let order = create_order(&service).await;

        let outcome = service
            .update_order(
                &order.id.to_string(),
                UpdateOrder {
                    status: Some(OrderStatus::Confirmed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(outcome.notification_sent, Some(true));
        assert_eq!(outcome.order.schedule, order.schedule);
        assert_eq!(
            metrics
                .status_transitions
                .with_label_values(&["pending", "confirmed"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn test_list_orders_filters_by_status() {
        let service = create_service(accepting_gateway());
        let first = create_order(&service).await;
        let _second = create_order(&service).await;
        service
            .transition_status(&first.id.to_string(), OrderStatus::Confirmed)
            .await
            .unwrap();

        let confirmed = service
            .list_orders(&OrderFilter {
                status: Some(OrderStatus::Confirmed),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].id, first.id);
    }
}
