use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

// ============================================================================
// Metrics Module - Prometheus metrics for observability
// ============================================================================
//
// Covers:
// - Order creation and status transitions (accepted and rejected)
// - Notification delivery outcomes, retries and dead letters
// - Notification relay circuit breaker state
//
// Everything is registered on a private registry and rendered at /metrics.
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Order Lifecycle Metrics
    pub orders_created: IntCounter,
    pub status_transitions: IntCounterVec,
    pub transitions_rejected: IntCounterVec,

    // Notification Metrics
    pub notifications: IntCounterVec,
    pub notification_duration: HistogramVec,
    pub retry_attempts_total: IntCounterVec,

    // DLQ Metrics
    pub dlq_messages_total: IntCounter,
    pub dlq_messages_by_kind: IntCounterVec,

    // Circuit Breaker Metrics
    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders created")?;
        registry.register(Box::new(orders_created.clone()))?;

        let status_transitions = IntCounterVec::new(
            Opts::new("order_status_transitions_total", "Accepted order status transitions"),
            &["from", "to"],
        )?;
        registry.register(Box::new(status_transitions.clone()))?;

        let transitions_rejected = IntCounterVec::new(
            Opts::new(
                "order_transitions_rejected_total",
                "Rejected order status transitions",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(transitions_rejected.clone()))?;

        let notifications = IntCounterVec::new(
            Opts::new("notifications_total", "Notification attempts by outcome"),
            &["kind", "outcome"],
        )?;
        registry.register(Box::new(notifications.clone()))?;

        let notification_duration = HistogramVec::new(
            HistogramOpts::new(
                "notification_delivery_duration_seconds",
                "Notification relay call duration",
            )
            .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 3.0, 10.0]),
            &["kind"],
        )?;
        registry.register(Box::new(notification_duration.clone()))?;

        let retry_attempts_total = IntCounterVec::new(
            Opts::new("retry_attempts_total", "Total retry attempts"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(retry_attempts_total.clone()))?;

        let dlq_messages_total = IntCounter::new(
            "dlq_messages_total",
            "Total notifications moved to the dead letter queue",
        )?;
        registry.register(Box::new(dlq_messages_total.clone()))?;

        let dlq_messages_by_kind = IntCounterVec::new(
            Opts::new("dlq_messages_by_kind", "Dead-lettered notifications by kind"),
            &["kind"],
        )?;
        registry.register(Box::new(dlq_messages_by_kind.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "circuit_breaker_state",
            "Notification relay circuit breaker state (0=Closed, 1=Open, 2=HalfOpen)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            status_transitions,
            transitions_rejected,
            notifications,
            notification_duration,
            retry_attempts_total,
            dlq_messages_total,
            dlq_messages_by_kind,
            circuit_breaker_state,
        })
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    pub fn record_transition(&self, from: &str, to: &str) {
        self.status_transitions.with_label_values(&[from, to]).inc();
    }

    pub fn record_rejected_transition(&self, reason: &str) {
        self.transitions_rejected.with_label_values(&[reason]).inc();
    }

    /// Service side: `accepted`, `failed`, `timeout`. Dispatcher side:
    /// `delivered`, `dead_lettered`.
    pub fn record_notification(&self, kind: &str, outcome: &str) {
        self.notifications.with_label_values(&[kind, outcome]).inc();
    }

    pub fn observe_notification_duration(&self, kind: &str, duration_secs: f64) {
        self.notification_duration
            .with_label_values(&[kind])
            .observe(duration_secs);
    }

    pub fn record_retry_attempt(&self, operation: &str, attempt: u32) {
        self.retry_attempts_total
            .with_label_values(&[operation, &attempt.to_string()])
            .inc();
    }

    pub fn record_dlq_message(&self, kind: &str) {
        self.dlq_messages_total.inc();
        self.dlq_messages_by_kind.with_label_values(&[kind]).inc();
    }

    pub fn update_circuit_breaker_state(&self, state: i64) {
        self.circuit_breaker_state.set(state);
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}
