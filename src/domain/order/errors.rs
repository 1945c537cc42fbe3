use super::value_objects::OrderStatus;
use crate::persistence::RepositoryError;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrderError {
    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Item catalog id cannot be empty")]
    MissingCatalogId,

    #[error("Invalid quantity for item {item}: {quantity}")]
    InvalidQuantity { item: String, quantity: i64 },

    #[error("Invalid price for item {item}: {price}")]
    InvalidPrice { item: String, price: i64 },

    #[error("Order total is too large")]
    TotalOverflow,

    #[error("Customer {0} is required")]
    MissingField(&'static str),

    #[error("Invalid email format: {0}")]
    InvalidEmail(String),

    #[error("Invalid phone number: {0}")]
    InvalidPhone(String),

    #[error("Address, city and zip are required to schedule a pickup")]
    IncompleteAddress,

    #[error("Delivery cannot be scheduled before pickup")]
    DeliveryBeforePickup,

    #[error("A pickup date is required before the order can be confirmed")]
    PickupNotScheduled,

    #[error("Nothing to update: provide a new status or schedule dates")]
    EmptyUpdate,

    #[error("Unknown order status: {0}")]
    UnknownStatus(String),

    #[error("Order is already {0}")]
    AlreadyInStatus(OrderStatus),

    #[error("Order is {0} and can no longer change")]
    Terminal(OrderStatus),

    #[error("Cannot move order back from {from} to {to}")]
    Backwards { from: OrderStatus, to: OrderStatus },
}

impl OrderError {
    /// State-machine violations, as opposed to malformed input.
    pub fn is_transition_violation(&self) -> bool {
        matches!(
            self,
            OrderError::AlreadyInStatus(_) | OrderError::Terminal(_) | OrderError::Backwards { .. }
        )
    }

    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            OrderError::AlreadyInStatus(_) => "same_status",
            OrderError::Terminal(_) => "terminal",
            OrderError::Backwards { .. } => "backwards",
            OrderError::PickupNotScheduled => "pickup_not_scheduled",
            _ => "validation",
        }
    }
}

// ============================================================================
// Lifecycle Service Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("{0}")]
    Validation(OrderError),

    #[error("order not found: {0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidTransition(String),

    #[error("persistence failure: {0}")]
    Persistence(#[source] RepositoryError),
}

impl From<OrderError> for LifecycleError {
    fn from(error: OrderError) -> Self {
        if error.is_transition_violation() {
            LifecycleError::InvalidTransition(error.to_string())
        } else {
            LifecycleError::Validation(error)
        }
    }
}

impl From<RepositoryError> for LifecycleError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::NotFound(id) => LifecycleError::NotFound(id.to_string()),
            RepositoryError::Conflict { id, expected } => LifecycleError::InvalidTransition(
                format!("order {} changed concurrently and is no longer {}", id, expected),
            ),
            other => LifecycleError::Persistence(other),
        }
    }
}

impl LifecycleError {
    pub fn not_found(id: impl ToString) -> Self {
        LifecycleError::NotFound(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderId;

    #[test]
    fn test_transition_violations_map_to_invalid_transition() {
        let err: LifecycleError = OrderError::Terminal(OrderStatus::Completed).into();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));

        let err: LifecycleError = OrderError::AlreadyInStatus(OrderStatus::Pending).into();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    }

    #[test]
    fn test_input_errors_map_to_validation() {
        let err: LifecycleError = OrderError::EmptyItems.into();
        assert!(matches!(err, LifecycleError::Validation(OrderError::EmptyItems)));

        let err: LifecycleError = OrderError::PickupNotScheduled.into();
        assert!(matches!(err, LifecycleError::Validation(_)));
    }

    #[test]
    fn test_repository_errors_are_classified() {
        let id = OrderId::new();

        let err: LifecycleError = RepositoryError::NotFound(id).into();
        assert!(matches!(err, LifecycleError::NotFound(ref s) if *s == id.to_string()));

        let err: LifecycleError = RepositoryError::Conflict {
            id,
            expected: OrderStatus::Pending,
        }
        .into();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));

        let err: LifecycleError = RepositoryError::Unavailable("down".to_string()).into();
        assert!(matches!(err, LifecycleError::Persistence(_)));
    }
}
