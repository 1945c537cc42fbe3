// ============================================================================
// Order Domain - Business Logic for the Order Lifecycle
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderId, Money, OrderStatus, customer and item types)
// - Commands (CreateOrder, UpdateOrder)
// - Errors (OrderError, LifecycleError)
// - Aggregate (Order with the state machine rules)
// - Tracking (customer-facing timeline projection)
// - Service (OrderLifecycleService)
//
// Storage and notification delivery sit behind traits in their own modules.
//
// ============================================================================

pub mod value_objects;
pub mod commands;
pub mod errors;
pub mod aggregate;
pub mod tracking;
pub mod service;

// Re-export for convenience
pub use value_objects::*;
pub use commands::*;
pub use errors::*;
pub use aggregate::*;
pub use service::*;
