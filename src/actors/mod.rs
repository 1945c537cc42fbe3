// ============================================================================
// Actors Module
// ============================================================================
//
// Actor-based infrastructure for work that must stay off the request path.
//
// Structure:
// - core/           - health reporting types
// - infrastructure/ - notification dispatcher and dead letter queue
//
// Note: Order lifecycle logic lives in the domain service, NOT in actors.
//       Actors are reserved for infrastructure concerns only.
//
// ============================================================================

mod core;
mod infrastructure;

pub use self::core::{ComponentHealth, HealthStatus, SystemHealth};
pub use self::infrastructure::{
    DlqActor, GetDlqMessages, GetDlqStats, NotificationDispatcher, QueuedNotificationGateway,
};
