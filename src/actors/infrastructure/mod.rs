// ============================================================================
// Infrastructure Actors
// ============================================================================

pub mod dlq;
pub mod notification_dispatcher;

pub use dlq::{DlqActor, GetDlqMessages, GetDlqStats};
pub use notification_dispatcher::{NotificationDispatcher, QueuedNotificationGateway};
