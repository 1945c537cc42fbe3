use std::collections::{HashMap, VecDeque};

use actix::prelude::*;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::notifications::Notification;

// ============================================================================
// Dead Letter Queue Actor
// ============================================================================
//
// Holds notifications that could not be delivered after every retry, so an
// operator can inspect them. Kept in memory and bounded: once `capacity` is
// reached the oldest entry is dropped.
//
// ============================================================================

pub const DEFAULT_DLQ_CAPACITY: usize = 1_000;

pub struct DlqActor {
    messages: VecDeque<DeadLetter>,
    capacity: usize,
    total_received: u64,
}

impl DlqActor {
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: VecDeque::new(),
            capacity: capacity.max(1),
            total_received: 0,
        }
    }
}

impl Default for DlqActor {
    fn default() -> Self {
        Self::new(DEFAULT_DLQ_CAPACITY)
    }
}

impl Actor for DlqActor {
    type Context = Context<Self>;

    fn started(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(capacity = self.capacity, "DlqActor started - Dead Letter Queue ready");
    }
}

// ============================================================================
// Messages
// ============================================================================

#[derive(Message, Debug, Clone)]
#[rtype(result = "()")]
pub struct AddToDlq {
    pub notification: Notification,
    pub error_message: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Message)]
#[rtype(result = "Vec<DeadLetter>")]
pub struct GetDlqMessages {
    pub limit: usize,
}

#[derive(Message)]
#[rtype(result = "DlqStats")]
pub struct GetDlqStats;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub id: Uuid,
    pub notification: Notification,
    pub error_message: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DlqStats {
    pub total_messages: usize,
    pub total_received: u64,
    pub by_kind: HashMap<String, usize>,
}

// ============================================================================
// Handlers
// ============================================================================

impl Handler<AddToDlq> for DlqActor {
    type Result = ();

    fn handle(&mut self, msg: AddToDlq, _: &mut Self::Context) -> Self::Result {
        let letter = DeadLetter {
            id: Uuid::new_v4(),
            notification: msg.notification,
            error_message: msg.error_message,
            attempts: msg.attempts,
            failed_at: msg.failed_at,
        };

        tracing::error!(
            dead_letter_id = %letter.id,
            order_id = %letter.notification.order().order_id,
            kind = letter.notification.kind().as_str(),
            attempts = letter.attempts,
            error = %letter.error_message,
            "Adding notification to Dead Letter Queue"
        );

        if self.messages.len() >= self.capacity {
            if let Some(dropped) = self.messages.pop_front() {
                tracing::warn!(dead_letter_id = %dropped.id, "DLQ full, dropping oldest entry");
            }
        }
        self.messages.push_back(letter);
        self.total_received += 1;
    }
}

impl Handler<GetDlqMessages> for DlqActor {
    type Result = MessageResult<GetDlqMessages>;

    fn handle(&mut self, msg: GetDlqMessages, _: &mut Self::Context) -> Self::Result {
        // Newest first.
        MessageResult(self.messages.iter().rev().take(msg.limit).cloned().collect())
    }
}

impl Handler<GetDlqStats> for DlqActor {
    type Result = MessageResult<GetDlqStats>;

    fn handle(&mut self, _msg: GetDlqStats, _: &mut Self::Context) -> Self::Result {
        let mut by_kind = HashMap::new();
        for letter in &self.messages {
            *by_kind
                .entry(letter.notification.kind().as_str().to_string())
                .or_insert(0) += 1;
        }

        MessageResult(DlqStats {
            total_messages: self.messages.len(),
            total_received: self.total_received,
            by_kind,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::notifications::test_snapshot;

    fn dead_letter(notification: Notification) -> AddToDlq {
        AddToDlq {
            notification,
            error_message: "relay transport error".to_string(),
            attempts: 3,
            failed_at: Utc::now(),
        }
    }

    #[actix::test]
    async fn test_dlq_stores_and_reports() {
        let dlq = DlqActor::default().start();

        dlq.send(dead_letter(Notification::OrderConfirmation {
            order: test_snapshot(),
        }))
        .await
        .unwrap();
        dlq.send(dead_letter(Notification::StatusUpdate {
            order: test_snapshot(),
            from: OrderStatus::Pending,
            to: OrderStatus::Confirmed,
        }))
        .await
        .unwrap();

        let stats = dlq.send(GetDlqStats).await.unwrap();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.by_kind.get("status_update"), Some(&1));

        let messages = dlq.send(GetDlqMessages { limit: 1 }).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(matches!(
            messages[0].notification,
            Notification::StatusUpdate { .. }
        ));
    }

    #[actix::test]
    async fn test_dlq_drops_oldest_when_full() {
        let dlq = DlqActor::new(2).start();
        for _ in 0..3 {
            dlq.send(dead_letter(Notification::OrderConfirmation {
                order: test_snapshot(),
            }))
            .await
            .unwrap();
        }

        let stats = dlq.send(GetDlqStats).await.unwrap();
        assert_eq!(stats.total_messages, 2);
        assert_eq!(stats.total_received, 3);
    }
}
