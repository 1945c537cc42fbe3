use chrono::{DateTime, Utc};
use serde::Serialize;

use super::aggregate::Order;
use super::value_objects::{Money, OrderId, OrderStatus};

// ============================================================================
// Tracking View - customer-facing projection of an order
// ============================================================================
//
// Derived on every read, never stored. The timeline always has one step per
// forward status. A step is complete when its rank is at or below the rank of
// the order's progress status; a cancelled order keeps the timeline frozen at
// the stage it was cancelled from.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingStep {
    pub status: OrderStatus,
    pub label: &'static str,
    pub description: &'static str,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingDetails {
    pub total_amount: Money,
    pub pickup_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingItem {
    pub name: String,
    pub category: Option<String>,
    pub service_type: Option<String>,
    pub quantity: u32,
    pub price: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackingView {
    pub order_id: OrderId,
    pub current_status: OrderStatus,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_at: Option<DateTime<Utc>>,
    pub customer_info: TrackingCustomer,
    pub order_details: TrackingDetails,
    pub items: Vec<TrackingItem>,
    pub tracking_steps: Vec<TrackingStep>,
}

impl TrackingView {
    pub fn from_order(order: &Order) -> Self {
        let address = &order.customer.address;

        Self {
            order_id: order.id,
            current_status: order.status,
            cancelled: order.status == OrderStatus::Cancelled,
            cancelled_at: order.cancelled_at(),
            customer_info: TrackingCustomer {
                name: order.customer.name.clone(),
                email: order.customer.email.as_str().to_string(),
                phone: order.customer.phone.as_str().to_string(),
                address: address.street.clone(),
                city: address.city.clone(),
                zip: address.zip.clone(),
            },
            order_details: TrackingDetails {
                total_amount: order.total_amount,
                pickup_date: order.schedule.pickup_at,
                delivery_date: order.schedule.delivery_at,
                special_instructions: order.special_instructions.clone(),
                created_at: order.created_at,
                updated_at: order.updated_at,
            },
            items: order
                .items
                .iter()
                .map(|item| TrackingItem {
                    name: item.name.clone(),
                    category: item.category.clone(),
                    service_type: item.service_type.clone(),
                    quantity: item.quantity,
                    price: item.unit_price,
                })
                .collect(),
            tracking_steps: timeline(order),
        }
    }
}

/// Build the six-step progress timeline for an order.
pub fn timeline(order: &Order) -> Vec<TrackingStep> {
    // Every forward status has a rank, and `progress_status` is never cancelled.
    let reached = order.progress_status().rank().unwrap_or(0);

    OrderStatus::FORWARD
        .iter()
        .enumerate()
        .map(|(rank, &status)| {
            let completed = rank <= reached;
            TrackingStep {
                status,
                label: status.label(),
                description: status.description(),
                completed,
                timestamp: completed.then(|| step_timestamp(order, rank)),
            }
        })
        .collect()
}

/// When the order first reached (or jumped past) the stage with `rank`.
fn step_timestamp(order: &Order, rank: usize) -> DateTime<Utc> {
    if rank == 0 {
        return order.created_at;
    }
    order
        .history
        .iter()
        .find(|change| change.to.rank().is_some_and(|r| r >= rank))
        .map(|change| change.changed_at)
        .unwrap_or(order.created_at)
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::{CreateOrder, NewCustomer, NewLineItem};
    use chrono::Duration;

    fn create_test_order() -> Order {
        let command = CreateOrder {
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
                    name: Some("Shirt".to_string()),
                    category: Some("Tops".to_string()),
                    service_type: Some("Dry Cleaning".to_string()),
                    unit_price: 5,
                    quantity: 3,
                },
                NewLineItem {
                    catalog_id: "pants".to_string(),
                    unit_price: 7,
                    quantity: 2,
                    ..Default::default()
                },
            ],
            pickup_at: Some(Utc::now() + Duration::days(1)),
            delivery_at: None,
            special_instructions: Some("Starch the collars".to_string()),
        };
        Order::create(command, Utc::now() - Duration::hours(2)).unwrap()
    }

    fn advance(order: &mut Order, to: OrderStatus, at: DateTime<Utc>) {
        let change = order.transition(to, at).unwrap();
        order.apply_status_change(&change);
    }

    fn completed_flags(steps: &[TrackingStep]) -> Vec<bool> {
        steps.iter().map(|s| s.completed).collect()
    }

    fn assert_monotone(steps: &[TrackingStep]) {
        let flags = completed_flags(steps);
        let first_incomplete = flags.iter().position(|c| !c).unwrap_or(flags.len());
        assert!(
            flags[first_incomplete..].iter().all(|c| !c),
            "completed flags not monotone: {:?}",
            flags
        );
    }

    #[test]
    fn test_new_order_has_only_first_step_completed() {
        let order = create_test_order();
        let steps = timeline(&order);

        assert_eq!(steps.len(), 6);
        assert_eq!(completed_flags(&steps), vec![true, false, false, false, false, false]);
        assert_eq!(steps[0].timestamp, Some(order.created_at));
        assert!(steps[1..].iter().all(|s| s.timestamp.is_none()));
    }

    #[test]
    fn test_steps_follow_canonical_order() {
        let steps = timeline(&create_test_order());
        let statuses: Vec<OrderStatus> = steps.iter().map(|s| s.status).collect();
        assert_eq!(statuses, OrderStatus::FORWARD.to_vec());
        assert_eq!(steps[0].label, "Order Placed");
        assert_eq!(steps[5].label, "Completed");
    }

    #[test]
    fn test_timeline_is_monotone_for_every_forward_status() {
        for status in OrderStatus::FORWARD {
            let mut order = create_test_order();
            order.status = status;

            let steps = timeline(&order);
            assert_eq!(steps.len(), 6);
            assert_monotone(&steps);

            let completed = steps.iter().filter(|s| s.completed).count();
            assert_eq!(completed, status.rank().unwrap() + 1);
        }
    }

    #[test]
    fn test_completed_order_has_every_step_completed() {
        let mut order = create_test_order();
        let t0 = order.created_at;
        advance(&mut order, OrderStatus::Confirmed, t0 + Duration::minutes(10));
        advance(&mut order, OrderStatus::Processing, t0 + Duration::minutes(20));
        advance(&mut order, OrderStatus::Completed, t0 + Duration::minutes(30));

        let steps = timeline(&order);
        assert!(steps.iter().all(|s| s.completed));
        assert!(steps.iter().all(|s| s.timestamp.is_some()));
    }

    #[test]
    fn test_timestamps_follow_history_and_skipped_steps_inherit_jump() {
        let mut order = create_test_order();
        let t0 = order.created_at;
        let confirmed_at = t0 + Duration::minutes(10);
        let processing_at = t0 + Duration::minutes(20);
        let completed_at = t0 + Duration::minutes(30);
        advance(&mut order, OrderStatus::Confirmed, confirmed_at);
        advance(&mut order, OrderStatus::Processing, processing_at);
        advance(&mut order, OrderStatus::Completed, completed_at);

        let timestamps: Vec<Option<DateTime<Utc>>> =
            timeline(&order).iter().map(|s| s.timestamp).collect();
        assert_eq!(
            timestamps,
            vec![
                Some(t0),
                Some(confirmed_at),
                Some(processing_at),
                Some(completed_at),
                Some(completed_at),
                Some(completed_at),
            ]
        );
    }

    #[test]
    fn test_cancelled_order_freezes_timeline() {
        let mut order = create_test_order();
        let t0 = order.created_at;
        advance(&mut order, OrderStatus::Confirmed, t0 + Duration::minutes(5));
        advance(&mut order, OrderStatus::Processing, t0 + Duration::minutes(6));
        advance(&mut order, OrderStatus::Cancelled, t0 + Duration::minutes(7));

        let view = TrackingView::from_order(&order);
        assert!(view.cancelled);
        assert_eq!(view.current_status, OrderStatus::Cancelled);
        assert_eq!(view.cancelled_at, Some(t0 + Duration::minutes(7)));
        assert_eq!(view.tracking_steps.len(), 6);
        assert_eq!(
            completed_flags(&view.tracking_steps),
            vec![true, true, true, false, false, false]
        );
        assert_monotone(&view.tracking_steps);
    }

    #[test]
    fn test_order_cancelled_while_pending_shows_only_placed() {
        let mut order = create_test_order();
        advance(&mut order, OrderStatus::Cancelled, Utc::now());

        let steps = timeline(&order);
        assert_eq!(completed_flags(&steps), vec![true, false, false, false, false, false]);
    }

    #[test]
    fn test_view_projects_order_details() {
        let order = create_test_order();
        let view = TrackingView::from_order(&order);

        assert_eq!(view.order_id, order.id);
        assert_eq!(view.customer_info.name, "Asha Roy");
        assert_eq!(view.customer_info.email, "asha@example.com");
        assert_eq!(view.order_details.total_amount, Money::from_units(29));
        assert_eq!(view.order_details.created_at, order.created_at);
        assert_eq!(view.items.len(), 2);
        assert_eq!(view.items[0].name, "Shirt");
        assert_eq!(view.items[0].quantity, 3);
        assert_eq!(view.items[0].price, Money::from_units(5));
        assert!(!view.cancelled);
    }

    #[test]
    fn test_view_serializes_camel_case() {
        let view = TrackingView::from_order(&create_test_order());
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["currentStatus"], "pending");
        assert_eq!(json["trackingSteps"].as_array().unwrap().len(), 6);
        assert_eq!(json["trackingSteps"][0]["completed"], true);
        assert!(json["trackingSteps"][1].get("timestamp").is_none());
        assert_eq!(json["orderDetails"]["totalAmount"], 29);
        assert!(json.get("cancelledAt").is_none());
    }
}
