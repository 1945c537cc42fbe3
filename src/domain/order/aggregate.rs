use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::commands::{CreateOrder, NewCustomer, NewLineItem};
use super::errors::OrderError;
use super::value_objects::{
    Address, CustomerInfo, Email, LineItem, Money, OrderId, OrderStatus, PhoneNumber, Schedule,
    StatusChange,
};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================

/// Upper bound for a single line's quantity.
pub const MAX_ITEM_QUANTITY: i64 = 10_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    // Identity
    pub id: OrderId,

    // Current State
    pub customer: CustomerInfo,
    pub items: Vec<LineItem>,
    pub schedule: Schedule,
    pub special_instructions: Option<String>,
    pub total_amount: Money,
    pub status: OrderStatus,
    pub history: Vec<StatusChange>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Validate a submitted cart and build a new `Pending` order.
    pub fn create(command: CreateOrder, now: DateTime<Utc>) -> Result<Self, OrderError> {
        let items = Self::validate_items(&command.items)?;
        let customer = Self::validate_customer(command.customer)?;

        let schedule = Schedule {
            pickup_at: command.pickup_at,
            delivery_at: command.delivery_at,
        };
        Self::validate_schedule(&customer.address, &schedule)?;

        let total_amount = items
            .iter()
            .try_fold(Money::ZERO, |total, item| total.checked_add(item.line_total))
            .ok_or(OrderError::TotalOverflow)?;

        Ok(Self {
            id: OrderId::new(),
            customer,
            items,
            schedule,
            special_instructions: non_blank(command.special_instructions),
            total_amount,
            status: OrderStatus::Pending,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        })
    }

    /// Check whether `requested` is a legal next status.
    ///
    /// Terminal orders never change, a no-op transition is rejected, and
    /// forward moves may skip stages. Cancelling is allowed from every
    /// non-terminal status.
    pub fn check_transition(&self, requested: OrderStatus) -> Result<(), OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::Terminal(self.status));
        }
        if requested == self.status {
            return Err(OrderError::AlreadyInStatus(self.status));
        }
        if requested == OrderStatus::Cancelled {
            return Ok(());
        }

        if let (Some(current), Some(target)) = (self.status.rank(), requested.rank()) {
            if target < current {
                return Err(OrderError::Backwards {
                    from: self.status,
                    to: requested,
                });
            }
        }

        if self.schedule.pickup_at.is_none() {
            return Err(OrderError::PickupNotScheduled);
        }

        Ok(())
    }

    /// Validate and describe a transition without mutating the order.
    pub fn transition(
        &self,
        requested: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<StatusChange, OrderError> {
        self.check_transition(requested)?;
        Ok(StatusChange {
            from: self.status,
            to: requested,
            changed_at: now,
        })
    }

    pub fn apply_status_change(&mut self, change: &StatusChange) {
        self.status = change.to;
        self.updated_at = change.changed_at;
        self.history.push(*change);
    }

    /// Merge new schedule times into the current schedule and validate the result.
    pub fn reschedule(
        &self,
        pickup_at: Option<DateTime<Utc>>,
        delivery_at: Option<DateTime<Utc>>,
    ) -> Result<Schedule, OrderError> {
        if self.status.is_terminal() {
            return Err(OrderError::Terminal(self.status));
        }

        let schedule = Schedule {
            pickup_at: pickup_at.or(self.schedule.pickup_at),
            delivery_at: delivery_at.or(self.schedule.delivery_at),
        };
        Self::validate_schedule(&self.customer.address, &schedule)?;
        Ok(schedule)
    }

    /// Last forward status the order reached. For a cancelled order this is
    /// the status it was cancelled from.
    pub fn progress_status(&self) -> OrderStatus {
        if self.status != OrderStatus::Cancelled {
            return self.status;
        }
        self.history
            .iter()
            .rev()
            .find(|change| change.to == OrderStatus::Cancelled)
            .map(|change| change.from)
            .unwrap_or(OrderStatus::Pending)
    }

    pub fn cancelled_at(&self) -> Option<DateTime<Utc>> {
        self.history
            .iter()
            .find(|change| change.to == OrderStatus::Cancelled)
            .map(|change| change.changed_at)
    }

    fn validate_items(items: &[NewLineItem]) -> Result<Vec<LineItem>, OrderError> {
        if items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        items
            .iter()
            .map(|item| {
                let catalog_id = item.catalog_id.trim();
                if catalog_id.is_empty() {
                    return Err(OrderError::MissingCatalogId);
                }

                if !(1..=MAX_ITEM_QUANTITY).contains(&item.quantity) {
                    return Err(OrderError::InvalidQuantity {
                        item: catalog_id.to_string(),
                        quantity: item.quantity,
                    });
                }
                if item.unit_price < 0 {
                    return Err(OrderError::InvalidPrice {
                        item: catalog_id.to_string(),
                        price: item.unit_price,
                    });
                }

                // Bounded by MAX_ITEM_QUANTITY above.
                let quantity = item.quantity as u32;
                let unit_price = Money::from_units(item.unit_price);
                let line_total = unit_price
                    .checked_mul(quantity)
                    .ok_or(OrderError::TotalOverflow)?;

                Ok(LineItem {
                    catalog_id: catalog_id.to_string(),
                    name: non_blank(item.name.clone()).unwrap_or_else(|| catalog_id.to_string()),
                    category: non_blank(item.category.clone()),
                    service_type: non_blank(item.service_type.clone()),
                    unit_price,
                    quantity,
                    line_total,
                })
            })
            .collect()
    }

    fn validate_customer(customer: NewCustomer) -> Result<CustomerInfo, OrderError> {
        let name = customer.name.trim();
        if name.is_empty() {
            return Err(OrderError::MissingField("name"));
        }

        Ok(CustomerInfo {
            name: name.to_string(),
            email: Email::parse(&customer.email)?,
            phone: PhoneNumber::parse(&customer.phone)?,
            address: Address {
                street: non_blank(customer.address),
                city: non_blank(customer.city),
                zip: non_blank(customer.zip),
            },
        })
    }

    fn validate_schedule(address: &Address, schedule: &Schedule) -> Result<(), OrderError> {
        if schedule.pickup_at.is_some() && !address.is_complete() {
            return Err(OrderError::IncompleteAddress);
        }
        if let (Some(pickup), Some(delivery)) = (schedule.pickup_at, schedule.delivery_at) {
            if delivery < pickup {
                return Err(OrderError::DeliveryBeforePickup);
            }
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ============================================================================
// Unit Tests
// ============================================================================
