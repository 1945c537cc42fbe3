use chrono::{DateTime, Utc};

use super::value_objects::OrderStatus;

// ============================================================================
// Order Commands - Represent user intent
// ============================================================================

/// Customer contact details as submitted, before validation.
#[derive(Debug, Clone, Default)]
pub struct NewCustomer {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

/// One cart entry as submitted. Prices are whole currency units.
#[derive(Debug, Clone, Default)]
pub struct NewLineItem {
    pub catalog_id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub service_type: Option<String>,
    pub unit_price: i64,
    pub quantity: i64,
}

#[derive(Debug, Clone, Default)]
pub struct CreateOrder {
    pub customer: NewCustomer,
    pub items: Vec<NewLineItem>,
    pub pickup_at: Option<DateTime<Utc>>,
    pub delivery_at: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
}

/// Operator update: any combination of a new status and new schedule times.
#[derive(Debug, Clone, Default)]
pub struct UpdateOrder {
    pub status: Option<OrderStatus>,
    pub pickup_at: Option<DateTime<Utc>>,
    pub delivery_at: Option<DateTime<Utc>>,
}

impl UpdateOrder {
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && !self.reschedules()
    }

    pub fn reschedules(&self) -> bool {
        self.pickup_at.is_some() || self.delivery_at.is_some()
    }
}
