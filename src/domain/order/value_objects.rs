use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;

// ============================================================================
// Order Value Objects
// ============================================================================

/// Externally shareable order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OrderId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

/// Monetary amount in whole currency units, as the storefront catalog prices
/// items. Sums are exact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_units(units: i64) -> Self {
        Self(units)
    }

    pub fn units(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, quantity: u32) -> Option<Money> {
        self.0.checked_mul(i64::from(quantity)).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.00", self.0)
    }
}

/// Order lifecycle state.
///
/// The six forward states form a linear progress sequence; `Cancelled` is an
/// absorbing side branch with no rank in that sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Processing,
    ReadyForPickup,
    OutForDelivery,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::ReadyForPickup,
        OrderStatus::OutForDelivery,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    /// Canonical forward sequence, in timeline order.
    pub const FORWARD: [OrderStatus; 6] = [
        OrderStatus::Pending,
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::ReadyForPickup,
        OrderStatus::OutForDelivery,
        OrderStatus::Completed,
    ];

    /// Position in the forward sequence; `None` for `Cancelled`.
    pub fn rank(self) -> Option<usize> {
        match self {
            OrderStatus::Pending => Some(0),
            OrderStatus::Confirmed => Some(1),
            OrderStatus::Processing => Some(2),
            OrderStatus::ReadyForPickup => Some(3),
            OrderStatus::OutForDelivery => Some(4),
            OrderStatus::Completed => Some(5),
            OrderStatus::Cancelled => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// Column value used by the relational store.
    pub fn as_db_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::ReadyForPickup => "READY_FOR_PICKUP",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Processing => "processing",
            OrderStatus::ReadyForPickup => "ready_for_pickup",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Customer-facing step label.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "Order Placed",
            OrderStatus::Confirmed => "Order Confirmed",
            OrderStatus::Processing => "In Processing",
            OrderStatus::ReadyForPickup => "Ready for Pickup",
            OrderStatus::OutForDelivery => "Out for Delivery",
            OrderStatus::Completed => "Completed",
            OrderStatus::Cancelled => "Cancelled",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OrderStatus::Pending => "We have received your order.",
            OrderStatus::Confirmed => "Your pickup is scheduled and the order is confirmed.",
            OrderStatus::Processing => "Your garments are being cleaned.",
            OrderStatus::ReadyForPickup => "Your order is cleaned, packed and ready.",
            OrderStatus::OutForDelivery => "Your order is on its way to you.",
            OrderStatus::Completed => "Your order has been delivered.",
            OrderStatus::Cancelled => "This order has been cancelled.",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    /// Case-insensitive; accepts `ready_for_pickup`, `READY_FOR_PICKUP`, `ready-for-pickup`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_db_str() == normalized)
            .ok_or_else(|| OrderError::UnknownStatus(s.to_string()))
    }
}

static EMAIL_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
});

/// Customer email address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(OrderError::MissingField("email"));
        }
        if !EMAIL_SHAPE.is_match(trimmed) {
            return Err(OrderError::InvalidEmail(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Customer phone number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PhoneNumber(String);

impl PhoneNumber {
    const MIN_DIGITS: usize = 7;
    const MAX_DIGITS: usize = 15;

    pub fn parse(raw: &str) -> Result<Self, OrderError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(OrderError::MissingField("phone"));
        }

        let allowed = trimmed
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
        let digits = trimmed.chars().filter(char::is_ascii_digit).count();

        if !allowed || !(Self::MIN_DIGITS..=Self::MAX_DIGITS).contains(&digits) {
            return Err(OrderError::InvalidPhone(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Postal address. Every part is optional until a pickup is scheduled.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Address {
    pub street: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

impl Address {
    pub fn is_complete(&self) -> bool {
        [&self.street, &self.city, &self.zip]
            .iter()
            .all(|part| part.as_deref().is_some_and(|s| !s.trim().is_empty()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub name: String,
    pub email: Email,
    pub phone: PhoneNumber,
    pub address: Address,
}

/// One priced unit of an order. Immutable once the order exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub catalog_id: String,
    pub name: String,
    pub category: Option<String>,
    pub service_type: Option<String>,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// Requested pickup and delivery times.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schedule {
    pub pickup_at: Option<DateTime<Utc>>,
    pub delivery_at: Option<DateTime<Utc>>,
}

/// One recorded status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_ranks_are_strictly_increasing() {
        let ranks: Vec<usize> = OrderStatus::FORWARD
            .iter()
            .map(|s| s.rank().unwrap())
            .collect();
        assert_eq!(ranks, vec![0, 1, 2, 3, 4, 5]);
        assert_eq!(OrderStatus::Cancelled.rank(), None);
    }

    #[test]
    fn test_terminal_statuses() {
        let terminal: Vec<OrderStatus> = OrderStatus::ALL
            .into_iter()
            .filter(|s| s.is_terminal())
            .collect();
        assert_eq!(terminal, vec![OrderStatus::Completed, OrderStatus::Cancelled]);
    }

    #[test]
    fn test_status_parsing_is_case_insensitive() {
        assert_eq!("ready_for_pickup".parse::<OrderStatus>().unwrap(), OrderStatus::ReadyForPickup);
        assert_eq!("OUT_FOR_DELIVERY".parse::<OrderStatus>().unwrap(), OrderStatus::OutForDelivery);
        assert_eq!(" Confirmed ".parse::<OrderStatus>().unwrap(), OrderStatus::Confirmed);
        assert_eq!("ready-for-pickup".parse::<OrderStatus>().unwrap(), OrderStatus::ReadyForPickup);
        assert!(matches!(
            "shipped".parse::<OrderStatus>(),
            Err(OrderError::UnknownStatus(_))
        ));
    }

    #[test]
    fn test_status_db_representation_round_trips() {
        for status in OrderStatus::ALL {
            assert_eq!(status.as_db_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&OrderStatus::ReadyForPickup).unwrap();
        assert_eq!(json, "\"ready_for_pickup\"");
    }

    #[test]
    fn test_money_arithmetic() {
        let price = Money::from_units(5);
        assert_eq!(price.checked_mul(3), Some(Money::from_units(15)));
        assert_eq!(
            Money::from_units(15).checked_add(Money::from_units(14)),
            Some(Money::from_units(29))
        );
        assert_eq!(Money::from_units(i64::MAX).checked_mul(2), None);
    }

    #[test]
    fn test_money_display() {
        assert_eq!(Money::from_units(29).to_string(), "29.00");
        assert_eq!(Money::from_units(350).to_string(), "350.00");
    }

    #[test]
    fn test_email_validation() {
        assert!(Email::parse("jane@example.com").is_ok());
        assert_eq!(Email::parse("  jane@example.com ").unwrap().as_str(), "jane@example.com");
        assert!(matches!(Email::parse(""), Err(OrderError::MissingField("email"))));
        assert!(matches!(Email::parse("jane.example.com"), Err(OrderError::InvalidEmail(_))));
        assert!(matches!(Email::parse("jane@example"), Err(OrderError::InvalidEmail(_))));
        assert!(matches!(Email::parse("ja ne@example.com"), Err(OrderError::InvalidEmail(_))));
    }

    #[test]
    fn test_phone_validation() {
        assert!(PhoneNumber::parse("+91 98765 43210").is_ok());
        assert!(PhoneNumber::parse("(555) 123-4567").is_ok());
        assert!(matches!(PhoneNumber::parse("  "), Err(OrderError::MissingField("phone"))));
        assert!(matches!(PhoneNumber::parse("12345"), Err(OrderError::InvalidPhone(_))));
        assert!(matches!(PhoneNumber::parse("555-CALL-NOW"), Err(OrderError::InvalidPhone(_))));
    }

    #[test]
    fn test_address_completeness() {
        let mut address = Address {
            street: Some("12 Lake Rd".to_string()),
            city: Some("Kolkata".to_string()),
            zip: None,
        };
        assert!(!address.is_complete());

        address.zip = Some("   ".to_string());
        assert!(!address.is_complete());

        address.zip = Some("700001".to_string());
        assert!(address.is_complete());
    }

    #[test]
    fn test_order_id_parsing() {
        let id = OrderId::new();
        assert_eq!(id.to_string().parse::<OrderId>().unwrap(), id);
        assert!("not-an-order".parse::<OrderId>().is_err());
    }
}
