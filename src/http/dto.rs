use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ApiError;
use crate::domain::order::{
    CreateOrder, LineItem, Money, NewCustomer, NewLineItem, Order, OrderId, OrderStatus,
    StatusChange, UpdateOrder,
};
use crate::persistence::OrderFilter;

// ============================================================================
// Request Bodies
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfoRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

/// One cart entry. `price` is in whole currency units.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemRequest {
    #[serde(default)]
    pub id: String,
    pub name: Option<String>,
    pub category: Option<String>,
    pub service_type: Option<String>,
    pub price: i64,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default)]
    pub items: Vec<OrderItemRequest>,
    pub customer_info: CustomerInfoRequest,
    pub pickup_date: Option<String>,
    pub delivery_date: Option<String>,
    pub special_instructions: Option<String>,
}

impl CreateOrderRequest {
    pub fn into_command(self) -> Result<CreateOrder, ApiError> {
        let customer = self.customer_info;
        Ok(CreateOrder {
            customer: NewCustomer {
                name: customer.name,
                email: customer.email,
                phone: customer.phone,
                address: customer.address,
                city: customer.city,
                zip: customer.zip,
            },
            items: self
                .items
                .into_iter()
                .map(|item| NewLineItem {
                    catalog_id: item.id,
                    name: item.name,
                    category: item.category,
                    service_type: item.service_type,
                    unit_price: item.price,
                    quantity: item.quantity,
                })
                .collect(),
            pickup_at: parse_optional_date("pickupDate", self.pickup_date)?,
            delivery_at: parse_optional_date("deliveryDate", self.delivery_date)?,
            special_instructions: self.special_instructions,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub pickup_date: Option<String>,
    pub delivery_date: Option<String>,
}

impl UpdateOrderRequest {
    pub fn into_command(self) -> Result<UpdateOrder, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<OrderStatus>().map_err(ApiError::from_order_error)?),
        };

        Ok(UpdateOrder {
            status,
            pickup_at: parse_optional_date("pickupDate", self.pickup_date)?,
            delivery_at: parse_optional_date("deliveryDate", self.delivery_date)?,
        })
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
    pub status: Option<String>,
    pub customer_email: Option<String>,
    pub limit: Option<usize>,
}

impl ListOrdersQuery {
    pub fn into_filter(self) -> Result<OrderFilter, ApiError> {
        let status = match self.status.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(raw.parse::<OrderStatus>().map_err(ApiError::from_order_error)?),
        };

        Ok(OrderFilter {
            status,
            customer_email: self.customer_email.filter(|e| !e.trim().is_empty()),
            limit: self.limit,
        })
    }
}

/// Accepts RFC 3339 timestamps or plain `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_date(field: &str, raw: &str) -> Result<DateTime<Utc>, ApiError> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|at| at.and_utc())
        .ok_or_else(|| {
            ApiError::BadRequest(format!(
                "{field} must be an RFC 3339 timestamp or a YYYY-MM-DD date"
            ))
        })
}

fn parse_optional_date(
    field: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, ApiError> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_date(field, raw).map(Some),
    }
}

// ============================================================================
// Response Bodies
// ============================================================================

/// Success envelope shared by every order endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notification_sent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<usize>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            message: None,
            notification_sent: None,
            total: None,
        }
    }

    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    pub fn with_notification(mut self, sent: Option<bool>) -> Self {
        self.notification_sent = sent;
        self
    }

    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfoResponse {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub address: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemResponse {
    pub id: String,
    pub name: String,
    pub category: Option<String>,
    pub service_type: Option<String>,
    pub price: Money,
    pub quantity: u32,
    pub total_price: Money,
}

impl From<&LineItem> for OrderItemResponse {
    fn from(item: &LineItem) -> Self {
        Self {
            id: item.catalog_id.clone(),
            name: item.name.clone(),
            category: item.category.clone(),
            service_type: item.service_type.clone(),
            price: item.unit_price,
            quantity: item.quantity,
            total_price: item.line_total,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChangeResponse {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub changed_at: DateTime<Utc>,
}

impl From<&StatusChange> for StatusChangeResponse {
    fn from(change: &StatusChange) -> Self {
        Self {
            from: change.from,
            to: change.to,
            changed_at: change.changed_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_amount: Money,
    pub customer_info: CustomerInfoResponse,
    pub items: Vec<OrderItemResponse>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub special_instructions: Option<String>,
    pub status_history: Vec<StatusChangeResponse>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        let customer = &order.customer;
        Self {
            id: order.id,
            status: order.status,
            total_amount: order.total_amount,
            customer_info: CustomerInfoResponse {
                name: customer.name.clone(),
                email: customer.email.as_str().to_string(),
                phone: customer.phone.as_str().to_string(),
                address: customer.address.street.clone(),
                city: customer.address.city.clone(),
                zip: customer.address.zip.clone(),
            },
            items: order.items.iter().map(OrderItemResponse::from).collect(),
            pickup_date: order.schedule.pickup_at,
            delivery_date: order.schedule.delivery_at,
            special_instructions: order.special_instructions.clone(),
            status_history: order.history.iter().map(StatusChangeResponse::from).collect(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}
