use actix_web::{web, HttpResponse};

use super::dto::{
    ApiResponse, CreateOrderRequest, ListOrdersQuery, OrderResponse, UpdateOrderRequest,
};
use super::errors::ApiError;
use super::AppState;

pub async fn create_order(
    state: web::Data<AppState>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let command = body.into_inner().into_command()?;
    let outcome = state.service.create_order(command).await?;

    Ok(HttpResponse::Created().json(
        ApiResponse::ok(OrderResponse::from(&outcome.order))
            .with_message("Order created successfully")
            .with_notification(Some(outcome.notification_sent)),
    ))
}

pub async fn list_orders(
    state: web::Data<AppState>,
    query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse, ApiError> {
    let filter = query.into_inner().into_filter()?;
    let orders = state.service.list_orders(&filter).await?;

    let data: Vec<OrderResponse> = orders.iter().map(OrderResponse::from).collect();
    let total = data.len();
    Ok(HttpResponse::Ok().json(ApiResponse::ok(data).with_total(total)))
}

pub async fn get_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let order = state.service.get_order(&path).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(OrderResponse::from(&order))))
}

/// Serves both PATCH and PUT.
pub async fn update_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<UpdateOrderRequest>,
) -> Result<HttpResponse, ApiError> {
    let command = body.into_inner().into_command()?;
    let outcome = state.service.update_order(&path, command).await?;

    Ok(HttpResponse::Ok().json(
        ApiResponse::ok(OrderResponse::from(&outcome.order))
            .with_message("Order updated successfully")
            .with_notification(outcome.notification_sent),
    ))
}

pub async fn track_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let view = state.service.get_tracking_view(&path).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(view)))
}
