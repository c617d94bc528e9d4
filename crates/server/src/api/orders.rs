//! Order intake and listing handlers.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use loyalty_core::{is_valid_order_number, Order, OrderStatus, OrderToAccrual, StoreError};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::handlers::{api_error, store_failure, ApiError};
use super::middleware::AuthUser;
use crate::metrics::ORDERS_UPLOADED_TOTAL;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

/// An uploaded order as listed to its owner.
#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub number: String,
    pub status: OrderStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    pub uploaded_at: String,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            number: order.number,
            status: order.status,
            accrual: order.accrual,
            uploaded_at: order.uploaded_at.to_rfc3339(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Upload an order number (`text/plain` body) for reconciliation.
pub async fn upload_order(
    State(state): State<Arc<AppState>>,
    AuthUser(owner_id): AuthUser,
    headers: HeaderMap,
    body: String,
) -> Result<StatusCode, ApiError> {
    if !is_plain_text(&headers) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Content-Type must be text/plain",
        ));
    }

    let number = body.trim();
    if !is_valid_order_number(number) {
        ORDERS_UPLOADED_TOTAL
            .with_label_values(&["invalid_number"])
            .inc();
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Invalid order number: {}", number),
        ));
    }

    if let Some(existing) = state.store().get_order_by_number(number).map_err(store_failure)? {
        return existing_order_status(&existing, &owner_id);
    }

    let order = Order::new(&owner_id, number);
    match state.store().put_order(&order) {
        Ok(()) => {}
        Err(StoreError::Duplicate(_)) => {
            // Lost a race with a concurrent upload of the same number.
            let existing = state
                .store()
                .get_order_by_number(number)
                .map_err(store_failure)?
                .ok_or_else(|| {
                    api_error(
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Order {} vanished after duplicate insert", number),
                    )
                })?;
            return existing_order_status(&existing, &owner_id);
        }
        Err(e) => return Err(store_failure(e)),
    }

    info!(order = %number, owner = %owner_id, "Order uploaded");
    ORDERS_UPLOADED_TOTAL.with_label_values(&["accepted"]).inc();

    // Waits for room in the queue. A stopped engine leaves the order NEW for
    // the recovery scanner of the next run.
    if let Err(e) = state.engine().submit(OrderToAccrual::from(&order)).await {
        warn!(order = %number, "Order not queued for accrual: {}", e);
    }

    Ok(StatusCode::ACCEPTED)
}

/// List the caller's orders, newest first.
pub async fn list_orders(
    State(state): State<Arc<AppState>>,
    AuthUser(owner_id): AuthUser,
) -> Result<Response, ApiError> {
    let orders = state.store().list_orders(&owner_id).map_err(store_failure)?;

    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let orders: Vec<OrderResponse> = orders.into_iter().map(OrderResponse::from).collect();
    Ok(Json(orders).into_response())
}

/// Media types are case-insensitive; parameters such as `charset` are ignored.
fn is_plain_text(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|media_type| media_type.trim().eq_ignore_ascii_case("text/plain"))
        .unwrap_or(false)
}

fn existing_order_status(existing: &Order, owner_id: &str) -> Result<StatusCode, ApiError> {
    if existing.owner_id == owner_id {
        ORDERS_UPLOADED_TOTAL
            .with_label_values(&["already_uploaded"])
            .inc();
        Ok(StatusCode::OK)
    } else {
        ORDERS_UPLOADED_TOTAL.with_label_values(&["conflict"]).inc();
        Err(api_error(
            StatusCode::CONFLICT,
            format!("Order {} was uploaded by another user", existing.number),
        ))
    }
}
