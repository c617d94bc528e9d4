//! Balance and withdrawal handlers.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use loyalty_core::{is_valid_order_number, Balance, StoreError, Withdrawal};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::handlers::{api_error, store_failure, ApiError};
use super::middleware::AuthUser;
use crate::state::AppState;

/// Request body for spending points.
#[derive(Debug, Deserialize)]
pub struct WithdrawBody {
    /// Order the points are spent on.
    pub order: String,
    pub sum: f64,
}

/// A withdrawal as listed to its owner.
#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    pub order: String,
    pub sum: f64,
    pub processed_at: String,
}

impl From<Withdrawal> for WithdrawalResponse {
    fn from(withdrawal: Withdrawal) -> Self {
        Self {
            order: withdrawal.order,
            sum: withdrawal.sum,
            processed_at: withdrawal.processed_at.to_rfc3339(),
        }
    }
}

/// Current and withdrawn points of the caller.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    AuthUser(owner_id): AuthUser,
) -> Result<Json<Balance>, ApiError> {
    let balance = state.store().get_balance(&owner_id).map_err(store_failure)?;
    Ok(Json(balance))
}

/// Spend points against an order number.
pub async fn withdraw(
    State(state): State<Arc<AppState>>,
    AuthUser(owner_id): AuthUser,
    Json(body): Json<WithdrawBody>,
) -> Result<Json<Balance>, ApiError> {
    if !is_valid_order_number(&body.order) {
        return Err(api_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            format!("Invalid order number: {}", body.order),
        ));
    }

    if !body.sum.is_finite() || body.sum <= 0.0 {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Withdrawal sum must be positive",
        ));
    }

    match state.store().withdraw(&owner_id, &body.order, body.sum) {
        Ok(balance) => {
            info!(owner = %owner_id, order = %body.order, sum = body.sum, "Points withdrawn");
            Ok(Json(balance))
        }
        Err(e @ StoreError::InsufficientFunds { .. }) => {
            Err(api_error(StatusCode::PAYMENT_REQUIRED, e.to_string()))
        }
        Err(e) => Err(store_failure(e)),
    }
}

/// Withdrawals of the caller, newest first.
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    AuthUser(owner_id): AuthUser,
) -> Result<Response, ApiError> {
    let withdrawals = state
        .store()
        .list_withdrawals(&owner_id)
        .map_err(store_failure)?;

    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let withdrawals: Vec<WithdrawalResponse> = withdrawals
        .into_iter()
        .map(WithdrawalResponse::from)
        .collect();
    Ok(Json(withdrawals).into_response())
}
