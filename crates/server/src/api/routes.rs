use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::middleware::{auth_middleware, metrics_middleware};
use super::{balance, handlers, orders};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Per-user routes, identity resolved by the configured authenticator
    let user_routes = Router::new()
        .route("/orders", post(orders::upload_order).get(orders::list_orders))
        .route("/balance", get(balance::get_balance))
        .route("/balance/withdraw", post(balance::withdraw))
        .route("/withdrawals", get(balance::list_withdrawals))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Operational routes
    let api_routes = Router::new()
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        .route("/accrual/status", get(handlers::accrual_status))
        .nest("/user", user_routes);

    Router::new()
        .nest("/api", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
