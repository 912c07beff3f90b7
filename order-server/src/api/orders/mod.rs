//! Order API Module
//!
//! All mutations go through [`OrdersManager`](crate::orders::OrdersManager).
//! Only `confirmed` and `cancelled` can be requested from outside; `created`
//! and `delivered` are reserved to creation and the delivery worker.

mod handler;

use axum::{
    Router,
    routing::{get, post, put},
};

use crate::core::ServerState;

/// Order router
pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", routes())
}

fn routes() -> Router<ServerState> {
    Router::new()
        .route("/", post(handler::create))
        .route("/{id}", get(handler::get_order))
        .route("/{id}/state", get(handler::check_state))
        .route("/confirm/{id}", put(handler::confirm))
        .route("/cancel/{id}", put(handler::cancel))
}
