// libs/availability-cell/src/router.rs
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, patch, delete},
};

use shared_config::AppConfig;

use crate::handlers;

pub fn availability_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/doctors/{doctor_id}", post(handlers::create_window))
        .route("/doctors/{doctor_id}", get(handlers::list_windows))
        .route("/doctors/{doctor_id}/slots", get(handlers::get_slots))
        .route("/{window_id}", patch(handlers::update_window))
        .route("/{window_id}", delete(handlers::deactivate_window))
        .with_state(state)
}
