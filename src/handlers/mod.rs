pub mod alerts;
pub mod beckn;
pub mod bookings;
pub mod health;
pub mod mappings;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/bookings", post(bookings::create_booking))
        .route("/api/bookings/confirm", post(bookings::confirm_booking))
        .route("/api/bookings/email/:email", get(bookings::list_by_email))
        .route(
            "/api/bookings/reference/:reference",
            get(bookings::get_booking),
        )
        .route(
            "/api/bookings/:reference/status",
            patch(bookings::update_status),
        )
        .route(
            "/api/bookings/:reference/cancel",
            patch(bookings::cancel_booking),
        )
        .route("/api/bpp-mappings", post(mappings::record_mapping))
        .route("/api/bpp-mappings/stats", get(mappings::stats))
        .route(
            "/api/bpp-mappings/platform/:id",
            get(mappings::by_platform_id),
        )
        .route("/api/bpp-mappings/bpp/:id", get(mappings::by_bpp_id))
        .route(
            "/api/bpp-mappings/bpp/:id/status",
            patch(mappings::update_status),
        )
        .route(
            "/api/bpp-mappings/reference/:reference",
            get(mappings::by_reference),
        )
        .route("/api/alerts", get(alerts::recent_alerts))
        .route("/beckn/:service/:action", post(beckn::passthrough))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
