use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, with_security_headers};
use crate::handlers::{self, attendance, events, payments, tickets};
use crate::AppState;

pub fn create_routes(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/events", post(events::create_event).get(events::list_events))
        .route(
            "/events/:event_id",
            get(events::get_event).patch(events::update_event),
        )
        .route("/events/:event_id/deactivate", post(events::deactivate_event))
        .route("/events/:event_id/ticket-types", post(events::create_ticket_type))
        .route("/events/:event_id/attendance", get(attendance::event_attendance))
        .route("/discount-codes", post(events::create_discount_code))
        .route("/tickets/purchase", post(tickets::purchase_tickets))
        .route("/tickets/validate-discount", post(tickets::validate_discount))
        .route("/tickets/mine", get(tickets::my_tickets))
        .route("/attendance/check-in", post(attendance::check_in))
        .route("/access-codes", post(attendance::generate_access_code))
        .route("/access-codes/verify", post(attendance::verify_access_code))
        .route("/payments", post(payments::record_payment))
        .route("/payments/:transaction_id/refunds", post(payments::process_refund))
        .route("/payments/mine", get(payments::my_transactions))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer()),
        )
        .with_state(state);

    with_security_headers(router)
}
