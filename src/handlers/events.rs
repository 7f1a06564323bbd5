use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use validator::Validate;

use crate::auth::AuthUser;
use crate::services::events::{
    self, CreateDiscountCodeRequest, CreateEventRequest, CreateTicketTypeRequest, ListEventsQuery,
    UpdateEventRequest,
};
use crate::utils::error::AppError;
use crate::utils::response::{created, empty_success, success};
use crate::AppState;

pub async fn create_event(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateEventRequest>,
) -> Result<Response, AppError> {
    user.require_event_manager()?;
    req.validate()?;

    let event = events::create_event(&state.pool, &req).await?;

    Ok(created(event, "Event created successfully").into_response())
}

/// Public catalog listing. `includeInactive` only takes effect for
/// authenticated event managers.
pub async fn list_events(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Response, AppError> {
    let include_inactive =
        query.include_inactive && user.as_ref().is_some_and(|u| u.role.can_manage_events());

    let events = events::list_events(&state.pool, query.upcoming, include_inactive).await?;

    Ok(success(events, "Events retrieved successfully").into_response())
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let details = events::get_event(&state.pool, &event_id).await?;

    Ok(success(details, "Event retrieved successfully").into_response())
}

pub async fn update_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<String>,
    Json(req): Json<UpdateEventRequest>,
) -> Result<Response, AppError> {
    user.require_event_manager()?;
    req.validate()?;

    let event = events::update_event(&state.pool, &event_id, &req).await?;

    Ok(success(event, "Event updated successfully").into_response())
}

pub async fn deactivate_event(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    user.require_event_manager()?;

    events::deactivate_event(&state.pool, &event_id).await?;

    Ok(empty_success("Event deactivated successfully").into_response())
}

pub async fn create_ticket_type(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<String>,
    Json(req): Json<CreateTicketTypeRequest>,
) -> Result<Response, AppError> {
    user.require_event_manager()?;
    req.validate()?;

    let ticket_type = events::create_ticket_type(&state.pool, &event_id, &req).await?;

    Ok(created(ticket_type, "Ticket type created successfully").into_response())
}

pub async fn create_discount_code(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CreateDiscountCodeRequest>,
) -> Result<Response, AppError> {
    user.require_event_manager()?;
    req.validate()?;

    let discount = events::create_discount_code(&state.pool, &req).await?;

    Ok(created(discount, "Discount code created successfully").into_response())
}
