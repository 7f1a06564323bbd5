use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use validator::Validate;

use crate::auth::AuthUser;
use crate::services::tickets::{self, PurchaseTicketsRequest, ValidateDiscountRequest};
use crate::utils::error::AppError;
use crate::utils::response::{created, success};
use crate::AppState;

pub async fn purchase_tickets(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<PurchaseTicketsRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    let ticket_ids = tickets::purchase_tickets(&state.pool, &user.id, &req).await?;

    Ok(
        created(json!({ "ticketIds": ticket_ids }), "Tickets purchased successfully")
            .into_response(),
    )
}

pub async fn validate_discount(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(req): Json<ValidateDiscountRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    let preview = tickets::validate_discount(&state.pool, &req).await?;

    Ok(success(preview, "Discount code is valid").into_response())
}

pub async fn my_tickets(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let tickets = tickets::list_user_tickets(&state.pool, &user.id).await?;

    Ok(success(tickets, "Tickets retrieved successfully").into_response())
}
