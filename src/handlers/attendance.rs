use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use validator::Validate;

use crate::auth::AuthUser;
use crate::services::attendance::{
    self, CheckInRequest, GenerateAccessCodeRequest, VerifyAccessCodeRequest,
};
use crate::utils::error::AppError;
use crate::utils::response::{created, success};
use crate::AppState;

pub async fn check_in(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<CheckInRequest>,
) -> Result<Response, AppError> {
    user.require_gate_operator()?;
    req.validate()?;

    let record = attendance::check_in_attendee(&state.pool, &user.id, &req).await?;

    Ok(success(record, "Attendee checked in successfully").into_response())
}

pub async fn event_attendance(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    user.require_gate_operator()?;

    let report = attendance::event_attendance(&state.pool, &event_id).await?;

    Ok(success(report, "Attendance retrieved successfully").into_response())
}

/// Attendees mint their own short-lived entry codes, so no role gate here.
pub async fn generate_access_code(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<GenerateAccessCodeRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    let issued = attendance::generate_access_code(&state.pool, &user.id, &req).await?;

    Ok(created(issued, "Access code generated successfully").into_response())
}

pub async fn verify_access_code(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<VerifyAccessCodeRequest>,
) -> Result<Response, AppError> {
    user.require_gate_operator()?;
    req.validate()?;

    let verified = attendance::verify_access_code(&state.pool, &req).await?;

    Ok(success(verified, "Access code verified successfully").into_response())
}
