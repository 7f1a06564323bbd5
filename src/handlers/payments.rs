use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use validator::Validate;

use crate::auth::AuthUser;
use crate::services::payments::{self, ProcessRefundRequest, RecordPaymentRequest};
use crate::utils::error::AppError;
use crate::utils::response::{created, success};
use crate::AppState;

pub async fn record_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Json(req): Json<RecordPaymentRequest>,
) -> Result<Response, AppError> {
    req.validate()?;

    let transaction_id = payments::record_payment(&state.pool, &user.id, &req).await?;

    Ok(
        created(json!({ "transactionId": transaction_id }), "Payment processed successfully")
            .into_response(),
    )
}

pub async fn process_refund(
    State(state): State<AppState>,
    user: AuthUser,
    Path(transaction_id): Path<String>,
    Json(req): Json<ProcessRefundRequest>,
) -> Result<Response, AppError> {
    user.require_event_manager()?;
    req.validate()?;

    let refund = payments::process_refund(&state.pool, &user.id, &transaction_id, &req).await?;

    Ok(created(refund, "Refund processed successfully").into_response())
}

pub async fn my_transactions(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Response, AppError> {
    let transactions = payments::list_user_transactions(&state.pool, &user.id).await?;

    Ok(success(transactions, "Transactions retrieved successfully").into_response())
}
