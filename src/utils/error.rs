use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};
use validator::ValidationErrors;

use crate::utils::response::error as error_response;

/// Reasons a discount code can be refused. The public messages are part
/// of the API surface and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountIssue {
    NotFoundOrExpired,
    WrongTicketType,
    WrongEvent,
    UsageLimitReached,
}

impl fmt::Display for DiscountIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            DiscountIssue::NotFoundOrExpired => "Invalid or expired discount code",
            DiscountIssue::WrongTicketType => "Discount code not applicable to this ticket type",
            DiscountIssue::WrongEvent => "Discount code not applicable to this event",
            DiscountIssue::UsageLimitReached => "Discount code usage limit reached",
        };
        f.write_str(msg)
    }
}

/// Expected business-rule rejections. These are outcomes, not faults:
/// they surface as structured API errors and are logged at warn, never
/// as server errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleViolation {
    #[error("Not enough tickets available")]
    InsufficientInventory,

    #[error("You can only purchase up to {limit} tickets of this type")]
    PerUserLimitExceeded { limit: i32 },

    #[error("{0}")]
    InvalidDiscount(DiscountIssue),

    #[error("Invalid or used ticket")]
    InvalidOrUsedTicket,

    #[error("Attendee already checked in")]
    AlreadyCheckedIn,

    #[error("Invalid ticket")]
    InvalidTicket,

    #[error("Invalid access code")]
    InvalidAccessCode,

    #[error("Access code has expired")]
    AccessCodeExpired,

    #[error("Refund amount cannot be greater than transaction amount")]
    RefundExceedsOriginal,
}

impl RuleViolation {
    pub fn status_code(&self) -> StatusCode {
        match self {
            // A second check-in races an identical first one, so conflict.
            RuleViolation::AlreadyCheckedIn => StatusCode::CONFLICT,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            RuleViolation::InsufficientInventory => "INSUFFICIENT_INVENTORY",
            RuleViolation::PerUserLimitExceeded { .. } => "PER_USER_LIMIT",
            RuleViolation::InvalidDiscount(_) => "INVALID_DISCOUNT",
            RuleViolation::InvalidOrUsedTicket => "INVALID_OR_USED_TICKET",
            RuleViolation::AlreadyCheckedIn => "ALREADY_CHECKED_IN",
            RuleViolation::InvalidTicket => "INVALID_TICKET",
            RuleViolation::InvalidAccessCode => "INVALID_ACCESS_CODE",
            RuleViolation::AccessCodeExpired => "ACCESS_CODE_EXPIRED",
            RuleViolation::RefundExceedsOriginal => "REFUND_EXCEEDS_ORIGINAL",
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {message}")]
    ValidationError {
        message: String,
        details: Option<Value>,
    },

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Rule(#[from] RuleViolation),

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal server error")]
    InternalServerError(String),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        AppError::ValidationError {
            message: message.into(),
            details: None,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError { .. } => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Rule(rule) => rule.status_code(),
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError { .. } => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Rule(rule) => rule.code(),
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::InternalServerError(_) => "INTERNAL_SERVER_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::Rule(rule) => {
                warn!(code = rule.code(), message = %rule, "Business rule rejected");
            }
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            AppError::InternalServerError(msg) => {
                error!(message = %msg, "Internal server error");
            }
            other => {
                warn!(code = other.code(), error = ?other, "Request rejected");
            }
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::ValidationError {
            message: "Validation failed".to_string(),
            details: serde_json::to_value(&errors).ok(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level messages to the client; database detail
        // stays in the log.
        let (public_message, details) = match self {
            AppError::ValidationError { message, details } => (message, details),
            AppError::AuthError(msg)
            | AppError::Forbidden(msg)
            | AppError::NotFound(msg)
            | AppError::InternalServerError(msg) => (msg, None),
            AppError::Rule(rule) => (rule.to_string(), None),
            AppError::DatabaseError(_) => ("A database error occurred".to_string(), None),
        };

        error_response(code, public_message, details, status)
    }
}

/// True when the error is a Postgres unique-constraint violation (23505).
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_check_in_maps_to_conflict() {
        let err = AppError::from(RuleViolation::AlreadyCheckedIn);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(err.code(), "ALREADY_CHECKED_IN");
    }

    #[test]
    fn rule_rejections_are_unprocessable() {
        for rule in [
            RuleViolation::InsufficientInventory,
            RuleViolation::PerUserLimitExceeded { limit: 4 },
            RuleViolation::InvalidDiscount(DiscountIssue::WrongEvent),
            RuleViolation::InvalidOrUsedTicket,
            RuleViolation::InvalidTicket,
            RuleViolation::InvalidAccessCode,
            RuleViolation::AccessCodeExpired,
            RuleViolation::RefundExceedsOriginal,
        ] {
            assert_eq!(rule.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        }
    }

    #[test]
    fn rule_messages_match_public_contract() {
        assert_eq!(
            RuleViolation::InsufficientInventory.to_string(),
            "Not enough tickets available"
        );
        assert_eq!(
            RuleViolation::PerUserLimitExceeded { limit: 2 }.to_string(),
            "You can only purchase up to 2 tickets of this type"
        );
        assert_eq!(
            RuleViolation::InvalidDiscount(DiscountIssue::NotFoundOrExpired).to_string(),
            "Invalid or expired discount code"
        );
        assert_eq!(
            RuleViolation::AlreadyCheckedIn.to_string(),
            "Attendee already checked in"
        );
        assert_eq!(
            RuleViolation::AccessCodeExpired.to_string(),
            "Access code has expired"
        );
        assert_eq!(
            RuleViolation::RefundExceedsOriginal.to_string(),
            "Refund amount cannot be greater than transaction amount"
        );
    }

    #[test]
    fn discount_issue_messages_match_public_contract() {
        assert_eq!(
            DiscountIssue::WrongTicketType.to_string(),
            "Discount code not applicable to this ticket type"
        );
        assert_eq!(
            DiscountIssue::WrongEvent.to_string(),
            "Discount code not applicable to this event"
        );
        assert_eq!(
            DiscountIssue::UsageLimitReached.to_string(),
            "Discount code usage limit reached"
        );
    }
}
