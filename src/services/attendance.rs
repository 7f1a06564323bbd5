//! Check-in and temporary access codes.
//!
//! Double check-in is impossible by construction: the attendance insert
//! and the guarded ticket-status flip live in one transaction, and the
//! UNIQUE (ticket_id, event_id) index arbitrates concurrent scans.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::attendance::{Attendance, CheckInMethod, TemporaryAccessCode, VerificationStatus};
use crate::models::ticket::{Ticket, TicketStatus};
use crate::utils::error::{is_unique_violation, AppError, RuleViolation};
use crate::utils::ids;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CheckInRequest {
    #[validate(length(min = 1, message = "Ticket ID is required"))]
    pub ticket_id: String,
    #[validate(length(min = 1, message = "Event ID is required"))]
    pub event_id: String,
    #[validate(length(min = 1, message = "QR code is required"))]
    pub qr_code: String,
    #[serde(default)]
    pub check_in_method: CheckInMethod,
    pub check_in_location: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GenerateAccessCodeRequest {
    #[validate(length(min = 1, message = "Event ID is required"))]
    pub event_id: String,
    pub ticket_id: Option<String>,
    #[serde(default = "default_expiration_minutes")]
    #[validate(range(min = 5, max = 60))]
    pub expiration_minutes: i64,
}

fn default_expiration_minutes() -> i64 {
    15
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAccessCodeRequest {
    #[validate(length(min = 1, message = "Event ID is required"))]
    pub event_id: String,
    #[validate(length(min = 1, message = "QR code is required"))]
    pub qr_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedAccessCode {
    pub access_code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedAccessCode {
    pub user_id: String,
    pub ticket_id: Option<String>,
    pub ticket_details: Option<Ticket>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventAttendance {
    pub attendance_count: usize,
    pub attendance_records: Vec<Attendance>,
}

/// Records an attendee at the gate. The ticket must match the event and
/// QR payload and still be active; afterwards it is `used`.
pub async fn check_in_attendee(
    pool: &PgPool,
    staff_id: &str,
    req: &CheckInRequest,
) -> Result<Attendance, AppError> {
    let ticket = sqlx::query_as::<_, Ticket>(
        "SELECT * FROM tickets WHERE id = $1 AND event_id = $2 AND qr_code = $3",
    )
    .bind(&req.ticket_id)
    .bind(&req.event_id)
    .bind(&req.qr_code)
    .fetch_optional(pool)
    .await?
    .ok_or(RuleViolation::InvalidOrUsedTicket)?;

    match ticket.status {
        TicketStatus::Active => {}
        // Matching credentials on a used ticket means this exact
        // check-in already happened.
        TicketStatus::Used => return Err(RuleViolation::AlreadyCheckedIn.into()),
        TicketStatus::Cancelled | TicketStatus::Refunded => {
            return Err(RuleViolation::InvalidOrUsedTicket.into())
        }
    }

    let now = Utc::now();
    let attendance_id = Uuid::new_v4().to_string();

    let mut tx = pool.begin().await?;

    let inserted = sqlx::query(
        "INSERT INTO attendance
             (id, event_id, user_id, ticket_id, checked_in_at, checked_in_by,
              check_in_method, check_in_location, verification_status, notes)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 'success', $9)",
    )
    .bind(&attendance_id)
    .bind(&req.event_id)
    .bind(&ticket.user_id)
    .bind(&ticket.id)
    .bind(now)
    .bind(staff_id)
    .bind(req.check_in_method)
    .bind(req.check_in_location.as_deref())
    .bind(req.notes.as_deref())
    .execute(&mut *tx)
    .await;

    match inserted {
        Ok(_) => {}
        Err(err) if is_unique_violation(&err) => {
            return Err(RuleViolation::AlreadyCheckedIn.into());
        }
        Err(err) => return Err(err.into()),
    }

    let log_notes = format!(
        "Initial check-in: {}",
        req.notes.as_deref().unwrap_or("No notes")
    );
    sqlx::query(
        "INSERT INTO attendance_log_entries
             (id, attendance_id, action, logged_at, processed_by, notes)
         VALUES ($1, $2, 'check_in', $3, $4, $5)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&attendance_id)
    .bind(now)
    .bind(staff_id)
    .bind(&log_notes)
    .execute(&mut *tx)
    .await?;

    // Guard against a path that consumed the ticket between our read and
    // this write; zero rows means the ticket is no longer active.
    let updated = sqlx::query(
        "UPDATE tickets
         SET status = 'used', check_in_date = $2, checked_in_by = $3
         WHERE id = $1 AND status = 'active'",
    )
    .bind(&ticket.id)
    .bind(now)
    .bind(staff_id)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(RuleViolation::AlreadyCheckedIn.into());
    }

    tx.commit().await?;

    info!(ticket_id = %ticket.id, event_id = %req.event_id, "Attendee checked in");

    Ok(Attendance {
        id: attendance_id,
        event_id: req.event_id.clone(),
        user_id: ticket.user_id,
        ticket_id: ticket.id,
        checked_in_at: now,
        checked_in_by: staff_id.to_string(),
        check_in_method: req.check_in_method,
        check_in_location: req.check_in_location.clone(),
        verification_status: VerificationStatus::Success,
        notes: req.notes.clone(),
    })
}

/// Issues a short-lived gate code for the caller, superseding any code
/// they already hold for the event. Delete and insert share one
/// transaction so at most one live code per (user, event) ever commits.
pub async fn generate_access_code(
    pool: &PgPool,
    user_id: &str,
    req: &GenerateAccessCodeRequest,
) -> Result<IssuedAccessCode, AppError> {
    if let Some(ticket_id) = &req.ticket_id {
        let owned = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM tickets WHERE id = $1 AND user_id = $2 AND status = 'active'",
        )
        .bind(ticket_id)
        .bind(user_id)
        .fetch_one(pool)
        .await?;

        if owned == 0 {
            return Err(RuleViolation::InvalidTicket.into());
        }
    }

    let expires_at = Utc::now() + Duration::minutes(req.expiration_minutes);

    // A concurrent generation for the same pair can commit its insert
    // between our delete and insert; that surfaces as a unique violation
    // and the supersede is retried against the winner's row.
    for _ in 0..2 {
        let qr_code = ids::access_code(user_id);

        let mut tx = pool.begin().await?;

        sqlx::query("DELETE FROM temporary_access_codes WHERE user_id = $1 AND event_id = $2")
            .bind(user_id)
            .bind(&req.event_id)
            .execute(&mut *tx)
            .await?;

        let inserted = sqlx::query(
            "INSERT INTO temporary_access_codes
                 (id, user_id, event_id, ticket_id, qr_code, created_at, expires_at, is_used)
             VALUES ($1, $2, $3, $4, $5, NOW(), $6, FALSE)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(&req.event_id)
        .bind(req.ticket_id.as_deref())
        .bind(&qr_code)
        .bind(expires_at)
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {
                tx.commit().await?;
                return Ok(IssuedAccessCode {
                    access_code: qr_code,
                    expires_at,
                });
            }
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::InternalServerError(
        "Could not allocate an access code".to_string(),
    ))
}

/// Redeems a gate code. Exactly one verification succeeds per code: the
/// claim is a guarded flip of `is_used`. Expired codes are rejected but
/// left unclaimed.
pub async fn verify_access_code(
    pool: &PgPool,
    req: &VerifyAccessCodeRequest,
) -> Result<VerifiedAccessCode, AppError> {
    let code = sqlx::query_as::<_, TemporaryAccessCode>(
        "SELECT * FROM temporary_access_codes
         WHERE event_id = $1 AND qr_code = $2 AND is_used = FALSE",
    )
    .bind(&req.event_id)
    .bind(&req.qr_code)
    .fetch_optional(pool)
    .await?
    .ok_or(RuleViolation::InvalidAccessCode)?;

    if code.expires_at < Utc::now() {
        return Err(RuleViolation::AccessCodeExpired.into());
    }

    let claimed = sqlx::query(
        "UPDATE temporary_access_codes SET is_used = TRUE WHERE id = $1 AND is_used = FALSE",
    )
    .bind(&code.id)
    .execute(pool)
    .await?;

    if claimed.rows_affected() == 0 {
        return Err(RuleViolation::InvalidAccessCode.into());
    }

    let ticket_details = match &code.ticket_id {
        Some(ticket_id) => {
            sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
                .bind(ticket_id)
                .fetch_optional(pool)
                .await?
        }
        None => None,
    };

    Ok(VerifiedAccessCode {
        user_id: code.user_id,
        ticket_id: code.ticket_id,
        ticket_details,
    })
}

/// Attendance roster for an event, newest check-in first.
pub async fn event_attendance(pool: &PgPool, event_id: &str) -> Result<EventAttendance, AppError> {
    let records = sqlx::query_as::<_, Attendance>(
        "SELECT * FROM attendance WHERE event_id = $1 ORDER BY checked_in_at DESC",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    Ok(EventAttendance {
        attendance_count: records.len(),
        attendance_records: records,
    })
}
