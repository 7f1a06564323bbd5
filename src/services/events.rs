//! Event catalog administration: events, their ticket types and
//! discount codes. Deactivation is a soft delete so issued tickets keep
//! a valid parent event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::event::Event;
use crate::models::ticket::{DiscountCode, DiscountType, TicketType};
use crate::utils::error::{is_unique_violation, AppError};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(length(min = 1, message = "Description is required"))]
    pub description: String,
    #[validate(length(min = 1, message = "Host is required"))]
    pub hosted_by: String,
    #[validate(length(min = 1, message = "Location is required"))]
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    #[serde(default)]
    #[validate(range(min = 0, message = "Entry fee cannot be negative"))]
    pub entry_fee: i64,
}

/// Partial update body: absent fields keep their stored values.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, message = "Name cannot be empty"))]
    pub name: Option<String>,
    #[validate(length(min = 1, message = "Description cannot be empty"))]
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Host cannot be empty"))]
    pub hosted_by: Option<String>,
    #[validate(length(min = 1, message = "Location cannot be empty"))]
    pub location: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[validate(range(min = 0, message = "Entry fee cannot be negative"))]
    pub entry_fee: Option<i64>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketTypeRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    pub price: i64,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub available_quantity: Option<i32>,
    /// Absent means the default cap of one per order; an explicit null
    /// lifts the cap entirely.
    #[serde(default = "default_max_per_user")]
    #[validate(range(min = 1, message = "Per-user limit must be positive"))]
    pub max_per_user: Option<i32>,
}

fn default_max_per_user() -> Option<i32> {
    Some(1)
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateDiscountCodeRequest {
    #[validate(length(min = 1, message = "Code is required"))]
    pub code: String,
    pub description: Option<String>,
    pub event_id: Option<String>,
    pub ticket_type_id: Option<String>,
    pub discount_type: DiscountType,
    #[validate(range(min = 1, message = "Discount value must be positive"))]
    pub discount_value: i64,
    #[validate(range(min = 1, message = "Usage limit must be positive"))]
    pub max_uses: Option<i32>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ListEventsQuery {
    #[serde(default)]
    pub upcoming: bool,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDetails {
    #[serde(flatten)]
    pub event: Event,
    pub ticket_types: Vec<TicketType>,
}

/// Shared sanity checks for a discount definition, independent of the
/// rows it references.
fn check_discount_definition(req: &CreateDiscountCodeRequest) -> Result<(), AppError> {
    if req.discount_type == DiscountType::Percentage && req.discount_value > 100 {
        return Err(AppError::validation("Percentage discount cannot exceed 100"));
    }
    if let (Some(start), Some(end)) = (req.start_date, req.end_date) {
        if start >= end {
            return Err(AppError::validation("End date must be after start date"));
        }
    }
    Ok(())
}

pub async fn create_event(pool: &PgPool, req: &CreateEventRequest) -> Result<Event, AppError> {
    if req.start_date >= req.end_date {
        return Err(AppError::validation("End date must be after start date"));
    }

    let event = sqlx::query_as::<_, Event>(
        "INSERT INTO events
             (id, name, description, hosted_by, location, start_date, end_date, entry_fee)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&req.name)
    .bind(&req.description)
    .bind(&req.hosted_by)
    .bind(&req.location)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(req.entry_fee)
    .fetch_one(pool)
    .await?;

    info!(event_id = %event.id, name = %event.name, "Event created");

    Ok(event)
}

/// Partial update of an event's details. The `start < end` window is
/// checked on the merged result and re-checked by the UPDATE against
/// the live row, so a one-sided date change can never invert it.
pub async fn update_event(
    pool: &PgPool,
    event_id: &str,
    req: &UpdateEventRequest,
) -> Result<Event, AppError> {
    let existing = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let start = req.start_date.unwrap_or(existing.start_date);
    let end = req.end_date.unwrap_or(existing.end_date);
    if start >= end {
        return Err(AppError::validation("End date must be after start date"));
    }

    let updated = sqlx::query_as::<_, Event>(
        "UPDATE events
         SET name = COALESCE($2, name),
             description = COALESCE($3, description),
             hosted_by = COALESCE($4, hosted_by),
             location = COALESCE($5, location),
             start_date = COALESCE($6, start_date),
             end_date = COALESCE($7, end_date),
             entry_fee = COALESCE($8, entry_fee),
             is_active = COALESCE($9, is_active),
             updated_at = NOW()
         WHERE id = $1
           AND COALESCE($6, start_date) < COALESCE($7, end_date)
         RETURNING *",
    )
    .bind(event_id)
    .bind(req.name.as_deref())
    .bind(req.description.as_deref())
    .bind(req.hosted_by.as_deref())
    .bind(req.location.as_deref())
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(req.entry_fee)
    .bind(req.is_active)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::validation("End date must be after start date"))?;

    info!(event_id = %updated.id, "Event updated");

    Ok(updated)
}

pub async fn list_events(
    pool: &PgPool,
    upcoming: bool,
    include_inactive: bool,
) -> Result<Vec<Event>, AppError> {
    let events = sqlx::query_as::<_, Event>(
        "SELECT * FROM events
         WHERE (is_active = TRUE OR $1)
           AND (start_date >= NOW() OR NOT $2)
         ORDER BY start_date DESC",
    )
    .bind(include_inactive)
    .bind(upcoming)
    .fetch_all(pool)
    .await?;

    Ok(events)
}

/// An event with its purchasable (active) ticket types.
pub async fn get_event(pool: &PgPool, event_id: &str) -> Result<EventDetails, AppError> {
    let event = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

    let ticket_types = sqlx::query_as::<_, TicketType>(
        "SELECT * FROM ticket_types WHERE event_id = $1 AND is_active = TRUE ORDER BY price",
    )
    .bind(event_id)
    .fetch_all(pool)
    .await?;

    Ok(EventDetails {
        event,
        ticket_types,
    })
}

/// Soft delete: the event stops listing and selling, issued tickets
/// stay intact.
pub async fn deactivate_event(pool: &PgPool, event_id: &str) -> Result<(), AppError> {
    let updated =
        sqlx::query("UPDATE events SET is_active = FALSE, updated_at = NOW() WHERE id = $1")
            .bind(event_id)
            .execute(pool)
            .await?;

    if updated.rows_affected() == 0 {
        return Err(AppError::NotFound("Event not found".to_string()));
    }

    info!(event_id, "Event deactivated");

    Ok(())
}

pub async fn create_ticket_type(
    pool: &PgPool,
    event_id: &str,
    req: &CreateTicketTypeRequest,
) -> Result<TicketType, AppError> {
    let event_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_one(pool)
        .await?;

    if event_exists == 0 {
        return Err(AppError::NotFound("Event not found".to_string()));
    }

    let ticket_type = sqlx::query_as::<_, TicketType>(
        "INSERT INTO ticket_types
             (id, event_id, name, description, price, available_quantity, max_per_user)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(event_id)
    .bind(&req.name)
    .bind(req.description.as_deref())
    .bind(req.price)
    .bind(req.available_quantity)
    .bind(req.max_per_user)
    .fetch_one(pool)
    .await?;

    info!(ticket_type_id = %ticket_type.id, event_id, "Ticket type created");

    Ok(ticket_type)
}

pub async fn create_discount_code(
    pool: &PgPool,
    req: &CreateDiscountCodeRequest,
) -> Result<DiscountCode, AppError> {
    check_discount_definition(req)?;

    if let Some(event_id) = &req.event_id {
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events WHERE id = $1")
            .bind(event_id)
            .fetch_one(pool)
            .await?;
        if exists == 0 {
            return Err(AppError::NotFound("Event not found".to_string()));
        }
    }

    if let Some(ticket_type_id) = &req.ticket_type_id {
        let ticket_type =
            sqlx::query_as::<_, TicketType>("SELECT * FROM ticket_types WHERE id = $1")
                .bind(ticket_type_id)
                .fetch_optional(pool)
                .await?
                .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

        if let Some(event_id) = &req.event_id {
            if ticket_type.event_id != *event_id {
                return Err(AppError::validation(
                    "Ticket type does not belong to this event",
                ));
            }
        }
    }

    let inserted = sqlx::query_as::<_, DiscountCode>(
        "INSERT INTO discount_codes
             (id, code, description, event_id, ticket_type_id, discount_type,
              discount_value, max_uses, start_date, end_date)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
         RETURNING *",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(&req.code)
    .bind(req.description.as_deref())
    .bind(req.event_id.as_deref())
    .bind(req.ticket_type_id.as_deref())
    .bind(req.discount_type)
    .bind(req.discount_value)
    .bind(req.max_uses)
    .bind(req.start_date)
    .bind(req.end_date)
    .fetch_one(pool)
    .await;

    match inserted {
        Ok(discount) => {
            info!(code = %discount.code, "Discount code created");
            Ok(discount)
        }
        Err(err) if is_unique_violation(&err) => {
            Err(AppError::validation("Discount code already exists"))
        }
        Err(err) => Err(err.into()),
    }
}
