//! Ticket issuance: one database transaction covers capacity
//! reservation, ticket rows, discount usage rows and discount
//! consumption. Either every ticket in the order exists afterwards or
//! none do.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Acquire, FromRow, PgPool, Postgres, Transaction};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::ticket::{DiscountType, TicketStatus, TicketType};
use crate::services::inventory;
use crate::utils::error::{is_unique_violation, AppError, RuleViolation};
use crate::utils::ids;

/// Attempts per ticket to find an unused human-readable id before the
/// order is abandoned.
const MAX_ID_ATTEMPTS: usize = 4;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseTicketsRequest {
    #[validate(length(min = 1, message = "Ticket type is required"))]
    pub ticket_type_id: String,
    #[validate(length(min = 1, message = "Event ID is required"))]
    pub event_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub discount_code: Option<String>,
    #[validate(length(min = 1, message = "Transaction ID is required"))]
    pub transaction_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ValidateDiscountRequest {
    #[validate(length(min = 1, message = "Discount code is required"))]
    pub code: String,
    #[validate(length(min = 1, message = "Ticket type is required"))]
    pub ticket_type_id: String,
    #[validate(length(min = 1, message = "Event ID is required"))]
    pub event_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscountPreview {
    pub code: String,
    pub description: Option<String>,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    pub discount_amount: i64,
    pub original_price: i64,
    pub discounted_price: i64,
}

/// A ticket as shown to its holder, joined with its catalog entry.
#[derive(Debug, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct OwnedTicket {
    pub id: String,
    pub ticket_type_id: String,
    pub event_id: String,
    pub transaction_id: String,
    pub status: TicketStatus,
    pub qr_code: String,
    pub purchase_date: DateTime<Utc>,
    pub ticket_type_name: String,
    pub ticket_type_description: Option<String>,
    pub price: i64,
}

/// Issues `quantity` tickets to `user_id`, returning the new ticket ids
/// in issue order.
pub async fn purchase_tickets(
    pool: &PgPool,
    user_id: &str,
    req: &PurchaseTicketsRequest,
) -> Result<Vec<String>, AppError> {
    let ticket_type = inventory::find_active_ticket_type(pool, &req.ticket_type_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found or not available".to_string()))?;

    if ticket_type.event_id != req.event_id {
        return Err(AppError::validation(
            "Ticket type does not belong to this event",
        ));
    }

    if inventory::short_on_capacity(&ticket_type, req.quantity) {
        return Err(RuleViolation::InsufficientInventory.into());
    }

    if let Some(limit) = inventory::exceeds_per_user_limit(&ticket_type, req.quantity) {
        return Err(RuleViolation::PerUserLimitExceeded { limit }.into());
    }

    let discount = match &req.discount_code {
        Some(code) => {
            Some(inventory::resolve_discount(pool, code, &req.ticket_type_id, &req.event_id).await?)
        }
        None => None,
    };

    // The payment must exist and belong to the purchaser before tickets
    // hang off it.
    let paid = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM transactions WHERE id = $1 AND user_id = $2",
    )
    .bind(&req.transaction_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    if paid == 0 {
        return Err(AppError::NotFound("Transaction not found".to_string()));
    }

    let mut tx = pool.begin().await?;

    inventory::reserve_capacity(&mut tx, &req.ticket_type_id, req.quantity).await?;

    let mut ticket_ids = Vec::with_capacity(req.quantity as usize);

    for _ in 0..req.quantity {
        let ticket_id = insert_ticket_with_fresh_id(&mut tx, user_id, req).await?;

        if let Some(discount) = &discount {
            sqlx::query(
                "INSERT INTO discount_usage (id, discount_id, ticket_id, user_id, used_at)
                 VALUES ($1, $2, $3, $4, NOW())",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&discount.id)
            .bind(&ticket_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        }

        ticket_ids.push(ticket_id);
    }

    if let Some(discount) = &discount {
        inventory::consume_discount(&mut tx, &discount.id, req.quantity).await?;
    }

    tx.commit().await?;

    info!(
        user_id,
        ticket_type_id = %req.ticket_type_id,
        count = ticket_ids.len(),
        "Tickets issued"
    );

    Ok(ticket_ids)
}

/// Inserts one ticket row, regenerating the id and QR payload on a
/// unique-key collision. Each attempt runs in a savepoint so a failed
/// insert does not poison the surrounding transaction.
async fn insert_ticket_with_fresh_id(
    tx: &mut Transaction<'_, Postgres>,
    user_id: &str,
    req: &PurchaseTicketsRequest,
) -> Result<String, AppError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let ticket_id = ids::ticket_id();
        let qr_code = ids::ticket_qr_code(&ticket_id);

        let mut savepoint = tx.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO tickets
                 (id, ticket_type_id, event_id, user_id, transaction_id, status, qr_code, purchase_date)
             VALUES ($1, $2, $3, $4, $5, 'active', $6, NOW())",
        )
        .bind(&ticket_id)
        .bind(&req.ticket_type_id)
        .bind(&req.event_id)
        .bind(user_id)
        .bind(&req.transaction_id)
        .bind(&qr_code)
        .execute(&mut *savepoint)
        .await;

        match inserted {
            Ok(_) => {
                savepoint.commit().await?;
                return Ok(ticket_id);
            }
            Err(err) if is_unique_violation(&err) => {
                savepoint.rollback().await?;
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::InternalServerError(
        "Could not allocate a unique ticket id".to_string(),
    ))
}

/// Dry-run discount application: same checks and arithmetic as the
/// purchase path, no writes.
pub async fn validate_discount(
    pool: &PgPool,
    req: &ValidateDiscountRequest,
) -> Result<DiscountPreview, AppError> {
    let discount =
        inventory::resolve_discount(pool, &req.code, &req.ticket_type_id, &req.event_id).await?;

    let ticket_type = sqlx::query_as::<_, TicketType>("SELECT * FROM ticket_types WHERE id = $1")
        .bind(&req.ticket_type_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

    let discount_amount = inventory::compute_discount(ticket_type.price, &discount);
    let discounted_price = inventory::discounted_price(ticket_type.price, &discount);

    Ok(DiscountPreview {
        code: discount.code,
        description: discount.description,
        discount_type: discount.discount_type,
        discount_value: discount.discount_value,
        discount_amount,
        original_price: ticket_type.price,
        discounted_price,
    })
}

/// The caller's active tickets, newest purchase first.
pub async fn list_user_tickets(pool: &PgPool, user_id: &str) -> Result<Vec<OwnedTicket>, AppError> {
    let tickets = sqlx::query_as::<_, OwnedTicket>(
        "SELECT t.id, t.ticket_type_id, t.event_id, t.transaction_id, t.status,
                t.qr_code, t.purchase_date,
                tt.name AS ticket_type_name,
                tt.description AS ticket_type_description,
                tt.price
         FROM tickets t
         JOIN ticket_types tt ON tt.id = t.ticket_type_id
         WHERE t.user_id = $1 AND t.status = 'active'
         ORDER BY t.purchase_date DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(tickets)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn purchase_request(quantity: i32) -> PurchaseTicketsRequest {
        PurchaseTicketsRequest {
            ticket_type_id: "tt_1".to_string(),
            event_id: "evt_1".to_string(),
            quantity,
            discount_code: None,
            transaction_id: "TXN123456789".to_string(),
        }
    }

    #[test]
    fn purchase_request_requires_positive_quantity() {
        assert!(purchase_request(0).validate().is_err());
        assert!(purchase_request(-2).validate().is_err());
        assert!(purchase_request(1).validate().is_ok());
    }

    #[test]
    fn purchase_request_requires_identifiers() {
        let mut req = purchase_request(1);
        req.transaction_id = String::new();
        assert!(req.validate().is_err());

        let mut req = purchase_request(1);
        req.ticket_type_id = String::new();
        assert!(req.validate().is_err());
    }

    #[test]
    fn validate_discount_request_requires_code() {
        let req = ValidateDiscountRequest {
            code: String::new(),
            ticket_type_id: "tt_1".to_string(),
            event_id: "evt_1".to_string(),
        };
        assert!(req.validate().is_err());
    }
}
