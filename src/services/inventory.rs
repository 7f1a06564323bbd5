//! Inventory and discount accounting.
//!
//! The pure functions here decide *whether* a purchase may proceed and
//! what it costs; the conditional UPDATEs are the authoritative word on
//! capacity and usage under concurrency. Prechecks give friendly errors,
//! the UPDATEs give correctness.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};

use crate::models::ticket::{DiscountCode, DiscountType, TicketType};
use crate::utils::error::{AppError, DiscountIssue, RuleViolation};

/// Discount taken off a single ticket priced at `price` paise.
/// Percentage discounts round half-up; amount discounts are flat.
pub fn compute_discount(price: i64, discount: &DiscountCode) -> i64 {
    match discount.discount_type {
        DiscountType::Percentage => (price * discount.discount_value + 50) / 100,
        DiscountType::Amount => discount.discount_value,
    }
}

/// Per-ticket price after the discount, clamped at zero. A discount can
/// never push a price negative.
pub fn discounted_price(price: i64, discount: &DiscountCode) -> i64 {
    (price - compute_discount(price, discount)).max(0)
}

pub fn usage_exhausted(discount: &DiscountCode) -> bool {
    match discount.max_uses {
        Some(max) => discount.current_uses >= max,
        None => false,
    }
}

/// Why `discount` cannot apply to this ticket type and event right now,
/// or None when it can. Checks run in a fixed order so the caller sees
/// the same reason the purchase path would report.
pub fn applicability_issue(
    discount: &DiscountCode,
    ticket_type_id: &str,
    event_id: &str,
    now: DateTime<Utc>,
) -> Option<DiscountIssue> {
    if !discount.is_active {
        return Some(DiscountIssue::NotFoundOrExpired);
    }
    // The window is inclusive: a code is usable at its exact start and
    // end instants.
    if let Some(start) = discount.start_date {
        if start > now {
            return Some(DiscountIssue::NotFoundOrExpired);
        }
    }
    if let Some(end) = discount.end_date {
        if end < now {
            return Some(DiscountIssue::NotFoundOrExpired);
        }
    }
    if let Some(scoped_type) = &discount.ticket_type_id {
        if scoped_type != ticket_type_id {
            return Some(DiscountIssue::WrongTicketType);
        }
    }
    if let Some(scoped_event) = &discount.event_id {
        if scoped_event != event_id {
            return Some(DiscountIssue::WrongEvent);
        }
    }
    if usage_exhausted(discount) {
        return Some(DiscountIssue::UsageLimitReached);
    }
    None
}

/// The per-user cap this request would break, if any. Enforced per
/// request: the cap bounds one order, not a user's lifetime holdings.
pub fn exceeds_per_user_limit(ticket_type: &TicketType, quantity: i32) -> Option<i32> {
    match ticket_type.max_per_user {
        Some(limit) if quantity > limit => Some(limit),
        _ => None,
    }
}

/// Fast-path capacity check against a snapshot. `reserve_capacity` is
/// what actually holds under concurrency.
pub fn short_on_capacity(ticket_type: &TicketType, quantity: i32) -> bool {
    match ticket_type.available_quantity {
        Some(available) => quantity > available,
        None => false,
    }
}

pub async fn find_active_ticket_type(
    pool: &PgPool,
    ticket_type_id: &str,
) -> Result<Option<TicketType>, sqlx::Error> {
    sqlx::query_as::<_, TicketType>("SELECT * FROM ticket_types WHERE id = $1 AND is_active = TRUE")
        .bind(ticket_type_id)
        .fetch_optional(pool)
        .await
}

/// Loads a discount code and checks it against the target ticket type
/// and event. Not-found and out-of-window are indistinguishable to the
/// caller on purpose.
pub async fn resolve_discount(
    pool: &PgPool,
    code: &str,
    ticket_type_id: &str,
    event_id: &str,
) -> Result<DiscountCode, AppError> {
    let discount =
        sqlx::query_as::<_, DiscountCode>("SELECT * FROM discount_codes WHERE code = $1")
            .bind(code)
            .fetch_optional(pool)
            .await?
            .ok_or(RuleViolation::InvalidDiscount(DiscountIssue::NotFoundOrExpired))?;

    if let Some(issue) = applicability_issue(&discount, ticket_type_id, event_id, Utc::now()) {
        return Err(RuleViolation::InvalidDiscount(issue).into());
    }

    Ok(discount)
}

/// Reserves `quantity` seats inside the issuance transaction. NULL
/// capacity (unlimited) always passes and stays NULL. Zero rows
/// affected means another purchase took the remaining seats first.
pub async fn reserve_capacity(
    conn: &mut PgConnection,
    ticket_type_id: &str,
    quantity: i32,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE ticket_types
         SET available_quantity = available_quantity - $2, updated_at = NOW()
         WHERE id = $1
           AND is_active = TRUE
           AND (available_quantity IS NULL OR available_quantity >= $2)",
    )
    .bind(ticket_type_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RuleViolation::InsufficientInventory.into());
    }

    Ok(())
}

/// Burns `quantity` uses of the code inside the issuance transaction.
/// Zero rows affected means concurrent purchases reached the usage
/// limit first.
pub async fn consume_discount(
    conn: &mut PgConnection,
    discount_id: &str,
    quantity: i32,
) -> Result<(), AppError> {
    let result = sqlx::query(
        "UPDATE discount_codes
         SET current_uses = current_uses + $2, updated_at = NOW()
         WHERE id = $1
           AND (max_uses IS NULL OR current_uses + $2 <= max_uses)",
    )
    .bind(discount_id)
    .bind(quantity)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(RuleViolation::InvalidDiscount(DiscountIssue::UsageLimitReached).into());
    }

    Ok(())
}
