//! Transaction ledger: payments arrive already settled by the gateway,
//! so recording one is an insert pair (transaction + payment details).
//! Refunds are append-only records plus a cumulative rollup on the
//! transaction row, bounded by the original amount.

use serde::Deserialize;
use sqlx::{Acquire, PgPool, Postgres};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::models::transaction::{PaymentMethod, Refund, Transaction};
use crate::utils::error::{is_unique_violation, AppError, RuleViolation};
use crate::utils::ids;

const MAX_ID_ATTEMPTS: usize = 4;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordPaymentRequest {
    #[validate(length(min = 1, message = "Event ID is required"))]
    pub event_id: String,
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,
    pub payment_method: PaymentMethod,
    #[validate(length(min = 1, message = "Gateway transaction ID is required"))]
    pub gateway_transaction_id: String,
    pub gateway_response: Option<String>,
    pub card_last_4: Option<String>,
    pub card_brand: Option<String>,
    pub upi_id: Option<String>,
    pub bank_name: Option<String>,
    pub wallet_name: Option<String>,
    #[validate(length(min = 1, message = "Payment processor is required"))]
    pub payment_processor: String,
    pub receipt_url: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProcessRefundRequest {
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount: i64,
    #[validate(length(min = 1, message = "Reason is required"))]
    pub reason: String,
    pub gateway_refund_id: Option<String>,
}

/// Records a settled payment and its method details, returning the new
/// transaction id.
pub async fn record_payment(
    pool: &PgPool,
    user_id: &str,
    req: &RecordPaymentRequest,
) -> Result<String, AppError> {
    let event_exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM events WHERE id = $1")
        .bind(&req.event_id)
        .fetch_one(pool)
        .await?;

    if event_exists == 0 {
        return Err(AppError::NotFound("Event not found".to_string()));
    }

    // Transaction ids are time-derived; a collision aborts the insert
    // pair and the whole attempt is retried with a fresh id.
    for _ in 0..MAX_ID_ATTEMPTS {
        let transaction_id = ids::transaction_id();

        let mut tx = pool.begin().await?;

        let inserted = sqlx::query(
            "INSERT INTO transactions
                 (id, user_id, event_id, amount, payment_method, status,
                  gateway_transaction_id, gateway_response)
             VALUES ($1, $2, $3, $4, $5, 'success', $6, $7)",
        )
        .bind(&transaction_id)
        .bind(user_id)
        .bind(&req.event_id)
        .bind(req.amount)
        .bind(req.payment_method)
        .bind(&req.gateway_transaction_id)
        .bind(req.gateway_response.as_deref())
        .execute(&mut *tx)
        .await;

        match inserted {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => {
                tx.rollback().await?;
                continue;
            }
            Err(err) => return Err(err.into()),
        }

        sqlx::query(
            "INSERT INTO payment_details
                 (id, transaction_id, card_last_4, card_brand, upi_id, bank_name,
                  wallet_name, payment_processor, receipt_url)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&transaction_id)
        .bind(req.card_last_4.as_deref())
        .bind(req.card_brand.as_deref())
        .bind(req.upi_id.as_deref())
        .bind(req.bank_name.as_deref())
        .bind(req.wallet_name.as_deref())
        .bind(&req.payment_processor)
        .bind(req.receipt_url.as_deref())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(transaction_id, user_id, amount = req.amount, "Payment recorded");

        return Ok(transaction_id);
    }

    Err(AppError::InternalServerError(
        "Could not allocate a unique transaction id".to_string(),
    ))
}

/// Applies a refund against a transaction. The sum of all refunds can
/// never exceed the original amount, including under concurrent
/// requests: the rollup UPDATE re-checks the bound row-locked.
pub async fn process_refund(
    pool: &PgPool,
    processed_by: &str,
    transaction_id: &str,
    req: &ProcessRefundRequest,
) -> Result<Refund, AppError> {
    let transaction = sqlx::query_as::<_, Transaction>("SELECT * FROM transactions WHERE id = $1")
        .bind(transaction_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Transaction not found".to_string()))?;

    // Overflow of the rollup counts as exceeding the bound.
    let over_bound = transaction
        .refunded_amount
        .checked_add(req.amount)
        .map_or(true, |total| total > transaction.amount);
    if over_bound {
        return Err(RuleViolation::RefundExceedsOriginal.into());
    }

    let mut tx = pool.begin().await?;

    // The refund-bound CHECK keeps refunded_amount <= amount, so the
    // subtraction in the guard cannot overflow.
    let updated = sqlx::query(
        "UPDATE transactions
         SET refunded_amount = refunded_amount + $2,
             refund_status = CASE WHEN refunded_amount + $2 >= amount
                                  THEN 'full' ELSE 'partial' END,
             updated_at = NOW()
         WHERE id = $1 AND $2 <= amount - refunded_amount",
    )
    .bind(transaction_id)
    .bind(req.amount)
    .execute(&mut *tx)
    .await?;

    if updated.rows_affected() == 0 {
        return Err(RuleViolation::RefundExceedsOriginal.into());
    }

    let refund = insert_refund_with_fresh_id(&mut tx, processed_by, transaction_id, req).await?;

    tx.commit().await?;

    info!(refund_id = %refund.id, transaction_id, amount = req.amount, "Refund processed");

    Ok(refund)
}

async fn insert_refund_with_fresh_id(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    processed_by: &str,
    transaction_id: &str,
    req: &ProcessRefundRequest,
) -> Result<Refund, AppError> {
    for _ in 0..MAX_ID_ATTEMPTS {
        let refund_id = ids::refund_id();

        let mut savepoint = tx.begin().await?;

        let inserted = sqlx::query_as::<_, Refund>(
            "INSERT INTO refunds
                 (id, transaction_id, amount, reason, processed_by, gateway_refund_id, status)
             VALUES ($1, $2, $3, $4, $5, $6, 'completed')
             RETURNING *",
        )
        .bind(&refund_id)
        .bind(transaction_id)
        .bind(req.amount)
        .bind(&req.reason)
        .bind(processed_by)
        .bind(req.gateway_refund_id.as_deref())
        .fetch_one(&mut *savepoint)
        .await;

        match inserted {
            Ok(refund) => {
                savepoint.commit().await?;
                return Ok(refund);
            }
            Err(err) if is_unique_violation(&err) => {
                savepoint.rollback().await?;
                continue;
            }
            Err(err) => return Err(err.into()),
        }
    }

    Err(AppError::InternalServerError(
        "Could not allocate a unique refund id".to_string(),
    ))
}

/// The caller's transactions, newest first.
pub async fn list_user_transactions(
    pool: &PgPool,
    user_id: &str,
) -> Result<Vec<Transaction>, AppError> {
    let transactions = sqlx::query_as::<_, Transaction>(
        "SELECT * FROM transactions WHERE user_id = $1 ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(transactions)
}
