use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Upi,
    Netbanking,
    Wallet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Success,
    Failed,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum RefundStatus {
    None,
    Partial,
    Full,
}

/// Lifecycle of an individual refund record, distinct from the
/// transaction-level RefundStatus rollup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum RefundState {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub user_id: String,
    pub event_id: String,
    /// Integer paise.
    pub amount: i64,
    pub payment_method: PaymentMethod,
    pub status: TransactionStatus,
    pub gateway_transaction_id: Option<String>,
    pub gateway_response: Option<String>,
    pub refund_status: RefundStatus,
    pub refunded_amount: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub id: String,
    pub transaction_id: String,
    pub card_last_4: Option<String>,
    pub card_brand: Option<String>,
    pub upi_id: Option<String>,
    pub bank_name: Option<String>,
    pub wallet_name: Option<String>,
    pub payment_processor: String,
    pub receipt_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Refund {
    pub id: String,
    pub transaction_id: String,
    /// Integer paise.
    pub amount: i64,
    pub reason: String,
    pub processed_by: Option<String>,
    pub gateway_refund_id: Option<String>,
    pub status: RefundState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
