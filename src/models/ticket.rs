use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum TicketStatus {
    Active,
    Used,
    Cancelled,
    Refunded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum DiscountType {
    Percentage,
    Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TicketType {
    pub id: String,
    pub event_id: String,
    pub name: String,
    pub description: Option<String>,
    /// Integer paise.
    pub price: i64,
    /// None means unlimited capacity.
    pub available_quantity: Option<i32>,
    /// None means no per-user cap.
    pub max_per_user: Option<i32>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub ticket_type_id: String,
    pub event_id: String,
    pub user_id: String,
    pub transaction_id: String,
    pub status: TicketStatus,
    pub qr_code: String,
    pub purchase_date: DateTime<Utc>,
    pub check_in_date: Option<DateTime<Utc>>,
    pub checked_in_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DiscountCode {
    pub id: String,
    pub code: String,
    pub description: Option<String>,
    /// None means valid for any event.
    pub event_id: Option<String>,
    /// None means valid for any ticket type.
    pub ticket_type_id: Option<String>,
    pub discount_type: DiscountType,
    /// Percentage points or paise, depending on discount_type.
    pub discount_value: i64,
    pub max_uses: Option<i32>,
    pub current_uses: i32,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DiscountUsage {
    pub id: String,
    pub discount_id: String,
    pub ticket_id: String,
    pub user_id: String,
    pub used_at: DateTime<Utc>,
}
