#![allow(dead_code)]

use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use espera_server::models::ticket::Ticket;
use espera_server::services::tickets::PurchaseTicketsRequest;
use espera_server::utils::ids;

pub const ATTENDEE: &str = "user-aarav-0001";
pub const OTHER_ATTENDEE: &str = "user-diya-0002";
pub const STAFF: &str = "staff-gate-0001";
pub const MANAGER: &str = "manager-fest-0001";

pub async fn seed_event(pool: &PgPool) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO events
             (id, name, description, hosted_by, location, start_date, end_date, entry_fee)
         VALUES ($1, 'Espera 2026', 'Annual college tech fest', 'CSE Department',
                 'Main Auditorium', $2, $3, 0)",
    )
    .bind(&id)
    .bind(Utc::now() + Duration::days(1))
    .bind(Utc::now() + Duration::days(3))
    .execute(pool)
    .await
    .expect("failed to seed event");

    id
}

pub async fn seed_ticket_type(
    pool: &PgPool,
    event_id: &str,
    price: i64,
    available_quantity: Option<i32>,
    max_per_user: Option<i32>,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO ticket_types
             (id, event_id, name, description, price, available_quantity, max_per_user)
         VALUES ($1, $2, 'General Pass', 'Full fest access', $3, $4, $5)",
    )
    .bind(&id)
    .bind(event_id)
    .bind(price)
    .bind(available_quantity)
    .bind(max_per_user)
    .execute(pool)
    .await
    .expect("failed to seed ticket type");

    id
}

pub async fn seed_transaction(pool: &PgPool, user_id: &str, event_id: &str, amount: i64) -> String {
    let id = ids::transaction_id();
    sqlx::query(
        "INSERT INTO transactions (id, user_id, event_id, amount, payment_method, status)
         VALUES ($1, $2, $3, $4, 'upi', 'success')",
    )
    .bind(&id)
    .bind(user_id)
    .bind(event_id)
    .bind(amount)
    .execute(pool)
    .await
    .expect("failed to seed transaction");

    id
}

pub async fn seed_discount(
    pool: &PgPool,
    code: &str,
    discount_type: &str,
    discount_value: i64,
    max_uses: Option<i32>,
    event_id: Option<&str>,
    ticket_type_id: Option<&str>,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO discount_codes
             (id, code, event_id, ticket_type_id, discount_type, discount_value, max_uses)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(&id)
    .bind(code)
    .bind(event_id)
    .bind(ticket_type_id)
    .bind(discount_type)
    .bind(discount_value)
    .bind(max_uses)
    .execute(pool)
    .await
    .expect("failed to seed discount code");

    id
}

pub fn purchase_request(
    ticket_type_id: &str,
    event_id: &str,
    quantity: i32,
    transaction_id: &str,
) -> PurchaseTicketsRequest {
    PurchaseTicketsRequest {
        ticket_type_id: ticket_type_id.to_string(),
        event_id: event_id.to_string(),
        quantity,
        discount_code: None,
        transaction_id: transaction_id.to_string(),
    }
}

pub async fn fetch_ticket(pool: &PgPool, ticket_id: &str) -> Ticket {
    sqlx::query_as::<_, Ticket>("SELECT * FROM tickets WHERE id = $1")
        .bind(ticket_id)
        .fetch_one(pool)
        .await
        .expect("ticket not found")
}

pub async fn available_quantity(pool: &PgPool, ticket_type_id: &str) -> Option<i32> {
    sqlx::query_scalar("SELECT available_quantity FROM ticket_types WHERE id = $1")
        .bind(ticket_type_id)
        .fetch_one(pool)
        .await
        .expect("failed to read ticket type")
}

pub async fn count_where(pool: &PgPool, sql: &str, bind: &str) -> i64 {
    sqlx::query_scalar(sql)
        .bind(bind)
        .fetch_one(pool)
        .await
        .expect("count query failed")
}
