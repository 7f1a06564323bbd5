mod common;

use common::*;
use sqlx::PgPool;

use espera_server::models::attendance::{AttendanceLogEntry, CheckInMethod, LogAction};
use espera_server::models::ticket::TicketStatus;
use espera_server::services::attendance::{self, CheckInRequest};
use espera_server::services::tickets;
use espera_server::utils::error::{AppError, RuleViolation};

async fn issue_one_ticket(pool: &PgPool, user_id: &str) -> (String, String, String) {
    let event_id = seed_event(pool).await;
    let type_id = seed_ticket_type(pool, &event_id, 170000, Some(10), Some(5)).await;
    let txn_id = seed_transaction(pool, user_id, &event_id, 170000).await;

    let req = purchase_request(&type_id, &event_id, 1, &txn_id);
    let mut ticket_ids = tickets::purchase_tickets(pool, user_id, &req)
        .await
        .expect("purchase failed");
    let ticket_id = ticket_ids.remove(0);
    let qr_code = fetch_ticket(pool, &ticket_id).await.qr_code;

    (event_id, ticket_id, qr_code)
}

fn check_in_request(ticket_id: &str, event_id: &str, qr_code: &str) -> CheckInRequest {
    CheckInRequest {
        ticket_id: ticket_id.to_string(),
        event_id: event_id.to_string(),
        qr_code: qr_code.to_string(),
        check_in_method: CheckInMethod::QrScan,
        check_in_location: None,
        notes: None,
    }
}

#[sqlx::test]
#[ignore = "requires a running Postgres"]
async fn check_in_consumes_the_ticket(pool: PgPool) {
    let (event_id, ticket_id, qr_code) = issue_one_ticket(&pool, ATTENDEE).await;

    let record = attendance::check_in_attendee(
        &pool,
        STAFF,
        &check_in_request(&ticket_id, &event_id, &qr_code),
    )
    .await
    .expect("check-in failed");

    assert_eq!(record.ticket_id, ticket_id);
    assert_eq!(record.user_id, ATTENDEE);
    assert_eq!(record.checked_in_by, STAFF);

    let ticket = fetch_ticket(&pool, &ticket_id).await;
    assert_eq!(ticket.status, TicketStatus::Used);
    assert!(ticket.check_in_date.is_some());
    assert_eq!(ticket.checked_in_by.as_deref(), Some(STAFF));

    let log: AttendanceLogEntry = sqlx::query_as(
        "SELECT * FROM attendance_log_entries WHERE attendance_id = $1",
    )
    .bind(&record.id)
    .fetch_one(&pool)
    .await
    .expect("log entry missing");
    assert_eq!(log.action, LogAction::CheckIn);
    assert_eq!(log.processed_by.as_deref(), Some(STAFF));
    assert_eq!(log.notes.as_deref(), Some("Initial check-in: No notes"));
}

#[sqlx::test]
#[ignore = "requires a running Postgres"]
async fn repeat_check_in_is_a_conflict(pool: PgPool) {
    let (event_id, ticket_id, qr_code) = issue_one_ticket(&pool, ATTENDEE).await;
    let req = check_in_request(&ticket_id, &event_id, &qr_code);

    attendance::check_in_attendee(&pool, STAFF, &req)
        .await
        .expect("first check-in failed");

    let err = attendance::check_in_attendee(&pool, STAFF, &req)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Rule(RuleViolation::AlreadyCheckedIn)));
    assert_eq!(err.to_string(), "Attendee already checked in");

    // The ticket stays used, and there is still exactly one attendance row
    assert_eq!(
        fetch_ticket(&pool, &ticket_id).await.status,
        TicketStatus::Used
    );
    let rows = count_where(
        &pool,
        "SELECT COUNT(*) FROM attendance WHERE ticket_id = $1",
        &ticket_id,
    )
    .await;
    assert_eq!(rows, 1);
}

#[sqlx::test]
#[ignore = "requires a running Postgres"]
async fn concurrent_check_ins_record_one_attendance(pool: PgPool) {
    let (event_id, ticket_id, qr_code) = issue_one_ticket(&pool, ATTENDEE).await;

    let mut handles = Vec::new();
    for _ in 0..2 {
        let pool = pool.clone();
        let req = check_in_request(&ticket_id, &event_id, &qr_code);
        handles.push(tokio::spawn(async move {
            attendance::check_in_attendee(&pool, STAFF, &req).await
        }));
    }

    let mut succeeded = 0;
    let mut conflicted = 0;
    for handle in handles {
        match handle.await.expect("task panicked") {
            Ok(_) => succeeded += 1,
            Err(AppError::Rule(RuleViolation::AlreadyCheckedIn)) => conflicted += 1,
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(succeeded, 1);
    assert_eq!(conflicted, 1);
    let rows = count_where(
        &pool,
        "SELECT COUNT(*) FROM attendance WHERE ticket_id = $1",
        &ticket_id,
    )
    .await;
    assert_eq!(rows, 1);
    let log_rows = count_where(
        &pool,
        "SELECT COUNT(*) FROM attendance_log_entries WHERE notes LIKE 'Initial check-in%' AND attendance_id IN (SELECT id FROM attendance WHERE ticket_id = $1)",
        &ticket_id,
    )
    .await;
    assert_eq!(log_rows, 1);
}

#[sqlx::test]
#[ignore = "requires a running Postgres"]
async fn mismatches_are_rejected_without_detail(pool: PgPool) {
    let (event_id, ticket_id, qr_code) = issue_one_ticket(&pool, ATTENDEE).await;

    let err = attendance::check_in_attendee(
        &pool,
        STAFF,
        &check_in_request(&ticket_id, &event_id, "not-the-real-code"),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid or used ticket");

    // Same undifferentiated answer once the ticket is used: a wrong QR
    // must not reveal check-in state
    attendance::check_in_attendee(
        &pool,
        STAFF,
        &check_in_request(&ticket_id, &event_id, &qr_code),
    )
    .await
    .expect("check-in failed");

    let err = attendance::check_in_attendee(
        &pool,
        STAFF,
        &check_in_request(&ticket_id, &event_id, "not-the-real-code"),
    )
    .await
    .unwrap_err();
    assert_eq!(err.to_string(), "Invalid or used ticket");
}

#[sqlx::test]
#[ignore = "requires a running Postgres"]
async fn ticket_cannot_check_in_to_another_event(pool: PgPool) {
    let (_event_id, ticket_id, qr_code) = issue_one_ticket(&pool, ATTENDEE).await;
    let other_event_id = seed_event(&pool).await;

    let err = attendance::check_in_attendee(
        &pool,
        STAFF,
        &check_in_request(&ticket_id, &other_event_id, &qr_code),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        AppError::Rule(RuleViolation::InvalidOrUsedTicket)
    ));
}

#[sqlx::test]
#[ignore = "requires a running Postgres"]
async fn attendance_report_lists_recent_first(pool: PgPool) {
    let event_id = seed_event(&pool).await;
    let type_id = seed_ticket_type(&pool, &event_id, 170000, Some(10), Some(5)).await;
    let txn_id = seed_transaction(&pool, ATTENDEE, &event_id, 340000).await;

    let req = purchase_request(&type_id, &event_id, 2, &txn_id);
    let ticket_ids = tickets::purchase_tickets(&pool, ATTENDEE, &req)
        .await
        .expect("purchase failed");

    for ticket_id in &ticket_ids {
        let qr_code = fetch_ticket(&pool, ticket_id).await.qr_code;
        attendance::check_in_attendee(
            &pool,
            STAFF,
            &check_in_request(ticket_id, &event_id, &qr_code),
        )
        .await
        .expect("check-in failed");
    }

    let report = attendance::event_attendance(&pool, &event_id)
        .await
        .expect("report failed");
    assert_eq!(report.attendance_count, 2);
    assert!(
        report.attendance_records[0].checked_in_at >= report.attendance_records[1].checked_in_at
    );
}
