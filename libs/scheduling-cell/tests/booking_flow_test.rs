use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assert_matches::assert_matches;
use customer_cell::models::Customer;
use scheduling_cell::models::SchedulingError;
use scheduling_cell::services::availability::AvailabilityService;
use scheduling_cell::services::booking::BookingService;
use scheduling_cell::services::calendar::CalendarClient;
use shared_utils::test_utils::{MockRows, TestConfig};

// 2026-01-19 is a Monday
const MONDAY: &str = "2026-01-19";

fn monday() -> NaiveDate {
    NaiveDate::parse_from_str(MONDAY, "%Y-%m-%d").unwrap()
}

fn test_customer() -> Customer {
    serde_json::from_value(MockRows::customer(
        "7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa",
        "5511999999999",
        "Maria Silva",
        "main_menu",
    ))
    .unwrap()
}

async fn mount_monday_rule(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_rules"))
        .and(query_param("day_of_week", "eq.1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            MockRows::availability_rule(
                "5f0e2b1a-2222-4ddd-8888-bbbbbbbbbbbb",
                1,
                "08:00:00",
                "10:00:00",
                50,
                10,
            ),
        ]))
        .mount(server)
        .await;
}

#[tokio::test]
async fn available_slots_subtracts_calendar_busy_windows() {
    let server = MockServer::start().await;
    mount_monday_rule(&server).await;

    // 08:00-08:50 is occupied, leaving only the 09:00 slot
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "evt-busy",
                "start": { "dateTime": format!("{}T08:00:00Z", MONDAY) },
                "end": { "dateTime": format!("{}T08:50:00Z", MONDAY) }
            }]
        })))
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);
    let calendar = CalendarClient::new(&config);

    let slots = service.available_slots(&calendar, monday()).await.unwrap();
    assert_eq!(slots, vec![NaiveTime::from_hms_opt(9, 0, 0).unwrap()]);
}

#[tokio::test]
async fn available_slots_empty_when_no_rule_covers_the_day() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = AvailabilityService::new(&config);
    let calendar = CalendarClient::new(&config);

    let slots = service.available_slots(&calendar, monday()).await.unwrap();
    assert!(slots.is_empty());
}

#[tokio::test]
async fn booking_creates_calendar_event_then_persists_appointment() {
    let server = MockServer::start().await;
    mount_monday_rule(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt-new" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![MockRows::appointment(
            "9c1d3f5b-3333-4eee-7777-cccccccccccc",
            "7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa",
            MONDAY,
            "09:00",
            "scheduled",
            "unbilled",
        )]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_log"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![json!({ "id": 1 })]))
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let appointment = service
        .book(
            &test_customer(),
            monday(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            200.0,
        )
        .await
        .unwrap();

    assert_eq!(appointment.appointment_date, monday());
}

#[tokio::test]
async fn booking_an_occupied_slot_is_rejected_before_any_write() {
    let server = MockServer::start().await;
    mount_monday_rule(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{
                "id": "evt-busy",
                "start": { "dateTime": format!("{}T09:00:00Z", MONDAY) },
                "end": { "dateTime": format!("{}T09:50:00Z", MONDAY) }
            }]
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt-x" })))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let result = service
        .book(
            &test_customer(),
            monday(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            200.0,
        )
        .await;

    assert_matches!(result, Err(SchedulingError::SlotTaken));
}

#[tokio::test]
async fn conflicting_insert_maps_to_slot_taken() {
    let server = MockServer::start().await;
    mount_monday_rule(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt-race" })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_log"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![json!({ "id": 1 })]))
        .mount(&server)
        .await;

    // Unique calendar_event_id violation when two bookings race
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "duplicate key value violates unique constraint"
        })))
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let result = service
        .book(
            &test_customer(),
            monday(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            200.0,
        )
        .await;

    assert_matches!(result, Err(SchedulingError::SlotTaken));
}

#[tokio::test]
async fn booking_does_not_persist_without_its_audit_row() {
    let server = MockServer::start().await;
    mount_monday_rule(&server).await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt-new" })))
        .mount(&server)
        .await;

    // The trail write fails, so the appointment insert never happens
    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_log"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![MockRows::appointment(
            "9c1d3f5b-3333-4eee-7777-cccccccccccc",
            "7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa",
            MONDAY,
            "09:00",
            "scheduled",
            "unbilled",
        )]))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let result = service
        .book(
            &test_customer(),
            monday(),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            200.0,
        )
        .await;

    assert_matches!(result, Err(SchedulingError::Database(_)));
}

#[tokio::test]
async fn completed_appointments_cannot_be_cancelled() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::appointment(
            "9c1d3f5b-3333-4eee-7777-cccccccccccc",
            "7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa",
            MONDAY,
            "09:00",
            "completed",
            "unbilled",
        )]))
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let result = service
        .cancel(
            Uuid::parse_str("9c1d3f5b-3333-4eee-7777-cccccccccccc").unwrap(),
            Some("motivo".to_string()),
        )
        .await;

    assert_matches!(result, Err(SchedulingError::CannotCancelCompleted));
}

#[tokio::test]
async fn upcoming_appointments_query_is_scoped_to_open_statuses() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("status", "in.(scheduled,confirmed)"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::appointment(
            "9c1d3f5b-3333-4eee-7777-cccccccccccc",
            "7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa",
            MONDAY,
            "09:00",
            "scheduled",
            "unbilled",
        )]))
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = BookingService::new(&config);

    let upcoming = service
        .upcoming_for_customer(Uuid::parse_str("7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa").unwrap())
        .await
        .unwrap();
    assert_eq!(upcoming.len(), 1);
}

#[tokio::test]
async fn reminder_flag_race_sends_nothing_for_the_loser() {
    let server = MockServer::start().await;

    let start = Utc::now() + chrono::Duration::hours(3);
    let date = start.date_naive().to_string();

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![{
            let mut row = MockRows::appointment(
                "9c1d3f5b-3333-4eee-7777-cccccccccccc",
                "7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa",
                &date,
                "09:00",
                "scheduled",
                "unbilled",
            );
            row["scheduled_start"] = json!(start.to_rfc3339());
            row["scheduled_end"] =
                json!((start + chrono::Duration::minutes(50)).to_rfc3339());
            row
        }]))
        .mount(&server)
        .await;

    // Another sweep already claimed the flag: the conditional update matches
    // no rows, so no message goes out
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [] })))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let reminders = scheduling_cell::services::reminders::ReminderService::new(&config);

    let summary = reminders.sweep().await.unwrap();
    assert_eq!(summary.sent_24h + summary.sent_2h, 0);
}
