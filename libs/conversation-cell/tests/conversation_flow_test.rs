use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use conversation_cell::services::orchestrator::Orchestrator;
use shared_utils::test_utils::{MockRows, TestConfig};

const CUSTOMER_ID: &str = "7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa";
const PHONE: &str = "5511999999999";
// 2026-01-19 is a Monday
const MONDAY: &str = "19/01/2026";

async fn mount_customer(server: &MockServer, row: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![row]))
        .mount(server)
        .await;
}

fn messages_ok() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "messages": [{ "id": "wamid.1" }] }))
}

#[tokio::test]
async fn first_contact_creates_the_customer_and_starts_registration() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![{
            let mut row = MockRows::customer(CUSTOMER_ID, PHONE, "Maria", "collecting_name");
            row["registration_complete"] = json!(false);
            row
        }]))
        .expect(1)
        .mount(&server)
        .await;

    // Welcome plus the name prompt
    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(messages_ok())
        .expect(2)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_arc();
    let orchestrator = Orchestrator::new(config);

    orchestrator
        .handle_inbound(PHONE, Some("Maria"), "oi")
        .await
        .unwrap();
}

#[tokio::test]
async fn menu_during_human_handoff_ends_the_handoff() {
    let server = MockServer::start().await;
    mount_customer(
        &server,
        MockRows::customer(CUSTOMER_ID, PHONE, "Maria Silva", "in_human_handoff"),
    )
    .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::customer(
            CUSTOMER_ID,
            PHONE,
            "Maria Silva",
            "main_menu",
        )]))
        .expect(1)
        .mount(&server)
        .await;

    // Handoff-ended notice plus the menu
    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(messages_ok())
        .expect(2)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_arc();
    let orchestrator = Orchestrator::new(config);

    orchestrator.handle_inbound(PHONE, None, "menu").await.unwrap();
}

#[tokio::test]
async fn other_messages_during_handoff_do_not_change_state() {
    let server = MockServer::start().await;
    mount_customer(
        &server,
        MockRows::customer(CUSTOMER_ID, PHONE, "Maria Silva", "in_human_handoff"),
    )
    .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(messages_ok())
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_arc();
    let orchestrator = Orchestrator::new(config);

    orchestrator
        .handle_inbound(PHONE, None, "ainda estou esperando")
        .await
        .unwrap();
}

#[tokio::test]
async fn invalid_cpf_is_reprompted_without_a_state_change() {
    let server = MockServer::start().await;
    let mut row = MockRows::customer(CUSTOMER_ID, PHONE, "Maria Silva", "collecting_tax_id");
    row["registration_complete"] = json!(false);
    row["cpf"] = json!(null);
    mount_customer(&server, row).await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(messages_ok())
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_arc();
    let orchestrator = Orchestrator::new(config);

    orchestrator
        .handle_inbound(PHONE, None, "123.456.789-00")
        .await
        .unwrap();
}

#[tokio::test]
async fn booking_date_lists_the_generated_slots() {
    let server = MockServer::start().await;
    mount_customer(
        &server,
        MockRows::customer(CUSTOMER_ID, PHONE, "Maria Silva", "booking_awaiting_date"),
    )
    .await;

    // Monday 08:00-10:00, 50-minute sessions with a 10-minute gap
    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::availability_rule(
            "2f3a4b5c-2222-4ddd-8888-bbbbbbbbbbbb",
            1,
            "08:00:00",
            "10:00:00",
            50,
            10,
        )]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/customers"))
        .and(query_param("conversation_state", "eq.booking_awaiting_date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::customer(
            CUSTOMER_ID,
            PHONE,
            "Maria Silva",
            "booking_awaiting_slot_choice",
        )]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .and(body_string_contains("08:00"))
        .and(body_string_contains("09:00"))
        .respond_with(messages_ok())
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_arc();
    let orchestrator = Orchestrator::new(config);

    orchestrator.handle_inbound(PHONE, None, MONDAY).await.unwrap();
}

#[tokio::test]
async fn booking_runs_from_menu_choice_to_a_scheduled_appointment() {
    let server = MockServer::start().await;

    // Each inbound message reads the customer once; the rows walk the flow
    // main_menu -> booking_awaiting_date -> booking_awaiting_slot_choice
    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::customer(
            CUSTOMER_ID,
            PHONE,
            "Maria Silva",
            "main_menu",
        )]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::customer(
            CUSTOMER_ID,
            PHONE,
            "Maria Silva",
            "booking_awaiting_date",
        )]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![{
            let mut row = MockRows::customer(
                CUSTOMER_ID,
                PHONE,
                "Maria Silva",
                "booking_awaiting_slot_choice",
            );
            row["flow_context"] = json!({
                "date": "2026-01-19",
                "slots": ["08:00", "09:00"],
            });
            row
        }]))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/availability_rules"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::availability_rule(
            "2f3a4b5c-2222-4ddd-8888-bbbbbbbbbbbb",
            1,
            "08:00:00",
            "10:00:00",
            50,
            10,
        )]))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "items": [] })))
        .mount(&server)
        .await;

    // State walks forward under the optimistic guards, then back to the menu
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/customers"))
        .and(query_param("conversation_state", "eq.main_menu"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::customer(
            CUSTOMER_ID,
            PHONE,
            "Maria Silva",
            "booking_awaiting_date",
        )]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/customers"))
        .and(query_param("conversation_state", "eq.booking_awaiting_date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::customer(
            CUSTOMER_ID,
            PHONE,
            "Maria Silva",
            "booking_awaiting_slot_choice",
        )]))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::customer(
            CUSTOMER_ID,
            PHONE,
            "Maria Silva",
            "main_menu",
        )]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/calendars/primary/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "evt-new" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_log"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![json!({ "id": 1 })]))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/appointments"))
        .and(wiremock::matchers::body_partial_json(json!({
            "customer_id": CUSTOMER_ID,
            "status": "scheduled",
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![MockRows::appointment(
            "9c1d3f5b-3333-4eee-7777-cccccccccccc",
            CUSTOMER_ID,
            "2026-01-19",
            "08:00",
            "scheduled",
            "unbilled",
        )]))
        .expect(1)
        .mount(&server)
        .await;

    // Date prompt, slot list, booking confirmation
    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(messages_ok())
        .expect(3)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_arc();
    let orchestrator = Orchestrator::new(config);

    orchestrator.handle_inbound(PHONE, None, "1").await.unwrap();
    orchestrator.handle_inbound(PHONE, None, MONDAY).await.unwrap();
    orchestrator.handle_inbound(PHONE, None, "1").await.unwrap();
}

#[tokio::test]
async fn past_booking_date_is_rejected_in_place() {
    let server = MockServer::start().await;
    mount_customer(
        &server,
        MockRows::customer(CUSTOMER_ID, PHONE, "Maria Silva", "booking_awaiting_date"),
    )
    .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(messages_ok())
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_arc();
    let orchestrator = Orchestrator::new(config);

    orchestrator
        .handle_inbound(PHONE, None, "01/01/2020")
        .await
        .unwrap();
}
