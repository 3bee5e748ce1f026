use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use assert_matches::assert_matches;
use billing_cell::models::BillingError;
use billing_cell::services::invoicing::InvoicingService;
use billing_cell::services::reconcile::ReconcileService;
use billing_cell::services::sweep::BillingSweep;
use shared_utils::test_utils::{MockRows, TestConfig};

const APPOINTMENT_ID: &str = "9c1d3f5b-3333-4eee-7777-cccccccccccc";
const CUSTOMER_ID: &str = "7d8a1c6e-1111-4ccc-9999-aaaaaaaaaaaa";
const INVOICE_ID: &str = "4e5f6a7b-4444-4fff-6666-dddddddddddd";

fn appointment_id() -> Uuid {
    Uuid::parse_str(APPOINTMENT_ID).unwrap()
}

async fn mount_appointment(server: &MockServer, status: &str, payment_status: &str) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::appointment(
            APPOINTMENT_ID,
            CUSTOMER_ID,
            "2026-01-19",
            "09:00",
            status,
            payment_status,
        )]))
        .mount(server)
        .await;
}

#[tokio::test]
async fn invoices_require_a_completed_appointment() {
    let server = MockServer::start().await;
    mount_appointment(&server, "scheduled", "unbilled").await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = InvoicingService::new(&config);

    let result = service.generate_invoice(appointment_id()).await;
    assert_matches!(result, Err(BillingError::NotCompleted));
}

#[tokio::test]
async fn existing_invoice_is_returned_without_touching_the_provider() {
    let server = MockServer::start().await;
    mount_appointment(&server, "completed", "invoice_generated").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::invoice(
            INVOICE_ID,
            APPOINTMENT_ID,
            "pay_001",
            "pending",
        )]))
        .mount(&server)
        .await;

    // No provider call may happen
    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = InvoicingService::new(&config);

    let invoice = service.generate_invoice(appointment_id()).await.unwrap();
    assert_eq!(invoice.asaas_payment_id, "pay_001");
}

#[tokio::test]
async fn invoice_generation_bills_notifies_and_flips_payment_status() {
    let server = MockServer::start().await;
    mount_appointment(&server, "completed", "unbilled").await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&server)
        .await;

    let mut customer = MockRows::customer(CUSTOMER_ID, "5511999999999", "Maria Silva", "main_menu");
    customer["asaas_customer_id"] = json!("cus_001");
    Mock::given(method("GET"))
        .and(path("/rest/v1/customers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![customer]))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "pay_002",
            "status": "PENDING",
            "invoiceUrl": "https://pay.example/pay_002",
            "value": 200.0
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/payments/pay_002/pixQrCode"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "payload": "00020126pix" })),
        )
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![MockRows::invoice(
            INVOICE_ID,
            APPOINTMENT_ID,
            "pay_002",
            "pending",
        )]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("payment_status", "eq.unbilled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::appointment(
            APPOINTMENT_ID,
            CUSTOMER_ID,
            "2026-01-19",
            "09:00",
            "completed",
            "invoice_generated",
        )]))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_log"))
        .respond_with(ResponseTemplate::new(201).set_body_json(vec![json!({ "id": 1 })]))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/123456/messages"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "messages": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = InvoicingService::new(&config);

    let invoice = service.generate_invoice(appointment_id()).await.unwrap();
    assert_eq!(invoice.asaas_payment_id, "pay_002");
}

#[tokio::test]
async fn sweep_continues_past_a_failing_appointment() {
    let server = MockServer::start().await;

    // Two completed unbilled appointments; the invoice lookup fails for both,
    // the second failure must still be attempted
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("payment_status", "eq.unbilled"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![
            MockRows::appointment(
                APPOINTMENT_ID,
                CUSTOMER_ID,
                "2026-01-19",
                "09:00",
                "completed",
                "unbilled",
            ),
            MockRows::appointment(
                "4e5f6a7b-5555-4aaa-5555-eeeeeeeeeeee",
                CUSTOMER_ID,
                "2026-01-20",
                "10:00",
                "completed",
                "unbilled",
            ),
        ]))
        .mount(&server)
        .await;

    for (id, date, time) in [
        (APPOINTMENT_ID, "2026-01-19", "09:00"),
        ("4e5f6a7b-5555-4aaa-5555-eeeeeeeeeeee", "2026-01-20", "10:00"),
    ] {
        Mock::given(method("GET"))
            .and(path("/rest/v1/appointments"))
            .and(query_param("id", format!("eq.{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::appointment(
                id,
                CUSTOMER_ID,
                date,
                time,
                "completed",
                "unbilled",
            )]))
            .mount(&server)
            .await;
    }

    Mock::given(method("GET"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "message": "boom" })))
        .expect(2)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let sweep = BillingSweep::new(&config);

    let summary = sweep.run().await.unwrap();
    assert_eq!(summary.examined, 2);
    assert_eq!(summary.generated, 0);
    assert_eq!(summary.failed, 2);
}

#[tokio::test]
async fn payment_event_for_unknown_invoice_is_ignored() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<serde_json::Value>::new()))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = ReconcileService::new(&config);

    service
        .handle_payment_event("PAYMENT_RECEIVED", "pay_unknown", &json!({}))
        .await
        .unwrap();
}

#[tokio::test]
async fn payment_event_is_not_applied_without_its_audit_row() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![MockRows::invoice(
            INVOICE_ID,
            APPOINTMENT_ID,
            "pay_001",
            "pending",
        )]))
        .mount(&server)
        .await;

    // The trail write fails, so the transition may not run
    Mock::given(method("POST"))
        .and(path("/rest/v1/audit_log"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = ReconcileService::new(&config);

    let result = service
        .handle_payment_event("PAYMENT_RECEIVED", "pay_001", &json!({}))
        .await;
    assert_matches!(result, Err(BillingError::Database(_)));
}

#[tokio::test]
async fn regressing_payment_event_leaves_the_invoice_alone() {
    let server = MockServer::start().await;

    let mut invoice = MockRows::invoice(INVOICE_ID, APPOINTMENT_ID, "pay_001", "confirmed");
    invoice["paid_at"] = json!(chrono::Utc::now().to_rfc3339());
    Mock::given(method("GET"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![invoice]))
        .mount(&server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/invoices"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = TestConfig::all_on(&server.uri()).to_app_config();
    let service = ReconcileService::new(&config);

    service
        .handle_payment_event("PAYMENT_OVERDUE", "pay_001", &json!({}))
        .await
        .unwrap();
}
