//! End-to-end HTTP tests against the in-memory backend
//!
//! Routing, auth, capability checks and the error envelope are exercised
//! through real requests; the storage semantics themselves are covered by
//! the adapter test suites.

use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use core_kernel::Actor;
use interface_api::{auth::create_token, config::ApiConfig, create_router, AppState};
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use test_utils::{ActorFixtures, IdFixtures, StringFixtures, WebhookDeliveryBuilder};

const JWT_SECRET: &str = "api-test-jwt-secret";

fn test_server() -> TestServer {
    let config = ApiConfig {
        jwt_secret: JWT_SECRET.to_string(),
        webhook_secret: StringFixtures::webhook_secret().to_string(),
        ..ApiConfig::default()
    };
    TestServer::new(create_router(AppState::in_memory(config))).expect("test server")
}

fn token_for(actor: &Actor) -> String {
    create_token(
        actor.staff_id(),
        actor.role(),
        actor.capabilities().clone(),
        JWT_SECRET,
        3600,
    )
    .expect("token")
}

fn signature_header(signature: &str) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-webhook-signature"),
        HeaderValue::from_str(signature).expect("header value"),
    )
}

async fn open_visit(server: &TestServer) -> String {
    let response = server
        .post("/api/v1/visits")
        .authorization_bearer(token_for(&ActorFixtures::front_desk()))
        .json(&json!({ "patient_id": IdFixtures::patient_id() }))
        .await;
    assert_eq!(response.status_code(), StatusCode::CREATED);
    let body = response.json::<Value>();
    body["id"].as_str().expect("visit id").to_string()
}

async fn record_charge(server: &TestServer, visit_id: &str, amount: &str) -> Value {
    let response = server
        .post(&format!("/api/v1/visits/{visit_id}/charges"))
        .authorization_bearer(token_for(&ActorFixtures::front_desk()))
        .json(&json!({
            "department": "consultation",
            "description": StringFixtures::charge_description(),
            "amount": amount,
        }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    response.json::<Value>()
}

#[tokio::test]
async fn test_health_endpoints_are_public() {
    let server = test_server();

    let health = server.get("/health").await;
    assert_eq!(health.status_code(), StatusCode::OK);
    assert_eq!(health.json::<Value>()["status"], "healthy");

    let ready = server.get("/health/ready").await;
    assert_eq!(ready.status_code(), StatusCode::OK);
    assert_eq!(ready.json::<Value>()["status"], "ready");
}

#[tokio::test]
async fn test_missing_token_is_rejected() {
    let server = test_server();
    let response = server
        .post("/api/v1/visits")
        .json(&json!({ "patient_id": IdFixtures::patient_id() }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"], "unauthorized");
}

#[tokio::test]
async fn test_garbage_token_is_rejected() {
    let server = test_server();
    let response = server
        .post("/api/v1/visits")
        .authorization_bearer("not-a-real-token")
        .json(&json!({ "patient_id": IdFixtures::patient_id() }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_missing_capability_is_403() {
    let server = test_server();
    let visit_id = open_visit(&server).await;

    // Front desk opens visits and records charges, but never takes money.
    let response = server
        .post(&format!("/api/v1/visits/{visit_id}/payments"))
        .authorization_bearer(token_for(&ActorFixtures::front_desk()))
        .json(&json!({ "amount": "100.00", "method": "CASH" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"], "forbidden");
}

#[tokio::test]
async fn test_actor_without_any_capability_is_403_everywhere() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    let token = token_for(&ActorFixtures::intruder());

    let billing = server
        .get(&format!("/api/v1/visits/{visit_id}/billing"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(billing.status_code(), StatusCode::FORBIDDEN);

    let audit = server
        .get(&format!("/api/v1/visits/{visit_id}/audit"))
        .authorization_bearer(&token)
        .await;
    assert_eq!(audit.status_code(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_visit_is_404() {
    let server = test_server();
    let response = server
        .get(&format!(
            "/api/v1/visits/{}/billing",
            IdFixtures::unknown_visit_id().as_uuid()
        ))
        .authorization_bearer(token_for(&ActorFixtures::billing_clerk()))
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"], "not_found");
}

#[tokio::test]
async fn test_charge_then_pay_then_close_happy_path() {
    let server = test_server();
    let visit_id = open_visit(&server).await;

    let charge = record_charge(&server, &visit_id, "5000.00").await;
    assert_eq!(charge["clearing"]["status_after"], "UNPAID");
    assert_eq!(charge["clearing"]["outstanding"], "5000.00");

    // A doctor asking the gate before payment gets a structured denial.
    let denied = server
        .post(&format!("/api/v1/visits/{visit_id}/gate-checks"))
        .authorization_bearer(token_for(&ActorFixtures::doctor()))
        .json(&json!({ "action": "clinical", "department": "laboratory" }))
        .await;
    assert_eq!(denied.status_code(), StatusCode::OK);
    let denied = denied.json::<Value>();
    assert_eq!(denied["decision"], "denied");
    assert_eq!(denied["kind"], "PAYMENT_NOT_CLEARED");
    assert!(denied["unlock_actions"]
        .as_array()
        .expect("unlock actions")
        .contains(&json!("collect_payment")));

    let payment = server
        .post(&format!("/api/v1/visits/{visit_id}/payments"))
        .authorization_bearer(token_for(&ActorFixtures::cashier()))
        .json(&json!({ "amount": "5000.00", "method": "CASH" }))
        .await;
    assert_eq!(payment.status_code(), StatusCode::OK);
    let payment = payment.json::<Value>();
    assert_eq!(payment["clearing"]["status_after"], "PAID");
    assert_eq!(payment["clearing"]["outstanding"], "0.00");
    assert!(payment["receipt_number"].as_str().is_some());

    // Same gate question now passes on the stored status.
    let allowed = server
        .post(&format!("/api/v1/visits/{visit_id}/gate-checks"))
        .authorization_bearer(token_for(&ActorFixtures::doctor()))
        .json(&json!({ "action": "clinical", "department": "laboratory" }))
        .await;
    assert_eq!(allowed.json::<Value>()["decision"], "allowed");

    let closed = server
        .post(&format!("/api/v1/visits/{visit_id}/close"))
        .authorization_bearer(token_for(&ActorFixtures::billing_clerk()))
        .await;
    assert_eq!(closed.status_code(), StatusCode::OK);
    let closed = closed.json::<Value>();
    assert_eq!(closed["state"], "CLOSED");
    assert_eq!(closed["payment_status"], "PAID");

    // The trail shows the whole story to an auditor.
    let audit = server
        .get(&format!("/api/v1/visits/{visit_id}/audit"))
        .authorization_bearer(token_for(&ActorFixtures::auditor()))
        .await;
    assert_eq!(audit.status_code(), StatusCode::OK);
    let entries = audit.json::<Value>()["entries"]
        .as_array()
        .expect("entries")
        .len();
    assert!(entries >= 3, "expected open, charge, payment and close entries");
}

#[tokio::test]
async fn test_close_with_outstanding_is_structured_402() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    record_charge(&server, &visit_id, "2500.00").await;

    let response = server
        .post(&format!("/api/v1/visits/{visit_id}/close"))
        .authorization_bearer(token_for(&ActorFixtures::billing_clerk()))
        .await;
    assert_eq!(response.status_code(), StatusCode::PAYMENT_REQUIRED);
    let body = response.json::<Value>();
    assert_eq!(body["error"], "payment_not_cleared");
    assert_eq!(body["details"]["kind"], "PAYMENT_NOT_CLEARED");
    assert_eq!(body["details"]["outstanding"], "2500.00");
    assert_eq!(body["details"]["stored_status"], "UNPAID");
    assert_eq!(
        body["details"]["unlock_actions"],
        json!(["collect_payment", "debit_wallet"])
    );
}

#[tokio::test]
async fn test_payment_methods_with_dedicated_flows_are_rejected() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    record_charge(&server, &visit_id, "1000.00").await;

    for method in ["GATEWAY", "WALLET", "INSURANCE"] {
        let response = server
            .post(&format!("/api/v1/visits/{visit_id}/payments"))
            .authorization_bearer(token_for(&ActorFixtures::cashier()))
            .json(&json!({ "amount": "1000.00", "method": method }))
            .await;
        assert_eq!(
            response.status_code(),
            StatusCode::UNPROCESSABLE_ENTITY,
            "method {method} must be rejected at the desk"
        );
    }
}

#[tokio::test]
async fn test_charge_reversal_restores_balance() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    let charge = record_charge(&server, &visit_id, "1200.00").await;
    let charge_id = charge["id"].as_str().expect("charge id");

    let reversal = server
        .post(&format!(
            "/api/v1/visits/{visit_id}/charges/{charge_id}/reversals"
        ))
        .authorization_bearer(token_for(&ActorFixtures::front_desk()))
        .await;
    assert_eq!(reversal.status_code(), StatusCode::OK);
    let reversal = reversal.json::<Value>();
    assert_eq!(reversal["amount"], "-1200.00");
    assert_eq!(reversal["reverses"], json!(charge_id));
    assert_eq!(reversal["clearing"]["outstanding"], "0.00");

    // A second reversal of the same charge is a conflict.
    let again = server
        .post(&format!(
            "/api/v1/visits/{visit_id}/charges/{charge_id}/reversals"
        ))
        .authorization_bearer(token_for(&ActorFixtures::front_desk()))
        .await;
    assert_eq!(again.status_code(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_wallet_flow_with_insufficient_balance_conflict() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    record_charge(&server, &visit_id, "5000.00").await;
    let cashier = token_for(&ActorFixtures::cashier());

    let wallet = server
        .post("/api/v1/wallets")
        .authorization_bearer(&cashier)
        .json(&json!({ "patient_id": IdFixtures::patient_id() }))
        .await;
    assert_eq!(wallet.status_code(), StatusCode::CREATED);
    let wallet_id = wallet.json::<Value>()["id"]
        .as_str()
        .expect("wallet id")
        .to_string();

    let credit = server
        .post(&format!("/api/v1/wallets/{wallet_id}/credits"))
        .authorization_bearer(&cashier)
        .json(&json!({ "amount": "1000.00" }))
        .await;
    assert_eq!(credit.status_code(), StatusCode::OK);
    assert_eq!(credit.json::<Value>()["wallet"]["balance"], "1000.00");

    // Asking for more than the balance is refused atomically.
    let refused = server
        .post(&format!("/api/v1/visits/{visit_id}/wallet-debits"))
        .authorization_bearer(&cashier)
        .json(&json!({ "wallet_id": wallet_id, "amount": "1500.00" }))
        .await;
    assert_eq!(refused.status_code(), StatusCode::CONFLICT);
    let refused = refused.json::<Value>();
    assert_eq!(refused["details"]["kind"], "INSUFFICIENT_BALANCE");
    assert_eq!(refused["details"]["available"], "1000.00");
    assert_eq!(refused["details"]["requested"], "1500.00");

    // Balance is untouched by the refused debit.
    let after = server
        .get(&format!("/api/v1/wallets/{wallet_id}"))
        .authorization_bearer(&cashier)
        .await;
    assert_eq!(after.json::<Value>()["balance"], "1000.00");

    let debit = server
        .post(&format!("/api/v1/visits/{visit_id}/wallet-debits"))
        .authorization_bearer(&cashier)
        .json(&json!({ "wallet_id": wallet_id, "amount": "1000.00" }))
        .await;
    assert_eq!(debit.status_code(), StatusCode::OK);
    let debit = debit.json::<Value>();
    assert_eq!(debit["balance_after"], "0.00");
    assert_eq!(debit["clearing"]["outstanding"], "4000.00");
}

#[tokio::test]
async fn test_insurance_settlement_path() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    record_charge(&server, &visit_id, "5000.00").await;
    let officer = token_for(&ActorFixtures::insurance_officer());

    let attached = server
        .post(&format!("/api/v1/visits/{visit_id}/insurance"))
        .authorization_bearer(&officer)
        .json(&json!({
            "provider_name": StringFixtures::provider_name(),
            "policy_number": StringFixtures::policy_number(),
            "coverage_amount": "3000.00",
        }))
        .await;
    assert_eq!(attached.status_code(), StatusCode::OK);
    let attached = attached.json::<Value>();
    assert_eq!(attached["status"], "PENDING");
    assert_eq!(attached["clearing"]["status_after"], "INSURANCE_PENDING");

    // Only one claim per visit.
    let second = server
        .post(&format!("/api/v1/visits/{visit_id}/insurance"))
        .authorization_bearer(&officer)
        .json(&json!({
            "provider_name": StringFixtures::provider_name(),
            "policy_number": "LHA-2024-009999",
            "coverage_amount": "1000.00",
        }))
        .await;
    assert_eq!(second.status_code(), StatusCode::CONFLICT);

    let approved = server
        .patch(&format!("/api/v1/visits/{visit_id}/insurance"))
        .authorization_bearer(&officer)
        .json(&json!({ "approve": true }))
        .await;
    assert_eq!(approved.status_code(), StatusCode::OK);
    let approved = approved.json::<Value>();
    assert_eq!(approved["status"], "APPROVED");
    assert_eq!(approved["clearing"]["status_after"], "INSURANCE_CLAIMED");
    assert_eq!(approved["clearing"]["outstanding"], "2000.00");

    // Patient pays the uncovered share and the visit settles.
    let payment = server
        .post(&format!("/api/v1/visits/{visit_id}/payments"))
        .authorization_bearer(token_for(&ActorFixtures::cashier()))
        .json(&json!({ "amount": "2000.00", "method": "CASH" }))
        .await;
    assert_eq!(payment.json::<Value>()["clearing"]["status_after"], "SETTLED");

    let summary = server
        .get(&format!("/api/v1/visits/{visit_id}/billing"))
        .authorization_bearer(&officer)
        .await;
    let summary = summary.json::<Value>();
    assert_eq!(summary["stored_status"], "SETTLED");
    assert_eq!(summary["patient_payable"], "2000.00");
    assert_eq!(summary["approved_coverage"], "3000.00");
    assert_eq!(summary["outstanding"], "0.00");

    let closed = server
        .post(&format!("/api/v1/visits/{visit_id}/close"))
        .authorization_bearer(token_for(&ActorFixtures::billing_clerk()))
        .await;
    assert_eq!(closed.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_insurance_coverage_takes_amount_or_percent() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    record_charge(&server, &visit_id, "8000.00").await;
    let officer = token_for(&ActorFixtures::insurance_officer());

    // Both or neither coverage field is a validation error.
    let both = server
        .post(&format!("/api/v1/visits/{visit_id}/insurance"))
        .authorization_bearer(&officer)
        .json(&json!({
            "provider_name": StringFixtures::provider_name(),
            "policy_number": StringFixtures::policy_number(),
            "coverage_amount": "3000.00",
            "coverage_percent": "50",
        }))
        .await;
    assert_eq!(both.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let neither = server
        .post(&format!("/api/v1/visits/{visit_id}/insurance"))
        .authorization_bearer(&officer)
        .json(&json!({
            "provider_name": StringFixtures::provider_name(),
            "policy_number": StringFixtures::policy_number(),
        }))
        .await;
    assert_eq!(neither.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    let attached = server
        .post(&format!("/api/v1/visits/{visit_id}/insurance"))
        .authorization_bearer(&officer)
        .json(&json!({
            "provider_name": StringFixtures::provider_name(),
            "policy_number": StringFixtures::policy_number(),
            "coverage_percent": "75",
        }))
        .await;
    assert_eq!(attached.status_code(), StatusCode::OK);
    assert_eq!(attached.json::<Value>()["coverage_kind"], "PERCENT");

    let approved = server
        .patch(&format!("/api/v1/visits/{visit_id}/insurance"))
        .authorization_bearer(&officer)
        .json(&json!({ "approve": true }))
        .await;
    // 75% of 8000 leaves a 2000 copay
    assert_eq!(approved.json::<Value>()["clearing"]["outstanding"], "2000.00");
}

#[tokio::test]
async fn test_approval_withdrawal_is_rejected() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    let response = server
        .patch(&format!("/api/v1/visits/{visit_id}/insurance"))
        .authorization_bearer(token_for(&ActorFixtures::insurance_officer()))
        .json(&json!({ "approve": false }))
        .await;
    assert_eq!(response.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_webhook_rejects_missing_and_bad_signatures() {
    let server = test_server();

    let delivery = WebhookDeliveryBuilder::success("gw_feedfacecafebeef", dec!(1000.00))
        .sign(StringFixtures::webhook_secret());

    // No signature header at all.
    let missing = server
        .post("/api/v1/webhooks/gateway")
        .bytes(delivery.body.clone().into())
        .content_type("application/json")
        .await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    // Signed with the wrong secret.
    let forged = WebhookDeliveryBuilder::success("gw_feedfacecafebeef", dec!(1000.00))
        .sign("whsec_wrong_secret");
    let (name, value) = signature_header(&forged.signature);
    let rejected = server
        .post("/api/v1/webhooks/gateway")
        .add_header(name, value)
        .bytes(forged.body.into())
        .content_type("application/json")
        .await;
    assert_eq!(rejected.status_code(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_webhook_settles_once_and_replays_report_already_verified() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    record_charge(&server, &visit_id, "5000.00").await;

    let intent = server
        .post(&format!("/api/v1/visits/{visit_id}/gateway-intents"))
        .authorization_bearer(token_for(&ActorFixtures::cashier()))
        .json(&json!({ "amount": "5000.00", "provider": "flutterwave" }))
        .await;
    assert_eq!(intent.status_code(), StatusCode::CREATED);
    let reference = intent.json::<Value>()["external_reference"]
        .as_str()
        .expect("reference")
        .to_string();

    let delivery = WebhookDeliveryBuilder::success(&reference, dec!(5000.00))
        .sign(StringFixtures::webhook_secret());

    let (name, value) = signature_header(&delivery.signature);
    let first = server
        .post("/api/v1/webhooks/gateway")
        .add_header(name, value)
        .bytes(delivery.body.clone().into())
        .content_type("application/json")
        .await;
    assert_eq!(first.status_code(), StatusCode::OK);
    let first = first.json::<Value>();
    assert_eq!(first["outcome"], "verified_once");
    assert_eq!(first["intent"]["state"], "SETTLED");
    let payment_id = first["payment_id"].as_str().expect("payment id").to_string();

    // Replay: same body, same signature. Conflict class, same payment.
    let (name, value) = signature_header(&delivery.signature);
    let replay = server
        .post("/api/v1/webhooks/gateway")
        .add_header(name, value)
        .bytes(delivery.body.clone().into())
        .content_type("application/json")
        .await;
    assert_eq!(replay.status_code(), StatusCode::CONFLICT);
    let replay = replay.json::<Value>();
    assert_eq!(replay["outcome"], "already_verified");
    assert_eq!(replay["payment_id"], json!(payment_id));

    // The money was counted exactly once.
    let summary = server
        .get(&format!("/api/v1/visits/{visit_id}/billing"))
        .authorization_bearer(token_for(&ActorFixtures::cashier()))
        .await;
    let summary = summary.json::<Value>();
    assert_eq!(summary["total_payments"], "5000.00");
    assert_eq!(summary["stored_status"], "PAID");
}

#[tokio::test]
async fn test_webhook_amount_mismatch_fails_definitively() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    record_charge(&server, &visit_id, "5000.00").await;

    let intent = server
        .post(&format!("/api/v1/visits/{visit_id}/gateway-intents"))
        .authorization_bearer(token_for(&ActorFixtures::cashier()))
        .json(&json!({ "amount": "5000.00", "provider": "flutterwave" }))
        .await;
    let reference = intent.json::<Value>()["external_reference"]
        .as_str()
        .expect("reference")
        .to_string();

    let delivery = WebhookDeliveryBuilder::success(&reference, dec!(5000.00))
        .with_amount(dec!(4999.00))
        .sign(StringFixtures::webhook_secret());

    let (name, value) = signature_header(&delivery.signature);
    let response = server
        .post("/api/v1/webhooks/gateway")
        .add_header(name, value)
        .bytes(delivery.body.into())
        .content_type("application/json")
        .await;
    // Definitive outcome: 200 so the provider stops retrying.
    assert_eq!(response.status_code(), StatusCode::OK);
    let body = response.json::<Value>();
    assert_eq!(body["outcome"], "failed");
    assert_eq!(body["intent"]["state"], "FAILED");

    let summary = server
        .get(&format!("/api/v1/visits/{visit_id}/billing"))
        .authorization_bearer(token_for(&ActorFixtures::cashier()))
        .await;
    assert_eq!(summary.json::<Value>()["total_payments"], "0.00");
}

#[tokio::test]
async fn test_webhook_unknown_reference_is_404() {
    let server = test_server();
    let delivery = WebhookDeliveryBuilder::success("gw_0000000000000000", dec!(100.00))
        .sign(StringFixtures::webhook_secret());

    let (name, value) = signature_header(&delivery.signature);
    let response = server
        .post("/api/v1/webhooks/gateway")
        .add_header(name, value)
        .bytes(delivery.body.into())
        .content_type("application/json")
        .await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mutations_on_closed_visit_are_409() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    let closed = server
        .post(&format!("/api/v1/visits/{visit_id}/close"))
        .authorization_bearer(token_for(&ActorFixtures::billing_clerk()))
        .await;
    assert_eq!(closed.status_code(), StatusCode::OK);

    let charge = server
        .post(&format!("/api/v1/visits/{visit_id}/charges"))
        .authorization_bearer(token_for(&ActorFixtures::front_desk()))
        .json(&json!({
            "department": "pharmacy",
            "description": "Post-closure medication",
            "amount": "100.00",
        }))
        .await;
    assert_eq!(charge.status_code(), StatusCode::CONFLICT);
    assert_eq!(charge.json::<Value>()["details"]["kind"], "VISIT_CLOSED");

    // Reads stay open after closure.
    let billing = server
        .get(&format!("/api/v1/visits/{visit_id}/billing"))
        .authorization_bearer(token_for(&ActorFixtures::billing_clerk()))
        .await;
    assert_eq!(billing.status_code(), StatusCode::OK);
}

#[tokio::test]
async fn test_validation_failures_are_422() {
    let server = test_server();
    let visit_id = open_visit(&server).await;
    let token = token_for(&ActorFixtures::front_desk());

    // Empty description fails DTO validation.
    let empty = server
        .post(&format!("/api/v1/visits/{visit_id}/charges"))
        .authorization_bearer(&token)
        .json(&json!({
            "department": "consultation",
            "description": "",
            "amount": "100.00",
        }))
        .await;
    assert_eq!(empty.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

    // Non-positive amount fails in the domain.
    let negative = server
        .post(&format!("/api/v1/visits/{visit_id}/charges"))
        .authorization_bearer(&token)
        .json(&json!({
            "department": "consultation",
            "description": StringFixtures::charge_description(),
            "amount": "-5.00",
        }))
        .await;
    assert_eq!(negative.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(negative.json::<Value>()["error"], "validation_error");
}
