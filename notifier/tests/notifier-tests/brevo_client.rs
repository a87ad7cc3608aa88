use claims::{assert_err, assert_ok};
use od_notifier::adapters::brevo_email_client::BrevoEmailClient;
use od_notifier::domain::email_client::{AccountProbe, EmailClient, ErrorKind};
use od_notifier::domain::recipient_email::RecipientEmail;
use secrecy::Secret;
use std::time::Duration;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "xkeysib-integration";

fn client(server: &MockServer) -> BrevoEmailClient {
    BrevoEmailClient::new(
        server.uri(),
        RecipientEmail::parse("noreply@college.edu".to_string()).unwrap(),
        Some("OD Notifier".to_string()),
        Secret::new(API_KEY.to_string()),
        Duration::from_millis(300),
    )
    .unwrap()
}

async fn send(server: &MockServer) -> Result<(), od_notifier::domain::email_client::DeliveryError> {
    client(server)
        .send_email_to("meena@college.edu", "OD Notification", "<p>Hello</p>")
        .await
}

#[tokio::test]
async fn the_request_carries_the_api_key_and_the_brevo_body() {
    let server = MockServer::start().await;

    Mock::given(path("/smtp/email"))
        .and(method("POST"))
        .and(header("api-key", API_KEY))
        .and(body_partial_json(serde_json::json!({
            "sender": { "email": "noreply@college.edu", "name": "OD Notifier" },
            "to": [{ "email": "meena@college.edu" }],
            "subject": "OD Notification",
            "htmlContent": "<p>Hello</p>"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "messageId": "<201@smtp-relay.mailin.fr>"
        })))
        .expect(1)
        .mount(&server)
        .await;

    assert_ok!(send(&server).await);
}

async fn failure_kind(status: u16, body: serde_json::Value) -> ErrorKind {
    let server = MockServer::start().await;
    Mock::given(path("/smtp/email"))
        .and(method("POST"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    assert_err!(send(&server).await).kind
}

#[tokio::test]
async fn a_401_is_an_authentication_error() {
    let kind = failure_kind(
        401,
        serde_json::json!({ "code": "unauthorized", "message": "Key not found" }),
    )
    .await;
    assert_eq!(kind, ErrorKind::AuthenticationError);
}

#[tokio::test]
async fn a_429_is_an_api_limit_error() {
    let kind = failure_kind(429, serde_json::json!({})).await;
    assert_eq!(kind, ErrorKind::ApiLimitExceeded);
}

#[tokio::test]
async fn missing_credits_are_an_api_limit_error() {
    let kind = failure_kind(
        402,
        serde_json::json!({ "code": "not_enough_credits", "message": "Not enough credits" }),
    )
    .await;
    assert_eq!(kind, ErrorKind::ApiLimitExceeded);
}

#[tokio::test]
async fn an_unverified_sender_is_a_validation_error() {
    let kind = failure_kind(
        400,
        serde_json::json!({ "code": "invalid_parameter", "message": "sender not verified" }),
    )
    .await;
    assert_eq!(kind, ErrorKind::ValidationError);
}

#[tokio::test]
async fn a_server_error_is_unknown() {
    let kind = failure_kind(500, serde_json::json!({ "message": "Internal error" })).await;
    assert_eq!(kind, ErrorKind::UnknownError);
}

#[tokio::test]
async fn a_slow_provider_is_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(path("/smtp/email"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(10)))
        .expect(1)
        .mount(&server)
        .await;

    let error = assert_err!(send(&server).await);
    assert_eq!(error.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn an_unreachable_provider_is_a_network_error() {
    // Nothing listens on port 1.
    let client = BrevoEmailClient::new(
        "http://127.0.0.1:1".to_string(),
        RecipientEmail::parse("noreply@college.edu".to_string()).unwrap(),
        None,
        Secret::new(API_KEY.to_string()),
        Duration::from_millis(300),
    )
    .unwrap();

    let error = assert_err!(
        client
            .send_email_to("meena@college.edu", "s", "<p>h</p>")
            .await
    );
    assert_eq!(error.kind, ErrorKind::NetworkError);
}

#[tokio::test]
async fn the_account_probe_reports_plan_and_credits() {
    let server = MockServer::start().await;
    Mock::given(path("/account"))
        .and(method("GET"))
        .and(header("api-key", API_KEY))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "email": "owner@college.edu",
            "companyName": "College",
            "plan": [
                { "type": "free", "creditsType": "sendLimit", "credits": 287 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let account = assert_ok!(client(&server).account().await);
    assert_eq!(account.email, "owner@college.edu");
    assert_eq!(account.company.as_deref(), Some("College"));
    assert_eq!(account.plan.as_deref(), Some("free"));
    assert_eq!(account.credits, Some(287.0));
}

#[tokio::test]
async fn a_rejected_key_fails_the_account_probe() {
    let server = MockServer::start().await;
    Mock::given(path("/account"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(serde_json::json!({ "code": "unauthorized", "message": "Key not found" })),
        )
        .mount(&server)
        .await;

    let error = assert_err!(client(&server).account().await);
    assert_eq!(error.kind, ErrorKind::AuthenticationError);
}
