use std::time::{Duration, Instant};

use url::Url;
use wiremock::{
    matchers::{body_json, method, path},
    Mock, MockServer, ResponseTemplate,
};

use super::{DispatchOutcome, OperatorClient};
use crate::settings::{DispatcherSettings, OperatorSettings};

const BACKOFF_BASE: Duration = Duration::from_millis(20);

fn operator(name: &str, base_url: &str, priority: u32) -> OperatorSettings {
    OperatorSettings {
        name: name.to_string(),
        url: Url::parse(&format!("{base_url}/send")).unwrap(),
        priority,
        timeout: Duration::from_secs(1),
    }
}

fn client(operators: Vec<OperatorSettings>) -> OperatorClient {
    OperatorClient::new(DispatcherSettings {
        operators,
        max_attempts: 3,
        backoff_base: BACKOFF_BASE,
    })
}

fn sent_body(message_id: &str) -> serde_json::Value {
    serde_json::json!({"status": "sent", "message_id": message_id})
}

#[tokio::test]
async fn first_operator_success() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .and(body_json(serde_json::json!({
            "phone_number": "+15551234567",
            "message": "hi",
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(sent_body("m1")))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(vec![operator("operator_1", &server.uri(), 1)]);
    let outcome = client.send("+15551234567", "hi").await;
    assert_eq!(
        outcome,
        DispatchOutcome::Sent {
            provider_message_id: Some("m1".to_string())
        }
    );
}

#[tokio::test]
async fn transport_errors_are_retried_with_backoff_then_failover() {
    let failing = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&failing)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sent_body("m2")))
        .expect(1)
        .mount(&healthy)
        .await;

    let client = client(vec![
        operator("operator_1", &failing.uri(), 1),
        operator("operator_2", &healthy.uri(), 2),
    ]);

    let started = Instant::now();
    let outcome = client.send("+15551234567", "hi").await;
    // two backoff sleeps on the failing operator: base and 2 * base
    assert!(started.elapsed() >= BACKOFF_BASE * 3);
    assert_eq!(
        outcome,
        DispatchOutcome::Sent {
            provider_message_id: Some("m2".to_string())
        }
    );
}

#[tokio::test]
async fn operator_reject_fails_over_without_retry() {
    let rejecting = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"status": "failed", "error": "invalid number"}),
        ))
        .expect(1)
        .mount(&rejecting)
        .await;

    let healthy = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sent_body("m3")))
        .expect(1)
        .mount(&healthy)
        .await;

    let client = client(vec![
        operator("operator_1", &rejecting.uri(), 1),
        operator("operator_2", &healthy.uri(), 2),
    ]);

    let outcome = client.send("+15551234567", "hi").await;
    assert_eq!(
        outcome,
        DispatchOutcome::Sent {
            provider_message_id: Some("m3".to_string())
        }
    );
}

#[tokio::test]
async fn all_operators_exhausted() {
    let first = MockServer::start().await;
    let second = MockServer::start().await;
    for server in [&first, &second] {
        Mock::given(method("POST"))
            .and(path("/send"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(server)
            .await;
    }

    let client = client(vec![
        operator("operator_1", &first.uri(), 1),
        operator("operator_2", &second.uri(), 2),
    ]);

    let outcome = client.send("+15551234567", "hi").await;
    assert_eq!(
        outcome,
        DispatchOutcome::Failed {
            error: "All operators failed after retries".to_string()
        }
    );
}

#[tokio::test]
async fn operators_are_tried_in_priority_order() {
    let low_priority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sent_body("low")))
        .expect(0)
        .mount(&low_priority)
        .await;

    let high_priority = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/send"))
        .respond_with(ResponseTemplate::new(200).set_body_json(sent_body("high")))
        .expect(1)
        .mount(&high_priority)
        .await;

    // configured out of order on purpose
    let client = client(vec![
        operator("operator_2", &low_priority.uri(), 2),
        operator("operator_1", &high_priority.uri(), 1),
    ]);

    let outcome = client.send("+15551234567", "hi").await;
    assert_eq!(
        outcome,
        DispatchOutcome::Sent {
            provider_message_id: Some("high".to_string())
        }
    );
}
