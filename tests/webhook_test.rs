use std::time::Duration;

use nextcloud_talk_webhook::{
    compute_signature, server, sign, BotSecret, DeliveryError, ProbeConfig, TalkEvent,
    WebhookClient, DEFAULT_WEBHOOK_PATH, RANDOM_HEADER, SIGNATURE_HEADER,
};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

const SECRET: &str = "integration-test-shared-secret-of-sufficient-length";

struct TestServer {
    url: String,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    async fn start() -> Self {
        let config = ProbeConfig::default().with_secret(SECRET);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            server::serve(listener, &config, async move {
                let _ = rx.await;
            })
            .await
        });

        Self {
            url: format!("http://{addr}{DEFAULT_WEBHOOK_PATH}"),
            shutdown: Some(tx),
            handle,
        }
    }

    async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        let result = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not shut down");
        assert!(result.unwrap().is_ok());
    }
}

fn client_config() -> ProbeConfig {
    ProbeConfig::default()
        .with_secret(SECRET)
        .with_request_timeout(Duration::from_secs(5))
}

#[tokio::test]
async fn test_signed_request_is_echoed() {
    let server = TestServer::start().await;
    let event = TalkEvent::test_message();
    let body = event.to_body().unwrap();
    let signed = sign(&BotSecret::new(SECRET), body);

    let response = reqwest::Client::new()
        .post(&server.url)
        .header(RANDOM_HEADER, signed.nonce.as_str())
        .header(SIGNATURE_HEADER, &signed.signature)
        .header("Content-Type", "application/json")
        .body(signed.body.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);
    let echo: serde_json::Value = response.json().await.unwrap();
    assert_eq!(echo["status"], 200);
    assert_eq!(echo["text"], "OK");
    assert_eq!(echo["received_payload"], serde_json::to_value(&event).unwrap());

    server.stop().await;
}

#[tokio::test]
async fn test_uppercase_signature_is_accepted() {
    let server = TestServer::start().await;
    let signed = sign(&BotSecret::new(SECRET), br#"{"a":1}"#.to_vec());

    let response = reqwest::Client::new()
        .post(&server.url)
        .header(RANDOM_HEADER, signed.nonce.as_str())
        .header(SIGNATURE_HEADER, signed.signature.to_ascii_uppercase())
        .body(signed.body.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 200);

    server.stop().await;
}

#[tokio::test]
async fn test_wrong_signature_is_unauthorized() {
    let server = TestServer::start().await;
    let body = TalkEvent::test_message().to_body().unwrap();
    let nonce = "00".repeat(32);
    let wrong = compute_signature(b"some-other-secret", nonce.as_bytes(), &body);

    let response = reqwest::Client::new()
        .post(&server.url)
        .header(RANDOM_HEADER, &nonce)
        .header(SIGNATURE_HEADER, wrong)
        .body(body)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);
    assert_eq!(response.text().await.unwrap(), "Unauthorized");

    server.stop().await;
}

#[tokio::test]
async fn test_tampered_body_is_unauthorized() {
    let server = TestServer::start().await;
    let signed = sign(&BotSecret::new(SECRET), br#"{"type":"Create"}"#.to_vec());

    let response = reqwest::Client::new()
        .post(&server.url)
        .header(RANDOM_HEADER, signed.nonce.as_str())
        .header(SIGNATURE_HEADER, &signed.signature)
        .body(r#"{"type": "Create"}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);

    server.stop().await;
}

#[tokio::test]
async fn test_missing_headers_are_unauthorized() {
    let server = TestServer::start().await;

    let response = reqwest::Client::new()
        .post(&server.url)
        .body(r#"{"a":1}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(response.status().as_u16(), 401);

    server.stop().await;
}

#[tokio::test]
async fn test_signed_garbage_is_server_error() {
    let server = TestServer::start().await;
    let client = WebhookClient::new(&client_config());

    let report = client.send_raw(&server.url, "{ this is not json").await.unwrap();

    assert_eq!(report.status, 500);
    assert!(!report.is_success());
    assert!(!report.body.is_empty());

    server.stop().await;
}

#[tokio::test]
async fn test_client_against_local_server() {
    let server = TestServer::start().await;
    let client = WebhookClient::new(&client_config());

    let report = client
        .send_event(&server.url, &TalkEvent::test_message())
        .await
        .unwrap();

    assert_eq!(report.status, 200);
    assert!(report.is_success());
    assert!(report.body.contains(r#""status":200"#));
    assert!(report.body.chars().count() <= nextcloud_talk_webhook::client::REPORT_BODY_LIMIT);

    server.stop().await;
}

#[tokio::test]
async fn test_client_with_wrong_secret_reports_failure() {
    let server = TestServer::start().await;
    let config = client_config().with_secret("a-different-secret-than-the-server-uses!!");
    let client = WebhookClient::new(&config);

    let report = client
        .send_event(&server.url, &TalkEvent::test_message())
        .await
        .unwrap();

    assert_eq!(report.status, 401);
    assert!(!report.is_success());

    server.stop().await;
}

#[tokio::test]
async fn test_connection_refused_is_distinct() {
    // Grab a free port, then close it so nothing is listening.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let url = format!("http://{addr}{DEFAULT_WEBHOOK_PATH}");
    let client = WebhookClient::new(&client_config());

    let err = client
        .send_event(&url, &TalkEvent::test_message())
        .await
        .unwrap_err();

    assert_eq!(err, DeliveryError::ConnectionFailed { url });
}

#[tokio::test]
async fn test_silent_endpoint_times_out() {
    // Accept the connection but never answer.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let holder = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(Duration::from_secs(10)).await;
        drop(socket);
    });

    let config = client_config().with_request_timeout(Duration::from_millis(300));
    let client = WebhookClient::new(&config);
    let url = format!("http://{addr}{DEFAULT_WEBHOOK_PATH}");

    let started = std::time::Instant::now();
    let err = client
        .send_event(&url, &TalkEvent::test_message())
        .await
        .unwrap_err();

    assert_eq!(err, DeliveryError::Timeout);
    assert!(started.elapsed() < Duration::from_secs(5));

    holder.abort();
}
