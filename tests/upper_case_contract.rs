//! upper_case_string contract tests
//!
//! End-to-end through the client and both transports: the reply equals the
//! uppercased input, arrives exactly once, and concurrent calls do not
//! interfere with each other.

use std::sync::Arc;
use std::time::Duration;

use bricks_helper::host::ClientError;
use bricks_helper::{HelperClient, InProcessTransport, StreamTransport};
use bricks_protocol::ops::names;
use bricks_protocol::{ErrorCode, HelperProtocol, Reply, RpcRequest};
use bricks_service::{RpcHandler, ServiceConfig};
use serde_json::json;
use tokio::io::{duplex, split, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Notify;

async fn in_process_client() -> HelperClient {
    let mut client = HelperClient::new(Arc::new(InProcessTransport::default()));
    client.probe().await.unwrap();
    client
}

/// Client talking line-delimited JSON to a `serve` loop over an in-memory pipe.
async fn stream_client(handler: RpcHandler) -> HelperClient {
    let (client_io, service_io) = duplex(64 * 1024);
    let (service_read, mut service_write) = split(service_io);
    tokio::spawn(async move {
        handler
            .serve(BufReader::new(service_read), &mut service_write)
            .await
    });

    let (read, write) = split(client_io);
    let transport = StreamTransport::from_io(read, write, Duration::from_secs(5));
    let mut client = HelperClient::new(Arc::new(transport));
    client.probe().await.unwrap();
    client
}

// =============================================================================
// Transformation
// =============================================================================

#[tokio::test]
async fn test_examples() {
    let client = in_process_client().await;

    for (input, expected) in [
        ("hello", "HELLO"),
        ("", ""),
        ("Hello World 123!", "HELLO WORLD 123!"),
        ("ABC", "ABC"),
    ] {
        assert_eq!(client.upper_case_string(input).await.unwrap(), expected, "input {:?}", input);
    }
}

#[tokio::test]
async fn test_examples_over_stream() {
    let client = stream_client(RpcHandler::new(ServiceConfig::default())).await;

    assert_eq!(client.upper_case_string("hello").await.unwrap(), "HELLO");
    assert_eq!(client.upper_case_string("").await.unwrap(), "");
    assert_eq!(
        client.upper_case_string("Hello World 123!").await.unwrap(),
        "HELLO WORLD 123!"
    );
}

#[tokio::test]
async fn test_idempotent() {
    let client = in_process_client().await;

    for input in ["mixed Case", "ß and ﬁ", "déjà vu"] {
        let once = client.upper_case_string(input).await.unwrap();
        let twice = client.upper_case_string(&once).await.unwrap();
        assert_eq!(once, twice);
    }
}

#[tokio::test]
async fn test_full_unicode_mapping() {
    let client = in_process_client().await;

    // Length may change under full case mapping.
    assert_eq!(client.upper_case_string("straße").await.unwrap(), "STRASSE");
    assert_eq!(client.upper_case_string("ǆ").await.unwrap(), "Ǆ");
}

// =============================================================================
// Exactly one reply
// =============================================================================

#[tokio::test]
async fn test_serve_writes_exactly_one_response_per_request() {
    let (client_io, service_io) = duplex(64 * 1024);
    let (service_read, mut service_write) = split(service_io);
    let service = tokio::spawn(async move {
        RpcHandler::new(ServiceConfig::default())
            .serve(BufReader::new(service_read), &mut service_write)
            .await
    });

    let (read, mut write) = split(client_io);
    for (i, text) in ["a", "b", "c"].iter().enumerate() {
        let request = RpcRequest::new(1, names::UPPER_CASE_STRING, format!("r{}", i), json!({ "string": text }));
        let mut line = serde_json::to_string(&request).unwrap();
        line.push('\n');
        write.write_all(line.as_bytes()).await.unwrap();
    }
    write.shutdown().await.unwrap();

    let mut lines = BufReader::new(read).lines();
    let mut ids = Vec::new();
    while let Some(line) = lines.next_line().await.unwrap() {
        let response: serde_json::Value = serde_json::from_str(&line).unwrap();
        assert_eq!(response["ok"], true);
        ids.push(response["request_id"].as_str().unwrap().to_string());
    }
    service.await.unwrap().unwrap();

    ids.sort();
    assert_eq!(ids, vec!["r0", "r1", "r2"]);
}

/// Drops the reply without calling it.
struct Forgetful;

impl HelperProtocol for Forgetful {
    fn upper_case_string(&self, _input: String, reply: Reply<String>) {
        drop(reply);
    }
}

#[tokio::test]
async fn test_dropped_reply_is_reported() {
    let handler = RpcHandler::with_service(ServiceConfig::default(), Arc::new(Forgetful));
    let mut client = HelperClient::new(Arc::new(InProcessTransport::with_handler(handler)));
    client.probe().await.unwrap();

    let err = client.upper_case_string("hello").await.unwrap_err();

    assert!(matches!(err, ClientError::ReplyDropped));
    assert_eq!(err.exit_code(), 50);
}

#[tokio::test]
async fn test_dropped_reply_on_the_wire() {
    let handler = RpcHandler::with_service(ServiceConfig::default(), Arc::new(Forgetful));
    let request = RpcRequest::new(1, names::UPPER_CASE_STRING, "lost-1", json!({ "string": "x" }));

    let response = handler.handle(request).await;

    assert!(!response.ok);
    assert_eq!(response.request_id, "lost-1");
    assert_eq!(response.error.unwrap().code, ErrorCode::ReplyDropped);
}

// =============================================================================
// Concurrency
// =============================================================================

/// Replies from a spawned task after a delay that shrinks with input length.
struct Staggered;

impl HelperProtocol for Staggered {
    fn upper_case_string(&self, input: String, reply: Reply<String>) {
        let delay = Duration::from_millis(5 * (10 - input.len().min(10)) as u64);
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            reply.send(input.to_uppercase());
        });
    }
}

#[tokio::test]
async fn test_concurrent_calls_do_not_interfere() {
    let handler = RpcHandler::with_service(ServiceConfig::default(), Arc::new(Staggered));
    let client = stream_client(handler).await;

    let inputs: Vec<String> = (0..10).map(|i| "x".repeat(i)).collect();
    let calls = inputs.iter().map(|input| client.upper_case_string(input));
    let replies = futures::future::join_all(calls).await;

    for (input, reply) in inputs.iter().zip(replies) {
        assert_eq!(reply.unwrap(), input.to_uppercase());
    }
}

/// Parks every reply until `release` fires; signals `entered` on each call.
struct Gated {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl HelperProtocol for Gated {
    fn upper_case_string(&self, input: String, reply: Reply<String>) {
        self.entered.notify_one();
        let release = Arc::clone(&self.release);
        tokio::spawn(async move {
            release.notified().await;
            reply.send(input.to_uppercase());
        });
    }
}

#[tokio::test]
async fn test_busy_when_in_flight_limit_reached() {
    let entered = Arc::new(Notify::new());
    let release = Arc::new(Notify::new());
    let gated = Gated {
        entered: Arc::clone(&entered),
        release: Arc::clone(&release),
    };
    let config = ServiceConfig::default().with_max_in_flight(1);
    let client = stream_client(RpcHandler::with_service(config, Arc::new(gated))).await;

    let (held, extra) = tokio::join!(client.upper_case_string("held"), async {
        entered.notified().await;
        let extra = client.upper_case_string("extra").await;
        release.notify_one();
        extra
    });

    assert_eq!(held.unwrap(), "HELD");
    let err = extra.unwrap_err();
    assert!(matches!(err, ClientError::Busy));
    assert_eq!(err.exit_code(), 90);
}

// =============================================================================
// Faults
// =============================================================================

/// Panics on "boom", uppercases anything else.
struct Panicky;

impl HelperProtocol for Panicky {
    fn upper_case_string(&self, input: String, reply: Reply<String>) {
        if input == "boom" {
            panic!("implementation fault");
        }
        reply.send(input.to_uppercase());
    }
}

#[tokio::test]
async fn test_panicking_implementation_gets_an_answer() {
    let handler = RpcHandler::with_service(ServiceConfig::default(), Arc::new(Panicky));
    let client = stream_client(handler).await;

    let (boom, fine) = tokio::join!(client.upper_case_string("boom"), client.upper_case_string("fine"));

    let err = boom.unwrap_err();
    assert!(matches!(err, ClientError::ServiceFault(_)));
    assert_eq!(err.exit_code(), 50);
    assert_eq!(fine.unwrap(), "FINE");

    // The serve loop keeps going after the fault.
    assert_eq!(client.upper_case_string("after").await.unwrap(), "AFTER");
}

// =============================================================================
// Limits and invalidation
// =============================================================================

#[tokio::test]
async fn test_oversized_input_is_rejected() {
    let config = ServiceConfig::default().with_max_input_bytes(8);
    let mut client = HelperClient::new(Arc::new(InProcessTransport::new(config)));
    client.probe().await.unwrap();

    assert_eq!(client.upper_case_string("eightchr").await.unwrap(), "EIGHTCHR");
    let err = client.upper_case_string("ninechars").await.unwrap_err();
    assert!(matches!(err, ClientError::PayloadTooLarge { max_bytes: 8 }));
}

#[tokio::test]
async fn test_invalidated_client_rejects_calls() {
    let client = stream_client(RpcHandler::new(ServiceConfig::default())).await;
    assert_eq!(client.upper_case_string("ok").await.unwrap(), "OK");

    client.invalidate().await;

    let err = client.upper_case_string("again").await.unwrap_err();
    assert!(matches!(err, ClientError::Invalidated));
}

#[tokio::test]
async fn test_configured_service_name_must_match() {
    let settings = bricks_helper::EffectiveConfig::build(
        None,
        Some(json!({ "service": { "name": "com.example.notBricks" } })),
    )
    .unwrap()
    .settings()
    .unwrap();

    let mut client = HelperClient::new(Arc::new(InProcessTransport::default()))
        .with_service_name(settings.service.name);

    let err = client.probe().await.unwrap_err();
    assert!(matches!(err, ClientError::ServiceIncompatible(_)));
}
