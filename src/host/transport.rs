//! Transport Layer for the Helper Client
//!
//! Abstracts the connection to the service. Provides:
//! - Transport trait: interface for request/response exchange
//! - InProcessTransport: hands requests straight to an in-process handler
//! - StreamTransport: line-delimited JSON over a byte stream, usually the
//!   stdin/stdout of a spawned `bricks-service serve`

use std::collections::HashMap;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bricks_protocol::{RpcRequest, RpcResponse};
use bricks_service::{RpcHandler, ServiceConfig};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Transport trait for request/response exchange
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request and wait for its single response
    async fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError>;

    /// Tear down the connection. Later calls fail with `Disconnected`.
    async fn close(&self) {}
}

/// Transport errors
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Failed to launch service: {0}")]
    Spawn(String),

    #[error("Disconnected: {0}")]
    Disconnected(String),

    #[error("Timed out after {0:?} waiting for reply")]
    Timeout(Duration),

    #[error("Request ID already in flight: {0}")]
    DuplicateRequestId(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Transport that calls an in-process [`RpcHandler`]
pub struct InProcessTransport {
    handler: RpcHandler,
}

impl InProcessTransport {
    /// Create a transport backed by a fresh handler with the given config
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_handler(RpcHandler::new(config))
    }

    /// Create a transport backed by a pre-configured handler
    pub fn with_handler(handler: RpcHandler) -> Self {
        Self { handler }
    }
}

impl Default for InProcessTransport {
    fn default() -> Self {
        Self::new(ServiceConfig::default())
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        Ok(self.handler.handle(request.clone()).await)
    }
}

/// Calls waiting for a response, keyed by request ID
#[derive(Default)]
struct PendingCalls {
    calls: HashMap<String, oneshot::Sender<RpcResponse>>,
    /// Set once the connection is gone; no new calls are accepted
    closed: Option<String>,
}

/// Transport over a line-delimited JSON byte stream.
///
/// Responses may arrive in any order; each is routed to its caller by
/// `request_id`. When the stream closes every waiting call fails with
/// [`TransportError::Disconnected`].
pub struct StreamTransport {
    writer: tokio::sync::Mutex<Box<dyn AsyncWrite + Send + Unpin>>,
    pending: Arc<Mutex<PendingCalls>>,
    call_timeout: Duration,
    reader_task: JoinHandle<()>,
    child: tokio::sync::Mutex<Option<Child>>,
}

impl StreamTransport {
    /// Wrap an already-connected reader/writer pair
    pub fn from_io<R, W>(reader: R, writer: W, call_timeout: Duration) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        let pending = Arc::new(Mutex::new(PendingCalls::default()));
        let reader_task = tokio::spawn(read_responses(reader, Arc::clone(&pending)));

        Self {
            writer: tokio::sync::Mutex::new(Box::new(writer)),
            pending,
            call_timeout,
            reader_task,
            child: tokio::sync::Mutex::new(None),
        }
    }

    /// Launch the service executable and talk to it over its stdin/stdout.
    ///
    /// The child is killed when the transport is dropped.
    pub fn spawn(program: &str, args: &[String], call_timeout: Duration) -> Result<Self, TransportError> {
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| TransportError::Spawn(format!("{}: {}", program, e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Spawn("child stdin not captured".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Spawn("child stdout not captured".to_string()))?;

        debug!(program, ?args, pid = ?child.id(), "service launched");

        let mut transport = Self::from_io(stdout, stdin, call_timeout);
        transport.child = tokio::sync::Mutex::new(Some(child));
        Ok(transport)
    }

    /// Number of calls currently waiting for a response
    pub fn pending_count(&self) -> usize {
        lock(&self.pending).calls.len()
    }

    fn forget(&self, request_id: &str) {
        lock(&self.pending).calls.remove(request_id);
    }

    fn closed_reason(&self) -> String {
        lock(&self.pending)
            .closed
            .clone()
            .unwrap_or_else(|| "connection closed".to_string())
    }
}

impl Drop for StreamTransport {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

#[async_trait]
impl Transport for StreamTransport {
    async fn execute(&self, request: &RpcRequest) -> Result<RpcResponse, TransportError> {
        let mut line = serde_json::to_string(request)?;
        line.push('\n');

        let (tx, rx) = oneshot::channel();
        {
            let mut pending = lock(&self.pending);
            if let Some(reason) = &pending.closed {
                return Err(TransportError::Disconnected(reason.clone()));
            }
            if pending.calls.contains_key(&request.request_id) {
                return Err(TransportError::DuplicateRequestId(request.request_id.clone()));
            }
            pending.calls.insert(request.request_id.clone(), tx);
        }

        let written = {
            let mut writer = self.writer.lock().await;
            match writer.write_all(line.as_bytes()).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            }
        };
        if let Err(e) = written {
            self.forget(&request.request_id);
            return Err(TransportError::Io(e));
        }

        match tokio::time::timeout(self.call_timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(TransportError::Disconnected(self.closed_reason())),
            Err(_) => {
                self.forget(&request.request_id);
                warn!(request_id = %request.request_id, timeout = ?self.call_timeout, "call timed out");
                Err(TransportError::Timeout(self.call_timeout))
            }
        }
    }

    async fn close(&self) {
        let abandoned = self.pending_count();
        if abandoned > 0 {
            debug!(abandoned, "failing calls still waiting on close");
        }
        close_pending(&self.pending, "connection invalidated");
        {
            let mut writer = self.writer.lock().await;
            if let Err(e) = writer.shutdown().await {
                debug!(error = %e, "shutdown of service input failed");
            }
        }

        // Closed input lets a serving child drain and exit on its own.
        if let Some(child) = self.child.lock().await.as_mut() {
            match tokio::time::timeout(self.call_timeout, child.wait()).await {
                Ok(Ok(status)) => debug!(%status, "service exited"),
                Ok(Err(e)) => warn!(error = %e, "waiting for service failed"),
                Err(_) => {
                    warn!("service did not exit after input closed; killing");
                    if let Err(e) = child.start_kill() {
                        warn!(error = %e, "kill failed");
                    }
                    if let Err(e) = child.wait().await {
                        warn!(error = %e, "reaping killed service failed");
                    }
                }
            }
        }
    }
}

/// Route response lines to their pending calls until the stream ends.
async fn read_responses<R: AsyncRead + Unpin>(reader: R, pending: Arc<Mutex<PendingCalls>>) {
    let mut lines = BufReader::new(reader).lines();

    let reason = loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => {}
            Ok(Some(line)) => {
                let response: RpcResponse = match serde_json::from_str(&line) {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(error = %e, "discarding unparseable response line");
                        continue;
                    }
                };
                let waiter = lock(&pending).calls.remove(&response.request_id);
                match waiter {
                    Some(tx) => {
                        // Receiver gone means the caller timed out.
                        let _ = tx.send(response);
                    }
                    None => warn!(
                        request_id = %response.request_id,
                        error = ?response.error,
                        "response matches no pending call"
                    ),
                }
            }
            Ok(None) => break "service closed the connection".to_string(),
            Err(e) => break format!("read error: {}", e),
        }
    };

    debug!(%reason, "response reader stopped");
    close_pending(&pending, &reason);
}

/// Mark the connection closed and fail every waiting call.
fn close_pending(pending: &Mutex<PendingCalls>, reason: &str) {
    let mut pending = lock(pending);
    if pending.closed.is_none() {
        pending.closed = Some(reason.to_string());
    }
    // Dropping the senders wakes each waiter with a receive error.
    pending.calls.clear();
}

fn lock(pending: &Mutex<PendingCalls>) -> MutexGuard<'_, PendingCalls> {
    pending.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bricks_protocol::ops::names;
    use serde_json::json;
    use tokio::io::{duplex, split};

    fn upper_request(id: &str, text: &str) -> RpcRequest {
        RpcRequest::new(1, names::UPPER_CASE_STRING, id, json!({ "string": text }))
    }

    /// Connect a StreamTransport to an in-process `serve` loop.
    fn connected(call_timeout: Duration) -> StreamTransport {
        let (client_io, service_io) = duplex(64 * 1024);
        let (service_read, mut service_write) = split(service_io);
        tokio::spawn(async move {
            RpcHandler::new(ServiceConfig::default())
                .serve(BufReader::new(service_read), &mut service_write)
                .await
        });
        let (read, write) = split(client_io);
        StreamTransport::from_io(read, write, call_timeout)
    }

    #[tokio::test]
    async fn test_in_process_execute() {
        let transport = InProcessTransport::default();
        let response = transport.execute(&upper_request("t-1", "hello")).await.unwrap();

        assert!(response.ok);
        assert_eq!(response.payload.unwrap()["string"], "HELLO");
    }

    #[tokio::test]
    async fn test_stream_round_trip() {
        let transport = connected(Duration::from_secs(5));
        let response = transport.execute(&upper_request("t-2", "abc")).await.unwrap();

        assert_eq!(response.request_id, "t-2");
        assert_eq!(response.payload.unwrap()["string"], "ABC");
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_concurrent_calls_are_correlated() {
        let transport = connected(Duration::from_secs(5));

        let inputs: Vec<String> = (0..16).map(|i| format!("item {}", i)).collect();
        let calls = inputs.iter().enumerate().map(|(i, text)| {
            let transport = &transport;
            async move {
                let request = upper_request(&format!("c-{}", i), text);
                transport.execute(&request).await.unwrap()
            }
        });
        let responses = futures::future::join_all(calls).await;

        for (i, response) in responses.into_iter().enumerate() {
            assert_eq!(response.request_id, format!("c-{}", i));
            assert_eq!(response.payload.unwrap()["string"], format!("ITEM {}", i));
        }
    }

    #[tokio::test]
    async fn test_disconnect_fails_pending_call() {
        let (client_io, service_io) = duplex(1024);
        let (read, write) = split(client_io);
        let transport = StreamTransport::from_io(read, write, Duration::from_secs(5));

        // Service side reads the request, then hangs up without answering.
        tokio::spawn(async move {
            let mut lines = BufReader::new(service_io).lines();
            let _ = lines.next_line().await;
        });

        let err = transport.execute(&upper_request("t-3", "x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected(_)));

        let err = transport.execute(&upper_request("t-4", "x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected(_)));
    }

    #[tokio::test]
    async fn test_timeout_removes_pending_call() {
        let (client_io, _service_io) = duplex(1024);
        let (read, write) = split(client_io);
        let transport = StreamTransport::from_io(read, write, Duration::from_millis(50));

        let err = transport.execute(&upper_request("t-5", "x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(_)));
        assert_eq!(transport.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_close_rejects_new_calls() {
        let transport = connected(Duration::from_secs(5));
        transport.close().await;

        let err = transport.execute(&upper_request("t-6", "x")).await.unwrap_err();
        match err {
            TransportError::Disconnected(reason) => assert!(reason.contains("invalidated")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_spawn_missing_program() {
        let result = StreamTransport::spawn(
            "/nonexistent/bricks-service",
            &["serve".to_string()],
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(TransportError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_waits_for_child_to_exit() {
        // `cat` exits once its input is closed.
        let transport = StreamTransport::spawn("cat", &[], Duration::from_secs(10)).unwrap();
        transport.close().await;

        let mut child = transport.child.lock().await;
        let status = child.as_mut().unwrap().try_wait().unwrap();
        assert!(status.expect("child reaped").success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_close_kills_child_that_ignores_input() {
        let transport =
            StreamTransport::spawn("sleep", &["30".to_string()], Duration::from_millis(100)).unwrap();
        let started = std::time::Instant::now();
        transport.close().await;

        assert!(started.elapsed() < Duration::from_secs(10));
        let mut child = transport.child.lock().await;
        let status = child.as_mut().unwrap().try_wait().unwrap();
        assert!(!status.expect("child reaped").success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_exit_fails_pending_call() {
        // `true` exits without reading its input.
        let transport = StreamTransport::spawn("true", &[], Duration::from_secs(10)).unwrap();

        let err = transport.execute(&upper_request("t-7", "x")).await.unwrap_err();
        assert!(matches!(err, TransportError::Disconnected(_) | TransportError::Io(_)));
    }
}
