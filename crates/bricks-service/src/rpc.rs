//! Service RPC Handler
//!
//! Speaks the line-delimited JSON envelope on a byte stream:
//!
//!   bricks-service rpc     one request in, one response out
//!   bricks-service serve   many requests until EOF, one response each
//!
//! In serve mode every request runs as its own task and responses are
//! written in completion order, so callers correlate by `request_id`.

use std::io;
use std::sync::Arc;

use bricks_protocol::{
    ops::names, HelperProtocol, RpcError, RpcRequest, RpcResponse, PROTOCOL_VERSION_PROBE,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, Semaphore};
use tracing::{debug, error, info, warn};

use crate::config::ServiceConfig;
use crate::handlers;
use crate::helper::BricksHelper;

/// Request line bytes allowed on top of the escaped input string.
const ENVELOPE_ALLOWANCE: usize = 64 * 1024;

/// Main RPC handler for the service.
///
/// Cheap to clone; clones share the implementation and the in-flight bound.
#[derive(Clone)]
pub struct RpcHandler {
    config: Arc<ServiceConfig>,
    service: Arc<dyn HelperProtocol>,
    in_flight: Arc<Semaphore>,
}

impl RpcHandler {
    /// Create a handler backed by [`BricksHelper`].
    pub fn new(config: ServiceConfig) -> Self {
        Self::with_service(config, Arc::new(BricksHelper))
    }

    /// Create a handler backed by a custom implementation of the contract.
    pub fn with_service(config: ServiceConfig, service: Arc<dyn HelperProtocol>) -> Self {
        let in_flight = Arc::new(Semaphore::new(config.limits.max_in_flight.max(1)));
        Self {
            config: Arc::new(config),
            service,
            in_flight,
        }
    }

    /// Handle one request. Always yields exactly one response.
    pub async fn handle(&self, request: RpcRequest) -> RpcResponse {
        let _permit = match self.in_flight.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(request_id = %request.request_id, "rejecting request: at in-flight limit");
                return RpcResponse::error(
                    request.protocol_version,
                    request.request_id,
                    RpcError::busy(self.config.limits.max_in_flight),
                );
            }
        };

        if let Err(e) = self.validate_protocol_version(&request) {
            debug!(request_id = %request.request_id, error = %e, "protocol version rejected");
            return RpcResponse::error(request.protocol_version, request.request_id, e);
        }

        // A panicking implementation ends its task, not this response.
        let handler = self.clone();
        let protocol_version = request.protocol_version;
        let request_id = request.request_id.clone();
        match tokio::spawn(async move { handler.dispatch(&request).await }).await {
            Ok(response) => response,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "request handler faulted");
                RpcResponse::error(
                    protocol_version,
                    request_id,
                    RpcError::internal(format!("request handler faulted: {}", e)),
                )
            }
        }
    }

    /// Longest request line accepted before answering PAYLOAD_TOO_LARGE.
    ///
    /// JSON escaping can grow each input byte to six (`\u0000`), plus room
    /// for the envelope fields.
    fn max_line_bytes(&self) -> usize {
        let max_input = usize::try_from(self.config.limits.max_input_bytes).unwrap_or(usize::MAX);
        max_input.saturating_mul(6).saturating_add(ENVELOPE_ALLOWANCE)
    }

    /// Read a single request and write a single response.
    pub async fn run_once<R, W>(&self, reader: &mut R, writer: &mut W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = RequestLines::new(reader, self.max_line_bytes());
        let request = match lines.next_frame().await? {
            Some(Frame::Line(line)) => parse_request(&line),
            Some(Frame::Rejected(e)) => Err(e),
            None => Err(RpcError::invalid_request("unexpected EOF before request")),
        };

        let response = match request {
            Ok(request) => self.handle(request).await,
            // On parse error, return an error response with protocol_version: 0
            Err(e) => RpcResponse::error(PROTOCOL_VERSION_PROBE, String::new(), e),
        };
        write_response(writer, &response).await
    }

    /// Serve requests until the reader reaches EOF, then wait for every
    /// in-flight request to be answered.
    pub async fn serve<R, W>(&self, reader: R, writer: &mut W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<RpcResponse>();
        let mut tx = Some(tx);
        let mut lines = RequestLines::new(reader, self.max_line_bytes());
        let mut accepted: u64 = 0;

        info!(service = bricks_protocol::SERVICE_NAME, "serving");

        loop {
            tokio::select! {
                frame = lines.next_frame(), if tx.is_some() => {
                    match frame? {
                        Some(Frame::Line(line)) if line.trim().is_empty() => {}
                        Some(Frame::Line(line)) => {
                            if let Some(tx) = &tx {
                                accepted += 1;
                                self.accept(&line, tx);
                            }
                        }
                        Some(Frame::Rejected(e)) => {
                            warn!(error = %e, "rejecting request line");
                            if let Some(tx) = &tx {
                                let _ = tx.send(RpcResponse::error(PROTOCOL_VERSION_PROBE, String::new(), e));
                            }
                        }
                        None => {
                            debug!(accepted, "input closed, draining in-flight requests");
                            tx = None;
                        }
                    }
                }
                response = rx.recv() => match response {
                    Some(response) => write_response(writer, &response).await?,
                    None => break,
                },
            }
        }

        info!(accepted, "serve loop finished");
        Ok(())
    }

    /// Parse one line and spawn its handler; parse failures are answered
    /// directly.
    fn accept(&self, line: &str, tx: &mpsc::UnboundedSender<RpcResponse>) {
        let request = match parse_request(line) {
            Ok(request) => request,
            Err(e) => {
                warn!(error = %e, "unparseable request line");
                let _ = tx.send(RpcResponse::error(PROTOCOL_VERSION_PROBE, String::new(), e));
                return;
            }
        };

        let handler = self.clone();
        let tx = tx.clone();
        tokio::spawn(async move {
            let response = handler.handle(request).await;
            if tx.send(response).is_err() {
                warn!("response dropped: writer gone");
            }
        });
    }

    /// Validate the protocol version in the request.
    fn validate_protocol_version(&self, request: &RpcRequest) -> Result<(), RpcError> {
        // probe requests MUST use protocol_version: 0
        if request.op == names::PROBE {
            if request.protocol_version != PROTOCOL_VERSION_PROBE {
                return Err(RpcError::unsupported_protocol(
                    request.protocol_version,
                    PROTOCOL_VERSION_PROBE,
                    PROTOCOL_VERSION_PROBE,
                ));
            }
            return Ok(());
        }

        if request.protocol_version < self.config.protocol_min
            || request.protocol_version > self.config.protocol_max
        {
            return Err(RpcError::unsupported_protocol(
                request.protocol_version,
                self.config.protocol_min,
                self.config.protocol_max,
            ));
        }

        Ok(())
    }

    /// Dispatch the request to the appropriate operation handler.
    async fn dispatch(&self, request: &RpcRequest) -> RpcResponse {
        let protocol_version = if request.op == names::PROBE {
            PROTOCOL_VERSION_PROBE // probe responses must use protocol_version: 0
        } else {
            request.protocol_version
        };

        debug!(request_id = %request.request_id, op = %request.op, "dispatching");

        let result = match request.op.as_str() {
            names::PROBE => handlers::probe::handle(request, &self.config),
            names::UPPER_CASE_STRING => {
                handlers::upper_case::handle(request, &self.config, self.service.as_ref()).await
            }
            _ => Err(RpcError::unknown_operation(&request.op)),
        };

        match result {
            Ok(payload) => RpcResponse::success(
                protocol_version,
                request.request_id.clone(),
                payload,
            ),
            Err(e) => RpcResponse::error(
                protocol_version,
                request.request_id.clone(),
                e,
            ),
        }
    }
}

/// One line from the request stream.
enum Frame {
    Line(String),
    /// The line was consumed but cannot be parsed as a request.
    Rejected(RpcError),
}

/// Splits a byte stream into request lines of at most `max_line_bytes`.
///
/// Bytes past the limit are discarded as they arrive, so an oversized line
/// never sits in memory. Partial lines live in `self`, which keeps
/// `next_frame` cancel safe inside `select!`.
struct RequestLines<R> {
    reader: R,
    buf: Vec<u8>,
    len: usize,
    max_line_bytes: usize,
}

impl<R: AsyncBufRead + Unpin> RequestLines<R> {
    fn new(reader: R, max_line_bytes: usize) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            len: 0,
            max_line_bytes,
        }
    }

    /// Next line without its terminator, or None at EOF.
    async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            let available = self.reader.fill_buf().await?;
            if available.is_empty() {
                if self.len == 0 {
                    return Ok(None);
                }
                return Ok(Some(self.take_frame()));
            }

            let newline = available.iter().position(|&b| b == b'\n');
            let chunk = &available[..newline.unwrap_or(available.len())];
            if self.len + chunk.len() <= self.max_line_bytes {
                self.buf.extend_from_slice(chunk);
            }
            self.len += chunk.len();

            let used = chunk.len() + usize::from(newline.is_some());
            self.reader.consume(used);
            if newline.is_some() {
                return Ok(Some(self.take_frame()));
            }
        }
    }

    fn take_frame(&mut self) -> Frame {
        let len = std::mem::take(&mut self.len);
        let bytes = std::mem::take(&mut self.buf);
        if len > self.max_line_bytes {
            return Frame::Rejected(RpcError::payload_too_large(len as u64, self.max_line_bytes as u64));
        }
        match String::from_utf8(bytes) {
            Ok(line) => Frame::Line(line),
            Err(_) => Frame::Rejected(RpcError::invalid_request("request line is not valid UTF-8")),
        }
    }
}

fn parse_request(line: &str) -> Result<RpcRequest, RpcError> {
    serde_json::from_str(line).map_err(|e| RpcError::invalid_request(format!("invalid JSON: {}", e)))
}

/// Write one response line and flush.
async fn write_response<W: AsyncWrite + Unpin>(
    writer: &mut W,
    response: &RpcResponse,
) -> io::Result<()> {
    let mut json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    json.push('\n');
    writer.write_all(json.as_bytes()).await?;
    writer.flush().await
}
