use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::http::connection::Connection;
use crate::http::response::{DEFAULT_CONTENT_TYPE, Response};
use crate::http::status::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";

const CONTINUE_LINE: &[u8] = b"HTTP/1.1 100 Continue\r\n\r\n";

pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        HTTP_VERSION,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    // Body
    buf.extend_from_slice(&resp.body);

    buf
}

/// Sends the responses for one request.
///
/// At most one terminal response ever reaches the connection: the first
/// terminal send flips `sent` and closes the socket, every later one is a
/// no-op. The interim `100 Continue` does neither.
pub struct ResponseWriter {
    connection: Arc<Connection>,
    sent: AtomicBool,
}

impl ResponseWriter {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            sent: AtomicBool::new(false),
        }
    }

    pub fn connection(&self) -> &Arc<Connection> {
        &self.connection
    }

    pub fn is_sent(&self) -> bool {
        self.sent.load(Ordering::Acquire)
    }

    /// Sends a `text/plain` terminal response. Returns whether this call
    /// was the one that answered the request.
    pub fn send(&self, status: impl Into<StatusCode>, body: &str) -> bool {
        self.send_with_type(status, body, DEFAULT_CONTENT_TYPE)
    }

    pub fn send_with_type(
        &self,
        status: impl Into<StatusCode>,
        body: &str,
        content_type: &str,
    ) -> bool {
        let status = status.into();
        if status.is_informational() {
            tracing::warn!(
                status = status.as_u16(),
                "Refusing informational status as final response"
            );
            return false;
        }
        self.send_response(&Response::text(status, body, content_type))
    }

    /// Sends a fully built response as-is, without the status prefix on the
    /// body.
    pub fn send_response(&self, response: &Response) -> bool {
        if self
            .sent
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                peer = %self.connection.peer_addr(),
                status = response.status.as_u16(),
                "Response already sent, dropping"
            );
            return false;
        }

        let bytes = serialize_response(response);
        match self.connection.write_and_close(&bytes) {
            Ok(()) => tracing::info!(
                peer = %self.connection.peer_addr(),
                status = response.status.as_u16(),
                "Response sent"
            ),
            Err(e) => tracing::warn!(
                peer = %self.connection.peer_addr(),
                status = response.status.as_u16(),
                error = %e,
                "Failed to write response"
            ),
        }

        true
    }

    /// Writes the interim `100 Continue` status and leaves the connection
    /// open. Once a terminal response has claimed the connection this is a
    /// no-op, even when that response is still being written.
    pub fn send_continue(&self) -> std::io::Result<()> {
        if self.is_sent() {
            return Ok(());
        }
        match self.connection.write_all(CONTINUE_LINE) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotConnected && self.is_sent() => {
                return Ok(());
            }
            Err(e) => return Err(e),
        }
        tracing::debug!(peer = %self.connection.peer_addr(), "Sent 100 Continue");
        Ok(())
    }
}
