//! The `Expect: 100-continue` sub-protocol.
//!
//! ```text
//!   Start ──Expect ≠ 100-continue──▶ 417 ──────────────┐
//!     │                                                 ▼
//!     └─100 Continue─▶ AwaitBody ─drain─▶ Process ─▶  Done
//! ```
//!
//! The interim status does not count as the request's response, so the
//! terminal response after processing still goes through the writer's
//! at-most-once guard.

use std::time::Duration;

use crate::config::HandshakeConfig;
use crate::http::request::Request;
use crate::http::status::StatusCode;
use crate::http::writer::ResponseWriter;

enum HandshakeState {
    Start,
    AwaitBody,
    Process(String),
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct ContinueHandshake {
    poll_interval: Duration,
    process_delay: Duration,
    max_body_bytes: usize,
}

impl ContinueHandshake {
    pub fn new(poll_interval: Duration, process_delay: Duration, max_body_bytes: usize) -> Self {
        Self {
            poll_interval,
            process_delay,
            max_body_bytes,
        }
    }

    pub fn from_config(cfg: &HandshakeConfig, max_body_bytes: usize) -> Self {
        Self::new(cfg.poll_interval(), cfg.process_delay(), max_body_bytes)
    }

    /// Drives one request through the handshake. `process` receives the
    /// drained body and produces the terminal status and body.
    ///
    /// Errors from draining or processing are returned to the caller, which
    /// answers 500 if nothing was sent.
    pub fn run<F>(
        &self,
        request: &Request,
        writer: &ResponseWriter,
        process: F,
    ) -> anyhow::Result<()>
    where
        F: FnOnce(&str) -> anyhow::Result<(StatusCode, String)>,
    {
        let mut process = Some(process);
        let mut state = HandshakeState::Start;

        loop {
            state = match state {
                HandshakeState::Start => {
                    let wants_continue = request
                        .header("Expect")
                        .is_some_and(|v| v.trim().eq_ignore_ascii_case("100-continue"));

                    if wants_continue {
                        writer.send_continue()?;
                        HandshakeState::AwaitBody
                    } else {
                        writer.send(StatusCode::EXPECTATION_FAILED, "Expectation Failed");
                        HandshakeState::Done
                    }
                }

                HandshakeState::AwaitBody => {
                    let drained = writer
                        .connection()
                        .drain(self.poll_interval, self.max_body_bytes)?;

                    // Anything that rode along with the head comes first.
                    let mut body = request.body.clone();
                    body.push_str(&String::from_utf8_lossy(&drained));
                    tracing::debug!(bytes = body.len(), "Drained deferred request body");

                    if body.len() > self.max_body_bytes {
                        writer.send(StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large");
                        HandshakeState::Done
                    } else {
                        HandshakeState::Process(body)
                    }
                }

                HandshakeState::Process(body) => {
                    if !self.process_delay.is_zero() {
                        std::thread::sleep(self.process_delay);
                    }
                    let process = process
                        .take()
                        .ok_or_else(|| anyhow::anyhow!("handshake processed twice"))?;
                    let (status, message) = process(&body)?;
                    writer.send(status, &message);
                    HandshakeState::Done
                }

                HandshakeState::Done => return Ok(()),
            };
        }
    }
}
