//! Deadline-bounded handler execution.
//!
//! Every routed request goes through [`Dispatcher::dispatch`], which applies
//! the availability gate and the body-size guard, then runs the handler on
//! the blocking pool of the tokio runtime while a supervisor task waits on
//! it with a deadline. Whichever of completion, fault, or timeout is
//! observed first decides the fallback; the response writer's `sent` flag
//! guarantees only one terminal response reaches the client.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::config::DispatchConfig;
use crate::http::request::Request;
use crate::http::status::StatusCode;
use crate::http::writer::ResponseWriter;
use crate::server::registry::Handler;

/// A shared on/off switch, such as "service available".
#[derive(Debug, Clone)]
pub struct Gate(Arc<AtomicBool>);

impl Gate {
    pub fn new(open: bool) -> Self {
        Gate(Arc::new(AtomicBool::new(open)))
    }

    pub fn is_open(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub fn set(&self, open: bool) {
        self.0.store(open, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DispatchPolicy {
    pub deadline: Duration,
    pub max_body_bytes: usize,
}

impl From<&DispatchConfig> for DispatchPolicy {
    fn from(cfg: &DispatchConfig) -> Self {
        Self {
            deadline: cfg.deadline(),
            max_body_bytes: cfg.max_body_bytes,
        }
    }
}

/// How a dispatched request ended, from the dispatcher's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Turned away before the handler ran.
    Rejected(StatusCode),
    /// The handler returned and a response had been sent.
    Completed,
    /// The handler returned without sending anything.
    Unanswered,
    /// The handler failed or panicked.
    Failed,
    /// The deadline passed first; the handler was abandoned.
    TimedOut,
}

#[derive(Clone)]
pub struct Dispatcher {
    runtime: Handle,
    policy: DispatchPolicy,
    service: Gate,
}

impl Dispatcher {
    pub fn new(runtime: Handle, policy: DispatchPolicy, service: Gate) -> Self {
        Self {
            runtime,
            policy,
            service,
        }
    }

    pub fn policy(&self) -> DispatchPolicy {
        self.policy
    }

    /// Starts supervising `request`. Never blocks the caller.
    pub fn dispatch(
        &self,
        handler: Arc<dyn Handler>,
        request: Request,
        writer: Arc<ResponseWriter>,
    ) -> JoinHandle<DispatchOutcome> {
        let policy = self.policy;
        let service = self.service.clone();

        self.runtime.spawn(async move {
            if !service.is_open() {
                respond(writer, StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable").await;
                return DispatchOutcome::Rejected(StatusCode::SERVICE_UNAVAILABLE);
            }

            if request.body.len() > policy.max_body_bytes {
                respond(writer, StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large").await;
                return DispatchOutcome::Rejected(StatusCode::PAYLOAD_TOO_LARGE);
            }

            supervise(handler, request, writer, policy.deadline).await
        })
    }
}

async fn supervise(
    handler: Arc<dyn Handler>,
    request: Request,
    writer: Arc<ResponseWriter>,
    deadline: Duration,
) -> DispatchOutcome {
    let method = request.method;
    let path = request.path.clone();

    let task = {
        let writer = writer.clone();
        tokio::task::spawn_blocking(move || handler.handle(&request, &writer))
    };

    match tokio::time::timeout(deadline, task).await {
        Ok(Ok(Ok(()))) => {
            if writer.is_sent() {
                DispatchOutcome::Completed
            } else {
                tracing::error!(
                    %method,
                    path = %path,
                    "Handler returned without sending a response"
                );
                DispatchOutcome::Unanswered
            }
        }
        Ok(Ok(Err(e))) => {
            tracing::error!(%method, path = %path, error = %e, "Handler failed");
            respond(writer, StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").await;
            DispatchOutcome::Failed
        }
        Ok(Err(join_error)) => {
            tracing::error!(%method, path = %path, error = %join_error, "Handler panicked");
            respond(writer, StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").await;
            DispatchOutcome::Failed
        }
        Err(_) => {
            // The blocking task cannot be stopped; it runs on and its
            // writes fall on an already-answered writer.
            tracing::warn!(
                %method,
                path = %path,
                deadline_ms = deadline.as_millis() as u64,
                "Handler exceeded deadline"
            );
            respond(writer, StatusCode::GATEWAY_TIMEOUT, "Gateway Timeout").await;
            DispatchOutcome::TimedOut
        }
    }
}

/// Sends a fallback response unless one already went out.
async fn respond(writer: Arc<ResponseWriter>, status: StatusCode, body: &'static str) {
    if writer.is_sent() {
        return;
    }
    if let Err(e) = tokio::task::spawn_blocking(move || writer.send(status, body)).await {
        tracing::warn!(status = status.as_u16(), error = %e, "Fallback response task failed");
    }
}
