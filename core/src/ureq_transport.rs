//! Blocking `ureq` transport driven from one worker thread per call.
//!
//! # Design
//! `ureq` is synchronous, so each resumed task runs its exchange on a
//! dedicated thread and calls the completion from there. Non-2xx statuses are
//! returned as data, never as errors, so the router can classify them.
//!
//! The pending call sits in a shared slot. Whoever takes it first (the
//! worker, `cancel`, or a failed spawn) is the one that calls the completion,
//! which keeps delivery at exactly once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use ureq::typestate::WithBody;
use ureq::{Agent, Body, RequestBuilder};

use crate::error::TransportError;
use crate::http::{Headers, HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, TransportCompletion, TransportOutcome, TransportTask};

/// Production transport backed by `ureq`.
#[derive(Debug, Clone, Default)]
pub struct UreqTransport {
    user_agent: Option<String>,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send `User-Agent` on every request that does not set its own.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    fn task(
        &self,
        mut request: HttpRequest,
        payload: Option<Vec<u8>>,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask> {
        if let Some(user_agent) = &self.user_agent {
            request.set_header_if_absent("User-Agent", user_agent.clone());
        }
        Arc::new(UreqTask {
            call: Arc::new(Mutex::new(Some(PendingCall {
                request,
                payload,
                completion,
            }))),
            cancelled: Arc::new(AtomicBool::new(false)),
            resumed: AtomicBool::new(false),
        })
    }
}

impl Transport for UreqTransport {
    fn data_task(
        &self,
        request: HttpRequest,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask> {
        self.task(request, None, completion)
    }

    fn upload_task(
        &self,
        request: HttpRequest,
        payload: Option<Vec<u8>>,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask> {
        self.task(request, payload, completion)
    }
}

struct PendingCall {
    request: HttpRequest,
    payload: Option<Vec<u8>>,
    completion: TransportCompletion,
}

type CallSlot = Arc<Mutex<Option<PendingCall>>>;

fn take(slot: &CallSlot) -> Option<PendingCall> {
    slot.lock().unwrap_or_else(PoisonError::into_inner).take()
}

struct UreqTask {
    call: CallSlot,
    cancelled: Arc<AtomicBool>,
    resumed: AtomicBool,
}

impl TransportTask for UreqTask {
    fn resume(&self) {
        if self.resumed.swap(true, Ordering::SeqCst) {
            return;
        }
        let call = Arc::clone(&self.call);
        let cancelled = Arc::clone(&self.cancelled);
        let spawned = thread::Builder::new()
            .name("request-core-transport".to_string())
            .spawn(move || {
                let Some(pending) = take(&call) else {
                    return;
                };
                let outcome = execute(&pending.request, pending.payload.as_deref());
                if cancelled.load(Ordering::SeqCst) {
                    (pending.completion)(TransportOutcome::failed(TransportError::Cancelled));
                } else {
                    (pending.completion)(outcome);
                }
            });

        if let Err(e) = spawned {
            tracing::warn!(
                target: "request_core::transport",
                err=%e,
                "could not spawn transport worker"
            );
            if let Some(pending) = take(&self.call) {
                (pending.completion)(TransportOutcome::failed(TransportError::Other(format!(
                    "could not spawn transport worker: {e}"
                ))));
            }
        }
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        if let Some(pending) = take(&self.call) {
            (pending.completion)(TransportOutcome::failed(TransportError::Cancelled));
        }
    }
}

/// Run one exchange. An explicit upload payload takes precedence over the
/// request body.
fn execute(request: &HttpRequest, payload: Option<&[u8]>) -> TransportOutcome {
    tracing::debug!(
        target: "request_core::transport",
        method=%request.method,
        url=%request.url,
        "executing request"
    );

    let agent: Agent = Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(request.timeout))
        .build()
        .new_agent();

    let url = request.url.as_str();
    let body = payload.or(request.body.as_deref());
    let result = match request.method {
        HttpMethod::Get => with_headers(agent.get(url), &request.headers).call(),
        HttpMethod::Head => with_headers(agent.head(url), &request.headers).call(),
        HttpMethod::Delete => with_headers(agent.delete(url), &request.headers).call(),
        HttpMethod::Post => send(with_headers(agent.post(url), &request.headers), body),
        HttpMethod::Put => send(with_headers(agent.put(url), &request.headers), body),
        HttpMethod::Patch => send(with_headers(agent.patch(url), &request.headers), body),
    };

    let mut response = match result {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(
                target: "request_core::transport",
                url=%request.url,
                err=%e,
                "request failed"
            );
            return TransportOutcome::failed(map_error(e));
        }
    };

    let headers: Headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_string(), value.to_string()))
        })
        .collect();
    let meta = HttpResponse {
        status: response.status().as_u16(),
        url: request.url.clone(),
        headers,
    };

    match response.body_mut().read_to_vec() {
        Ok(data) => TransportOutcome::completed(data, meta),
        Err(e) => TransportOutcome {
            data: None,
            response: Some(meta),
            error: Some(TransportError::Status(e.to_string())),
        },
    }
}

fn with_headers<B>(mut builder: RequestBuilder<B>, headers: &Headers) -> RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send(
    builder: RequestBuilder<WithBody>,
    body: Option<&[u8]>,
) -> Result<ureq::http::Response<Body>, ureq::Error> {
    match body {
        Some(bytes) => builder.send(bytes),
        None => builder.send_empty(),
    }
}

fn map_error(error: ureq::Error) -> TransportError {
    match error {
        ureq::Error::Timeout(_) => TransportError::Timeout,
        other => TransportError::Connection(other.to_string()),
    }
}
