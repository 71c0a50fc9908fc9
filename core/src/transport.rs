//! Transport abstraction.
//!
//! # Design
//! The router never talks to a networking stack directly. A `Transport`
//! creates suspended tasks for data and upload exchanges; the router resumes
//! them and receives exactly one `TransportOutcome` through the completion,
//! on whatever thread the transport chooses. Every call owns its own task,
//! so one transport instance can carry many outstanding calls.
//!
//! `send_blocking` is the only place the calling thread waits. The default
//! implementation parks on a one-shot channel, which cannot deadlock when a
//! transport fires its completion synchronously inside `data_task`.

use std::sync::mpsc;
use std::sync::Arc;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};

/// Raw result of one exchange: body bytes, response metadata and error, any
/// of which may be absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportOutcome {
    pub data: Option<Vec<u8>>,
    pub response: Option<HttpResponse>,
    pub error: Option<TransportError>,
}

impl TransportOutcome {
    pub fn completed(data: Vec<u8>, response: HttpResponse) -> Self {
        Self {
            data: Some(data),
            response: Some(response),
            error: None,
        }
    }

    pub fn failed(error: TransportError) -> Self {
        Self {
            data: None,
            response: None,
            error: Some(error),
        }
    }
}

/// Called exactly once per task.
pub type TransportCompletion = Box<dyn FnOnce(TransportOutcome) + Send + 'static>;

/// Handle to one exchange created by a `Transport`.
pub trait TransportTask: Send + Sync {
    /// Start the exchange. Calling it again has no effect.
    fn resume(&self);

    /// Best-effort cancellation. A completion that already fired is not
    /// affected; otherwise the completion receives `TransportError::Cancelled`.
    fn cancel(&self);
}

/// Executor of network exchanges.
pub trait Transport: Send + Sync {
    fn data_task(
        &self,
        request: HttpRequest,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask>;

    fn upload_task(
        &self,
        request: HttpRequest,
        payload: Option<Vec<u8>>,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask>;

    /// Run a data task and block the calling thread until it completes.
    fn send_blocking(&self, request: HttpRequest) -> TransportOutcome {
        wait_for_data_task(self, request)
    }
}

/// Resume a data task on `transport` and wait for its single completion.
pub fn wait_for_data_task<T: Transport + ?Sized>(
    transport: &T,
    request: HttpRequest,
) -> TransportOutcome {
    let (sender, receiver) = mpsc::sync_channel(1);
    let task = transport.data_task(
        request,
        Box::new(move |outcome| {
            // The receiver only disappears if the waiting thread is gone.
            let _ = sender.send(outcome);
        }),
    );
    task.resume();

    receiver.recv().unwrap_or_else(|_| {
        TransportOutcome::failed(TransportError::Other(
            "transport dropped the completion without calling it".to_string(),
        ))
    })
}
