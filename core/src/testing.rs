//! Deterministic test doubles.
//!
//! `StubTransport` records every request and answers with canned data. By
//! default it calls the completion synchronously from inside `data_task` /
//! `upload_task`, before the task is even resumed. A deferred stub holds
//! completions until `complete_pending` or a cancel.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::TransportError;
use crate::http::{Headers, HttpRequest, HttpResponse};
use crate::logger::{LogEvent, NetworkLogger};
use crate::transport::{
    wait_for_data_task, Transport, TransportCompletion, TransportOutcome, TransportTask,
};

#[derive(Default)]
struct StubState {
    requests: Vec<HttpRequest>,
    uploads: Vec<Option<Vec<u8>>>,
    data_calls: usize,
    upload_calls: usize,
    blocking_calls: usize,
    tasks: Vec<Arc<StubTask>>,
}

/// Transport answering every call with the same canned outcome.
pub struct StubTransport {
    data: Option<Vec<u8>>,
    error: Option<TransportError>,
    status: u16,
    headers: Headers,
    respond: bool,
    deferred: bool,
    state: Mutex<StubState>,
}

impl Default for StubTransport {
    fn default() -> Self {
        Self {
            data: None,
            error: None,
            status: 200,
            headers: Headers::new(),
            respond: true,
            deferred: false,
            state: Mutex::new(StubState::default()),
        }
    }
}

impl StubTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn with_json(self, value: &serde_json::Value) -> Self {
        self.with_data(value.to_string())
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_error(mut self, error: TransportError) -> Self {
        self.error = Some(error);
        self
    }

    /// Answer without response metadata.
    pub fn without_response(mut self) -> Self {
        self.respond = false;
        self
    }

    /// Hold completions until `complete_pending` or a cancel.
    pub fn deferred(mut self) -> Self {
        self.deferred = true;
        self
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.state().requests.clone()
    }

    pub fn last_request(&self) -> Option<HttpRequest> {
        self.state().requests.last().cloned()
    }

    pub fn last_upload(&self) -> Option<Option<Vec<u8>>> {
        self.state().uploads.last().cloned()
    }

    pub fn data_calls(&self) -> usize {
        self.state().data_calls
    }

    pub fn upload_calls(&self) -> usize {
        self.state().upload_calls
    }

    pub fn blocking_calls(&self) -> usize {
        self.state().blocking_calls
    }

    /// Total number of tasks created.
    pub fn calls(&self) -> usize {
        self.state().tasks.len()
    }

    pub fn last_task(&self) -> Option<Arc<StubTask>> {
        self.state().tasks.last().cloned()
    }

    /// Fire every held completion with the canned outcome.
    pub fn complete_pending(&self) {
        let tasks = self.state().tasks.clone();
        for task in tasks {
            task.deliver(None);
        }
    }

    fn state(&self) -> MutexGuard<'_, StubState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn outcome(&self, request: &HttpRequest) -> TransportOutcome {
        let response = self.respond.then(|| HttpResponse {
            status: self.status,
            url: request.url.clone(),
            headers: self.headers.clone(),
        });
        TransportOutcome {
            data: self.data.clone(),
            response,
            error: self.error.clone(),
        }
    }

    fn task(
        &self,
        request: HttpRequest,
        completion: TransportCompletion,
        deferred: bool,
    ) -> Arc<dyn TransportTask> {
        let outcome = self.outcome(&request);
        let task = Arc::new(StubTask {
            resumed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            pending: Mutex::new(Some((outcome, completion))),
        });
        {
            let mut state = self.state();
            state.requests.push(request);
            state.tasks.push(Arc::clone(&task));
        }
        if !deferred {
            task.deliver(None);
        }
        task
    }
}

impl Transport for StubTransport {
    fn data_task(
        &self,
        request: HttpRequest,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask> {
        self.state().data_calls += 1;
        self.task(request, completion, self.deferred)
    }

    fn upload_task(
        &self,
        request: HttpRequest,
        payload: Option<Vec<u8>>,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask> {
        {
            let mut state = self.state();
            state.upload_calls += 1;
            state.uploads.push(payload);
        }
        self.task(request, completion, self.deferred)
    }

    /// Always answers synchronously, even when deferred.
    fn send_blocking(&self, request: HttpRequest) -> TransportOutcome {
        self.state().blocking_calls += 1;
        let immediate = ImmediateStub(self);
        wait_for_data_task(&immediate, request)
    }
}

/// View of a stub that ignores `deferred`, used by `send_blocking`.
struct ImmediateStub<'a>(&'a StubTransport);

impl Transport for ImmediateStub<'_> {
    fn data_task(
        &self,
        request: HttpRequest,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask> {
        self.0.state().data_calls += 1;
        self.0.task(request, completion, false)
    }

    fn upload_task(
        &self,
        request: HttpRequest,
        _payload: Option<Vec<u8>>,
        completion: TransportCompletion,
    ) -> Arc<dyn TransportTask> {
        self.0.task(request, completion, false)
    }
}

/// Task created by `StubTransport`.
pub struct StubTask {
    resumed: AtomicBool,
    cancelled: AtomicBool,
    pending: Mutex<Option<(TransportOutcome, TransportCompletion)>>,
}

impl StubTask {
    pub fn was_resumed(&self) -> bool {
        self.resumed.load(Ordering::SeqCst)
    }

    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn is_pending(&self) -> bool {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Fire the held completion, optionally replacing the canned error.
    fn deliver(&self, error: Option<TransportError>) {
        let pending = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some((mut outcome, completion)) = pending {
            if let Some(error) = error {
                outcome = TransportOutcome::failed(error);
            }
            completion(outcome);
        }
    }
}

impl TransportTask for StubTask {
    fn resume(&self) {
        self.resumed.store(true, Ordering::SeqCst);
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.deliver(Some(TransportError::Cancelled));
    }
}

/// Logger keeping every event in memory.
#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<LogEvent>>,
}

impl RecordingLogger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NetworkLogger for RecordingLogger {
    fn log(&self, event: &LogEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
