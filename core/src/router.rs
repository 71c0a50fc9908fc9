//! Router: build, send, post-process, complete.
//!
//! # Design
//! Every mode shares one pipeline. The endpoint is built into an
//! `HttpRequest` (logged for debug endpoints), handed to the transport as a
//! single task, and the transport outcome is logged before the mode-specific
//! post-processing runs and the caller's completion fires. A build failure
//! skips the transport entirely and still fires the completion once, with
//! the error.
//!
//! | mode | post-processing |
//! |---|---|
//! | `request`, `download`, `upload`, `download_url` | raw bytes, metadata and error |
//! | `response` | `Response<Vec<u8>>` holding the raw bytes |
//! | `json_request`, `decoded_request` | decoded value, failures per `DecodeFailurePolicy` |
//! | `json_response`, `decoded_response` | `Response<T>` decoded only for ok/success |
//! | `sync_response`, `sync_decoded_response` | as `json_response`, blocking the caller |
//!
//! The router holds no per-call state apart from the most recent task, kept
//! so `cancel` and `resume` can reach it.

use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;
use uuid::Uuid;

use crate::endpoint::{Endpoint, HttpTask, Route};
use crate::error::{Error, Result};
use crate::http::{HttpRequest, HttpResponse, DEFAULT_TIMEOUT};
use crate::logger::{LogEvent, NetworkLogger};
use crate::request::build_request;
use crate::response::Response;
use crate::transport::{Transport, TransportCompletion, TransportOutcome, TransportTask};

/// What happens when a body cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeFailurePolicy {
    /// Deliver an absent payload and no error.
    #[default]
    Swallow,
    /// Deliver `Error::Decode` in the error slot.
    Surface,
}

impl DecodeFailurePolicy {
    fn apply(self, error: Error) -> Option<Error> {
        match self {
            DecodeFailurePolicy::Swallow => None,
            DecodeFailurePolicy::Surface => Some(error),
        }
    }
}

/// What happens to the raw bytes of a non-success response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorBodyPolicy {
    #[default]
    Keep,
    Discard,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    pub timeout: Duration,
    pub decode_failures: DecodeFailurePolicy,
    pub error_body: ErrorBodyPolicy,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            decode_failures: DecodeFailurePolicy::default(),
            error_body: ErrorBodyPolicy::default(),
        }
    }
}

impl RouterConfig {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn surface_decode_failures(mut self) -> Self {
        self.decode_failures = DecodeFailurePolicy::Surface;
        self
    }

    pub fn discard_error_bodies(mut self) -> Self {
        self.error_body = ErrorBodyPolicy::Discard;
        self
    }
}

/// Completion payload of the raw modes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Outcome {
    pub data: Option<Vec<u8>>,
    pub response: Option<HttpResponse>,
    pub error: Option<Error>,
}

impl Outcome {
    fn from_result(result: Result<TransportOutcome>) -> Self {
        match result {
            Ok(outcome) => Self {
                data: outcome.data,
                response: outcome.response,
                error: outcome.error.map(Error::from),
            },
            Err(error) => Self {
                error: Some(error),
                ..Self::default()
            },
        }
    }
}

/// Completion payload of the response-wrapping modes. `response` is absent
/// only when the request could not be built.
#[derive(Debug, Clone)]
pub struct ResponseOutcome<T> {
    pub response: Option<Response<T>>,
    pub error: Option<Error>,
}

/// Completion payload of the decoding modes.
#[derive(Debug, Clone)]
pub struct DecodedOutcome<T> {
    pub value: Option<T>,
    pub response: Option<HttpResponse>,
    pub error: Option<Error>,
}

/// Handle to one dispatched call.
#[derive(Clone)]
pub struct TaskHandle {
    id: Uuid,
    task: Arc<dyn TransportTask>,
}

impl TaskHandle {
    /// Request id shared with the call's log events.
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel(&self) {
        self.task.cancel();
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle").field("id", &self.id).finish()
    }
}

enum Dispatch {
    Data,
    Upload(Option<Vec<u8>>),
}

/// Dispatcher for one family of endpoints.
pub struct Router<E> {
    transport: Arc<dyn Transport>,
    logger: Option<Arc<dyn NetworkLogger>>,
    config: RouterConfig,
    current: Mutex<Option<Arc<dyn TransportTask>>>,
    _endpoint: PhantomData<fn(&E)>,
}

impl<E: Endpoint> Router<E> {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            logger: None,
            config: RouterConfig::default(),
            current: Mutex::new(None),
            _endpoint: PhantomData,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn NetworkLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn logger(&self) -> Option<&Arc<dyn NetworkLogger>> {
        self.logger.as_ref()
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Build the request for `endpoint` without sending it. Debug endpoints
    /// still emit the outgoing-request event.
    pub fn build_request(&self, endpoint: &E) -> Result<HttpRequest> {
        self.prepare(endpoint, Uuid::new_v4(), &endpoint.route())
    }

    /// Send and deliver raw bytes, metadata and error.
    pub fn request<F>(&self, endpoint: &E, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.dispatch(endpoint, Dispatch::Data, move |_, result| {
            completion(Outcome::from_result(result))
        })
    }

    pub fn download<F>(&self, endpoint: &E, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        self.request(endpoint, completion)
    }

    /// Upload `payload`, falling back to the payload of an
    /// `HttpTask::Upload` endpoint when none is given.
    pub fn upload<F>(
        &self,
        endpoint: &E,
        payload: Option<Vec<u8>>,
        completion: F,
    ) -> Option<TaskHandle>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        let payload = payload.or_else(|| match endpoint.task() {
            HttpTask::Upload { payload } => payload,
            HttpTask::Request | HttpTask::Download => None,
        });
        self.dispatch(endpoint, Dispatch::Upload(payload), move |_, result| {
            completion(Outcome::from_result(result))
        })
    }

    /// Dispatch according to `endpoint.task()`.
    pub fn perform<F>(&self, endpoint: &E, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        match endpoint.task() {
            HttpTask::Request => self.request(endpoint, completion),
            HttpTask::Download => self.download(endpoint, completion),
            HttpTask::Upload { payload } => self.upload(endpoint, payload, completion),
        }
    }

    /// Wrap the raw bytes in a `Response` without decoding.
    pub fn response<F>(&self, endpoint: &E, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(ResponseOutcome<Vec<u8>>) + Send + 'static,
    {
        let config = self.config;
        self.dispatch(endpoint, Dispatch::Data, move |route, result| {
            let outcome = match result {
                Ok(outcome) => {
                    let data = outcome.data;
                    let mut response =
                        Response::with_object(route, outcome.response, data.clone(), data);
                    if config.error_body == ErrorBodyPolicy::Discard {
                        response.discard_error_body();
                    }
                    ResponseOutcome {
                        response: Some(response),
                        error: outcome.error.map(Error::from),
                    }
                }
                Err(error) => ResponseOutcome {
                    response: None,
                    error: Some(error),
                },
            };
            completion(outcome)
        })
    }

    /// Decode the body with `decode` regardless of status.
    pub fn decoded_request<T, D, F>(
        &self,
        endpoint: &E,
        decode: D,
        completion: F,
    ) -> Option<TaskHandle>
    where
        T: Send + 'static,
        D: FnOnce(&[u8]) -> Result<T> + Send + 'static,
        F: FnOnce(DecodedOutcome<T>) + Send + 'static,
    {
        let policy = self.config.decode_failures;
        self.dispatch(endpoint, Dispatch::Data, move |_, result| {
            let outcome = match result {
                Err(error) => DecodedOutcome {
                    value: None,
                    response: None,
                    error: Some(error),
                },
                Ok(TransportOutcome {
                    response,
                    error: Some(error),
                    ..
                }) => DecodedOutcome {
                    value: None,
                    response,
                    error: Some(error.into()),
                },
                Ok(TransportOutcome {
                    data, response, ..
                }) => {
                    let (value, error) = match data.as_deref().map(decode) {
                        Some(Ok(value)) => (Some(value), None),
                        Some(Err(error)) => (None, policy.apply(error)),
                        None => (None, None),
                    };
                    DecodedOutcome {
                        value,
                        response,
                        error,
                    }
                }
            };
            completion(outcome)
        })
    }

    pub fn json_request<T, F>(&self, endpoint: &E, completion: F) -> Option<TaskHandle>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(DecodedOutcome<T>) + Send + 'static,
    {
        self.decoded_request(endpoint, decode_json, completion)
    }

    /// Wrap in a `Response`, decoding with `decode` for ok/success statuses.
    pub fn decoded_response<T, D, F>(
        &self,
        endpoint: &E,
        decode: D,
        completion: F,
    ) -> Option<TaskHandle>
    where
        T: Send + 'static,
        D: FnOnce(&[u8]) -> Result<T> + Send + 'static,
        F: FnOnce(ResponseOutcome<T>) + Send + 'static,
    {
        let config = self.config;
        self.dispatch(endpoint, Dispatch::Data, move |route, result| {
            completion(wrap_response(route, result, decode, config))
        })
    }

    pub fn json_response<T, F>(&self, endpoint: &E, completion: F) -> Option<TaskHandle>
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(ResponseOutcome<T>) + Send + 'static,
    {
        self.decoded_response(endpoint, decode_json, completion)
    }

    /// Blocking variant of `decoded_response`.
    pub fn sync_decoded_response<T, D>(&self, endpoint: &E, decode: D) -> ResponseOutcome<T>
    where
        D: FnOnce(&[u8]) -> Result<T>,
    {
        let id = Uuid::new_v4();
        let route = endpoint.route();
        let request = match self.prepare(endpoint, id, &route) {
            Ok(request) => request,
            Err(error) => {
                return self.build_failed(id, &route, error, |error| ResponseOutcome {
                    response: None,
                    error: Some(error),
                });
            }
        };

        let url = request.url.clone();
        tracing::trace!(
            target: "request_core::router",
            request_id=%id,
            url=%url,
            "sending blocking request"
        );
        let outcome = self.transport.send_blocking(request);
        if endpoint.is_debug() {
            if let Some(logger) = &self.logger {
                logger.log(&LogEvent::response(id, &route, &url, &outcome));
            }
        }
        tracing::trace!(target: "request_core::router", request_id=%id, "completed");
        wrap_response(route, Ok(outcome), decode, self.config)
    }

    pub fn sync_response<T: DeserializeOwned>(&self, endpoint: &E) -> ResponseOutcome<T> {
        self.sync_decoded_response(endpoint, decode_json)
    }

    /// Fetch an absolute URL, bypassing the endpoint builder and the logger.
    pub fn download_url<F>(&self, url: &str, completion: F) -> Option<TaskHandle>
    where
        F: FnOnce(Outcome) + Send + 'static,
    {
        if let Err(e) = Url::parse(url) {
            completion(Outcome {
                error: Some(Error::InvalidUrl(format!("{url}: {e}"))),
                ..Outcome::default()
            });
            return None;
        }

        let id = Uuid::new_v4();
        let mut request = HttpRequest::get(url);
        request.timeout = self.config.timeout;
        let task = self.transport.data_task(
            request,
            Box::new(move |outcome| completion(Outcome::from_result(Ok(outcome)))),
        );
        Some(self.start(id, task))
    }

    /// Resume the most recent task.
    pub fn resume(&self) {
        if let Some(task) = self.current_task() {
            task.resume();
        }
    }

    /// Cancel the most recent task. No effect once it has completed.
    pub fn cancel(&self) {
        if let Some(task) = self.current_task() {
            task.cancel();
        }
    }

    fn prepare(&self, endpoint: &E, id: Uuid, route: &Route) -> Result<HttpRequest> {
        let mut request = build_request(endpoint)?;
        request.timeout = self.config.timeout;
        if endpoint.is_debug() {
            if let Some(logger) = &self.logger {
                logger.log(&LogEvent::request(id, route, &request));
            }
        }
        Ok(request)
    }

    fn dispatch<F>(&self, endpoint: &E, dispatch: Dispatch, finish: F) -> Option<TaskHandle>
    where
        F: FnOnce(Route, Result<TransportOutcome>) + Send + 'static,
    {
        let id = Uuid::new_v4();
        let route = endpoint.route();
        let request = match self.prepare(endpoint, id, &route) {
            Ok(request) => request,
            Err(error) => {
                return self.build_failed(id, &route, error, |error| {
                    finish(route.clone(), Err(error));
                    None
                });
            }
        };

        let logger = if endpoint.is_debug() {
            self.logger.clone()
        } else {
            None
        };
        let url = request.url.clone();
        let completion: TransportCompletion = Box::new(move |outcome| {
            if let Some(logger) = &logger {
                logger.log(&LogEvent::response(id, &route, &url, &outcome));
            }
            tracing::trace!(target: "request_core::router", request_id=%id, "completed");
            finish(route, Ok(outcome));
        });

        tracing::trace!(target: "request_core::router", request_id=%id, "sending request");
        let task = match dispatch {
            Dispatch::Data => self.transport.data_task(request, completion),
            Dispatch::Upload(payload) => self.transport.upload_task(request, payload, completion),
        };
        Some(self.start(id, task))
    }

    fn build_failed<R>(
        &self,
        id: Uuid,
        route: &Route,
        error: Error,
        deliver: impl FnOnce(Error) -> R,
    ) -> R {
        tracing::debug!(
            target: "request_core::router",
            request_id=%id,
            route=%route.name,
            err=%error,
            "request build failed"
        );
        deliver(error)
    }

    fn start(&self, id: Uuid, task: Arc<dyn TransportTask>) -> TaskHandle {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&task));
        task.resume();
        TaskHandle { id, task }
    }

    fn current_task(&self) -> Option<Arc<dyn TransportTask>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| Error::Decode(e.to_string()))
}

fn wrap_response<T, D>(
    route: Route,
    result: Result<TransportOutcome>,
    decode: D,
    config: RouterConfig,
) -> ResponseOutcome<T>
where
    D: FnOnce(&[u8]) -> Result<T>,
{
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(error) => {
            return ResponseOutcome {
                response: None,
                error: Some(error),
            }
        }
    };

    let transport_error = outcome.error.map(Error::from);
    let (mut response, failure) =
        Response::with_data(route, outcome.response, outcome.data, decode);
    if config.error_body == ErrorBodyPolicy::Discard {
        response.discard_error_body();
    }
    let error = transport_error.or_else(|| failure.and_then(|e| config.decode_failures.apply(e)));
    ResponseOutcome {
        response: Some(response),
        error,
    }
}
