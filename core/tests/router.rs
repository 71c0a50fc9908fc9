//! Router modes driven through the deterministic stub transport.
//!
//! The stub calls completions synchronously from inside the transport call,
//! so every assertion below runs after the completion has already fired.

use std::sync::{mpsc, Arc};
use std::time::Duration;

use request_core::testing::{RecordingLogger, StubTransport};
use request_core::{
    DecodedOutcome, EndpointDescriptor, Error, HttpMethod, HttpTask, LogEvent, NetworkLogger,
    Outcome, ParameterEncoding, ResponseOutcome, Router, RouterConfig, StatusCode, TransportError,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct Post {
    id: u32,
    title: String,
}

fn posts() -> EndpointDescriptor {
    EndpointDescriptor::new("posts", "api.test", "posts")
}

fn post_json() -> serde_json::Value {
    json!({ "id": 7, "title": "Hello" })
}

fn router(stub: &Arc<StubTransport>) -> Router<EndpointDescriptor> {
    Router::new(stub.clone())
}

/// Drain every completion call made so far.
fn delivered<T>(receiver: &mpsc::Receiver<T>) -> Vec<T> {
    receiver.try_iter().collect()
}

// --- request / download ---

#[test]
fn request_delivers_bytes_and_metadata() {
    let stub = Arc::new(StubTransport::new().with_json(&json!([post_json()])));
    let (tx, rx) = mpsc::channel::<Outcome>();

    let handle = router(&stub).request(&posts(), move |o| tx.send(o).unwrap());

    assert!(handle.is_some());
    let outcomes = delivered(&rx);
    assert_eq!(outcomes.len(), 1);
    let outcome = &outcomes[0];
    assert!(outcome.error.is_none());
    assert_eq!(outcome.response.as_ref().unwrap().status, 200);
    let body: serde_json::Value = serde_json::from_slice(outcome.data.as_ref().unwrap()).unwrap();
    assert_eq!(body[0]["title"], "Hello");

    let sent = stub.last_request().unwrap();
    assert_eq!(sent.url, "https://api.test/posts");
    assert_eq!(sent.method, HttpMethod::Get);
    assert_eq!(stub.data_calls(), 1);
}

#[test]
fn query_parameters_reach_the_transport() {
    let stub = Arc::new(StubTransport::new());
    let endpoint = posts().query("page", 2).query("q", "rust lang");

    router(&stub).request(&endpoint, |_| {});

    assert_eq!(stub.last_request().unwrap().url, "https://api.test/posts?page=2&q=rust%20lang");
}

#[test]
fn configured_timeout_is_applied() {
    let stub = Arc::new(StubTransport::new());
    let config = RouterConfig::default().with_timeout(Duration::from_secs(3));
    let router: Router<EndpointDescriptor> = Router::new(stub.clone()).with_config(config);

    router.request(&posts(), |_| {});

    assert_eq!(stub.last_request().unwrap().timeout, Duration::from_secs(3));
}

#[test]
fn transport_error_is_delivered_once_after_one_send() {
    let stub = Arc::new(
        StubTransport::new()
            .with_error(TransportError::Timeout)
            .without_response(),
    );
    let (tx, rx) = mpsc::channel::<DecodedOutcome<Vec<Post>>>();

    router(&stub).json_request(&posts(), move |o| tx.send(o).unwrap());

    let outcomes = delivered(&rx);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].error, Some(Error::Transport(TransportError::Timeout)));
    assert!(outcomes[0].value.is_none());
    assert!(outcomes[0].response.is_none());
    assert_eq!(stub.calls(), 1);
}

#[test]
fn build_failure_skips_the_transport() {
    let stub = Arc::new(StubTransport::new());
    let endpoint = posts().method(HttpMethod::Post).encoding(ParameterEncoding::Json);
    let (tx, rx) = mpsc::channel::<Outcome>();

    let handle = router(&stub).request(&endpoint, move |o| tx.send(o).unwrap());

    assert!(handle.is_none());
    let outcomes = delivered(&rx);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].error, Some(Error::ParametersNil));
    assert!(outcomes[0].data.is_none());
    assert_eq!(stub.calls(), 0);
}

#[test]
fn missing_base_url_fails_the_build() {
    let stub = Arc::new(StubTransport::new());
    let endpoint = EndpointDescriptor::new("posts", "", "posts");
    let (tx, rx) = mpsc::channel::<ResponseOutcome<Post>>();

    router(&stub).json_response(&endpoint, move |o| tx.send(o).unwrap());

    let outcomes = delivered(&rx);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].error, Some(Error::MissingUrl));
    assert!(outcomes[0].response.is_none());
    assert_eq!(stub.calls(), 0);
}

#[test]
fn json_body_is_sent_for_post() {
    let stub = Arc::new(StubTransport::new().with_status(201));
    let endpoint = posts()
        .method(HttpMethod::Post)
        .body("title", "Hello")
        .encoding(ParameterEncoding::Json);

    router(&stub).request(&endpoint, |_| {});

    let sent = stub.last_request().unwrap();
    let body: serde_json::Value = serde_json::from_slice(sent.body.as_ref().unwrap()).unwrap();
    assert_eq!(body, json!({ "title": "Hello" }));
    assert_eq!(sent.header("content-type"), Some("application/json"));
}

#[test]
fn download_uses_a_data_task() {
    let stub = Arc::new(StubTransport::new().with_data(b"bytes".to_vec()));
    let (tx, rx) = mpsc::channel::<Outcome>();

    router(&stub).download(&posts(), move |o| tx.send(o).unwrap());

    assert_eq!(delivered(&rx)[0].data.as_deref(), Some(&b"bytes"[..]));
    assert_eq!(stub.data_calls(), 1);
    assert_eq!(stub.upload_calls(), 0);
}

// --- upload / perform ---

#[test]
fn upload_sends_explicit_payload() {
    let stub = Arc::new(StubTransport::new().with_status(201));
    let endpoint = posts().method(HttpMethod::Post);

    router(&stub).upload(&endpoint, Some(b"file".to_vec()), |_| {});

    assert_eq!(stub.upload_calls(), 1);
    assert_eq!(stub.last_upload(), Some(Some(b"file".to_vec())));
}

#[test]
fn upload_falls_back_to_task_payload() {
    let stub = Arc::new(StubTransport::new());
    let endpoint = posts().method(HttpMethod::Post).task(HttpTask::Upload {
        payload: Some(b"from task".to_vec()),
    });

    router(&stub).upload(&endpoint, None, |_| {});

    assert_eq!(stub.last_upload(), Some(Some(b"from task".to_vec())));
}

#[test]
fn perform_dispatches_by_task() {
    let stub = Arc::new(StubTransport::new());
    let router = router(&stub);

    router.perform(&posts().task(HttpTask::Download), |_| {});
    assert_eq!((stub.data_calls(), stub.upload_calls()), (1, 0));

    router.perform(
        &posts().method(HttpMethod::Put).task(HttpTask::Upload {
            payload: Some(vec![1, 2, 3]),
        }),
        |_| {},
    );
    assert_eq!((stub.data_calls(), stub.upload_calls()), (1, 1));
    assert_eq!(stub.last_upload(), Some(Some(vec![1, 2, 3])));

    router.perform(&posts(), |_| {});
    assert_eq!((stub.data_calls(), stub.upload_calls()), (2, 1));
}

// --- response wrapping ---

#[test]
fn response_mode_wraps_raw_bytes() {
    let stub = Arc::new(StubTransport::new().with_data(b"raw".to_vec()).with_header("X-Id", "9"));
    let (tx, rx) = mpsc::channel::<ResponseOutcome<Vec<u8>>>();

    router(&stub).response(&posts(), move |o| tx.send(o).unwrap());

    let outcome = delivered(&rx).remove(0);
    let response = outcome.response.unwrap();
    assert_eq!(response.status(), StatusCode::Ok);
    assert_eq!(response.data(), Some(&b"raw"[..]));
    assert_eq!(response.data_object(), Some(&b"raw".to_vec()));
    assert_eq!(response.headers()["X-Id"], "9");
    assert_eq!(response.route().name, "posts");
}

#[test]
fn json_response_decodes_success() {
    let stub = Arc::new(StubTransport::new().with_status(201).with_json(&post_json()));
    let (tx, rx) = mpsc::channel::<ResponseOutcome<Post>>();

    router(&stub).json_response(&posts(), move |o| tx.send(o).unwrap());

    let outcome = delivered(&rx).remove(0);
    assert!(outcome.error.is_none());
    let response = outcome.response.unwrap();
    assert_eq!(response.status(), StatusCode::Success(201));
    assert_eq!(
        response.data_object(),
        Some(&Post {
            id: 7,
            title: "Hello".to_string()
        })
    );
}

#[test]
fn not_found_keeps_bytes_without_object() {
    let stub = Arc::new(StubTransport::new().with_status(404).with_json(&post_json()));
    let (tx, rx) = mpsc::channel::<ResponseOutcome<Post>>();

    router(&stub).json_response(&posts(), move |o| tx.send(o).unwrap());

    let outcome = delivered(&rx).remove(0);
    assert!(outcome.error.is_none());
    let response = outcome.response.unwrap();
    assert_eq!(response.status(), StatusCode::NotFound);
    assert_eq!(response.status_code(), 404);
    assert!(response.data_object().is_none());
    assert!(response.data().is_some());
}

#[test]
fn error_bodies_can_be_discarded() {
    let stub = Arc::new(StubTransport::new().with_status(500).with_data(b"boom".to_vec()));
    let router: Router<EndpointDescriptor> =
        Router::new(stub.clone()).with_config(RouterConfig::default().discard_error_bodies());
    let (tx, rx) = mpsc::channel::<ResponseOutcome<Post>>();

    router.json_response(&posts(), move |o| tx.send(o).unwrap());

    let response = delivered(&rx).remove(0).response.unwrap();
    assert_eq!(response.status(), StatusCode::ServerError(500));
    assert!(response.data().is_none());
}

#[test]
fn decoded_response_uses_custom_decoder() {
    let stub = Arc::new(StubTransport::new().with_data(b"plain text".to_vec()));
    let (tx, rx) = mpsc::channel::<ResponseOutcome<String>>();

    router(&stub).decoded_response(
        &posts(),
        |bytes| String::from_utf8(bytes.to_vec()).map_err(|e| Error::Decode(e.to_string())),
        move |o| tx.send(o).unwrap(),
    );

    let response = delivered(&rx).remove(0).response.unwrap();
    assert_eq!(response.into_data_object().as_deref(), Some("plain text"));
}

// --- decode failures ---

#[test]
fn decode_failure_is_swallowed_by_default() {
    let stub = Arc::new(StubTransport::new().with_data(b"not json".to_vec()));
    let (tx, rx) = mpsc::channel::<DecodedOutcome<Post>>();

    router(&stub).json_request(&posts(), move |o| tx.send(o).unwrap());

    let outcomes = delivered(&rx);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].value.is_none());
    assert!(outcomes[0].error.is_none());
}

#[test]
fn decode_failure_can_be_surfaced() {
    let stub = Arc::new(StubTransport::new().with_data(b"not json".to_vec()));
    let router: Router<EndpointDescriptor> =
        Router::new(stub.clone()).with_config(RouterConfig::default().surface_decode_failures());
    let (tx, rx) = mpsc::channel::<DecodedOutcome<Post>>();
    let (wrapped_tx, wrapped_rx) = mpsc::channel::<ResponseOutcome<Post>>();

    router.json_request(&posts(), move |o| tx.send(o).unwrap());
    router.json_response(&posts(), move |o| wrapped_tx.send(o).unwrap());

    assert!(matches!(delivered(&rx)[0].error, Some(Error::Decode(_))));
    let wrapped = delivered(&wrapped_rx).remove(0);
    assert!(matches!(wrapped.error, Some(Error::Decode(_))));
    assert_eq!(wrapped.response.unwrap().data(), Some(&b"not json"[..]));
}

#[test]
fn json_request_decodes_regardless_of_status() {
    let stub = Arc::new(StubTransport::new().with_status(404).with_json(&post_json()));
    let (tx, rx) = mpsc::channel::<DecodedOutcome<Post>>();

    router(&stub).json_request(&posts(), move |o| tx.send(o).unwrap());

    let outcome = delivered(&rx).remove(0);
    assert_eq!(outcome.value.map(|p| p.id), Some(7));
    assert_eq!(outcome.response.unwrap().status, 404);
}

#[test]
fn json_request_without_data_still_completes() {
    let stub = Arc::new(StubTransport::new().with_status(204));
    let (tx, rx) = mpsc::channel::<DecodedOutcome<Post>>();

    router(&stub).json_request(&posts(), move |o| tx.send(o).unwrap());

    let outcomes = delivered(&rx);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].value.is_none());
    assert!(outcomes[0].error.is_none());
}

// --- sync ---

#[test]
fn sync_response_returns_decoded_object() {
    let stub = Arc::new(StubTransport::new().with_json(&post_json()));

    let outcome = router(&stub).sync_response::<Post>(&posts());

    assert!(outcome.error.is_none());
    assert_eq!(outcome.response.unwrap().into_data_object().map(|p| p.id), Some(7));
    assert_eq!(stub.blocking_calls(), 1);
}

#[test]
fn sync_response_does_not_wait_on_a_deferred_stub() {
    let stub = Arc::new(StubTransport::new().deferred().with_status(403));

    let outcome = router(&stub).sync_response::<Post>(&posts());

    let response = outcome.response.unwrap();
    assert_eq!(response.status(), StatusCode::Authorization);
    assert!(response.data_object().is_none());
}

#[test]
fn sync_response_reports_build_failure() {
    let stub = Arc::new(StubTransport::new());
    let endpoint = EndpointDescriptor::new("posts", "", "posts");

    let outcome = router(&stub).sync_response::<Post>(&endpoint);

    assert_eq!(outcome.error, Some(Error::MissingUrl));
    assert!(outcome.response.is_none());
    assert_eq!(stub.calls(), 0);
}

// --- logging ---

#[test]
fn debug_endpoint_is_logged_before_completion() {
    let stub = Arc::new(StubTransport::new().with_json(&post_json()));
    let logger = Arc::new(RecordingLogger::new());
    let router: Router<EndpointDescriptor> = Router::new(stub.clone()).with_logger(logger.clone());
    let (tx, rx) = mpsc::channel::<usize>();

    let seen = logger.clone();
    let handle = router
        .request(&posts().debug("list posts"), move |_| tx.send(seen.len()).unwrap())
        .unwrap();

    assert_eq!(delivered(&rx), vec![2]);
    let events = logger.events();
    assert!(matches!(events[0], LogEvent::Request(_)));
    assert!(matches!(events[1], LogEvent::HttpResponse(_)));
    assert!(events.iter().all(|e| e.request_id() == handle.id()));
    assert_eq!(events[0].route().debug_description, "list posts");
}

#[test]
fn response_without_metadata_is_logged_as_such() {
    let stub = Arc::new(
        StubTransport::new()
            .without_response()
            .with_error(TransportError::Timeout),
    );
    let logger = Arc::new(RecordingLogger::new());
    let router: Router<EndpointDescriptor> = Router::new(stub.clone()).with_logger(logger.clone());

    router.request(&posts().debug("list posts"), |_| {});

    let events = logger.events();
    let LogEvent::Response(event) = &events[1] else {
        panic!("expected response without status");
    };
    assert_eq!(event.error.as_deref(), Some("request timed out"));
}

#[test]
fn non_debug_endpoint_is_not_logged() {
    let stub = Arc::new(StubTransport::new());
    let logger = Arc::new(RecordingLogger::new());
    let router: Router<EndpointDescriptor> = Router::new(stub.clone()).with_logger(logger.clone());

    router.request(&posts(), |_| {});
    router.sync_response::<Post>(&posts());

    assert!(logger.is_empty());
}

#[test]
fn build_request_logs_for_debug_endpoints() {
    let stub = Arc::new(StubTransport::new());
    let logger = Arc::new(RecordingLogger::new());
    let router: Router<EndpointDescriptor> = Router::new(stub.clone()).with_logger(logger.clone());

    let request = router.build_request(&posts().debug("inspect")).unwrap();

    assert_eq!(request.url, "https://api.test/posts");
    assert_eq!(logger.len(), 1);
    assert_eq!(stub.calls(), 0);
}

#[test]
fn any_logger_implementation_can_be_installed() {
    struct Counting(std::sync::atomic::AtomicUsize);

    impl NetworkLogger for Counting {
        fn log(&self, _event: &LogEvent) {
            self.0.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        }
    }

    let logger = Arc::new(Counting(Default::default()));
    let router: Router<EndpointDescriptor> =
        Router::new(Arc::new(StubTransport::new())).with_logger(logger.clone());

    router.request(&posts().debug("count"), |_| {});

    assert_eq!(logger.0.load(std::sync::atomic::Ordering::SeqCst), 2);
}

// --- cancel / resume ---

#[test]
fn cancel_reaches_the_current_task() {
    let stub = Arc::new(StubTransport::new().deferred());
    let router = router(&stub);
    let (tx, rx) = mpsc::channel::<Outcome>();

    router.request(&posts(), move |o| tx.send(o).unwrap());
    assert!(delivered(&rx).is_empty());

    router.cancel();

    let task = stub.last_task().unwrap();
    assert!(task.was_resumed());
    assert!(task.was_cancelled());
    let outcomes = delivered(&rx);
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].error, Some(Error::Transport(TransportError::Cancelled)));

    // a later completion attempt is ignored
    stub.complete_pending();
    assert!(delivered(&rx).is_empty());
}

#[test]
fn handle_cancels_its_own_call() {
    let stub = Arc::new(StubTransport::new().deferred());
    let router = router(&stub);
    let (first_tx, first_rx) = mpsc::channel::<Outcome>();
    let (second_tx, second_rx) = mpsc::channel::<Outcome>();

    let first = router.request(&posts(), move |o| first_tx.send(o).unwrap()).unwrap();
    let second = router.request(&posts(), move |o| second_tx.send(o).unwrap()).unwrap();
    assert_ne!(first.id(), second.id());

    first.cancel();
    stub.complete_pending();

    assert_eq!(delivered(&first_rx)[0].error, Some(Error::Transport(TransportError::Cancelled)));
    assert!(delivered(&second_rx)[0].error.is_none());
}

#[test]
fn cancel_after_completion_has_no_effect() {
    let stub = Arc::new(StubTransport::new());
    let router = router(&stub);
    let (tx, rx) = mpsc::channel::<Outcome>();

    let handle = router.request(&posts(), move |o| tx.send(o).unwrap()).unwrap();
    handle.cancel();
    router.cancel();

    let outcomes = delivered(&rx);
    assert_eq!(outcomes.len(), 1);
    assert!(outcomes[0].error.is_none());
}

#[test]
fn resume_and_cancel_without_tasks_are_noops() {
    let stub = Arc::new(StubTransport::new());
    let router = router(&stub);

    router.resume();
    router.cancel();

    assert_eq!(stub.calls(), 0);
}

// --- download_url ---

#[test]
fn download_url_fetches_absolute_url() {
    let stub = Arc::new(StubTransport::new().with_data(b"image".to_vec()));
    let logger = Arc::new(RecordingLogger::new());
    let router: Router<EndpointDescriptor> = Router::new(stub.clone()).with_logger(logger.clone());
    let (tx, rx) = mpsc::channel::<Outcome>();

    let handle = router.download_url("https://cdn.test/a.png", move |o| tx.send(o).unwrap());

    assert!(handle.is_some());
    assert_eq!(delivered(&rx)[0].data.as_deref(), Some(&b"image"[..]));
    let sent = stub.last_request().unwrap();
    assert_eq!(sent.url, "https://cdn.test/a.png");
    assert_eq!(sent.method, HttpMethod::Get);
    assert!(logger.is_empty());
}

#[test]
fn download_url_rejects_invalid_url() {
    let stub = Arc::new(StubTransport::new());
    let (tx, rx) = mpsc::channel::<Outcome>();

    let handle = router(&stub).download_url("not a url", move |o| tx.send(o).unwrap());

    assert!(handle.is_none());
    assert!(matches!(delivered(&rx)[0].error, Some(Error::InvalidUrl(_))));
    assert_eq!(stub.calls(), 0);
}
