//! Client-side HTTP request abstraction.
//!
//! # Overview
//! Applications describe each network operation once, as an `Endpoint`. The
//! `Router` turns an endpoint into an `HttpRequest`, hands it to a pluggable
//! `Transport`, and delivers the result through a single completion in one
//! of several shapes: raw bytes, a `Response` wrapper, or a decoded value.
//!
//! # Design
//! - Building a request is pure: `build_request` performs no I/O, so the
//!   whole pipeline up to the transport is deterministic and testable.
//! - The transport is a trait object. `UreqTransport` performs real HTTP on
//!   worker threads; `testing::StubTransport` answers with canned data.
//! - Every dispatch delivers exactly once, including build failures, which
//!   arrive through the completion's error slot without a transport call.
//! - Logging and caching are injected collaborators (`NetworkLogger`,
//!   `Cache`), never process-wide singletons.

pub mod cache;
pub mod encoding;
pub mod endpoint;
pub mod environment;
pub mod error;
pub mod http;
pub mod logger;
pub mod request;
pub mod response;
pub mod router;
pub mod testing;
pub mod transport;
pub mod ureq_transport;

pub use cache::{Cache, DownloadManager, MemoryCache};
pub use encoding::{ParameterEncoding, Parameters};
pub use endpoint::{Endpoint, EndpointDescriptor, HttpTask, Route};
pub use environment::{EnvironmentConfig, NetworkEnvironment};
pub use error::{Error, Result, TransportError};
pub use http::{CachePolicy, Headers, HttpFormat, HttpMethod, HttpRequest, HttpResponse};
pub use logger::{LogEvent, NetworkLogger, TracingLogger};
pub use request::build_request;
pub use response::{Response, StatusCode};
pub use router::{
    DecodeFailurePolicy, DecodedOutcome, ErrorBodyPolicy, Outcome, ResponseOutcome, Router,
    RouterConfig, TaskHandle,
};
pub use transport::{Transport, TransportCompletion, TransportOutcome, TransportTask};
pub use ureq_transport::UreqTransport;
