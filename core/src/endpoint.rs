//! Endpoint descriptors.
//!
//! # Design
//! An `Endpoint` is a read-only description of one network operation. The
//! trait mirrors how applications usually model their API: an enum of
//! operations whose accessors compute the path, method and parameters per
//! variant. Only `base_url`, `path`, `method` and `name` are required; the
//! rest default to "absent".
//!
//! `EndpointDescriptor` is a plain-data implementation for call sites that
//! do not need their own type.

use serde_json::Value;

use crate::encoding::{ParameterEncoding, Parameters};
use crate::http::{Headers, HttpFormat, HttpMethod};

/// What kind of transport task the endpoint asks for. Only uploads carry a
/// payload.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum HttpTask {
    #[default]
    Request,
    Download,
    Upload { payload: Option<Vec<u8>> },
}

/// Description of one logical network operation.
pub trait Endpoint {
    /// Base URL, with or without a scheme.
    fn base_url(&self) -> String;

    fn path(&self) -> String;

    fn method(&self) -> HttpMethod;

    /// Human-readable name used in log events.
    fn name(&self) -> String;

    fn format(&self) -> HttpFormat {
        HttpFormat::Json
    }

    fn task(&self) -> HttpTask {
        HttpTask::Request
    }

    fn headers(&self) -> Option<Headers> {
        None
    }

    fn query_parameters(&self) -> Option<Parameters> {
        None
    }

    fn body_parameters(&self) -> Option<Parameters> {
        None
    }

    fn url_parameters(&self) -> Option<Parameters> {
        None
    }

    fn encoding(&self) -> Option<ParameterEncoding> {
        None
    }

    fn debug_description(&self) -> String {
        String::new()
    }

    fn is_debug(&self) -> bool {
        false
    }

    /// Scheme used when `base_url` has none.
    fn is_secure(&self) -> bool {
        true
    }

    /// Absolute URL: base URL (scheme inferred) joined with the path.
    fn url(&self) -> String {
        join_path(&with_scheme(&self.base_url(), self.is_secure()), &self.path())
    }

    fn route(&self) -> Route {
        Route {
            name: self.name(),
            debug_description: self.debug_description(),
            method: self.method(),
            url: self.url(),
        }
    }
}

/// Owned summary of an endpoint, carried into completions, responses and
/// log events after the endpoint itself is out of reach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub name: String,
    pub debug_description: String,
    pub method: HttpMethod,
    pub url: String,
}

/// Prefix `https://` (or `http://` when not secure) unless `base` already
/// names an http scheme.
pub fn with_scheme(base: &str, secure: bool) -> String {
    let lower = base.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        base.to_string()
    } else {
        let scheme = if secure { "https" } else { "http" };
        format!("{scheme}://{base}")
    }
}

/// Join base and path with exactly one `/`. An empty path returns `base`.
pub fn join_path(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Plain-data endpoint, built with chained setters.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointDescriptor {
    pub name: String,
    pub base_url: String,
    pub path: String,
    pub method: HttpMethod,
    pub format: HttpFormat,
    pub task: HttpTask,
    pub headers: Option<Headers>,
    pub query_parameters: Option<Parameters>,
    pub body_parameters: Option<Parameters>,
    pub url_parameters: Option<Parameters>,
    pub encoding: Option<ParameterEncoding>,
    pub debug_description: String,
    pub debug: bool,
    pub secure: bool,
}

impl EndpointDescriptor {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            path: path.into(),
            method: HttpMethod::Get,
            format: HttpFormat::Json,
            task: HttpTask::Request,
            headers: None,
            query_parameters: None,
            body_parameters: None,
            url_parameters: None,
            encoding: None,
            debug_description: String::new(),
            debug: false,
            secure: true,
        }
    }

    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    pub fn format(mut self, format: HttpFormat) -> Self {
        self.format = format;
        self
    }

    pub fn task(mut self, task: HttpTask) -> Self {
        self.task = task;
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query_parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn body(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.body_parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn url_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.url_parameters
            .get_or_insert_with(Parameters::new)
            .insert(key.into(), value.into());
        self
    }

    pub fn encoding(mut self, encoding: ParameterEncoding) -> Self {
        self.encoding = Some(encoding);
        self
    }

    /// Enable debug logging with a description attached to every event.
    pub fn debug(mut self, description: impl Into<String>) -> Self {
        self.debug = true;
        self.debug_description = description.into();
        self
    }

    pub fn insecure(mut self) -> Self {
        self.secure = false;
        self
    }
}

impl Endpoint for EndpointDescriptor {
    fn base_url(&self) -> String {
        self.base_url.clone()
    }

    fn path(&self) -> String {
        self.path.clone()
    }

    fn method(&self) -> HttpMethod {
        self.method
    }

    fn name(&self) -> String {
        self.name.clone()
    }

    fn format(&self) -> HttpFormat {
        self.format
    }

    fn task(&self) -> HttpTask {
        self.task.clone()
    }

    fn headers(&self) -> Option<Headers> {
        self.headers.clone()
    }

    fn query_parameters(&self) -> Option<Parameters> {
        self.query_parameters.clone()
    }

    fn body_parameters(&self) -> Option<Parameters> {
        self.body_parameters.clone()
    }

    fn url_parameters(&self) -> Option<Parameters> {
        self.url_parameters.clone()
    }

    fn encoding(&self) -> Option<ParameterEncoding> {
        self.encoding
    }

    fn debug_description(&self) -> String {
        self.debug_description.clone()
    }

    fn is_debug(&self) -> bool {
        self.debug
    }

    fn is_secure(&self) -> bool {
        self.secure
    }
}
