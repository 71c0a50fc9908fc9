//! Logger collaborator.
//!
//! # Design
//! The router hands structured `LogEvent`s to a `NetworkLogger` for
//! endpoints marked debug. There are three shapes: the outgoing request, a
//! response that never produced HTTP metadata, and a response with a status.
//! Loggers are side-effect only and must not panic.
//!
//! `TracingLogger` forwards events to `tracing` under the
//! `request_core::http` target.

use std::fmt;

use url::Url;
use uuid::Uuid;

use crate::endpoint::Route;
use crate::http::{Headers, HttpMethod, HttpRequest};
use crate::response::StatusCode;
use crate::transport::TransportOutcome;

/// Receiver of request/response events.
pub trait NetworkLogger: Send + Sync {
    fn log(&self, event: &LogEvent);
}

/// URL split into the components shown in log output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlParts {
    pub url: String,
    pub host: String,
    pub path: String,
    pub query: String,
}

impl UrlParts {
    /// Unparseable URLs keep the raw text and leave the components empty.
    pub fn parse(raw: &str) -> Self {
        match Url::parse(raw) {
            Ok(url) => Self {
                url: raw.to_string(),
                host: url.host_str().unwrap_or_default().to_string(),
                path: url.path().to_string(),
                query: url.query().unwrap_or_default().to_string(),
            },
            Err(_) => Self {
                url: raw.to_string(),
                ..Self::default()
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum LogEvent {
    Request(RequestEvent),
    Response(ResponseEvent),
    HttpResponse(HttpResponseEvent),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestEvent {
    pub request_id: Uuid,
    pub route: Route,
    pub url: UrlParts,
    pub method: HttpMethod,
    pub headers: Headers,
    pub body: Option<String>,
}

/// The transport produced no response metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseEvent {
    pub request_id: Uuid,
    pub route: Route,
    pub url: UrlParts,
    pub error: Option<String>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponseEvent {
    pub request_id: Uuid,
    pub route: Route,
    pub url: UrlParts,
    pub status_code: u16,
    pub status: StatusCode,
    pub headers: Headers,
    pub error: Option<String>,
    pub body: Option<String>,
}

impl LogEvent {
    pub fn request(request_id: Uuid, route: &Route, request: &HttpRequest) -> Self {
        LogEvent::Request(RequestEvent {
            request_id,
            route: route.clone(),
            url: UrlParts::parse(&request.url),
            method: request.method,
            headers: request.headers.clone(),
            body: request.body_text(),
        })
    }

    /// Response event for `outcome`; `request_url` stands in when the
    /// transport returned no metadata.
    pub fn response(
        request_id: Uuid,
        route: &Route,
        request_url: &str,
        outcome: &TransportOutcome,
    ) -> Self {
        let error = outcome.error.as_ref().map(ToString::to_string);
        let body = outcome
            .data
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned());

        match &outcome.response {
            Some(response) => LogEvent::HttpResponse(HttpResponseEvent {
                request_id,
                route: route.clone(),
                url: UrlParts::parse(&response.url),
                status_code: response.status,
                status: StatusCode::from_code(response.status),
                headers: response.headers.clone(),
                error,
                body,
            }),
            None => LogEvent::Response(ResponseEvent {
                request_id,
                route: route.clone(),
                url: UrlParts::parse(request_url),
                error,
                body,
            }),
        }
    }

    pub fn request_id(&self) -> Uuid {
        match self {
            LogEvent::Request(e) => e.request_id,
            LogEvent::Response(e) => e.request_id,
            LogEvent::HttpResponse(e) => e.request_id,
        }
    }

    pub fn route(&self) -> &Route {
        match self {
            LogEvent::Request(e) => &e.route,
            LogEvent::Response(e) => &e.route,
            LogEvent::HttpResponse(e) => &e.route,
        }
    }
}

/// Headers rendered as `name: value` pairs separated by `, `.
struct HeaderList<'a>(&'a Headers);

impl fmt::Display for HeaderList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (name, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {value}")?;
        }
        Ok(())
    }
}

/// `NetworkLogger` that emits `tracing` debug events.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl NetworkLogger for TracingLogger {
    fn log(&self, event: &LogEvent) {
        match event {
            LogEvent::Request(e) => tracing::debug!(
                target: "request_core::http",
                request_id=%e.request_id,
                route=%e.route.name,
                detail=%e.route.debug_description,
                url=%e.url.url,
                host=%e.url.host,
                method=%e.method,
                path=%e.url.path,
                query=%e.url.query,
                headers=%HeaderList(&e.headers),
                body=%e.body.as_deref().unwrap_or("Empty request body"),
                "outgoing request"
            ),
            LogEvent::Response(e) => tracing::debug!(
                target: "request_core::http",
                request_id=%e.request_id,
                route=%e.route.name,
                detail=%e.route.debug_description,
                url=%e.url.url,
                host=%e.url.host,
                method=%e.route.method,
                path=%e.url.path,
                query=%e.url.query,
                error=%e.error.as_deref().unwrap_or(""),
                body=%e.body.as_deref().unwrap_or(""),
                "response without status"
            ),
            LogEvent::HttpResponse(e) => tracing::debug!(
                target: "request_core::http",
                request_id=%e.request_id,
                route=%e.route.name,
                detail=%e.route.debug_description,
                url=%e.url.url,
                status=e.status_code,
                category=%e.status,
                glyph=%e.status.glyph(),
                headers=%HeaderList(&e.headers),
                error=%e.error.as_deref().unwrap_or(""),
                body=%e.body.as_deref().unwrap_or(""),
                "response"
            ),
        }
    }
}
