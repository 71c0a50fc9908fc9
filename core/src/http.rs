//! HTTP request and response types exchanged with a transport.
//!
//! # Design
//! These types describe HTTP requests and responses as plain data. The
//! request builder produces an `HttpRequest`, a `Transport` executes it, and
//! hands back an `HttpResponse` plus the body bytes. Keeping both sides plain
//! data lets the builder and router be tested without touching the network.
//!
//! Header maps are ordered by name; lookups and replacements ignore ASCII
//! case because HTTP header names are case-insensitive.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Header map keyed by header name.
pub type Headers = BTreeMap<String, String>;

/// Timeout applied to every built request unless the router overrides it.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

pub const CONTENT_TYPE: &str = "Content-Type";

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Whether the builder runs the parameter encoder for this method.
    pub fn carries_body(self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content format declared by an endpoint, used for the default
/// `Content-Type` header (`application/<format>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HttpFormat {
    #[default]
    Json,
    Xml,
    Yml,
    Html,
}

impl HttpFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpFormat::Json => "json",
            HttpFormat::Xml => "xml",
            HttpFormat::Yml => "yml",
            HttpFormat::Html => "html",
        }
    }

    pub fn content_type(self) -> String {
        format!("application/{}", self.as_str())
    }
}

/// Cache behaviour requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CachePolicy {
    UseProtocolCachePolicy,
    #[default]
    ReloadIgnoringLocalAndRemoteCacheData,
}

/// An HTTP request described as plain data.
///
/// Built incrementally by `build_request`; ownership moves to the transport
/// for the duration of the call.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Headers,
    pub body: Option<Vec<u8>>,
    pub timeout: Duration,
    pub cache_policy: CachePolicy,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: None,
            timeout: DEFAULT_TIMEOUT,
            cache_policy: CachePolicy::default(),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Set a header, replacing any existing value under the same name
    /// regardless of case.
    pub fn set_header(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.headers.retain(|existing, _| !existing.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
    }

    /// Set a header only when no value is present yet.
    pub fn set_header_if_absent(&mut self, name: &str, value: impl Into<String>) {
        if self.header(name).is_none() {
            self.headers.insert(name.to_string(), value.into());
        }
    }

    /// Body rendered as UTF-8 text, lossy, for logging.
    pub fn body_text(&self) -> Option<String> {
        self.body
            .as_deref()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }
}

/// Response metadata returned by a transport. The body travels separately
/// as raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub url: String,
    pub headers: Headers,
}

impl HttpResponse {
    pub fn new(status: u16, url: impl Into<String>) -> Self {
        Self {
            status,
            url: url.into(),
            headers: Headers::new(),
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}
