//! Response wrapper and status classification.
//!
//! # Design
//! `StatusCode` is a pure function of the numeric code. `Response<T>` is
//! created once per completed transport call; its typed payload is filled in
//! by `handle_data` only when the status is ok/success, so a 404 carrying a
//! valid JSON body never yields a decoded object.

use std::fmt;

use crate::endpoint::Route;
use crate::http::{Headers, HttpResponse};

/// Status category derived from an HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    /// 200
    Ok,
    /// 201 through 226
    Success(u16),
    /// 401
    Authentication,
    /// 403
    Authorization,
    /// 404
    NotFound,
    /// Any other 4xx
    ApiError(u16),
    /// 500 through 527
    ServerError(u16),
    Other(u16),
}

impl StatusCode {
    pub fn from_code(code: u16) -> Self {
        match code {
            200 => StatusCode::Ok,
            201..=226 => StatusCode::Success(code),
            401 => StatusCode::Authentication,
            403 => StatusCode::Authorization,
            404 => StatusCode::NotFound,
            400..=499 => StatusCode::ApiError(code),
            500..=527 => StatusCode::ServerError(code),
            _ => StatusCode::Other(code),
        }
    }

    pub fn is_success(self) -> bool {
        matches!(self, StatusCode::Ok | StatusCode::Success(_))
    }

    /// Single-character marker used in log output.
    pub fn glyph(self) -> &'static str {
        match self {
            StatusCode::Ok | StatusCode::Success(_) => "✅",
            StatusCode::Authentication | StatusCode::Authorization => "🔑",
            _ => "❌",
        }
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode::from_code(code)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusCode::Ok => write!(f, "ok"),
            StatusCode::Success(code) => write!(f, "success ({code})"),
            StatusCode::Authentication => write!(f, "authentication"),
            StatusCode::Authorization => write!(f, "authorization"),
            StatusCode::NotFound => write!(f, "not found"),
            StatusCode::ApiError(code) => write!(f, "api error ({code})"),
            StatusCode::ServerError(code) => write!(f, "server error ({code})"),
            StatusCode::Other(code) => write!(f, "other ({code})"),
        }
    }
}

/// A completed exchange: status, headers, raw bytes and, for ok/success
/// responses, the decoded payload.
#[derive(Debug, Clone)]
pub struct Response<T> {
    route: Route,
    response: Option<HttpResponse>,
    status_code: u16,
    status: StatusCode,
    headers: Headers,
    data: Option<Vec<u8>>,
    data_object: Option<T>,
}

impl<T> Response<T> {
    /// Wrap response metadata. Without a response the status code is 0.
    pub fn new(route: Route, response: Option<HttpResponse>) -> Self {
        let status_code = response.as_ref().map_or(0, |r| r.status);
        let headers = response
            .as_ref()
            .map(|r| r.headers.clone())
            .unwrap_or_default();
        Self {
            route,
            response,
            status_code,
            status: StatusCode::from_code(status_code),
            headers,
            data: None,
            data_object: None,
        }
    }

    /// Wrap metadata and decode `data` in one step.
    pub fn with_data<F, E>(
        route: Route,
        response: Option<HttpResponse>,
        data: Option<Vec<u8>>,
        decode: F,
    ) -> (Self, Option<E>)
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let mut wrapped = Self::new(route, response);
        let failure = match data {
            Some(bytes) => wrapped.handle_data(bytes, decode).err(),
            None => None,
        };
        (wrapped, failure)
    }

    /// Wrap metadata with an already-known payload, without status gating.
    pub fn with_object(
        route: Route,
        response: Option<HttpResponse>,
        data: Option<Vec<u8>>,
        data_object: Option<T>,
    ) -> Self {
        let mut wrapped = Self::new(route, response);
        wrapped.data = data;
        wrapped.data_object = data_object;
        wrapped
    }

    /// Store `data` and, when the status is ok/success, decode it into the
    /// typed payload. For other statuses the decoder is not called.
    pub fn handle_data<F, E>(&mut self, data: Vec<u8>, decode: F) -> Result<(), E>
    where
        F: FnOnce(&[u8]) -> Result<T, E>,
    {
        let decoded = if self.status.is_success() {
            Some(decode(&data))
        } else {
            None
        };
        self.data = Some(data);
        match decoded {
            Some(Ok(object)) => {
                self.data_object = Some(object);
                Ok(())
            }
            Some(Err(e)) => Err(e),
            None => Ok(()),
        }
    }

    /// Drop the raw bytes of a non-success response.
    pub fn discard_error_body(&mut self) {
        if !self.status.is_success() {
            self.data = None;
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn response(&self) -> Option<&HttpResponse> {
        self.response.as_ref()
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    pub fn data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    pub fn data_object(&self) -> Option<&T> {
        self.data_object.as_ref()
    }

    pub fn into_data_object(self) -> Option<T> {
        self.data_object
    }
}
