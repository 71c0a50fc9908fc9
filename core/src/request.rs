//! Request builder: turns an `Endpoint` into an `HttpRequest`.
//!
//! # Design
//! Steps run in a fixed order: base request, default `Content-Type` from the
//! endpoint format, url-substitution parameters, query parameters, explicit
//! headers (which override the default), then the parameter encoder for
//! body-carrying methods only. When a query key collides with a url
//! parameter the query value wins, before and after the encoder runs. The
//! URL is kept in the normalized form `Url` serializes to. The builder
//! performs no I/O and does not log; the router emits the outgoing-request
//! event for debug endpoints.

use crate::encoding::{merge_query, parse_url};
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::http::{HttpRequest, CONTENT_TYPE};

/// Build the transport request for `endpoint`.
///
/// # Errors
/// `MissingUrl` when the endpoint has no base URL, `InvalidUrl` when the
/// derived URL does not parse, and whatever the selected encoder reports
/// (`ParametersNil`, `EncodingFailed`) for POST/PUT/PATCH.
pub fn build_request<E: Endpoint + ?Sized>(endpoint: &E) -> Result<HttpRequest> {
    if endpoint.base_url().trim().is_empty() {
        return Err(Error::MissingUrl);
    }
    let url = parse_url(&endpoint.url())?;

    let method = endpoint.method();
    let mut request = HttpRequest::new(method, url);
    request.set_header(CONTENT_TYPE, endpoint.format().content_type());

    let url_parameters = endpoint.url_parameters();
    let query_parameters = endpoint.query_parameters();
    if let Some(parameters) = &url_parameters {
        request.url = merge_query(&request.url, parameters)?;
    }
    if let Some(parameters) = &query_parameters {
        request.url = merge_query(&request.url, parameters)?;
    }
    if let Some(headers) = endpoint.headers() {
        for (name, value) in headers {
            request.set_header(name, value);
        }
    }

    if method.carries_body() {
        if let Some(encoding) = endpoint.encoding() {
            let body = endpoint.body_parameters();
            encoding.encode(&mut request, body.as_ref(), url_parameters.as_ref())?;
            // The url encoder re-merges url parameters; query parameters still win.
            if let Some(parameters) = &query_parameters {
                request.url = merge_query(&request.url, parameters)?;
            }
        }
    }

    Ok(request)
}
