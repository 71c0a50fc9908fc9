//! Parameter encoders.
//!
//! # Design
//! A parameter bag is either written into the URL query or serialized as a
//! JSON body. Both query-writing paths of the builder (url-substitution
//! parameters and query parameters) go through `merge_query`, so keys and
//! values are always percent-encoded the same way and every key appears at
//! most once in the final query string.
//!
//! The single-mode encoders treat an absent bag as an error, while
//! `ParameterEncoding::UrlAndJson` silently skips whichever half is absent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::error::{Error, Result};
use crate::http::{HttpRequest, CONTENT_TYPE};

/// Key-value parameter bag. Ordered by key so encoded output is stable.
pub type Parameters = BTreeMap<String, Value>;

pub const FORM_URLENCODED: &str = "application/x-www-form-urlencoded; charset=utf-8";
pub const APPLICATION_JSON: &str = "application/json";

/// Encoder selection carried by an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterEncoding {
    /// Url parameters into the query string.
    Url,
    /// Body parameters into a JSON body.
    Json,
    /// Both, skipping whichever bag is absent.
    UrlAndJson,
}

impl ParameterEncoding {
    pub fn encode(
        self,
        request: &mut HttpRequest,
        body_parameters: Option<&Parameters>,
        url_parameters: Option<&Parameters>,
    ) -> Result<()> {
        match self {
            ParameterEncoding::Url => encode_url(request, url_parameters),
            ParameterEncoding::Json => encode_json(request, body_parameters),
            ParameterEncoding::UrlAndJson => {
                if body_parameters.is_some() {
                    encode_json(request, body_parameters)?;
                }
                if url_parameters.is_some() {
                    encode_url(request, url_parameters)?;
                }
                Ok(())
            }
        }
    }
}

/// Merge `parameters` into the request URL's query.
///
/// The URL check runs before the parameter check, so a request without a URL
/// reports `MissingUrl` even when the bag is also absent.
pub fn encode_url(request: &mut HttpRequest, parameters: Option<&Parameters>) -> Result<()> {
    if request.url.is_empty() {
        return Err(Error::MissingUrl);
    }
    let parameters = parameters.ok_or(Error::ParametersNil)?;

    request.url = merge_query(&request.url, parameters)?;
    request.set_header_if_absent(CONTENT_TYPE, FORM_URLENCODED);
    Ok(())
}

/// Serialize `parameters` as a pretty-printed JSON body.
pub fn encode_json(request: &mut HttpRequest, parameters: Option<&Parameters>) -> Result<()> {
    let parameters = parameters.ok_or(Error::ParametersNil)?;
    let body =
        serde_json::to_vec_pretty(parameters).map_err(|e| Error::EncodingFailed(e.to_string()))?;

    request.body = Some(body);
    request.set_header_if_absent(CONTENT_TYPE, APPLICATION_JSON);
    Ok(())
}

/// Render a parameter bag as `key=value` pairs joined with `&`.
pub fn encode_query(parameters: &Parameters) -> String {
    parameters
        .iter()
        .map(|(key, value)| encode_pair(key, value))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parse `raw` as an absolute URL, reporting failures as `InvalidUrl`.
pub(crate) fn parse_url(raw: &str) -> Result<Url> {
    Url::parse(raw).map_err(|e| Error::InvalidUrl(format!("{raw}: {e}")))
}

/// Merge parameters into the query of `url`.
///
/// Existing pairs keep their position and raw text; a parameter whose
/// encoded key already exists replaces that pair's value, other parameters
/// are appended. The fragment is carried by `Url` and stays at the end. An
/// empty bag returns the URL untouched.
///
/// # Errors
/// `InvalidUrl` when `url` is not an absolute URL.
pub fn merge_query(url: &str, parameters: &Parameters) -> Result<String> {
    if parameters.is_empty() {
        return Ok(url.to_string());
    }

    let mut url = parse_url(url)?;
    let mut pairs: Vec<(String, String)> = url
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (pair.to_string(), String::new()),
        })
        .collect();

    for (key, value) in parameters {
        let key = urlencoding::encode(key).into_owned();
        let value = urlencoding::encode(&render_value(value)).into_owned();
        match pairs.iter_mut().find(|(existing, _)| *existing == key) {
            Some(pair) => pair.1 = value,
            None => pairs.push((key, value)),
        }
    }

    let query = pairs
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join("&");
    url.set_query(Some(&query));
    Ok(url.into())
}

/// Text form of a parameter value as it appears in a query string.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Bool(_) | Value::Number(_) | Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

fn encode_pair(key: &str, value: &Value) -> String {
    format!(
        "{}={}",
        urlencoding::encode(key),
        urlencoding::encode(&render_value(value))
    )
}
