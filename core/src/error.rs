//! Error types for request building, dispatch and decoding.
//!
//! # Design
//! Build-time failures (`ParametersNil`, `EncodingFailed`, `MissingUrl`,
//! `InvalidUrl`) happen before any network call. Transport failures are
//! opaque and arrive through a completion, wrapped in `Transport`. `Decode`
//! only surfaces when the router is configured to surface decode failures;
//! by default they are swallowed and the caller sees an absent payload.

use thiserror::Error;

/// Errors produced while building, sending or decoding a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A parameter bag required by the selected encoder was absent.
    #[error("parameters were nil")]
    ParametersNil,

    /// The parameter bag could not be serialized.
    #[error("parameter encoding failed: {0}")]
    EncodingFailed(String),

    /// The request had no URL when url-encoding was attempted.
    #[error("URL is nil")]
    MissingUrl,

    /// The derived URL could not be parsed.
    #[error("invalid url: {0}")]
    InvalidUrl(String),

    /// The transport failed to complete the exchange.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body could not be decoded into the expected type.
    #[error("decode failed: {0}")]
    Decode(String),

    /// An environment or router configuration value was rejected.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Opaque failure reported by a `Transport` implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connection(String),

    /// The exchange started but the response could not be read.
    #[error("response could not be read: {0}")]
    Status(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
