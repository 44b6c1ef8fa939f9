//! Error types for the transport.

use std::collections::BTreeMap;
use std::fmt;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// Structured error body returned by the API on failure.
///
/// Both fields are optional on the wire; any JSON object decodes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorEnvelope {
    /// Per-field validation messages.
    #[serde(default)]
    pub errors: BTreeMap<String, String>,
    /// Top-level message.
    #[serde(default)]
    pub message: Option<String>,
}

impl fmt::Display for ErrorEnvelope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "errors={:?}", self.errors)?;
        if let Some(message) = &self.message {
            write!(f, ", message='{message}'")?;
        }
        Ok(())
    }
}

/// Body of a failed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiErrorDetail {
    /// The body decoded as an [`ErrorEnvelope`].
    Structured(ErrorEnvelope),
    /// The body did not decode; raw text as received.
    Raw(String),
}

impl fmt::Display for ApiErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structured(envelope) => envelope.fmt(f),
            Self::Raw(body) => f.write_str(body),
        }
    }
}

/// The server answered with a status outside `[200, 400)`.
#[derive(Debug, Clone, Error)]
#[error("{method} {url} returned {status}: {detail}")]
pub struct ApiError {
    pub method: Method,
    pub url: String,
    pub status: StatusCode,
    pub detail: ApiErrorDetail,
}

impl ApiError {
    /// Build an error from a failed response body.
    ///
    /// The body is tried as an [`ErrorEnvelope`] first and kept verbatim
    /// otherwise.
    #[must_use]
    pub fn from_body(method: Method, url: impl Into<String>, status: StatusCode, body: &[u8]) -> Self {
        let detail = match serde_json::from_slice::<ErrorEnvelope>(body) {
            Ok(envelope) => ApiErrorDetail::Structured(envelope),
            Err(_) => ApiErrorDetail::Raw(String::from_utf8_lossy(body).into_owned()),
        };
        Self {
            method,
            url: url.into(),
            status,
            detail,
        }
    }

    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn envelope(&self) -> Option<&ErrorEnvelope> {
        match &self.detail {
            ApiErrorDetail::Structured(envelope) => Some(envelope),
            ApiErrorDetail::Raw(_) => None,
        }
    }

    /// Whether any part of the error text contains `needle`.
    ///
    /// Looks at the top-level message, every field message and the raw body.
    #[must_use]
    pub fn mentions(&self, needle: &str) -> bool {
        match &self.detail {
            ApiErrorDetail::Structured(envelope) => {
                envelope
                    .message
                    .as_deref()
                    .is_some_and(|m| m.contains(needle))
                    || envelope.errors.values().any(|m| m.contains(needle))
            }
            ApiErrorDetail::Raw(body) => body.contains(needle),
        }
    }
}

/// Errors produced by [`crate::Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    /// No response: DNS failure, refused connection, reset, TLS failure.
    #[error("network error calling {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The client-level timeout elapsed before the exchange completed.
    ///
    /// The server may or may not have processed the request.
    #[error("request to {url} timed out")]
    Timeout {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The server responded outside `[200, 400)`.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A success response whose body is not the expected JSON shape.
    #[error("failed to decode response from {url} (status {status}): {source}")]
    Decode {
        url: String,
        status: StatusCode,
        #[source]
        source: serde_json::Error,
    },

    /// A body was required but the server answered `204 No Content`.
    #[error("response from {url} has no body")]
    MissingBody { url: String },

    /// The request could not be built (bad URL, bad header value, body encoding).
    #[error("invalid request to {url}: {reason}")]
    InvalidRequest { url: String, reason: String },
}

impl TransportError {
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Self::Timeout {
                url: url.to_owned(),
                source,
            }
        } else if source.is_builder() {
            Self::InvalidRequest {
                url: url.to_owned(),
                reason: source.to_string(),
            }
        } else {
            Self::Network {
                url: url.to_owned(),
                source,
            }
        }
    }

    /// No response was received (connection failure or timeout).
    #[must_use]
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network { .. } | Self::Timeout { .. })
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// The server answered, but the body did not have the expected shape.
    #[must_use]
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::MissingBody { .. })
    }

    #[must_use]
    pub fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn status(&self) -> Option<StatusCode> {
        self.as_api().map(ApiError::status)
    }
}
