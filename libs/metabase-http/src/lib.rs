//! Metabase HTTP transport
//!
//! One request/response cycle against the Metabase REST API with the session
//! header and user agent attached, and every outcome normalized into either a
//! decoded body or a [`TransportError`]:
//!
//! - [`Transport`] - the client; cheap to clone, optionally bound to a session
//! - [`ApiResponse`] - a successful response, with or without a body
//! - [`TransportError`] / [`ApiError`] - failure taxonomy
//! - [`TransportConfig`] - timeout and user agent
//!
//! ```ignore
//! use metabase_http::{Transport, TransportConfig};
//!
//! let transport = Transport::new("https://metabase.example.com", &TransportConfig::default())?;
//! let transport = transport.with_session(token);
//! let graph: serde_json::Value = transport.get("collection/graph").await?;
//! ```
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod config;
pub mod error;
pub mod transport;

pub use config::TransportConfig;
pub use error::{ApiError, ApiErrorDetail, ErrorEnvelope, TransportError};
pub use reqwest::{Method, StatusCode};
pub use transport::{ApiResponse, SESSION_HEADER, Transport};
