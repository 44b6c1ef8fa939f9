//! Request/response cycle against the Metabase API.

use std::time::Instant;

use reqwest::{Method, RequestBuilder, StatusCode, header};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::TransportConfig;
use crate::error::{ApiError, TransportError};

/// Header carrying the session token.
pub const SESSION_HEADER: &str = "X-Metabase-Session";

/// A success response (`[200, 400)`).
#[derive(Debug, Clone)]
pub struct ApiResponse<T> {
    url: Url,
    status: StatusCode,
    body: Option<T>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// `None` only for `204 No Content`.
    #[must_use]
    pub fn body(&self) -> Option<&T> {
        self.body.as_ref()
    }

    #[must_use]
    pub fn into_body(self) -> Option<T> {
        self.body
    }

    /// Take the decoded body, treating `204 No Content` as an error.
    ///
    /// # Errors
    ///
    /// `MissingBody` if the server answered without a body.
    pub fn into_required(self) -> Result<T, TransportError> {
        self.body.ok_or_else(|| TransportError::MissingBody {
            url: self.url.to_string(),
        })
    }
}

/// HTTP client bound to one Metabase instance.
///
/// Cloning is cheap: the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: Url,
    user_agent: String,
    session: Option<SecretString>,
}

impl Transport {
    /// Create a transport for `host` (scheme included), without a session.
    ///
    /// Requests are resolved against `{host}/api/`.
    ///
    /// # Errors
    ///
    /// `InvalidRequest` if `host` is not an absolute http(s) URL or the HTTP
    /// client cannot be built.
    pub fn new(host: &str, config: &TransportConfig) -> Result<Self, TransportError> {
        let base_url = api_base_url(host)?;
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| TransportError::InvalidRequest {
                url: base_url.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            base_url,
            user_agent: config.user_agent.clone(),
            session: None,
        })
    }

    /// A copy of this transport that sends `token` with every request.
    #[must_use]
    pub fn with_session(&self, token: SecretString) -> Self {
        Self {
            session: Some(token),
            ..self.clone()
        }
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Issue one request and classify the outcome.
    ///
    /// `204 No Content` yields a response without a body; any other success
    /// status has its body decoded into `T`.
    ///
    /// # Errors
    ///
    /// - `Api` for statuses outside `[200, 400)`
    /// - `Decode` if a success body does not decode into `T`
    /// - `Network` / `Timeout` if no response was received
    /// - `InvalidRequest` if the request could not be built
    pub async fn execute<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, TransportError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = self.url_for(path)?;
        let mut request = self.prepare(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }

        let (status, bytes) = self.dispatch(&method, &url, request).await?;
        if status == StatusCode::NO_CONTENT {
            return Ok(ApiResponse {
                url,
                status,
                body: None,
            });
        }

        let body = serde_json::from_slice::<T>(&bytes).map_err(|source| TransportError::Decode {
            url: url.to_string(),
            status,
            source,
        })?;

        Ok(ApiResponse {
            url,
            status,
            body: Some(body),
        })
    }

    /// Issue one request and report only its status; the body is discarded.
    ///
    /// # Errors
    ///
    /// Same as [`Transport::execute`], minus `Decode`.
    pub async fn probe(&self, method: Method, path: &str) -> Result<StatusCode, TransportError> {
        let url = self.url_for(path)?;
        let request = self.prepare(method.clone(), &url);
        let (status, _) = self.dispatch(&method, &url, request).await?;
        Ok(status)
    }

    /// `GET` a resource that must have a body.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`]; additionally `MissingBody` on `204`.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, TransportError> {
        self.execute::<T, ()>(Method::GET, path, None)
            .await?
            .into_required()
    }

    /// `POST` a JSON body and decode the required response body.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`]; additionally `MissingBody` on `204`.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::POST, path, Some(body))
            .await?
            .into_required()
    }

    /// `PUT` a JSON body and decode the required response body.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`]; additionally `MissingBody` on `204`.
    pub async fn put<B, T>(&self, path: &str, body: &B) -> Result<T, TransportError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.execute(Method::PUT, path, Some(body))
            .await?
            .into_required()
    }

    /// `DELETE` a resource; the server may or may not answer with a body.
    ///
    /// # Errors
    ///
    /// See [`Transport::execute`].
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<ApiResponse<T>, TransportError> {
        self.execute::<T, ()>(Method::DELETE, path, None).await
    }

    fn url_for(&self, path: &str) -> Result<Url, TransportError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| TransportError::InvalidRequest {
                url: format!("{}{path}", self.base_url),
                reason: e.to_string(),
            })
    }

    fn prepare(&self, method: Method, url: &Url) -> RequestBuilder {
        let request = self
            .http
            .request(method, url.clone())
            .header(header::USER_AGENT, self.user_agent.as_str());
        match &self.session {
            Some(token) => request.header(SESSION_HEADER, token.expose_secret()),
            None => request,
        }
    }

    async fn dispatch(
        &self,
        method: &Method,
        url: &Url,
        request: RequestBuilder,
    ) -> Result<(StatusCode, Vec<u8>), TransportError> {
        let started = Instant::now();
        debug!(%method, %url, session = self.session.is_some(), "Sending request");

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| TransportError::from_reqwest(url.as_str(), e))?;

        debug!(
            %method,
            %url,
            status = status.as_u16(),
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Received response"
        );

        if status.as_u16() < 200 || status.as_u16() >= 400 {
            let err = ApiError::from_body(method.clone(), url.as_str(), status, &bytes);
            warn!(%method, %url, status = status.as_u16(), detail = %err.detail, "Request failed");
            return Err(err.into());
        }

        Ok((status, bytes.to_vec()))
    }
}

fn api_base_url(host: &str) -> Result<Url, TransportError> {
    let invalid = |reason: String| TransportError::InvalidRequest {
        url: host.to_owned(),
        reason,
    };

    let mut base = Url::parse(host).map_err(|e| invalid(e.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
    }
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base.join("api/").map_err(|e| invalid(e.to_string()))
}
