//! Error types for the Metabase admin client.

use metabase_http::{ApiError, StatusCode, TransportError};
use thiserror::Error;

use crate::models::{GroupId, PermissionGraph};

/// Establishing a session failed.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The login exchange was answered with a non-success status.
    #[error("login as '{username}' rejected: {source}")]
    LoginRejected {
        username: String,
        #[source]
        source: ApiError,
    },

    /// The login succeeded but the response carried no session id.
    #[error("login as '{username}' returned an empty session id")]
    EmptyToken { username: String },

    /// The login exchange could not be completed.
    #[error("login failed: {0}")]
    Transport(#[source] TransportError),
}

impl AuthError {
    /// Classify a failed login exchange.
    #[must_use]
    pub fn from_login_failure(username: &str, err: TransportError) -> Self {
        match err {
            TransportError::Api(source) => Self::LoginRejected {
                username: username.to_owned(),
                source,
            },
            other => Self::Transport(other),
        }
    }
}

/// Broad reason a permission graph operation failed.
///
/// Lets callers tell "gave up after legitimate contention" apart from
/// permanent errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Every submit lost the revision race.
    Contention,
    /// The server refused the payload (400, 422).
    Validation,
    /// The session may not perform the operation (401, 403).
    Authorization,
    /// Any other server-side rejection.
    Server,
    /// No response, or a response that could not be decoded.
    Transport,
    /// A submit timed out; whether it was applied is unknown.
    Indeterminate,
    Cancelled,
}

impl FailureKind {
    fn from_status(status: StatusCode) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Self::Authorization,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => Self::Validation,
            _ => Self::Server,
        }
    }

    fn from_transport(err: &TransportError) -> Self {
        err.status().map_or(Self::Transport, Self::from_status)
    }
}

/// Updating the permission graph failed.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Reading the current graph failed; nothing was submitted.
    #[error("failed to fetch permission graph: {0}")]
    Fetch(#[source] TransportError),

    /// The server rejected the submitted graph for a reason other than a
    /// revision conflict.
    #[error("permission graph update rejected: {0}")]
    Rejected(#[source] ApiError),

    /// The submit timed out. The server may or may not have applied it;
    /// re-fetch and inspect before retrying.
    #[error("permission graph update outcome unknown: {0}")]
    Indeterminate(#[source] TransportError),

    /// The submit failed without a usable server answer.
    #[error("permission graph update failed: {0}")]
    Transport(#[source] TransportError),

    /// Every submit attempt hit a revision conflict.
    #[error("permission graph update gave up after {attempts} conflicting submits: {last_conflict}")]
    RetriesExhausted {
        attempts: u32,
        /// The last graph that was submitted and rejected.
        last_attempt: Box<PermissionGraph>,
        #[source]
        last_conflict: ApiError,
    },

    #[error("permission graph update cancelled")]
    Cancelled,
}

impl SyncError {
    #[must_use]
    pub fn exhausted_retries(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }

    /// The failure never reached the server (connection failure or timeout).
    #[must_use]
    pub fn is_network(&self) -> bool {
        match self {
            Self::Fetch(err) | Self::Transport(err) | Self::Indeterminate(err) => err.is_network(),
            Self::Rejected(_) | Self::RetriesExhausted { .. } | Self::Cancelled => false,
        }
    }

    #[must_use]
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Self::Fetch(err) | Self::Transport(err) => FailureKind::from_transport(err),
            Self::Rejected(err) => FailureKind::from_status(err.status()),
            Self::Indeterminate(_) => FailureKind::Indeterminate,
            Self::RetriesExhausted { .. } => FailureKind::Contention,
            Self::Cancelled => FailureKind::Cancelled,
        }
    }
}

/// Top-level error of the admin client.
#[derive(Debug, Error)]
pub enum MetabaseError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// Membership creation succeeded but the response did not list the user.
    #[error("membership of user {user_id} in group {group_id} missing from server response")]
    MembershipNotReturned { user_id: u64, group_id: GroupId },
}

impl MetabaseError {
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}
