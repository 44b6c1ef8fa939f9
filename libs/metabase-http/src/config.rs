//! Transport configuration.

use std::time::Duration;

/// Default client-level timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by every request issued through a [`crate::Transport`].
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Upper bound for one request/response cycle, body included.
    pub timeout: Duration,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("metabase-admin/", env!("CARGO_PKG_VERSION")).to_owned(),
        }
    }
}

impl TransportConfig {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}
