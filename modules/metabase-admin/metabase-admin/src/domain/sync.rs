use std::time::Duration;

use metabase_admin_sdk::{AccessSpec, CollectionAccess, CollectionId, PermissionGraph, SyncError};
use metabase_http::{ApiError, StatusCode, TransportError};
use rand::Rng;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::overlay;
use super::ports::GraphStore;

/// Substring older servers put in the error of a lost revision race instead
/// of answering 409.
const LEGACY_CONFLICT_MARKER: &str = "collection_revision_pkey";

/// Retry budget and backoff of [`GraphSynchronizer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of submits per update, the first one included.
    pub max_attempts: u32,
    pub base_delay: Duration,
    /// Upper bound (exclusive) of the uniform random delay added to `base_delay`.
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            base_delay: Duration::from_millis(500),
            jitter: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next fetch after a conflict.
    #[must_use]
    pub fn backoff(&self, rng: &mut impl Rng) -> Duration {
        if self.jitter.is_zero() {
            return self.base_delay;
        }
        self.base_delay + rng.random_range(Duration::ZERO..self.jitter)
    }

    fn budget(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Whether a refused submit lost the revision race.
fn is_conflict(err: &ApiError) -> bool {
    err.status() == StatusCode::CONFLICT || is_legacy_conflict(err)
}

fn is_legacy_conflict(err: &ApiError) -> bool {
    err.mentions(LEGACY_CONFLICT_MARKER)
}

/// Optimistic read-modify-write of the permission graph.
///
/// One update runs `fetch -> merge -> submit`; a revision conflict sends it
/// back to `fetch` after a backoff, until the retry budget is spent. Updates
/// issued through the same synchronizer never interleave.
pub struct GraphSynchronizer<S> {
    store: S,
    policy: RetryPolicy,
    lock: Mutex<()>,
}

impl<S: GraphStore> GraphSynchronizer<S> {
    #[must_use]
    pub fn new(store: S, policy: RetryPolicy) -> Self {
        Self {
            store,
            policy,
            lock: Mutex::new(()),
        }
    }

    #[must_use]
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// # Errors
    ///
    /// `Fetch` if the graph cannot be read.
    pub async fn current_graph(&self) -> Result<PermissionGraph, SyncError> {
        self.store.fetch().await.map_err(SyncError::Fetch)
    }

    /// # Errors
    ///
    /// `Fetch` if the graph cannot be read.
    pub async fn collection_access(
        &self,
        target: &CollectionId,
    ) -> Result<CollectionAccess, SyncError> {
        let graph = self.current_graph().await?;
        Ok(overlay::extract(&graph.groups, target))
    }

    /// Make `spec` the access of `target`.
    ///
    /// # Errors
    ///
    /// See [`GraphSynchronizer::update_graph_cancellable`]; never `Cancelled`.
    pub async fn update_graph(
        &self,
        target: &CollectionId,
        spec: &AccessSpec,
    ) -> Result<PermissionGraph, SyncError> {
        self.update_graph_cancellable(target, spec, &CancellationToken::new())
            .await
    }

    /// Make `spec` the access of `target`, giving up when `cancel` fires.
    ///
    /// Cancellation is observed while waiting for the lock, between steps and
    /// during backoff; a request already in flight is never abandoned.
    ///
    /// # Errors
    ///
    /// - `Fetch` if the graph cannot be read (never retried)
    /// - `RetriesExhausted` if every submit hit a revision conflict
    /// - `Indeterminate` if a submit timed out
    /// - `Rejected` / `Transport` for any other submit failure
    /// - `Cancelled`
    #[tracing::instrument(skip_all, fields(collection = %target))]
    pub async fn update_graph_cancellable(
        &self,
        target: &CollectionId,
        spec: &AccessSpec,
        cancel: &CancellationToken,
    ) -> Result<PermissionGraph, SyncError> {
        let _guard = tokio::select! {
            guard = self.lock.lock() => guard,
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
        };

        let budget = self.policy.budget();
        let mut attempt = 0u32;
        loop {
            ensure_active(cancel)?;
            let fetched = self.store.fetch().await.map_err(SyncError::Fetch)?;

            ensure_active(cancel)?;
            let desired = overlay::merge(&fetched, target, spec);
            debug!(revision = fetched.revision, "Merged access into permission graph");

            ensure_active(cancel)?;
            attempt += 1;
            let conflict = match self.store.submit(&desired).await {
                Ok(stored) => {
                    info!(
                        attempt,
                        revision = stored.revision,
                        "Permission graph updated"
                    );
                    return Ok(stored);
                }
                Err(TransportError::Api(err)) if is_conflict(&err) => err,
                Err(TransportError::Api(err)) => return Err(SyncError::Rejected(err)),
                Err(err) if err.is_timeout() => {
                    warn!(attempt, error = %err, "Permission graph submit timed out");
                    return Err(SyncError::Indeterminate(err));
                }
                Err(err) => return Err(SyncError::Transport(err)),
            };

            if attempt >= budget {
                warn!(attempt, "Permission graph retry budget exhausted");
                return Err(SyncError::RetriesExhausted {
                    attempts: attempt,
                    last_attempt: Box::new(desired),
                    last_conflict: conflict,
                });
            }

            let delay = self.policy.backoff(&mut rand::rng());
            warn!(
                attempt,
                revision = desired.revision,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                "Permission graph revision conflict, retrying"
            );
            tokio::select! {
                () = tokio::time::sleep(delay) => {}
                () = cancel.cancelled() => return Err(SyncError::Cancelled),
            }
        }
    }
}

fn ensure_active(cancel: &CancellationToken) -> Result<(), SyncError> {
    if cancel.is_cancelled() {
        return Err(SyncError::Cancelled);
    }
    Ok(())
}
