use std::future::Future;

use metabase_admin_sdk::{Collection, PermissionGroupSummary, User};
use parking_lot::Mutex;

/// Cached result of the list call of one resource type.
///
/// Every invalidation bumps a generation counter. A fetch that started before
/// an invalidation does not store its (possibly stale) result.
pub struct ListCache<T> {
    state: Mutex<CacheState<T>>,
}

struct CacheState<T> {
    items: Option<Vec<T>>,
    generation: u64,
}

impl<T> Default for ListCache<T> {
    fn default() -> Self {
        Self {
            state: Mutex::new(CacheState {
                items: None,
                generation: 0,
            }),
        }
    }
}

impl<T: Clone> ListCache<T> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self) -> Option<Vec<T>> {
        self.state.lock().items.clone()
    }

    #[must_use]
    pub fn is_cached(&self) -> bool {
        self.state.lock().items.is_some()
    }

    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        state.items = None;
        state.generation += 1;
    }

    /// Return the cached list, or fetch and cache it.
    ///
    /// # Errors
    ///
    /// Whatever `fetch` fails with; nothing is cached then.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<Vec<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<T>, E>>,
    {
        let generation = {
            let state = self.state.lock();
            if let Some(items) = &state.items {
                return Ok(items.clone());
            }
            state.generation
        };

        let items = fetch().await?;

        let mut state = self.state.lock();
        if state.generation == generation {
            state.items = Some(items.clone());
        }
        Ok(items)
    }
}

/// The list caches kept by the client.
#[derive(Default)]
pub struct ListCaches {
    pub users: ListCache<User>,
    pub groups: ListCache<PermissionGroupSummary>,
    pub collections: ListCache<Collection>,
}

impl ListCaches {
    pub fn invalidate_all(&self) {
        self.users.invalidate();
        self.groups.invalidate();
        self.collections.invalidate();
    }
}
