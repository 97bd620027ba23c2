use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::Mutex;

use super::TokenError;
use super::fetcher::TokenFetcher;
use super::token::CachedToken;
use crate::domain::resolver::{CacheKey, OAuthConfig};

/// Per-key token state.
///
/// `current` is read without suspending. `refresh` serializes fetches for
/// the key and holds the outcome of the last one, so callers that queued
/// behind a fetch get its result instead of starting another, even when
/// the fresh token is already inside the expiry buffer.
#[derive(Default)]
struct TokenSlot {
    current: RwLock<Option<Arc<CachedToken>>>,
    refresh: Mutex<Option<FetchOutcome>>,
    completed: AtomicU64,
}

type FetchOutcome = Result<Arc<CachedToken>, TokenError>;

impl TokenSlot {
    fn valid_token(&self) -> Option<Arc<CachedToken>> {
        self.current
            .read()
            .as_ref()
            .filter(|token| token.is_valid())
            .map(Arc::clone)
    }
}

/// Process-wide OAuth2 token cache with single-flight refresh per key.
pub struct CredentialManager {
    fetcher: Arc<dyn TokenFetcher>,
    slots: DashMap<CacheKey, Arc<TokenSlot>>,
}

impl std::fmt::Debug for CredentialManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialManager")
            .field("keys", &self.slots.len())
            .finish_non_exhaustive()
    }
}

impl CredentialManager {
    #[must_use]
    pub fn new(fetcher: Arc<dyn TokenFetcher>) -> Self {
        Self {
            fetcher,
            slots: DashMap::new(),
        }
    }

    fn slot(&self, key: &CacheKey) -> Arc<TokenSlot> {
        if let Some(slot) = self.slots.get(key) {
            return Arc::clone(&slot);
        }
        Arc::clone(&self.slots.entry(key.clone()).or_default())
    }

    /// Return a valid token for `key`, fetching one if needed.
    ///
    /// A cached token inside its validity window is returned without a
    /// network call. Otherwise exactly one fetch runs for the key; callers
    /// arriving meanwhile wait and receive that fetch's result. A failed
    /// fetch evicts the key.
    ///
    /// # Errors
    ///
    /// Returns the `TokenError` of the fetch this call ran or waited on.
    pub async fn get_token(
        &self,
        oauth: &OAuthConfig,
        key: &CacheKey,
    ) -> Result<Arc<CachedToken>, TokenError> {
        let slot = self.slot(key);
        let seen = slot.completed.load(Ordering::Acquire);
        if let Some(token) = slot.valid_token() {
            return Ok(token);
        }

        let mut last_outcome = slot.refresh.lock().await;
        if slot.completed.load(Ordering::Acquire) != seen
            && let Some(outcome) = last_outcome.as_ref()
        {
            return outcome.clone();
        }
        if let Some(token) = slot.valid_token() {
            return Ok(token);
        }

        tracing::debug!(cache_key = %key, "Fetching OAuth2 token");
        let outcome = match self.fetcher.fetch(oauth).await {
            Ok(token) => {
                let token = Arc::new(token);
                *slot.current.write() = Some(Arc::clone(&token));
                Ok(token)
            }
            Err(err) => {
                slot.current.write().take();
                tracing::warn!(cache_key = %key, error = %err, "Token fetch failed, entry evicted");
                Err(err)
            }
        };
        *last_outcome = Some(outcome.clone());
        slot.completed.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Currently cached token for `key`, valid or not.
    #[must_use]
    pub fn cached(&self, key: &CacheKey) -> Option<Arc<CachedToken>> {
        self.slots
            .get(key)
            .and_then(|slot| slot.current.read().as_ref().map(Arc::clone))
    }

    /// Number of keys currently holding a token.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| slot.current.read().is_some())
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every cached token. Idempotent.
    pub fn clear_all(&self) {
        let keys = self.slots.len();
        self.slots.clear();
        tracing::info!(keys, "Token cache cleared");
    }

    /// Drop the token cached for `key`. Returns whether an entry existed.
    pub fn clear(&self, key: &CacheKey) -> bool {
        let removed = self.slots.remove(key).is_some();
        tracing::info!(cache_key = %key, removed, "Token cache entry cleared");
        removed
    }
}
