//! Cached bearer-credential provider.
//!
//! Wraps the gateway's auth endpoint behind a read-mostly cache. A
//! credential is reused until it expires or a downstream call reports
//! unauthorized; [`TokenProvider::invalidate`] drops the cache so the caller
//! can refetch once and retry its operation. The retry-at-most-once policy
//! lives at the call sites (initiator, reconciler), not here.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::AuthError;
use crate::gateway::{Credential, Gateway};

/// Caching front for the gateway's token endpoint.
pub struct TokenProvider {
    gateway: Arc<dyn Gateway>,
    cached: RwLock<Option<Credential>>,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider").finish_non_exhaustive()
    }
}

impl TokenProvider {
    /// Creates a provider with an empty cache.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        Self {
            gateway,
            cached: RwLock::new(None),
        }
    }

    /// Returns a usable credential, fetching one if absent or expired.
    ///
    /// Concurrent callers that miss the cache serialize on the write lock;
    /// whoever acquires it first fetches, the rest reuse the fresh value.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the gateway rejects the client
    /// credentials or is unreachable.
    pub async fn get(&self) -> Result<Credential, AuthError> {
        if let Some(credential) = self.cached.read().await.as_ref() {
            if !credential.is_expired() {
                return Ok(credential.clone());
            }
        }

        let mut slot = self.cached.write().await;
        // another task may have refreshed while we waited for the lock
        if let Some(credential) = slot.as_ref() {
            if !credential.is_expired() {
                return Ok(credential.clone());
            }
        }

        let credential = self.gateway.fetch_token().await?;
        tracing::debug!("fetched fresh gateway credential");
        *slot = Some(credential.clone());
        Ok(credential)
    }

    /// Drops the cached credential, e.g. after the gateway rejected it.
    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}
