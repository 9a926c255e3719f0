//! Per-application cache of keyset pairs.
//!
//! The map itself sits behind a reader/writer lock and is only held long
//! enough to look up or insert a pair. Each pair has its own mutex, which is
//! what serializes refreshes for one application without blocking requests
//! for other applications.
//!
//! # Example
//!
//! ```ignore
//! use healthvault_auth::session_cache::AuthSessionKeySetPairs;
//!
//! let cache = AuthSessionKeySetPairs::global();
//! let pair = cache.get_or_create(app_id, HmacAlgorithm::HmacSha256).await;
//! let snapshot = pair.lock().await.snapshot();
//! ```

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use tokio::sync::{Mutex, RwLock};

use healthvault_core::ApplicationId;

use crate::crypto::HmacAlgorithm;
use crate::keyset::AuthenticationTokenKeySetPair;

/// A pair shared between every request of one application.
pub type SharedKeySetPair = Arc<Mutex<AuthenticationTokenKeySetPair>>;

static GLOBAL: OnceLock<Arc<AuthSessionKeySetPairs>> = OnceLock::new();

/// Application id → keyset pair.
#[derive(Debug, Default)]
pub struct AuthSessionKeySetPairs {
    pairs: RwLock<HashMap<ApplicationId, SharedKeySetPair>>,
}

impl AuthSessionKeySetPairs {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide cache used by credentials unless one is injected.
    pub fn global() -> Arc<Self> {
        GLOBAL.get_or_init(|| Arc::new(Self::new())).clone()
    }

    /// Existing pair for `application_id`.
    pub async fn get(&self, application_id: &ApplicationId) -> Option<SharedKeySetPair> {
        self.pairs.read().await.get(application_id).cloned()
    }

    /// Existing pair, or a new unauthenticated one.
    ///
    /// Takes the read lock first; the write lock is only taken on a miss and
    /// the map is re-checked under it so racing callers share one pair.
    pub async fn get_or_create(
        &self,
        application_id: ApplicationId,
        algorithm: HmacAlgorithm,
    ) -> SharedKeySetPair {
        if let Some(pair) = self.get(&application_id).await {
            tracing::trace!(%application_id, "Keyset pair cache hit");
            return pair;
        }

        let mut pairs = self.pairs.write().await;
        pairs
            .entry(application_id)
            .or_insert_with(|| {
                tracing::debug!(%application_id, "Creating keyset pair");
                Arc::new(Mutex::new(AuthenticationTokenKeySetPair::new(
                    application_id,
                    algorithm,
                )))
            })
            .clone()
    }

    /// Forget the pair for `application_id`.
    pub async fn remove(&self, application_id: &ApplicationId) -> Option<SharedKeySetPair> {
        self.pairs.write().await.remove(application_id)
    }

    pub async fn clear(&self) {
        self.pairs.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.pairs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pairs.read().await.is_empty()
    }
}
