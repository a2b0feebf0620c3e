//! Remaining-credit lookup with a short-lived cache

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use tunesmith_common::time;

use crate::api::{Credits, GenerationBackend};
use crate::auth::AuthStore;

/// How long a fetched balance is reused
pub const CREDITS_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Default)]
struct CacheState {
    credits: Option<Credits>,
    fetched_at: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

/// Cached credits lookup
pub struct CreditsCache {
    backend: Arc<dyn GenerationBackend>,
    auth: AuthStore,
    ttl: Duration,
    state: Mutex<CacheState>,
}

impl CreditsCache {
    pub fn new(backend: Arc<dyn GenerationBackend>, auth: AuthStore) -> Self {
        Self::with_ttl(backend, auth, CREDITS_CACHE_TTL)
    }

    pub fn with_ttl(backend: Arc<dyn GenerationBackend>, auth: AuthStore, ttl: Duration) -> Self {
        Self {
            backend,
            auth,
            ttl,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// Current balance
    ///
    /// Serves the cached value while it is fresh unless `force` is set.
    /// Returns `None` when no credential is stored or the lookup failed; the
    /// failure message is then available from [`CreditsCache::last_error`].
    pub async fn fetch(&self, force: bool) -> Option<Credits> {
        let mut state = self.state.lock().await;

        if !force {
            if let (Some(credits), Some(fetched_at)) = (state.credits, state.fetched_at) {
                if !time::is_older_than(fetched_at, time::now(), self.ttl) {
                    debug!("Serving cached credits");
                    return Some(credits);
                }
            }
        }

        if !self.auth.is_authenticated() {
            return None;
        }

        state.last_error = None;
        match self.backend.credits().await {
            Ok(credits) => {
                state.credits = Some(credits);
                state.fetched_at = Some(time::now());
                Some(credits)
            }
            Err(e) => {
                warn!(code = e.code(), "Credits lookup failed: {}", e);
                state.last_error = Some(e.to_string());
                None
            }
        }
    }

    pub async fn last_error(&self) -> Option<String> {
        self.state.lock().await.last_error.clone()
    }

    /// Forget the cached balance
    pub async fn invalidate(&self) {
        let mut state = self.state.lock().await;
        state.credits = None;
        state.fetched_at = None;
    }
}
