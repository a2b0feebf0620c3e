//! Studio: the explicitly constructed client container
//!
//! Owns the credential holder, the dialect backend, the task registry, the
//! poller and the credits cache, and runs the submit → record → poll →
//! apply-outcome flow.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use tunesmith_common::config::TomlConfig;
use tunesmith_common::time;
use tunesmith_common::{ApiProvider, KeyValueStore};

use crate::api::{
    build_backend, Credits, GenerateLyricsRequest, GenerateMusicRequest, GenerationBackend,
    HttpTransport, TaskStatusReport,
};
use crate::auth::AuthStore;
use crate::credits::CreditsCache;
use crate::error::ApiResult;
use crate::polling::{evaluate, PollOutcome, PollState, Poller};
use crate::tasks::{NewTask, Task, TaskKind, TaskRegistry};

/// Registry handle shared with poll callbacks
pub type SharedRegistry = Arc<Mutex<TaskRegistry>>;

/// Settings a studio is built from
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub provider: ApiProvider,
    pub base_url: String,
    pub request_timeout: Duration,
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn from_toml(config: &TomlConfig) -> Self {
        Self {
            provider: config.api.provider,
            base_url: config.api.effective_base_url(),
            request_timeout: Duration::from_secs(config.api.timeout_secs),
            poll_interval: time::millis_to_duration(config.polling.interval_ms),
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::from_toml(&TomlConfig::default())
    }
}

pub struct Studio {
    config: ClientConfig,
    auth: AuthStore,
    backend: Arc<dyn GenerationBackend>,
    registry: SharedRegistry,
    poller: Poller,
    credits: CreditsCache,
}

impl Studio {
    /// Build a studio talking HTTP to the configured dialect
    ///
    /// Loads a previously stored credential from `storage`. An unreadable
    /// store leaves the studio unauthenticated.
    pub fn new(config: ClientConfig, storage: Arc<dyn KeyValueStore>) -> ApiResult<Self> {
        let auth = AuthStore::new(storage);
        match auth.init_from_storage() {
            Ok(true) => debug!("Using stored API key"),
            Ok(false) => {}
            // Stay usable so `login` can rewrite the store
            Err(e) => warn!("Stored API key unreadable, continuing unauthenticated: {}", e),
        }

        let transport = HttpTransport::new(config.base_url.clone(), config.request_timeout, auth.clone())?;
        let backend = build_backend(config.provider, transport);

        info!(provider = %config.provider, base_url = %config.base_url, "Studio ready");
        Ok(Self::with_backend(config, auth, backend))
    }

    /// Build a studio around an existing backend
    pub fn with_backend(
        config: ClientConfig,
        auth: AuthStore,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        Self {
            poller: Poller::new(backend.clone(), config.poll_interval),
            credits: CreditsCache::new(backend.clone(), auth.clone()),
            registry: Arc::new(Mutex::new(TaskRegistry::new())),
            config,
            auth,
            backend,
        }
    }

    /// Replace the registry contents, e.g. with a restored snapshot
    pub fn with_registry(self, registry: TaskRegistry) -> Self {
        *lock_registry(&self.registry) = registry;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn provider(&self) -> ApiProvider {
        self.backend.provider()
    }

    pub fn auth(&self) -> &AuthStore {
        &self.auth
    }

    pub fn backend(&self) -> Arc<dyn GenerationBackend> {
        self.backend.clone()
    }

    pub fn registry(&self) -> SharedRegistry {
        self.registry.clone()
    }

    /// Snapshot of all task records, newest first
    pub fn tasks(&self) -> Vec<Task> {
        lock_registry(&self.registry).all().to_vec()
    }

    pub fn task(&self, id: &str) -> Option<Task> {
        lock_registry(&self.registry).get(id).cloned()
    }

    /// Submit a music generation and record it as pending
    pub async fn submit_music(&self, request: &GenerateMusicRequest) -> ApiResult<String> {
        let task_id = self.backend.generate_music(request).await?;
        self.record_pending(&task_id, TaskKind::Music, &request.prompt);
        Ok(task_id)
    }

    /// Submit a lyrics generation and record it as pending
    pub async fn submit_lyrics(&self, request: &GenerateLyricsRequest) -> ApiResult<String> {
        let task_id = self.backend.generate_lyrics(request).await?;
        self.record_pending(&task_id, TaskKind::Lyrics, &request.prompt);
        Ok(task_id)
    }

    fn record_pending(&self, task_id: &str, kind: TaskKind, prompt: &str) {
        lock_registry(&self.registry).add(NewTask::pending(task_id, kind, prompt));
        info!(task_id, %kind, "Task submitted");
    }

    /// Poll `task_id` until it finishes, applying the outcome to the registry
    ///
    /// Returns `None` when another task is already being polled. The receiver
    /// yields the outcome once the registry has been updated; it is closed
    /// without a value if polling is stopped first.
    pub fn track(&self, task_id: &str) -> Option<oneshot::Receiver<PollOutcome>> {
        let (tx, rx) = oneshot::channel();
        let registry = self.registry.clone();
        let id = task_id.to_string();

        let started = self.poller.start(task_id, move |outcome| {
            lock_registry(&registry).update(&id, outcome.to_update());
            let _ = tx.send(outcome);
        });

        started.then_some(rx)
    }

    pub fn stop_polling(&self) {
        self.poller.stop();
    }

    pub fn poll_state(&self) -> PollState {
        self.poller.state()
    }

    /// One status query without polling; a terminal answer updates the registry
    pub async fn check_status(&self, task_id: &str) -> ApiResult<TaskStatusReport> {
        let report = self.backend.task_status(task_id).await?;
        if report.status.is_some_and(|s| s.is_terminal()) {
            if let Some(outcome) = evaluate(&report) {
                lock_registry(&self.registry).update(task_id, outcome.to_update());
            }
        }
        Ok(report)
    }

    /// Remaining credits, cached for a few minutes unless `force` is set
    pub async fn credits(&self, force: bool) -> Option<Credits> {
        self.credits.fetch(force).await
    }

    pub async fn credits_error(&self) -> Option<String> {
        self.credits.last_error().await
    }

    pub fn remove_task(&self, id: &str) -> bool {
        lock_registry(&self.registry).remove(id)
    }

    pub fn clear_tasks(&self) {
        lock_registry(&self.registry).clear();
    }

    /// Stop polling, forget all tasks and the stored credential
    pub async fn reset(&self) -> ApiResult<()> {
        self.poller.stop();
        self.clear_tasks();
        self.credits.invalidate().await;
        self.auth.logout()?;
        Ok(())
    }
}

/// Lock the registry; a panicked holder leaves it usable
pub fn lock_registry(registry: &Mutex<TaskRegistry>) -> MutexGuard<'_, TaskRegistry> {
    registry.lock().unwrap_or_else(PoisonError::into_inner)
}
