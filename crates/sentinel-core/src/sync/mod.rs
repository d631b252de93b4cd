//! Connectivity manager.
//!
//! `SyncEngine` owns the connection lifecycle: it rehydrates the persisted
//! cache, bootstraps from the backend, attaches push subscriptions, and
//! falls back to cached or synthetic data whenever the backend is out of
//! reach. Two background timers drive it while disconnected: a reconnection
//! timer and a synthetic-update trickle.

pub mod bootstrap;
pub mod subscriptions;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use chrono::Utc;
use tokio::task::JoinHandle;

use crate::backend::{Backend, Connector};
use crate::cache::PersistedCache;
use crate::config::EngineConfig;
use crate::detect::{detect_outbreaks, observations};
use crate::error::{Error, Result};
use crate::fallback::FallbackGenerator;
use crate::models::{EntityId, EntityKind, EntityRecord};
use crate::state::ConnectionState;
use crate::store::EntityStore;

pub use bootstrap::BootstrapReport;
use subscriptions::AttachedSubscription;

/// Result of a reconnection request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    Connected(BootstrapReport),
    /// The attempt failed; the engine stays in its previous mode
    Failed(String),
    /// Another attempt was already in flight; this request was dropped
    AlreadyInProgress,
    /// Offline mode was entered; no attempt was made
    Offline,
}

impl ReconnectOutcome {
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected(_))
    }
}

#[derive(Default)]
struct Session {
    backend: Option<Arc<dyn Backend>>,
    subscriptions: Vec<AttachedSubscription>,
    reconnect_timer: Option<JoinHandle<()>>,
    synthetic_timer: Option<JoinHandle<()>>,
    cache_writer: Option<JoinHandle<()>>,
}

struct EngineInner {
    config: EngineConfig,
    store: Arc<EntityStore>,
    connector: Arc<dyn Connector>,
    cache: Option<PersistedCache>,
    generator: Mutex<FallbackGenerator>,
    reconnecting: AtomicBool,
    /// Bumped by offline mode and teardown; attempts started under an older
    /// generation must not commit.
    generation: AtomicU64,
    rehydrated: AtomicBool,
    session: Mutex<Session>,
}

/// Held for the duration of one connection attempt. Dropping it, including
/// when the attempting task is aborted, releases the re-entrancy flag.
struct AttemptGuard<'a> {
    inner: &'a EngineInner,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        self.inner.store.end_connection_attempt();
        self.inner.reconnecting.store(false, Ordering::SeqCst);
    }
}

/// Who asked for a connection attempt.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Initialize,
    Manual,
    Timer,
}

/// Handle to the sync engine. Cheap to clone.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

impl SyncEngine {
    pub fn new(config: EngineConfig, connector: Arc<dyn Connector>) -> Self {
        Self::with_generator(config, connector, FallbackGenerator::from_entropy())
    }

    /// Build with a specific generator, e.g. a seeded one for reproducible runs.
    pub fn with_generator(
        config: EngineConfig,
        connector: Arc<dyn Connector>,
        generator: FallbackGenerator,
    ) -> Self {
        let cache = config.cache_path.clone().map(PersistedCache::new);
        Self {
            inner: Arc::new(EngineInner {
                config,
                store: Arc::new(EntityStore::new()),
                connector,
                cache,
                generator: Mutex::new(generator),
                reconnecting: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                rehydrated: AtomicBool::new(false),
                session: Mutex::new(Session::default()),
            }),
        }
    }

    pub fn store(&self) -> &Arc<EntityStore> {
        &self.inner.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.store.connection_state()
    }

    /// Bring the engine up and return its teardown handle.
    ///
    /// Never fails: every connection problem ends in a fallback mode with
    /// cached or synthetic data and, unless offline mode is set, a running
    /// reconnection timer.
    pub async fn initialize(&self) -> SyncHandle {
        self.inner.rehydrate_once();

        if self.inner.store.is_offline_mode() {
            tracing::info!("Starting in offline mode");
            self.inner.enter_offline();
            return self.handle();
        }

        if let Some(attempt) = self.inner.begin_attempt() {
            let result = EngineInner::connect(&self.inner, Trigger::Initialize).await;
            drop(attempt);
            match result {
                Ok(_) => {}
                Err(Error::Cancelled(reason)) => {
                    tracing::info!("Initial connect abandoned: {reason}");
                }
                Err(error) => {
                    tracing::warn!("Backend unavailable, using fallback data: {error}");
                    EngineInner::enter_fallback(&self.inner);
                }
            }
        } else {
            tracing::debug!("Connection attempt already in flight; skipping initial connect");
        }

        self.handle()
    }

    /// Operator-requested reconnection.
    ///
    /// Overlapping calls are dropped. On failure the current mode
    /// (disconnected or offline) is kept.
    pub async fn manual_reconnect(&self) -> ReconnectOutcome {
        let Some(attempt) = self.inner.begin_attempt() else {
            tracing::debug!("Ignoring reconnect request: attempt already in flight");
            return ReconnectOutcome::AlreadyInProgress;
        };
        let result = EngineInner::connect(&self.inner, Trigger::Manual).await;
        drop(attempt);

        match result {
            Ok(report) => ReconnectOutcome::Connected(report),
            Err(error @ Error::Cancelled(_)) => {
                tracing::info!("Manual reconnect abandoned: {error}");
                ReconnectOutcome::Failed(error.to_string())
            }
            Err(error) => {
                tracing::warn!("Manual reconnect failed: {error}");
                let status = self.inner.store.status();
                if !status.is_offline_mode && !status.is_connected {
                    EngineInner::enter_fallback(&self.inner);
                }
                ReconnectOutcome::Failed(error.to_string())
            }
        }
    }

    /// Enter or leave operator-selected offline mode.
    ///
    /// Entering offline mode cancels any attempt in flight; that attempt
    /// cannot bring the engine back online. Leaving offline mode attempts a
    /// reconnect; if that fails the engine returns to offline mode and
    /// reports the failure in the outcome.
    pub async fn set_offline_mode(&self, enabled: bool) -> ReconnectOutcome {
        if enabled {
            self.inner.fence_attempts();
            self.inner.stop_reconnect_timer().await;
            self.inner.detach().await;
            self.inner.enter_offline();
            tracing::info!("Offline mode enabled");
            return ReconnectOutcome::Offline;
        }

        let Some(attempt) = self.inner.begin_attempt() else {
            return ReconnectOutcome::AlreadyInProgress;
        };
        self.inner.store.set_offline_mode(false);
        tracing::info!("Offline mode disabled; reconnecting");
        let result = EngineInner::connect(&self.inner, Trigger::Manual).await;
        drop(attempt);

        match result {
            Ok(report) => ReconnectOutcome::Connected(report),
            Err(error @ Error::Cancelled(_)) => {
                tracing::info!("Reconnect after leaving offline mode abandoned: {error}");
                ReconnectOutcome::Failed(error.to_string())
            }
            Err(error) => {
                tracing::warn!("Reconnect after leaving offline mode failed: {error}");
                self.inner.enter_offline();
                ReconnectOutcome::Failed(error.to_string())
            }
        }
    }

    /// Mark an alert acknowledged. Returns `false` for unknown ids.
    pub fn acknowledge_alert(&self, id: &EntityId) -> bool {
        self.inner.store.acknowledge_alert(id)
    }

    /// Run outbreak detection over the stored cases and append outbreaks
    /// not already present. Returns how many were added.
    pub fn refresh_outbreaks(&self) -> usize {
        self.inner.refresh_outbreaks()
    }

    fn handle(&self) -> SyncHandle {
        SyncHandle {
            engine: self.clone(),
            torn_down: Arc::new(AtomicBool::new(false)),
        }
    }
}

impl EngineInner {
    fn begin_attempt(&self) -> Option<AttemptGuard<'_>> {
        self.reconnecting
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| AttemptGuard { inner: self })
    }

    fn fence_attempts(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    fn ensure_current(&self, generation: u64) -> Result<()> {
        if self.generation.load(Ordering::SeqCst) == generation {
            Ok(())
        } else {
            Err(superseded())
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn generator(&self) -> MutexGuard<'_, FallbackGenerator> {
        self.generator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn rehydrate_once(&self) {
        if self.rehydrated.swap(true, Ordering::SeqCst) {
            return;
        }
        let Some(cache) = &self.cache else {
            return;
        };
        cache.rehydrate(&self.store);
        let writer = cache.spawn_writer(Arc::clone(&self.store));
        if let Some(previous) = self.session().cache_writer.replace(writer) {
            previous.abort();
        }
    }

    /// One connection attempt: connect, bootstrap, subscribe.
    ///
    /// The caller holds the [`AttemptGuard`], which ends the attempt.
    async fn connect(this: &Arc<Self>, trigger: Trigger) -> Result<BootstrapReport> {
        let generation = this.generation.load(Ordering::SeqCst);
        this.store.begin_connection_attempt();
        Self::try_connect(this, trigger, generation).await
    }

    async fn try_connect(
        this: &Arc<Self>,
        trigger: Trigger,
        generation: u64,
    ) -> Result<BootstrapReport> {
        let backend = this.connector.connect().await?;
        this.ensure_current(generation)?;
        let report = bootstrap::load(backend.as_ref(), &this.store, this.config.history_limit).await;
        this.ensure_current(generation)?;
        if report.is_empty() {
            return Err(Error::Backend(format!(
                "bootstrap produced no records ({} fetches failed)",
                report.failed.len()
            )));
        }
        if report.replaced(EntityKind::Case) {
            this.refresh_outbreaks();
        }

        this.detach().await;
        let attached = subscriptions::attach(backend.as_ref(), &this.store).await;

        // a fence landing after this commit detaches the session it made
        let committed = {
            let mut session = this.session();
            if this.ensure_current(generation).is_ok() {
                session.backend = Some(Arc::clone(&backend));
                session.subscriptions = attached;
                this.store.set_connected(true);
                Ok((session.reconnect_timer.take(), session.synthetic_timer.take()))
            } else {
                Err(attached)
            }
        };
        let (reconnect_timer, synthetic_timer) = match committed {
            Ok(timers) => timers,
            Err(attached) => {
                release(Some(backend), attached).await;
                return Err(superseded());
            }
        };
        if let Some(timer) = synthetic_timer {
            timer.abort();
        }
        // the timer task itself may be running this attempt; it exits on success
        if let Some(timer) = reconnect_timer {
            if trigger != Trigger::Timer {
                timer.abort();
            }
        }

        tracing::info!(
            "Connected: {} records loaded, {} kinds failed",
            report.total_records(),
            report.failed.len()
        );
        Ok(report)
    }

    /// No-backend path: keep whatever data exists, fill the gaps with
    /// synthetic data, and keep retrying in the background.
    fn enter_fallback(this: &Arc<Self>) {
        this.store.set_connected(false);
        this.seed_missing();
        Self::ensure_reconnect_timer(this);
        Self::ensure_synthetic_timer(this);
    }

    fn enter_offline(self: &Arc<Self>) {
        self.store.set_offline_mode(true);
        self.seed_missing();
        Self::ensure_synthetic_timer(self);
    }

    fn seed_missing(&self) {
        let seeded = self.generator().seed_missing(&self.store, Utc::now());
        if seeded.contains(&EntityKind::Case) {
            self.refresh_outbreaks();
        }
    }

    fn refresh_outbreaks(&self) -> usize {
        let cases = self.store.cases();
        let detected = detect_outbreaks(&observations(&[], &cases), &self.config.detector);
        let known: HashSet<EntityId> = self
            .store
            .outbreaks()
            .into_iter()
            .map(|outbreak| outbreak.id)
            .collect();

        let mut added = 0;
        for outbreak in detected {
            if !known.contains(&outbreak.id) {
                self.store.append(EntityRecord::Outbreak(outbreak));
                added += 1;
            }
        }
        if added > 0 {
            tracing::info!("Detected {added} new outbreaks");
        }
        added
    }

    fn ensure_reconnect_timer(this: &Arc<Self>) {
        let mut session = this.session();
        if session
            .reconnect_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
        {
            return;
        }
        session.reconnect_timer = Some(spawn_reconnect_timer(Arc::downgrade(this)));
    }

    /// Abort the reconnection timer and wait until its task is gone, so an
    /// attempt it was running has released its guard.
    async fn stop_reconnect_timer(&self) {
        let timer = self.session().reconnect_timer.take();
        if let Some(timer) = timer {
            stop_task(timer).await;
        }
    }

    fn ensure_synthetic_timer(this: &Arc<Self>) {
        let mut session = this.session();
        if session
            .synthetic_timer
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
        {
            return;
        }
        session.synthetic_timer = Some(spawn_synthetic_timer(Arc::downgrade(this)));
    }

    /// Detach all push subscriptions. Failures are logged, never raised.
    async fn detach(&self) {
        let (backend, attached) = {
            let mut session = self.session();
            (session.backend.take(), std::mem::take(&mut session.subscriptions))
        };
        release(backend, attached).await;
    }

    async fn shutdown(&self) {
        self.fence_attempts();
        self.detach().await;
        let (reconnect_timer, synthetic_timer, cache_writer) = {
            let mut session = self.session();
            (
                session.reconnect_timer.take(),
                session.synthetic_timer.take(),
                session.cache_writer.take(),
            )
        };
        for task in [reconnect_timer, synthetic_timer, cache_writer]
            .into_iter()
            .flatten()
        {
            stop_task(task).await;
        }
        self.rehydrated.store(false, Ordering::SeqCst);

        self.store.set_connected(false);
        if let Some(cache) = &self.cache {
            cache.flush(&self.store);
        }
        tracing::info!("Sync engine torn down");
    }
}

fn superseded() -> Error {
    Error::Cancelled("offline mode or teardown began during the attempt".to_string())
}

async fn release(backend: Option<Arc<dyn Backend>>, attached: Vec<AttachedSubscription>) {
    for subscription in &attached {
        subscription.pump.abort();
    }
    let Some(backend) = backend else {
        return;
    };
    for subscription in attached {
        if let Err(error) = backend.unsubscribe(subscription.id).await {
            tracing::error!(
                "Failed to detach {} subscription {}: {error}",
                subscription.kind,
                subscription.id
            );
        }
    }
}

async fn stop_task(task: JoinHandle<()>) {
    task.abort();
    if let Err(error) = task.await {
        if !error.is_cancelled() {
            tracing::error!("Background task failed: {error}");
        }
    }
}

fn spawn_reconnect_timer(engine: Weak<EngineInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let interval = match engine.upgrade() {
                Some(inner) => inner.config.reconnect_interval(),
                None => break,
            };
            tokio::time::sleep(interval).await;

            let Some(inner) = engine.upgrade() else {
                break;
            };
            if inner.store.is_offline_mode() || inner.store.is_connected() {
                break;
            }
            let Some(attempt) = inner.begin_attempt() else {
                continue;
            };
            tracing::debug!("Reconnection timer fired");
            let result = EngineInner::connect(&inner, Trigger::Timer).await;
            drop(attempt);
            match result {
                Ok(_) => break,
                Err(error) => tracing::debug!("Scheduled reconnect failed: {error}"),
            }
        }
    })
}

fn spawn_synthetic_timer(engine: Weak<EngineInner>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let delay = match engine.upgrade() {
                Some(inner) => {
                    let (min, max) = inner.config.synthetic_interval_bounds();
                    inner.generator().next_delay(min, max)
                }
                None => break,
            };
            tokio::time::sleep(delay).await;

            let Some(inner) = engine.upgrade() else {
                break;
            };
            if inner.store.is_connected() {
                break;
            }
            let colonies = inner.store.colonies();
            let records = inner.generator().trickle(&colonies, Utc::now());
            tracing::debug!("Synthetic update with {} records", records.len());
            for record in records {
                subscriptions::ingest_record(&inner.store, record);
            }
        }
    })
}

/// Teardown handle returned by [`SyncEngine::initialize`].
///
/// Clones share one teardown flag; only the first call does any work.
#[derive(Clone)]
pub struct SyncHandle {
    engine: SyncEngine,
    torn_down: Arc<AtomicBool>,
}

impl SyncHandle {
    pub const fn engine(&self) -> &SyncEngine {
        &self.engine
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Detach subscriptions, stop timers, flush the cache, and mark the
    /// store disconnected. Safe to call repeatedly.
    pub async fn teardown(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        self.engine.inner.shutdown().await;
    }
}
