use crate::config::ServerLoadConfig;
use crate::errors::{ManagerError, Result};
use crate::identity::InstanceId;
use crate::keyspace::Keyspace;
use crate::load_source::LoadSource;
use crate::refresh::RefreshTask;
use crate::snapshot::LoadSnapshot;

use loadpool_store::{RedisStore, SharedStorage, SharedStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

/// ServerLoadManager - one member of a pool coordinated through a shared store
///
/// ## Responsibilities:
/// - **Registration**: adds the member id to the pool's membership set
/// - **Load Cache**: keeps a local copy of the load snapshot stored under the pool's DATA key
/// - **Leader Election**: the smallest id in the cached snapshot is the leader
/// - **Refresh**: the leader (or anyone facing an empty snapshot) recomputes
///   every member's load through the [`LoadSource`] and writes it back
/// - **Idle Selection**: picks the least loaded member from the cached snapshot
///
/// ## Consistency:
/// Leadership is advisory. Nothing prevents two members from refreshing at the
/// same time; the last write to the DATA key wins and readers tolerate a stale
/// snapshot until their next reload.
#[derive(Clone)]
pub struct ServerLoadManager {
    id: InstanceId,
    keyspace: Keyspace,
    store: SharedStorage,
    source: Arc<dyn LoadSource>,

    /// Local copy of the pool snapshot, only replaced as a whole
    cache: Arc<RwLock<LoadSnapshot>>,

    /// Serializes register/reload/unregister sequences of this member
    sequence: Arc<Mutex<()>>,

    /// Cancels the background refresh started through `spawn_refresh`
    refresh_cancel: Arc<Mutex<Option<CancellationToken>>>,

    span: Span,
}

impl std::fmt::Debug for ServerLoadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLoadManager")
            .field("id", &self.id)
            .field("keyspace", &self.keyspace)
            .field("store", &self.store)
            .finish()
    }
}

impl ServerLoadManager {
    /// Creates a pool member with a freshly generated id and an empty cache.
    ///
    /// Fails when the configuration has no pool type.
    pub fn new(
        config: &ServerLoadConfig,
        store: SharedStorage,
        source: Arc<dyn LoadSource>,
    ) -> Result<Self> {
        Self::with_id(config, store, source, InstanceId::generate())
    }

    /// Same as [`ServerLoadManager::new`] with a caller-chosen id.
    pub fn with_id(
        config: &ServerLoadConfig,
        store: SharedStorage,
        source: Arc<dyn LoadSource>,
        id: InstanceId,
    ) -> Result<Self> {
        config.validate()?;
        let keyspace = config.keyspace();
        let span = info_span!(
            "server_load",
            pool_type = %keyspace.pool_type(),
            instance_id = %id
        );

        Ok(ServerLoadManager {
            id,
            keyspace,
            store,
            source,
            cache: Arc::new(RwLock::new(LoadSnapshot::default())),
            sequence: Arc::new(Mutex::new(())),
            refresh_cancel: Arc::new(Mutex::new(None)),
            span,
        })
    }

    /// Opens a Redis connection from `config` and builds the member on top of it.
    pub async fn connect(config: &ServerLoadConfig, source: Arc<dyn LoadSource>) -> Result<Self> {
        let store = RedisStore::connect(config.redis_options()).await?;
        Self::new(config, SharedStorage::Redis(store), source)
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn keyspace(&self) -> &Keyspace {
        &self.keyspace
    }

    /// Joins the pool.
    ///
    /// Adds the id to the membership set (a no-op if already there), runs the
    /// load source's `post_register` hook, then loads the cache. When the
    /// loaded snapshot does not list this member yet, it is refreshed so the
    /// new member becomes visible to its peers.
    pub async fn register(&self) -> Result<()> {
        async {
            let _sequence = self.sequence.lock().await;

            let added = self
                .store
                .add_member(&self.keyspace.membership_key(), self.id.as_str())
                .await?;
            info!(newly_added = added, "member registered in the pool");

            self.source.post_register(&self.id).await?;
            self.load_cache(true).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Leaves the pool and rewrites the snapshot without this member.
    ///
    /// Peers keep listing the departed member until they reload.
    pub async fn unregister(&self) -> Result<()> {
        async {
            let _sequence = self.sequence.lock().await;

            let removed = self
                .store
                .remove_member(&self.keyspace.membership_key(), self.id.as_str())
                .await?;
            info!(was_member = removed, "member unregistered from the pool");

            self.update_load_data().await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Re-reads the stored snapshot, refreshing it when it is empty or when
    /// this member is the leader of the freshly read view.
    pub async fn reload(&self) -> Result<()> {
        async {
            let _sequence = self.sequence.lock().await;
            self.load_cache(false).await
        }
        .instrument(self.span.clone())
        .await
    }

    /// Whether this member leads the pool according to the cached snapshot.
    ///
    /// Only as fresh as the last reload; never touches the store.
    pub async fn is_leader(&self) -> bool {
        self.cache.read().await.leader() == Some(self.id.as_str())
    }

    /// Id of the leader according to the cached snapshot.
    pub async fn leader(&self) -> Option<String> {
        self.cache.read().await.leader().map(str::to_owned)
    }

    /// Least loaded member according to the cached snapshot.
    pub async fn idle_server(&self) -> Option<String> {
        self.cache.read().await.idle().map(str::to_owned)
    }

    /// This member's own load, `+inf` while it is missing from the snapshot.
    pub async fn load(&self) -> f64 {
        self.cache.read().await.load_of(self.id.as_str())
    }

    pub async fn snapshot(&self) -> LoadSnapshot {
        self.cache.read().await.clone()
    }

    /// Starts reloading the cache every `interval` in the background.
    ///
    /// Reload failures are logged and the loop keeps going. Starting a new
    /// task cancels the previous one; `end` cancels whichever is running.
    pub async fn spawn_refresh(&self, interval: Duration) -> RefreshTask {
        let cancel = CancellationToken::new();
        if let Some(previous) = self
            .refresh_cancel
            .lock()
            .await
            .replace(cancel.clone())
        {
            previous.cancel();
        }
        RefreshTask::spawn(self.clone(), interval, cancel, self.span.clone())
    }

    /// Releases the store connection, wiping store-side state when `flush` is
    /// set, then runs the load source's `post_end` hook.
    ///
    /// Does not unregister; call [`ServerLoadManager::unregister`] first for a clean exit.
    pub async fn end(&self, flush: bool) -> Result<()> {
        async {
            if let Some(cancel) = self.refresh_cancel.lock().await.take() {
                cancel.cancel();
            }

            self.store.end(flush).await?;
            info!(flush, "store connection released");

            self.source.post_end().await
        }
        .instrument(self.span.clone())
        .await
    }

    async fn load_cache(&self, ensure_self: bool) -> Result<()> {
        let data = self.store.get(&self.keyspace.snapshot_key()).await?;
        let snapshot = match data {
            Some(data) => LoadSnapshot::from_json(&data).unwrap_or_else(|e| {
                warn!(error = %e, "stored load snapshot is unreadable, treating it as empty");
                LoadSnapshot::default()
            }),
            None => LoadSnapshot::default(),
        };
        debug!(snapshot = ?snapshot, "load snapshot cached");

        let needs_refresh = snapshot.is_empty()
            || snapshot.leader() == Some(self.id.as_str())
            || (ensure_self && !snapshot.contains(self.id.as_str()));
        *self.cache.write().await = snapshot;

        if needs_refresh {
            self.update_load_data().await?;
        }
        Ok(())
    }

    async fn update_load_data(&self) -> Result<()> {
        let member_ids = self
            .store
            .members(&self.keyspace.membership_key())
            .await?;
        debug!(members = ?member_ids, "refreshing load for pool members");

        let snapshot = self.source.compute_load(&member_ids).await?;
        let missing = snapshot.missing_ids(&member_ids);
        if !missing.is_empty() {
            return Err(ManagerError::IncompleteSnapshot { missing });
        }

        let payload = snapshot.to_json()?;
        debug!(snapshot = ?snapshot, "writing refreshed load snapshot");
        *self.cache.write().await = snapshot;

        self.store
            .set(&self.keyspace.snapshot_key(), &payload)
            .await?;
        Ok(())
    }
}
