#![allow(dead_code)]

use std::sync::Arc;

use loadpool_manager::sources::{SlotPoolLoad, DEFAULT_SLOT_PREFIX};
use loadpool_manager::{InstanceId, ServerLoadConfig, ServerLoadManager, DEFAULT_NAMESPACE};
use loadpool_store::{MemoryStore, SharedStorage};

pub const POOL_TYPE: &str = "SOCKET";
pub const CAPACITY: usize = 1000;

/// One pool member wired the way a server process would be: its own store
/// connection, shared by the manager and its slot pool.
pub struct Member {
    pub manager: ServerLoadManager,
    pub slots: Arc<SlotPoolLoad>,
}

pub fn member(store: &MemoryStore, id: Option<&str>) -> Member {
    let conn = SharedStorage::InMemory(store.connect());
    let slots = Arc::new(SlotPoolLoad::new(conn.clone(), DEFAULT_NAMESPACE, DEFAULT_SLOT_PREFIX, CAPACITY));
    let config = ServerLoadConfig::new(POOL_TYPE);

    let manager = match id {
        Some(id) => ServerLoadManager::with_id(&config, conn, slots.clone(), InstanceId::from(id)),
        None => ServerLoadManager::new(&config, conn, slots.clone()),
    }
    .expect("valid config");

    Member { manager, slots }
}

pub async fn reload_all(members: &[&Member]) {
    for m in members {
        m.manager.reload().await.expect("reload");
    }
}

pub async fn snapshot_ids(m: &Member) -> Vec<String> {
    m.manager
        .snapshot()
        .await
        .ids()
        .map(str::to_owned)
        .collect()
}
