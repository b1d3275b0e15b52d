use crate::errors::Result;
use crate::identity::InstanceId;
use crate::load_source::LoadSource;
use crate::snapshot::{LoadEntry, LoadSnapshot};

use async_trait::async_trait;
use futures::future::try_join_all;
use loadpool_store::{SharedStorage, SharedStore};
use tracing::{debug, info};

pub const DEFAULT_SLOT_PREFIX: &str = "SRM";

/// Set of member ids whose slots were already handed out.
const RESERVED_SUFFIX: &str = "RESERVED";

/// Load measured as slots in use out of a fixed per-member capacity.
///
/// On its first registration each member receives `capacity` slot tokens in
/// its own set, `<namespace>:<prefix>:<member-id>`. Work is admitted by
/// popping a token and finished by putting it back, so
/// `capacity - remaining tokens` is the member's load. Registering again
/// leaves the tokens alone, acquired ones included.
#[derive(Debug, Clone)]
pub struct SlotPoolLoad {
    store: SharedStorage,
    key_prefix: String,
    capacity: usize,
}

impl SlotPoolLoad {
    pub fn new(store: SharedStorage, namespace: &str, prefix: &str, capacity: usize) -> Self {
        SlotPoolLoad {
            store,
            key_prefix: format!("{}:{}", namespace, prefix),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn pool_key(&self, member_id: &str) -> String {
        format!("{}:{}", self.key_prefix, member_id)
    }

    fn reserved_key(&self) -> String {
        format!("{}:{}", self.key_prefix, RESERVED_SUFFIX)
    }

    /// Tokens handed to each member: `capacity..2*capacity`, so every token
    /// has the same number of digits.
    fn slot_tokens(&self) -> Vec<String> {
        (self.capacity..self.capacity * 2)
            .map(|n| n.to_string())
            .collect()
    }

    /// Takes a free slot of `member_id`, `None` when it is saturated.
    pub async fn acquire(&self, member_id: &str) -> Result<Option<String>> {
        Ok(self.store.pop_member(&self.pool_key(member_id)).await?)
    }

    pub async fn release(&self, member_id: &str, slot: &str) -> Result<()> {
        self.store
            .add_member(&self.pool_key(member_id), slot)
            .await?;
        Ok(())
    }

    pub async fn remaining(&self, member_id: &str) -> Result<usize> {
        Ok(self.store.member_count(&self.pool_key(member_id)).await?)
    }
}

#[async_trait]
impl LoadSource for SlotPoolLoad {
    async fn compute_load(&self, member_ids: &[String]) -> Result<LoadSnapshot> {
        let remaining = try_join_all(member_ids.iter().map(|id| self.remaining(id))).await?;

        Ok(member_ids
            .iter()
            .zip(remaining)
            .map(|(id, free)| LoadEntry::new(id.clone(), self.capacity.saturating_sub(free) as f64))
            .collect())
    }

    async fn post_register(&self, id: &InstanceId) -> Result<()> {
        if self.capacity == 0 {
            debug!("slot pool has no capacity, nothing to reserve");
            return Ok(());
        }

        let first_time = self
            .store
            .add_member(&self.reserved_key(), id.as_str())
            .await?;
        if !first_time {
            debug!("slot pool already reserved, keeping its tokens");
            return Ok(());
        }

        let added = self
            .store
            .add_members(&self.pool_key(id.as_str()), &self.slot_tokens())
            .await?;
        info!(capacity = self.capacity, added, "slot pool reserved");
        Ok(())
    }
}
