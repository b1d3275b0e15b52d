use crate::errors::Result;
use crate::identity::InstanceId;
use crate::snapshot::LoadSnapshot;

use async_trait::async_trait;

/// Application-supplied knowledge of how loaded each pool member is.
///
/// Only `compute_load` is mandatory. It receives every registered member id
/// and must return a snapshot with an entry for each of them; it may fan out
/// to its own collaborators concurrently.
#[async_trait]
pub trait LoadSource: Send + Sync + 'static {
    async fn compute_load(&self, member_ids: &[String]) -> Result<LoadSnapshot>;

    /// Runs after the member joined the pool and before its first cache load.
    async fn post_register(&self, _id: &InstanceId) -> Result<()> {
        Ok(())
    }

    /// Runs after the store connection was released.
    async fn post_end(&self) -> Result<()> {
        Ok(())
    }
}
