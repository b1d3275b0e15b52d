use async_trait::async_trait;

use super::errors::Result;

/// The handful of primitives a pool needs from the shared key-value store.
///
/// Set operations mirror Redis set semantics (SADD, SREM, SMEMBERS, SPOP,
/// SCARD); `get`/`set` operate on plain string values. Implementations must
/// be usable concurrently from several tasks.
#[async_trait]
pub trait SharedStore: Send + Sync + 'static {
    /// Adds `member` to the set at `key`. Returns `false` if it was already present.
    async fn add_member(&self, key: &str, member: &str) -> Result<bool>;

    /// Adds several members at once, returning how many were new. An empty
    /// slice is a no-op that returns 0.
    async fn add_members(&self, key: &str, members: &[String]) -> Result<usize>;

    /// Removes `member` from the set at `key`. Returns `false` if it was absent.
    async fn remove_member(&self, key: &str, member: &str) -> Result<bool>;

    async fn members(&self, key: &str) -> Result<Vec<String>>;

    /// Removes and returns an arbitrary member, `None` when the set is empty.
    async fn pop_member(&self, key: &str) -> Result<Option<String>>;

    async fn member_count(&self, key: &str) -> Result<usize>;

    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn delete(&self, key: &str) -> Result<()>;

    /// Releases the connection. With `flush`, every key held by the store is
    /// wiped first; meant for tests and throwaway deployments.
    ///
    /// Any call made after `end` fails with `StoreError::Closed`.
    async fn end(&self, flush: bool) -> Result<()>;
}
