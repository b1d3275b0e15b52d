mod errors;
pub use errors::{Result, StoreError};

mod store;
pub use store::SharedStore;

pub mod resp;

mod providers;
pub use providers::{
    in_memory::MemoryStore,
    redis::{RedisOptions, RedisStore},
};

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub enum SharedStorage {
    Redis(RedisStore),
    InMemory(MemoryStore), // InMemory is used for testing purposes
}

#[async_trait]
impl SharedStore for SharedStorage {
    async fn add_member(&self, key: &str, member: &str) -> Result<bool> {
        match self {
            SharedStorage::Redis(store) => store.add_member(key, member).await,
            SharedStorage::InMemory(store) => store.add_member(key, member).await,
        }
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<usize> {
        match self {
            SharedStorage::Redis(store) => store.add_members(key, members).await,
            SharedStorage::InMemory(store) => store.add_members(key, members).await,
        }
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<bool> {
        match self {
            SharedStorage::Redis(store) => store.remove_member(key, member).await,
            SharedStorage::InMemory(store) => store.remove_member(key, member).await,
        }
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        match self {
            SharedStorage::Redis(store) => store.members(key).await,
            SharedStorage::InMemory(store) => store.members(key).await,
        }
    }

    async fn pop_member(&self, key: &str) -> Result<Option<String>> {
        match self {
            SharedStorage::Redis(store) => store.pop_member(key).await,
            SharedStorage::InMemory(store) => store.pop_member(key).await,
        }
    }

    async fn member_count(&self, key: &str) -> Result<usize> {
        match self {
            SharedStorage::Redis(store) => store.member_count(key).await,
            SharedStorage::InMemory(store) => store.member_count(key).await,
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        match self {
            SharedStorage::Redis(store) => store.get(key).await,
            SharedStorage::InMemory(store) => store.get(key).await,
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        match self {
            SharedStorage::Redis(store) => store.set(key, value).await,
            SharedStorage::InMemory(store) => store.set(key, value).await,
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            SharedStorage::Redis(store) => store.delete(key).await,
            SharedStorage::InMemory(store) => store.delete(key).await,
        }
    }

    async fn end(&self, flush: bool) -> Result<()> {
        match self {
            SharedStorage::Redis(store) => store.end(flush).await,
            SharedStorage::InMemory(store) => store.end(flush).await,
        }
    }
}
