use crate::{errors::Result, store::SharedStore, StoreError};

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone)]
enum StoredValue {
    Value(String),
    // insertion ordered, no duplicates
    Set(Vec<String>),
}

/// MemoryStore is a process-local store that implements the SharedStore trait.
/// SHOULD BE USED ONLY FOR TESTING PURPOSES
///
/// Clones share both the data and the connection state. Use [`MemoryStore::connect`]
/// to open another independent handle onto the same data, the way two processes
/// would each hold their own connection to one Redis server.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, StoredValue>>,
    closed: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: Arc::new(DashMap::new()),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Opens a new handle onto the same data with its own open/closed state.
    pub fn connect(&self) -> Self {
        MemoryStore {
            inner: Arc::clone(&self.inner),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(StoreError::Closed);
        }
        Ok(())
    }

    fn wrong_type(key: &str) -> StoreError {
        StoreError::WrongType(key.to_string())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SharedStore for MemoryStore {
    async fn add_member(&self, key: &str, member: &str) -> Result<bool> {
        let added = self.add_members(key, &[member.to_string()]).await?;
        Ok(added == 1)
    }

    async fn add_members(&self, key: &str, members: &[String]) -> Result<usize> {
        self.ensure_open()?;
        if members.is_empty() {
            return Ok(0);
        }

        let mut entry = self
            .inner
            .entry(key.to_owned())
            .or_insert_with(|| StoredValue::Set(Vec::new()));

        match entry.value_mut() {
            StoredValue::Set(set) => {
                let mut added = 0;
                for member in members {
                    if !set.contains(member) {
                        set.push(member.clone());
                        added += 1;
                    }
                }
                Ok(added)
            }
            StoredValue::Value(_) => Err(Self::wrong_type(key)),
        }
    }

    async fn remove_member(&self, key: &str, member: &str) -> Result<bool> {
        self.ensure_open()?;

        match self.inner.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let (removed, now_empty) = match occupied.get_mut() {
                    StoredValue::Set(set) => {
                        let before = set.len();
                        set.retain(|m| m != member);
                        (set.len() < before, set.is_empty())
                    }
                    StoredValue::Value(_) => return Err(Self::wrong_type(key)),
                };
                // Redis drops a set once its last member is gone
                if now_empty {
                    occupied.remove();
                }
                Ok(removed)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn members(&self, key: &str) -> Result<Vec<String>> {
        self.ensure_open()?;

        match self.inner.get(key).as_deref() {
            Some(StoredValue::Set(set)) => Ok(set.clone()),
            Some(StoredValue::Value(_)) => Err(Self::wrong_type(key)),
            None => Ok(Vec::new()),
        }
    }

    async fn pop_member(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;

        match self.inner.entry(key.to_owned()) {
            Entry::Occupied(mut occupied) => {
                let (popped, now_empty) = match occupied.get_mut() {
                    StoredValue::Set(set) => (set.pop(), set.is_empty()),
                    StoredValue::Value(_) => return Err(Self::wrong_type(key)),
                };
                if now_empty {
                    occupied.remove();
                }
                Ok(popped)
            }
            Entry::Vacant(_) => Ok(None),
        }
    }

    async fn member_count(&self, key: &str) -> Result<usize> {
        self.ensure_open()?;

        match self.inner.get(key).as_deref() {
            Some(StoredValue::Set(set)) => Ok(set.len()),
            Some(StoredValue::Value(_)) => Err(Self::wrong_type(key)),
            None => Ok(0),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.ensure_open()?;

        match self.inner.get(key).as_deref() {
            Some(StoredValue::Value(value)) => Ok(Some(value.clone())),
            Some(StoredValue::Set(_)) => Err(Self::wrong_type(key)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.ensure_open()?;

        // SET overwrites whatever the key held before, sets included
        self.inner
            .insert(key.to_owned(), StoredValue::Value(value.to_owned()));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.ensure_open()?;
        self.inner.remove(key);
        Ok(())
    }

    async fn end(&self, flush: bool) -> Result<()> {
        self.ensure_open()?;
        if flush {
            self.inner.clear();
        }
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_keeps_insertion_order_without_duplicates() -> Result<()> {
        let store = MemoryStore::new();

        assert!(store.add_member("SLM:T:SET", "b").await?);
        assert!(store.add_member("SLM:T:SET", "a").await?);
        assert!(!store.add_member("SLM:T:SET", "b").await?);

        assert_eq!(store.members("SLM:T:SET").await?, vec!["b", "a"]);
        assert_eq!(store.member_count("SLM:T:SET").await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn adding_no_members_leaves_no_key() -> Result<()> {
        let store = MemoryStore::new();

        assert_eq!(store.add_members("k", &[]).await?, 0);

        // no empty set was left behind
        store.set("k", "v").await?;
        Ok(())
    }

    #[tokio::test]
    async fn removing_last_member_drops_the_key() -> Result<()> {
        let store = MemoryStore::new();
        store.add_member("k", "only").await?;

        assert!(store.remove_member("k", "only").await?);
        assert!(!store.remove_member("k", "only").await?);
        assert!(store.members("k").await?.is_empty());

        // the key is gone, so it can now hold a plain value
        store.set("k", "v").await?;
        assert_eq!(store.get("k").await?.as_deref(), Some("v"));
        Ok(())
    }

    #[tokio::test]
    async fn pop_drains_the_set() -> Result<()> {
        let store = MemoryStore::new();
        let slots: Vec<String> = (0..3).map(|n| n.to_string()).collect();
        assert_eq!(store.add_members("slots", &slots).await?, 3);

        let mut popped = Vec::new();
        while let Some(slot) = store.pop_member("slots").await? {
            popped.push(slot);
        }
        popped.sort();

        assert_eq!(popped, slots);
        assert_eq!(store.member_count("slots").await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn mixing_value_and_set_ops_is_wrong_type() -> Result<()> {
        let store = MemoryStore::new();
        store.set("data", "[]").await?;

        assert!(matches!(
            store.add_member("data", "x").await,
            Err(StoreError::WrongType(_))
        ));

        store.add_member("set", "x").await?;
        assert!(matches!(
            store.get("set").await,
            Err(StoreError::WrongType(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn end_closes_only_this_handle() -> Result<()> {
        let store = MemoryStore::new();
        let other = store.connect();
        store.set("k", "v").await?;

        store.end(false).await?;

        assert!(matches!(store.get("k").await, Err(StoreError::Closed)));
        assert_eq!(other.get("k").await?.as_deref(), Some("v"));
        Ok(())
    }

    #[tokio::test]
    async fn end_with_flush_wipes_shared_data() -> Result<()> {
        let store = MemoryStore::new();
        let other = store.connect();
        other.add_member("set", "x").await?;
        other.set("data", "[]").await?;

        store.end(true).await?;

        assert!(other.members("set").await?.is_empty());
        assert_eq!(other.get("data").await?, None);
        Ok(())
    }
}
