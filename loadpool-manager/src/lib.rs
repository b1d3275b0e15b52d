//! # Loadpool Manager
//!
//! Coordination of a pool of homogeneous server instances that only talk to
//! each other through a shared key-value store.
//!
//! ## Core Responsibilities
//!
//! - **Registration**: every member adds its [`InstanceId`] to the pool's membership set
//! - **Advisory Leadership**: the smallest id in the cached snapshot refreshes the shared load data
//! - **Load Cache**: each member keeps a local copy of the stored [`LoadSnapshot`]
//! - **Idle Selection**: callers route work to the least loaded member of that copy
//!
//! ## Key Layout
//!
//! - `<namespace>:<type>:SET` holds the membership set
//! - `<namespace>:<type>:DATA` holds the snapshot as a JSON array of `{id, load}` records
//!
//! How load is measured is up to the application, through a [`LoadSource`].

mod config;
mod errors;
mod identity;
mod keyspace;
mod load_source;
mod manager;
mod refresh;
mod snapshot;
pub mod sources;


pub use config::ServerLoadConfig;
pub use errors::{ConfigError, ManagerError, Result};
pub use identity::InstanceId;
pub use keyspace::{Keyspace, DEFAULT_NAMESPACE, MEMBERSHIP_SUFFIX, SNAPSHOT_SUFFIX};
pub use load_source::LoadSource;
pub use manager::ServerLoadManager;
pub use refresh::RefreshTask;
pub use snapshot::{LoadEntry, LoadSnapshot};
