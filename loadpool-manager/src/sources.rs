mod slot_pool;
pub use slot_pool::{SlotPoolLoad, DEFAULT_SLOT_PREFIX};
