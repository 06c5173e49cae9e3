// ABOUTME: Durable state: records, the store, and the exclusive apply lock.
// ABOUTME: The store is the single owner of last-applied state between runs.

mod error;
mod lock;
mod record;
mod store;

pub use error::StateError;
pub use lock::{LockInfo, StateLock};
pub use record::{ResourceStatus, StateRecord};
pub use store::{StateStore, Transaction};
