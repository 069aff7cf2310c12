//! Core plumbing for the GreenMile credit system.
//!
//! This crate provides the storage abstraction shared by the ledger, commute,
//! and trading engines, the notification sink used for post-commit side
//! effects, and small time utilities.

pub mod notify;
pub mod storage;
pub mod utils;

pub use notify::{LogNotifier, Notification, Notifier, NullNotifier};
pub use storage::{FileStorage, JsonStorage, MemoryStorage, Storage, StorageError, StorageResult};
