//! Application use cases / business logic

pub mod success_hook;
pub mod synchronize;

#[cfg(test)]
pub(crate) mod fakes;

pub use success_hook::{Delivery, SuccessHook};
pub use synchronize::{SyncConfig, Synchronizer};
