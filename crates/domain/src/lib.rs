//! crosspost domain crate
//!
//! This crate contains the core domain logic following hexagonal architecture:
//! - `model`: Domain entities and value objects
//! - `ports`: Trait definitions for external dependencies (adapters)
//! - `filter`: Per-edge eligibility rules
//! - `splitter`: Tag-aware splitting of long messages
//! - `retry`: Rate-limit retry policy shared by senders
//! - `usecases`: Application use cases / business logic

pub mod filter;
pub mod ignore;
pub mod model;
pub mod ports;
pub mod retry;
pub mod splitter;
pub mod usecases;

pub use filter::{FilterRejection, PostFilter};
pub use ignore::{DEFAULT_IGNORE_TAG, IgnoreTag};
pub use model::*;
pub use ports::*;
pub use retry::RetryPolicy;
pub use splitter::MessageSplitter;
