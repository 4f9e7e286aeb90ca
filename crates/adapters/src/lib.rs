//! crosspost adapters crate
//!
//! This crate contains infrastructure adapters implementing the domain ports:
//! - `repository`: JSON file and in-memory identity stores
//! - `telegram`: Telegram Bot API retriever and sender
//! - `vk`: VK API retriever and sender
//! - `facebook`: Facebook Graph API retriever and sender
//! - `stub`: Offline retriever and sender
//! - `text`: Markup and plain-text helpers shared by the platform adapters

pub mod facebook;
pub mod http;
pub mod repository;
pub mod stub;
pub mod telegram;
pub mod text;
pub mod vk;
