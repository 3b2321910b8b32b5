//! Notion v3 API adapter.

mod client;
mod wire;

pub use client::{NotionClient, NotionClientConfig};
