//! Domain layer: the Notion record map as this crate reads it, and the post
//! rules built on top.

pub mod error;
pub mod graph;
pub mod ids;
pub mod metadata;
pub mod page_ids;
pub mod posts;
pub mod properties;
