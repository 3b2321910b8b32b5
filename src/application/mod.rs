//! Application services: the posts pipeline and the seams it calls out to.

pub mod error;
pub mod ports;
pub mod posts;
