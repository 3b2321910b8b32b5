//! Display metadata of a single page block.

use serde::Serialize;

use super::graph::Block;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PageMetadata {
    pub locked: Option<bool>,
    pub page_full_width: Option<bool>,
    pub page_font: Option<String>,
    pub page_small_text: Option<bool>,
    pub created_time: Option<i64>,
    pub last_edited_time: Option<i64>,
}

impl From<&Block> for PageMetadata {
    fn from(block: &Block) -> Self {
        let format = block.format.clone().unwrap_or_default();
        Self {
            locked: format.block_locked,
            page_full_width: format.page_full_width,
            page_font: format.page_font,
            page_small_text: format.page_small_text,
            created_time: block.created_time,
            last_edited_time: block.last_edited_time,
        }
    }
}
