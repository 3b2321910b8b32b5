//! Post records assembled from decoded pages, and the publish rules applied
//! to them.

use std::collections::BTreeMap;

use chrono_tz::Tz;
use serde::Serialize;

use super::graph::Block;
use super::properties::{DecodedProperties, PropertyValue};

pub const DATE_FIELD: &str = "date";
const TITLE_FIELD: &str = "title";
const SLUG_FIELD: &str = "slug";
const STATUS_FIELD: &str = "status";
const TYPE_FIELD: &str = "type";
const PUBLISHED_STATUS: &str = "Published";

/// One row of the blog database, flattened for rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: BTreeMap<String, PropertyValue>,
    #[serde(rename = "fullWidth")]
    pub full_width: bool,
    /// Epoch milliseconds.
    pub date: i64,
}

impl PostRecord {
    pub fn text(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(PropertyValue::as_text)
    }

    pub fn first_option(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(PropertyValue::first_option)
    }

    pub fn title(&self) -> Option<&str> {
        self.text(TITLE_FIELD)
    }

    pub fn slug(&self) -> Option<&str> {
        self.text(SLUG_FIELD)
    }

    pub fn kind(&self) -> Option<PostKind> {
        self.first_option(TYPE_FIELD).and_then(PostKind::parse)
    }

    pub fn is_published(&self) -> bool {
        self.first_option(STATUS_FIELD) == Some(PUBLISHED_STATUS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostKind {
    Post,
    Page,
}

impl PostKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Post" => Some(Self::Post),
            "Page" => Some(Self::Page),
            _ => None,
        }
    }
}

/// Build a post from a decoded page. Returns `None` for trivial property
/// sets.
///
/// `date` is the decoded date property's start when it has one, else the
/// block's creation time, else `now_ms`.
pub fn assemble_post(
    page_id: &str,
    mut decoded: DecodedProperties,
    block: Option<&Block>,
    zone: Tz,
    now_ms: i64,
) -> Option<PostRecord> {
    if decoded.is_trivial() {
        return None;
    }

    let scheduled = decoded
        .fields
        .remove(DATE_FIELD)
        .and_then(|value| match value {
            PropertyValue::Date(date) => date.start_millis(zone),
            _ => None,
        });
    let date = scheduled
        .or_else(|| block.and_then(|block| block.created_time))
        .unwrap_or(now_ms);

    Some(PostRecord {
        id: decoded.id.unwrap_or_else(|| page_id.to_string()),
        fields: decoded.fields,
        full_width: block.is_some_and(Block::full_width),
        date,
    })
}

pub fn is_visible(post: &PostRecord, include_pages: bool, now_ms: i64) -> bool {
    let kind_matches = match post.kind() {
        Some(PostKind::Post) => true,
        Some(PostKind::Page) => include_pages,
        None => false,
    };

    kind_matches
        && post.title().is_some_and(|title| !title.is_empty())
        && post.slug().is_some_and(|slug| !slug.is_empty())
        && post.is_published()
        && post.date <= now_ms
}

pub fn filter_published(
    posts: Vec<PostRecord>,
    include_pages: bool,
    now_ms: i64,
) -> Vec<PostRecord> {
    posts
        .into_iter()
        .filter(|post| is_visible(post, include_pages, now_ms))
        .collect()
}

/// Newest first; equal dates keep their relative order.
pub fn sort_by_date_desc(posts: &mut [PostRecord]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
}
