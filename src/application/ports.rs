//! Collaborator traits the posts pipeline calls out to, with the default
//! implementations used in production.

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::domain::graph::{DocumentGraph, Schema};
use crate::domain::ids::PageId;
use crate::domain::page_ids::collect_page_ids;
use crate::domain::posts::{PostRecord, filter_published};
use crate::domain::properties::{DecodedProperties, decode_properties};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("notion request timed out")]
    Timeout,
    #[error("notion rejected the request with status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode notion response: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Fetches the record map rooted at a page.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch_document_graph(&self, id: &PageId) -> Result<DocumentGraph, SourceError>;
}

/// Lists database rows from a `collection_query` structure, in view order.
pub trait PageIdLister: Send + Sync {
    fn list_page_ids(&self, collection_query: &Map<String, Value>) -> Vec<String>;
}

/// Turns one row's raw properties into named values.
#[async_trait]
pub trait PropertyDecoder: Send + Sync {
    async fn decode(
        &self,
        page_id: &str,
        graph: &DocumentGraph,
        schema: Option<&Schema>,
    ) -> Result<Option<DecodedProperties>, SourceError>;
}

/// Keeps the records that may be shown.
pub trait PublishFilter: Send + Sync {
    fn filter(&self, posts: Vec<PostRecord>, include_pages: bool, now_ms: i64)
    -> Vec<PostRecord>;
}

#[derive(Debug, Clone, Default)]
pub struct ReducerPageIds {
    view_id: Option<String>,
}

impl ReducerPageIds {
    pub fn for_view(view_id: Option<String>) -> Self {
        Self { view_id }
    }
}

impl PageIdLister for ReducerPageIds {
    fn list_page_ids(&self, collection_query: &Map<String, Value>) -> Vec<String> {
        collect_page_ids(collection_query, self.view_id.as_deref())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaDecoder;

#[async_trait]
impl PropertyDecoder for SchemaDecoder {
    async fn decode(
        &self,
        page_id: &str,
        graph: &DocumentGraph,
        schema: Option<&Schema>,
    ) -> Result<Option<DecodedProperties>, SourceError> {
        Ok(decode_properties(page_id, graph, schema))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PublishedOnly;

impl PublishFilter for PublishedOnly {
    fn filter(&self, posts: Vec<PostRecord>, include_pages: bool, now_ms: i64) -> Vec<PostRecord> {
        filter_published(posts, include_pages, now_ms)
    }
}
