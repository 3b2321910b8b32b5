use std::time::Duration;

use async_trait::async_trait;
use metrics::counter;
use reqwest::{Client, StatusCode, Url, header};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::debug;

use crate::application::ports::{DocumentSource, SourceError};
use crate::domain::graph::{DocumentGraph, RecordMap};
use crate::domain::ids::PageId;
use crate::infra::error::InfraError;

use super::wire::{
    LOAD_PAGE_CHUNK, PageChunkResponse, QUERY_COLLECTION, QueryCollectionResponse,
    collection_views, page_chunk_body, query_collection_body,
};

const METRIC_NOTION_REQUESTS: &str = "notion_feed_notion_requests_total";
const ACTIVE_USER_HEADER: &str = "x-notion-active-user-header";

#[derive(Debug, Clone)]
pub struct NotionClientConfig {
    /// Base of the v3 API, e.g. `https://www.notion.so/api/v3/`.
    pub api_base: Url,
    /// `token_v2` cookie for private workspaces.
    pub token: Option<String>,
    pub active_user: Option<String>,
    pub timeout: Duration,
    pub user_time_zone: String,
    pub page_chunk_limit: u32,
    pub collection_limit: u32,
}

/// Record-map source backed by the Notion v3 HTTP API.
#[derive(Clone, Debug)]
pub struct NotionClient {
    http: Client,
    config: NotionClientConfig,
}

impl NotionClient {
    pub fn new(mut config: NotionClientConfig) -> Result<Self, InfraError> {
        if !config.api_base.path().ends_with('/') {
            let path = format!("{}/", config.api_base.path());
            config.api_base.set_path(&path);
        }

        let http = Client::builder()
            .user_agent(Self::user_agent())
            .timeout(config.timeout)
            .build()
            .map_err(InfraError::HttpClient)?;

        Ok(Self { http, config })
    }

    pub fn user_agent() -> &'static str {
        concat!("notion-feed/", env!("CARGO_PKG_VERSION"))
    }

    pub fn endpoint(&self, name: &str) -> Result<Url, SourceError> {
        self.config.api_base.join(name).map_err(SourceError::transport)
    }

    pub async fn load_page_chunk(&self, id: &PageId) -> Result<RecordMap, SourceError> {
        let body = page_chunk_body(id.as_str(), self.config.page_chunk_limit);
        let response: PageChunkResponse = self.post(LOAD_PAGE_CHUNK, &body).await?;
        Ok(response.record_map)
    }

    /// Rows of one collection view: their records and the reducer results
    /// that order them.
    pub async fn query_collection(
        &self,
        collection_id: &str,
        view_id: &str,
    ) -> Result<(RecordMap, Value), SourceError> {
        let body = query_collection_body(
            collection_id,
            view_id,
            self.config.collection_limit,
            &self.config.user_time_zone,
        );
        let response: QueryCollectionResponse = self.post(QUERY_COLLECTION, &body).await?;
        Ok((response.record_map, response.result.reducer_results))
    }

    async fn post<T: DeserializeOwned>(
        &self,
        name: &'static str,
        body: &Value,
    ) -> Result<T, SourceError> {
        let url = self.endpoint(name)?;
        let mut request = self.http.post(url).json(body);
        if let Some(token) = self.config.token.as_deref() {
            request = request.header(header::COOKIE, format!("token_v2={token}"));
        }
        if let Some(user) = self.config.active_user.as_deref() {
            request = request.header(ACTIVE_USER_HEADER, user);
        }

        counter!(METRIC_NOTION_REQUESTS, "endpoint" => name).increment(1);
        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        decode_response(status, &bytes)
    }
}

#[async_trait]
impl DocumentSource for NotionClient {
    async fn fetch_document_graph(&self, id: &PageId) -> Result<DocumentGraph, SourceError> {
        let mut map = self.load_page_chunk(id).await?;

        for (collection_id, view_id) in collection_views(&map) {
            let (rows, reducer_results) = self.query_collection(&collection_id, &view_id).await?;
            debug!(
                target = "notion_feed::notion",
                collection = collection_id.as_str(),
                view = view_id.as_str(),
                blocks = rows.block.len(),
                "Queried collection view"
            );
            map.merge(rows);

            let views = map
                .collection_query
                .entry(collection_id)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(views) = views {
                views.insert(view_id, reducer_results);
            }
        }

        Ok(DocumentGraph::from_record_map(map))
    }
}

fn map_reqwest_error(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::transport(err)
    }
}

fn decode_response<T: DeserializeOwned>(
    status: StatusCode,
    bytes: &[u8],
) -> Result<T, SourceError> {
    if !status.is_success() {
        return Err(SourceError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(bytes).into_owned(),
        });
    }
    serde_json::from_slice(bytes).map_err(SourceError::decode)
}
