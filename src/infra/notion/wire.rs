//! Request bodies and response envelopes of the Notion v3 endpoints.

use serde::Deserialize;
use serde_json::{Value, json};

use crate::domain::graph::{COLLECTION_VIEW, COLLECTION_VIEW_PAGE, RecordMap, unwrap_value};

pub(crate) const LOAD_PAGE_CHUNK: &str = "loadPageChunk";
pub(crate) const QUERY_COLLECTION: &str = "queryCollection";

#[derive(Debug, Default, Deserialize)]
pub(crate) struct PageChunkResponse {
    #[serde(rename = "recordMap", default)]
    pub record_map: RecordMap,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryCollectionResponse {
    #[serde(default)]
    pub result: QueryResult,
    #[serde(rename = "recordMap", default)]
    pub record_map: RecordMap,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct QueryResult {
    #[serde(rename = "reducerResults", default)]
    pub reducer_results: Value,
}

pub(crate) fn page_chunk_body(page_id: &str, limit: u32) -> Value {
    json!({
        "pageId": page_id,
        "limit": limit,
        "cursor": { "stack": [] },
        "chunkNumber": 0,
        "verticalColumns": false
    })
}

pub(crate) fn query_collection_body(
    collection_id: &str,
    view_id: &str,
    limit: u32,
    user_time_zone: &str,
) -> Value {
    json!({
        "collection": { "id": collection_id },
        "collectionView": { "id": view_id },
        "loader": {
            "type": "reducer",
            "reducers": {
                "collection_group_results": { "type": "results", "limit": limit }
            },
            "searchQuery": "",
            "userTimeZone": user_time_zone
        }
    })
}

/// `(collection id, view id)` of every collection view block in the map.
pub(crate) fn collection_views(map: &RecordMap) -> Vec<(String, String)> {
    let mut views = Vec::new();
    for raw in map.block.values() {
        let block = unwrap_value(raw);
        let is_view = matches!(
            block.get("type").and_then(Value::as_str),
            Some(COLLECTION_VIEW_PAGE | COLLECTION_VIEW)
        );
        if !is_view {
            continue;
        }
        let Some(collection_id) = block.get("collection_id").and_then(Value::as_str) else {
            continue;
        };
        let view_ids = block
            .get("view_ids")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str);
        for view_id in view_ids {
            let pair = (collection_id.to_string(), view_id.to_string());
            if !views.contains(&pair) {
                views.push(pair);
            }
        }
    }
    views
}
