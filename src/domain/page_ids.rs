//! Row identifiers from a `collection_query` result.
//!
//! `collection_query` is keyed by collection id, then by view id; each view
//! holds reducer results whose `collection_group_results.blockIds` lists the
//! rows in view order. Older responses carry `blockIds` directly.

use std::collections::HashSet;

use serde_json::{Map, Value};

const GROUP_RESULTS: &str = "collection_group_results";
const BLOCK_IDS: &str = "blockIds";

/// All row ids, in collection then view order, first occurrence wins.
/// With `view_id`, only that view is read.
pub fn collect_page_ids(
    collection_query: &Map<String, Value>,
    view_id: Option<&str>,
) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut ids = Vec::new();

    let views = collection_query
        .values()
        .filter_map(Value::as_object)
        .flat_map(|views| views.iter())
        .filter(|(id, _)| view_id.is_none_or(|wanted| wanted == id.as_str()));

    for (_, view) in views {
        for id in view_block_ids(view) {
            if seen.insert(id) {
                ids.push(id.to_string());
            }
        }
    }

    ids
}

fn view_block_ids(view: &Value) -> impl Iterator<Item = &str> {
    view.get(GROUP_RESULTS)
        .and_then(|group| group.get(BLOCK_IDS))
        .or_else(|| view.get(BLOCK_IDS))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}
