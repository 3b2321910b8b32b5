//! The Notion record map and its resolved, typed view.
//!
//! A record map is a bag of maps keyed by opaque identifiers. Depending on the
//! API revision each record may sit inside zero, one or two `value` envelopes;
//! envelopes are peeled exactly once, in [`DocumentGraph::from_record_map`],
//! and nothing downstream deals with them again.

use std::collections::{BTreeMap, HashMap};

use chrono::DateTime;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub const COLLECTION_VIEW_PAGE: &str = "collection_view_page";
pub const COLLECTION_VIEW: &str = "collection_view";

const ENVELOPE_KEY: &str = "value";
const MAX_ENVELOPE_DEPTH: u8 = 2;

/// A record as it arrived on the wire, with its envelope depth made explicit.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRecord {
    Bare(Value),
    Enveloped { depth: u8, payload: Value },
}

impl RawRecord {
    /// Returns `None` for `null`; otherwise peels up to two `value` layers.
    pub fn resolve(value: Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }

        let mut payload = value;
        let mut depth = 0;
        while depth < MAX_ENVELOPE_DEPTH {
            let inner = match &mut payload {
                Value::Object(map) if map.get(ENVELOPE_KEY).is_some_and(Value::is_object) => {
                    map.remove(ENVELOPE_KEY)
                }
                _ => None,
            };
            match inner {
                Some(inner) => {
                    payload = inner;
                    depth += 1;
                }
                None => break,
            }
        }

        Some(if depth == 0 {
            Self::Bare(payload)
        } else {
            Self::Enveloped { depth, payload }
        })
    }

    pub fn depth(&self) -> u8 {
        match self {
            Self::Bare(_) => 0,
            Self::Enveloped { depth, .. } => *depth,
        }
    }

    pub fn payload(&self) -> &Value {
        match self {
            Self::Bare(payload) | Self::Enveloped { payload, .. } => payload,
        }
    }

    pub fn into_payload(self) -> Value {
        match self {
            Self::Bare(payload) | Self::Enveloped { payload, .. } => payload,
        }
    }
}

/// Borrowed form of [`RawRecord::resolve`].
pub fn unwrap_value(value: &Value) -> &Value {
    let mut current = value;
    for _ in 0..MAX_ENVELOPE_DEPTH {
        match current.get(ENVELOPE_KEY) {
            Some(inner) if inner.is_object() => current = inner,
            _ => break,
        }
    }
    current
}

/// Wire shape of a `loadPageChunk` / `queryCollection` record map.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RecordMap {
    pub block: Map<String, Value>,
    pub collection: Map<String, Value>,
    pub collection_view: Map<String, Value>,
    pub collection_query: Map<String, Value>,
}

impl RecordMap {
    /// Later records win; map order of first insertion is kept.
    pub fn merge(&mut self, other: RecordMap) {
        self.block.extend(other.block);
        self.collection.extend(other.collection);
        self.collection_view.extend(other.collection_view);
        self.collection_query.extend(other.collection_query);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BlockFormat {
    pub page_full_width: Option<bool>,
    pub page_font: Option<String>,
    pub page_small_text: Option<bool>,
    pub block_locked: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub format: Option<BlockFormat>,
    #[serde(deserialize_with = "lenient_millis")]
    pub created_time: Option<i64>,
    #[serde(deserialize_with = "lenient_millis")]
    pub last_edited_time: Option<i64>,
    pub properties: Option<Map<String, Value>>,
    pub collection_id: Option<String>,
    #[serde(deserialize_with = "lenient_strings")]
    pub view_ids: Option<Vec<String>>,
}

impl Block {
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    pub fn is_collection_view(&self) -> bool {
        matches!(self.kind(), Some(COLLECTION_VIEW_PAGE | COLLECTION_VIEW))
    }

    pub fn full_width(&self) -> bool {
        self.format
            .as_ref()
            .and_then(|format| format.page_full_width)
            .unwrap_or(false)
    }

    pub fn view_ids(&self) -> &[String] {
        self.view_ids.as_deref().unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PropertySchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Property key → decoded name and type.
pub type Schema = BTreeMap<String, PropertySchema>;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Collection {
    pub id: String,
    pub name: Option<Value>,
    #[serde(deserialize_with = "lenient_schema")]
    pub schema: Option<Schema>,
}

/// What the detector learned about the root identifier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DatabaseTarget<'a> {
    pub collection_id: Option<&'a str>,
    pub schema: Option<&'a Schema>,
    pub root_kind: Option<&'a str>,
}

/// Resolved record map: envelopes peeled, records typed.
#[derive(Debug, Clone, Default)]
pub struct DocumentGraph {
    blocks: HashMap<String, Block>,
    collections: Vec<Collection>,
    collection_query: Map<String, Value>,
    rejected: Vec<String>,
}

impl DocumentGraph {
    pub fn from_record_map(map: RecordMap) -> Self {
        let RecordMap {
            block,
            collection,
            collection_query,
            ..
        } = map;

        let mut rejected = Vec::new();

        let mut blocks = HashMap::with_capacity(block.len());
        for (id, raw) in block {
            match decode_record::<Block>(raw) {
                Some(Ok(mut decoded)) => {
                    if decoded.id.is_empty() {
                        decoded.id = id.clone();
                    }
                    blocks.insert(id, decoded);
                }
                Some(Err(_)) => rejected.push(id),
                None => {}
            }
        }

        let mut collections = Vec::with_capacity(collection.len());
        for (id, raw) in collection {
            match decode_record::<Collection>(raw) {
                Some(Ok(mut decoded)) => {
                    if decoded.id.is_empty() {
                        decoded.id = id;
                    }
                    collections.push(decoded);
                }
                Some(Err(_)) => rejected.push(id),
                None => {}
            }
        }

        Self {
            blocks,
            collections,
            collection_query,
            rejected,
        }
    }

    pub fn from_json(value: Value) -> Result<Self, serde_json::Error> {
        let map: RecordMap = serde_json::from_value(value)?;
        Ok(Self::from_record_map(map))
    }

    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.get(id)
    }

    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Collections in response-map order.
    pub fn collections(&self) -> &[Collection] {
        &self.collections
    }

    pub fn collection_query(&self) -> &Map<String, Value> {
        &self.collection_query
    }

    /// Ids of records that were present but could not be read.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// First collection carrying a schema, in response-map order.
    pub fn first_schema(&self) -> Option<(&str, &Schema)> {
        self.collections.iter().find_map(|collection| {
            collection
                .schema
                .as_ref()
                .map(|schema| (collection.id.as_str(), schema))
        })
    }

    /// `None` when `root_id` is an ordinary page rather than a database.
    pub fn detect_database(&self, root_id: &str) -> Option<DatabaseTarget<'_>> {
        let root = self.block(root_id);
        let root_kind = root.and_then(Block::kind);
        let schema_hit = self.first_schema();

        let collection_id = schema_hit
            .map(|(id, _)| id)
            .or_else(|| self.collections.first().map(|c| c.id.as_str()));

        let is_database = schema_hit.is_some()
            || collection_id.is_some()
            || root.is_some_and(Block::is_collection_view);

        is_database.then_some(DatabaseTarget {
            collection_id,
            schema: schema_hit.map(|(_, schema)| schema),
            root_kind,
        })
    }
}

fn decode_record<T: for<'de> Deserialize<'de>>(
    raw: Value,
) -> Option<Result<T, serde_json::Error>> {
    RawRecord::resolve(raw).map(|record| serde_json::from_value(record.into_payload()))
}

fn lenient_millis<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(millis_from_value))
}

/// Keeps the readable entries of a schema object and drops the rest.
fn lenient_schema<'de, D>(deserializer: D) -> Result<Option<Schema>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_object).map(|entries| {
        entries
            .iter()
            .filter_map(|(key, entry)| {
                PropertySchema::deserialize(entry)
                    .ok()
                    .map(|definition| (key.clone(), definition))
            })
            .collect()
    }))
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    }))
}

fn millis_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number
            .as_i64()
            .or_else(|| number.as_f64().map(|ms| ms as i64)),
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|parsed| parsed.timestamp_millis()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn node() -> Value {
        json!({ "id": "b1", "type": "page", "created_time": 1_700_000_000_000_i64 })
    }

    #[test]
    fn resolve_is_depth_agnostic() {
        let bare = RawRecord::resolve(node()).expect("record");
        let once =
            RawRecord::resolve(json!({ "role": "reader", "value": node() })).expect("record");
        let twice = RawRecord::resolve(json!({
            "spaceId": "s1",
            "value": { "role": "reader", "value": node() }
        }))
        .expect("record");

        assert_eq!(bare.depth(), 0);
        assert_eq!(once.depth(), 1);
        assert_eq!(twice.depth(), 2);
        assert_eq!(bare.payload(), &node());
        assert_eq!(once.payload(), &node());
        assert_eq!(twice.into_payload(), node());
    }

    #[test]
    fn resolve_returns_none_for_null() {
        assert_eq!(RawRecord::resolve(Value::Null), None);
    }

    #[test]
    fn resolve_ignores_scalar_value_fields() {
        let record = RawRecord::resolve(json!({ "value": 3 })).expect("record");
        assert_eq!(record, RawRecord::Bare(json!({ "value": 3 })));
    }

    #[test]
    fn unwrap_value_matches_resolve() {
        let wrapped = json!({ "value": { "value": node() } });
        assert_eq!(unwrap_value(&wrapped), &node());
        assert_eq!(unwrap_value(&node()), &node());
    }

    #[test]
    fn graph_reads_enveloped_blocks_and_fills_missing_ids() {
        let graph = DocumentGraph::from_json(json!({
            "block": {
                "b1": { "value": { "value": { "type": "page", "format": { "page_full_width": true } } } },
                "b2": null,
                "b3": { "value": { "type": 42 } }
            }
        }))
        .expect("graph");

        let block = graph.block("b1").expect("b1");
        assert_eq!(block.id, "b1");
        assert!(block.full_width());
        assert!(graph.block("b2").is_none());
        assert_eq!(graph.rejected(), ["b3".to_string()]);
    }

    #[test]
    fn created_time_accepts_numbers_and_rfc3339() {
        let graph = DocumentGraph::from_json(json!({
            "block": {
                "n": { "created_time": 1_704_067_200_000_i64 },
                "s": { "created_time": "2024-01-01T00:00:00Z" },
                "x": { "created_time": true }
            }
        }))
        .expect("graph");

        assert_eq!(graph.block("n").and_then(|b| b.created_time), Some(1_704_067_200_000));
        assert_eq!(graph.block("s").and_then(|b| b.created_time), Some(1_704_067_200_000));
        assert_eq!(graph.block("x").and_then(|b| b.created_time), None);
    }

    #[test]
    fn detector_takes_first_schema_in_response_order() {
        let graph = DocumentGraph::from_json(json!({
            "collection": {
                "c-empty": { "value": { "id": "c-empty" } },
                "c-second": { "value": { "id": "c-second", "schema": {
                    "title": { "name": "title", "type": "title" }
                } } },
                "c-third": { "value": { "id": "c-third", "schema": {
                    "xyz": { "name": "other", "type": "text" }
                } } }
            }
        }))
        .expect("graph");

        let target = graph.detect_database("root").expect("database");
        assert_eq!(target.collection_id, Some("c-second"));
        assert!(target.schema.expect("schema").contains_key("title"));
    }

    #[test]
    fn malformed_schema_entries_are_skipped() {
        let graph = DocumentGraph::from_json(json!({
            "block": { "root": { "value": {
                "type": "collection_view_page",
                "view_ids": ["v1", 7, null, "v2"]
            } } },
            "collection": { "c1": { "value": { "id": "c1", "schema": {
                "title": { "name": "title", "type": "title" },
                "k-bad": { "name": 5, "type": "text" },
                "k-junk": "select",
                "k-nameless": { "type": "text" }
            } } } }
        }))
        .expect("graph");

        assert!(graph.rejected().is_empty());
        assert_eq!(graph.block("root").expect("root").view_ids(), ["v1", "v2"]);

        let target = graph.detect_database("root").expect("database");
        assert_eq!(target.collection_id, Some("c1"));
        let schema = target.schema.expect("schema");
        assert_eq!(schema.len(), 2);
        assert_eq!(schema.get("title").map(|s| s.kind.as_str()), Some("title"));
        assert_eq!(schema.get("k-nameless").map(|s| s.name.as_str()), Some(""));
    }

    #[test]
    fn detector_accepts_collection_without_schema() {
        let graph = DocumentGraph::from_json(json!({
            "collection": { "c1": { "value": { "id": "c1" } } }
        }))
        .expect("graph");

        let target = graph.detect_database("root").expect("database");
        assert_eq!(target.collection_id, Some("c1"));
        assert!(target.schema.is_none());
    }

    #[test]
    fn detector_accepts_collection_view_block_type() {
        for kind in [COLLECTION_VIEW_PAGE, COLLECTION_VIEW] {
            let graph = DocumentGraph::from_json(json!({
                "block": { "root": { "value": { "type": kind } } }
            }))
            .expect("graph");
            let target = graph.detect_database("root").expect("database");
            assert_eq!(target.root_kind, Some(kind));
        }
    }

    #[test]
    fn detector_rejects_plain_pages() {
        let graph = DocumentGraph::from_json(json!({
            "block": { "root": { "value": { "type": "page" } } }
        }))
        .expect("graph");
        assert!(graph.detect_database("root").is_none());
        assert!(DocumentGraph::default().detect_database("root").is_none());
    }

    #[test]
    fn merge_overwrites_existing_records() {
        let mut base: RecordMap =
            serde_json::from_value(json!({ "block": { "a": { "type": "page" } } })).expect("map");
        let update: RecordMap = serde_json::from_value(json!({
            "block": { "a": { "type": "text" }, "b": { "type": "page" } }
        }))
        .expect("map");

        base.merge(update);
        assert_eq!(base.block.len(), 2);
        assert_eq!(base.block["a"]["type"], "text");
    }
}
