//! Decoding raw Notion property cells into named values.
//!
//! A raw cell is rich text: a list of segments, each `[text]` or
//! `[text, annotations]`. Dates and people are inline mentions (`"‣"`) whose
//! annotation list carries a `["d", {..}]` or `["u", "<user id>"]` entry.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::graph::{DocumentGraph, Schema};
use crate::util::timezone;

const DATE_ANNOTATION: &str = "d";
const USER_ANNOTATION: &str = "u";
const OPTION_SEPARATOR: char = ',';

static NULL: Value = Value::Null;

/// Decoded `date` property. `start_date` is `YYYY-MM-DD`, `start_time` `HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateValue {
    pub start_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_zone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_format: Option<String>,
}

impl DateValue {
    pub fn on(start_date: impl Into<String>) -> Self {
        Self {
            start_date: start_date.into(),
            start_time: None,
            end_date: None,
            end_time: None,
            time_zone: None,
            date_format: None,
        }
    }

    /// Midnight of `start_date` as epoch milliseconds, read in the value's own
    /// zone when it names one and in `default_zone` otherwise. `start_time`
    /// is carried as data only and never moves the instant.
    pub fn start_millis(&self, default_zone: Tz) -> Option<i64> {
        let date = NaiveDate::parse_from_str(self.start_date.trim(), "%Y-%m-%d").ok()?;
        let zone = timezone::resolve_zone(self.time_zone.as_deref(), default_zone);
        Some(timezone::local_millis(date.and_time(NaiveTime::MIN), zone))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Date(DateValue),
    Options(Vec<String>),
    People(Vec<String>),
}

impl PropertyValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_date(&self) -> Option<&DateValue> {
        match self {
            Self::Date(date) => Some(date),
            _ => None,
        }
    }

    pub fn first_option(&self) -> Option<&str> {
        match self {
            Self::Options(options) => options.first().map(String::as_str),
            _ => None,
        }
    }
}

/// Named property values of one page, plus the page id when any raw
/// property was present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedProperties {
    pub id: Option<String>,
    pub fields: BTreeMap<String, PropertyValue>,
}

impl DecodedProperties {
    pub fn with_field(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    /// Empty or id-only sets come from pages that did not resolve.
    pub fn is_trivial(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PropertyValue> {
        self.fields.get(name)
    }
}

/// Decode the page `id` from `graph` with `schema`. `None` when the block is
/// absent from the graph.
pub fn decode_properties(
    id: &str,
    graph: &DocumentGraph,
    schema: Option<&Schema>,
) -> Option<DecodedProperties> {
    let block = graph.block(id)?;
    let raw = match block.properties.as_ref() {
        Some(raw) if !raw.is_empty() => raw,
        _ => return Some(DecodedProperties::default()),
    };

    let mut decoded = DecodedProperties {
        id: Some(id.to_string()),
        fields: BTreeMap::new(),
    };

    let Some(schema) = schema else {
        return Some(decoded);
    };

    for (key, cell) in raw {
        let Some(definition) = schema.get(key).filter(|d| !d.name.is_empty()) else {
            continue;
        };
        if let Some(value) = decode_cell(definition.kind.as_str(), cell) {
            decoded.fields.insert(definition.name.clone(), value);
        }
    }

    Some(decoded)
}

fn decode_cell(kind: &str, cell: &Value) -> Option<PropertyValue> {
    match kind {
        "date" => date_value(cell).map(PropertyValue::Date),
        "select" | "multi_select" => {
            let text = plain_text(cell);
            let options: Vec<String> = text
                .split(OPTION_SEPARATOR)
                .filter(|option| !option.is_empty())
                .map(str::to_string)
                .collect();
            (!options.is_empty()).then_some(PropertyValue::Options(options))
        }
        "person" => Some(PropertyValue::People(
            annotations(cell)
                .filter(|(name, _)| *name == USER_ANNOTATION)
                .filter_map(|(_, payload)| payload.as_str().map(str::to_string))
                .collect(),
        )),
        _ => Some(PropertyValue::Text(plain_text(cell))),
    }
}

/// Concatenated text of a rich-text cell.
pub fn plain_text(cell: &Value) -> String {
    match cell {
        Value::String(text) => text.clone(),
        Value::Array(segments) => segments
            .iter()
            .filter_map(|segment| match segment {
                Value::Array(parts) => parts.first().and_then(Value::as_str),
                Value::String(text) => Some(text.as_str()),
                _ => None,
            })
            .collect(),
        _ => String::new(),
    }
}

fn date_value(cell: &Value) -> Option<DateValue> {
    annotations(cell)
        .filter(|(name, _)| *name == DATE_ANNOTATION)
        .find_map(|(_, payload)| payload.as_object().and_then(date_from_object))
}

fn date_from_object(object: &Map<String, Value>) -> Option<DateValue> {
    serde_json::from_value(Value::Object(object.clone())).ok()
}

/// `(kind, payload)` pairs of every annotation in every segment.
fn annotations(cell: &Value) -> impl Iterator<Item = (&str, &Value)> {
    cell.as_array()
        .into_iter()
        .flatten()
        .filter_map(|segment| segment.as_array()?.get(1)?.as_array())
        .flatten()
        .filter_map(|annotation| {
            let parts = annotation.as_array()?;
            let name = parts.first()?.as_str()?;
            Some((name, parts.get(1).unwrap_or(&NULL)))
        })
}
