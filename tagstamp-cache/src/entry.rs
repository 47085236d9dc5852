//! Cached payloads and their serialized form.
//!
//! An entry is stored as a JSON object with exactly the keys
//! `tags, data, time, max_id, min_id, id_tag`. Encoding is total over the
//! payload variants and fails loudly otherwise; decoding never fails and
//! degrades to [`CacheEntry::default`].

use crate::error::{CacheError, CacheResult};
use crate::tag::TagRecord;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// An object that can materialize itself as a JSON array or object.
///
/// Implemented by result containers (database row sets and the like) so they
/// can be cached without first being converted by the caller.
pub trait ArrayView: fmt::Debug + Send + Sync {
    /// Materialize the view. Must produce a JSON array or object.
    fn to_array(&self) -> CacheResult<Value>;
}

/// Cached data.
#[derive(Debug, Clone)]
pub enum Payload {
    /// A scalar, stored as its string form
    Scalar(String),
    /// A JSON array or object, stored verbatim
    Structured(Value),
    /// An object exposing an array view, stored as the materialized view
    View(Arc<dyn ArrayView>),
}

impl Payload {
    /// Wrap a structured JSON value.
    pub fn structured(value: Value) -> Self {
        Self::Structured(value)
    }

    /// Wrap an array-view object.
    pub fn view(view: impl ArrayView + 'static) -> Self {
        Self::View(Arc::new(view))
    }

    /// Render the payload into the value stored under `data`.
    pub fn to_value(&self) -> CacheResult<Value> {
        match self {
            Self::Scalar(s) => Ok(Value::String(s.clone())),
            Self::Structured(value) => Self::require_container(value.clone(), "structured payload"),
            Self::View(view) => Self::require_container(view.to_array()?, "array view"),
        }
    }

    /// Map a decoded `data` value back onto a payload.
    fn from_stored(value: Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::String(s) => Some(Self::Scalar(s)),
            Value::Bool(b) => Some(b.into()),
            Value::Number(n) => Some(Self::Scalar(n.to_string())),
            container => Some(Self::Structured(container)),
        }
    }

    fn require_container(value: Value, what: &str) -> CacheResult<Value> {
        match value {
            Value::Array(_) | Value::Object(_) => Ok(value),
            other => Err(CacheError::Serialization(format!(
                "{} must be an array or object, got {}",
                what,
                json_kind(&other)
            ))),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl PartialEq for Payload {
    /// Payloads are equal when they store the same JSON.
    fn eq(&self, other: &Self) -> bool {
        match (self.to_value(), other.to_value()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Self::Scalar(value)
    }
}

impl From<i64> for Payload {
    fn from(value: i64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<f64> for Payload {
    fn from(value: f64) -> Self {
        Self::Scalar(value.to_string())
    }
}

impl From<bool> for Payload {
    fn from(value: bool) -> Self {
        Self::Scalar(if value { "1" } else { "" }.to_string())
    }
}

/// A cached payload plus the tag stamps it was computed against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheEntry {
    /// Cached data; `None` is null
    pub data: Option<Payload>,

    /// Tags the entry depends on, in insertion order
    pub tags: Vec<String>,

    /// Unix time (seconds) the entry was computed at
    pub time: i64,

    /// Upper bound of the id range the entry covers
    pub max_id: i64,

    /// Lower bound of the id range the entry covers
    pub min_id: i64,

    /// Primary identity tag, empty when unset
    pub id_tag: String,
}

#[derive(Serialize)]
struct StoredEntry<'a> {
    tags: &'a [String],
    data: Value,
    time: i64,
    max_id: i64,
    min_id: i64,
    id_tag: &'a str,
}

#[derive(Default, Deserialize)]
#[serde(default)]
struct DecodedEntry {
    tags: Vec<String>,
    data: Value,
    time: i64,
    max_id: i64,
    min_id: i64,
    id_tag: String,
}

impl CacheEntry {
    /// Create an entry holding `data`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagstamp_cache::CacheEntry;
    ///
    /// let entry = CacheEntry::new("42").with_tags(["orders"]);
    /// assert_eq!(
    ///     entry.to_json().unwrap(),
    ///     r#"{"tags":["orders"],"data":"42","time":0,"max_id":0,"min_id":0,"id_tag":""}"#
    /// );
    /// ```
    pub fn new(data: impl Into<Payload>) -> Self {
        Self {
            data: Some(data.into()),
            ..Default::default()
        }
    }

    /// Set the payload.
    pub fn with_data(mut self, data: impl Into<Payload>) -> Self {
        self.data = Some(data.into());
        self
    }

    /// Set the tag list.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Set the entry time.
    pub fn with_time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    /// Set the covered id range.
    pub fn with_range(mut self, min_id: i64, max_id: i64) -> Self {
        self.min_id = min_id;
        self.max_id = max_id;
        self
    }

    /// Set the identity tag.
    pub fn with_id_tag(mut self, id_tag: impl Into<String>) -> Self {
        self.id_tag = id_tag.into();
        self
    }

    /// Copy a tag's stamp into the entry and make it the identity tag.
    ///
    /// The tag is appended to [`CacheEntry::tags`] if it is not listed yet.
    pub fn stamped_by(mut self, tag: &TagRecord) -> Self {
        self.time = tag.time;
        self.min_id = tag.min_id;
        self.max_id = tag.max_id;
        self.id_tag = tag.name.clone();
        if !self.tags.iter().any(|t| t == &tag.name) {
            self.tags.push(tag.name.clone());
        }
        self
    }

    /// Whether every field holds its default, i.e. nothing was cached.
    pub fn is_empty(&self) -> bool {
        self.data.is_none()
            && self.tags.is_empty()
            && self.time == 0
            && self.max_id == 0
            && self.min_id == 0
            && self.id_tag.is_empty()
    }

    /// Render the stored JSON document.
    pub fn to_json(&self) -> CacheResult<String> {
        let data = match &self.data {
            Some(payload) => payload.to_value()?,
            None => Value::Null,
        };

        let stored = StoredEntry {
            tags: &self.tags,
            data,
            time: self.time,
            max_id: self.max_id,
            min_id: self.min_id,
            id_tag: &self.id_tag,
        };

        Ok(serde_json::to_string(&stored)?)
    }

    /// Build an entry from a decoded mapping.
    ///
    /// Anything that does not decode as an entry yields the default entry.
    pub fn from_value(value: Value) -> Self {
        let decoded = match value {
            Value::Object(_) => serde_json::from_value::<DecodedEntry>(value).unwrap_or_default(),
            _ => DecodedEntry::default(),
        };

        Self {
            data: Payload::from_stored(decoded.data),
            tags: decoded.tags,
            time: decoded.time,
            max_id: decoded.max_id,
            min_id: decoded.min_id,
            id_tag: decoded.id_tag,
        }
    }

    /// Decode a stored JSON document.
    ///
    /// Empty, absent or malformed documents yield the default entry.
    pub fn from_json(json: &str) -> Self {
        serde_json::from_str::<Value>(json)
            .map(Self::from_value)
            .unwrap_or_default()
    }
}
