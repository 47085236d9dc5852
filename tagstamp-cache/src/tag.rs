//! Tag freshness stamps.
//!
//! A tag's stored payload is `{"max_id":..,"min_id":..,"time":..}`. The tag
//! name is not part of the payload; readers attach the name they looked up.

use crate::error::CacheResult;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Current freshness stamp of a tag.
///
/// A freshly initialized tag has all fields at zero, meaning "never stamped".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TagRecord {
    /// Tag name, attached after lookup
    #[serde(skip)]
    pub name: String,

    /// Upper bound of the id range the tag covers
    pub max_id: i64,

    /// Lower bound of the id range the tag covers
    pub min_id: i64,

    /// Unix time (seconds) of the last invalidation
    pub time: i64,
}

impl TagRecord {
    /// Create a never-stamped record for the named tag.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Create a record stamped at the current time covering `min_id..=max_id`.
    ///
    /// # Examples
    ///
    /// ```
    /// use tagstamp_cache::TagRecord;
    ///
    /// let tag = TagRecord::invalidate("orders", 100, 200);
    /// assert!(tag.time > 0);
    /// assert!(tag.is_well_formed());
    /// ```
    pub fn invalidate(name: impl Into<String>, min_id: i64, max_id: i64) -> Self {
        Self::new(name).with_range(min_id, max_id).touch()
    }

    /// Build a record from a decoded JSON mapping.
    ///
    /// Returns `None` for payloads that carry no stamp at all: `null`, an
    /// empty object, or anything that is not an object with numeric fields.
    pub fn from_value(name: impl Into<String>, value: Value) -> Option<Self> {
        match &value {
            Value::Object(map) if !map.is_empty() => {}
            _ => return None,
        }

        serde_json::from_value::<TagRecord>(value)
            .ok()
            .map(|record| record.with_name(name))
    }

    /// Decode a stored tag payload.
    ///
    /// Empty or malformed payloads yield `None`.
    pub fn from_json(name: impl Into<String>, json: &str) -> Option<Self> {
        serde_json::from_str::<Value>(json)
            .ok()
            .and_then(|value| Self::from_value(name, value))
    }

    /// Attach the tag name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the stamp time.
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

    /// Restamp at the current Unix time.
    pub fn touch(mut self) -> Self {
        self.time = chrono::Utc::now().timestamp();
        self
    }

    /// Whether the record was never stamped.
    pub fn is_unstamped(&self) -> bool {
        self.time == 0 && self.min_id == 0 && self.max_id == 0
    }

    /// Whether the record may be written to the registry.
    ///
    /// Requires a name, and `min_id <= max_id` when both bounds are set.
    pub fn is_well_formed(&self) -> bool {
        if self.name.is_empty() {
            return false;
        }

        self.min_id == 0 || self.max_id == 0 || self.min_id <= self.max_id
    }

    /// Render the stored payload.
    pub fn to_json(&self) -> CacheResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}
