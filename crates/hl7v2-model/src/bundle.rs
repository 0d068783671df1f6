// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The output bundle and the per-conversion reference cache

use rustc_hash::FxHashMap;
use serde::Serialize;
use serde_json::{Map, Value};

/// One emitted resource record
///
/// Serializes as `{ "resourceType": ..., "id": ..., ...fields }` with the
/// field map flattened in template declaration order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BundleEntry {
    /// FHIR resource type of the entry
    #[serde(rename = "resourceType")]
    pub resource_type: String,
    /// Stable synthetic id allocated by the builder
    pub id: String,
    /// Evaluated output fields in template order
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl BundleEntry {
    /// Create an entry
    pub fn new(
        resource_type: impl Into<String>,
        id: impl Into<String>,
        fields: Map<String, Value>,
    ) -> Self {
        Self {
            resource_type: resource_type.into(),
            id: id.into(),
            fields,
        }
    }
}

/// The ordered output record of one conversion
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bundle {
    /// Bundle type, always `collection`
    #[serde(rename = "type")]
    pub bundle_type: String,
    /// Creation timestamp, ISO 8601
    pub timestamp: String,
    /// Entries in resource-entry declaration order
    pub entries: Vec<BundleEntry>,
}

impl Bundle {
    /// Create an empty collection bundle with the given timestamp
    pub fn new(timestamp: impl Into<String>) -> Self {
        Self {
            bundle_type: "collection".to_string(),
            timestamp: timestamp.into(),
            entries: Vec::new(),
        }
    }

    /// Append an entry
    pub fn push(&mut self, entry: BundleEntry) {
        self.entries.push(entry);
    }
}

/// Per-conversion index mapping resource type to most-recent id
///
/// Published by the resource builder for entries flagged `isReferenced`;
/// consumed by `$ref:<Type>` expressions. Later publications of the same
/// type overwrite earlier ones so referrers always see the most recent
/// entry.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    ids: FxHashMap<String, String>,
}

impl ReferenceCache {
    /// Create an empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish the id of a just-emitted entry, overwriting any prior one
    pub fn publish(&mut self, resource_type: impl Into<String>, id: impl Into<String>) {
        self.ids.insert(resource_type.into(), id.into());
    }

    /// Id of the most recently published entry of the given type
    pub fn resolve(&self, resource_type: &str) -> Option<&str> {
        self.ids.get(resource_type).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_entry_serialization_flattens_fields() {
        let mut fields = Map::new();
        fields.insert("gender".to_string(), json!("male"));
        fields.insert("birthDate".to_string(), json!("1980-02-02"));
        let entry = BundleEntry::new("Patient", "abc-123", fields);

        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["resourceType"], "Patient");
        assert_eq!(value["id"], "abc-123");
        assert_eq!(value["gender"], "male");
        assert_eq!(value["birthDate"], "1980-02-02");
    }

    #[test]
    fn test_field_order_follows_insertion() {
        let mut fields = Map::new();
        fields.insert("b".to_string(), json!(1));
        fields.insert("a".to_string(), json!(2));
        let entry = BundleEntry::new("Patient", "x", fields);

        let text = serde_json::to_string(&entry).unwrap();
        let b_pos = text.find("\"b\"").unwrap();
        let a_pos = text.find("\"a\"").unwrap();
        assert!(b_pos < a_pos);
    }

    #[test]
    fn test_reference_cache_overwrites_by_type() {
        let mut cache = ReferenceCache::new();
        assert_eq!(cache.resolve("Patient"), None);

        cache.publish("Patient", "first");
        cache.publish("Patient", "second");
        assert_eq!(cache.resolve("Patient"), Some("second"));
    }
}
