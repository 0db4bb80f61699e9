use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::constants::SOURCE_ID_FIELD;
use crate::property::TypedProperty;

/// A page read from the source API.
///
/// Property keys are whatever the source database uses; nothing guarantees
/// two records of the same entity share them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: String,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, TypedProperty>,
}

impl SourceRecord {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into(), created_time: None, last_edited_time: None, properties: BTreeMap::new() }
    }

    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, property: TypedProperty) -> Self {
        self.properties.insert(name.into(), property);
        self
    }

    #[must_use]
    pub fn with_created_time(mut self, created: impl Into<String>) -> Self {
        self.created_time = Some(created.into());
        self
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }
}

/// A destination-shaped row: snake_case columns plus the originating source id.
///
/// Serializes as one flat JSON object with `source_id` alongside the columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationRecord {
    source_id: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

impl DestinationRecord {
    pub fn new(source_id: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), fields: Map::new() }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Set a column. `source_id` itself cannot be overwritten.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        if field == SOURCE_ID_FIELD {
            tracing::debug!(source_id = %self.source_id, "ignoring property shadowing source_id");
            return;
        }
        self.fields.insert(field, value);
    }

    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.insert(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// First of `fields` holding a truthy value.
    pub fn first_truthy(&self, fields: &[&str]) -> Option<&Value> {
        fields.iter().filter_map(|f| self.get(f)).find(|v| is_truthy(v))
    }

    pub fn is_truthy(&self, field: &str) -> bool {
        self.get(field).is_some_and(is_truthy)
    }
}

/// Null, false, zero, NaN, empty strings and empty arrays are falsy.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(_) => true,
    }
}

/// Source id → destination id lookup used to rewrite relation properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationMap {
    ids: HashMap<String, String>,
}

impl RelationMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, source_id: impl Into<String>, destination_id: impl Into<String>) {
        self.ids.insert(source_id.into(), destination_id.into());
    }

    pub fn resolve(&self, source_id: &str) -> Option<&str> {
        self.ids.get(source_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for RelationMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { ids: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for RelationMap {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        self.ids.extend(iter.into_iter().map(|(k, v)| (k.into(), v.into())));
    }
}
