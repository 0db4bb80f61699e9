use portal_migrate_core::{DestinationRecord, RelationMap, SourceRecord, extract_value, normalize_field_name};
use serde_json::Value;

use super::{Transformed, Transformer};

/// One row per record: every property under its normalized name.
#[derive(Debug, Clone, Copy, Default)]
pub struct Standard;

impl Transformer for Standard {
    fn name(&self) -> &'static str {
        "standard"
    }

    fn apply(&self, records: &[SourceRecord], relations: &RelationMap) -> Transformed {
        Transformed::Flat(records.iter().map(|r| standard_record(r, relations)).collect())
    }
}

/// The row every strategy starts from.
pub fn standard_record(record: &SourceRecord, relations: &RelationMap) -> DestinationRecord {
    let mut row = DestinationRecord::new(record.id.clone());
    row.insert("date_created", optional(record.created_time.as_deref()));
    row.insert("date_updated", optional(record.last_edited_time.as_deref()));

    for (name, property) in &record.properties {
        let value = match property.relation_ids() {
            Some(ids) if !relations.is_empty() => rewrite_relation(&record.id, name, ids, relations),
            _ => extract_value(property),
        };
        row.insert(normalize_field_name(name), value);
    }
    row
}

fn optional(value: Option<&str>) -> Value {
    value.map_or(Value::Null, |s| Value::String(s.to_owned()))
}

/// Source ids become destination ids; ids with no migrated counterpart are kept as-is.
fn rewrite_relation<'a>(
    record_id: &str,
    field: &str,
    ids: impl Iterator<Item = &'a str>,
    relations: &RelationMap,
) -> Value {
    let mut unresolved = Vec::new();
    let rewritten: Vec<Value> = ids
        .map(|id| match relations.resolve(id) {
            Some(target) => Value::String(target.to_owned()),
            None => {
                unresolved.push(id);
                Value::String(id.to_owned())
            },
        })
        .collect();
    if !unresolved.is_empty() {
        tracing::warn!(record = record_id, field, ?unresolved, "relation ids without a migrated target kept as source ids");
    }
    Value::Array(rewritten)
}
