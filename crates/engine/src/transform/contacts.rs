use portal_migrate_core::{RelationMap, SourceRecord};
use serde_json::Value;

use super::standard::standard_record;
use super::{CollectionRecords, Transformed, Transformer};

pub const COMPANIES: &str = "companies";
pub const PEOPLE: &str = "people";

/// Properties that mark a contact as a company.
const COMPANY_MARKERS: [&str; 3] = ["Domain", "Industry", "Company Name"];

/// Splits a mixed contact database into companies and people.
///
/// Anything without a company marker is treated as a person.
#[derive(Debug, Clone, Copy, Default)]
pub struct MergeContacts;

impl Transformer for MergeContacts {
    fn name(&self) -> &'static str {
        "mergeContacts"
    }

    fn apply(&self, records: &[SourceRecord], relations: &RelationMap) -> Transformed {
        let mut companies = Vec::new();
        let mut people = Vec::new();
        for record in records {
            let row = standard_record(record, relations);
            if COMPANY_MARKERS.iter().any(|marker| record.has_property(marker)) {
                companies.push(row.with("type", Value::from("company")));
            } else {
                people.push(row.with("type", Value::from("person")));
            }
        }
        tracing::debug!(companies = companies.len(), people = people.len(), "split contacts");
        Transformed::FanOut(vec![
            CollectionRecords { collection: COMPANIES.to_owned(), records: companies },
            CollectionRecords { collection: PEOPLE.to_owned(), records: people },
        ])
    }
}
