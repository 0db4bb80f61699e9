//! Strategies that add derived columns on top of the standard row.

use chrono::{DateTime, Datelike, NaiveDate};
use portal_migrate_core::{DestinationRecord, RelationMap, SourceRecord};
use serde_json::Value;

use super::standard::standard_record;
use super::{Transformed, Transformer};

/// `derive` reads the extracted values before relation ids are rewritten and returns the derived columns.
fn enrich_each(
    records: &[SourceRecord],
    relations: &RelationMap,
    derive: impl Fn(&SourceRecord, &DestinationRecord) -> Vec<(&'static str, Value)>,
) -> Transformed {
    let unmapped = RelationMap::new();
    Transformed::Flat(
        records
            .iter()
            .map(|r| {
                let derived = derive(r, &standard_record(r, &unmapped));
                let mut row = standard_record(r, relations);
                for (field, value) in derived {
                    row.insert(field, value);
                }
                row
            })
            .collect(),
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnifyProviders;

impl UnifyProviders {
    const KINDS: [&'static str; 3] = ["freelance", "agency", "consultant"];
    const RATING_FIELDS: [&'static str; 3] = ["rating", "score", "evaluation"];
}

impl Transformer for UnifyProviders {
    fn name(&self) -> &'static str {
        "unifyProviders"
    }

    fn apply(&self, records: &[SourceRecord], relations: &RelationMap) -> Transformed {
        enrich_each(records, relations, |_, row| {
            let kind = Self::KINDS.iter().copied().find(|k| row.is_truthy(k)).unwrap_or("supplier");
            let rating = row.first_truthy(&Self::RATING_FIELDS).cloned().unwrap_or(Value::from(0));
            vec![("provider_type", Value::from(kind)), ("unified_rating", rating)]
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeInvoices;

impl MergeInvoices {
    /// Keyword groups checked in order against the lowercased status.
    const STATUS_KEYWORDS: [(&'static str, [&'static str; 2]); 4] = [
        ("paid", ["paid", "payé"]),
        ("sent", ["sent", "envoyé"]),
        ("draft", ["draft", "brouillon"]),
        ("overdue", ["overdue", "retard"]),
    ];

    pub fn unified_status(status: Option<&str>) -> &'static str {
        let Some(status) = status.map(str::to_lowercase) else {
            return "pending";
        };
        Self::STATUS_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| status.contains(k)))
            .map_or("pending", |(unified, _)| *unified)
    }
}

impl Transformer for MergeInvoices {
    fn name(&self) -> &'static str {
        "mergeInvoices"
    }

    fn apply(&self, records: &[SourceRecord], relations: &RelationMap) -> Transformed {
        enrich_each(records, relations, |_, row| {
            let invoice_type = if row.is_truthy("client") { "client" } else { "supplier" };
            let status = Self::unified_status(row.get("status").and_then(Value::as_str));
            vec![("invoice_type", Value::from(invoice_type)), ("unified_status", Value::from(status))]
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeBanking;

impl Transformer for MergeBanking {
    fn name(&self) -> &'static str {
        "mergeBanking"
    }

    fn apply(&self, records: &[SourceRecord], relations: &RelationMap) -> Transformed {
        enrich_each(records, relations, |_, row| {
            let debit = row.get("amount").and_then(Value::as_f64).is_some_and(|a| a < 0.0);
            let account = row.first_truthy(&["account", "bank_account"]).cloned().unwrap_or(Value::from("main"));
            vec![
                ("transaction_type", Value::from(if debit { "debit" } else { "credit" })),
                ("account_normalized", account),
            ]
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolidateAccounting;

impl ConsolidateAccounting {
    /// Year of an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
    pub fn fiscal_year(created_time: Option<&str>) -> Option<i32> {
        let raw = created_time?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.year());
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok().map(|d| d.year())
    }
}

impl Transformer for ConsolidateAccounting {
    fn name(&self) -> &'static str {
        "consolidateAccounting"
    }

    fn apply(&self, records: &[SourceRecord], relations: &RelationMap) -> Transformed {
        enrich_each(records, relations, |record, row| {
            let category = if row.first_truthy(&["tva", "vat"]).is_some() {
                "vat"
            } else if row.first_truthy(&["forecast", "prevision"]).is_some() {
                "forecast"
            } else {
                "entry"
            };
            let year = Self::fiscal_year(record.created_time.as_deref()).map_or(Value::Null, Value::from);
            vec![("accounting_category", Value::from(category)), ("fiscal_year", year)]
        })
    }
}
