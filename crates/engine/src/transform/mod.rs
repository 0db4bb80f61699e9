//! Field transformation strategies.
//!
//! Every strategy is a [`Transformer`] registered in a [`TransformRegistry`]
//! under its name. Modules refer to strategies by that name; an unknown name
//! resolves to [`Standard`].

mod contacts;
mod enrich;
mod standard;

use std::collections::HashMap;

use portal_migrate_core::constants::DEFAULT_TRANSFORM;
use portal_migrate_core::{DestinationRecord, RelationMap, SourceRecord};

pub use contacts::{COMPANIES, MergeContacts, PEOPLE};
pub use enrich::{ConsolidateAccounting, MergeBanking, MergeInvoices, UnifyProviders};
pub use standard::{Standard, standard_record};

/// Destination rows bound for one collection.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionRecords {
    pub collection: String,
    pub records: Vec<DestinationRecord>,
}

/// Output of a strategy: rows for the module's target, or rows already split
/// across several collections.
#[derive(Debug, Clone, PartialEq)]
pub enum Transformed {
    Flat(Vec<DestinationRecord>),
    FanOut(Vec<CollectionRecords>),
}

impl Transformed {
    /// Total rows across every collection.
    pub fn len(&self) -> usize {
        match self {
            Self::Flat(records) => records.len(),
            Self::FanOut(groups) => groups.iter().map(|g| g.records.len()).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat output goes to `default_target`; fan-out keeps its own order.
    pub fn into_collections(self, default_target: &str) -> Vec<CollectionRecords> {
        match self {
            Self::Flat(records) => vec![CollectionRecords { collection: default_target.to_owned(), records }],
            Self::FanOut(groups) => groups,
        }
    }
}

/// A named, stateless mapping from source records to destination rows.
pub trait Transformer: Send + Sync {
    fn name(&self) -> &'static str;

    fn apply(&self, records: &[SourceRecord], relations: &RelationMap) -> Transformed;
}

/// Strategies by name, falling back to [`Standard`].
pub struct TransformRegistry {
    strategies: HashMap<&'static str, Box<dyn Transformer>>,
    fallback: Standard,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformRegistry").field("strategies", &self.names()).finish()
    }
}

impl Default for TransformRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl TransformRegistry {
    /// Only the fallback strategy.
    pub fn new() -> Self {
        Self { strategies: HashMap::new(), fallback: Standard }
    }

    /// Every built-in strategy.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(Standard));
        registry.register(Box::new(MergeContacts));
        registry.register(Box::new(UnifyProviders));
        registry.register(Box::new(MergeInvoices));
        registry.register(Box::new(MergeBanking));
        registry.register(Box::new(ConsolidateAccounting));
        registry
    }

    /// Add a strategy, replacing any registered under the same name.
    pub fn register(&mut self, transformer: Box<dyn Transformer>) {
        self.strategies.insert(transformer.name(), transformer);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.strategies.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub fn resolve(&self, name: &str) -> &dyn Transformer {
        if let Some(transformer) = self.strategies.get(name) {
            return transformer.as_ref();
        }
        tracing::warn!(strategy = name, fallback = DEFAULT_TRANSFORM, "unknown transform strategy");
        self.strategies.get(DEFAULT_TRANSFORM).map_or(&self.fallback as &dyn Transformer, |t| t.as_ref())
    }
}
