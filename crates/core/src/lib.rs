//! Core types and traits for portal-migrate
//!
//! This crate contains the domain types shared across all other crates:
//! source/destination records, the typed property extractor, the migration
//! plan and the traits both API clients implement.

pub mod constants;
mod destination;
mod env_config;
mod error;
mod plan;
mod property;
mod record;
mod source;
mod text_utils;

pub use destination::{CountFilter, DestinationApi, DestinationError, SourceIdPair};
pub use env_config::env_parse_with_default;
pub use error::PlanError;
pub use plan::{MigrationPlan, MigrationSettings, ModuleConfig};
pub use property::{
    DateValue, FileObject, FileUrl, FormulaValue, PersonRef, RelationRef, RichText, RollupValue,
    SelectOption, TypedProperty, extract_value, normalize_field_name,
};
pub use record::{DestinationRecord, RelationMap, SourceRecord};
pub use source::{PageRequest, QueryPage, SourceApi, SourceError, SourceErrorCode};
pub use text_utils::truncate;
