//! Migration plan: which source collections feed which destination
//! collections, through which transform, with which tuning.
//!
//! A plan is loaded once at startup (TOML file or the built-in mapping with
//! source ids bound from the environment) and handed to the orchestrator by
//! value. Nothing downstream reads configuration on its own.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};

use crate::constants::{
    DEFAULT_BATCH_SIZE, DEFAULT_PAGE_DELAY_MS, DEFAULT_PAGE_SIZE, DEFAULT_RATE_LIMIT_DELAY_MS,
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_DELAY_MS, DEFAULT_TRANSFORM, DEFAULT_VALIDATION_TOLERANCE,
    ENV_PREFIX, MAX_PAGE_SIZE,
};
use crate::env_config::parse_with_default;
use crate::error::PlanError;

/// Tuning shared by every module of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrationSettings {
    pub batch_size: usize,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub rate_limit_delay_ms: u64,
    pub page_size: u32,
    pub page_delay_ms: u64,
    pub validation_tolerance: f64,
    /// Filter out records whose `source_id` already exists in the target.
    pub skip_existing: bool,
}

impl Default for MigrationSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            retry_attempts: DEFAULT_RETRY_ATTEMPTS,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            rate_limit_delay_ms: DEFAULT_RATE_LIMIT_DELAY_MS,
            page_size: DEFAULT_PAGE_SIZE,
            page_delay_ms: DEFAULT_PAGE_DELAY_MS,
            validation_tolerance: DEFAULT_VALIDATION_TOLERANCE,
            skip_existing: true,
        }
    }
}

impl MigrationSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    /// Apply `PORTAL_MIGRATE_*` overrides from the process environment.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from `lookup`; unparseable values keep the current setting.
    #[must_use]
    pub fn with_overrides(self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |suffix: &str| {
            let key = format!("{ENV_PREFIX}{suffix}");
            let raw = lookup(&key);
            (key, raw)
        };
        macro_rules! field {
            ($suffix:literal, $current:expr) => {{
                let (key, raw) = get($suffix);
                parse_with_default(&key, raw.as_deref(), $current)
            }};
        }
        Self {
            batch_size: field!("BATCH_SIZE", self.batch_size),
            retry_attempts: field!("RETRY_ATTEMPTS", self.retry_attempts),
            retry_delay_ms: field!("RETRY_DELAY_MS", self.retry_delay_ms),
            rate_limit_delay_ms: field!("RATE_LIMIT_DELAY_MS", self.rate_limit_delay_ms),
            page_size: field!("PAGE_SIZE", self.page_size),
            page_delay_ms: field!("PAGE_DELAY_MS", self.page_delay_ms),
            validation_tolerance: field!("VALIDATION_TOLERANCE", self.validation_tolerance),
            skip_existing: field!("SKIP_EXISTING", self.skip_existing),
        }
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        if self.batch_size == 0 {
            return Err(PlanError::Invalid("batch_size must be at least 1".into()));
        }
        if self.retry_attempts == 0 {
            return Err(PlanError::Invalid("retry_attempts must be at least 1".into()));
        }
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(PlanError::Invalid(format!("page_size must be within 1..={MAX_PAGE_SIZE}")));
        }
        if !(self.validation_tolerance > 0.0 && self.validation_tolerance <= 1.0) {
            return Err(PlanError::Invalid("validation_tolerance must be within (0, 1]".into()));
        }
        Ok(())
    }
}

/// One logical entity: sources, destination collection(s) and transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleConfig {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(alias = "target", deserialize_with = "one_or_many")]
    pub targets: Vec<String>,
    #[serde(default = "default_transform")]
    pub transform: String,
    /// Destination collections whose migrated ids seed the relation map.
    #[serde(default)]
    pub relations: Vec<String>,
}

fn default_transform() -> String {
    DEFAULT_TRANSFORM.to_owned()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(s) => vec![s],
        OneOrMany::Many(v) => v,
    })
}

impl ModuleConfig {
    pub fn new(
        name: impl Into<String>,
        sources: Vec<String>,
        target: impl Into<String>,
        transform: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            sources,
            targets: vec![target.into()],
            transform: transform.into(),
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }

    #[must_use]
    pub fn with_relations(mut self, relations: Vec<String>) -> Self {
        self.relations = relations;
        self
    }

    /// Collection a flat transform writes to.
    pub fn primary_target(&self) -> &str {
        self.targets.first().map_or("", String::as_str)
    }

    /// Source ids that are actually set.
    pub fn configured_sources(&self) -> impl Iterator<Item = &str> {
        self.sources.iter().map(String::as_str).filter(|s| !s.trim().is_empty())
    }
}

/// The full ordered list of modules plus shared settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    #[serde(default)]
    pub settings: MigrationSettings,
    #[serde(default, rename = "module")]
    pub modules: Vec<ModuleConfig>,
}

/// `(module, source env vars, targets, transform, relations)` of the built-in mapping.
type BuiltinModule = (&'static str, &'static [&'static str], &'static [&'static str], &'static str, &'static [&'static str]);

const BUILTIN_MODULES: &[BuiltinModule] = &[
    (
        "crm_contacts",
        &["NOTION_DB_CONTACTS_ENTREPRISES", "NOTION_DB_CONTACTS_PERSONNES"],
        &["companies", "people"],
        "mergeContacts",
        &[],
    ),
    ("people", &["NOTION_DB_CONTACTS_PERSONNES"], &["people"], "standardPerson", &[]),
    (
        "providers",
        &[
            "NOTION_DB_PRESTATAIRES",
            "NOTION_DB_FREELANCES",
            "NOTION_DB_AGENCES",
            "NOTION_DB_FOURNISSEURS_IT",
            "NOTION_DB_CONSULTANTS",
        ],
        &["providers"],
        "unifyProviders",
        &[],
    ),
    ("customer_success", &["NOTION_DB_CUSTOMER_SUCCESS"], &["customer_success"], "standard", &["companies"]),
    (
        "invoices",
        &["NOTION_DB_FACTURES_CLIENTS", "NOTION_DB_FACTURES_FOURNISSEURS"],
        &["invoices"],
        "mergeInvoices",
        &["companies", "providers"],
    ),
    ("expenses", &["NOTION_DB_NOTES_FRAIS"], &["expenses"], "standard", &["people"]),
    ("subscriptions", &["NOTION_DB_SUIVI_ABONNEMENTS"], &["subscriptions"], "standard", &["companies"]),
    (
        "bank_transactions",
        &["NOTION_DB_TRANSACTIONS_BANCAIRES", "NOTION_DB_COMPTES_BANCAIRES"],
        &["bank_transactions"],
        "mergeBanking",
        &["invoices"],
    ),
    (
        "accounting",
        &[
            "NOTION_DB_ECRITURES_COMPTABLES",
            "NOTION_DB_TVA_DECLARATIONS",
            "NOTION_DB_PREVISIONS_TRESORERIE",
        ],
        &["accounting_entries"],
        "consolidateAccounting",
        &["invoices"],
    ),
    ("projects", &["NOTION_DB_PROJETS"], &["projects"], "standard", &["companies", "people"]),
    ("deliverables", &["NOTION_DB_LIVRAISONS"], &["deliverables"], "standard", &["projects"]),
    ("support", &["NOTION_DB_TICKETS_SUPPORT"], &["support_tickets"], "standard", &["companies", "projects"]),
];

impl MigrationPlan {
    pub fn new(settings: MigrationSettings, modules: Vec<ModuleConfig>) -> Self {
        Self { settings, modules }
    }

    /// Load and check a TOML plan file.
    pub fn load(path: &Path) -> Result<Self, PlanError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|source| PlanError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, PlanError> {
        let plan: Self = toml::from_str(raw)?;
        plan.validate()?;
        Ok(plan)
    }

    /// The built-in module mapping with source ids bound through `lookup`.
    ///
    /// Unset variables leave the source out; a module with no source left is
    /// kept so the plan still lists it.
    pub fn builtin(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let modules = BUILTIN_MODULES
            .iter()
            .map(|(name, source_vars, targets, transform, relations)| ModuleConfig {
                name: (*name).to_owned(),
                sources: source_vars
                    .iter()
                    .filter_map(|var| lookup(var))
                    .filter(|id| !id.trim().is_empty())
                    .collect(),
                targets: targets.iter().map(|t| (*t).to_owned()).collect(),
                transform: (*transform).to_owned(),
                relations: relations.iter().map(|r| (*r).to_owned()).collect(),
            })
            .collect();
        Self { settings: MigrationSettings::default(), modules }
    }

    pub fn builtin_from_env() -> Self {
        Self::builtin(|var| std::env::var(var).ok())
    }

    pub fn modules(&self) -> &[ModuleConfig] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&ModuleConfig> {
        self.modules.iter().find(|m| m.name == name)
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        self.settings.validate()?;
        let mut seen = HashSet::new();
        for module in &self.modules {
            if module.name.trim().is_empty() {
                return Err(PlanError::Invalid("module name must not be empty".into()));
            }
            if !seen.insert(module.name.as_str()) {
                return Err(PlanError::Invalid(format!("duplicate module '{}'", module.name)));
            }
            if module.targets.is_empty() || module.targets.iter().any(|t| t.trim().is_empty()) {
                return Err(PlanError::Invalid(format!("module '{}' needs a target collection", module.name)));
            }
        }
        Ok(())
    }
}
