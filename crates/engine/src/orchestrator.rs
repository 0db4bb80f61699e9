//! Drives every module of a plan through extract, transform, load and validate.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use portal_migrate_core::{DestinationApi, MigrationPlan, ModuleConfig, RelationMap, SourceApi};

use crate::error::EngineError;
use crate::extract::SourceExtractor;
use crate::load::BatchLoader;
use crate::report::{MigrationReport, ModulePhase, ModuleStats, RunMode};
use crate::transform::{CollectionRecords, TransformRegistry};
use crate::validate::Validator;

/// Runs modules strictly one after another; the source and destination rate
/// limits are shared by all of them.
pub struct MigrationOrchestrator {
    plan: MigrationPlan,
    source: Arc<dyn SourceApi>,
    destination: Arc<dyn DestinationApi>,
    registry: TransformRegistry,
    mode: RunMode,
    shutdown: Arc<AtomicBool>,
}

impl MigrationOrchestrator {
    pub fn new(plan: MigrationPlan, source: Arc<dyn SourceApi>, destination: Arc<dyn DestinationApi>) -> Self {
        Self {
            plan,
            source,
            destination,
            registry: TransformRegistry::with_defaults(),
            mode: RunMode::Apply,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.mode = if dry_run { RunMode::Simulate } else { RunMode::Apply };
        self
    }

    #[must_use]
    pub fn with_registry(mut self, registry: TransformRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Flag checked between modules; once set, no further module starts.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Arc<AtomicBool>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// The module mapping this orchestrator runs, in order.
    pub fn collection_mapping(&self) -> &[ModuleConfig] {
        self.plan.modules()
    }

    /// Check both APIs answer before anything is read or written.
    pub async fn preflight(&self) -> Result<(), EngineError> {
        self.source
            .ping()
            .await
            .map_err(|e| EngineError::Startup(format!("source API unavailable: {e}")))?;
        self.destination
            .ping()
            .await
            .map_err(|e| EngineError::Startup(format!("destination API unavailable: {e}")))?;
        tracing::info!("source and destination APIs reachable");
        Ok(())
    }

    /// Every module of the plan. A failing module is reported, never propagated.
    pub async fn execute(&self) -> MigrationReport {
        let started = Instant::now();
        let mut report = MigrationReport::new(self.mode, None);
        tracing::info!(modules = self.plan.modules().len(), mode = ?self.mode, "starting migration");

        for module in self.plan.modules() {
            if self.shutdown.load(Ordering::SeqCst) {
                tracing::warn!(next = %module.name, "shutdown requested; stopping before next module");
                report.interrupted = true;
                break;
            }
            report.record(self.module_stats(module).await);
        }

        report.finish(started.elapsed());
        tracing::info!(
            successful = report.summary.successful,
            failed = report.summary.failed,
            migrated = report.summary.migrated_items,
            "migration finished"
        );
        report
    }

    /// A single named module, reported the same way as a full run.
    pub async fn execute_module(&self, name: &str) -> Result<MigrationReport, EngineError> {
        let module = self.plan.module(name).ok_or_else(|| EngineError::UnknownModule(name.to_owned()))?;
        let started = Instant::now();
        let mut report = MigrationReport::new(self.mode, Some(name.to_owned()));
        report.record(self.module_stats(module).await);
        report.finish(started.elapsed());
        Ok(report)
    }

    /// Run one module, returning its error instead of a failed entry.
    pub async fn migrate_module(&self, module: &ModuleConfig) -> Result<ModuleStats, EngineError> {
        let mut stats = ModuleStats::start(module);
        self.run_module(module, &mut stats).await?;
        stats.finish();
        Ok(stats)
    }

    async fn module_stats(&self, module: &ModuleConfig) -> ModuleStats {
        let mut stats = ModuleStats::start(module);
        if let Err(e) = self.run_module(module, &mut stats).await {
            tracing::error!(module = %module.name, phase = ?stats.phase, "module failed: {e}");
            stats.fail(&e);
        }
        stats.finish();
        stats
    }

    fn enter(stats: &mut ModuleStats, phase: ModulePhase) {
        tracing::info!(module = %stats.module, ?phase, "entering phase");
        stats.phase = phase;
    }

    async fn run_module(&self, module: &ModuleConfig, stats: &mut ModuleStats) -> Result<(), EngineError> {
        let settings = &self.plan.settings;

        Self::enter(stats, ModulePhase::Extracting);
        let records = SourceExtractor::new(Arc::clone(&self.source), settings).extract(&module.sources).await?;
        stats.total_items = records.len();

        Self::enter(stats, ModulePhase::Transforming);
        let relations = self.relation_map(module).await;
        let mut groups = self
            .registry
            .resolve(&module.transform)
            .apply(&records, &relations)
            .into_collections(module.primary_target());
        let skipped = if settings.skip_existing {
            self.drop_existing(&mut groups).await?
        } else {
            vec![0; groups.len()]
        };
        stats.skipped = skipped.iter().sum();

        let pending: usize = groups.iter().map(|g| g.records.len()).sum();
        if self.mode.is_dry_run() {
            tracing::info!(module = %module.name, would_migrate = pending, skipped = stats.skipped, "dry run");
            stats.would_migrate = Some(pending);
            return Ok(());
        }

        Self::enter(stats, ModulePhase::Loading);
        let loader = BatchLoader::new(Arc::clone(&self.destination), settings);
        let mut loaded = Vec::with_capacity(groups.len());
        for group in &groups {
            let outcome = loader.load(&group.records, &group.collection).await;
            loaded.push(outcome.success);
            stats.absorb(outcome);
        }

        Self::enter(stats, ModulePhase::Validating);
        let validator = Validator::new(Arc::clone(&self.destination), settings.validation_tolerance);
        let mut validated = true;
        for ((group, loaded), skipped) in groups.iter().zip(loaded).zip(skipped) {
            validated &= validator.validate(&group.collection, loaded + skipped).await;
        }
        stats.validated = Some(validated);
        tracing::info!(
            module = %module.name,
            total = stats.total_items,
            migrated = stats.migrated,
            failed = stats.failed,
            skipped = stats.skipped,
            validated,
            "module complete"
        );
        Ok(())
    }

    /// Source → destination ids of every collection the module references.
    async fn relation_map(&self, module: &ModuleConfig) -> RelationMap {
        let mut relations = RelationMap::new();
        for collection in &module.relations {
            match self.destination.source_id_pairs(collection).await {
                Ok(pairs) => relations.extend(pairs.into_iter().map(|p| (p.source_id, p.destination_id))),
                Err(e) => tracing::warn!(module = %module.name, collection, "relation ids unavailable: {e}"),
            }
        }
        if !module.relations.is_empty() {
            tracing::debug!(module = %module.name, ids = relations.len(), "relation map built");
        }
        relations
    }

    /// Remove records already migrated to their collection; returns the count removed per group.
    async fn drop_existing(&self, groups: &mut [CollectionRecords]) -> Result<Vec<usize>, EngineError> {
        let mut skipped = Vec::with_capacity(groups.len());
        for group in groups.iter_mut() {
            if group.records.is_empty() {
                skipped.push(0);
                continue;
            }
            let existing: HashSet<String> = self
                .destination
                .source_id_pairs(&group.collection)
                .await?
                .into_iter()
                .map(|p| p.source_id)
                .collect();
            let before = group.records.len();
            group.records.retain(|r| !existing.contains(r.source_id()));
            let removed = before - group.records.len();
            if removed > 0 {
                tracing::info!(collection = %group.collection, skipped = removed, "skipping already migrated records");
            }
            skipped.push(removed);
        }
        Ok(skipped)
    }
}
