//! Per-module statistics and the run report.
//!
//! Stats are plain values: the orchestrator builds one [`ModuleStats`] per
//! module and folds it into the [`MigrationReport`] with [`MigrationReport::record`].

use std::fmt::Write as _;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use portal_migrate_core::ModuleConfig;
use serde::Serialize;

use crate::error::EngineError;
use crate::load::{BatchError, LoadOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    /// Dry run: nothing is written.
    Simulate,
    Apply,
}

impl RunMode {
    pub fn is_dry_run(self) -> bool {
        self == Self::Simulate
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModulePhase {
    Idle,
    Extracting,
    Transforming,
    Loading,
    Validating,
    Done,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleStatus {
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleStats {
    pub module: String,
    pub status: ModuleStatus,
    /// Last phase reached; `Failed` once the module has failed.
    pub phase: ModulePhase,
    /// The phase that was running when the module failed.
    pub failed_phase: Option<ModulePhase>,
    pub targets: Vec<String>,
    pub total_items: usize,
    pub migrated: usize,
    pub failed: usize,
    pub skipped: usize,
    pub would_migrate: Option<usize>,
    pub validated: Option<bool>,
    pub error: Option<String>,
    pub errors: Vec<BatchError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
}

impl ModuleStats {
    pub fn start(module: &ModuleConfig) -> Self {
        Self {
            module: module.name.clone(),
            status: ModuleStatus::Completed,
            phase: ModulePhase::Idle,
            failed_phase: None,
            targets: module.targets.clone(),
            total_items: 0,
            migrated: 0,
            failed: 0,
            skipped: 0,
            would_migrate: None,
            validated: None,
            error: None,
            errors: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: 0,
        }
    }

    pub fn absorb(&mut self, outcome: LoadOutcome) {
        self.migrated += outcome.success;
        self.failed += outcome.failed;
        self.errors.extend(outcome.errors);
    }

    /// Mark the module failed, remembering the phase it was in.
    pub fn fail(&mut self, error: &EngineError) {
        self.status = ModuleStatus::Failed;
        self.failed_phase = Some(self.phase);
        self.phase = ModulePhase::Failed;
        self.error = Some(error.to_string());
    }

    pub fn finish(&mut self) {
        let now = Utc::now();
        if self.status == ModuleStatus::Completed {
            self.phase = ModulePhase::Done;
        }
        self.duration_ms = u64::try_from((now - self.started_at).num_milliseconds()).unwrap_or(0);
        self.finished_at = Some(now);
    }

    /// Migrated share of extracted items, `None` when nothing was extracted.
    pub fn success_rate(&self) -> Option<f64> {
        (self.total_items > 0).then(|| self.migrated as f64 / self.total_items as f64 * 100.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_modules: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_items: usize,
    pub migrated_items: usize,
    pub failed_items: usize,
}

/// Outcome of one run, persisted as JSON with `--report`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub timestamp: DateTime<Utc>,
    pub mode: RunMode,
    /// Set when a single module was requested.
    pub module: Option<String>,
    pub interrupted: bool,
    pub duration_ms: u64,
    pub summary: ReportSummary,
    pub details: Vec<ModuleStats>,
}

impl MigrationReport {
    pub fn new(mode: RunMode, module: Option<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            mode,
            module,
            interrupted: false,
            duration_ms: 0,
            summary: ReportSummary::default(),
            details: Vec::new(),
        }
    }

    /// Fold one module's stats into the summary.
    pub fn record(&mut self, stats: ModuleStats) {
        let summary = &mut self.summary;
        summary.total_modules += 1;
        match stats.status {
            ModuleStatus::Completed => summary.successful += 1,
            ModuleStatus::Failed => summary.failed += 1,
        }
        summary.total_items += stats.total_items;
        summary.migrated_items += stats.migrated;
        summary.failed_items += stats.failed;
        self.details.push(stats);
    }

    pub fn finish(&mut self, elapsed: Duration) {
        self.duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
    }

    /// Migrated items per second over the whole run.
    pub fn throughput(&self) -> f64 {
        if self.duration_ms == 0 {
            return 0.0;
        }
        self.summary.migrated_items as f64 / (self.duration_ms as f64 / 1000.0)
    }

    /// Human-readable final table.
    pub fn render_summary(&self) -> String {
        let s = &self.summary;
        let mut out = String::new();
        let _ = writeln!(out, "Migration summary ({})", if self.mode.is_dry_run() { "dry run" } else { "apply" });
        let _ = writeln!(out, "  modules:  {}/{} successful, {} failed", s.successful, s.total_modules, s.failed);
        let _ = writeln!(out, "  items:    {}/{} migrated, {} failed", s.migrated_items, s.total_items, s.failed_items);
        let _ = writeln!(out, "  duration: {:.1}s", self.duration_ms as f64 / 1000.0);
        let _ = writeln!(out, "  rate:     {:.1} items/s", self.throughput());
        if self.interrupted {
            let _ = writeln!(out, "  interrupted: remaining modules were not run");
        }
        for stats in &self.details {
            let _ = writeln!(out, "{}", module_line(stats));
        }
        out
    }

    /// Write the report as pretty JSON, creating parent directories.
    pub fn write_json(&self, path: &Path) -> Result<(), EngineError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        tracing::info!(path = %path.display(), "report written");
        Ok(())
    }
}

fn module_line(stats: &ModuleStats) -> String {
    if stats.status == ModuleStatus::Failed {
        let error = stats.error.as_deref().unwrap_or("unknown error");
        return format!("  ❌ {}: {error}", stats.module);
    }
    if let Some(would) = stats.would_migrate {
        return format!("  🔍 {}: would migrate {would}/{} ({} skipped)", stats.module, stats.total_items, stats.skipped);
    }
    let badge = if stats.validated == Some(true) { "✅" } else { "⚠️" };
    let rate = stats.success_rate().map_or_else(|| "n/a".to_owned(), |r| format!("{r:.1}%"));
    let mut line = format!("  {badge} {}: {}/{} ({rate})", stats.module, stats.migrated, stats.total_items);
    if stats.skipped > 0 {
        let _ = write!(line, ", {} skipped", stats.skipped);
    }
    line
}
