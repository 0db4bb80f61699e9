use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use portal_migrate_core::{
    DestinationRecord, MigrationPlan, MigrationSettings, ModuleConfig, SourceErrorCode, SourceRecord, TypedProperty,
};
use serde_json::json;

use crate::testing::{FakeDestination, FakeSource, fast_settings, numbered};
use crate::{
    BatchLoader, EngineError, MigrationOrchestrator, ModulePhase, ModuleStatus, RunMode, SourceExtractor, Validator,
};

fn ids(records: &[SourceRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

fn destination_rows(n: usize) -> Vec<DestinationRecord> {
    (1..=n).map(|i| DestinationRecord::new(format!("r_{i}")).with("name", json!(i))).collect()
}

fn orchestrator(
    settings: MigrationSettings,
    modules: Vec<ModuleConfig>,
    source: &Arc<FakeSource>,
    destination: &Arc<FakeDestination>,
) -> MigrationOrchestrator {
    MigrationOrchestrator::new(MigrationPlan::new(settings, modules), source.clone(), destination.clone())
}

#[tokio::test]
async fn test_extractor_reads_every_page() {
    let records = numbered("rec", 30);
    for (page_size, pages) in [(30, 1), (10, 3), (3, 10)] {
        let source = Arc::new(FakeSource::new().with_collection("db", records.clone()));
        let settings = MigrationSettings { page_size, ..fast_settings() };

        let extracted = SourceExtractor::new(source.clone(), &settings).extract(&["db".into()]).await.unwrap();

        assert_eq!(extracted, records, "page_size {page_size}");
        assert_eq!(source.calls_for("db"), pages, "page_size {page_size}");
    }
}

#[tokio::test]
async fn test_extractor_skips_failing_source() {
    let source = Arc::new(
        FakeSource::new()
            .with_collection("a", numbered("a", 10))
            .with_failing("b", 404, SourceErrorCode::ObjectNotFound)
            .with_collection("c", numbered("c", 5)),
    );
    let extractor = SourceExtractor::new(source.clone(), &fast_settings());

    let extracted = extractor.extract(&["a".into(), "b".into(), "".into(), "c".into()]).await.unwrap();

    assert_eq!(extracted.len(), 15);
    assert_eq!(ids(&extracted)[9..11], ["a_10", "c_1"]);
    assert_eq!(source.calls_for(""), 0);
}

#[tokio::test]
async fn test_extractor_fails_when_every_source_fails() {
    let source = Arc::new(FakeSource::new().with_failing("b", 403, SourceErrorCode::RestrictedResource));
    let result = SourceExtractor::new(source, &fast_settings()).extract(&["b".into(), "missing".into()]).await;
    assert!(matches!(result, Err(EngineError::Extraction(_))));
}

#[tokio::test]
async fn test_extractor_without_sources_is_empty() {
    let source = Arc::new(FakeSource::new());
    let extracted = SourceExtractor::new(source.clone(), &fast_settings()).extract(&[]).await.unwrap();
    assert!(extracted.is_empty());
    assert_eq!(source.total_calls(), 0);
}

#[tokio::test]
async fn test_extractor_aborts_on_unauthorized() {
    let source = Arc::new(
        FakeSource::new()
            .with_failing("a", 401, SourceErrorCode::Unauthorized)
            .with_collection("b", numbered("b", 3)),
    );
    let result = SourceExtractor::new(source.clone(), &fast_settings()).extract(&["a".into(), "b".into()]).await;
    assert!(matches!(result, Err(EngineError::Source(_))));
    assert_eq!(source.calls_for("b"), 0);
}

#[tokio::test]
async fn test_extractor_retries_transient_page_errors() {
    let source = Arc::new(FakeSource::new().with_collection("db", numbered("r", 4)).with_transient_failures(2));
    let settings = MigrationSettings { retry_attempts: 3, ..fast_settings() };

    let extracted = SourceExtractor::new(source.clone(), &settings).extract(&["db".into()]).await.unwrap();

    assert_eq!(extracted.len(), 4);
    assert_eq!(source.calls_for("db"), 3);
}

#[tokio::test]
async fn test_loader_retries_then_succeeds() {
    let destination = Arc::new(FakeDestination::new().with_failing_creates(2));
    let settings = MigrationSettings { retry_attempts: 3, ..fast_settings() };
    let rows = destination_rows(10);

    let outcome = BatchLoader::new(destination.clone(), &settings).load(&rows, "people").await;

    assert_eq!(outcome.success, 10);
    assert_eq!(outcome.failed, 0);
    assert_eq!(destination.create_sizes("people"), [10, 10, 10]);
    assert_eq!(destination.rows("people").len(), 10);
}

#[tokio::test]
async fn test_loader_gives_up_after_retry_attempts() {
    let destination = Arc::new(FakeDestination::new().with_rejected_collection("people"));
    let settings = MigrationSettings { retry_attempts: 3, batch_size: 50, ..fast_settings() };
    let rows = destination_rows(10);

    let outcome = BatchLoader::new(destination.clone(), &settings).load(&rows, "people").await;

    assert_eq!(destination.create_calls(), 3);
    assert_eq!(outcome.success, 0);
    assert_eq!(outcome.failed, 10);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].batch, "0-9");
    assert_eq!(outcome.errors[0].attempts, 3);
}

#[tokio::test]
async fn test_loader_continues_past_failed_batch() {
    let destination = Arc::new(FakeDestination::new().with_poisoned_record("r_15"));
    let settings = MigrationSettings { retry_attempts: 3, batch_size: 10, ..fast_settings() };
    let rows = destination_rows(30);

    let outcome = BatchLoader::new(destination.clone(), &settings).load(&rows, "people").await;

    assert_eq!(destination.create_sizes("people"), [10, 10, 10, 10, 10]);
    assert_eq!(outcome.success, 20);
    assert_eq!(outcome.failed, 10);
    assert_eq!(outcome.batches, 3);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].batch, "10-19");
    assert_eq!(outcome.errors[0].attempts, 3);
    let written = destination.rows("people");
    assert_eq!(written.len(), 20);
    assert_eq!(written[10].source_id(), "r_21");
    assert_eq!(written[19].source_id(), "r_30");
}

#[tokio::test]
async fn test_validator_tolerance_boundary() {
    let passing = Arc::new(FakeDestination::new().with_count("people", 95));
    let failing = Arc::new(FakeDestination::new().with_count("people", 94));
    assert!(Validator::new(passing, 0.95).validate("people", 100).await);
    assert!(!Validator::new(failing, 0.95).validate("people", 100).await);
}

#[tokio::test]
async fn test_end_to_end_single_module() {
    let source = Arc::new(FakeSource::new().with_collection("leads_raw", numbered("lead", 120)));
    let destination = Arc::new(FakeDestination::new());
    let module = ModuleConfig::new("leads", vec!["leads_raw".into()], "leads", "standard");
    let orchestrator = orchestrator(fast_settings(), vec![module], &source, &destination);

    let report = orchestrator.execute().await;

    assert_eq!(destination.create_sizes("leads"), [50, 50, 20]);
    let stats = &report.details[0];
    assert_eq!(stats.status, ModuleStatus::Completed);
    assert_eq!(stats.phase, ModulePhase::Done);
    assert_eq!(stats.total_items, 120);
    assert_eq!(stats.migrated, 120);
    assert_eq!(stats.validated, Some(true));
    assert_eq!(report.summary.migrated_items, 120);
    assert_eq!(destination.rows("leads")[119].source_id(), "lead_120");
}

#[tokio::test]
async fn test_failing_module_does_not_stop_the_next() {
    let source = Arc::new(
        FakeSource::new()
            .with_failing("invoices_db", 404, SourceErrorCode::ObjectNotFound)
            .with_collection("expenses_db", numbered("exp", 5)),
    );
    let destination = Arc::new(FakeDestination::new());
    let modules = vec![
        ModuleConfig::new("invoices", vec!["invoices_db".into()], "invoices", "mergeInvoices"),
        ModuleConfig::new("expenses", vec!["expenses_db".into()], "expenses", "standard"),
    ];

    let report = orchestrator(fast_settings(), modules, &source, &destination).execute().await;

    assert_eq!(report.details[0].status, ModuleStatus::Failed);
    assert_eq!(report.details[0].phase, ModulePhase::Failed);
    assert_eq!(report.details[0].failed_phase, Some(ModulePhase::Extracting));
    assert!(report.details[0].error.as_deref().unwrap().contains("extraction failed"));
    assert_eq!(report.details[1].status, ModuleStatus::Completed);
    assert_eq!(report.details[1].migrated, 5);
    assert_eq!(report.summary.successful, 1);
    assert_eq!(report.summary.failed, 1);
}

#[tokio::test]
async fn test_validation_shortfall_is_reported_not_failed() {
    let source = Arc::new(FakeSource::new().with_collection("leads_raw", numbered("lead", 10)));
    let destination = Arc::new(FakeDestination::new().with_count("leads", 0));
    let module = ModuleConfig::new("leads", vec!["leads_raw".into()], "leads", "standard");

    let report = orchestrator(fast_settings(), vec![module], &source, &destination).execute().await;

    let stats = &report.details[0];
    assert_eq!(stats.status, ModuleStatus::Completed);
    assert_eq!(stats.phase, ModulePhase::Done);
    assert_eq!(stats.migrated, 10);
    assert_eq!(stats.validated, Some(false));
    assert_eq!(report.summary.successful, 1);
    assert!(report.render_summary().contains("⚠️ leads: 10/10 (100.0%)"));
}

#[tokio::test]
async fn test_fan_out_loads_every_record() {
    let records = vec![
        SourceRecord::new("c1").with_property("Industry", TypedProperty::select("Retail")),
        SourceRecord::new("p1").with_property("Name", TypedProperty::title("Ada")),
        SourceRecord::new("p2").with_property("Name", TypedProperty::title("Grace")),
    ];
    let source = Arc::new(FakeSource::new().with_collection("contacts", records));
    let destination = Arc::new(FakeDestination::new());
    let module = ModuleConfig::new("crm_contacts", vec!["contacts".into()], "companies", "mergeContacts")
        .with_targets(vec!["companies".into(), "people".into()]);

    let report = orchestrator(fast_settings(), vec![module], &source, &destination).execute().await;

    assert_eq!(destination.rows("companies").len(), 1);
    assert_eq!(destination.rows("people").len(), 2);
    assert_eq!(report.details[0].migrated, report.details[0].total_items);
    assert_eq!(report.details[0].validated, Some(true));
}

#[tokio::test]
async fn test_dry_run_never_writes() {
    let source = Arc::new(FakeSource::new().with_collection("leads_raw", numbered("lead", 7)));
    let destination = Arc::new(FakeDestination::new());
    let module = ModuleConfig::new("leads", vec!["leads_raw".into()], "leads", "standard");
    let orchestrator = orchestrator(fast_settings(), vec![module], &source, &destination).with_dry_run(true);

    let report = orchestrator.execute().await;

    assert_eq!(report.mode, RunMode::Simulate);
    assert_eq!(destination.create_calls(), 0);
    assert_eq!(report.details[0].would_migrate, Some(7));
    assert_eq!(report.details[0].migrated, 0);
    assert_eq!(report.details[0].validated, None);
}

#[tokio::test]
async fn test_skip_existing_filters_migrated_records() {
    let source = Arc::new(FakeSource::new().with_collection("leads_raw", numbered("lead", 5)));
    let destination = Arc::new(
        FakeDestination::new().with_existing("leads", "lead_1", "901").with_existing("leads", "lead_2", "902"),
    );
    let module = ModuleConfig::new("leads", vec!["leads_raw".into()], "leads", "standard");

    let report = orchestrator(fast_settings(), vec![module], &source, &destination).execute().await;

    let stats = &report.details[0];
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.migrated, 3);
    assert_eq!(stats.validated, Some(true));
    let written: Vec<_> = destination.rows("leads").iter().map(|r| r.source_id().to_owned()).collect();
    assert_eq!(written, ["lead_3", "lead_4", "lead_5"]);
}

#[tokio::test]
async fn test_skip_existing_disabled_writes_everything() {
    let source = Arc::new(FakeSource::new().with_collection("leads_raw", numbered("lead", 3)));
    let destination = Arc::new(FakeDestination::new().with_existing("leads", "lead_1", "901"));
    let module = ModuleConfig::new("leads", vec!["leads_raw".into()], "leads", "standard");
    let settings = MigrationSettings { skip_existing: false, ..fast_settings() };

    let report = orchestrator(settings, vec![module], &source, &destination).execute().await;

    assert_eq!(report.details[0].skipped, 0);
    assert_eq!(destination.rows("leads").len(), 3);
}

#[tokio::test]
async fn test_relations_rewritten_to_destination_ids() {
    let invoice = SourceRecord::new("inv_1").with_property("Client", TypedProperty::relation(["co_src", "co_gone"]));
    let source = Arc::new(FakeSource::new().with_collection("invoices_db", vec![invoice]));
    let destination = Arc::new(FakeDestination::new().with_existing("companies", "co_src", "7"));
    let module = ModuleConfig::new("invoices", vec!["invoices_db".into()], "invoices", "mergeInvoices")
        .with_relations(vec!["companies".into()]);

    orchestrator(fast_settings(), vec![module], &source, &destination).execute().await;

    let rows = destination.rows("invoices");
    assert_eq!(rows[0].get("client"), Some(&json!(["7", "co_gone"])));
    assert_eq!(rows[0].get("invoice_type"), Some(&json!("client")));
}

#[tokio::test]
async fn test_unlisted_and_unresolved_relations_survive() {
    let invoice = SourceRecord::new("inv_1")
        .with_property("Client", TypedProperty::relation(["person_src"]))
        .with_property("Projet", TypedProperty::relation(["proj_src"]));
    let source = Arc::new(FakeSource::new().with_collection("invoices_db", vec![invoice]));
    let destination = Arc::new(FakeDestination::new().with_existing("companies", "co_src", "7"));
    let module = ModuleConfig::new("invoices", vec!["invoices_db".into()], "invoices", "mergeInvoices")
        .with_relations(vec!["companies".into()]);

    orchestrator(fast_settings(), vec![module], &source, &destination).execute().await;

    let rows = destination.rows("invoices");
    assert_eq!(rows[0].get("client"), Some(&json!(["person_src"])));
    assert_eq!(rows[0].get("projet"), Some(&json!(["proj_src"])));
    assert_eq!(rows[0].get("invoice_type"), Some(&json!("client")));
}

#[tokio::test]
async fn test_unknown_strategy_uses_standard() {
    let source = Arc::new(FakeSource::new().with_collection("people_db", numbered("person", 2)));
    let destination = Arc::new(FakeDestination::new());
    let module = ModuleConfig::new("people", vec!["people_db".into()], "people", "standardPerson");

    let report = orchestrator(fast_settings(), vec![module], &source, &destination).execute().await;

    assert_eq!(report.details[0].status, ModuleStatus::Completed);
    assert_eq!(destination.rows("people")[0].get("name"), Some(&json!("person 1")));
}

#[tokio::test]
async fn test_shutdown_flag_stops_before_next_module() {
    let source = Arc::new(FakeSource::new().with_collection("db", numbered("r", 2)));
    let destination = Arc::new(FakeDestination::new());
    let module = ModuleConfig::new("leads", vec!["db".into()], "leads", "standard");
    let orchestrator = orchestrator(fast_settings(), vec![module], &source, &destination)
        .with_shutdown(Arc::new(AtomicBool::new(true)));

    let report = orchestrator.execute().await;

    assert!(report.interrupted);
    assert!(report.details.is_empty());
    assert_eq!(source.total_calls(), 0);
}

#[tokio::test]
async fn test_preflight_reports_unreachable_api() {
    let source = Arc::new(FakeSource::new());
    let ok = Arc::new(FakeDestination::new());
    let down = Arc::new(FakeDestination::new().unreachable());

    assert!(orchestrator(fast_settings(), Vec::new(), &source, &ok).preflight().await.is_ok());
    let err = orchestrator(fast_settings(), Vec::new(), &source, &down).preflight().await.unwrap_err();
    assert!(matches!(err, EngineError::Startup(_)));

    let unreachable_source = Arc::new(FakeSource::new().unreachable());
    let err = orchestrator(fast_settings(), Vec::new(), &unreachable_source, &ok).preflight().await.unwrap_err();
    assert!(err.to_string().contains("source API unavailable"));
}

#[tokio::test]
async fn test_execute_single_module() {
    let source = Arc::new(
        FakeSource::new().with_collection("a_db", numbered("a", 2)).with_collection("b_db", numbered("b", 3)),
    );
    let destination = Arc::new(FakeDestination::new());
    let modules = vec![
        ModuleConfig::new("alpha", vec!["a_db".into()], "alpha", "standard"),
        ModuleConfig::new("beta", vec!["b_db".into()], "beta", "standard"),
    ];
    let orchestrator = orchestrator(fast_settings(), modules, &source, &destination);

    let report = orchestrator.execute_module("beta").await.unwrap();
    assert_eq!(report.module.as_deref(), Some("beta"));
    assert_eq!(report.summary.total_modules, 1);
    assert_eq!(destination.rows("beta").len(), 3);
    assert!(destination.rows("alpha").is_empty());

    let err = orchestrator.execute_module("gamma").await.unwrap_err();
    assert!(matches!(err, EngineError::UnknownModule(name) if name == "gamma"));
}

#[tokio::test]
async fn test_migrate_module_propagates_errors() {
    let source = Arc::new(FakeSource::new());
    let destination = Arc::new(FakeDestination::new());
    let module = ModuleConfig::new("ghost", vec!["nowhere".into()], "ghost", "standard");
    let orchestrator = orchestrator(fast_settings(), vec![module.clone()], &source, &destination);

    assert!(orchestrator.migrate_module(&module).await.is_err());
    assert_eq!(orchestrator.collection_mapping().len(), 1);
}
