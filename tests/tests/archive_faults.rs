//! Fault injection: the staged move never deletes what the archive did not
//! confirm, and every failure leaves a state the next run converges from.

use archive_core::{ArchivalConfig, EntityAggregate, Error, RunStatus, Stage};
use chrono::Duration;
use integration_tests::{fixtures, setup::PipelineContext};

#[tokio::test]
async fn test_archive_failure_aborts_before_eviction() {
    let now = fixtures::pinned_now();
    let ctx = PipelineContext::new(fixtures::u1_u2(now));
    ctx.archive.set_should_fail(true);

    let err = ctx.job().run_at(now).await.unwrap_err();

    assert!(matches!(err, Error::ArchiveWrite { confirmed: 0, .. }));
    assert_eq!(err.error_code(), "ARCH_003");
    assert!(ctx.active.delete_calls().is_empty());
    assert_eq!(ctx.active.records(), fixtures::u1_u2(now));

    let report = ctx.reports.report_for("2024-06-15").unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    let failure = report.error.unwrap();
    assert_eq!(failure.stage, Stage::Archive);
    assert_eq!(failure.code, "ARCH_003");
}

#[tokio::test]
async fn test_failure_in_later_batch_still_evicts_nothing() {
    let now = fixtures::pinned_now();
    let ctx = PipelineContext::new(fixtures::u1_u2(now));
    ctx.archive.fail_after(1);

    let config = ArchivalConfig {
        archive_batch_size: 1,
        ..Default::default()
    };
    let err = ctx.job_with(config).run_at(now).await.unwrap_err();

    assert!(matches!(err, Error::ArchiveWrite { confirmed: 1, .. }));
    assert!(ctx.active.delete_calls().is_empty());
    assert_eq!(ctx.active.user_record_count("u1"), 3);
    // The first batch stays archived; the next run overwrites it
    assert_eq!(ctx.archive.len(), 1);

    let report = ctx.reports.latest().unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.archived_records_count, 1);
    assert_eq!(report.evicted_records_count, 0);
}

#[tokio::test]
async fn test_selection_failure_is_fatal() {
    let now = fixtures::pinned_now();
    let ctx = PipelineContext::new(fixtures::u1_u2(now));
    ctx.active.set_fail_select(true);

    let err = ctx.job().run_at(now).await.unwrap_err();

    assert_eq!(err.error_code(), "ARCH_001");
    assert!(err.is_fatal());
    assert_eq!(ctx.active.fetch_calls(), 0);
    assert_eq!(ctx.archive.upsert_calls(), 0);

    let report = ctx.reports.latest().unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert_eq!(report.error.unwrap().stage, Stage::Select);
}

#[tokio::test]
async fn test_fetch_failure_is_fatal() {
    let now = fixtures::pinned_now();
    let ctx = PipelineContext::new(fixtures::u1_u2(now));
    ctx.active.set_fail_fetch(true);

    let err = ctx.job().run_at(now).await.unwrap_err();

    assert_eq!(err.error_code(), "ARCH_002");
    assert_eq!(ctx.archive.upsert_calls(), 0);
    assert!(ctx.active.delete_calls().is_empty());
    assert_eq!(ctx.reports.latest().unwrap().selected_users_count, 1);
}

#[tokio::test]
async fn test_partial_upsert_evicts_only_confirmed() {
    let now = fixtures::pinned_now();
    let ctx = PipelineContext::new(fixtures::u1_u2(now));
    ctx.archive.reject("u1-0001");

    let summary = ctx.job().run_at(now).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Completed);
    assert_eq!(summary.report.archived_records_count, 2);
    assert_eq!(summary.report.unconfirmed_records_count, 1);
    assert_eq!(summary.report.evicted_records_count, 2);
    // u1 is not fully archived yet
    assert_eq!(summary.report.archived_users_count, 0);
    assert_eq!(summary.report.archived_user_ids, Some(Vec::new()));

    let deletes = ctx.active.delete_calls();
    assert_eq!(deletes, vec![vec!["u1-0000".to_string(), "u1-0002".to_string()]]);
    assert!(ctx.active.record_ids().contains("u1-0001"));

    // The rejected record is re-selected and finished next run
    ctx.archive.clear_rejections();
    let next = ctx.job().run_at(now).await.unwrap();
    assert_eq!(next.report.archived_user_ids, Some(vec!["u1".to_string()]));
    assert_eq!(ctx.active.user_record_count("u1"), 0);
    assert_eq!(ctx.archive.records(), fixtures::stale_user(now));
}

#[tokio::test]
async fn test_eviction_failure_leaves_duplicates_and_recovers() {
    let now = fixtures::pinned_now();
    let ctx = PipelineContext::new(fixtures::u1_u2(now));
    ctx.active.set_fail_delete(true);

    let summary = ctx.job().run_at(now).await.unwrap();

    assert_eq!(summary.status(), RunStatus::EvictionIncomplete);
    assert_eq!(summary.exit_code(), 2);
    assert_eq!(summary.report.archived_records_count, 3);
    assert_eq!(summary.report.evicted_records_count, 0);
    assert!(matches!(
        summary.eviction_error,
        Some(Error::Eviction { pending: 3, .. })
    ));
    assert!(summary.to_string().contains("archived 3 records"));

    // Present in both stores
    assert_eq!(ctx.archive.records(), fixtures::stale_user(now));
    assert_eq!(ctx.active.user_record_count("u1"), 3);

    let report = ctx.reports.latest().unwrap();
    assert_eq!(report.status, RunStatus::EvictionIncomplete);
    assert_eq!(report.error.unwrap().code, "ARCH_004");

    // Re-selected next run; the upsert overwrites instead of duplicating
    ctx.active.set_fail_delete(false);
    let next = ctx.job().run_at(now).await.unwrap();
    assert_eq!(next.status(), RunStatus::Completed);
    assert_eq!(next.report.archived_user_ids, Some(vec!["u1".to_string()]));
    assert_eq!(ctx.archive.len(), 3);
    assert_eq!(ctx.active.user_record_count("u1"), 0);
}

#[tokio::test]
async fn test_report_failure_does_not_fail_run() {
    let now = fixtures::pinned_now();
    let ctx = PipelineContext::new(fixtures::u1_u2(now));
    ctx.reports.set_should_fail(true);

    let summary = ctx.job().run_at(now).await.unwrap();

    assert_eq!(summary.status(), RunStatus::Completed);
    assert_eq!(summary.exit_code(), 0);
    assert!(!summary.report_delivery.is_complete());
    assert_eq!(summary.report_delivery.failures[0].error_code(), "ARCH_005");
    assert_eq!(ctx.active.user_record_count("u1"), 0);
    assert_eq!(ctx.reports.write_count(), 1);
}

#[tokio::test]
async fn test_group_outside_cutoffs_is_never_evicted() {
    let now = fixtures::pinned_now();
    let ctx = PipelineContext::new(fixtures::u1_u2(now));
    ctx.active.inject_aggregate(EntityAggregate {
        user_id: "u2".into(),
        last_event: now - Duration::days(1),
        earliest_registration: now - Duration::days(5),
        latest_registration: now - Duration::days(5),
        record_count: 2,
    });

    let summary = ctx.job().run_at(now).await.unwrap();

    assert_eq!(summary.report.archived_user_ids, Some(vec!["u1".to_string()]));
    assert_eq!(ctx.active.records(), fixtures::fresh_user(now));
}
