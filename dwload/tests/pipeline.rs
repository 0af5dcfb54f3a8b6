#![cfg(feature = "test-utils")]

use chrono::{Duration, NaiveDate};
use config::shared::{InsertFallback, SyncConfig};
use dwload::catalog::{
    ACHIEVEMENT_EXTRACT, CODER, CODER_EXTRACT, CODER_IMAGE_EXTRACT, CODER_IMAGE_XREF,
    CODER_SKILL_EXTRACT, CODER_SKILL_XREF, COUNTRY_EXTRACT, IMAGE, IMAGE_EXTRACT, SKILL,
    SKILL_EXTRACT, SKILL_TYPE_EXTRACT, STATE, STATE_EXTRACT, TEAM, TEAM_CODER_EXTRACT,
    TEAM_CODER_XREF, TEAM_EXTRACT, USER_ACHIEVEMENT,
};
use dwload::error::{ErrorKind, LoadResult};
use dwload::loaders::{EntitySpec, LoadStrategy, load_entity};
use dwload::pipeline::{RunReport, SyncRun};
use dwload::plan::{LoadPlan, LoadStep};
use dwload::row;
use dwload::store::ChangeFilter;
use dwload::test_utils::fixtures::{self, instant};
use dwload::test_utils::memory_cache::MemoryCache;
use dwload::test_utils::memory_source::MemorySource;
use dwload::test_utils::memory_target::MemoryTarget;
use telemetry::tracing::init_test_tracing;

const CATEGORY: i32 = 2;

async fn run(
    source: &MemorySource,
    target: &MemoryTarget,
    cache: Option<&MemoryCache>,
    config: &SyncConfig,
) -> LoadResult<RunReport> {
    SyncRun::new(source, target, cache, config).execute().await
}

async fn target_at_new_year() -> MemoryTarget {
    MemoryTarget::with_watermark(CATEGORY, instant(2024, 1, 1)).await
}

#[tokio::test(flavor = "multi_thread")]
async fn run_without_watermark_fails_before_loading() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&STATE_EXTRACT, instant(2024, 2, 1), fixtures::state("CT", "Connecticut"))
        .await;
    let target = MemoryTarget::new();

    let err = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WatermarkMissing);
    assert_eq!(target.mutations().await, 0);
    assert!(target.watermarks(CATEGORY).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn watermark_of_another_category_is_ignored() {
    init_test_tracing();

    let source = MemorySource::new();
    let target = MemoryTarget::with_watermark(7, instant(2024, 1, 1)).await;

    let err = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::WatermarkMissing);
}

#[tokio::test(flavor = "multi_thread")]
async fn full_run_converges_every_entity_and_commits_run_start() {
    init_test_tracing();

    let changed = instant(2024, 2, 1);
    let source = MemorySource::new();
    source.add_row(&STATE_EXTRACT, changed, fixtures::state("CT", "Connecticut")).await;
    source.add_row(&COUNTRY_EXTRACT, changed, fixtures::country("840", "United States")).await;
    source.add_row(&CODER_EXTRACT, changed, fixtures::coder(7, "tourist")).await;
    source.add_row(&CODER_EXTRACT, changed, fixtures::coder(42, "petr")).await;
    source.add_row(&SKILL_TYPE_EXTRACT, changed, fixtures::skill_type(1, "Languages")).await;
    source.add_row(&SKILL_EXTRACT, changed, fixtures::skill(14, 1, "Rust")).await;
    source.add_row(&CODER_SKILL_EXTRACT, changed, fixtures::coder_skill(7, 14, 5)).await;
    source.add_row(&IMAGE_EXTRACT, changed, fixtures::image(500, 1, 3)).await;
    source.add_row(&CODER_IMAGE_EXTRACT, changed, fixtures::coder_image(7, 500, 1)).await;
    source
        .add_row(
            &ACHIEVEMENT_EXTRACT,
            changed,
            fixtures::achievement(42, NaiveDate::from_ymd_opt(2024, 1, 20).unwrap(), 3),
        )
        .await;
    source.add_row(&TEAM_EXTRACT, changed, fixtures::team(90, "Hartford High", 4, 11)).await;
    source.add_row(&TEAM_CODER_EXTRACT, changed, fixtures::team_coder(90, 42)).await;

    let target = target_at_new_year().await;
    let cache = MemoryCache::new(["coder:7:profile", "coder:99:profile", "coder:42:skills"]);

    let report = run(&source, &target, Some(&cache), &SyncConfig::default())
        .await
        .unwrap();

    assert_eq!(report.watermark, instant(2024, 1, 1));
    assert_eq!(report.steps.len(), LoadStep::ALL.len());
    assert_eq!(report.rows(), 12);
    assert_eq!(report.touched.iter().collect::<Vec<_>>(), vec![7, 42]);
    assert_eq!(report.invalidated, Some(2));

    assert_eq!(target.rows(&CODER).await.len(), 2);
    assert_eq!(target.rows(&SKILL).await, vec![fixtures::skill(14, 1, "Rust")]);
    assert_eq!(target.rows(&CODER_SKILL_XREF).await.len(), 1);
    assert_eq!(target.rows(&CODER_IMAGE_XREF).await.len(), 1);
    assert_eq!(target.rows(&USER_ACHIEVEMENT).await.len(), 1);
    assert_eq!(target.rows(&TEAM_CODER_XREF).await, vec![fixtures::team_coder(90, 42)]);

    assert_eq!(cache.keys().await, vec!["coder:99:profile".to_string()]);
    assert_eq!(
        target.watermarks(CATEGORY).await,
        vec![instant(2024, 1, 1), report.started_at]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rows_changed_before_the_watermark_are_skipped() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&STATE_EXTRACT, instant(2023, 12, 31), fixtures::state("CT", "Connecticut"))
        .await;
    source
        .add_row(&STATE_EXTRACT, instant(2024, 1, 1), fixtures::state("NY", "New York"))
        .await;
    let target = target_at_new_year().await;

    let report = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap();

    assert_eq!(report.rows(), 0);
    assert!(target.rows(&STATE).await.is_empty());
    assert_eq!(report.invalidated, None);
}

#[tokio::test(flavor = "multi_thread")]
async fn excluded_group_members_are_not_extracted() {
    init_test_tracing();

    let changed = instant(2024, 2, 1);
    let source = MemorySource::new();
    source.add_row(&CODER_EXTRACT, changed, fixtures::coder(7, "tourist")).await;
    source.add_row(&CODER_EXTRACT, changed, fixtures::coder(13013, "admin")).await;
    source.add_row(&CODER_EXTRACT, changed, fixtures::coder(14014, "tester")).await;
    source.add_row(&CODER_SKILL_EXTRACT, changed, fixtures::coder_skill(14014, 14, 1)).await;
    source.add_group_member(13013, 13).await;
    source.add_group_member(14014, 14).await;
    source.add_group_member(7, 20).await;

    let target = target_at_new_year().await;
    let cache = MemoryCache::new(["coder:13013:profile", "coder:7:profile"]);

    let report = run(&source, &target, Some(&cache), &SyncConfig::default())
        .await
        .unwrap();

    assert_eq!(target.rows(&CODER).await, vec![fixtures::coder(7, "tourist")]);
    assert!(target.rows(&CODER_SKILL_XREF).await.is_empty());
    assert_eq!(report.touched.iter().collect::<Vec<_>>(), vec![7]);
    assert_eq!(cache.keys().await, vec!["coder:13013:profile".to_string()]);
}

#[tokio::test(flavor = "multi_thread")]
async fn only_configured_image_and_team_types_are_loaded() {
    init_test_tracing();

    let changed = instant(2024, 2, 1);
    let source = MemorySource::new();
    source.add_row(&IMAGE_EXTRACT, changed, fixtures::image(500, 1, 3)).await;
    source.add_row(&IMAGE_EXTRACT, changed, fixtures::image(501, 2, 3)).await;
    source.add_row(&TEAM_EXTRACT, changed, fixtures::team(90, "Hartford High", 4, 11)).await;
    source.add_row(&TEAM_EXTRACT, changed, fixtures::team(91, "Open Team", 1, 11)).await;
    let target = target_at_new_year().await;

    run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap();

    assert_eq!(target.rows(&IMAGE).await, vec![fixtures::image(500, 1, 3)]);
    assert_eq!(
        target.rows(&TEAM).await,
        vec![fixtures::team(90, "Hartford High", 4, 11)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn reloading_an_unchanged_window_mutates_nothing() {
    init_test_tracing();

    let changed = instant(2024, 2, 1);
    let source = MemorySource::new();
    source.add_row(&STATE_EXTRACT, changed, fixtures::state("CT", "Connecticut")).await;
    source.add_row(&STATE_EXTRACT, changed, fixtures::state("NY", "New York")).await;
    source.add_row(&CODER_EXTRACT, changed, fixtures::coder(7, "tourist")).await;
    let target = MemoryTarget::new();
    let filter = ChangeFilter::new(instant(2024, 1, 1), &SyncConfig::default());

    let specs = [
        EntitySpec {
            extract: &STATE_EXTRACT,
            strategy: LoadStrategy::InsertOrUpdate,
            touches: None,
        },
        EntitySpec {
            extract: &CODER_EXTRACT,
            strategy: LoadStrategy::ProbeThenWrite,
            touches: Some("coder_id"),
        },
    ];

    for spec in &specs {
        load_entity(&source, &target, spec, &filter, InsertFallback::KeyConflict)
            .await
            .unwrap();
    }
    let converged = target.mutations().await;
    assert_eq!(converged, 3);

    for spec in &specs {
        let outcome = load_entity(&source, &target, spec, &filter, InsertFallback::KeyConflict)
            .await
            .unwrap();
        assert!(outcome.rows > 0);
    }
    assert_eq!(target.mutations().await, converged);
    assert_eq!(target.rows(&STATE).await.len(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn changed_rows_are_updated_in_place() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&STATE_EXTRACT, instant(2024, 2, 1), fixtures::state("CT", "Conn."))
        .await;
    source
        .add_row(&CODER_EXTRACT, instant(2024, 2, 1), fixtures::coder(7, "tourist"))
        .await;
    let target = target_at_new_year().await;

    let first = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap();

    let later = first.started_at + Duration::seconds(1);
    source.clear_rows(&STATE_EXTRACT).await;
    source.clear_rows(&CODER_EXTRACT).await;
    source
        .add_row(&STATE_EXTRACT, later, fixtures::state("CT", "Connecticut"))
        .await;
    source
        .add_row(&CODER_EXTRACT, later, fixtures::coder(7, "tourist2"))
        .await;

    let second = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap();

    assert_eq!(second.watermark, first.started_at);
    assert_eq!(target.rows(&STATE).await, vec![fixtures::state("CT", "Connecticut")]);
    assert_eq!(target.rows(&CODER).await, vec![fixtures::coder(7, "tourist2")]);
}

#[tokio::test(flavor = "multi_thread")]
async fn duplicate_target_keys_raise_row_count_mismatch() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&STATE_EXTRACT, instant(2024, 2, 1), fixtures::state("CT", "Connecticut"))
        .await;
    let target = target_at_new_year().await;
    target.seed_row(&STATE, fixtures::state("CT", "Conn.")).await;
    target.seed_row(&STATE, fixtures::state("CT", "Connecticut")).await;

    let err = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RowCountMismatch);
    assert_eq!(err.entity(), Some("state"));
    assert_eq!(target.watermarks(CATEGORY).await, vec![instant(2024, 1, 1)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn probed_duplicates_raise_row_count_mismatch() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&CODER_EXTRACT, instant(2024, 2, 1), fixtures::coder(7, "tourist"))
        .await;
    let target = target_at_new_year().await;
    target.seed_row(&CODER, fixtures::coder(7, "old")).await;
    target.seed_row(&CODER, fixtures::coder(7, "older")).await;

    let err = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RowCountMismatch);
    assert_eq!(err.entity(), Some("coder"));
}

#[tokio::test(flavor = "multi_thread")]
async fn insert_failure_handling_follows_the_fallback_mode() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&STATE_EXTRACT, instant(2024, 2, 1), fixtures::state("CT", "Connecticut"))
        .await;
    let target = target_at_new_year().await;
    target.fail_inserts(&STATE).await;

    // Only key conflicts fall back: the failure surfaces as is.
    let err = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetQueryFailed);
    assert_eq!(err.entity(), Some("state"));

    // Any failure falls back: the update matches no row.
    let legacy = SyncConfig {
        insert_fallback: InsertFallback::AnyError,
        ..SyncConfig::default()
    };
    let err = run(&source, &target, None, &legacy).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RowCountMismatch);

    assert_eq!(target.watermarks(CATEGORY).await, vec![instant(2024, 1, 1)]);
    assert_eq!(target.mutations().await, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_step_leaves_watermark_and_cache_untouched() {
    init_test_tracing();

    let changed = instant(2024, 2, 1);
    let source = MemorySource::new();
    source.add_row(&CODER_EXTRACT, changed, fixtures::coder(7, "tourist")).await;
    source.fail_extract(&TEAM_EXTRACT).await;
    let target = target_at_new_year().await;
    let cache = MemoryCache::new(["coder:7:profile"]);

    let err = run(&source, &target, Some(&cache), &SyncConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::SourceQueryFailed);
    assert_eq!(err.entity(), Some("team"));
    assert!(err.to_string().contains("(entity: team)"));
    assert_eq!(target.watermarks(CATEGORY).await, vec![instant(2024, 1, 1)]);
    assert_eq!(cache.keys().await, vec!["coder:7:profile".to_string()]);
    // Earlier steps are not rolled back.
    assert_eq!(target.rows(&CODER).await.len(), 1);

    // The next run reprocesses the same window.
    let source_retry = MemorySource::new();
    source_retry
        .add_row(&CODER_EXTRACT, changed, fixtures::coder(7, "tourist"))
        .await;
    let report = run(&source_retry, &target, Some(&cache), &SyncConfig::default())
        .await
        .unwrap();
    assert_eq!(report.watermark, instant(2024, 1, 1));
    assert_eq!(report.invalidated, Some(1));
}

#[tokio::test(flavor = "multi_thread")]
async fn cache_failure_aborts_before_commit() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&CODER_EXTRACT, instant(2024, 2, 1), fixtures::coder(7, "tourist"))
        .await;
    let target = target_at_new_year().await;
    let cache = MemoryCache::new(["coder:7:profile"]);
    cache.fail().await;

    let err = run(&source, &target, Some(&cache), &SyncConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::CacheError);
    assert_eq!(err.entity(), Some("cache"));
    assert_eq!(target.watermarks(CATEGORY).await, vec![instant(2024, 1, 1)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn team_membership_is_replaced_per_coder() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&TEAM_CODER_EXTRACT, instant(2024, 2, 1), fixtures::team_coder(91, 42))
        .await;
    let target = target_at_new_year().await;
    target.seed_row(&TEAM_CODER_XREF, fixtures::team_coder(90, 42)).await;
    target.seed_row(&TEAM_CODER_XREF, fixtures::team_coder(90, 7)).await;

    let plan = LoadPlan::resolve(&[LoadStep::TeamCoderXref, LoadStep::Team, LoadStep::Coder,
        LoadStep::School, LoadStep::State, LoadStep::Country])
    .unwrap();
    SyncRun::new(&source, &target, None::<&MemoryCache>, &SyncConfig::default())
        .with_plan(plan)
        .execute()
        .await
        .unwrap();

    assert_eq!(
        target.rows(&TEAM_CODER_XREF).await,
        vec![fixtures::team_coder(90, 7), fixtures::team_coder(91, 42)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn skill_links_are_replaced_by_full_key() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&CODER_SKILL_EXTRACT, instant(2024, 2, 1), fixtures::coder_skill(7, 14, 9))
        .await;
    let target = target_at_new_year().await;
    target.seed_row(&CODER_SKILL_XREF, fixtures::coder_skill(7, 14, 2)).await;
    target.seed_row(&CODER_SKILL_XREF, fixtures::coder_skill(7, 15, 4)).await;

    run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap();

    assert_eq!(
        target.rows(&CODER_SKILL_XREF).await,
        vec![fixtures::coder_skill(7, 15, 4), fixtures::coder_skill(7, 14, 9)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn malformed_source_rows_are_rejected_before_writing() {
    init_test_tracing();

    let source = MemorySource::new();
    source
        .add_row(&STATE_EXTRACT, instant(2024, 2, 1), row!["CT", 12_i32, "NE"])
        .await;
    let target = target_at_new_year().await;

    let err = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConversionError);
    assert_eq!(err.entity(), Some("state"));
    assert!(target.rows(&STATE).await.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn rerun_after_target_outage_converges() {
    init_test_tracing();

    let changed = instant(2024, 2, 1);
    let source = MemorySource::new();
    source.add_row(&STATE_EXTRACT, changed, fixtures::state("CT", "Connecticut")).await;
    source.add_row(&CODER_EXTRACT, changed, fixtures::coder(7, "tourist")).await;
    let target = target_at_new_year().await;
    target.fail_writes(&CODER).await;

    let err = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TargetQueryFailed);
    assert_eq!(err.entity(), Some("coder"));
    assert_eq!(target.rows(&STATE).await.len(), 1);

    target.heal(&CODER).await;
    let report = run(&source, &target, None, &SyncConfig::default())
        .await
        .unwrap();

    assert_eq!(report.watermark, instant(2024, 1, 1));
    assert_eq!(target.rows(&STATE).await.len(), 1);
    assert_eq!(target.rows(&CODER).await, vec![fixtures::coder(7, "tourist")]);
}
