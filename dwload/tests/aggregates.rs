#![cfg(feature = "test-utils")]

use chrono::{DateTime, Duration, Utc};
use config::shared::SyncConfig;
use dwload::catalog::{ALGO_RATING, RATING_EXTRACT, SEASON_ALGO_RATING, SEASON_RATING_EXTRACT};
use dwload::error::ErrorKind;
use dwload::loaders::load_season_ratings;
use dwload::pipeline::{RunReport, SyncRun};
use dwload::row;
use dwload::rounds::RoundStartResolver;
use dwload::store::ChangeFilter;
use dwload::test_utils::fixtures::{self, instant};
use dwload::test_utils::memory_cache::MemoryCache;
use dwload::test_utils::memory_source::MemorySource;
use dwload::test_utils::memory_target::MemoryTarget;
use dwload::types::TableRow;
use telemetry::tracing::init_test_tracing;

const CATEGORY: i32 = 2;
const CODING_SEGMENT: i32 = 2;

async fn run(source: &MemorySource, target: &MemoryTarget, config: &SyncConfig) -> RunReport {
    SyncRun::new(source, target, None::<&MemoryCache>, config)
        .execute()
        .await
        .unwrap()
}

/// Replaces the season rating extract with a single observation modified after `after`.
async fn observe_season(source: &MemorySource, after: DateTime<Utc>, row: TableRow) {
    source.clear_rows(&SEASON_RATING_EXTRACT).await;
    source
        .add_row(&SEASON_RATING_EXTRACT, after + Duration::seconds(1), row)
        .await;
}

fn season_row(
    rating: i32,
    num_competitions: i64,
    highest: i32,
    lowest: i32,
    first: Option<i64>,
    last: Option<i64>,
) -> TableRow {
    row![7_i64, 5_i32, rating, 320_i32, 4_i32, num_competitions, highest, lowest, first, last]
}

#[tokio::test(flavor = "multi_thread")]
async fn season_envelope_follows_round_chronology() {
    init_test_tracing();

    let source = MemorySource::new();
    source.set_round_start(100, CODING_SEGMENT, instant(2024, 1, 1)).await;
    source.set_round_start(101, CODING_SEGMENT, instant(2024, 2, 1)).await;
    source.set_attendance(7, 5, 2).await;
    let target = MemoryTarget::with_watermark(CATEGORY, instant(2023, 12, 1)).await;
    let config = SyncConfig::default();

    observe_season(&source, instant(2023, 12, 1), fixtures::season_rating(7, 5, 100, 1500)).await;
    let first = run(&source, &target, &config).await;
    assert_eq!(
        target.rows(&SEASON_ALGO_RATING).await,
        vec![season_row(1500, 2, 1500, 1500, Some(100), Some(100))]
    );

    observe_season(&source, first.started_at, fixtures::season_rating(7, 5, 101, 1400)).await;
    run(&source, &target, &config).await;

    assert_eq!(
        target.rows(&SEASON_ALGO_RATING).await,
        vec![season_row(1400, 2, 1500, 1400, Some(100), Some(101))]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn late_arriving_earlier_round_becomes_first() {
    init_test_tracing();

    let source = MemorySource::new();
    // Round ids do not follow chronology: round 205 ran before round 101.
    source.set_round_start(101, CODING_SEGMENT, instant(2024, 2, 1)).await;
    source.set_round_start(205, CODING_SEGMENT, instant(2024, 1, 1)).await;
    source.set_attendance(7, 5, 2).await;
    let target = MemoryTarget::with_watermark(CATEGORY, instant(2023, 12, 1)).await;
    let config = SyncConfig::default();

    observe_season(&source, instant(2023, 12, 1), fixtures::season_rating(7, 5, 101, 1400)).await;
    let first = run(&source, &target, &config).await;

    observe_season(&source, first.started_at, fixtures::season_rating(7, 5, 205, 1500)).await;
    run(&source, &target, &config).await;

    assert_eq!(
        target.rows(&SEASON_ALGO_RATING).await,
        vec![season_row(1500, 2, 1500, 1400, Some(205), Some(101))]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn season_envelope_is_independent_of_load_order() {
    init_test_tracing();

    let observations = [(100_i64, 1500_i32), (101, 1400), (102, 1720)];
    let orders: [[usize; 3]; 6] = [
        [0, 1, 2],
        [0, 2, 1],
        [1, 0, 2],
        [1, 2, 0],
        [2, 0, 1],
        [2, 1, 0],
    ];
    let config = SyncConfig::default();

    for order in orders {
        let source = MemorySource::new();
        source.set_round_start(100, CODING_SEGMENT, instant(2024, 1, 1)).await;
        source.set_round_start(101, CODING_SEGMENT, instant(2024, 2, 1)).await;
        source.set_round_start(102, CODING_SEGMENT, instant(2024, 3, 1)).await;
        source.set_attendance(7, 5, 3).await;
        let target = MemoryTarget::new();

        let mut since = instant(2024, 4, 1);
        for index in order {
            let (round_id, rating) = observations[index];
            observe_season(&source, since, fixtures::season_rating(7, 5, round_id, rating)).await;

            let filter = ChangeFilter::new(since, &config);
            let mut resolver = RoundStartResolver::new(&source, CODING_SEGMENT);
            let loaded = load_season_ratings(&source, &target, &mut resolver, &filter)
                .await
                .unwrap();
            assert_eq!(loaded, 1);

            since += Duration::seconds(1);
        }

        let last_rating = observations[order[2]].1;
        assert_eq!(
            target.rows(&SEASON_ALGO_RATING).await,
            vec![season_row(last_rating, 3, 1720, 1400, Some(100), Some(102))],
            "order {order:?}"
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_round_aborts_the_run() {
    init_test_tracing();

    let source = MemorySource::new();
    source.add_row(&SEASON_RATING_EXTRACT, instant(2024, 2, 1), fixtures::season_rating(7, 5, 300, 1500)).await;
    let target = MemoryTarget::with_watermark(CATEGORY, instant(2024, 1, 1)).await;

    let err = SyncRun::new(&source, &target, None::<&MemoryCache>, &SyncConfig::default())
        .execute()
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RoundNotFound);
    assert_eq!(err.entity(), Some("season_rating"));
    assert!(target.rows(&SEASON_ALGO_RATING).await.is_empty());
    assert_eq!(target.watermarks(CATEGORY).await, vec![instant(2024, 1, 1)]);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_observation_needs_a_coding_segment_round() {
    init_test_tracing();

    let source = MemorySource::new();
    // Round 300 exists, but only with a non-coding segment.
    source.set_round_start(300, 1, instant(2024, 1, 1)).await;
    source.set_attendance(7, 5, 1).await;
    source.add_row(&SEASON_RATING_EXTRACT, instant(2024, 2, 1), fixtures::season_rating(7, 5, 300, 1500)).await;
    let target = MemoryTarget::new();

    let filter = ChangeFilter::new(instant(2024, 1, 1), &SyncConfig::default());
    let mut resolver = RoundStartResolver::new(&source, CODING_SEGMENT);
    let err = load_season_ratings(&source, &target, &mut resolver, &filter)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RoundNotFound);
    assert!(target.rows(&SEASON_ALGO_RATING).await.is_empty());
    assert_eq!(source.round_lookups().await, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn unknown_stored_round_aborts_the_fold() {
    init_test_tracing();

    let source = MemorySource::new();
    source.set_round_start(101, CODING_SEGMENT, instant(2024, 2, 1)).await;
    source.add_row(&SEASON_RATING_EXTRACT, instant(2024, 2, 1), fixtures::season_rating(7, 5, 101, 1400)).await;
    let target = MemoryTarget::new();
    let stored = season_row(1500, 1, 1500, 1500, Some(77), Some(77));
    target.seed_row(&SEASON_ALGO_RATING, stored.clone()).await;

    let filter = ChangeFilter::new(instant(2024, 1, 1), &SyncConfig::default());
    let mut resolver = RoundStartResolver::new(&source, CODING_SEGMENT);
    let err = load_season_ratings(&source, &target, &mut resolver, &filter)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::RoundNotFound);
    assert_eq!(target.rows(&SEASON_ALGO_RATING).await, vec![stored]);
}

#[tokio::test(flavor = "multi_thread")]
async fn round_starts_are_looked_up_once_per_run() {
    init_test_tracing();

    let source = MemorySource::new();
    source.set_round_start(100, CODING_SEGMENT, instant(2024, 1, 1)).await;
    source.set_round_start(101, CODING_SEGMENT, instant(2024, 2, 1)).await;
    for coder_id in [7, 8, 9] {
        source
            .add_row(&SEASON_RATING_EXTRACT, instant(2024, 2, 1), fixtures::season_rating(coder_id, 5, 100, 1500))
            .await;
    }

    let target = MemoryTarget::new();
    let config = SyncConfig::default();
    let filter = ChangeFilter::new(instant(2024, 1, 1), &config);

    let mut resolver = RoundStartResolver::new(&source, CODING_SEGMENT);
    let loaded = load_season_ratings(&source, &target, &mut resolver, &filter)
        .await
        .unwrap();
    assert_eq!(loaded, 3);
    assert_eq!(resolver.resolved(), 1);
    assert_eq!(source.round_lookups().await, 1);

    // A later run resolves the new round and the stored one again, each once.
    source.clear_rows(&SEASON_RATING_EXTRACT).await;
    for coder_id in [7, 8] {
        source
            .add_row(&SEASON_RATING_EXTRACT, instant(2024, 3, 1), fixtures::season_rating(coder_id, 5, 101, 1600))
            .await;
    }
    let filter = ChangeFilter::new(instant(2024, 2, 15), &config);
    let mut resolver = RoundStartResolver::new(&source, CODING_SEGMENT);
    load_season_ratings(&source, &target, &mut resolver, &filter)
        .await
        .unwrap();

    assert_eq!(resolver.resolved(), 2);
    assert_eq!(source.round_lookups().await, 3);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_overall_rating_seeds_the_aggregate() {
    init_test_tracing();

    let source = MemorySource::new();
    source.add_row(&RATING_EXTRACT, instant(2024, 2, 1), fixtures::rating(7, 1, 1650, 12)).await;
    let target = MemoryTarget::with_watermark(CATEGORY, instant(2024, 1, 1)).await;

    let report = run(&source, &target, &SyncConfig::default()).await;

    assert_eq!(report.rows(), 1);
    assert_eq!(
        target.rows(&ALGO_RATING).await,
        vec![seeded_aggregate(7, 1, 1650, 12)]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn overall_rating_carries_history_forward() {
    init_test_tracing();

    let source = MemorySource::new();
    source.add_row(&RATING_EXTRACT, instant(2024, 2, 1), fixtures::rating(7, 1, 1900, 13)).await;
    let target = MemoryTarget::with_watermark(CATEGORY, instant(2024, 1, 1)).await;
    target
        .seed_row(
            &ALGO_RATING,
            row![7_i64, 1600_i32, 12_i32, 340_i32, 1800_i32, 1200_i32, Some(10_i64), Some(90_i64), 25_i32, 1_i32],
        )
        .await;

    run(&source, &target, &SyncConfig::default()).await;

    // The envelope is kept as stored even when the new rating lies outside it.
    assert_eq!(
        target.rows(&ALGO_RATING).await,
        vec![row![
            7_i64, 1900_i32, 13_i32, 350_i32, 1800_i32, 1200_i32,
            Some(10_i64), Some(90_i64), 25_i32, 1_i32
        ]]
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn rating_types_and_groups_are_filtered() {
    init_test_tracing();

    let changed = instant(2024, 2, 1);
    let source = MemorySource::new();
    source.add_row(&RATING_EXTRACT, changed, fixtures::rating(7, 1, 1650, 12)).await;
    source.add_row(&RATING_EXTRACT, changed, fixtures::rating(7, 3, 1200, 2)).await;
    source.add_row(&RATING_EXTRACT, changed, fixtures::rating(13013, 1, 3000, 40)).await;
    source.add_group_member(13013, 13).await;
    let target = MemoryTarget::with_watermark(CATEGORY, instant(2024, 1, 1)).await;
    let config = SyncConfig {
        rating_type_ids: vec![1],
        ..SyncConfig::default()
    };

    run(&source, &target, &config).await;

    let rows = target.rows(&ALGO_RATING).await;
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0], seeded_aggregate(7, 1, 1650, 12));
}

/// Aggregate written for a coder with no previous overall rating.
fn seeded_aggregate(coder_id: i64, rating_type_id: i32, rating: i32, num_ratings: i32) -> TableRow {
    row![
        coder_id, rating, num_ratings, 350_i32, rating, rating,
        None::<i64>, None::<i64>, 0_i32, rating_type_id
    ]
}
