//! End-to-end load pipeline tests: HTTP release source, loader, scheduler.
//!
//! Run with: `cargo test -p gridiron-tests --test pipeline_tests`

use gridiron_core::{Dataset, Error, LoadRequest, LoadStrategy, Seasons, TableRef, Value};
use gridiron_db::MemoryWarehouse;
use gridiron_loader::{CommandJob, IncrementalLoader, LoadScheduler, RetryPolicy, ScheduleConfig};
use gridiron_source::{HttpSourceReader, SourceConfig};
use gridiron_tests::{PlayerStatsFixture, to_csv, wait_for};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const WEEKLY_2024: &str = "/stats_player/stats_player_week_2024.csv";

fn target() -> TableRef {
    TableRef::new("raw_nfl", "player_stats").unwrap()
}

fn request() -> LoadRequest {
    LoadRequest::new(Dataset::PlayerStats, Seasons::new([2024]))
}

async fn serve(server: &MockServer, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(WEEKLY_2024))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

fn loader(server: &MockServer, warehouse: &MemoryWarehouse) -> IncrementalLoader {
    let source = HttpSourceReader::new(SourceConfig::new(server.uri())).unwrap();
    IncrementalLoader::new(Arc::new(source), Arc::new(warehouse.clone()), "raw_nfl")
        .with_retry(RetryPolicy::new(3, Duration::ZERO, 1.0))
}

#[tokio::test]
async fn test_first_load_creates_then_rerun_replaces_season() {
    gridiron_tests::init_test_logging();
    let server = MockServer::start().await;
    let warehouse = MemoryWarehouse::new();
    let loader = loader(&server, &warehouse);

    serve(&server, 200, to_csv(&PlayerStatsFixture::weekly(2024, 1..=2, &["00-01", "00-02"], 200))).await;
    let created = loader.run(&request()).await.unwrap();
    assert_eq!(created.strategy, Some(LoadStrategy::Created));
    assert_eq!(created.rows_loaded, 4);

    server.reset().await;
    serve(&server, 200, to_csv(&PlayerStatsFixture::weekly(2024, 1..=3, &["00-01", "00-02"], 300))).await;
    let replaced = loader.run(&request()).await.unwrap();
    assert_eq!(replaced.strategy, Some(LoadStrategy::Replaced));
    assert_eq!(replaced.rows_loaded, 6);

    let table = warehouse.table(&target()).unwrap();
    assert_eq!(table.len(), 6);
    assert!(table.column("passing_yards").unwrap().all(|v| v.as_i64() > Some(300)));
}

#[tokio::test]
async fn test_transient_source_error_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(WEEKLY_2024))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    serve(&server, 200, to_csv(&PlayerStatsFixture::row("00-01", 2024, 1, 250))).await;
    let warehouse = MemoryWarehouse::new();

    let outcome = loader(&server, &warehouse).run(&request()).await.unwrap();

    assert_eq!(outcome.attempts, 2);
    assert_eq!(outcome.rows_loaded, 1);
}

#[tokio::test]
async fn test_missing_release_is_not_retried() {
    let server = MockServer::start().await;
    serve(&server, 404, String::new()).await;
    let warehouse = MemoryWarehouse::new();

    let err = loader(&server, &warehouse).run(&request()).await.unwrap_err();

    assert!(err.is_data_error());
    assert_eq!(server.received_requests().await.map(|r| r.len()), Some(1));
    assert!(warehouse.table(&target()).is_none());
}

#[tokio::test]
async fn test_quality_failure_blocks_downstream() {
    let server = MockServer::start().await;
    serve(
        &server,
        200,
        "player_id,player_name,position,season,week,passing_yards\n,Unknown,QB,2024,1,10\n".to_string(),
    )
    .await;
    let warehouse = MemoryWarehouse::new();
    let marker = std::env::temp_dir().join(format!("gridiron-downstream-{}", std::process::id()));
    let _ = std::fs::remove_file(&marker);

    let config = ScheduleConfig {
        jobs: vec![request()],
        downstream: vec![],
        ..Default::default()
    };
    let job = CommandJob::new("dbt_run", format!("touch {}", marker.display()));
    let scheduler = LoadScheduler::new(Arc::new(loader(&server, &warehouse)), &config)
        .unwrap()
        .with_downstream(vec![Arc::new(job)]);

    let err = scheduler.run_once().await.unwrap_err();

    assert!(matches!(err, Error::QualityCheckFailed { .. }));
    assert!(!marker.exists());
    assert_eq!(warehouse.table(&target()).map(|t| t.len()), Some(1));
}

#[tokio::test]
async fn test_scheduler_runs_on_cron_until_shutdown() {
    let server = MockServer::start().await;
    serve(&server, 200, to_csv(&PlayerStatsFixture::row("00-01", 2024, 1, 250))).await;
    let warehouse = MemoryWarehouse::new();
    let config = ScheduleConfig {
        cron: "* * * * * *".to_string(),
        jobs: vec![request()],
        downstream: vec![],
        ..Default::default()
    };
    let scheduler = Arc::new(LoadScheduler::new(Arc::new(loader(&server, &warehouse)), &config).unwrap());

    let (stop, stopped) = tokio::sync::oneshot::channel::<()>();
    let handle = tokio::spawn({
        let scheduler = Arc::clone(&scheduler);
        async move {
            scheduler
                .run(async {
                    let _ = stopped.await;
                })
                .await
        }
    });

    let loaded = wait_for(Duration::from_secs(5), Duration::from_millis(50), || {
        let warehouse = warehouse.clone();
        async move { warehouse.table(&target()).is_some() }
    })
    .await;
    assert!(loaded);

    let _ = stop.send(());
    tokio::time::timeout(Duration::from_secs(5), handle).await.unwrap().unwrap();

    let table = warehouse.table(&target()).unwrap();
    assert_eq!(table.get(0, "player_id"), Some(&Value::from("00-01")));
}
