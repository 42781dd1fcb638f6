//! End-to-end test: the chain worker drives a staged inspection from the
//! initial advance signal all the way to a persisted report.

mod common;

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, Instant};

use common::builders::ItemBuilder;
use common::harness::{CannedAnalyzer, INSPECTION, NOW};

use vinspect::analysis::Analyzer;
use vinspect::db::inspection_repo::{self, InspectionRow, InspectionStatus};
use vinspect::db::job_repo::JobStatus;
use vinspect::db::{item_repo, job_repo, Database};
use vinspect::evidence::ItemCategory;
use vinspect::pipeline::PipelineConfig;
use vinspect::worker::{start_inspection, ChainWorker};

async fn wait_for_terminal(db: &Database) -> InspectionRow {
    let deadline = Instant::now() + Duration::from_secs(5);
    loop {
        let inspection = inspection_repo::find_by_id(db, INSPECTION)
            .unwrap()
            .expect("inspection missing");
        if inspection.status.is_terminal() {
            return inspection;
        }
        assert!(
            Instant::now() < deadline,
            "inspection did not reach a terminal state in time"
        );
        sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test]
async fn test_worker_drives_inspection_to_completion() {
    let db = Database::open_in_memory().unwrap();
    inspection_repo::insert(
        &db,
        &InspectionRow::new(INSPECTION, "WVWZZZ3CZWE689725", 87000, "60601", NOW),
    )
    .unwrap();
    for item in [
        ItemBuilder::new(ItemCategory::Exterior).megabytes(6).build(),
        ItemBuilder::new(ItemCategory::Interior).megabytes(6).build(),
        ItemBuilder::new(ItemCategory::Obd)
            .obd("P0420", "Catalyst below threshold")
            .megabytes(1)
            .build(),
    ] {
        item_repo::insert(&db, INSPECTION, &item, NOW).unwrap();
    }

    let analyzer = Arc::new(CannedAnalyzer::new());
    let config = Arc::new(PipelineConfig::default());
    let (worker, handle) = ChainWorker::new(
        db.clone(),
        Arc::clone(&analyzer) as Arc<dyn Analyzer>,
        Arc::clone(&config),
    );
    let worker_task = tokio::spawn(worker.run());

    // 13MB over a 10MB budget -> 2 chunks, plus 3 stages.
    let queued = start_inspection(&db, &config, &handle, INSPECTION).unwrap();
    assert_eq!(queued, 5);

    let inspection = wait_for_terminal(&db).await;
    assert_eq!(inspection.status, InspectionStatus::Done);
    assert!(inspection.current_phase.is_none());

    let report = inspection.report.unwrap();
    assert_eq!(report["chunks"]["total"], 2);
    assert_eq!(report["chunks"]["completed"], 2);
    assert!(report["analysis"]["summary"].is_string());
    assert_eq!(report["expert_advice"]["verdict"], "buy_with_caution");

    let jobs = job_repo::list_by_inspection(&db, INSPECTION).unwrap();
    assert_eq!(jobs.len(), 5);
    assert!(jobs.iter().all(|j| j.status == JobStatus::Completed));
    assert_eq!(analyzer.call_count(), 5);

    handle.shutdown();
    worker_task.await.unwrap();
}

#[tokio::test]
async fn test_worker_survives_stage_failure() {
    let db = Database::open_in_memory().unwrap();
    inspection_repo::insert(
        &db,
        &InspectionRow::new(INSPECTION, "VIN", 50000, "94103", NOW),
    )
    .unwrap();
    item_repo::insert(
        &db,
        INSPECTION,
        &ItemBuilder::new(ItemCategory::Exterior).megabytes(2).build(),
        NOW,
    )
    .unwrap();

    // Call 2 is the ownership-cost stage; it fails upstream.
    let analyzer = Arc::new(CannedAnalyzer::failing_on(&[2]));
    let config = Arc::new(PipelineConfig::default());
    let (worker, handle) = ChainWorker::new(
        db.clone(),
        Arc::clone(&analyzer) as Arc<dyn Analyzer>,
        Arc::clone(&config),
    );
    let worker_task = tokio::spawn(worker.run());

    start_inspection(&db, &config, &handle, INSPECTION).unwrap();
    let inspection = wait_for_terminal(&db).await;

    // One failed research stage leaves its report field null but does
    // not fail the inspection.
    assert_eq!(inspection.status, InspectionStatus::Done);
    let report = inspection.report.unwrap();
    assert!(report["ownership_cost_forecast"].is_null());
    assert_eq!(report["fair_market_value"]["typical_usd"], 5100.0);

    handle.shutdown();
    worker_task.await.unwrap();
}

#[tokio::test]
async fn test_worker_shutdown_is_prompt() {
    let db = Database::open_in_memory().unwrap();
    let analyzer = Arc::new(CannedAnalyzer::new());
    let (worker, handle) = ChainWorker::new(
        db,
        Arc::clone(&analyzer) as Arc<dyn Analyzer>,
        Arc::new(PipelineConfig::default()),
    );
    let worker_task = tokio::spawn(worker.run());

    handle.shutdown();
    tokio::time::timeout(Duration::from_secs(1), worker_task)
        .await
        .expect("worker did not stop after shutdown")
        .unwrap();
}
