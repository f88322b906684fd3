//! Alert idempotence tests
//!
//! Re-evaluating the same observation must not multiply alerts: the
//! storage key (rule_id, video_id, observed_at) holds whether the repeat
//! happens inside one batch or across separate cycles.

use std::sync::Arc;

use chrono::Utc;
use trendwatch::actors::messages::{CycleOutcome, SkipReason};
use trendwatch::storage::schema::{Comparison, MetricKind};
use trendwatch::supervisor::MonitorSupervisor;

mod helpers;
use helpers::*;

/// Start a monitor and wait out its startup cycle (a no-rules skip).
async fn start_settled(supervisor: &MonitorSupervisor, owner: &str) {
    supervisor.start_monitoring(owner, None).await;
    let report = supervisor.run_now(owner).await.unwrap();
    assert_eq!(
        report.outcome,
        CycleOutcome::Skipped(SkipReason::NoActiveRules)
    );
}

async fn breakout_setup(supervisor: &MonitorSupervisor) {
    supervisor
        .rules()
        .create_rule("alice", MetricKind::ViewCount, Comparison::Greater, 100_000.0)
        .await
        .unwrap();
    let folder = supervisor
        .folders()
        .create("alice", "Breakout", None, true)
        .await
        .unwrap();
    supervisor
        .folders()
        .add_channels("alice", folder.id, &["c1".to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_repeat_cycle_with_unchanged_observation_stores_once() {
    // Fixed observation time: both cycles see identical observations.
    let feed = Arc::new(
        ScriptedFeed::new()
            .with_video("c1", video("v1", 200_000, 30_000, 5_000))
            .with_fixed_observed_at(Utc::now()),
    );
    let (storage, supervisor) = engine(feed, 10_000);
    start_settled(&supervisor, "alice").await;
    breakout_setup(&supervisor).await;

    let first = supervisor.run_now("alice").await.unwrap();
    assert_eq!(first.outcome.alerts_persisted(), 1);

    // The rule fires again, but the alert lands on an existing key.
    let second = supervisor.run_now("alice").await.unwrap();
    assert_eq!(second.outcome.alerts_persisted(), 0);

    assert_eq!(storage.list_alerts("alice", 10).await.unwrap().len(), 1);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_fresh_observation_time_alerts_again() {
    // No fixed timestamp: each cycle observes at its own instant, so a
    // still-matching rule produces a new alert per refresh.
    let feed = Arc::new(ScriptedFeed::new().with_video("c1", video("v1", 200_000, 30_000, 5_000)));
    let (storage, supervisor) = engine(feed, 10_000);
    start_settled(&supervisor, "alice").await;
    breakout_setup(&supervisor).await;

    let first = supervisor.run_now("alice").await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let second = supervisor.run_now("alice").await.unwrap();

    assert_eq!(first.outcome.alerts_persisted(), 1);
    assert_eq!(second.outcome.alerts_persisted(), 1);
    assert_eq!(storage.list_alerts("alice", 10).await.unwrap().len(), 2);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_keys_within_one_batch_collapse() {
    let feed = Arc::new(
        ScriptedFeed::new()
            .with_video("c1", video("v1", 200_000, 30_000, 5_000))
            .with_fixed_observed_at(Utc::now()),
    );
    let (storage, supervisor) = engine(feed, 10_000);
    start_settled(&supervisor, "alice").await;

    // Two folders both containing c1: the channel set de-duplicates, so
    // one observation and one alert result, not two.
    supervisor
        .rules()
        .create_rule("alice", MetricKind::ViewCount, Comparison::Greater, 100_000.0)
        .await
        .unwrap();
    for name in ["Tech", "Favorites"] {
        let folder = supervisor
            .folders()
            .create("alice", name, None, true)
            .await
            .unwrap();
        supervisor
            .folders()
            .add_channels("alice", folder.id, &["c1".to_string()])
            .await
            .unwrap();
    }

    let report = supervisor.run_now("alice").await.unwrap();

    assert_eq!(report.outcome.alerts_persisted(), 1);
    assert_eq!(storage.list_alerts("alice", 10).await.unwrap().len(), 1);

    supervisor.shutdown().await;
}
