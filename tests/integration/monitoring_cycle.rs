//! End-to-end monitoring cycle tests
//!
//! These drive whole cycles through the supervisor against scripted
//! feeds: alert production above a threshold, silence below it, quota
//! refusal before any upstream call, and folder monitoring toggles.
//!
//! Starting a monitor runs one cycle immediately, so each test starts
//! the monitor on an unconfigured identity and waits for that startup
//! cycle (a no-rules skip) before creating rules and folders. Commands
//! queue behind an in-flight cycle, which is what makes the wait sound.

use std::sync::Arc;

use chrono::{Duration, Utc};
use trendwatch::VideoObservation;
use trendwatch::actors::messages::{CycleOutcome, SkipReason};
use trendwatch::storage::schema::{Comparison, MetricKind};
use trendwatch::supervisor::MonitorSupervisor;

mod helpers;
use helpers::*;

/// Start a monitor and wait out its startup cycle.
async fn start_settled(supervisor: &MonitorSupervisor, owner: &str) {
    supervisor.start_monitoring(owner, None).await;
    let report = supervisor.run_now(owner).await.unwrap();
    assert_eq!(
        report.outcome,
        CycleOutcome::Skipped(SkipReason::NoActiveRules)
    );
}

async fn monitored_channel(supervisor: &MonitorSupervisor, owner: &str, channel: &str) {
    let folder = supervisor
        .folders()
        .create(owner, "Watchlist", None, true)
        .await
        .unwrap();
    supervisor
        .folders()
        .add_channels(owner, folder.id, &[channel.to_string()])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cycle_produces_alert_above_threshold() {
    // A breakout video: high velocity, high engagement, fresh.
    let feed = Arc::new(ScriptedFeed::new().with_video("c1", video("v1", 200_000, 30_000, 5_000)));
    let (storage, supervisor) = engine(feed, 10_000);
    start_settled(&supervisor, "alice").await;

    supervisor
        .rules()
        .create_rule("alice", MetricKind::ViralScore, Comparison::Greater, 70.0)
        .await
        .unwrap();
    monitored_channel(&supervisor, "alice", "c1").await;

    let report = supervisor.run_now("alice").await.unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Completed {
            channels: 1,
            observations: 1,
            alerts_evaluated: 1,
            alerts_persisted: 1,
        }
    );

    let alerts = storage.list_alerts("alice", 10).await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].video_id, "v1");
    assert_eq!(alerts[0].metric, MetricKind::ViralScore);
    assert!(alerts[0].metric_value > 70.0);

    // One channel list call plus one per-item detail unit.
    assert_eq!(supervisor.quota().remaining("alice").await.unwrap().used, 2);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_cycle_silent_below_threshold() {
    // A sleeper video that scores nowhere near the rule's threshold.
    let feed = Arc::new(ScriptedFeed::new().with_video("c1", video("v1", 50, 1, 0)));
    let (storage, supervisor) = engine(feed, 10_000);
    start_settled(&supervisor, "alice").await;

    supervisor
        .rules()
        .create_rule("alice", MetricKind::ViralScore, Comparison::GreaterOrEqual, 95.0)
        .await
        .unwrap();
    monitored_channel(&supervisor, "alice", "c1").await;

    let report = supervisor.run_now("alice").await.unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Completed {
            channels: 1,
            observations: 1,
            alerts_evaluated: 0,
            alerts_persisted: 0,
        }
    );
    assert!(storage.list_alerts("alice", 10).await.unwrap().is_empty());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_exhausted_quota_blocks_all_fetches() {
    let feed = Arc::new(ScriptedFeed::new().with_video("c1", video("v1", 200_000, 30_000, 5_000)));
    let (storage, supervisor) = engine(feed.clone(), 0);
    start_settled(&supervisor, "alice").await;

    supervisor
        .rules()
        .create_rule("alice", MetricKind::ViewCount, Comparison::Greater, 0.0)
        .await
        .unwrap();
    monitored_channel(&supervisor, "alice", "c1").await;

    let report = supervisor.run_now("alice").await.unwrap();

    assert_eq!(
        report.outcome,
        CycleOutcome::Skipped(SkipReason::QuotaExhausted {
            remaining: 0,
            required: 1,
        })
    );

    // Admission happens before any upstream call: the feed was never
    // contacted, nothing was charged, nothing was stored.
    assert_eq!(feed.fetch_count(), 0);
    assert_eq!(supervisor.quota().remaining("alice").await.unwrap().used, 0);
    assert!(storage.list_alerts("alice", 10).await.unwrap().is_empty());

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_disabled_folders_and_duplicates_excluded() {
    let feed = Arc::new(
        ScriptedFeed::new()
            .with_video("c1", video("v1", 200_000, 30_000, 5_000))
            .with_video("c2", video("v2", 200_000, 30_000, 5_000)),
    );
    let (_storage, supervisor) = engine(feed.clone(), 10_000);
    start_settled(&supervisor, "alice").await;

    supervisor
        .rules()
        .create_rule("alice", MetricKind::ViewCount, Comparison::Greater, 0.0)
        .await
        .unwrap();

    // c1 appears in two enabled folders; c2 only in a disabled one.
    for name in ["Tech", "News"] {
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
    let muted = supervisor
        .folders()
        .create("alice", "Muted", None, false)
        .await
        .unwrap();
    supervisor
        .folders()
        .add_channels("alice", muted.id, &["c2".to_string()])
        .await
        .unwrap();

    let report = supervisor.run_now("alice").await.unwrap();

    // The duplicate membership collapses to one fetch; the disabled
    // folder's channel is never contacted.
    assert_eq!(
        report.outcome,
        CycleOutcome::Completed {
            channels: 1,
            observations: 1,
            alerts_evaluated: 1,
            alerts_persisted: 1,
        }
    );
    assert_eq!(feed.fetched_channels(), vec!["c1"]);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_growth_rate_uses_stored_baseline() {
    let feed = Arc::new(ScriptedFeed::new().with_video("c1", video("v1", 200_000, 100, 10)));
    let (storage, supervisor) = engine(feed, 10_000);
    start_settled(&supervisor, "alice").await;

    // A four-hour-old observation at half the view count: 25%/h growth.
    let now = Utc::now();
    storage
        .record_observation(VideoObservation::new(
            "v1",
            "c1",
            100_000,
            50,
            5,
            now - Duration::hours(14),
            now - Duration::hours(4),
        ))
        .await
        .unwrap();

    supervisor
        .rules()
        .create_rule("alice", MetricKind::GrowthRate, Comparison::Greater, 20.0)
        .await
        .unwrap();
    monitored_channel(&supervisor, "alice", "c1").await;

    let report = supervisor.run_now("alice").await.unwrap();

    assert_eq!(report.outcome.alerts_persisted(), 1);

    let alerts = storage.list_alerts("alice", 10).await.unwrap();
    assert_eq!(alerts[0].metric, MetricKind::GrowthRate);
    assert!((alerts[0].metric_value - 25.0).abs() < 0.1);

    // The fresh observation became the latest; the baseline was demoted.
    let latest = storage.latest_observation("v1").await.unwrap().unwrap();
    assert_eq!(latest.view_count, 200_000);
    let previous = storage.previous_observation("v1").await.unwrap().unwrap();
    assert_eq!(previous.view_count, 100_000);

    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_cycle_watermark_advances_only_on_completion() {
    let feed = Arc::new(ScriptedFeed::new());
    let (storage, supervisor) = engine(feed, 10_000);

    // Skipped cycles (startup and manual) leave no watermark behind.
    start_settled(&supervisor, "alice").await;
    assert!(storage.last_cycle("alice").await.unwrap().is_none());

    supervisor
        .rules()
        .create_rule("alice", MetricKind::ViewCount, Comparison::Greater, 0.0)
        .await
        .unwrap();
    monitored_channel(&supervisor, "alice", "c1").await;

    let report = supervisor.run_now("alice").await.unwrap();
    assert_eq!(report.outcome.alerts_persisted(), 0);
    assert!(storage.last_cycle("alice").await.unwrap().is_some());

    supervisor.shutdown().await;
}
