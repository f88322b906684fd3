//! MonitorActor - drives the recurring monitoring cycle for one identity
//!
//! One actor per identity. The actor runs one cycle immediately on
//! start, then one per interval tick until shut down. A cycle walks the
//! whole pipeline: folders, rules, quota admission, feed fetch, rule
//! evaluation, one batch alert persist, cycle timestamp.
//!
//! ## Failure policy
//!
//! Nothing a cycle does can crash the actor. Expected conditions (no
//! rules, no channels, exhausted budget) come back as `Skipped`;
//! unexpected ones (feed down, storage error) as `Failed`. Either way the
//! next tick retries independently. Alerts are only persisted at the
//! single batch step, so a cycle that fails mid-way commits nothing.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use futures::{StreamExt, stream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Instant, interval_at};
use tracing::{debug, error, info, instrument, warn};

use crate::VideoObservation;
use crate::config::MonitorConfig;
use crate::feed::DiscoveryFeed;
use crate::folders::FolderManager;
use crate::metrics::DerivedMetrics;
use crate::quota::{QuotaTracker, estimate_cost};
use crate::rules::{self, RuleEngine};
use crate::storage::StorageBackend;
use crate::storage::schema::OperationKind;

use super::messages::{CycleOutcome, CycleReport, MonitorCommand, SkipReason};

/// Everything a monitor actor needs, bundled so the supervisor can spawn
/// actors for any identity from one shared context.
#[derive(Clone)]
pub struct MonitorContext {
    pub storage: Arc<dyn StorageBackend>,
    pub feed: Arc<dyn DiscoveryFeed>,
    pub quota: QuotaTracker,
    pub folders: FolderManager,
    pub rules: RuleEngine,
    pub config: MonitorConfig,
}

/// Actor that runs the monitoring pipeline for a single identity.
pub struct MonitorActor {
    owner: String,
    ctx: MonitorContext,

    /// Command receiver for control messages
    command_rx: mpsc::Receiver<MonitorCommand>,

    /// Current cycle interval
    interval_duration: Duration,
}

impl MonitorActor {
    pub fn new(
        owner: String,
        interval_minutes: u64,
        ctx: MonitorContext,
        command_rx: mpsc::Receiver<MonitorCommand>,
    ) -> Self {
        let interval_duration = Duration::from_secs(interval_minutes.max(1) * 60);

        Self {
            owner,
            ctx,
            command_rx,
            interval_duration,
        }
    }

    /// Run the actor's main loop.
    ///
    /// One cycle runs immediately on start; afterwards the ticker paces
    /// cycles one interval apart. Commands queue behind an in-flight
    /// cycle, so the loop never runs two cycles concurrently.
    #[instrument(skip(self), fields(owner = %self.owner))]
    pub async fn run(mut self) {
        debug!("starting monitor actor");

        let report = self.run_cycle().await;
        self.log_outcome(&report);

        let mut ticker = interval_at(
            Instant::now() + self.interval_duration,
            self.interval_duration,
        );

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let report = self.run_cycle().await;
                    self.log_outcome(&report);
                }

                Some(cmd) = self.command_rx.recv() => {
                    match cmd {
                        MonitorCommand::RunNow { respond_to } => {
                            debug!("received RunNow command");
                            let report = self.run_cycle().await;
                            let _ = respond_to.send(report);
                        }

                        MonitorCommand::UpdateInterval { interval_minutes } => {
                            debug!("updating interval to {interval_minutes}min");
                            self.interval_duration =
                                Duration::from_secs(interval_minutes.max(1) * 60);
                            ticker = interval_at(
                                Instant::now() + self.interval_duration,
                                self.interval_duration,
                            );
                        }

                        MonitorCommand::Shutdown => {
                            debug!("received shutdown command");
                            break;
                        }
                    }
                }

                // Command channel closed - exit
                else => {
                    warn!("command channel closed, shutting down");
                    break;
                }
            }
        }

        debug!("monitor actor stopped");
    }

    fn log_outcome(&self, report: &CycleReport) {
        match &report.outcome {
            CycleOutcome::Completed {
                alerts_persisted,
                observations,
                ..
            } => {
                debug!("cycle completed: {observations} observations, {alerts_persisted} alerts");
            }
            CycleOutcome::Skipped(reason) => {
                info!("cycle skipped: {reason:?}");
            }
            CycleOutcome::Failed(reason) => {
                error!("cycle failed: {reason}");
            }
        }
    }

    /// Run one full cycle and wrap the outcome in a report.
    async fn run_cycle(&self) -> CycleReport {
        let started_at = Utc::now();

        let outcome = match self.execute_cycle().await {
            Ok(outcome) => outcome,
            Err(e) => CycleOutcome::Failed(format!("{e:#}")),
        };

        CycleReport {
            owner: self.owner.clone(),
            started_at,
            finished_at: Utc::now(),
            outcome,
        }
    }

    #[instrument(skip(self), fields(owner = %self.owner))]
    async fn execute_cycle(&self) -> Result<CycleOutcome> {
        let owner = &self.owner;

        // Step 1: load folders and active rules; nothing to evaluate means
        // nothing to fetch.
        let folders = self
            .ctx
            .folders
            .list(owner)
            .await
            .context("failed to load folders")?;
        let active_rules = self
            .ctx
            .rules
            .active_rules(owner)
            .await
            .context("failed to load rules")?;

        if active_rules.is_empty() {
            return Ok(CycleOutcome::Skipped(SkipReason::NoActiveRules));
        }

        // Step 2: de-duplicated channel set across monitoring-enabled
        // folders only.
        let channels: BTreeSet<String> = folders
            .iter()
            .filter(|f| f.monitoring_enabled)
            .flat_map(|f| f.channel_ids.iter().cloned())
            .collect();

        if channels.is_empty() {
            return Ok(CycleOutcome::Skipped(SkipReason::NoMonitoredChannels));
        }

        // Step 3: quota admission before any upstream call. Soft budget:
        // the estimate covers the per-channel list calls; actual item
        // counts are only known after the fetch.
        let required = estimate_cost(OperationKind::ChannelVideos, channels.len());
        if !self
            .ctx
            .quota
            .reserve(owner, required)
            .await
            .context("quota check failed")?
        {
            let status = self
                .ctx
                .quota
                .remaining(owner)
                .await
                .context("quota read failed")?;
            info!(
                "quota exhausted for {owner}: {} remaining, {required} required",
                status.remaining
            );
            return Ok(CycleOutcome::Skipped(SkipReason::QuotaExhausted {
                remaining: status.remaining,
                required,
            }));
        }

        // Step 4: fetch fresh observations with bounded concurrency, then
        // record what the calls actually cost.
        let since = self
            .ctx
            .storage
            .last_cycle(owner)
            .await
            .context("failed to read last cycle timestamp")?;

        let feed = &self.ctx.feed;
        let fetches: Vec<_> = channels
            .iter()
            .map(|channel_id| async move { feed.list_channel_videos(channel_id, since).await })
            .collect();
        let results: Vec<Result<Vec<VideoObservation>>> = stream::iter(fetches)
            .buffer_unordered(self.ctx.config.fetch_concurrency.max(1))
            .collect()
            .await;

        self.ctx
            .quota
            .record(owner, OperationKind::ChannelVideos, required)
            .await
            .context("failed to record quota units")?;

        let mut observations = Vec::new();
        for result in results {
            observations.extend(result.context("discovery feed fetch failed")?);
        }

        // Per-item statistics hydration cost.
        if !observations.is_empty() {
            self.ctx
                .quota
                .record(
                    owner,
                    OperationKind::VideoDetails,
                    estimate_cost(OperationKind::VideoDetails, observations.len()),
                )
                .await
                .context("failed to record quota units")?;
        }

        // Step 5: evaluate every observation; alerts accumulate across the
        // whole cycle and are persisted in one batch below.
        let now = Utc::now();
        let mut alerts = Vec::new();
        for observation in &observations {
            // The stored latest is this observation's growth baseline;
            // recording below demotes it to the previous slot.
            let baseline = self
                .ctx
                .storage
                .latest_observation(&observation.video_id)
                .await
                .context("failed to load stored observation")?;

            let metrics =
                DerivedMetrics::compute(observation, baseline.as_ref(), None, now);
            alerts.extend(rules::evaluate(observation, &metrics, &active_rules, now));

            self.ctx
                .storage
                .record_observation(observation.clone())
                .await
                .context("failed to record observation")?;
        }

        // Step 6: single batch persist - the cycle's one synchronization
        // point. De-duplication happens here, keyed on
        // (rule_id, video_id, observed_at).
        let alerts_evaluated = alerts.len();
        let alerts_persisted = self
            .ctx
            .rules
            .save(alerts)
            .await
            .context("failed to persist alerts")?;

        // Step 7: cycle bookkeeping for health reporting and the next
        // cycle's `since` watermark.
        self.ctx
            .storage
            .set_last_cycle(owner, now)
            .await
            .context("failed to record cycle timestamp")?;

        Ok(CycleOutcome::Completed {
            channels: channels.len(),
            observations: observations.len(),
            alerts_evaluated,
            alerts_persisted,
        })
    }
}

/// Handle for controlling a MonitorActor
///
/// Cloneable; the supervisor keeps one per identity.
#[derive(Clone)]
pub struct MonitorHandle {
    sender: mpsc::Sender<MonitorCommand>,

    /// Identity this actor monitors
    pub owner: String,
}

impl MonitorHandle {
    /// Spawn a new monitor actor for an identity.
    pub fn spawn(owner: impl Into<String>, interval_minutes: u64, ctx: MonitorContext) -> Self {
        let owner = owner.into();
        let (cmd_tx, cmd_rx) = mpsc::channel(32);

        let actor = MonitorActor::new(owner.clone(), interval_minutes, ctx, cmd_rx);
        tokio::spawn(actor.run());

        Self {
            sender: cmd_tx,
            owner,
        }
    }

    /// Run one cycle immediately and wait for its report.
    pub async fn run_now(&self) -> Result<CycleReport> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(MonitorCommand::RunNow { respond_to: tx })
            .await
            .context("failed to send RunNow command")?;

        rx.await.context("failed to receive cycle report")
    }

    /// Update the cycle interval.
    pub async fn update_interval(&self, interval_minutes: u64) -> Result<()> {
        self.sender
            .send(MonitorCommand::UpdateInterval { interval_minutes })
            .await
            .context("failed to send UpdateInterval command")?;
        Ok(())
    }

    /// Gracefully shut down the actor. An in-flight cycle finishes first.
    pub async fn shutdown(&self) {
        let _ = self.sender.send(MonitorCommand::Shutdown).await;
    }

    /// Whether the actor is still accepting commands.
    pub fn is_running(&self) -> bool {
        !self.sender.is_closed()
    }
}
