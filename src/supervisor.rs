//! Monitor supervision
//!
//! The `MonitorSupervisor` owns one `MonitorHandle` per identity and is
//! the only place that spawns monitor actors, which is what makes the
//! one-actor-per-identity guarantee hold: starting monitoring for an
//! identity that already has an actor shuts the old one down before the
//! replacement spawns, so two timers never run concurrently.
//!
//! The supervisor also exposes the service layer (quota, folders, rules)
//! built over the shared storage backend, so callers configure rules and
//! folders through the same object that schedules the cycles.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};

use crate::actors::messages::CycleReport;
use crate::actors::monitor::{MonitorContext, MonitorHandle};
use crate::config::Config;
use crate::feed::DiscoveryFeed;
use crate::folders::FolderManager;
use crate::quota::QuotaTracker;
use crate::rules::RuleEngine;
use crate::storage::StorageBackend;

/// Health snapshot for one monitored identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorHealth {
    /// Whether a live actor is running for this identity
    pub is_healthy: bool,

    /// When the identity's last completed cycle finished, if any ever did
    pub last_check_at: Option<DateTime<Utc>>,

    pub active_rule_count: usize,

    /// Distinct channels across monitoring-enabled folders
    pub monitored_channel_count: usize,
}

/// Spawns and tracks monitor actors; entry point for the whole engine.
pub struct MonitorSupervisor {
    storage: Arc<dyn StorageBackend>,
    quota: QuotaTracker,
    folders: FolderManager,
    rules: RuleEngine,
    feed: Arc<dyn DiscoveryFeed>,
    config: Config,

    /// Live handles, one per identity
    monitors: Mutex<HashMap<String, MonitorHandle>>,
}

impl MonitorSupervisor {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        feed: Arc<dyn DiscoveryFeed>,
        config: Config,
    ) -> Self {
        Self {
            quota: QuotaTracker::new(storage.clone(), config.quota.clone()),
            folders: FolderManager::new(storage.clone()),
            rules: RuleEngine::new(storage.clone()),
            storage,
            feed,
            config,
            monitors: Mutex::new(HashMap::new()),
        }
    }

    pub fn quota(&self) -> &QuotaTracker {
        &self.quota
    }

    pub fn folders(&self) -> &FolderManager {
        &self.folders
    }

    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    fn context(&self) -> MonitorContext {
        MonitorContext {
            storage: self.storage.clone(),
            feed: self.feed.clone(),
            quota: self.quota.clone(),
            folders: self.folders.clone(),
            rules: self.rules.clone(),
            config: self.config.monitor.clone(),
        }
    }

    /// Start monitoring an identity, running the first cycle immediately.
    ///
    /// `interval_minutes` falls back to the configured default. Starting
    /// again for an identity shuts the existing actor down first; two
    /// timers never run concurrently for one identity.
    #[instrument(skip(self))]
    pub async fn start_monitoring(
        &self,
        owner: &str,
        interval_minutes: Option<u64>,
    ) -> MonitorHandle {
        let mut monitors = self.monitors.lock().await;

        if let Some(existing) = monitors.remove(owner) {
            debug!("replacing existing monitor for {owner}");
            existing.shutdown().await;
        }

        info!("starting monitor for {owner}");
        let handle = MonitorHandle::spawn(
            owner,
            interval_minutes.unwrap_or(self.config.monitor.interval_minutes),
            self.context(),
        );
        monitors.insert(owner.to_string(), handle.clone());

        handle
    }

    /// Stop monitoring an identity. Returns whether a monitor existed.
    #[instrument(skip(self))]
    pub async fn stop_monitoring(&self, owner: &str) -> bool {
        let removed = self.monitors.lock().await.remove(owner);

        match removed {
            Some(handle) => {
                info!("stopping monitor for {owner}");
                handle.shutdown().await;
                true
            }
            None => false,
        }
    }

    /// Run one cycle for an identity right now and wait for its report.
    ///
    /// Fails when the identity has no running monitor.
    pub async fn run_now(&self, owner: &str) -> Result<CycleReport> {
        let handle = self
            .monitors
            .lock()
            .await
            .get(owner)
            .cloned()
            .with_context(|| format!("no monitor running for {owner}"))?;

        handle.run_now().await
    }

    /// Change the cycle interval for one identity's running monitor.
    pub async fn set_interval(&self, owner: &str, interval_minutes: u64) -> Result<()> {
        let handle = self
            .monitors
            .lock()
            .await
            .get(owner)
            .cloned()
            .with_context(|| format!("no monitor running for {owner}"))?;

        handle.update_interval(interval_minutes).await
    }

    /// Number of live monitors. Dead handles are pruned on the way.
    pub async fn active_monitors(&self) -> usize {
        let mut monitors = self.monitors.lock().await;
        monitors.retain(|_, handle| handle.is_running());
        monitors.len()
    }

    /// Health snapshot for one identity.
    pub async fn check_health(&self, owner: &str) -> Result<MonitorHealth> {
        let is_healthy = self
            .monitors
            .lock()
            .await
            .get(owner)
            .map(|handle| handle.is_running())
            .unwrap_or(false);

        let last_check_at = self
            .storage
            .last_cycle(owner)
            .await
            .context("failed to read last cycle timestamp")?;

        let active_rule_count = self
            .rules
            .active_rules(owner)
            .await
            .context("failed to load rules")?
            .len();

        let monitored_channel_count = self
            .folders
            .list(owner)
            .await
            .context("failed to load folders")?
            .iter()
            .filter(|f| f.monitoring_enabled)
            .flat_map(|f| f.channel_ids.iter())
            .collect::<BTreeSet<_>>()
            .len();

        Ok(MonitorHealth {
            is_healthy,
            last_check_at,
            active_rule_count,
            monitored_channel_count,
        })
    }

    /// Today's remaining budget for an identity.
    pub async fn remaining_quota(&self, owner: &str) -> Result<crate::quota::QuotaStatus> {
        Ok(self.quota.remaining(owner).await?)
    }

    /// Shut down every monitor. Idempotent.
    pub async fn shutdown(&self) {
        let mut monitors = self.monitors.lock().await;

        for (owner, handle) in monitors.drain() {
            debug!("shutting down monitor for {owner}");
            handle.shutdown().await;
        }
    }
}
