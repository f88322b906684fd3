//! In-memory storage backend (no persistence)
//!
//! The reference backend: a map store behind a single async mutex. Useful
//! for tests and for deployments that accept losing history on restart.
//! The one mutex also makes the two storage invariants trivial — quota
//! increments are serialized, and alert inserts check the key set before
//! writing.
//!
//! ## Limitations
//!
//! - **No persistence**: all data lost on restart
//! - **Unbounded alert list**: callers are expected to archive

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::VideoObservation;

use super::backend::StorageBackend;
use super::error::StorageResult;
use super::schema::{Alert, AlertRule, ChannelFolder, OperationKind, QuotaLedgerEntry};

#[derive(Default)]
struct Inner {
    folders: HashMap<Uuid, ChannelFolder>,
    rules: HashMap<Uuid, AlertRule>,
    alerts: Vec<Alert>,

    /// Idempotence keys of every stored alert
    alert_keys: HashSet<(Uuid, String, DateTime<Utc>)>,

    quota: HashMap<(String, NaiveDate), QuotaLedgerEntry>,

    /// Per video: (latest, previous) observation pair
    observations: HashMap<String, (VideoObservation, Option<VideoObservation>)>,

    last_cycles: HashMap<String, DateTime<Utc>>,
}

/// In-memory storage backend
pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    /// Create a new, empty in-memory backend
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn insert_folder(&self, folder: ChannelFolder) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        debug!("inserting folder {} for {}", folder.id, folder.owner);
        inner.folders.insert(folder.id, folder);
        Ok(())
    }

    async fn get_folder(&self, owner: &str, id: Uuid) -> StorageResult<Option<ChannelFolder>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .folders
            .get(&id)
            .filter(|f| f.owner == owner)
            .cloned())
    }

    async fn list_folders(&self, owner: &str) -> StorageResult<Vec<ChannelFolder>> {
        let inner = self.inner.lock().await;
        let mut folders: Vec<_> = inner
            .folders
            .values()
            .filter(|f| f.owner == owner)
            .cloned()
            .collect();
        folders.sort_by_key(|f| f.created_at);
        Ok(folders)
    }

    async fn update_folder(&self, folder: ChannelFolder) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        inner.folders.insert(folder.id, folder);
        Ok(())
    }

    async fn delete_folder(&self, owner: &str, id: Uuid) -> StorageResult<bool> {
        let mut inner = self.inner.lock().await;
        let owned = inner
            .folders
            .get(&id)
            .map(|f| f.owner == owner)
            .unwrap_or(false);
        if owned {
            inner.folders.remove(&id);
        }
        Ok(owned)
    }

    async fn insert_rule(&self, rule: AlertRule) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        debug!("inserting rule {} for {}", rule.id, rule.owner);
        inner.rules.insert(rule.id, rule);
        Ok(())
    }

    async fn get_rule(&self, owner: &str, id: Uuid) -> StorageResult<Option<AlertRule>> {
        let inner = self.inner.lock().await;
        Ok(inner.rules.get(&id).filter(|r| r.owner == owner).cloned())
    }

    async fn list_rules(&self, owner: &str) -> StorageResult<Vec<AlertRule>> {
        let inner = self.inner.lock().await;
        let mut rules: Vec<_> = inner
            .rules
            .values()
            .filter(|r| r.owner == owner)
            .cloned()
            .collect();
        rules.sort_by_key(|r| r.created_at);
        Ok(rules)
    }

    async fn update_rule(&self, rule: AlertRule) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        inner.rules.insert(rule.id, rule);
        Ok(())
    }

    async fn delete_rule(&self, owner: &str, id: Uuid) -> StorageResult<bool> {
        let mut inner = self.inner.lock().await;
        let owned = inner
            .rules
            .get(&id)
            .map(|r| r.owner == owner)
            .unwrap_or(false);
        if owned {
            inner.rules.remove(&id);
        }
        Ok(owned)
    }

    async fn insert_alerts(&self, alerts: Vec<Alert>) -> StorageResult<usize> {
        if alerts.is_empty() {
            return Ok(0);
        }

        let mut inner = self.inner.lock().await;
        let mut inserted = 0;
        for alert in alerts {
            // De-duplicate on (rule_id, video_id, observed_at)
            if inner.alert_keys.insert(alert.dedupe_key()) {
                inner.alerts.push(alert);
                inserted += 1;
            }
        }
        debug!("inserted {inserted} alerts");
        Ok(inserted)
    }

    async fn list_alerts(&self, owner: &str, limit: usize) -> StorageResult<Vec<Alert>> {
        let inner = self.inner.lock().await;
        let mut alerts: Vec<_> = inner
            .alerts
            .iter()
            .filter(|a| a.owner == owner)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| std::cmp::Reverse(a.triggered_at));
        alerts.truncate(limit);
        Ok(alerts)
    }

    async fn set_alert_read(&self, owner: &str, id: Uuid, is_read: bool) -> StorageResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner
            .alerts
            .iter_mut()
            .find(|a| a.id == id && a.owner == owner)
        {
            Some(alert) => {
                alert.is_read = is_read;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn set_alert_archived(
        &self,
        owner: &str,
        id: Uuid,
        is_archived: bool,
    ) -> StorageResult<bool> {
        let mut inner = self.inner.lock().await;
        match inner
            .alerts
            .iter_mut()
            .find(|a| a.id == id && a.owner == owner)
        {
            Some(alert) => {
                alert.is_archived = is_archived;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn quota_add(
        &self,
        owner: &str,
        day: NaiveDate,
        operation: OperationKind,
        units: u64,
    ) -> StorageResult<u64> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .quota
            .entry((owner.to_string(), day))
            .or_insert_with(|| QuotaLedgerEntry::zeroed(owner, day));

        entry.units_used += units;
        *entry.by_operation.entry(operation).or_insert(0) += units;

        Ok(entry.units_used)
    }

    async fn quota_entry(&self, owner: &str, day: NaiveDate) -> StorageResult<QuotaLedgerEntry> {
        let inner = self.inner.lock().await;
        Ok(inner
            .quota
            .get(&(owner.to_string(), day))
            .cloned()
            .unwrap_or_else(|| QuotaLedgerEntry::zeroed(owner, day)))
    }

    async fn record_observation(&self, observation: VideoObservation) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        let video_id = observation.video_id.clone();

        match inner.observations.remove(&video_id) {
            Some((latest, _)) => {
                inner.observations.insert(video_id, (observation, Some(latest)));
            }
            None => {
                inner.observations.insert(video_id, (observation, None));
            }
        }
        Ok(())
    }

    async fn previous_observation(
        &self,
        video_id: &str,
    ) -> StorageResult<Option<VideoObservation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .observations
            .get(video_id)
            .and_then(|(_, previous)| previous.clone()))
    }

    async fn latest_observation(
        &self,
        video_id: &str,
    ) -> StorageResult<Option<VideoObservation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .observations
            .get(video_id)
            .map(|(latest, _)| latest.clone()))
    }

    async fn set_last_cycle(&self, owner: &str, at: DateTime<Utc>) -> StorageResult<()> {
        let mut inner = self.inner.lock().await;
        inner.last_cycles.insert(owner.to_string(), at);
        Ok(())
    }

    async fn last_cycle(&self, owner: &str) -> StorageResult<Option<DateTime<Utc>>> {
        let inner = self.inner.lock().await;
        Ok(inner.last_cycles.get(owner).copied())
    }
}
