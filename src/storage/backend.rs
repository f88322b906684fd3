//! Storage backend trait definition
//!
//! This module defines the core `StorageBackend` trait that all
//! storage implementations must implement.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::VideoObservation;

use super::error::StorageResult;
use super::schema::{Alert, AlertRule, ChannelFolder, OperationKind, QuotaLedgerEntry};

/// Trait for persistent storage backends
///
/// Implementations must be `Send + Sync` as they are shared across async
/// tasks behind an `Arc`.
///
/// Two capabilities go beyond plain CRUD and carry invariants the core
/// depends on:
///
/// - `quota_add` must be atomic: concurrent increments for the same
///   (owner, day) are additive and never lost.
/// - `insert_alerts` must de-duplicate on `(rule_id, video_id,
///   observed_at)`: re-inserting an existing key leaves a single row.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    // ========================================================================
    // Channel folders
    // ========================================================================

    /// Insert a new folder.
    async fn insert_folder(&self, folder: ChannelFolder) -> StorageResult<()>;

    /// Fetch one folder by id, scoped to its owner. `None` when the folder
    /// does not exist or belongs to someone else.
    async fn get_folder(&self, owner: &str, id: Uuid) -> StorageResult<Option<ChannelFolder>>;

    /// All folders owned by an identity, with resolved membership.
    async fn list_folders(&self, owner: &str) -> StorageResult<Vec<ChannelFolder>>;

    /// Replace a folder record (same id and owner).
    async fn update_folder(&self, folder: ChannelFolder) -> StorageResult<()>;

    /// Delete a folder and its membership rows. Shared channel data is
    /// untouched. Returns whether a row was deleted.
    async fn delete_folder(&self, owner: &str, id: Uuid) -> StorageResult<bool>;

    // ========================================================================
    // Alert rules
    // ========================================================================

    /// Insert a new rule.
    async fn insert_rule(&self, rule: AlertRule) -> StorageResult<()>;

    /// Fetch one rule by id, scoped to its owner.
    async fn get_rule(&self, owner: &str, id: Uuid) -> StorageResult<Option<AlertRule>>;

    /// All rules owned by an identity (active and inactive).
    async fn list_rules(&self, owner: &str) -> StorageResult<Vec<AlertRule>>;

    /// Replace a rule record (same id and owner).
    async fn update_rule(&self, rule: AlertRule) -> StorageResult<()>;

    /// Delete a rule. Returns whether a row was deleted.
    async fn delete_rule(&self, owner: &str, id: Uuid) -> StorageResult<bool>;

    // ========================================================================
    // Alerts
    // ========================================================================

    /// Insert a batch of alerts, de-duplicating on the idempotence key.
    ///
    /// Returns the number of rows actually inserted (duplicates are
    /// silently dropped). An empty batch is a no-op returning 0.
    async fn insert_alerts(&self, alerts: Vec<Alert>) -> StorageResult<usize>;

    /// Most recent alerts for an identity, newest first.
    async fn list_alerts(&self, owner: &str, limit: usize) -> StorageResult<Vec<Alert>>;

    /// Flip the read flag. Returns whether the alert exists for this owner.
    async fn set_alert_read(&self, owner: &str, id: Uuid, is_read: bool) -> StorageResult<bool>;

    /// Flip the archived flag. Returns whether the alert exists for this
    /// owner.
    async fn set_alert_archived(
        &self,
        owner: &str,
        id: Uuid,
        is_archived: bool,
    ) -> StorageResult<bool>;

    // ========================================================================
    // Quota ledger
    // ========================================================================

    /// Atomically add consumed units to an (owner, day) ledger row,
    /// creating the row if absent. Returns the new total for the day.
    async fn quota_add(
        &self,
        owner: &str,
        day: NaiveDate,
        operation: OperationKind,
        units: u64,
    ) -> StorageResult<u64>;

    /// Read one day's ledger row. A missing row reads as zero used.
    async fn quota_entry(&self, owner: &str, day: NaiveDate) -> StorageResult<QuotaLedgerEntry>;

    // ========================================================================
    // Observation history
    // ========================================================================

    /// Record a fresh observation, demoting the current latest (if any)
    /// to the previous slot for its video.
    async fn record_observation(&self, observation: VideoObservation) -> StorageResult<()>;

    /// The observation that preceded the current latest for a video.
    /// `None` until a video has been observed at least twice.
    async fn previous_observation(
        &self,
        video_id: &str,
    ) -> StorageResult<Option<VideoObservation>>;

    /// The most recent observation for a video.
    async fn latest_observation(&self, video_id: &str)
    -> StorageResult<Option<VideoObservation>>;

    // ========================================================================
    // Cycle bookkeeping
    // ========================================================================

    /// Record when an identity's monitoring cycle last completed.
    async fn set_last_cycle(&self, owner: &str, at: DateTime<Utc>) -> StorageResult<()>;

    /// When an identity's monitoring cycle last completed, if ever.
    async fn last_cycle(&self, owner: &str) -> StorageResult<Option<DateTime<Utc>>>;
}
